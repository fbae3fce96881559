use std::{io::Cursor, path::Path, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use courier_common::{DeliveryContext, DeliveryError, DeliveryTarget};
use courier_spool::{MessageId, QueueMetadata, Spool};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::Mutex,
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::QueueConfig, error::QueueError, filter::filter_recipients, wheel::TimeWheel,
};

/// Classification of one delivery attempt against the remaining
/// recipient set.
enum AttemptOutcome {
    /// Every remaining recipient accepted the message.
    Delivered,
    /// These recipients failed temporarily and are worth another attempt.
    Retry(Vec<String>),
    /// Nothing is left to retry.
    Failed,
}

#[derive(Debug)]
struct Inner {
    name: String,
    config: QueueConfig,
    spool: Spool,
    wheel: TimeWheel<MessageId>,
    target: Arc<dyn DeliveryTarget>,
}

/// A durable, retrying delivery queue wrapping another [`DeliveryTarget`].
///
/// Ingress accepts a message, tries the wrapped target once in the
/// background, and persists whatever failed temporarily for retries on an
/// exponential schedule. Messages are dropped once every recipient has
/// either succeeded, failed permanently, or the attempt budget is spent.
#[derive(Debug)]
pub struct Queue {
    inner: Arc<Inner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Queue {
    /// Start a queue instance: open the spool at the configured location,
    /// re-arm every message found on disk, and spawn the worker pool.
    ///
    /// # Errors
    ///
    /// [`QueueError::Config`] for an unusable configuration,
    /// [`QueueError::Spool`] if the spool directory cannot be opened or
    /// scanned.
    pub async fn start(
        name: impl Into<String>,
        config: QueueConfig,
        target: Arc<dyn DeliveryTarget>,
    ) -> Result<Self, QueueError> {
        let name = name.into();
        if config.workers == 0 {
            return Err(QueueError::Config("workers must be at least 1".to_string()));
        }
        if config.max_tries == 0 {
            return Err(QueueError::Config(
                "max_tries must be at least 1".to_string(),
            ));
        }

        let location = config.location_for(&name);
        let spool = Spool::open(&location).await?;

        let inner = Arc::new(Inner {
            name,
            config,
            spool,
            wheel: TimeWheel::new(),
            target,
        });

        inner.recover().await?;

        let workers = (0..inner.config.workers)
            .map(|_| {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move { worker(inner).await })
            })
            .collect();

        debug!(delivery_target = ?inner.target, "delivery target attached");
        info!(
            name = %inner.name,
            location = %location.display(),
            workers = inner.config.workers,
            "delivery queue started"
        );

        Ok(Self {
            inner,
            workers: Mutex::new(workers),
        })
    }

    /// Instance name this queue was started with.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Directory holding the persisted messages.
    pub fn spool_dir(&self) -> &Path {
        self.inner.spool.dir()
    }

    /// Shut the queue down: close the wheel and wait for every worker to
    /// drain out.
    ///
    /// First attempts spawned by [`deliver`](DeliveryTarget::deliver) are
    /// not tracked; callers must stop submitting and let ingress settle
    /// before closing.
    pub async fn close(&self) {
        self.inner.wheel.close();
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            if let Err(e) = handle.await {
                error!(name = %self.inner.name, error = %e, "worker task failed");
            }
        }
    }
}

#[async_trait]
impl DeliveryTarget for Queue {
    /// Accept a message for delivery.
    ///
    /// Store-and-forward: this returns as soon as the message has been
    /// filtered and buffered, with the first delivery attempt running in
    /// the background. Later failures are logged under the delivery id,
    /// never surfaced here.
    async fn deliver(
        &self,
        ctx: &DeliveryContext,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), DeliveryError> {
        let mut ctx = ctx.clone();
        filter_recipients(&mut ctx)?;
        if ctx.recipients.is_empty() {
            debug!(id = %ctx.delivery_id, "no recipients left after filtering");
            return Ok(());
        }

        let id = MessageId::new(ctx.delivery_id.clone())
            .map_err(|e| DeliveryError::Permanent(e.to_string()))?;

        let mut buffer = Vec::new();
        body.read_to_end(&mut buffer)
            .await
            .map_err(DeliveryError::Buffer)?;
        let body: Arc<[u8]> = buffer.into();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.first_attempt(id, ctx, body).await });

        Ok(())
    }
}

async fn worker(inner: Arc<Inner>) {
    while let Some(entry) = inner.wheel.recv().await {
        debug!(id = %entry.value, "worker woke up");
        inner.retry_delivery(entry.value).await;
    }
}

impl Inner {
    /// The first, ingress-path attempt. Only a retryable failure touches
    /// the spool.
    async fn first_attempt(&self, id: MessageId, ctx: DeliveryContext, body: Arc<[u8]>) {
        info!(
            id = %id,
            sender = %ctx.sender,
            src = ?ctx.src_addr,
            src_hostname = %ctx.src_hostname,
            "message enqueued"
        );

        let mut meta = QueueMetadata::new(id, ctx);
        let outcome = self
            .attempt(&mut meta, &mut Cursor::new(Arc::clone(&body)))
            .await;

        let AttemptOutcome::Retry(eligible) = outcome else {
            return;
        };
        meta.ctx.recipients = eligible;

        if meta.tries_count >= self.config.max_tries {
            debug!(id = %meta.id, "attempt budget spent, dropping message");
            return;
        }

        if let Err(e) = self.spool.write_body(&meta.id, &mut Cursor::new(body)).await {
            warn!(id = %meta.id, error = %e, "failed to save message body, dropping");
            return;
        }
        if let Err(e) = self.spool.write_meta(&meta).await {
            warn!(id = %meta.id, error = %e, "failed to save message metadata, dropping");
            self.spool.remove(&meta.id).await;
            return;
        }

        info!(id = %meta.id, due_in = ?self.config.initial_retry_delay, "will retry");
        self.wheel
            .add(self.config.first_retry_due(SystemTime::now()), meta.id);
    }

    /// One retry cycle for a persisted message.
    async fn retry_delivery(&self, id: MessageId) {
        let mut meta = match self.spool.read_meta(&id).await {
            Ok(meta) => meta,
            Err(e) => {
                error!(id = %id, error = %e, "failed to read message metadata");
                return;
            }
        };
        let mut body = match self.spool.open_body(&id).await {
            Ok(body) => body,
            Err(e) => {
                error!(id = %id, error = %e, "failed to open message body, removing record");
                self.spool.remove(&id).await;
                return;
            }
        };

        debug!(id = %id, tries = meta.tries_count, "retrying delivery");
        let outcome = self.attempt(&mut meta, &mut body).await;
        drop(body);

        let AttemptOutcome::Retry(eligible) = outcome else {
            self.spool.remove(&id).await;
            return;
        };
        meta.ctx.recipients = eligible;

        if meta.tries_count >= self.config.max_tries || meta.ctx.recipients.is_empty() {
            self.spool.remove(&id).await;
            return;
        }

        meta.record_attempt();
        if let Err(e) = self.spool.write_meta(&meta).await {
            warn!(id = %id, error = %e, "failed to update metadata on disk");
        }

        let due = self.config.rearm_due(meta.tries_count, SystemTime::now());
        info!(
            id = %id,
            tries = meta.tries_count,
            due_in = ?due.duration_since(SystemTime::now()).unwrap_or_default(),
            "delivery re-armed"
        );
        self.wheel.add(due, id);
    }

    /// Invoke the target once and fold the result into `meta`.
    async fn attempt<R>(&self, meta: &mut QueueMetadata, body: &mut R) -> AttemptOutcome
    where
        R: AsyncRead + Send + Unpin,
    {
        meta.ctx
            .aux
            .insert("id".to_string(), meta.id.to_string());

        match self.target.deliver(&meta.ctx, body).await {
            Ok(()) => {
                debug!(id = %meta.id, "delivered to all remaining recipients");
                AttemptOutcome::Delivered
            }
            Err(DeliveryError::Partial(partial)) => {
                meta.failed.extend_from_slice(&partial.permanent_failed);
                if self.config.debug {
                    debug!(
                        id = %meta.id,
                        successful = ?partial.successful,
                        temporary = ?partial.temporary_failed,
                        permanent = ?partial.permanent_failed,
                        errs = ?partial.errs,
                        "partial failure"
                    );
                }
                if partial.temporary_failed.is_empty() {
                    AttemptOutcome::Failed
                } else {
                    AttemptOutcome::Retry(partial.temporary_failed)
                }
            }
            Err(err) => {
                debug!(id = %meta.id, error = %err, "permanent failure for all recipients");
                let remaining = meta.ctx.recipients.clone();
                meta.failed.extend(remaining);
                AttemptOutcome::Failed
            }
        }
    }

    /// Re-arm every message found on disk at startup.
    async fn recover(&self) -> Result<(), QueueError> {
        let now = SystemTime::now();
        let mut recovered = 0usize;

        for id in self.spool.enumerate().await? {
            let meta = match self.spool.read_meta(&id).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!(id = %id, error = %e, "skipping message with unreadable metadata");
                    continue;
                }
            };

            let due = self.config.recovery_due(
                SystemTime::from(meta.last_attempt),
                meta.tries_count,
                now,
            );
            debug!(
                id = %id,
                tries = meta.tries_count,
                due_in = ?due.duration_since(now).unwrap_or_default(),
                "scheduling recovered message"
            );
            self.wheel.add(due, id);
            recovered += 1;
        }

        if recovered != 0 {
            info!(name = %self.name, count = recovered, "loaded saved queue entries");
        }
        Ok(())
    }
}
