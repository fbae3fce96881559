//! Shared test fixtures: a scripted delivery target and spool polling
//! helpers.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use courier_common::{DeliveryContext, DeliveryError, DeliveryTarget, PartialFailure};
use tokio::io::{AsyncRead, AsyncReadExt};

const POLL: Duration = Duration::from_millis(10);

/// One invocation observed by [`MockTarget`].
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub ctx: DeliveryContext,
    pub body: Vec<u8>,
}

/// A delivery target that answers each invocation with the next scripted
/// outcome (and success once the script runs dry), recording everything it
/// was asked to deliver.
#[derive(Debug, Default)]
pub struct MockTarget {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    deliveries: Mutex<Vec<RecordedDelivery>>,
}

impl MockTarget {
    pub fn scripted(outcomes: impl IntoIterator<Item = Result<(), DeliveryError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            deliveries: Mutex::new(Vec::new()),
        })
    }

    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries
            .lock()
            .expect("MockTarget deliveries mutex poisoned")
            .clone()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries
            .lock()
            .expect("MockTarget deliveries mutex poisoned")
            .len()
    }

    /// Block until at least `expected` deliveries were attempted.
    ///
    /// # Panics
    ///
    /// Panics when `timeout` elapses first.
    pub async fn wait_for_deliveries(&self, expected: usize, timeout: Duration) {
        let waited = tokio::time::timeout(timeout, async {
            while self.delivery_count() < expected {
                tokio::time::sleep(POLL).await;
            }
        })
        .await;

        assert!(
            waited.is_ok(),
            "timed out waiting for {expected} deliveries, saw {}",
            self.delivery_count()
        );
    }
}

#[async_trait]
impl DeliveryTarget for MockTarget {
    async fn deliver(
        &self,
        ctx: &DeliveryContext,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), DeliveryError> {
        let mut buf = Vec::new();
        body.read_to_end(&mut buf)
            .await
            .map_err(DeliveryError::Buffer)?;

        self.deliveries
            .lock()
            .expect("MockTarget deliveries mutex poisoned")
            .push(RecordedDelivery {
                ctx: ctx.clone(),
                body: buf,
            });

        self.script
            .lock()
            .expect("MockTarget script mutex poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

/// A partial failure splitting recipients into temporary and permanent
/// sets, with a canned error message per recipient.
pub fn partial(temporary: &[&str], permanent: &[&str]) -> DeliveryError {
    let mut failure = PartialFailure {
        temporary_failed: temporary.iter().map(ToString::to_string).collect(),
        permanent_failed: permanent.iter().map(ToString::to_string).collect(),
        ..PartialFailure::default()
    };
    for rcpt in temporary {
        failure
            .errs
            .insert((*rcpt).to_string(), "greylisted, try later".to_string());
    }
    for rcpt in permanent {
        failure
            .errs
            .insert((*rcpt).to_string(), "no such user".to_string());
    }
    DeliveryError::Partial(failure)
}

pub fn spool_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

/// Block until the spool directory holds exactly `expected` files.
///
/// # Panics
///
/// Panics when `timeout` elapses first.
pub async fn wait_for_file_count(dir: &Path, expected: usize, timeout: Duration) {
    let waited = tokio::time::timeout(timeout, async {
        while spool_file_count(dir) != expected {
            tokio::time::sleep(POLL).await;
        }
    })
    .await;

    assert!(
        waited.is_ok(),
        "timed out waiting for {expected} spool files in {}, saw {}",
        dir.display(),
        spool_file_count(dir)
    );
}
