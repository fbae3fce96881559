use std::path::{Path, PathBuf};

use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::{debug, warn};

use crate::{
    error::{Result, SpoolError},
    metadata::QueueMetadata,
    types::MessageId,
};

/// On-disk store for queued messages.
///
/// Each message occupies two files in the spool directory: the raw body
/// under `<id>` and its [`QueueMetadata`] under `<id>.meta`. Bodies are
/// written once and read many times; metadata is replaced wholesale via a
/// temporary file and an atomic rename, so a reader never observes a
/// half-written record.
#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
}

impl Spool {
    /// Open a spool directory, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Fails if the path exists but is not a directory, or cannot be
    /// created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();

        if fs::try_exists(&dir).await? {
            if !fs::metadata(&dir).await?.is_dir() {
                return Err(SpoolError::Validation(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
        } else {
            debug!(dir = %dir.display(), "creating spool directory");
            fs::create_dir_all(&dir).await?;
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn body_path(&self, id: &MessageId) -> PathBuf {
        self.dir.join(id.as_str())
    }

    fn meta_path(&self, id: &MessageId) -> PathBuf {
        self.dir.join(format!("{id}.meta"))
    }

    /// List every message with readable metadata and a present body file.
    ///
    /// A `.meta` file without its body is a crash artifact and is deleted
    /// here; a body file without metadata is left alone. Metadata that does
    /// not decode is skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails only if the directory itself cannot be read.
    pub async fn enumerate(&self) -> Result<Vec<MessageId>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(id) = MessageId::from_meta_filename(name) else {
                continue;
            };

            if !fs::try_exists(self.body_path(&id)).await? {
                warn!(id = %id, "metadata file has no body, removing it");
                if let Err(e) = fs::remove_file(self.meta_path(&id)).await {
                    warn!(id = %id, error = %e, "failed to remove dangling metadata file");
                }
                continue;
            }

            if let Err(e) = self.read_meta(&id).await {
                warn!(id = %id, error = %e, "skipping message with unreadable metadata");
                continue;
            }

            ids.push(id);
        }

        ids.sort();
        Ok(ids)
    }

    /// Decode the metadata record for `id`.
    ///
    /// # Errors
    ///
    /// [`SpoolError::NotFound`] if there is no record,
    /// [`SpoolError::Corrupt`] if it does not decode.
    pub async fn read_meta(&self, id: &MessageId) -> Result<QueueMetadata> {
        let bytes = match fs::read(self.meta_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpoolError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| SpoolError::Corrupt {
            id: id.clone(),
            source,
        })
    }

    /// Write or replace the metadata record for `meta.id`.
    ///
    /// # Errors
    ///
    /// Fails on encoding or I/O errors; the previous record, if any, is
    /// untouched on failure.
    pub async fn write_meta(&self, meta: &QueueMetadata) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        let tmp = self.dir.join(format!(".tmp_{}.meta", meta.id));

        let written = async {
            fs::write(&tmp, &bytes).await?;
            fs::rename(&tmp, self.meta_path(&meta.id)).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Stream `body` into the body file for `id`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors; no partial body file is left behind.
    pub async fn write_body<R>(&self, id: &MessageId, body: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let tmp = self.dir.join(format!(".tmp_{id}"));

        let written = async {
            let mut file = File::create(&tmp).await?;
            let written = tokio::io::copy(body, &mut file).await?;
            file.flush().await?;
            drop(file);
            fs::rename(&tmp, self.body_path(id)).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match written {
            Ok(written) => Ok(written),
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                Err(e.into())
            }
        }
    }

    /// Open the body file for `id` for sequential reading.
    ///
    /// # Errors
    ///
    /// [`SpoolError::NotFound`] if there is no body file.
    pub async fn open_body(&self, id: &MessageId) -> Result<File> {
        match File::open(self.body_path(id)).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SpoolError::NotFound(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the body and metadata files for `id`.
    ///
    /// Removal failures are logged, never propagated: whatever survives is
    /// reconciled by the next startup enumeration. Files already gone are
    /// not an error.
    pub async fn remove(&self, id: &MessageId) {
        for (path, kind) in [
            (self.body_path(id), "body"),
            (self.meta_path(id), "metadata"),
        ] {
            if let Err(e) = fs::remove_file(&path).await
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(id = %id, error = %e, "failed to remove message {kind} from disk");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use courier_common::DeliveryContext;
    use tokio::io::AsyncReadExt;

    use super::*;

    async fn open_temp_spool() -> (tempfile::TempDir, Spool) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let spool = Spool::open(dir.path().join("queue"))
            .await
            .expect("open spool");
        (dir, spool)
    }

    fn sample_meta(id: &MessageId) -> QueueMetadata {
        let ctx = DeliveryContext::new("from@example.org", vec!["to@example.com".to_string()]);
        QueueMetadata::new(id.clone(), ctx)
    }

    #[tokio::test]
    async fn test_body_and_meta_round_trip() {
        let (_guard, spool) = open_temp_spool().await;
        let id = MessageId::generate();

        let payload = b"Subject: hi\r\n\r\nhello world\r\n";
        let written = spool
            .write_body(&id, &mut &payload[..])
            .await
            .expect("write body");
        assert_eq!(written, payload.len() as u64);

        spool
            .write_meta(&sample_meta(&id))
            .await
            .expect("write meta");

        let mut body = Vec::new();
        spool
            .open_body(&id)
            .await
            .expect("open body")
            .read_to_end(&mut body)
            .await
            .expect("read body");
        assert_eq!(body, payload);

        let meta = spool.read_meta(&id).await.expect("read meta");
        assert_eq!(meta.id, id);
        assert_eq!(meta.tries_count, 1);

        assert_eq!(spool.enumerate().await.expect("enumerate"), vec![id]);
    }

    #[tokio::test]
    async fn test_meta_replacement_is_whole_file() {
        let (_guard, spool) = open_temp_spool().await;
        let id = MessageId::generate();
        spool.write_body(&id, &mut &b"body"[..]).await.expect("write body");

        let mut meta = sample_meta(&id);
        spool.write_meta(&meta).await.expect("first write");

        meta.record_attempt();
        meta.ctx.recipients = vec!["b@example.com".to_string()];
        spool.write_meta(&meta).await.expect("second write");

        let back = spool.read_meta(&id).await.expect("read meta");
        assert_eq!(back.tries_count, 2);
        assert_eq!(back.ctx.recipients, vec!["b@example.com".to_string()]);

        // No temporary files linger after a successful replace.
        let mut entries = fs::read_dir(spool.dir()).await.expect("read dir");
        while let Some(entry) = entries.next_entry().await.expect("next entry") {
            let name = entry.file_name();
            assert!(
                !name.to_string_lossy().starts_with(".tmp_"),
                "leftover temp file {name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_enumerate_removes_dangling_meta() {
        let (_guard, spool) = open_temp_spool().await;

        let stray = MessageId::new("stray").unwrap();
        spool.write_meta(&sample_meta(&stray)).await.expect("write meta");

        assert!(spool.enumerate().await.expect("enumerate").is_empty());
        assert!(matches!(
            spool.read_meta(&stray).await,
            Err(SpoolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_enumerate_ignores_dangling_body() {
        let (_guard, spool) = open_temp_spool().await;

        let lone = MessageId::new("lone").unwrap();
        spool.write_body(&lone, &mut &b"orphan"[..]).await.expect("write body");

        assert!(spool.enumerate().await.expect("enumerate").is_empty());

        // The body is tolerated, not deleted.
        let mut body = Vec::new();
        spool
            .open_body(&lone)
            .await
            .expect("open body")
            .read_to_end(&mut body)
            .await
            .expect("read body");
        assert_eq!(body, b"orphan");
    }

    #[tokio::test]
    async fn test_enumerate_skips_corrupt_meta() {
        let (_guard, spool) = open_temp_spool().await;

        let good = MessageId::new("good").unwrap();
        spool.write_body(&good, &mut &b"ok"[..]).await.expect("write body");
        spool.write_meta(&sample_meta(&good)).await.expect("write meta");

        let bad = MessageId::new("bad").unwrap();
        spool.write_body(&bad, &mut &b"ok"[..]).await.expect("write body");
        fs::write(spool.dir().join("bad.meta"), b"{ not json")
            .await
            .expect("write corrupt meta");

        assert_eq!(spool.enumerate().await.expect("enumerate"), vec![good]);
        assert!(matches!(
            spool.read_meta(&bad).await,
            Err(SpoolError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_remove_deletes_both_files_and_is_idempotent() {
        let (_guard, spool) = open_temp_spool().await;
        let id = MessageId::generate();

        spool.write_body(&id, &mut &b"body"[..]).await.expect("write body");
        spool.write_meta(&sample_meta(&id)).await.expect("write meta");

        spool.remove(&id).await;
        assert!(matches!(
            spool.read_meta(&id).await,
            Err(SpoolError::NotFound(_))
        ));
        assert!(matches!(
            spool.open_body(&id).await,
            Err(SpoolError::NotFound(_))
        ));

        // Removing again must not fail.
        spool.remove(&id).await;
    }

    #[tokio::test]
    async fn test_open_rejects_file_path() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").await.expect("write file");

        assert!(matches!(
            Spool::open(&file).await,
            Err(SpoolError::Validation(_))
        ));
    }
}
