use courier_spool::SpoolError;
use thiserror::Error;

/// Failures raised while constructing a [`Queue`](crate::Queue).
///
/// These are fatal to the instance; once a queue is running, delivery and
/// persistence failures are logged under the affected message id instead of
/// propagating.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The configuration is unusable.
    #[error("invalid queue configuration: {0}")]
    Config(String),

    /// The spool directory could not be opened or scanned.
    #[error(transparent)]
    Spool(#[from] SpoolError),
}
