use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::{context::DeliveryContext, error::DeliveryError};

/// Anything that can accept a message for a set of recipients.
///
/// Implementations deliver the message described by `ctx` to every address
/// in `ctx.recipients`, reading the body from `body` exactly once. A caller
/// that may retry presents a fresh body reader for every attempt, so
/// implementations must not assume the stream is seekable.
///
/// Because retrying callers re-invoke targets across crash windows,
/// implementations must tolerate duplicate deliveries of the same
/// `ctx.delivery_id`.
#[async_trait]
pub trait DeliveryTarget: Send + Sync + fmt::Debug {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Partial`] when the recipient set split into
    /// successful and failed subsets; any other error is a failure for all
    /// remaining recipients.
    async fn deliver(
        &self,
        ctx: &DeliveryContext,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), DeliveryError>;
}
