//! Error types shared by delivery targets.
//!
//! A delivery attempt either succeeds for every recipient, fails for some
//! recipient subsets ([`DeliveryError::Partial`]), or fails outright. The
//! partial case carries the full per-recipient breakdown so that callers
//! pattern-match once instead of inspecting error chains.

use std::fmt;

use ahash::AHashMap;
use thiserror::Error;

/// State of a partially successful delivery attempt.
///
/// Recipients are split into three disjoint sets; `errs` carries the
/// per-recipient failure messages for the two failed sets.
#[derive(Debug, Clone, Default)]
pub struct PartialFailure {
    /// Recipients the target accepted the message for.
    pub successful: Vec<String>,
    /// Recipients that failed but are worth retrying later.
    pub temporary_failed: Vec<String>,
    /// Recipients that will never succeed.
    pub permanent_failed: Vec<String>,
    /// Failure detail per recipient.
    pub errs: AHashMap<String, String>,
}

impl fmt::Display for PartialFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errs.is_empty() {
            return write!(
                f,
                "{} temporarily failed, {} permanently failed",
                self.temporary_failed.len(),
                self.permanent_failed.len()
            );
        }

        let mut errs: Vec<_> = self.errs.iter().collect();
        errs.sort();
        for (i, (rcpt, err)) in errs.into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{rcpt}: {err}")?;
        }
        Ok(())
    }
}

/// Failure modes of a [`DeliveryTarget`](crate::DeliveryTarget).
///
/// Anything that is not [`DeliveryError::Partial`] is treated by retrying
/// callers as a permanent failure for every remaining recipient.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The attempt succeeded for some recipients and failed for others.
    #[error("delivery failed for some recipients: {0}")]
    Partial(PartialFailure),

    /// A recipient address is missing its domain part.
    #[error("malformed address {0}: missing domain part")]
    MalformedAddress(String),

    /// The incoming body stream could not be read.
    #[error("failed to buffer message: {0}")]
    Buffer(#[source] std::io::Error),

    /// Any other failure, permanent for all recipients.
    #[error("{0}")]
    Permanent(String),
}

impl DeliveryError {
    /// Permanent failure with the given description.
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Returns `true` for a per-recipient partial outcome.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        matches!(self, Self::Partial(_))
    }
}
