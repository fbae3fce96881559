#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod metadata;
pub mod store;
pub mod types;

pub use error::{Result, SpoolError};
pub use metadata::QueueMetadata;
pub use store::Spool;
pub use types::{InvalidMessageId, MessageId};
