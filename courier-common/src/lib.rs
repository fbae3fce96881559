#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod context;
pub mod error;
pub mod logging;
pub mod target;

pub use context::{DeliveryContext, SourceEndpoint};
pub use error::{DeliveryError, PartialFailure};
pub use target::DeliveryTarget;

pub use tracing;
