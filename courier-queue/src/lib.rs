//! Store-and-forward delivery queue.
//!
//! [`Queue`] wraps any [`DeliveryTarget`](courier_common::DeliveryTarget)
//! with durable retries: ingress attempts delivery once in the background,
//! and recipients that fail temporarily are persisted to a spool and retried
//! on an exponential schedule by a worker pool until they succeed, fail
//! permanently, or exhaust the configured attempt budget. Scheduled work
//! survives restarts.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod filter;
pub mod queue;
pub mod wheel;

pub use config::QueueConfig;
pub use error::QueueError;
pub use filter::filter_recipients;
pub use queue::Queue;
pub use wheel::TimeWheel;
