use std::{
    path::PathBuf,
    time::{Duration, SystemTime},
};

use serde::Deserialize;

const fn default_max_tries() -> u32 {
    8
}

const fn default_workers() -> usize {
    16
}

const fn default_initial_retry_delay() -> Duration {
    Duration::from_secs(15 * 60)
}

const fn default_retry_scale() -> f64 {
    2.0
}

fn default_state_dir() -> PathBuf {
    std::env::var_os("COURIER_STATE")
        .map_or_else(|| PathBuf::from("/var/lib/courier"), PathBuf::from)
}

/// How long a recovered message that was already overdue waits after
/// startup before its retry fires.
pub(crate) const RECOVERY_GRACE: Duration = Duration::from_secs(5);

/// Ceiling on a computed backoff, for pathological try counts.
const BACKOFF_CEILING_SECS: f64 = 1e15;

/// Configuration for a [`Queue`](crate::Queue) instance.
///
/// Unknown keys are a configuration error. The delivery target is not part
/// of the configuration surface; it is passed to
/// [`Queue::start`](crate::Queue::start) directly.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Total delivery attempts per message before giving up, counting the
    /// attempt made at ingress.
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,

    /// Number of concurrent retry workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Spool directory. Defaults to `<state dir>/<instance name>`, where
    /// the state dir comes from `COURIER_STATE` or `/var/lib/courier`.
    #[serde(default)]
    pub location: Option<PathBuf>,

    /// Emit per-attempt breakdowns to the log.
    #[serde(default)]
    pub debug: bool,

    /// Delay before the first retry. Note that the first re-arm computed by
    /// a worker is `initial_retry_delay * retry_scale^2`.
    #[serde(skip, default = "default_initial_retry_delay")]
    pub initial_retry_delay: Duration,

    /// Base of the exponential backoff.
    #[serde(skip, default = "default_retry_scale")]
    pub retry_scale: f64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            workers: default_workers(),
            location: None,
            debug: false,
            initial_retry_delay: default_initial_retry_delay(),
            retry_scale: default_retry_scale(),
        }
    }
}

impl QueueConfig {
    /// The spool directory for the instance named `name`.
    #[must_use]
    pub fn location_for(&self, name: &str) -> PathBuf {
        self.location
            .clone()
            .unwrap_or_else(|| default_state_dir().join(name))
    }

    fn backoff(&self, exponent: u32) -> Duration {
        let factor = self
            .retry_scale
            .powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        let secs = (self.initial_retry_delay.as_secs_f64() * factor).min(BACKOFF_CEILING_SECS);
        Duration::from_secs_f64(secs)
    }

    /// When the retry armed at ingress is due: a flat `initial_retry_delay`
    /// after the failed first attempt.
    #[must_use]
    pub fn first_retry_due(&self, now: SystemTime) -> SystemTime {
        now + self.initial_retry_delay
    }

    /// When the next retry armed by a worker is due.
    ///
    /// `tries_count` is the already-incremented attempt count, so the first
    /// worker re-arm lands `initial_retry_delay * retry_scale^2` after the
    /// attempt.
    #[must_use]
    pub fn rearm_due(&self, tries_count: u32, now: SystemTime) -> SystemTime {
        now + self.backoff(tries_count)
    }

    /// When a message recovered from disk at startup is due.
    ///
    /// `initial_retry_delay * retry_scale^(tries_count - 1)` after its last
    /// attempt; if that instant already passed, a short grace period after
    /// startup instead.
    #[must_use]
    pub fn recovery_due(
        &self,
        last_attempt: SystemTime,
        tries_count: u32,
        now: SystemTime,
    ) -> SystemTime {
        let due = last_attempt + self.backoff(tries_count.saturating_sub(1));
        if due < now { now + RECOVERY_GRACE } else { due }
    }
}
