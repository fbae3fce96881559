use chrono::{DateTime, Utc};
use courier_common::DeliveryContext;
use serde::{Deserialize, Serialize};

use crate::types::MessageId;

/// The persisted record for a queued message.
///
/// Written next to the raw body under `<id>.meta`. The context's recipient
/// list holds only the recipients still eligible for another attempt;
/// recipients that failed permanently accumulate in `failed` and are never
/// retried. Schema evolution is additive: new optional fields default on
/// read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueMetadata {
    #[serde(rename = "ID")]
    pub id: MessageId,

    pub ctx: DeliveryContext,

    /// Recipients that permanently failed across all attempts so far.
    #[serde(default)]
    pub failed: Vec<String>,

    /// Number of delivery attempts already made. At least 1 once persisted:
    /// the first attempt happens before the record is written.
    pub tries_count: u32,

    /// When the most recent attempt was made.
    pub last_attempt: DateTime<Utc>,
}

impl QueueMetadata {
    /// Record for a message whose first attempt is being made now.
    pub fn new(id: MessageId, ctx: DeliveryContext) -> Self {
        Self {
            id,
            ctx,
            failed: Vec::new(),
            tries_count: 1,
            last_attempt: Utc::now(),
        }
    }

    /// Count one more attempt, made now.
    pub fn record_attempt(&mut self) {
        self.tries_count += 1;
        self.last_attempt = Utc::now();
    }
}
