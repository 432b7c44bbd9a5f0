use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A broadcast recipient. Rows are created on first contact and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscriber {
    #[sqlx(rename = "user_id")]
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub joined_at: DateTime<Utc>,
}

/// Identity captured from an inbound interaction, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscriber {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriberStats {
    pub total: i64,
    pub joined_today: i64,
}

/// One completed delivery run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BroadcastRecord {
    pub id: i64,
    pub text: String,
    pub image_ref: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub success_count: i64,
    pub failure_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBroadcast {
    pub text: String,
    pub image_ref: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub success_count: i64,
    pub failure_count: i64,
}

/// Finalized broadcast content, produced by the composition flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub text: String,
    pub image_ref: Option<String>,
}

/// Outcome of one delivery run, reported back to the initiating admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// History record of the run, `None` when writing it failed.
    pub record_id: Option<i64>,
    pub success_count: u64,
    pub failure_count: u64,
}

impl DeliveryReport {
    pub fn attempted(&self) -> u64 {
        self.success_count + self.failure_count
    }
}
