//! Persistence: SQLite pool setup and the two repositories the core depends on.
//!
//! - `repo`: pool/migration helpers and `SqliteStore`, the SQL-backed
//!   implementation of both traits below.
//!
//! The broadcast flow only sees the traits, so tests and alternative stores can
//! be swapped in without touching the delivery engine or handlers.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::model::{BroadcastRecord, NewBroadcast, NewSubscriber, Subscriber, SubscriberStats};

pub mod repo;

pub use repo::{init_pool, run_migrations, Pool, SqliteStore};

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    /// Insert the subscriber unless the id is already known. Returns `true`
    /// when a new row was created; existing rows are left untouched.
    async fn register_if_absent(&self, subscriber: &NewSubscriber) -> Result<bool>;

    /// Snapshot of every subscriber, ordered by id.
    async fn list_all(&self) -> Result<Vec<Subscriber>>;

    /// Total subscriber count and how many joined on `today` (UTC calendar day).
    async fn stats(&self, today: NaiveDate) -> Result<SubscriberStats>;
}

#[async_trait]
pub trait BroadcastHistoryRepository: Send + Sync {
    async fn append_record(&self, record: &NewBroadcast) -> Result<BroadcastRecord>;

    /// Most recent records first.
    async fn recent_records(&self, limit: u32) -> Result<Vec<BroadcastRecord>>;
}
