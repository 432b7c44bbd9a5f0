#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tg_broadcastbot::access::AccessGuard;
use tg_broadcastbot::compose::SessionStore;
use tg_broadcastbot::db::{BroadcastHistoryRepository, SqliteStore, SubscriberRepository};
use tg_broadcastbot::delivery::{DeliveryEngine, Transport};
use tg_broadcastbot::handlers::{Action, AppContext, Inbound, Sender};
use tg_broadcastbot::model::{BroadcastRecord, NewBroadcast, NewSubscriber};
use tokio::sync::Mutex;

pub async fn setup_store() -> Arc<SqliteStore> {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

pub fn subscriber(id: i64) -> NewSubscriber {
    NewSubscriber {
        id,
        username: Some(format!("user{}", id)),
        full_name: format!("User {}", id),
        joined_at: Utc::now(),
    }
}

pub async fn seed(store: &SqliteStore, ids: &[i64]) {
    for id in ids {
        store.register_if_absent(&subscriber(*id)).await.unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: i64, text: String },
    Image { to: i64, image_ref: String, caption: String },
}

impl Sent {
    pub fn recipient(&self) -> i64 {
        match self {
            Sent::Text { to, .. } | Sent::Image { to, .. } => *to,
        }
    }
}

/// Records every attempted send; recipients in `failing` get a transport error.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    failing: Arc<HashSet<i64>>,
    attempts: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingTransport {
    pub fn failing_for(ids: &[i64]) -> Self {
        Self {
            failing: Arc::new(ids.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub async fn attempts(&self) -> Vec<Sent> {
        self.attempts.lock().await.clone()
    }

    pub async fn attempts_to(&self, id: i64) -> Vec<Sent> {
        self.attempts()
            .await
            .into_iter()
            .filter(|s| s.recipient() == id)
            .collect()
    }

    fn outcome(&self, to: i64) -> Result<()> {
        if self.failing.contains(&to) {
            Err(anyhow!("Forbidden: bot was blocked by the user {}", to))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<()> {
        self.attempts.lock().await.push(Sent::Text {
            to: recipient,
            text: text.to_string(),
        });
        self.outcome(recipient)
    }

    async fn send_image(&self, recipient: i64, image_ref: &str, caption: &str) -> Result<()> {
        self.attempts.lock().await.push(Sent::Image {
            to: recipient,
            image_ref: image_ref.to_string(),
            caption: caption.to_string(),
        });
        self.outcome(recipient)
    }
}

/// History store whose writes always fail, as on a full disk.
#[derive(Clone, Default)]
pub struct BrokenHistory {
    appends: Arc<Mutex<usize>>,
}

impl BrokenHistory {
    pub async fn appends(&self) -> usize {
        *self.appends.lock().await
    }
}

#[async_trait::async_trait]
impl BroadcastHistoryRepository for BrokenHistory {
    async fn append_record(&self, _record: &NewBroadcast) -> Result<BroadcastRecord> {
        *self.appends.lock().await += 1;
        Err(anyhow!("database or disk is full"))
    }

    async fn recent_records(&self, _limit: u32) -> Result<Vec<BroadcastRecord>> {
        Ok(Vec::new())
    }
}

pub fn engine(store: &Arc<SqliteStore>, transport: &RecordingTransport) -> Arc<DeliveryEngine> {
    engine_with_history(store, store.clone(), transport)
}

pub fn engine_with_history(
    store: &Arc<SqliteStore>,
    history: Arc<dyn BroadcastHistoryRepository>,
    transport: &RecordingTransport,
) -> Arc<DeliveryEngine> {
    Arc::new(DeliveryEngine::new(
        store.clone(),
        history,
        Arc::new(transport.clone()),
        Duration::ZERO,
    ))
}

pub fn context(
    store: &Arc<SqliteStore>,
    transport: &RecordingTransport,
    admins: &[i64],
) -> AppContext {
    context_with_history(store, store.clone(), transport, admins)
}

pub fn context_with_history(
    store: &Arc<SqliteStore>,
    history: Arc<dyn BroadcastHistoryRepository>,
    transport: &RecordingTransport,
    admins: &[i64],
) -> AppContext {
    AppContext {
        guard: AccessGuard::new(admins.iter().copied()),
        sessions: SessionStore::new(),
        subscribers: store.clone(),
        history: history.clone(),
        engine: engine_with_history(store, history, transport),
        history_limit: 10,
    }
}

fn sender(id: i64) -> Sender {
    Sender {
        id,
        username: None,
        full_name: format!("User {}", id),
    }
}

pub fn text(from: i64, text: &str) -> Inbound {
    Inbound {
        from: sender(from),
        action: Action::Text(text.to_string()),
    }
}

pub fn photo(from: i64, file_id: &str) -> Inbound {
    Inbound {
        from: sender(from),
        action: Action::Image(file_id.to_string()),
    }
}

pub fn button(from: i64, data: &str) -> Inbound {
    Inbound {
        from: sender(from),
        action: Action::Callback(data.to_string()),
    }
}
