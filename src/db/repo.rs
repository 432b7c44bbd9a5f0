use super::{BroadcastHistoryRepository, SubscriberRepository};
use crate::model::{BroadcastRecord, NewBroadcast, NewSubscriber, Subscriber, SubscriberStats};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// SQLite-backed subscriber registry and broadcast history.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl SubscriberRepository for SqliteStore {
    #[instrument(skip_all, fields(user_id = subscriber.id))]
    async fn register_if_absent(&self, subscriber: &NewSubscriber) -> Result<bool> {
        let res = sqlx::query(
            "INSERT INTO subscribers (user_id, username, full_name, joined_at) VALUES (?, ?, ?, ?) ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(subscriber.id)
        .bind(subscriber.username.as_deref())
        .bind(&subscriber.full_name)
        .bind(subscriber.joined_at)
        .execute(&self.pool)
        .await
        .context("failed to register subscriber")?;
        Ok(res.rows_affected() == 1)
    }

    #[instrument(skip_all)]
    async fn list_all(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, Subscriber>(
            "SELECT user_id, username, full_name, joined_at FROM subscribers ORDER BY user_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list subscribers")?;
        Ok(rows)
    }

    #[instrument(skip_all)]
    async fn stats(&self, today: NaiveDate) -> Result<SubscriberStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, COALESCE(SUM(CASE WHEN date(joined_at) = ? THEN 1 ELSE 0 END), 0) AS joined_today FROM subscribers",
        )
        .bind(today.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await
        .context("failed to compute subscriber stats")?;
        Ok(SubscriberStats {
            total: row.get("total"),
            joined_today: row.get("joined_today"),
        })
    }
}

#[async_trait]
impl BroadcastHistoryRepository for SqliteStore {
    #[instrument(skip_all)]
    async fn append_record(&self, record: &NewBroadcast) -> Result<BroadcastRecord> {
        let id: i64 = sqlx::query(
            "INSERT INTO broadcasts (text, image_ref, sent_at, success_count, failure_count) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&record.text)
        .bind(record.image_ref.as_deref())
        .bind(record.sent_at)
        .bind(record.success_count)
        .bind(record.failure_count)
        .fetch_one(&self.pool)
        .await
        .context("failed to append broadcast record")?
        .get("id");

        Ok(BroadcastRecord {
            id,
            text: record.text.clone(),
            image_ref: record.image_ref.clone(),
            sent_at: record.sent_at,
            success_count: record.success_count,
            failure_count: record.failure_count,
        })
    }

    #[instrument(skip_all)]
    async fn recent_records(&self, limit: u32) -> Result<Vec<BroadcastRecord>> {
        let rows = sqlx::query_as::<_, BroadcastRecord>(
            "SELECT id, text, image_ref, sent_at, success_count, failure_count FROM broadcasts ORDER BY id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to load broadcast history")?;
        Ok(rows)
    }
}
