use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use tg_broadcastbot::access::AccessGuard;
use tg_broadcastbot::compose::SessionStore;
use tg_broadcastbot::config;
use tg_broadcastbot::db::{self, SqliteStore};
use tg_broadcastbot::delivery::DeliveryEngine;
use tg_broadcastbot::handlers::AppContext;
use tg_broadcastbot::telegram::{self, TelegramTransport};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.database_url());
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let bot = Bot::new(cfg.telegram.bot_token.clone());
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let engine = Arc::new(DeliveryEngine::new(
        store.clone(),
        store.clone(),
        transport,
        cfg.send_interval(),
    ));

    let ctx = Arc::new(AppContext {
        guard: AccessGuard::new(cfg.telegram.admins.iter().copied()),
        sessions: SessionStore::new(),
        subscribers: store.clone(),
        history: store,
        engine,
        history_limit: cfg.app.history_limit,
    });

    info!(admins = ctx.guard.len(), "starting telegram bot");
    Dispatcher::builder(bot, telegram::schema())
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
