//! Transport-agnostic routing of inbound user actions.
//!
//! Every interaction registers the sender, then is routed by role: admins get
//! the stats/history views and the composition flow, everybody else the
//! regular menu. Admin-only actions from non-admins fall through to the
//! regular fallback reply, exactly as if they were unknown input.

use crate::access::AccessGuard;
use crate::compose::{BroadcastKind, ComposeInput, ComposeState, SessionStore, Step};
use crate::db::{BroadcastHistoryRepository, SubscriberRepository};
use crate::delivery::{DeliveryEngine, DeliveryPermit};
use crate::model::{DeliveryReport, Draft, NewSubscriber, Subscriber};
use crate::ui::{self, Markup};
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Text(String),
    Image(String),
    Callback(String),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub from: Sender,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Markup,
    /// When set the reply is sent as a photo with `text` as its caption.
    pub image_ref: Option<String>,
}

impl Reply {
    fn text(text: impl Into<String>, markup: Markup) -> Self {
        Self {
            text: text.into(),
            markup,
            image_ref: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Response {
    pub replies: Vec<Reply>,
    /// Short notice shown when answering a button press.
    pub notice: Option<String>,
    /// Background delivery run started by this input, if any.
    pub delivery: Option<JoinHandle<DeliveryReport>>,
}

impl Response {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            ..Default::default()
        }
    }

    fn notice(text: &str) -> Self {
        Self {
            notice: Some(text.to_string()),
            ..Default::default()
        }
    }
}

pub struct AppContext {
    pub guard: AccessGuard,
    pub sessions: SessionStore,
    pub subscribers: Arc<dyn SubscriberRepository>,
    pub history: Arc<dyn BroadcastHistoryRepository>,
    pub engine: Arc<DeliveryEngine>,
    pub history_limit: u32,
}

#[instrument(skip_all, fields(user_id = inbound.from.id))]
pub async fn handle(ctx: &AppContext, inbound: Inbound) -> Result<Response> {
    let from = &inbound.from;
    let created = ctx
        .subscribers
        .register_if_absent(&NewSubscriber {
            id: from.id,
            username: from.username.clone(),
            full_name: from.full_name.clone(),
            joined_at: Utc::now(),
        })
        .await?;
    if created {
        info!(user_id = from.id, "registered new subscriber");
    }

    let is_admin = ctx.guard.is_admin(from.id);
    let composing = is_admin && ctx.sessions.is_active(from.id).await;
    match inbound.action {
        Action::Callback(data) if is_admin => handle_callback(ctx, from.id, &data).await,
        Action::Callback(_) => Ok(Response::default()),
        Action::Text(text) if is_admin && is_cancel(&text) => {
            let step = ctx.sessions.apply(from.id, ComposeInput::Cancel).await;
            Ok(step_response(ctx, from.id, step).await)
        }
        Action::Text(text) if composing => {
            let step = ctx.sessions.apply(from.id, ComposeInput::Text(text)).await;
            Ok(step_response(ctx, from.id, step).await)
        }
        Action::Image(image_ref) if composing => {
            let step = ctx
                .sessions
                .apply(from.id, ComposeInput::Image(image_ref))
                .await;
            Ok(step_response(ctx, from.id, step).await)
        }
        Action::Other if composing => Ok(step_response(ctx, from.id, Step::Ignored).await),
        Action::Text(text) => route_menu(ctx, from, is_admin, text.trim()).await,
        Action::Image(_) | Action::Other => Ok(Response::reply(fallback(is_admin))),
    }
}

async fn route_menu(
    ctx: &AppContext,
    from: &Sender,
    is_admin: bool,
    text: &str,
) -> Result<Response> {
    let reply = match text {
        "/start" => {
            let markup = menu(is_admin);
            Reply::text(ui::greeting(&from.full_name, is_admin), markup)
        }
        ui::BTN_STATS | "/stats" if is_admin => {
            let stats = ctx.subscribers.stats(Utc::now().date_naive()).await?;
            Reply::text(ui::stats_text(&stats), Markup::None)
        }
        ui::BTN_HISTORY | "/history" if is_admin => {
            let records = ctx.history.recent_records(ctx.history_limit).await?;
            Reply::text(ui::history_text(&records), Markup::None)
        }
        ui::BTN_BROADCAST | "/broadcast" if is_admin => {
            Reply::text(ui::CHOOSE_KIND_TEXT, Markup::KindMenu)
        }
        ui::BTN_KIND_TEXT if is_admin => {
            return begin(ctx, from.id, BroadcastKind::Text).await;
        }
        ui::BTN_KIND_IMAGE if is_admin => {
            return begin(ctx, from.id, BroadcastKind::TextWithImage).await;
        }
        ui::BTN_INFO | "/info" => Reply::text(ui::INFO_TEXT, Markup::None),
        ui::BTN_SUBSCRIBE | "/subscribe" => Reply::text(ui::SUBSCRIBED_TEXT, Markup::None),
        _ => fallback(is_admin),
    };
    Ok(Response::reply(reply))
}

async fn begin(ctx: &AppContext, admin_id: i64, kind: BroadcastKind) -> Result<Response> {
    let step = ctx.sessions.apply(admin_id, ComposeInput::Begin(kind)).await;
    Ok(step_response(ctx, admin_id, step).await)
}

async fn handle_callback(ctx: &AppContext, admin_id: i64, data: &str) -> Result<Response> {
    let awaiting = matches!(
        ctx.sessions.state(admin_id).await,
        ComposeState::AwaitingConfirmation(_)
    );
    match data {
        ui::CB_CONFIRM if awaiting => confirm(ctx, admin_id).await,
        ui::CB_CANCEL if awaiting => {
            let step = ctx.sessions.apply(admin_id, ComposeInput::Cancel).await;
            let mut response = step_response(ctx, admin_id, step).await;
            response.notice = Some(ui::CANCELLED_TEXT.to_string());
            Ok(response)
        }
        _ => Ok(Response::notice("Nothing to confirm.")),
    }
}

async fn confirm(ctx: &AppContext, admin_id: i64) -> Result<Response> {
    let Some(permit) = ctx.engine.try_acquire() else {
        warn!(admin_id, "confirm rejected: broadcast already running");
        let mut response = Response::reply(Reply::text(ui::BUSY_TEXT, Markup::None));
        response.notice = Some("Busy".to_string());
        return Ok(response);
    };

    let recipients = ctx.engine.snapshot().await?;
    let Step::Confirmed(draft) = ctx.sessions.apply(admin_id, ComposeInput::Confirm).await else {
        return Ok(Response::notice("Nothing to confirm."));
    };
    info!(admin_id, recipients = recipients.len(), "broadcast confirmed");
    let started = ui::started_text(recipients.len());
    let delivery = spawn_delivery(ctx.engine.clone(), permit, recipients, draft, admin_id);

    Ok(Response {
        replies: vec![Reply::text(started, Markup::Remove)],
        notice: Some("🚀 Starting broadcast...".to_string()),
        delivery: Some(delivery),
    })
}

fn spawn_delivery(
    engine: Arc<DeliveryEngine>,
    permit: DeliveryPermit,
    recipients: Vec<Subscriber>,
    draft: Draft,
    admin_id: i64,
) -> JoinHandle<DeliveryReport> {
    tokio::spawn(async move {
        let report = engine.deliver(&permit, &recipients, &draft).await;
        drop(permit);

        let text = ui::report_text(&report);
        if let Err(err) = engine.transport().send_text(admin_id, &text).await {
            warn!(?err, admin_id, "failed to report broadcast result");
        }
        report
    })
}

async fn step_response(ctx: &AppContext, admin_id: i64, step: Step) -> Response {
    let reply = match step {
        Step::AskImage => Reply::text(ui::ASK_IMAGE, Markup::Remove),
        Step::AskText { after_image: false } => Reply::text(ui::ASK_TEXT, Markup::Remove),
        Step::AskText { after_image: true } => Reply::text(ui::ASK_TEXT_AFTER_IMAGE, Markup::None),
        Step::Preview(draft) => Reply {
            text: ui::preview_text(&draft.text),
            markup: Markup::Confirm,
            image_ref: draft.image_ref,
        },
        Step::Cancelled => Reply::text(ui::CANCELLED_TEXT, Markup::Remove),
        Step::Ignored => reminder(&ctx.sessions.state(admin_id).await),
        // Confirmation is only reachable through `confirm`.
        Step::Confirmed(_) => return Response::default(),
    };
    Response::reply(reply)
}

fn reminder(state: &ComposeState) -> Reply {
    match state {
        ComposeState::Idle => fallback(true),
        ComposeState::CollectingImage => Reply::text(ui::ASK_IMAGE, Markup::None),
        ComposeState::CollectingText { .. } => Reply::text(ui::ASK_TEXT, Markup::None),
        ComposeState::AwaitingConfirmation(_) => Reply::text(ui::EXPECT_CONFIRM_TEXT, Markup::None),
    }
}

fn fallback(is_admin: bool) -> Reply {
    Reply::text(ui::FALLBACK_TEXT, menu(is_admin))
}

fn menu(is_admin: bool) -> Markup {
    if is_admin {
        Markup::AdminMenu
    } else {
        Markup::UserMenu
    }
}

fn is_cancel(text: &str) -> bool {
    matches!(text.trim(), "/cancel" | ui::BTN_CANCEL)
}
