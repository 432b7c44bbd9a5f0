//! Button labels, keyboards and every user-visible text of the bot.
//!
//! Keyboards are described by `Markup` so routing stays transport-agnostic;
//! `crate::telegram` turns them into Telegram reply markup.

use crate::model::{BroadcastRecord, DeliveryReport, SubscriberStats};

pub const BTN_STATS: &str = "📊 Stats";
pub const BTN_BROADCAST: &str = "📢 Broadcast";
pub const BTN_HISTORY: &str = "📨 History";
pub const BTN_KIND_TEXT: &str = "📝 Text";
pub const BTN_KIND_IMAGE: &str = "🖼 Text + photo";
pub const BTN_CANCEL: &str = "❌ Cancel";
pub const BTN_INFO: &str = "ℹ️ Info";
pub const BTN_SUBSCRIBE: &str = "🔔 Subscribe";

pub const BTN_CONFIRM_SEND: &str = "✅ Send";
pub const BTN_CONFIRM_CANCEL: &str = "❌ Cancel";
pub const CB_CONFIRM: &str = "broadcast_confirm";
pub const CB_CANCEL: &str = "broadcast_cancel";

pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    None,
    AdminMenu,
    UserMenu,
    KindMenu,
    Remove,
    Confirm,
}

impl Markup {
    /// Reply-keyboard rows, or `None` for markups that are not reply keyboards.
    pub fn keyboard_rows(self) -> Option<Vec<Vec<&'static str>>> {
        match self {
            Markup::AdminMenu => Some(vec![vec![BTN_STATS, BTN_BROADCAST], vec![BTN_HISTORY]]),
            Markup::UserMenu => Some(vec![vec![BTN_INFO, BTN_SUBSCRIBE]]),
            Markup::KindMenu => Some(vec![vec![BTN_KIND_TEXT, BTN_KIND_IMAGE], vec![BTN_CANCEL]]),
            Markup::None | Markup::Remove | Markup::Confirm => None,
        }
    }
}

pub fn greeting(full_name: &str, is_admin: bool) -> String {
    let name = escape_html(full_name);
    if is_admin {
        format!("Hello, administrator {}!", name)
    } else {
        format!("Welcome, {}!", name)
    }
}

pub const INFO_TEXT: &str =
    "This is a notification bot. Important announcements will be delivered here.";
pub const SUBSCRIBED_TEXT: &str = "You are subscribed to announcements!";
pub const FALLBACK_TEXT: &str = "Use the menu buttons:";
pub const CHOOSE_KIND_TEXT: &str = "Choose the broadcast type:";
pub const ASK_TEXT: &str = "Send the broadcast text:";
pub const ASK_TEXT_AFTER_IMAGE: &str = "Now send the broadcast text:";
pub const ASK_IMAGE: &str = "Send the photo for the broadcast:";
pub const EXPECT_CONFIRM_TEXT: &str = "Use the buttons under the preview to send or cancel.";
pub const CANCELLED_TEXT: &str = "Broadcast cancelled.";
pub const BUSY_TEXT: &str =
    "Another broadcast is still being delivered. Confirm again once it has finished.";
pub const HISTORY_WRITE_FAILED_NOTE: &str =
    "⚠️ The run could not be saved to the broadcast history.";
pub const HISTORY_EMPTY_TEXT: &str = "Broadcast history is empty.";

pub fn preview_text(text: &str) -> String {
    format!(
        "<b>Broadcast preview:</b>\n\n{}\n\nSend to all subscribers?",
        text
    )
}

pub fn started_text(recipients: usize) -> String {
    format!("🚀 Starting broadcast to {} subscribers...", recipients)
}

pub fn report_text(report: &DeliveryReport) -> String {
    let mut text = format!(
        "✅ Broadcast finished!\n\n✅ Delivered: {}\n❌ Failed: {}",
        report.success_count, report.failure_count
    );
    if report.record_id.is_none() {
        text.push_str("\n\n");
        text.push_str(HISTORY_WRITE_FAILED_NOTE);
    }
    text
}

pub fn stats_text(stats: &SubscriberStats) -> String {
    format!(
        "📊 <b>Bot statistics</b>\n\n👥 Total subscribers: <b>{}</b>\n🆕 New today: <b>{}</b>",
        stats.total, stats.joined_today
    )
}

pub fn history_text(records: &[BroadcastRecord]) -> String {
    if records.is_empty() {
        return HISTORY_EMPTY_TEXT.to_string();
    }
    let mut text = format!("📨 <b>Last {} broadcasts:</b>\n\n", records.len());
    for record in records {
        text.push_str(&format!(
            "📅 {}\n",
            record.sent_at.format("%Y-%m-%d %H:%M:%S")
        ));
        text.push_str(&format!(
            "📊 Delivered: {} subscribers\n",
            record.success_count
        ));
        if record.image_ref.is_some() {
            text.push_str("🖼 With photo\n");
        }
        text.push_str(&format!(
            "📝 Text: {}\n",
            escape_html(&truncate_chars(&record.text, PREVIEW_CHARS))
        ));
        text.push_str(&"─".repeat(30));
        text.push('\n');
    }
    text
}

/// Cut `text` to at most `max` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    teloxide::utils::html::escape(text)
}
