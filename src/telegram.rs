//! Telegram glue: the teloxide-backed `Transport`, update conversion and reply rendering.
use crate::delivery::Transport;
use crate::handlers::{self, Action, AppContext, Inbound, Reply, Sender};
use crate::ui::{self, Markup};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters, SendPhotoSetters};
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
    KeyboardMarkup, KeyboardRemove, ParseMode, ReplyMarkup, User,
};
use tracing::{error, instrument, warn};

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, recipient: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(recipient), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn send_image(&self, recipient: i64, image_ref: &str, caption: &str) -> Result<()> {
        self.bot
            .send_photo(ChatId(recipient), InputFile::file_id(image_ref))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

#[instrument(skip_all)]
async fn on_message(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> ResponseResult<()> {
    let Some(inbound) = inbound_from_message(&msg) else {
        return respond(());
    };
    match handlers::handle(&ctx, inbound).await {
        Ok(response) => send_replies(&bot, msg.chat.id, &response.replies).await,
        Err(err) => error!(?err, "failed to handle message"),
    }
    respond(())
}

#[instrument(skip_all)]
async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<AppContext>) -> ResponseResult<()> {
    let inbound = Inbound {
        from: sender(&q.from),
        action: Action::Callback(q.data.clone().unwrap_or_default()),
    };
    let response = match handlers::handle(&ctx, inbound).await {
        Ok(response) => response,
        Err(err) => {
            error!(?err, "failed to handle callback");
            let _ = bot.answer_callback_query(q.id).await;
            return respond(());
        }
    };

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(notice) = response.notice.as_deref() {
        answer = answer.text(notice);
    }
    if let Err(err) = answer.await {
        warn!(?err, "failed to answer callback query");
    }

    if !response.replies.is_empty() {
        if let Some(preview) = &q.message {
            let _ = bot
                .edit_message_reply_markup(preview.chat.id, preview.id)
                .await;
        }
    }
    send_replies(&bot, ChatId(q.from.id.0 as i64), &response.replies).await;
    respond(())
}

/// Map a Telegram message to an inbound action. Messages without a sender are dropped.
pub fn inbound_from_message(msg: &Message) -> Option<Inbound> {
    let from = sender(msg.from()?);
    let action = if let Some(text) = msg.text() {
        Action::Text(text.to_string())
    } else if let Some(size) = msg.photo().and_then(|sizes| sizes.last()) {
        Action::Image(size.file.id.clone())
    } else {
        Action::Other
    };
    Some(Inbound { from, action })
}

fn sender(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        username: user.username.clone(),
        full_name: user.full_name(),
    }
}

async fn send_replies(bot: &Bot, chat_id: ChatId, replies: &[Reply]) {
    for reply in replies {
        if let Err(err) = send_reply(bot, chat_id, reply).await {
            warn!(?err, chat_id = chat_id.0, "failed to send reply");
        }
    }
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> ResponseResult<()> {
    let markup = reply_markup(reply.markup);
    match reply.image_ref.as_deref() {
        Some(image_ref) => {
            let mut req = bot
                .send_photo(chat_id, InputFile::file_id(image_ref))
                .caption(reply.text.as_str())
                .parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
        None => {
            let mut req = bot
                .send_message(chat_id, reply.text.as_str())
                .parse_mode(ParseMode::Html);
            if let Some(markup) = markup {
                req = req.reply_markup(markup);
            }
            req.await?;
        }
    }
    Ok(())
}

fn reply_markup(markup: Markup) -> Option<ReplyMarkup> {
    match markup {
        Markup::None => None,
        Markup::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
        Markup::Confirm => Some(ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(vec![
            vec![
                InlineKeyboardButton::callback(ui::BTN_CONFIRM_SEND, ui::CB_CONFIRM),
                InlineKeyboardButton::callback(ui::BTN_CONFIRM_CANCEL, ui::CB_CANCEL),
            ],
        ]))),
        keyboard => keyboard.keyboard_rows().map(|rows| {
            let buttons = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
            ReplyMarkup::Keyboard(KeyboardMarkup::new(buttons).resize_keyboard(true))
        }),
    }
}
