//! Telegram update handlers.
//!
//! Each handler converts the teloxide message into core types and hands it to the
//! relay. Failures are logged here; the dispatcher never sees an error.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use reelbot_core::domain::{ChatId, MessageId, UserId};

use crate::router::AppState;

mod commands;
mod text;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') && commands::handle_command(&msg, &state).await {
        return Ok(());
    }

    text::handle_text(&msg, &state).await;
    Ok(())
}

/// Sender of the message. Anonymous group admins and channel posts have no user,
/// so the sending chat stands in.
fn sender_id(msg: &Message) -> UserId {
    match msg.from() {
        Some(user) => UserId(user.id.0 as i64),
        None => UserId(msg.sender_chat().map(|c| c.id.0).unwrap_or(msg.chat.id.0)),
    }
}

fn chat_id(msg: &Message) -> ChatId {
    ChatId(msg.chat.id.0)
}

fn message_id(msg: &Message) -> MessageId {
    MessageId(msg.id.0)
}
