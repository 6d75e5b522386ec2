use teloxide::types::Message;

use reelbot_core::relay::{IncomingText, RelayOutcome};

use crate::router::AppState;

use super::{chat_id, message_id, sender_id};

pub async fn handle_text(msg: &Message, state: &AppState) {
    let Some(text) = msg.text() else {
        return;
    };

    let incoming = IncomingText {
        chat_id: chat_id(msg),
        user_id: sender_id(msg),
        message_id: message_id(msg),
        text: text.to_string(),
    };

    match state.relay.handle_text(incoming).await {
        RelayOutcome::Ignored => {}
        RelayOutcome::Delivered => {
            tracing::info!(chat_id = msg.chat.id.0, "video delivered");
        }
        RelayOutcome::DownloadFailed(err) => {
            tracing::warn!(chat_id = msg.chat.id.0, error = %err, "video not delivered");
        }
        RelayOutcome::SendFailed => {
            tracing::warn!(chat_id = msg.chat.id.0, "video downloaded but not sent");
        }
    }
}
