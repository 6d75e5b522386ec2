use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Dimensions, MessageId, MessageRef},
    Result,
};

/// Everything the relay needs to say back to a chat.
///
/// All text arguments are Telegram-flavoured HTML; callers escape user input.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Send `html` as a reply to `reply_to` in the same chat.
    async fn reply_text(&self, chat_id: ChatId, reply_to: MessageId, html: &str)
        -> Result<MessageRef>;

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Upload a local video file as a reply. Width/height are passed through when
    /// known so the client renders the correct aspect ratio.
    async fn reply_video(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        path: &Path,
        dimensions: Option<Dimensions>,
    ) -> Result<MessageRef>;
}
