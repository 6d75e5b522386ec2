//! Message-to-video pipeline: link detection, download, upload, telemetry.
//!
//! Chat adapters convert their updates into [`IncomingText`] / command calls and
//! leave everything else to [`Relay`].

use std::sync::Arc;

use crate::{
    classifier,
    config::Config,
    domain::{ChatId, MessageId, MessageRef, UserId},
    download::{
        error::{truncate_chars, RAW_MESSAGE_LIMIT},
        AttemptOutcome, ClassifiedError, DownloadRequest, FetchReport, Orchestrator,
    },
    formatting,
    messaging::MessagingPort,
    probe::MediaProbe,
    telemetry::{DownloadEvent, TelemetryEvent, TelemetryQueue},
    Result,
};

/// A plain text message as seen by the relay.
#[derive(Clone, Debug)]
pub struct IncomingText {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub message_id: MessageId,
    pub text: String,
}

/// What happened to one incoming message.
#[derive(Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// No supported link in the text.
    Ignored,
    /// The video was uploaded as a reply.
    Delivered,
    /// Every attempt failed; the user saw the classified error.
    DownloadFailed(ClassifiedError),
    /// The file was downloaded but could not be sent back.
    SendFailed,
}

#[derive(Clone, Copy, Debug)]
pub struct RelaySettings {
    pub admin_user_id: Option<i64>,
    pub stats_window_days: u32,
}

impl RelaySettings {
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_user_id == Some(user_id.0)
    }
}

impl From<&Config> for RelaySettings {
    fn from(cfg: &Config) -> Self {
        Self {
            admin_user_id: cfg.admin_user_id,
            stats_window_days: cfg.stats_window_days,
        }
    }
}

pub struct Relay {
    orchestrator: Arc<Orchestrator>,
    probe: Arc<dyn MediaProbe>,
    messenger: Arc<dyn MessagingPort>,
    telemetry: Arc<TelemetryQueue>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        probe: Arc<dyn MediaProbe>,
        messenger: Arc<dyn MessagingPort>,
        telemetry: Arc<TelemetryQueue>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            orchestrator,
            probe,
            messenger,
            telemetry,
            settings,
        }
    }

    pub async fn handle_start(&self, chat_id: ChatId) -> Result<()> {
        self.messenger
            .send_html(chat_id, &formatting::escape_html(formatting::START_MESSAGE))
            .await?;
        Ok(())
    }

    pub async fn handle_help(&self, chat_id: ChatId) -> Result<()> {
        self.messenger.send_html(chat_id, formatting::HELP_MESSAGE).await?;
        Ok(())
    }

    /// Admin-only usage summary. Other users get no reply at all.
    pub async fn handle_stats(&self, chat_id: ChatId, user_id: UserId) -> Result<()> {
        if !self.settings.is_admin(user_id) {
            tracing::debug!(user_id = user_id.0, "ignoring /stats from non-admin user");
            return Ok(());
        }

        tracing::info!(user_id = user_id.0, "stats requested");
        let status = self
            .messenger
            .send_html(chat_id, formatting::STATS_LOADING)
            .await?;

        let window = self.settings.stats_window_days;
        let text = match self.telemetry.sink().aggregate_stats(window).await {
            Ok(Some(stats)) => {
                tracing::info!(total = stats.total, success = stats.success, "stats retrieved");
                formatting::format_stats_message(&stats, window)
            }
            Ok(None) => {
                tracing::warn!("stats unavailable, telemetry may not be configured");
                formatting::STATS_UNAVAILABLE.to_string()
            }
            Err(e) => {
                tracing::error!("failed to aggregate stats: {e}");
                formatting::STATS_FAILED.to_string()
            }
        };

        self.messenger.edit_html(status, &text).await
    }

    pub async fn handle_text(&self, msg: IncomingText) -> RelayOutcome {
        let Some(found) = classifier::classify(&msg.text) else {
            return RelayOutcome::Ignored;
        };
        tracing::info!(
            platform = %found.platform,
            url = %found.url,
            chat_id = msg.chat_id.0,
            "detected video link"
        );

        let status = match self
            .messenger
            .reply_text(msg.chat_id, msg.message_id, formatting::DOWNLOADING)
            .await
        {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(chat_id = msg.chat_id.0, "failed to send status message: {e}");
                None
            }
        };

        let req = DownloadRequest::from_match(&found);
        let report = self.orchestrator.fetch_with_report(&req).await;
        let raw_error = last_raw_error(&report);
        // Stamped on completion, so the Date column reflects the outcome.
        let event = DownloadEvent::now(msg.user_id, msg.chat_id, found.platform, found.url);

        let media = match report.result {
            Ok(media) => media,
            Err(err) => {
                self.show(&msg, status, &formatting::user_error_message(&err)).await;
                self.telemetry.record(TelemetryEvent::Error {
                    event,
                    error_message: raw_error.unwrap_or_else(|| err.to_string()),
                });
                return RelayOutcome::DownloadFailed(err);
            }
        };

        let dimensions = self.probe.probe(media.path()).await;
        if let Err(e) = self
            .messenger
            .reply_video(msg.chat_id, msg.message_id, media.path(), dimensions)
            .await
        {
            tracing::error!(
                chat_id = msg.chat_id.0,
                file = %media.file_name(),
                "failed to send video: {e}"
            );
            self.show(&msg, status, formatting::INTERNAL_ERROR).await;
            let error_message = format!("failed to send video: {e}");
            self.telemetry.record(TelemetryEvent::Error {
                event,
                error_message: truncate_chars(&error_message, RAW_MESSAGE_LIMIT),
            });
            discard(media).await;
            return RelayOutcome::SendFailed;
        }

        if let Some(status) = status {
            if let Err(e) = self.messenger.delete_message(status).await {
                tracing::warn!(chat_id = msg.chat_id.0, "failed to delete status message: {e}");
            }
        }
        self.telemetry.record(TelemetryEvent::Success(event));
        discard(media).await;
        RelayOutcome::Delivered
    }

    /// Put `html` where the user will see it: in the status message if there is one,
    /// otherwise as a fresh reply.
    async fn show(&self, msg: &IncomingText, status: Option<MessageRef>, html: &str) {
        let res = match status {
            Some(status) => self.messenger.edit_html(status, html).await,
            None => self
                .messenger
                .reply_text(msg.chat_id, msg.message_id, html)
                .await
                .map(|_| ()),
        };
        if let Err(e) = res {
            tracing::warn!(chat_id = msg.chat_id.0, "failed to report result to chat: {e}");
        }
    }
}

fn last_raw_error(report: &FetchReport) -> Option<String> {
    report.attempts.iter().rev().find_map(|a| match &a.outcome {
        AttemptOutcome::Failure(raw) => Some(truncate_chars(raw.trim(), RAW_MESSAGE_LIMIT)),
        AttemptOutcome::Success(_) => None,
    })
}

async fn discard(media: crate::download::MediaFile) {
    let path = media.path().to_path_buf();
    if let Err(e) = media.remove().await {
        tracing::warn!(file = %path.display(), "failed to remove downloaded file: {e}");
    }
}
