use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, Platform, UserId},
    Result,
};

use super::stats::UsageStats;

/// Who downloaded what, captured when the outcome is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadEvent {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub platform: Platform,
    pub url: String,
    pub at: DateTime<Utc>,
}

impl DownloadEvent {
    pub fn now(
        user_id: UserId,
        chat_id: ChatId,
        platform: Platform,
        url: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            chat_id,
            platform,
            url: url.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelemetryEvent {
    Success(DownloadEvent),
    Error {
        event: DownloadEvent,
        error_message: String,
    },
}

/// Where usage events end up (a spreadsheet in production).
///
/// Errors returned here are logged by the queue worker and never reach users.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn log_success(&self, event: &DownloadEvent) -> Result<()>;

    async fn log_error(&self, event: &DownloadEvent, error_message: &str) -> Result<()>;

    /// Aggregates over the last `window_days`; `None` when the sink cannot answer.
    async fn aggregate_stats(&self, window_days: u32) -> Result<Option<UsageStats>>;
}

/// Sink used when telemetry is not configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

#[async_trait]
impl TelemetrySink for NoopTelemetry {
    async fn log_success(&self, event: &DownloadEvent) -> Result<()> {
        tracing::debug!(platform = %event.platform, "telemetry disabled, skipping success event");
        Ok(())
    }

    async fn log_error(&self, event: &DownloadEvent, _error_message: &str) -> Result<()> {
        tracing::debug!(platform = %event.platform, "telemetry disabled, skipping error event");
        Ok(())
    }

    async fn aggregate_stats(&self, _window_days: u32) -> Result<Option<UsageStats>> {
        Ok(None)
    }
}
