use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use tokio::time::{sleep, timeout};
use uuid::Uuid;

use crate::{classifier::UrlMatch, domain::Platform};

use super::{
    error::{AttemptFailure, ClassifiedError},
    media::{find_output, remove_attempt_files, MediaFile},
    tiers::RateTiers,
    tool::{FetchInvocation, FetchTool, BEST_FORMAT, EXT_PLACEHOLDER},
};

/// What to fetch. Built once per matched message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub platform: Platform,
    pub requires_proxy: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, platform: Platform) -> Self {
        Self {
            url: url.into(),
            platform,
            requires_proxy: platform.requires_proxy(),
        }
    }

    pub fn from_match(m: &UrlMatch) -> Self {
        Self::new(m.url.clone(), m.platform)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success(PathBuf),
    Failure(String),
}

/// Trace entry for one attempt of one orchestration call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadAttempt {
    pub attempt_index: u32,
    pub rate_tier: usize,
    pub rate_limit: String,
    pub outcome: AttemptOutcome,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
    pub tiers: RateTiers,
    /// Wall-clock limit for a single tool invocation.
    pub attempt_timeout: Duration,
    /// When false, private/unavailable/age/login/geo/inappropriate failures end the
    /// call immediately instead of burning the remaining attempts.
    pub retry_restricted: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            tiers: RateTiers::default(),
            attempt_timeout: Duration::from_secs(300),
            retry_restricted: true,
        }
    }
}

/// Result of one orchestration call plus the attempts that led to it.
#[derive(Debug)]
pub struct FetchReport {
    pub request_id: String,
    pub attempts: Vec<DownloadAttempt>,
    pub result: Result<MediaFile, ClassifiedError>,
}

/// Drives a [`FetchTool`] through bounded, strictly sequential retries.
///
/// Rate-limited failures move to the next (smaller) bandwidth tier; every other
/// failure is retried on the same tier. After the last attempt the classification
/// of the last failure is returned.
pub struct Orchestrator {
    tool: Arc<dyn FetchTool>,
    policy: RetryPolicy,
    temp_dir: PathBuf,
    proxy_url: Option<String>,
}

impl Orchestrator {
    pub fn new(
        tool: Arc<dyn FetchTool>,
        policy: RetryPolicy,
        temp_dir: PathBuf,
        proxy_url: Option<String>,
    ) -> Self {
        Self {
            tool,
            policy,
            temp_dir,
            proxy_url,
        }
    }

    pub async fn fetch(&self, req: &DownloadRequest) -> Result<MediaFile, ClassifiedError> {
        self.fetch_with_report(req).await.result
    }

    pub async fn fetch_with_report(&self, req: &DownloadRequest) -> FetchReport {
        let request_id = Uuid::new_v4().simple().to_string();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);
        let mut tier = 0usize;
        let mut n = 0u32;

        loop {
            let id = format!("{request_id}-{n}");
            let inv = self.invocation(req, &id, tier);
            tracing::info!(
                request = %request_id,
                attempt = n + 1,
                max_attempts,
                platform = %req.platform,
                rate_limit = %inv.rate_limit,
                proxy = inv.proxy.is_some(),
                "starting download attempt"
            );

            match self.attempt(&inv, &id).await {
                Ok(path) => {
                    tracing::info!(
                        request = %request_id,
                        attempt = n + 1,
                        file = %path.display(),
                        "download succeeded"
                    );
                    attempts.push(DownloadAttempt {
                        attempt_index: n,
                        rate_tier: tier,
                        rate_limit: inv.rate_limit,
                        outcome: AttemptOutcome::Success(path.clone()),
                    });
                    return FetchReport {
                        request_id,
                        attempts,
                        result: Ok(MediaFile::new(path)),
                    };
                }
                Err(failure) => {
                    let raw = failure.raw_message();
                    let classified = ClassifiedError::classify(&raw);
                    tracing::warn!(
                        request = %request_id,
                        attempt = n + 1,
                        error = classified.label(),
                        raw = %raw,
                        "download attempt failed"
                    );
                    if let Err(e) = remove_attempt_files(&self.temp_dir, &id).await {
                        tracing::warn!(request = %request_id, "failed to clean partial files: {e}");
                    }
                    attempts.push(DownloadAttempt {
                        attempt_index: n,
                        rate_tier: tier,
                        rate_limit: inv.rate_limit,
                        outcome: AttemptOutcome::Failure(raw),
                    });

                    let last = n + 1 >= max_attempts;
                    let give_up =
                        !self.policy.retry_restricted && classified.is_content_restricted();
                    if last || give_up {
                        tracing::warn!(
                            request = %request_id,
                            attempts = n + 1,
                            error = %classified,
                            "download failed"
                        );
                        return FetchReport {
                            request_id,
                            attempts,
                            result: Err(classified),
                        };
                    }

                    if classified.is_rate_limited() {
                        tier = self.policy.tiers.step_down(tier);
                    }
                    sleep(self.policy.backoff).await;
                    n += 1;
                }
            }
        }
    }

    fn invocation(&self, req: &DownloadRequest, id: &str, tier: usize) -> FetchInvocation {
        let proxy = if req.requires_proxy {
            if self.proxy_url.is_none() {
                tracing::warn!(platform = %req.platform, "proxy required but PROXY_URL is not set");
            }
            self.proxy_url.clone()
        } else {
            None
        };

        FetchInvocation {
            url: req.url.clone(),
            output_template: self.temp_dir.join(format!("{id}.{EXT_PLACEHOLDER}")),
            format: BEST_FORMAT.to_string(),
            rate_limit: self.policy.tiers.cap(tier).to_string(),
            proxy,
        }
    }

    async fn attempt(&self, inv: &FetchInvocation, id: &str) -> Result<PathBuf, AttemptFailure> {
        match timeout(self.policy.attempt_timeout, self.tool.run(inv)).await {
            Err(_) => return Err(AttemptFailure::TimedOut(self.policy.attempt_timeout)),
            Ok(Err(failure)) => return Err(failure),
            Ok(Ok(())) => {}
        }

        match find_output(&self.temp_dir, id).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => Err(AttemptFailure::NoOutputProduced),
            Err(e) => {
                tracing::warn!("failed to scan {}: {e}", self.temp_dir.display());
                Err(AttemptFailure::NoOutputProduced)
            }
        }
    }
}
