use std::path::PathBuf;

use async_trait::async_trait;

use super::error::AttemptFailure;

/// Format selector passed to the downloader.
pub const BEST_FORMAT: &str = "best";

/// Placeholder the downloader replaces with the real file extension.
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

/// One invocation of the external downloader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchInvocation {
    pub url: String,
    /// `<temp_dir>/<attempt id>.%(ext)s`
    pub output_template: PathBuf,
    pub format: String,
    pub rate_limit: String,
    pub proxy: Option<String>,
}

/// Port for the external downloader (yt-dlp in production).
///
/// Implementations run the tool to completion and report only exit status and
/// diagnostics; locating the produced file is the orchestrator's job. The returned
/// future may be dropped on timeout, so implementations must not leave the child
/// running when that happens.
#[async_trait]
pub trait FetchTool: Send + Sync {
    async fn run(&self, inv: &FetchInvocation) -> Result<(), AttemptFailure>;
}
