//! Resilient download orchestration around an external fetch tool.

pub mod error;
pub mod media;
pub mod orchestrator;
pub mod tiers;
pub mod tool;

pub use error::{AttemptFailure, ClassifiedError, ErrorCategory};
pub use media::MediaFile;
pub use orchestrator::{
    AttemptOutcome, DownloadAttempt, DownloadRequest, FetchReport, Orchestrator, RetryPolicy,
};
pub use tiers::RateTiers;
pub use tool::{FetchInvocation, FetchTool};
