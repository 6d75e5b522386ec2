//! Best-effort usage telemetry.
//!
//! The request path only ever talks to [`TelemetryQueue`]; sink latency and sink
//! failures stay on the background worker.

pub mod queue;
pub mod sink;
pub mod stats;

pub use queue::TelemetryQueue;
pub use sink::{DownloadEvent, NoopTelemetry, TelemetryEvent, TelemetrySink};
pub use stats::{aggregate, DailyStats, RecordStatus, UsageRecord, UsageStats};
