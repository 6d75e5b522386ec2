//! Core domain + application logic for the reel relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, yt-dlp/ffprobe and the
//! Google Sheets telemetry sink live behind ports (traits) implemented in adapter crates.

pub mod classifier;
pub mod config;
pub mod domain;
pub mod download;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod probe;
pub mod relay;
pub mod telemetry;

pub use errors::{Error, Result};
