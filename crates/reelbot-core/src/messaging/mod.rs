//! Outbound chat abstraction. Telegram implements it in `reelbot-telegram`.

pub mod port;

pub use port::MessagingPort;
