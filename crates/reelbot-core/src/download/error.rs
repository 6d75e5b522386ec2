use std::{fmt, time::Duration};

/// Upper bound on raw diagnostic text kept for display and telemetry.
pub const RAW_MESSAGE_LIMIT: usize = 500;

/// Stable category derived from the downloader's free-text diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifiedError {
    RateLimited,
    PrivateContent,
    Unavailable,
    AgeRestricted,
    LoginRequired,
    GeoRestricted,
    Inappropriate,
    Unknown(String),
}

/// Coarse grouping used by the retry loop and for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimited,
    ContentRestricted,
    Unknown,
}

type Matcher = fn(&str) -> bool;

// Checked top to bottom; the first group that matches decides the category.
const PRIORITY: &[(Matcher, fn() -> ClassifiedError)] = &[
    (|m| m.contains("inappropriate"), || ClassifiedError::Inappropriate),
    (|m| m.contains("private"), || ClassifiedError::PrivateContent),
    (
        |m| {
            m.contains("unavailable")
                || m.contains("not available")
                || m.contains("removed")
                || m.contains("does not exist")
        },
        || ClassifiedError::Unavailable,
    ),
    (
        |m| m.contains("age") && m.contains("restrict"),
        || ClassifiedError::AgeRestricted,
    ),
    (
        |m| {
            m.contains("login")
                || m.contains("log in")
                || m.contains("logged-in")
                || m.contains("sign in")
                || m.contains("cookies")
        },
        || ClassifiedError::LoginRequired,
    ),
    (
        |m| m.contains("geo") || m.contains("region") || m.contains("country"),
        || ClassifiedError::GeoRestricted,
    ),
    (
        |m| {
            m.contains("429")
                || m.contains("rate limit")
                || m.contains("rate-limit")
                || m.contains("too many requests")
        },
        || ClassifiedError::RateLimited,
    ),
];

impl ClassifiedError {
    /// Classify raw diagnostic text. Pure: the same text always yields the same category.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        PRIORITY
            .iter()
            .find(|(matches, _)| matches(&lower))
            .map(|(_, build)| build())
            .unwrap_or_else(|| {
                ClassifiedError::Unknown(truncate_chars(raw.trim(), RAW_MESSAGE_LIMIT))
            })
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ClassifiedError::RateLimited => ErrorCategory::RateLimited,
            ClassifiedError::Unknown(_) => ErrorCategory::Unknown,
            _ => ErrorCategory::ContentRestricted,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.category() == ErrorCategory::RateLimited
    }

    pub fn is_content_restricted(&self) -> bool {
        self.category() == ErrorCategory::ContentRestricted
    }

    /// Short machine-friendly label, used in logs and as the telemetry error text
    /// for known categories.
    pub fn label(&self) -> &'static str {
        match self {
            ClassifiedError::RateLimited => "rate_limited",
            ClassifiedError::PrivateContent => "private_content",
            ClassifiedError::Unavailable => "unavailable",
            ClassifiedError::AgeRestricted => "age_restricted",
            ClassifiedError::LoginRequired => "login_required",
            ClassifiedError::GeoRestricted => "geo_restricted",
            ClassifiedError::Inappropriate => "inappropriate",
            ClassifiedError::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifiedError::Unknown(raw) => write!(f, "unknown: {raw}"),
            other => f.write_str(other.label()),
        }
    }
}

impl std::error::Error for ClassifiedError {}

/// Why a single attempt failed, before classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The tool could not be started at all.
    Spawn(String),
    /// The tool ran and exited non-zero.
    Exit { code: Option<i32>, stderr: String },
    /// The tool exceeded the per-attempt wall-clock limit and was killed.
    TimedOut(Duration),
    /// Exit status 0 but nothing matching the attempt's output prefix appeared.
    NoOutputProduced,
}

impl AttemptFailure {
    /// Diagnostic text fed to [`ClassifiedError::classify`].
    pub fn raw_message(&self) -> String {
        match self {
            AttemptFailure::Spawn(msg) => format!("failed to start downloader: {msg}"),
            AttemptFailure::Exit { code, stderr } => {
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    return stderr.to_string();
                }
                match code {
                    Some(code) => format!("downloader exited with code {code}"),
                    None => "downloader was terminated by a signal".to_string(),
                }
            }
            AttemptFailure::TimedOut(d) => {
                format!("downloader timed out after {d:?}")
            }
            AttemptFailure::NoOutputProduced => "No file was downloaded".to_string(),
        }
    }

    pub fn classify(&self) -> ClassifiedError {
        ClassifiedError::classify(&self.raw_message())
    }
}

/// Truncate to at most `max` characters (not bytes), never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_groups_map_to_categories() {
        let cases = [
            ("ERROR: This content may be inappropriate", ClassifiedError::Inappropriate),
            ("ERROR: [Instagram] abc: This account is private", ClassifiedError::PrivateContent),
            ("ERROR: Video unavailable", ClassifiedError::Unavailable),
            ("ERROR: Requested content is not available", ClassifiedError::Unavailable),
            ("ERROR: This post has been removed", ClassifiedError::Unavailable),
            ("ERROR: Age-restricted video", ClassifiedError::AgeRestricted),
            ("ERROR: login required", ClassifiedError::LoginRequired),
            ("ERROR: Sign in to confirm your age", ClassifiedError::LoginRequired),
            ("ERROR: Use --cookies to authenticate", ClassifiedError::LoginRequired),
            ("ERROR: not playable in your country", ClassifiedError::GeoRestricted),
            ("ERROR: geo restriction", ClassifiedError::GeoRestricted),
            ("ERROR: HTTP Error 429: Too Many Requests", ClassifiedError::RateLimited),
            ("ERROR: rate limit exceeded", ClassifiedError::RateLimited),
        ];
        for (raw, expected) in cases {
            assert_eq!(ClassifiedError::classify(raw), expected, "for {raw:?}");
        }
    }

    #[test]
    fn earlier_group_wins_on_ambiguous_text() {
        let raw = "This video is private or unavailable";
        for _ in 0..3 {
            assert_eq!(ClassifiedError::classify(raw), ClassifiedError::PrivateContent);
        }
        assert_eq!(
            ClassifiedError::classify("inappropriate content, private account"),
            ClassifiedError::Inappropriate
        );
        assert_eq!(
            ClassifiedError::classify("HTTP Error 429, please log in"),
            ClassifiedError::LoginRequired
        );
    }

    #[test]
    fn age_requires_both_keywords() {
        assert_eq!(
            ClassifiedError::classify("Restricted Video: you must be 18"),
            ClassifiedError::Unknown("Restricted Video: you must be 18".to_string())
        );
    }

    #[test]
    fn unknown_keeps_message_verbatim_but_bounded() {
        assert_eq!(
            ClassifiedError::classify("  ERROR: Unsupported URL  "),
            ClassifiedError::Unknown("ERROR: Unsupported URL".to_string())
        );

        let long = "ж".repeat(RAW_MESSAGE_LIMIT + 50);
        let ClassifiedError::Unknown(kept) = ClassifiedError::classify(&long) else {
            panic!("expected Unknown");
        };
        assert_eq!(kept.chars().count(), RAW_MESSAGE_LIMIT);
    }

    #[test]
    fn categories_group_variants() {
        assert_eq!(ClassifiedError::RateLimited.category(), ErrorCategory::RateLimited);
        assert!(ClassifiedError::GeoRestricted.is_content_restricted());
        assert!(ClassifiedError::Unavailable.is_content_restricted());
        assert_eq!(
            ClassifiedError::Unknown("x".into()).category(),
            ErrorCategory::Unknown
        );
    }

    #[test]
    fn attempt_failures_produce_raw_messages() {
        assert_eq!(
            AttemptFailure::NoOutputProduced.classify(),
            ClassifiedError::Unknown("No file was downloaded".to_string())
        );
        assert_eq!(
            AttemptFailure::Exit {
                code: Some(1),
                stderr: "ERROR: HTTP Error 429".to_string()
            }
            .classify(),
            ClassifiedError::RateLimited
        );
        assert_eq!(
            AttemptFailure::Exit {
                code: Some(2),
                stderr: "  ".to_string()
            }
            .raw_message(),
            "downloader exited with code 2"
        );
        assert_eq!(
            AttemptFailure::TimedOut(Duration::from_secs(300)).raw_message(),
            "downloader timed out after 300s"
        );
    }
}
