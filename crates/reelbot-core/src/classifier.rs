//! Link detection for the supported video platforms.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Platform;

/// A supported link found inside a chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlMatch {
    pub platform: Platform,
    pub url: String,
}

const INSTAGRAM_PATTERN: &str = r"(?i)https?://(?:www\.)?instagram\.com/(?:reels?|p|tv)/[\w-]+/?";
const TIKTOK_PATTERN: &str = r"(?i)https?://(?:www\.|vm\.|vt\.|m\.)?tiktok\.com/[@\w\-/.?=&]+";

fn matchers() -> &'static [(Platform, Regex)] {
    static MATCHERS: OnceLock<Vec<(Platform, Regex)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        // Order matters: the first platform whose pattern matches wins.
        [
            (Platform::Instagram, INSTAGRAM_PATTERN),
            (Platform::TikTok, TIKTOK_PATTERN),
        ]
        .into_iter()
        .map(|(platform, pattern)| {
            (
                platform,
                Regex::new(pattern).expect("platform url pattern is valid"),
            )
        })
        .collect()
    })
}

/// Find the first supported link in free-form text.
///
/// Returns the matched substring only; surrounding text is ignored.
pub fn classify(text: &str) -> Option<UrlMatch> {
    matchers().iter().find_map(|(platform, re)| {
        re.find(text).map(|m| UrlMatch {
            platform: *platform,
            url: m.as_str().to_string(),
        })
    })
}
