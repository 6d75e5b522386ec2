use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Days, NaiveDate};

/// Error kinds listed in the summary.
const TOP_ERRORS: usize = 5;
/// Days listed in the per-day breakdown.
const DAILY_ROWS: usize = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Error,
    Other,
}

impl RecordStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "success" => RecordStatus::Success,
            "error" => RecordStatus::Error,
            _ => RecordStatus::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Error => "error",
            RecordStatus::Other => "other",
        }
    }
}

/// One stored telemetry row, as read back from the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageRecord {
    pub date: NaiveDate,
    pub chat_id: String,
    pub status: RecordStatus,
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: usize,
    pub success: usize,
    pub errors: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub unique_chats: usize,
    /// Most frequent error messages, most common first.
    pub top_error_types: Vec<(String, usize)>,
    /// Newest day first.
    pub daily_breakdown: Vec<DailyStats>,
}

/// Summarize the records dated within the last `window_days` days (inclusive of `today`).
pub fn aggregate(records: &[UsageRecord], window_days: u32, today: NaiveDate) -> UsageStats {
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(window_days)))
        .unwrap_or(NaiveDate::MIN);
    let in_window: Vec<&UsageRecord> = records.iter().filter(|r| r.date >= cutoff).collect();

    let mut stats = UsageStats {
        total: in_window.len(),
        ..UsageStats::default()
    };

    let mut chats = HashSet::new();
    // message -> (count, first seen) so ties keep first-seen order.
    let mut error_counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut daily: BTreeMap<NaiveDate, DailyStats> = BTreeMap::new();

    for (idx, r) in in_window.iter().enumerate() {
        chats.insert(r.chat_id.as_str());

        match r.status {
            RecordStatus::Success => stats.success += 1,
            RecordStatus::Error => {
                stats.errors += 1;
                if let Some(msg) = r.error_message.as_deref().filter(|m| !m.is_empty()) {
                    error_counts.entry(msg).or_insert((0, idx)).0 += 1;
                }
            }
            RecordStatus::Other => {}
        }

        let day = daily.entry(r.date).or_insert_with(|| DailyStats {
            date: r.date,
            total: 0,
            success: 0,
            errors: 0,
        });
        day.total += 1;
        if r.status == RecordStatus::Success {
            day.success += 1;
        } else {
            day.errors += 1;
        }
    }

    stats.unique_chats = chats.len();

    let mut errors: Vec<(&str, (usize, usize))> = error_counts.into_iter().collect();
    errors.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    stats.top_error_types = errors
        .into_iter()
        .take(TOP_ERRORS)
        .map(|(msg, (count, _))| (msg.to_string(), count))
        .collect();

    stats.daily_breakdown = daily.into_values().rev().take(DAILY_ROWS).collect();
    stats
}
