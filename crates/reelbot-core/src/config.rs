use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    download::{RateTiers, RetryPolicy},
    errors::Error,
    Result,
};

/// Typed configuration for the relay bot.
///
/// Built once at startup and shared as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_user_id: Option<i64>,

    // External tools
    pub ytdlp_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub proxy_url: Option<String>,
    pub temp_dir: PathBuf,

    // Download retries
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub rate_tiers: RateTiers,
    pub attempt_timeout: Duration,
    pub retry_restricted: bool,
    pub probe_timeout: Duration,

    // Telemetry (Google Sheets)
    pub sheets_spreadsheet_id: Option<String>,
    pub sheets_range: String,
    pub sheets_access_token: Option<String>,
    pub sheets_token_command: Option<String>,
    /// Service account key JSON (the file contents, not a path).
    pub google_credentials_json: Option<String>,
    pub telemetry_queue_capacity: usize,
    pub stats_window_days: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_user_id = match env_str("ADMIN_USER_ID").and_then(non_empty) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("ADMIN_USER_ID must be a numeric user id, got {raw:?}"))
            })?),
            None => None,
        };

        let ytdlp_path = env_path("YTDLP_PATH")
            .or_else(|| which_in_path("yt-dlp"))
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        let ffprobe_path = env_path("FFPROBE_PATH")
            .or_else(|| which_in_path("ffprobe"))
            .unwrap_or_else(|| PathBuf::from("ffprobe"));
        let proxy_url = env_str("PROXY_URL").and_then(non_empty);

        let temp_dir = env_path("TEMP_DIR").unwrap_or_else(|| PathBuf::from("temp"));
        fs::create_dir_all(&temp_dir)?;

        let max_attempts = env_u32("DOWNLOAD_MAX_ATTEMPTS").unwrap_or(3);
        if max_attempts == 0 {
            return Err(Error::Config(
                "DOWNLOAD_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let retry_backoff = Duration::from_millis(env_u64("DOWNLOAD_BACKOFF_MS").unwrap_or(2_000));
        let rate_tiers = match env_str("RATE_LIMIT_TIERS").and_then(non_empty) {
            Some(raw) => RateTiers::parse(&raw)?,
            None => RateTiers::default(),
        };
        let attempt_timeout =
            Duration::from_secs(env_u64("DOWNLOAD_TIMEOUT_SECS").unwrap_or(300).max(1));
        let retry_restricted = env_bool("RETRY_RESTRICTED_CONTENT").unwrap_or(true);
        let probe_timeout = Duration::from_secs(env_u64("PROBE_TIMEOUT_SECS").unwrap_or(30).max(1));

        let sheets_spreadsheet_id = env_str("GOOGLE_SHEETS_SPREADSHEET_ID").and_then(non_empty);
        let sheets_range = env_str("GOOGLE_SHEETS_RANGE")
            .and_then(non_empty)
            .unwrap_or_else(|| "Sheet1".to_string());
        let sheets_access_token = env_str("GOOGLE_SHEETS_ACCESS_TOKEN").and_then(non_empty);
        let sheets_token_command = env_str("GOOGLE_SHEETS_TOKEN_COMMAND").and_then(non_empty);
        let google_credentials_json = env_str("GOOGLE_CREDENTIALS_JSON").and_then(non_empty);
        let telemetry_queue_capacity = env_usize("TELEMETRY_QUEUE_CAPACITY").unwrap_or(256).max(1);
        let stats_window_days = env_u32("STATS_WINDOW_DAYS").unwrap_or(30).max(1);

        Ok(Self {
            telegram_bot_token,
            admin_user_id,
            ytdlp_path,
            ffprobe_path,
            proxy_url,
            temp_dir,
            max_attempts,
            retry_backoff,
            rate_tiers,
            attempt_timeout,
            retry_restricted,
            probe_timeout,
            sheets_spreadsheet_id,
            sheets_range,
            sheets_access_token,
            sheets_token_command,
            google_credentials_json,
            telemetry_queue_capacity,
            stats_window_days,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.retry_backoff,
            tiers: self.rate_tiers.clone(),
            attempt_timeout: self.attempt_timeout,
            retry_restricted: self.retry_restricted,
        }
    }

    /// Telemetry is enabled only when a spreadsheet and some way to get a token are configured.
    pub fn telemetry_configured(&self) -> bool {
        self.sheets_spreadsheet_id.is_some()
            && (self.sheets_access_token.is_some()
                || self.google_credentials_json.is_some()
                || self.sheets_token_command.is_some())
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }
        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_handles_quotes_comments_and_export() {
        let parsed = parse_dotenv(
            "# comment\n\nTELEGRAM_BOT_TOKEN=\"abc:def\"\nexport PROXY_URL='socks5://h:1'\nBROKEN\n=novalue\nADMIN_USER_ID = 42 \n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc:def".to_string()),
                ("PROXY_URL".to_string(), "socks5://h:1".to_string()),
                ("ADMIN_USER_ID".to_string(), "42".to_string()),
            ]
        );
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(parse_bool(v), "{v} should be truthy");
        }
        for v in ["0", "false", "no", ""] {
            assert!(!parse_bool(v), "{v} should be falsy");
        }
    }

    #[test]
    fn telemetry_requires_spreadsheet_and_token_source() {
        let mut cfg = test_config();
        assert!(!cfg.telemetry_configured());

        cfg.sheets_spreadsheet_id = Some("sheet".to_string());
        assert!(!cfg.telemetry_configured());

        cfg.sheets_token_command = Some("gcloud auth print-access-token".to_string());
        assert!(cfg.telemetry_configured());
    }

    #[test]
    fn service_account_key_enables_telemetry() {
        let mut cfg = test_config();
        cfg.sheets_spreadsheet_id = Some("sheet".to_string());
        cfg.google_credentials_json = Some("{}".to_string());
        assert!(cfg.telemetry_configured());
    }

    pub(crate) fn test_config() -> Config {
        Config {
            telegram_bot_token: "x".to_string(),
            admin_user_id: None,
            ytdlp_path: "/usr/bin/yt-dlp".into(),
            ffprobe_path: "/usr/bin/ffprobe".into(),
            proxy_url: None,
            temp_dir: "/tmp".into(),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            rate_tiers: RateTiers::default(),
            attempt_timeout: Duration::from_secs(300),
            retry_restricted: true,
            probe_timeout: Duration::from_secs(30),
            sheets_spreadsheet_id: None,
            sheets_range: "Sheet1".to_string(),
            sheets_access_token: None,
            sheets_token_command: None,
            google_credentials_json: None,
            telemetry_queue_capacity: 16,
            stats_window_days: 30,
        }
    }
}
