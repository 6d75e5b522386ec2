//! Google Sheets telemetry sink.
//!
//! One row per download outcome, appended through the Sheets v4 REST API. `/stats`
//! reads the whole range back and aggregates it in memory.
//!
//! Auth is an OAuth bearer token: given directly, minted from a service account key
//! through the JWT-bearer grant, or printed by an external command.

use std::{
    fmt,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{process::Command, sync::Mutex};

use reelbot_core::{
    config::Config,
    download::error::{truncate_chars, RAW_MESSAGE_LIMIT},
    errors::Error,
    telemetry::{aggregate, DownloadEvent, RecordStatus, TelemetrySink, UsageRecord, UsageStats},
    Result,
};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

const API_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Google access tokens live for an hour; refresh a bit earlier.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Lifetime requested for the signed assertion. Google caps it at one hour.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Column titles of the telemetry sheet, in row order.
pub const HEADER: [&str; 8] = [
    "Timestamp",
    "Date",
    "User ID",
    "Chat ID",
    "Platform",
    "URL",
    "Status",
    "Error Message",
];

/// Where the OAuth access token comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenSource {
    Static(String),
    /// Service account key JSON, as downloaded from the Cloud console.
    ServiceAccount(String),
    /// Command whose trimmed stdout is a token, e.g. `gcloud auth print-access-token`.
    Command(String),
}

// Tokens and keys stay out of logs.
impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(..)"),
            Self::ServiceAccount(_) => f.write_str("ServiceAccount(..)"),
            Self::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub range: String,
    pub token: TokenSource,
    pub api_base: String,
}

impl SheetsSettings {
    /// `None` when the spreadsheet or the token source is missing.
    pub fn from_config(cfg: &Config) -> Option<Self> {
        if !cfg.telemetry_configured() {
            return None;
        }
        let spreadsheet_id = cfg.sheets_spreadsheet_id.clone()?;
        let token = if let Some(token) = &cfg.sheets_access_token {
            TokenSource::Static(token.clone())
        } else if let Some(json) = &cfg.google_credentials_json {
            TokenSource::ServiceAccount(json.clone())
        } else {
            TokenSource::Command(cfg.sheets_token_command.clone()?)
        };
        Some(Self {
            spreadsheet_id,
            range: cfg.sheets_range.clone(),
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

struct ServiceAccount {
    client_email: String,
    key_id: Option<String>,
    key: EncodingKey,
    token_uri: String,
}

impl ServiceAccount {
    fn from_json(json: &str) -> Result<Self> {
        let raw: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid GOOGLE_CREDENTIALS_JSON: {e}")))?;
        let key = EncodingKey::from_rsa_pem(raw.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("invalid service account private key: {e}")))?;
        Ok(Self {
            client_email: raw.client_email,
            key_id: raw.private_key_id,
            key,
            token_uri: raw.token_uri.unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
        })
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

enum Auth {
    Static(String),
    ServiceAccount(ServiceAccount),
    Command(String),
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: [&'a [String]; 1],
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct SheetsTelemetry {
    http: reqwest::Client,
    settings: SheetsSettings,
    auth: Auth,
    token: Mutex<Option<CachedToken>>,
}

impl SheetsTelemetry {
    pub fn new(settings: SheetsSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent("reelbot/0.1")
            .build()
            .map_err(|e| Error::Telemetry(format!("failed to build http client: {e}")))?;

        let auth = match &settings.token {
            TokenSource::Static(token) => Auth::Static(token.clone()),
            TokenSource::ServiceAccount(json) => {
                let account = ServiceAccount::from_json(json)?;
                tracing::info!(
                    account = %account.client_email,
                    "using service account for sheets"
                );
                Auth::ServiceAccount(account)
            }
            TokenSource::Command(cmd) => Auth::Command(cmd.clone()),
        };

        Ok(Self {
            http,
            settings,
            auth,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        if let Auth::Static(token) = &self.auth {
            return Ok(token.clone());
        }

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.expires_at) {
            return Ok(token.value.clone());
        }

        let fresh = match &self.auth {
            Auth::Static(token) => return Ok(token.clone()),
            Auth::ServiceAccount(account) => self.exchange_assertion(account).await?,
            Auth::Command(cmd) => CachedToken {
                value: run_token_command(cmd).await?,
                expires_at: Instant::now() + TOKEN_TTL,
            },
        };
        let value = fresh.value.clone();
        *cached = Some(fresh);
        tracing::debug!("refreshed sheets access token");
        Ok(value)
    }

    /// Signs an RS256 assertion and trades it for an access token.
    async fn exchange_assertion(&self, account: &ServiceAccount) -> Result<CachedToken> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &account.client_email,
            scope: SHEETS_SCOPE,
            aud: &account.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = account.key_id.clone();
        let assertion = jsonwebtoken::encode(&header, &claims, &account.key).map_err(|e| {
            Error::Telemetry(format!("failed to sign service account assertion: {e}"))
        })?;

        let resp = self
            .http
            .post(&account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Telemetry(format!("token exchange failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Telemetry(format!("token exchange returned {status}")));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Telemetry(format!("token exchange failed: {e}")))?;
        let body: TokenResponse = serde_json::from_slice(&bytes)?;

        let lifetime = body
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(TOKEN_TTL + TOKEN_REFRESH_MARGIN)
            .saturating_sub(TOKEN_REFRESH_MARGIN);
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    fn values_url(&self, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(&self.settings.api_base)
            .map_err(|e| Error::Config(format!("invalid sheets api base: {e}")))?;
        let range = format!("{}{suffix}", self.settings.range);
        url.path_segments_mut()
            .map_err(|_| Error::Config("sheets api base cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.settings.spreadsheet_id.as_str(),
                "values",
                range.as_str(),
            ]);
        Ok(url)
    }

    async fn append_row(&self, row: &[String]) -> Result<()> {
        let mut url = self.values_url(":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let token = self.access_token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&AppendBody { values: [row] })
            .send()
            .await
            .map_err(|e| Error::Telemetry(format!("sheets append failed: {e}")))?;

        self.check_status(resp.status(), "append").await
    }

    async fn read_rows(&self) -> Result<Vec<Vec<Value>>> {
        let url = self.values_url("")?;
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Telemetry(format!("sheets read failed: {e}")))?;

        self.check_status(resp.status(), "read").await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Telemetry(format!("sheets read failed: {e}")))?;
        let body: ValueRange = serde_json::from_slice(&bytes)?;
        Ok(body.values)
    }

    async fn check_status(&self, status: StatusCode, op: &str) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            self.forget_token().await;
        }
        Err(Error::Telemetry(format!("sheets {op} returned {status}")))
    }
}

#[async_trait]
impl TelemetrySink for SheetsTelemetry {
    async fn log_success(&self, event: &DownloadEvent) -> Result<()> {
        self.append_row(&build_row(event, RecordStatus::Success, None))
            .await?;
        tracing::debug!(platform = %event.platform, "logged successful download");
        Ok(())
    }

    async fn log_error(&self, event: &DownloadEvent, error_message: &str) -> Result<()> {
        self.append_row(&build_row(event, RecordStatus::Error, Some(error_message)))
            .await?;
        tracing::debug!(platform = %event.platform, "logged failed download");
        Ok(())
    }

    async fn aggregate_stats(&self, window_days: u32) -> Result<Option<UsageStats>> {
        let rows = self.read_rows().await?;
        tracing::debug!(rows = rows.len(), "fetched telemetry rows");
        if rows.is_empty() {
            return Ok(Some(UsageStats::default()));
        }

        let records = parse_records(&rows)?;
        Ok(Some(aggregate(
            &records,
            window_days,
            Utc::now().date_naive(),
        )))
    }
}

/// Row in [`HEADER`] order.
pub fn build_row(event: &DownloadEvent, status: RecordStatus, error: Option<&str>) -> Vec<String> {
    let error = match (status, error) {
        (RecordStatus::Error, Some(msg)) if !msg.trim().is_empty() => {
            truncate_chars(msg, RAW_MESSAGE_LIMIT)
        }
        (RecordStatus::Error, _) => "Unknown error".to_string(),
        _ => String::new(),
    };

    vec![
        event.at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
        event.at.format("%Y-%m-%d").to_string(),
        event.user_id.0.to_string(),
        event.chat_id.0.to_string(),
        event.platform.name().to_string(),
        event.url.clone(),
        status.as_str().to_string(),
        error,
    ]
}

/// Map sheet rows to records using the header row. Rows with an unreadable date
/// are skipped.
pub fn parse_records(rows: &[Vec<Value>]) -> Result<Vec<UsageRecord>> {
    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };

    let column = |name: &str| header.iter().position(|h| cell(Some(h)).trim() == name);
    let date_col = column("Date")
        .ok_or_else(|| Error::Telemetry("telemetry sheet has no Date column".to_string()))?;
    let chat_col = column("Chat ID");
    let status_col = column("Status");
    let error_col = column("Error Message");

    let mut out = Vec::with_capacity(data.len());
    for row in data {
        let get = |idx: Option<usize>| cell(idx.and_then(|i| row.get(i)));
        let Ok(date) = NaiveDate::parse_from_str(get(Some(date_col)).trim(), "%Y-%m-%d") else {
            continue;
        };
        let error = get(error_col);
        out.push(UsageRecord {
            date,
            chat_id: get(chat_col),
            status: RecordStatus::parse(&get(status_col)),
            error_message: (!error.is_empty()).then_some(error),
        });
    }
    Ok(out)
}

fn cell(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

async fn run_token_command(cmdline: &str) -> Result<String> {
    let mut parts = cmdline.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| Error::Config("GOOGLE_SHEETS_TOKEN_COMMAND is empty".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(parts).kill_on_drop(true);

    let out = tokio::time::timeout(TOKEN_COMMAND_TIMEOUT, cmd.output())
        .await
        .map_err(|_| Error::Telemetry("token command timed out".to_string()))?
        .map_err(|e| Error::Telemetry(format!("failed to run token command: {e}")))?;

    if !out.status.success() {
        return Err(Error::Telemetry(format!(
            "token command exited with {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let token = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if token.is_empty() {
        return Err(Error::Telemetry("token command printed nothing".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, TimeZone};
    use reelbot_core::domain::{ChatId, Platform, UserId};
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, body_string_contains, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn event() -> DownloadEvent {
        DownloadEvent {
            user_id: UserId(7),
            chat_id: ChatId(-100),
            platform: Platform::TikTok,
            url: "https://vm.tiktok.com/ZMabc/".to_string(),
            at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
        }
    }

    fn settings(base: &str, token: TokenSource) -> SheetsSettings {
        SheetsSettings {
            spreadsheet_id: "sheet123".to_string(),
            range: "Sheet1".to_string(),
            token,
            api_base: base.to_string(),
        }
    }

    fn static_sink(server: &MockServer) -> SheetsTelemetry {
        SheetsTelemetry::new(settings(&server.uri(), TokenSource::Static("tok".into()))).unwrap()
    }

    #[test]
    fn rows_follow_header_order() {
        let row = build_row(&event(), RecordStatus::Success, None);
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(
            row,
            vec![
                "2026-10-18T09:30:00.000000Z",
                "2026-10-18",
                "7",
                "-100",
                "TikTok",
                "https://vm.tiktok.com/ZMabc/",
                "success",
                "",
            ]
        );
    }

    #[test]
    fn error_rows_are_truncated_or_defaulted() {
        let long = "e".repeat(600);
        let row = build_row(&event(), RecordStatus::Error, Some(&long));
        assert_eq!(row[6], "error");
        assert_eq!(row[7].len(), RAW_MESSAGE_LIMIT);

        let row = build_row(&event(), RecordStatus::Error, Some("  "));
        assert_eq!(row[7], "Unknown error");
    }

    #[test]
    fn records_are_mapped_by_header() {
        let rows = vec![
            HEADER.iter().map(|h| json!(h)).collect::<Vec<_>>(),
            vec![
                json!("ts"),
                json!("2026-10-18"),
                json!(7),
                json!(-100),
                json!("Instagram"),
                json!("u"),
                json!("error"),
                json!("ERROR: private"),
            ],
            // Trailing empty cells are omitted by the API.
            vec![
                json!("ts"),
                json!("2026-10-17"),
                json!("7"),
                json!("5"),
                json!("TikTok"),
                json!("u"),
                json!("success"),
            ],
            vec![json!("ts"), json!("garbage")],
        ];
        let records = parse_records(&rows).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].chat_id, "-100");
        assert_eq!(records[0].status, RecordStatus::Error);
        assert_eq!(records[0].error_message.as_deref(), Some("ERROR: private"));
        assert_eq!(records[1].status, RecordStatus::Success);
        assert_eq!(records[1].error_message, None);
    }

    #[test]
    fn missing_date_column_is_an_error() {
        let rows = vec![vec![json!("Timestamp")], vec![json!("x")]];
        assert!(parse_records(&rows).is_err());
    }

    #[tokio::test]
    async fn append_posts_raw_row() {
        let server = MockServer::start().await;
        let expected = build_row(&event(), RecordStatus::Error, Some("HTTP Error 429"));
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet123/values/Sheet1:append"))
            .and(query_param("valueInputOption", "RAW"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({ "values": [expected] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sink = static_sink(&server);
        sink.log_error(&event(), "HTTP Error 429").await.unwrap();
    }

    #[tokio::test]
    async fn api_errors_surface_as_telemetry_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let sink = static_sink(&server);
        match sink.log_success(&event()).await {
            Err(Error::Telemetry(msg)) => assert!(msg.contains("403")),
            other => panic!("expected telemetry error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stats_aggregate_recent_rows() {
        let today = Utc::now().date_naive();
        let old = today.checked_sub_days(Days::new(90)).unwrap();
        let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet123/values/Sheet1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A1:H4",
                "values": [
                    HEADER,
                    ["t", fmt(today), "1", "10", "TikTok", "u", "success"],
                    ["t", fmt(today), "1", "11", "TikTok", "u", "error", "boom"],
                    ["t", fmt(old), "1", "12", "TikTok", "u", "success"],
                ]
            })))
            .mount(&server)
            .await;

        let sink = static_sink(&server);
        let stats = sink.aggregate_stats(30).await.unwrap().unwrap();
        assert_eq!((stats.total, stats.success, stats.errors), (2, 1, 1));
        assert_eq!(stats.unique_chats, 2);
        assert_eq!(stats.top_error_types, vec![("boom".to_string(), 1)]);
    }

    #[tokio::test]
    async fn empty_sheet_yields_empty_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Sheet1" })))
            .mount(&server)
            .await;

        let sink = static_sink(&server);
        assert_eq!(
            sink.aggregate_stats(30).await.unwrap(),
            Some(UsageStats::default())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn token_command_output_is_used_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer from-cmd"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let sink = SheetsTelemetry::new(settings(
            &server.uri(),
            TokenSource::Command("echo from-cmd".into()),
        ))
        .unwrap();
        sink.log_success(&event()).await.unwrap();
        assert!(sink.token.lock().await.is_some());
        sink.log_success(&event()).await.unwrap();
    }

    const TEST_KEY: &str = include_str!("testdata/service_account_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("testdata/service_account_key.pub.pem");

    fn service_account_json(token_uri: &str) -> String {
        json!({
            "type": "service_account",
            "project_id": "reelbot-test",
            "private_key_id": "key-1",
            "private_key": TEST_KEY,
            "client_email": "bot@reelbot-test.iam.gserviceaccount.com",
            "token_uri": token_uri,
        })
        .to_string()
    }

    #[tokio::test]
    async fn service_account_token_is_minted_and_cached() {
        let server = MockServer::start().await;
        let token_uri = format!("{}/token", server.uri());
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains(
                "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "sa-tok",
                "expires_in": 3599,
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet123/values/Sheet1:append"))
            .and(header("authorization", "Bearer sa-tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let sink = SheetsTelemetry::new(settings(
            &server.uri(),
            TokenSource::ServiceAccount(service_account_json(&token_uri)),
        ))
        .unwrap();
        sink.log_success(&event()).await.unwrap();
        sink.log_success(&event()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let exchange = requests.iter().find(|r| r.url.path() == "/token").unwrap();
        let form = Url::parse(&format!(
            "http://form/?{}",
            String::from_utf8_lossy(&exchange.body)
        ))
        .unwrap();
        let (_, assertion) = form.query_pairs().find(|(k, _)| k == "assertion").unwrap();

        let mut validation = jsonwebtoken::Validation::new(Algorithm::RS256);
        validation.set_audience(&[token_uri.as_str()]);
        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &assertion,
            &jsonwebtoken::DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();
        assert_eq!(decoded.header.kid.as_deref(), Some("key-1"));
        assert_eq!(decoded.claims["iss"], "bot@reelbot-test.iam.gserviceaccount.com");
        assert_eq!(decoded.claims["scope"], SHEETS_SCOPE);
    }

    #[tokio::test]
    async fn rejected_token_exchange_is_a_telemetry_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let sink = SheetsTelemetry::new(settings(
            &server.uri(),
            TokenSource::ServiceAccount(service_account_json(&format!("{}/token", server.uri()))),
        ))
        .unwrap();
        match sink.log_success(&event()).await {
            Err(Error::Telemetry(msg)) => assert!(msg.contains("400")),
            other => panic!("expected telemetry error, got {other:?}"),
        }
        assert!(sink.token.lock().await.is_none());
    }

    #[test]
    fn malformed_service_account_key_is_a_config_error() {
        let bad = [
            "not json".to_string(),
            json!({ "client_email": "a@b", "private_key": "nope" }).to_string(),
        ];
        for json in bad {
            let res = SheetsTelemetry::new(settings(
                "http://127.0.0.1:9",
                TokenSource::ServiceAccount(json),
            ));
            assert!(matches!(res, Err(Error::Config(_))));
        }
    }

    #[test]
    fn token_source_debug_hides_secrets() {
        let dbg = format!("{:?}", TokenSource::ServiceAccount(service_account_json("u")));
        assert_eq!(dbg, "ServiceAccount(..)");
        assert_eq!(format!("{:?}", TokenSource::Static("tok".into())), "Static(..)");
    }

    #[tokio::test]
    async fn failing_token_command_is_reported() {
        let sink = SheetsTelemetry::new(settings(
            "http://127.0.0.1:9",
            TokenSource::Command("/nonexistent/token-cmd".into()),
        ))
        .unwrap();
        assert!(matches!(
            sink.log_success(&event()).await,
            Err(Error::Telemetry(_))
        ));
    }
}
