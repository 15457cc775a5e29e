//! Google Sheets outcome log.
//!
//! Authenticates with an OAuth refresh token, writes the header row into an
//! empty sheet, then appends one row per outcome.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::OutcomeLogError;
use crate::pipeline::types::{OutcomeLog, OutcomeStatus, QueryRecord};

pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Header row written into an empty sheet.
pub const HEADERS: [&str; 7] = [
    "Timestamp",
    "Title",
    "Publication",
    "Query",
    "Reply To",
    "Pitch",
    "Status",
];

/// Query and pitch cells are cut to this many characters.
pub const MAX_CELL_CHARS: usize = 500;

/// Sheets configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub refresh_token: SecretString,
    /// Target sheet (tab) name.
    pub sheet: String,
    pub token_url: String,
    pub api_base: String,
}

impl SheetsConfig {
    /// Returns `None` unless the spreadsheet id and all OAuth values are set
    /// (sheets logging disabled).
    pub fn from_env() -> Option<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Some(Self {
            spreadsheet_id: var("SHEETS_SPREADSHEET_ID")?,
            client_id: var("SHEETS_CLIENT_ID")?,
            client_secret: SecretString::from(var("SHEETS_CLIENT_SECRET")?),
            refresh_token: SecretString::from(var("SHEETS_REFRESH_TOKEN")?),
            sheet: var("SHEETS_RANGE").unwrap_or_else(|| "Sheet1".to_string()),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Outcome log backed by a Google Sheet.
pub struct SheetsOutcomeLog {
    config: SheetsConfig,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

/// Cut `text` to at most `max_chars` characters.
fn truncate_cell(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// One sheet row for an outcome.
pub fn outcome_row(
    query: &QueryRecord,
    pitch: &str,
    status: OutcomeStatus,
    at: DateTime<Utc>,
) -> Vec<String> {
    vec![
        at.format("%Y-%m-%d %H:%M:%S").to_string(),
        query.title.clone(),
        query.publication.clone(),
        truncate_cell(&query.query_text, MAX_CELL_CHARS),
        query.reply_to.clone().unwrap_or_default(),
        truncate_cell(pitch, MAX_CELL_CHARS),
        status.to_string(),
    ]
}

impl SheetsOutcomeLog {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Exchange the refresh token for an access token, reusing a cached one
    /// until shortly before it expires.
    async fn access_token(&self) -> Result<String, OutcomeLogError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now()
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("refresh_token", self.config.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| OutcomeLogError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutcomeLogError::Auth(format!("HTTP {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OutcomeLogError::Auth(format!("invalid token response: {e}")))?;

        // Refresh a minute early.
        let ttl = token.expires_in.unwrap_or(3600).saturating_sub(60);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        debug!(ttl, "Obtained Sheets access token");
        Ok(token.access_token)
    }

    /// `{api_base}/v4/spreadsheets/{id}/values/{range}`
    fn values_url(&self, range: &str) -> Result<Url, OutcomeLogError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| OutcomeLogError::Request(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| OutcomeLogError::Request("API base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.config.spreadsheet_id.as_str(),
                "values",
                range,
            ]);
        Ok(url)
    }

    async fn first_row(&self, token: &str) -> Result<Option<Vec<String>>, OutcomeLogError> {
        let url = self.values_url(&format!("{}!A1:G1", self.config.sheet))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| OutcomeLogError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutcomeLogError::Request(format!("HTTP {status}: {body}")));
        }

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| OutcomeLogError::Request(format!("invalid values response: {e}")))?;
        Ok(range.values.into_iter().next().filter(|row| !row.is_empty()))
    }

    async fn append(&self, token: &str, row: Vec<String>) -> Result<(), OutcomeLogError> {
        let mut url = self.values_url(&format!("{}!A1:append", self.config.sheet))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED");

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|e| OutcomeLogError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutcomeLogError::Request(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }

    /// Write headers into an empty sheet. A non-header first row is left
    /// alone with a warning.
    async fn ensure_headers(&self, token: &str) -> Result<(), OutcomeLogError> {
        match self.first_row(token).await? {
            None => {
                self.append(token, HEADERS.iter().map(|h| h.to_string()).collect())
                    .await?;
                info!(sheet = %self.config.sheet, "Added headers to empty sheet");
            }
            Some(row) if row.first().map(|c| c.trim()) != Some(HEADERS[0]) => {
                warn!(
                    sheet = %self.config.sheet,
                    first_cell = %row.first().map(String::as_str).unwrap_or_default(),
                    "First row does not look like headers; not overwriting"
                );
            }
            Some(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl OutcomeLog for SheetsOutcomeLog {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn record(
        &self,
        query: &QueryRecord,
        text: &str,
        status: OutcomeStatus,
    ) -> Result<(), OutcomeLogError> {
        let token = self.access_token().await?;
        self.ensure_headers(&token).await?;
        self.append(&token, outcome_row(query, text, status, Utc::now()))
            .await?;
        debug!(title = %query.title, %status, "Logged outcome to Google Sheets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(api_base: &str) -> SheetsConfig {
        SheetsConfig {
            spreadsheet_id: "sheet-id".into(),
            client_id: "client".into(),
            client_secret: SecretString::from("secret"),
            refresh_token: SecretString::from("refresh"),
            sheet: "Pitch Log".into(),
            token_url: format!("{api_base}/token"),
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn values_url_encodes_sheet_name() {
        let log = SheetsOutcomeLog::new(config("https://sheets.googleapis.com"));
        let url = log.values_url("Pitch Log!A1:G1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-id/values/Pitch%20Log!A1:G1"
        );
    }

    #[test]
    fn values_url_keeps_base_path() {
        let log = SheetsOutcomeLog::new(config("http://127.0.0.1:9000/mock/"));
        let url = log.values_url("Sheet1!A1:append").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/mock/v4/spreadsheets/sheet-id/values/Sheet1!A1:append"
        );
    }

    #[test]
    fn row_layout_and_truncation() {
        let query = QueryRecord {
            title: "Title".into(),
            publication: "Pub".into(),
            query_text: "q".repeat(600),
            reply_to: None,
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 5, 7).unwrap();
        let row = outcome_row(&query, &"é".repeat(501), OutcomeStatus::Skipped, at);

        assert_eq!(row.len(), HEADERS.len());
        assert_eq!(row[0], "2026-03-02 09:05:07");
        assert_eq!(row[3].chars().count(), 500);
        assert_eq!(row[4], "");
        assert_eq!(row[5].chars().count(), 500);
        assert_eq!(row[6], "Skipped");
    }
}
