//! HTTP client for a PostgREST-style REST API (e.g. Supabase)

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::{RemoteClient, RemoteError, RemoteResult};
use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::compact_text;

/// Remote client speaking the PostgREST dialect over `/rest/v1/{table}`
#[derive(Clone)]
pub struct PostgrestClient {
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for PostgrestClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PostgrestClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl PostgrestClient {
    /// Build a client from sync configuration.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base_url = config.normalized_remote_url()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| Error::InvalidInput(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            client,
        })
    }

    fn table_url(&self, kind: EntityKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(api_key) = &self.api_key {
            builder = builder.header("apikey", api_key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Upsert that keeps the existing row, so a replayed insert is a no-op.
    fn insert_request(&self, kind: EntityKind, record: &Value) -> reqwest::RequestBuilder {
        let url = format!("{}?on_conflict=id", self.table_url(kind));
        self.request(reqwest::Method::POST, &url)
            .header("Prefer", "resolution=ignore-duplicates,return=minimal")
            .json(record)
    }

    async fn send(builder: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

impl RemoteClient for PostgrestClient {
    async fn fetch_since(&self, kind: EntityKind, since: Option<&str>) -> RemoteResult<Vec<Value>> {
        let url = fetch_url(&self.table_url(kind), kind, since);
        let response = Self::send(self.request(reqwest::Method::GET, &url)).await?;
        let rows = response.json::<Vec<Value>>().await?;

        if let Some(bad) = rows.iter().find(|row| row.get("id").and_then(Value::as_str).is_none()) {
            return Err(RemoteError::InvalidResponse(format!(
                "{kind} row without string id: {}",
                compact_text(&bad.to_string())
            )));
        }

        tracing::debug!("Fetched {} {kind} row(s) since {since:?}", rows.len());
        Ok(rows)
    }

    async fn insert(&self, kind: EntityKind, record: &Value) -> RemoteResult<()> {
        Self::send(self.insert_request(kind, record)).await?;
        Ok(())
    }

    async fn update_partial(&self, kind: EntityKind, id: &str, patch: &Value) -> RemoteResult<()> {
        let url = format!("{}?id=eq.{}", self.table_url(kind), urlencoding::encode(id));
        let builder = self
            .request(reqwest::Method::PATCH, &url)
            .header("Prefer", "return=minimal")
            .json(patch);
        Self::send(builder).await?;
        Ok(())
    }
}

/// Incremental select: `col > since`, ascending by `col`.
fn fetch_url(table_url: &str, kind: EntityKind, since: Option<&str>) -> String {
    let column = kind.policy().cursor_column;
    let mut url = format!("{table_url}?select=*&order={column}.asc");
    if let Some(since) = since {
        url.push_str(&format!("&{column}=gt.{}", urlencoding::encode(since)));
    }
    url
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return match payload.details.filter(|details| !details.trim().is_empty()) {
                Some(details) => format!("{} - {} ({})", message.trim(), details.trim(), status.as_u16()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncConfig {
        SyncConfig {
            remote_url: Some("https://project.supabase.co/".to_string()),
            api_key: Some("anon-key".to_string()),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn fetch_url_without_cursor_selects_everything() {
        let url = fetch_url("https://x/rest/v1/todos", EntityKind::Todo, None);
        assert_eq!(url, "https://x/rest/v1/todos?select=*&order=updated_at.asc");
    }

    #[test]
    fn fetch_url_encodes_cursor() {
        let url = fetch_url(
            "https://x/rest/v1/attachments",
            EntityKind::Attachment,
            Some("2024-01-01T00:00:00.000+00:00"),
        );
        assert_eq!(
            url,
            "https://x/rest/v1/attachments?select=*&order=created_at.asc&created_at=gt.2024-01-01T00%3A00%3A00.000%2B00%3A00"
        );
    }

    #[test]
    fn table_url_strips_trailing_slash() {
        let client = PostgrestClient::new(&config()).unwrap();
        assert_eq!(
            client.table_url(EntityKind::CalendarEvent),
            "https://project.supabase.co/rest/v1/calendar_events"
        );
    }

    #[test]
    fn debug_redacts_credentials() {
        let client = PostgrestClient::new(&config()).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("anon-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn insert_ignores_duplicate_ids() {
        let client = PostgrestClient::new(&config()).unwrap();
        let request = client
            .insert_request(EntityKind::Todo, &serde_json::json!({"id": "t1"}))
            .build()
            .unwrap();

        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://project.supabase.co/rest/v1/todos?on_conflict=id"
        );
        assert_eq!(
            request.headers()["Prefer"],
            "resolution=ignore-duplicates,return=minimal"
        );
    }

    #[test]
    fn parse_api_error_prefers_postgrest_message() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":"Key (id)=(x) already exists."}"#;
        let message = parse_api_error(StatusCode::CONFLICT, body);
        assert_eq!(
            message,
            "duplicate key value - Key (id)=(x) already exists. (409)"
        );
    }

    #[test]
    fn parse_api_error_falls_back_to_body() {
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
        assert_eq!(
            parse_api_error(StatusCode::UNAUTHORIZED, "nope"),
            "nope (401)"
        );
    }
}
