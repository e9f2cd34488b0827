//! HTTP implementation of the remote store against a PostgREST-style row API.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

use quillpad_core::sync::{NoteChanges, NotePayload, RemoteNote, RemoteTag, TagChanges, TagPayload};

use crate::error::{RemoteStoreError, Result};
use crate::store::RemoteStore;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error body shape returned by the row API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Client for the remote row API.
///
/// Rows are filtered with query operators (`id=eq.<id>`,
/// `updated_at=gt.<ts>`); writes send `Prefer: return=representation` so the
/// server-assigned `updated_at` comes back with the stored row.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HttpRemoteStore {
    /// Create a new client for `base_url`, authenticating as the owner of
    /// `access_token`. Row-level security on the server scopes every query
    /// to that owner.
    pub fn new(base_url: &str, access_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| RemoteStoreError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn write_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers()?;
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                let code = error.code.unwrap_or_else(|| "api_error".to_string());
                return Err(RemoteStoreError::api(
                    status.as_u16(),
                    format!("{}: {}", code, error.message),
                ));
            }
            return Err(RemoteStoreError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteStoreError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// Check status on a response whose body is irrelevant (deletes).
    async fn check_response(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await?;
        Self::log_response(status, &body);
        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            return Err(RemoteStoreError::api(status.as_u16(), error.message));
        }
        Err(RemoteStoreError::api(
            status.as_u16(),
            format!("Request failed: {}", body),
        ))
    }

    fn single_row<T>(mut rows: Vec<T>, status: u16, what: &str) -> Result<T> {
        rows.pop()
            .ok_or_else(|| RemoteStoreError::api(status, format!("{what} matched no rows")))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn notes_updated_after(&self, watermark: &str) -> Result<Vec<RemoteNote>> {
        let response = self
            .client
            .get(self.table_url("notes"))
            .headers(self.headers()?)
            .query(&[
                ("updated_at", format!("gt.{watermark}")),
                ("order", "updated_at.asc".to_string()),
            ])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_note(&self, note_id: &str) -> Result<Option<RemoteNote>> {
        let response = self
            .client
            .get(self.table_url("notes"))
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{note_id}")), ("limit", "1".to_string())])
            .send()
            .await?;
        let rows: Vec<RemoteNote> = Self::parse_response(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_note(&self, note: &NotePayload) -> Result<RemoteNote> {
        let response = self
            .client
            .post(self.table_url("notes"))
            .headers(self.write_headers()?)
            .json(note)
            .send()
            .await?;
        let rows: Vec<RemoteNote> = Self::parse_response(response).await?;
        Self::single_row(rows, 500, "note insert")
    }

    async fn update_note(&self, note_id: &str, changes: &NoteChanges) -> Result<RemoteNote> {
        let response = self
            .client
            .patch(self.table_url("notes"))
            .headers(self.write_headers()?)
            .query(&[("id", format!("eq.{note_id}"))])
            .json(changes)
            .send()
            .await?;
        let rows: Vec<RemoteNote> = Self::parse_response(response).await?;
        Self::single_row(rows, 404, "note update")
    }

    async fn delete_note(&self, note_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url("notes"))
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{note_id}"))])
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn list_tags(&self) -> Result<Vec<RemoteTag>> {
        let response = self
            .client
            .get(self.table_url("tags"))
            .headers(self.headers()?)
            .query(&[("order", "name.asc".to_string())])
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn get_tag(&self, tag_id: &str) -> Result<Option<RemoteTag>> {
        let response = self
            .client
            .get(self.table_url("tags"))
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{tag_id}")), ("limit", "1".to_string())])
            .send()
            .await?;
        let rows: Vec<RemoteTag> = Self::parse_response(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_tag(&self, tag: &TagPayload) -> Result<RemoteTag> {
        let response = self
            .client
            .post(self.table_url("tags"))
            .headers(self.write_headers()?)
            .json(tag)
            .send()
            .await?;
        let rows: Vec<RemoteTag> = Self::parse_response(response).await?;
        Self::single_row(rows, 500, "tag insert")
    }

    async fn update_tag(&self, tag_id: &str, changes: &TagChanges) -> Result<RemoteTag> {
        let response = self
            .client
            .patch(self.table_url("tags"))
            .headers(self.write_headers()?)
            .query(&[("id", format!("eq.{tag_id}"))])
            .json(changes)
            .send()
            .await?;
        let rows: Vec<RemoteTag> = Self::parse_response(response).await?;
        Self::single_row(rows, 404, "tag update")
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url("tags"))
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{tag_id}"))])
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn insert_link(&self, note_id: &str, tag_id: &str) -> Result<()> {
        let mut headers = self.headers()?;
        // A retried link insert must not trip the composite-key constraint.
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates"),
        );
        let response = self
            .client
            .post(self.table_url("note_tags"))
            .headers(headers)
            .json(&serde_json::json!({ "note_id": note_id, "tag_id": tag_id }))
            .send()
            .await?;
        Self::check_response(response).await
    }

    async fn delete_link(&self, note_id: &str, tag_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.table_url("note_tags"))
            .headers(self.headers()?)
            .query(&[
                ("note_id", format!("eq.{note_id}")),
                ("tag_id", format!("eq.{tag_id}")),
            ])
            .send()
            .await?;
        Self::check_response(response).await
    }
}
