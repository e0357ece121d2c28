//! Thin client for the Sheets v4 `spreadsheets.values` endpoints.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::auth::SheetsCredentials;
use crate::error::{Result, StoreError};

/// Public Sheets API endpoint.
pub const DEFAULT_API_URL: &str = "https://sheets.googleapis.com/v4/";

/// A block of cells addressed in A1 notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// A1 range, e.g. `Users!A2:G`.
    pub range: String,
    /// Rows of cells. Absent when the range is empty.
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl ValueRange {
    /// A range with the given rows.
    #[must_use]
    pub fn new(range: impl Into<String>, values: Vec<Vec<Value>>) -> Self {
        Self {
            range: range.into(),
            values,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchUpdateRequest<'a> {
    value_input_option: &'static str,
    data: &'a [ValueRange],
}

#[derive(Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Sheets API client bound to one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    base_url: Url,
    spreadsheet_id: String,
    credentials: Arc<SheetsCredentials>,
}

impl SheetsClient {
    /// Create a client for `spreadsheet_id` against the public API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the HTTP client cannot be built.
    pub fn new(
        spreadsheet_id: impl Into<String>,
        credentials: SheetsCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_URL, spreadsheet_id, credentials, timeout)
    }

    /// Create a client against another endpoint (emulators, tests).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] if the URL is invalid or the
    /// HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        credentials: SheetsCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Configuration(format!("invalid Sheets API URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Configuration(format!(
                "Sheets API URL cannot be a base: {base_url}"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            credentials: Arc::new(credentials),
        })
    }

    /// The spreadsheet this client reads and writes.
    #[must_use]
    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Read one range.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails; see [`StoreError::is_transient`].
    pub async fn get_values(&self, range: &str) -> Result<Vec<Vec<Value>>> {
        let mut url = self.endpoint(&["values", range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("majorDimension", "ROWS");

        let response = self.send(self.http.get(url)).await?;
        let range: ValueRange = Self::parse(response).await?;
        Ok(range.values)
    }

    /// Read several ranges in one call. Results follow the order of `ranges`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails; see [`StoreError::is_transient`].
    pub async fn batch_get(&self, ranges: &[String]) -> Result<Vec<Vec<Vec<Value>>>> {
        let mut url = self.endpoint(&["values:batchGet"])?;
        {
            let mut query = url.query_pairs_mut();
            for range in ranges {
                query.append_pair("ranges", range);
            }
            query
                .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
                .append_pair("majorDimension", "ROWS");
        }

        let response = self.send(self.http.get(url)).await?;
        let body: BatchGetResponse = Self::parse(response).await?;
        if body.value_ranges.len() != ranges.len() {
            return Err(StoreError::Serialization(format!(
                "batchGet returned {} ranges, expected {}",
                body.value_ranges.len(),
                ranges.len()
            )));
        }
        Ok(body.value_ranges.into_iter().map(|r| r.values).collect())
    }

    /// Write several ranges in one call. `null` cells are left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails; see [`StoreError::is_transient`].
    pub async fn batch_update(&self, data: &[ValueRange]) -> Result<()> {
        let url = self.endpoint(&["values:batchUpdate"])?;
        let request = BatchUpdateRequest {
            value_input_option: "RAW",
            data,
        };

        let response = self.send(self.http.post(url).json(&request)).await?;
        let _: Value = Self::parse(response).await?;
        Ok(())
    }

    /// `{base}/spreadsheets/{id}/{segments...}` with each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Configuration("invalid Sheets API URL".into()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let token = self.credentials.access_token(&self.http).await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Transient(format!("Sheets request timed out: {e}"))
                } else {
                    StoreError::Transient(format!("Sheets request failed: {e}"))
                }
            })
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StoreError::Serialization(format!("Sheets response: {e}")));
        }

        // Try to parse error response
        let message = match response.json::<GoogleErrorResponse>().await {
            Ok(body) => match body.error.status {
                Some(code) => format!("{code}: {}", body.error.message),
                None => body.error.message,
            },
            Err(_) => format!("HTTP {status}"),
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::Auth(message)),
            _ => Err(StoreError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}
