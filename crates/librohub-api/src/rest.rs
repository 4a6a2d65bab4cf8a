// Hand-crafted async HTTP client for a PostgREST endpoint.
//
// Base path: /rest/v1/
// Auth: `apikey` header + bearer token (same project key)

use reqwest::header::HeaderValue;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::query::{Filter, Query, Table};
use crate::transport::TransportConfig;

const PREFER_REPRESENTATION: &str = "return=representation";

// ── Error response shape from PostgREST ──────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the hosted database's REST interface.
///
/// Every table operation maps onto one HTTP verb against
/// `{base}/rest/v1/{table}`; filters travel as query parameters.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a project URL, API key and transport config.
    pub fn from_api_key(
        base_url: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_keyed_client(api_key)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Ensure the base URL ends with `/rest/v1/`.
    ///
    /// Accepts either the bare project URL or one that already carries
    /// the REST prefix.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();

        if path.ends_with("/rest/v1") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/rest/v1/"));
        }

        Ok(url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, table: Table) -> Result<Url, Error> {
        Ok(self.base_url.join(table.as_ref())?)
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run a select, returning raw JSON rows.
    pub async fn select(&self, query: &Query) -> Result<Vec<Value>, Error> {
        self.select_as(query).await
    }

    /// Run a select and deserialize each row into `T`.
    pub async fn select_as<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, Error> {
        let url = self.url(query.table)?;
        let params = query.to_params();
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(&params).send().await?;
        Self::handle_response(resp).await
    }

    /// Insert one row, returning the stored representation
    /// (with server-side defaults filled in).
    pub async fn insert(&self, table: Table, row: &Value) -> Result<Vec<Value>, Error> {
        let url = self.url(table)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .header("Prefer", HeaderValue::from_static(PREFER_REPRESENTATION))
            .json(row)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Patch every row matching `filters`, returning the updated rows.
    pub async fn update(
        &self,
        table: Table,
        patch: &Value,
        filters: &[Filter],
    ) -> Result<Vec<Value>, Error> {
        let url = self.url(table)?;
        let params: Vec<(String, String)> = filters.iter().map(Filter::to_query_pair).collect();
        debug!("PATCH {url} params={params:?}");

        let resp = self
            .http
            .patch(url)
            .query(&params)
            .header("Prefer", HeaderValue::from_static(PREFER_REPRESENTATION))
            .json(patch)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Delete every row matching `filters`.
    pub async fn delete(&self, table: Table, filters: &[Filter]) -> Result<(), Error> {
        let url = self.url(table)?;
        let params: Vec<(String, String)> = filters.iter().map(Filter::to_query_pair).collect();
        debug!("DELETE {url} params={params:?}");

        let resp = self.http.delete(url).query(&params).send().await?;
        Self::handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    async fn parse_error(status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::InvalidApiKey;
        }

        let raw = resp.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::FORBIDDEN {
            return Error::PermissionDenied {
                message: serde_json::from_str::<ErrorResponse>(&raw)
                    .ok()
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| status.to_string()),
            };
        }

        if let Ok(err) = serde_json::from_str::<ErrorResponse>(&raw) {
            let details = match (err.details, err.hint) {
                (Some(d), Some(h)) => Some(format!("{d} (hint: {h})")),
                (d, h) => d.or(h),
            };
            Error::Rest {
                status: status.as_u16(),
                message: err.message.unwrap_or_else(|| status.to_string()),
                code: err.code,
                details,
            }
        } else {
            Error::Rest {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
                code: None,
                details: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_rest_prefix() {
        let url = RestClient::normalize_base_url("https://abc.example.co").expect("valid url");
        assert_eq!(url.as_str(), "https://abc.example.co/rest/v1/");
    }

    #[test]
    fn base_url_with_prefix_is_kept() {
        let url =
            RestClient::normalize_base_url("https://abc.example.co/rest/v1/").expect("valid url");
        assert_eq!(url.as_str(), "https://abc.example.co/rest/v1/");
    }

    #[test]
    fn table_urls_join_onto_base() {
        let client = RestClient::with_client(reqwest::Client::new(), "http://localhost:54321")
            .expect("valid url");
        let url = client.url(Table::BorrowRecords).expect("joinable");
        assert_eq!(url.as_str(), "http://localhost:54321/rest/v1/borrow_records");
    }
}
