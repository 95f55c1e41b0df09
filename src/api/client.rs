//! Purpose: Provide the blocking HTTP client for the query API.
//! Exports: `QueryConfig`, `QueryClient`.
//! Role: The fetch half of the pipeline; one outbound call per invocation.
//! Invariants: Request bodies are JSON with `sqlText` plus optional `biscuits`.
//! Invariants: Nothing is retried; transport and status failures surface as-is.
#![allow(clippy::result_large_err)]

use crate::api::response::QueryResponse;
use crate::core::error::{Error, ErrorKind};
use serde::Serialize;
use std::time::{Duration, Instant};
use url::Url;

type ApiResult<T> = Result<T, Error>;

/// Default request timeout for the query call.
pub const DEFAULT_TIMEOUT_MS: u64 = 9_000;

pub const DEFAULT_METHOD: &str = "POST";

#[derive(Clone, Debug)]
pub struct QueryConfig {
    endpoint: Url,
    method: String,
    timeout: Duration,
    api_key: String,
    biscuits: Vec<String>,
}

impl QueryConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> ApiResult<Self> {
        let endpoint = parse_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            method: DEFAULT_METHOD.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            api_key: api_key.into(),
            biscuits: Vec::new(),
        })
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_ascii_uppercase();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_biscuit(mut self, biscuit: impl Into<String>) -> Self {
        self.biscuits.push(biscuit.into());
        self
    }

    pub fn with_biscuits(mut self, biscuits: Vec<String>) -> Self {
        self.biscuits = biscuits;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn biscuits(&self) -> &[String] {
        &self.biscuits
    }
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    #[serde(rename = "sqlText")]
    sql_text: &'a str,
    #[serde(skip_serializing_if = "no_biscuits")]
    biscuits: &'a [String],
}

fn no_biscuits(biscuits: &[String]) -> bool {
    biscuits.is_empty()
}

pub struct QueryClient {
    agent: ureq::Agent,
    config: QueryConfig,
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { agent, config }
    }

    /// Runs the query and decodes the response envelope.
    pub fn execute(&self, sql: &str) -> ApiResult<QueryResponse> {
        let body = self.execute_raw(sql)?;
        serde_json::from_str(&body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("invalid response json")
                .with_url(self.config.endpoint.as_str())
                .with_source(err)
        })
    }

    /// Runs the query and returns the raw response body.
    ///
    /// One request per call; GET sends no body, everything else posts the
    /// JSON query envelope. The raw body is logged at debug level.
    pub fn execute_raw(&self, sql: &str) -> ApiResult<String> {
        let request = self
            .agent
            .request(self.config.method.as_str(), self.config.endpoint.as_str())
            .set("Accept", "application/json")
            .set("apikey", &self.config.api_key);

        let started = Instant::now();
        let response = if self.config.method == "GET" {
            request.call()
        } else {
            let payload = QueryRequest {
                sql_text: sql,
                biscuits: &self.config.biscuits,
            };
            let encoded = serde_json::to_string(&payload).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode request json")
                    .with_source(err)
            })?;
            request
                .set("Content-Type", "application/json")
                .send_string(&encoded)
        };

        match response {
            Ok(resp) => {
                let body = read_body(resp, &self.config.endpoint)?;
                tracing::debug!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    body = body.as_str(),
                    "query api response"
                );
                Ok(body)
            }
            Err(ureq::Error::Status(status, resp)) => {
                Err(status_error(status, resp, &self.config.endpoint))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_url(self.config.endpoint.as_str())
                .with_source(err)),
        }
    }
}

fn parse_endpoint(raw: String) -> ApiResult<Url> {
    let url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid query endpoint url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("query endpoint must use http or https scheme")
            .with_url(url.as_str()));
    }
    Ok(url)
}

fn read_body(response: ureq::Response, endpoint: &Url) -> ApiResult<String> {
    response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_url(endpoint.as_str())
            .with_source(err)
    })
}

fn status_error(status: u16, response: ureq::Response, endpoint: &Url) -> Error {
    let body = response.into_string().unwrap_or_default();
    let kind = error_kind_from_status(status);
    let message =
        remote_message(&body).unwrap_or_else(|| format!("query api returned status {status}"));
    let mut err = Error::new(kind)
        .with_message(message)
        .with_url(endpoint.as_str())
        .with_status(status);
    if kind == ErrorKind::Permission {
        err = err.with_hint("Check the api key and any biscuit tokens.");
    }
    err
}

// Best-effort extraction of a human-readable message from an error body.
fn remote_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for field in ["message", "error", "title"] {
        if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }
    None
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::Usage,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        423 | 429 => ErrorKind::Busy,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
