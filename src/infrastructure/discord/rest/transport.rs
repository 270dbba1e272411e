use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{RestError, RestResult};
use super::routes::HttpMethod;
use crate::domain::entities::AuthToken;
use crate::infrastructure::discord::dto::ErrorResponse;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const USER_AGENT: &str = concat!(
    "DiscordBot (",
    env!("CARGO_PKG_NAME"),
    ", ",
    env!("CARGO_PKG_VERSION"),
    ")"
);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// One outbound call, already resolved to a concrete path.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
}

/// Rate limit headers attached to every response, whatever its status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaMetadata {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
    pub bucket: Option<String>,
    pub global: bool,
    pub retry_after: Option<Duration>,
}

fn seconds(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(seconds)
}

impl QuotaMetadata {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            limit: text("x-ratelimit-limit").and_then(|v| v.parse().ok()),
            remaining: text("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_after: text("x-ratelimit-reset-after").and_then(parse_seconds),
            bucket: text("x-ratelimit-bucket").map(str::to_string),
            global: text("x-ratelimit-global").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            retry_after: text(header::RETRY_AFTER.as_str()).and_then(parse_seconds),
        }
    }

    /// Known window: how many calls fit and when it refills.
    #[must_use]
    pub fn window(limit: u32, remaining: u32, reset_after: Duration) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(remaining),
            reset_after: Some(reset_after),
            ..Self::default()
        }
    }
}

/// How a response should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    ClientError,
    Throttled { retry_after: Duration, global: bool },
    ServerError,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub quota: QuotaMetadata,
    pub body: Bytes,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            quota: QuotaMetadata::default(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    #[must_use]
    pub fn with_quota(mut self, quota: QuotaMetadata) -> Self {
        self.quota = quota;
        self
    }

    #[must_use]
    pub fn classify(&self) -> ResponseClass {
        match self.status {
            200..=299 => ResponseClass::Success,
            429 => {
                let body = self.error_body();
                let retry_after = body
                    .as_ref()
                    .and_then(|b| b.retry_after)
                    .and_then(seconds)
                    .or(self.quota.retry_after)
                    .or(self.quota.reset_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                let global = self.quota.global || body.is_some_and(|b| b.global);
                ResponseClass::Throttled {
                    retry_after,
                    global,
                }
            }
            500..=599 => ResponseClass::ServerError,
            _ => ResponseClass::ClientError,
        }
    }

    fn error_body(&self) -> Option<ErrorResponse> {
        serde_json::from_slice(&self.body).ok()
    }

    /// Message from an error body, or the bare status.
    #[must_use]
    pub fn error_message(&self) -> String {
        match self.error_body() {
            Some(body) if !body.message.is_empty() => body.message,
            _ => format!("HTTP {}", self.status),
        }
    }

    /// # Errors
    ///
    /// Returns `RestError::Decode` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> RestResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            warn!(error = %e, status = self.status, "Failed to parse response");
            RestError::decode(e.to_string())
        })
    }
}

/// Request/response channel to the REST API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Performs one call. Non-2xx statuses are returned as responses, not errors.
    async fn execute(&self, request: &HttpRequest) -> RestResult<HttpResponse>;
}

/// `reqwest`-backed transport that authenticates every call with the token.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    token: AuthToken,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails.
    pub fn new(token: AuthToken, base_url: impl Into<String>, timeout: Duration) -> RestResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    const fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> RestResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "Sending request");

        let mut builder = self
            .client
            .request(Self::method(request.method), &url)
            .header(header::AUTHORIZATION, self.token.as_str());
        builder = match &request.body {
            Some(body) => builder.json(body),
            None if request.method == HttpMethod::Post => {
                builder.header(header::CONTENT_LENGTH, 0)
            }
            None => builder,
        };

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, path = %request.path, "Request failed");
            if e.is_timeout() {
                RestError::Timeout
            } else if e.is_connect() {
                RestError::network("failed to connect to Discord")
            } else {
                RestError::network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let quota = QuotaMetadata::from_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| RestError::network(format!("failed to read body: {e}")))?;

        Ok(HttpResponse {
            status,
            quota,
            body,
        })
    }
}
