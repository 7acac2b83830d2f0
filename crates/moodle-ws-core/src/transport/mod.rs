//! Transport adapter: sends one HTTP request and normalizes the answer.
//!
//! Two implementations sit behind [`Transport`]:
//!
//! - [`NativeTransport`] mimics the platform HTTP client of mobile builds. It
//!   reports failures with negative native error codes and follows
//!   cross-scheme redirects manually.
//! - [`BrowserTransport`] mimics a browser client: GET/POST/HEAD only, status
//!   `0` for every failure without an HTTP answer.
//!
//! Neither translates failures into domain errors; that is the engine's job.

mod browser;
mod native;
pub mod redirect;

pub use browser::BrowserTransport;
pub use native::NativeTransport;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error codes reported by the native transport.
pub mod codes {
    pub const GENERIC: i32 = -1;
    pub const SSL_EXCEPTION: i32 = -2;
    pub const SERVER_NOT_FOUND: i32 = -3;
    pub const TIMEOUT: i32 = -4;
    pub const UNSUPPORTED_URL: i32 = -5;
    pub const NOT_CONNECTED: i32 = -6;
    pub const POST_PROCESSING_FAILED: i32 = -7;
    pub const ABORTED: i32 = -8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Head,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Head => "head",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Head => Method::HEAD,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
            Self::Patch => Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response body is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Bytes,
}

/// Request payload with its serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Pre-encoded `application/x-www-form-urlencoded` body.
    Form(String),
    Json(Value),
}

/// Request timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestTimeout {
    /// Timeout derived from the current connection.
    #[default]
    Default,
    Disabled,
    After(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestOptions {
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
    /// Query parameters appended to the URL.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
    pub timeout: RequestTimeout,
}

impl HttpRequestOptions {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            params: Vec::new(),
            headers: Vec::new(),
            response_type: ResponseType::Json,
            timeout: RequestTimeout::Default,
        }
    }

    pub fn get() -> Self {
        Self::new(HttpMethod::Get)
    }

    pub fn head() -> Self {
        Self::new(HttpMethod::Head)
    }

    pub fn post_form(body: impl Into<String>) -> Self {
        Self { body: Some(RequestBody::Form(body.into())), ..Self::new(HttpMethod::Post) }
    }

    pub fn post_json(body: Value) -> Self {
        Self { body: Some(RequestBody::Json(body)), ..Self::new(HttpMethod::Post) }
    }

    #[must_use]
    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: RequestTimeout) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Bytes(Bytes),
    Empty,
}

impl ResponseBody {
    /// Body as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Body as a JSON value. Text bodies become JSON strings.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            Self::Empty => Value::Null,
        }
    }
}

/// Normalized response of both transports.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub body: ResponseBody,
    pub headers: HeaderMap,
    pub status: u16,
    pub status_text: String,
    pub url: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure.
///
/// `status` is the HTTP status when the server answered, a negative native
/// code (see [`codes`]) or `0` when there was no answer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: i32,
    pub message: String,
    /// Non-2xx answer, when there was one.
    pub response: Option<Box<HttpResponse>>,
}

impl TransportError {
    pub fn new(status: i32, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), response: None }
    }

    pub(crate) fn from_response(response: HttpResponse) -> Self {
        let message = format!(
            "Http failure response for {}: {} {}",
            response.url, response.status, response.status_text
        );
        Self { status: i32::from(response.status), message, response: Some(Box::new(response)) }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.as_deref().and_then(|response| response.header(name))
    }

    /// Textual body of the failed answer, if any.
    pub fn body_text(&self) -> Option<&str> {
        self.response.as_deref().and_then(|response| response.body.as_text())
    }
}

/// Which adapter is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Native,
    Browser,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Non-2xx answers are returned as errors carrying the response.
    async fn send(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError>;

    fn kind(&self) -> TransportKind;
}

/// Send a request with reqwest and decode it per `options.response_type`.
///
/// `classify` maps reqwest failures without an HTTP answer to a status code.
pub(crate) async fn execute(
    client: &Client,
    url: &str,
    options: &HttpRequestOptions,
    classify: fn(&reqwest::Error) -> i32,
) -> Result<HttpResponse, TransportError> {
    let mut request = client.request(options.method.to_reqwest(), url);

    if !options.params.is_empty() {
        request = request.query(&options.params);
    }
    for (name, value) in &options.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    match &options.body {
        Some(RequestBody::Form(body)) => {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(body.clone());
        },
        Some(RequestBody::Json(body)) => {
            request = request.json(body);
        },
        None => {},
    }
    if let RequestTimeout::After(timeout) = options.timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|e| TransportError::new(classify(&e), e.to_string()))?;

    let status = response.status();
    let headers = response.headers().clone();
    let final_url = response.url().to_string();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::new(classify(&e), e.to_string()))?;

    let mut parse_error = None;
    let body = if options.method == HttpMethod::Head {
        ResponseBody::Empty
    } else {
        match options.response_type {
            ResponseType::Bytes => ResponseBody::Bytes(bytes),
            ResponseType::Text => ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            ResponseType::Json if bytes.iter().all(u8::is_ascii_whitespace) => {
                ResponseBody::Json(Value::Null)
            },
            ResponseType::Json => match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    parse_error = Some(e.to_string());
                    ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
                },
            },
        }
    };

    let response =
        HttpResponse { body, headers, status: status.as_u16(), status_text, url: final_url };

    if !status.is_success() {
        return Err(TransportError::from_response(response));
    }
    if let Some(error) = parse_error {
        let message = format!("Http failure during parsing for {}: {error}", response.url);
        return Err(TransportError {
            status: i32::from(response.status),
            message,
            response: Some(Box::new(response)),
        });
    }

    Ok(response)
}
