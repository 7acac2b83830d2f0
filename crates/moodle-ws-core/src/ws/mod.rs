//! The web-service client.
//!
//! [`WsClient`] owns the call engines and their shared state: the retry
//! queue, the in-flight cache for AJAX and HEAD calls, and the mimetype
//! cache. State lives on the instance, so two clients never share a queue.
//!
//! ```text
//! call / call_ajax / download_file / upload_file
//!        │
//!        ├── InFlightCache (AJAX, HEAD)
//!        ├── RetryQueue (429 cooldown, paced drain)
//!        └── Transport (native | browser) ── FileTransfer
//! ```

mod ajax;
pub mod coerce;
mod convert;
mod file_transfer;
mod files;
pub mod inflight;
pub mod retry_queue;
mod rpc;
pub mod split;

pub use convert::convert_values_to_string;
pub use file_transfer::{
    DownloadOutcome, FileTransfer, HttpFileTransfer, ProgressFn, UploadOutcome, UploadRequest,
};
pub use rpc::throw_on_failed_status;

use dashmap::DashMap;
use moodle_ws_types::{ErrorLogEntry, WsClientConfig, WsError};
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::collaborators::{
    AssumeOnline, DesktopPlatform, ErrorLogSink, FileSystem, LocalFileSystem, MemoryErrorLog,
    NetworkStatus, NoSession, NoSupport, Platform, SiteSession, SupportConfigLookup, Translator,
};
use crate::errors::{build_several_paragraphs_message, get_error_message_from_error, get_html_body_content, ErrorLike};
use crate::strings::EnglishStrings;
use crate::transport::{
    codes, BrowserTransport, HttpRequestOptions, HttpResponse, NativeTransport, RequestTimeout,
    ResponseBody, ResponseType, Transport, TransportError, TransportKind,
};
use crate::utils::http::{create_client, create_native_client};
use inflight::InFlightCache;
use retry_queue::RetryQueue;

/// Handle to the web-service engines. Cheap to clone.
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: WsClientConfig,
    transport: Arc<dyn Transport>,
    file_transfer: Arc<dyn FileTransfer>,
    network: Arc<dyn NetworkStatus>,
    platform: Arc<dyn Platform>,
    fs: Arc<dyn FileSystem>,
    translator: Arc<dyn Translator>,
    session: Arc<dyn SiteSession>,
    support: Arc<dyn SupportConfigLookup>,
    error_log: Arc<dyn ErrorLogSink>,
    ajax_calls: InFlightCache<Result<Value, WsError>>,
    head_calls: InFlightCache<Result<HttpResponse, TransportError>>,
    retry: RetryQueue,
    mimetype_cache: DashMap<String, String>,
}

/// Builder for [`WsClient`]. Every collaborator has a desktop default.
#[derive(Default)]
pub struct WsClientBuilder {
    config: WsClientConfig,
    transport: Option<Arc<dyn Transport>>,
    file_transfer: Option<Arc<dyn FileTransfer>>,
    network: Option<Arc<dyn NetworkStatus>>,
    platform: Option<Arc<dyn Platform>>,
    fs: Option<Arc<dyn FileSystem>>,
    translator: Option<Arc<dyn Translator>>,
    session: Option<Arc<dyn SiteSession>>,
    support: Option<Arc<dyn SupportConfigLookup>>,
    error_log: Option<Arc<dyn ErrorLogSink>>,
}

impl WsClientBuilder {
    #[must_use]
    pub fn config(mut self, config: WsClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the transport picked from the platform.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn file_transfer(mut self, file_transfer: Arc<dyn FileTransfer>) -> Self {
        self.file_transfer = Some(file_transfer);
        self
    }

    #[must_use]
    pub fn network_status(mut self, network: Arc<dyn NetworkStatus>) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    #[must_use]
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    #[must_use]
    pub fn session(mut self, session: Arc<dyn SiteSession>) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn support_lookup(mut self, support: Arc<dyn SupportConfigLookup>) -> Self {
        self.support = Some(support);
        self
    }

    #[must_use]
    pub fn error_log(mut self, error_log: Arc<dyn ErrorLogSink>) -> Self {
        self.error_log = Some(error_log);
        self
    }

    /// Validate the configuration and wire the engines.
    ///
    /// Mobile platforms get the native transport, everything else the browser one.
    pub fn build(self) -> Result<WsClient, WsError> {
        self.config
            .validate()
            .map_err(|e| WsError::generic(format!("Invalid client configuration: {e}")))?;

        let config = self.config;
        let platform = self.platform.unwrap_or_else(|| Arc::new(DesktopPlatform));

        let transport = match self.transport {
            Some(transport) => transport,
            None if platform.is_mobile() => {
                let client = create_native_client(&config.user_agent, config.max_redirects)
                    .map_err(WsError::generic)?;
                Arc::new(NativeTransport::new(client, config.max_redirects)) as Arc<dyn Transport>
            },
            None => {
                let client = create_client(&config.user_agent).map_err(WsError::generic)?;
                Arc::new(BrowserTransport::new(client)) as Arc<dyn Transport>
            },
        };
        let file_transfer = match self.file_transfer {
            Some(file_transfer) => file_transfer,
            None => {
                let client = create_native_client(&config.user_agent, config.max_redirects)
                    .map_err(WsError::generic)?;
                Arc::new(HttpFileTransfer::new(client)) as Arc<dyn FileTransfer>
            },
        };
        let translator = self
            .translator
            .unwrap_or_else(|| Arc::new(EnglishStrings::with_language(config.language.clone())));

        tracing::debug!(
            transport = ?transport.kind(),
            user_agent = %config.user_agent,
            "WS client ready"
        );

        Ok(WsClient {
            inner: Arc::new(Inner {
                transport,
                file_transfer,
                network: self.network.unwrap_or_else(|| Arc::new(AssumeOnline)),
                platform,
                fs: self.fs.unwrap_or_else(|| Arc::new(LocalFileSystem)),
                translator,
                session: self.session.unwrap_or_else(|| Arc::new(NoSession)),
                support: self.support.unwrap_or_else(|| Arc::new(NoSupport)),
                error_log: self.error_log.unwrap_or_else(|| Arc::new(MemoryErrorLog::new())),
                ajax_calls: InFlightCache::new(),
                head_calls: InFlightCache::new(),
                retry: RetryQueue::new(),
                mimetype_cache: DashMap::new(),
                config,
            }),
        })
    }
}

impl WsClient {
    pub fn builder() -> WsClientBuilder {
        WsClientBuilder::default()
    }

    /// Client with default collaborators.
    pub fn new(config: WsClientConfig) -> Result<Self, WsError> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &WsClientConfig {
        &self.inner.config
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.inner.transport.kind()
    }

    /// Timeout applied to requests on the current connection.
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout()
    }

    /// Calls waiting for a 429 cooldown.
    pub fn pending_retries(&self) -> usize {
        self.inner.retry.len()
    }

    /// Send one HTTP request through the transport, with the default timeout
    /// applied. `file://` URLs are read locally on mobile platforms.
    pub async fn send_http_request(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        self.inner.send_http_request(url, options).await
    }
}

impl Inner {
    fn request_timeout(&self) -> Duration {
        self.config.request_timeout(self.network.is_network_access_limited())
    }

    fn t(&self, key: &str) -> String {
        self.translator.instant(key, &[])
    }

    async fn send_http_request(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        let mut options = options.clone();
        if options.timeout == RequestTimeout::Default {
            options.timeout = RequestTimeout::After(self.request_timeout());
        }

        if self.platform.is_mobile() && url.starts_with("file://") {
            return self.read_local_file(url, &options).await;
        }

        self.transport.send(url, &options).await
    }

    async fn read_local_file(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        let path = url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.to_file_path().ok())
            .unwrap_or_else(|| PathBuf::from(url.trim_start_matches("file://")));

        let content = self
            .fs
            .read_file(&path)
            .await
            .map_err(|e| TransportError::new(codes::GENERIC, format!("Error reading {url}: {e}")))?;

        let body = match options.response_type {
            ResponseType::Json => serde_json::from_str(&content).map(ResponseBody::Json).map_err(|e| {
                TransportError::new(codes::GENERIC, format!("Error parsing {url}: {e}"))
            })?,
            ResponseType::Text => ResponseBody::Text(content),
            ResponseType::Bytes => ResponseBody::Bytes(content.into_bytes().into()),
        };

        Ok(HttpResponse {
            body,
            headers: HeaderMap::new(),
            status: 200,
            status_text: "OK".to_string(),
            url: url.to_string(),
        })
    }

    /// "Site unavailable" help for the logged-in site, or "site not found" otherwise.
    fn site_help_message(&self) -> String {
        match self.session.current_site_url() {
            Some(site) => self.translator.instant("core.siteunavailablehelp", &[("site", &site)]),
            None => self.t("core.sitenotfoundhelp"),
        }
    }

    /// "Cannot connect" error with a debug code and the site's support contact.
    async fn cannot_connect_error(&self, site_url: &str, code: &str, details: String) -> WsError {
        WsError::Site(self.site_error_info(site_url, code, details).await)
    }

    async fn site_error_info(
        &self,
        site_url: &str,
        code: &str,
        details: String,
    ) -> moodle_ws_types::SiteErrorInfo {
        moodle_ws_types::SiteErrorInfo {
            message: self.site_help_message(),
            debug: Some(moodle_ws_types::ErrorDebug::new(code, details)),
            support: self.support.for_site(site_url).await,
            error_code: Some(code.to_string()),
        }
    }

    /// Invalid-response details for `method`, wrapped in the server-connection text.
    fn invalid_response_details(&self, method: &str) -> String {
        let invalid = self.translator.instant("core.errorinvalidresponse", &[("method", method)]);
        self.translator.instant("core.serverconnection", &[("details", &invalid)])
    }

    /// HTTP error whose message is the help text plus the answer's body.
    fn create_http_error(&self, error: &TransportError, status: u16) -> WsError {
        let body = get_error_message_from_error(&ErrorLike::from(error)).unwrap_or_default();
        let message = build_several_paragraphs_message(
            &[self.site_help_message().into(), get_html_body_content(&body).into()],
            self.translator.as_ref(),
        );
        WsError::Http { status, message }
    }

    /// Map a transport failure with no dedicated handling to a domain error.
    fn transport_failure(&self, error: &TransportError) -> WsError {
        match u16::try_from(error.status) {
            Ok(status) if status > 0 => self.create_http_error(error, status),
            _ => {
                let details = get_error_message_from_error(&ErrorLike::from(error))
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string());
                WsError::generic(self.translator.instant("core.serverconnection", &[("details", &details)]))
            },
        }
    }

    fn log_error(&self, method: &str, error_type: &str, message: &str, data: Value) {
        self.error_log.add_error_log(ErrorLogEntry {
            method: method.to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            time: chrono::Utc::now().timestamp_millis(),
            data,
        });
    }
}

/// Call arguments without the token, for error logs.
fn redacted(data: &Map<String, Value>) -> Value {
    let mut data = data.clone();
    data.remove("wstoken");
    Value::Object(data)
}

#[cfg(test)]
mod tests;
