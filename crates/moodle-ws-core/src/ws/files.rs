//! File engine: downloads, uploads and HEAD probes.

use futures::future::FutureExt;
use moodle_ws_types::{DownloadedFileEntry, FileUploadOptions, UploadFileResult, WsError, WsErrorPayload, WsPreSets};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

use super::coerce::is_falsy;
use super::file_transfer::{DownloadOutcome, ProgressFn, UploadRequest};
use super::inflight::InFlightCache;
use super::{Inner, WsClient};
use crate::transport::redirect::{follow_redirects, LOCATION};
use crate::transport::{HttpRequestOptions, HttpResponse, ResponseBody, ResponseType, TransportError};
use crate::utils::mimetype;

/// Extensions that are unreliable for downloads: cloud documents the server
/// converts on the fly, and scripts that serve other content.
const UNRELIABLE_EXTENSIONS: &[&str] = &["gdoc", "gsheet", "gslides", "gdraw", "php"];

const UPLOAD_METHOD: &str = "upload.php";

impl WsClient {
    /// Download `url` to `path`.
    ///
    /// The body is written to `{path}.tmp` and only moved to the final path
    /// after the transfer succeeded. With `add_extension`, a missing or
    /// unreliable extension is replaced with one derived from the mimetype.
    pub async fn download_file(
        &self,
        url: &str,
        path: &Path,
        add_extension: bool,
        on_progress: Option<&ProgressFn>,
    ) -> Result<DownloadedFileEntry, WsError> {
        self.inner.download_file(url, path, add_extension, on_progress).await
    }

    /// Upload one file to the user's draft area.
    pub async fn upload_file(
        &self,
        file_path: &Path,
        options: &FileUploadOptions,
        presets: &WsPreSets,
        on_progress: Option<&ProgressFn>,
    ) -> Result<UploadFileResult, WsError> {
        self.inner.upload_file(file_path, options, presets, on_progress).await
    }

    /// HEAD request shared by concurrent callers for the same URL.
    pub async fn perform_head(&self, url: &str) -> Result<HttpResponse, TransportError> {
        Inner::perform_head(&self.inner, url).await
    }

    /// Mimetype of a remote file without parameters, or empty on failure.
    pub async fn get_remote_file_mime_type(&self, url: &str, ignore_cache: bool) -> String {
        Inner::get_remote_file_mime_type(&self.inner, url, ignore_cache).await
    }

    /// Size announced by `Content-Length`, or -1 when unknown or on failure.
    pub async fn get_remote_file_size(&self, url: &str) -> i64 {
        match self.perform_head(url).await {
            Ok(response) => response
                .header("Content-Length")
                .and_then(|value| value.trim().parse::<i64>().ok())
                .filter(|size| *size > 0)
                .unwrap_or(-1),
            Err(_) => -1,
        }
    }

    /// Whether a HEAD request to `url` answers with a 2xx status.
    pub async fn url_works(&self, url: &str) -> bool {
        self.perform_head(url).await.is_ok_and(|response| response.is_success())
    }

    /// Fetch `url` as text.
    pub async fn get_text(&self, url: &str) -> Result<String, WsError> {
        let options = HttpRequestOptions::get().with_response_type(ResponseType::Text);
        let response = self
            .inner
            .send_http_request(url, &options)
            .await
            .map_err(|error| self.inner.transport_failure(&error))?;
        match response.body {
            ResponseBody::Text(text) => Ok(text),
            _ => Err(WsError::generic("Error reading content")),
        }
    }
}

impl Inner {
    async fn download_file(
        self: &Arc<Self>,
        url: &str,
        path: &Path,
        add_extension: bool,
        on_progress: Option<&ProgressFn>,
    ) -> Result<DownloadedFileEntry, WsError> {
        tracing::debug!(url = %url, path = %path.display(), add_extension, "Downloading file");

        if !self.network.is_online() {
            return Err(WsError::network(self.t("core.networkerrormsg")));
        }

        let result = self.download_to_final_path(url, path, add_extension, on_progress).await;
        if let Err(error) = &result {
            tracing::error!(url = %url, path = %path.display(), error = %error, "Error downloading file");
        }
        result
    }

    async fn download_to_final_path(
        self: &Arc<Self>,
        url: &str,
        path: &Path,
        add_extension: bool,
        on_progress: Option<&ProgressFn>,
    ) -> Result<DownloadedFileEntry, WsError> {
        // A failed transfer must never leave a partial file at `path`.
        let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
        self.fs
            .create_file(&tmp_path)
            .await
            .map_err(|e| WsError::generic(format!("Error creating {}: {e}", tmp_path.display())))?;

        let transfer = Arc::clone(&self.file_transfer);
        let target = tmp_path.as_path();
        let outcome: Result<DownloadOutcome, TransportError> =
            follow_redirects(url, self.config.max_redirects, LOCATION, |hop: String| {
                let transfer = Arc::clone(&transfer);
                async move { transfer.download(&hop, target, on_progress).await }
            })
            .await;
        let outcome = outcome.map_err(|error| self.transport_failure(&error))?;

        let mut final_path = path.to_string_lossy().into_owned();
        let mut extension = String::new();

        if add_extension {
            extension = mimetype::get_path_extension(&final_path).unwrap_or_default();

            if extension.is_empty() || UNRELIABLE_EXTENSIONS.contains(&extension.as_str()) {
                let header_type = outcome
                    .headers
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.split(';').next().unwrap_or_default().trim().to_string());
                let content_type = match header_type {
                    Some(content_type) => content_type,
                    None => Self::get_remote_file_mime_type(self, url, false).await,
                };

                if !content_type.is_empty() {
                    let remote = mimetype::get_extension(&content_type, Some(url));
                    // Cloud sources report JSON for converted documents.
                    if let Some(remote) =
                        remote.filter(|_| extension.is_empty() || content_type != "application/json")
                    {
                        if !extension.is_empty() {
                            final_path = mimetype::remove_extension(&final_path);
                        }
                        final_path = format!("{final_path}.{remote}");
                        extension = remote;
                    }
                }
            }
        }

        let final_path = PathBuf::from(final_path);
        let size = self.fs.move_file(&tmp_path, &final_path).await.map_err(|e| {
            WsError::generic(format!("Error moving downloaded file to {}: {e}", final_path.display()))
        })?;

        tracing::debug!(
            url = %url,
            path = %final_path.display(),
            extension = %extension,
            bytes = outcome.bytes_written,
            "Success downloading file"
        );
        Ok(DownloadedFileEntry { path: final_path, extension, size })
    }

    async fn upload_file(
        &self,
        file_path: &Path,
        options: &FileUploadOptions,
        presets: &WsPreSets,
        on_progress: Option<&ProgressFn>,
    ) -> Result<UploadFileResult, WsError> {
        tracing::debug!(path = %file_path.display(), "Trying to upload file");

        if file_path.as_os_str().is_empty() || presets.validate().is_err() {
            return Err(WsError::generic("Invalid options passed to upload file."));
        }
        if !self.network.is_online() {
            return Err(WsError::network(self.t("core.networkerrormsg")));
        }

        let upload_url = format!("{}/webservice/upload.php", presets.site_url);
        let mut headers = options.headers.clone();
        headers.insert("User-Agent".to_string(), self.config.user_agent.clone());
        let request = UploadRequest {
            file_key: options.file_key.clone(),
            file_name: options.file_name.clone(),
            mime_type: options.mime_type.clone(),
            params: vec![
                ("token".to_string(), presets.ws_token.clone()),
                ("filearea".to_string(), options.file_area_or_default().to_string()),
                ("itemid".to_string(), options.item_id_or_default().to_string()),
            ],
            headers,
        };

        let outcome = match self.file_transfer.upload(file_path, &upload_url, &request, on_progress).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(path = %file_path.display(), error = %error, "Error while uploading file");
                let status = u16::try_from(error.status).unwrap_or(0);
                return Err(self.create_http_error(&error, status));
            },
        };

        let result = self.parse_upload_response(&outcome.response, &presets.site_url).await?;
        tracing::debug!(path = %file_path.display(), "Successfully uploaded file");
        Ok(result)
    }

    async fn parse_upload_response(&self, response: &str, site_url: &str) -> Result<UploadFileResult, WsError> {
        let invalid = || self.translator.instant("core.errorinvalidresponse", &[("method", UPLOAD_METHOD)]);

        let data = match serde_json::from_str::<Value>(response) {
            Ok(Value::Null) | Err(_) => {
                tracing::error!(response = %response, "Error parsing response from upload");
                return Err(self.cannot_connect_error(site_url, "invalidresponse", invalid()).await);
            },
            Ok(data) => data,
        };
        if is_falsy(&data) {
            let details = self.invalid_response_details(UPLOAD_METHOD);
            return Err(self.cannot_connect_error(site_url, "serverconnectionupload", details).await);
        }
        if !(data.is_object() || data.is_array()) {
            tracing::warn!("Upload file: response is not an object");
            return Err(self.cannot_connect_error(site_url, "invalidresponse", invalid()).await);
        }

        if data.get("exception").is_some() {
            return Err(WsError::Ws(WsErrorPayload::from_value(&data)));
        }
        if let Some(error) = data.get("error") {
            return Err(upload_error(error, data.get("errortype")));
        }
        let first = data.get(0).cloned().unwrap_or(Value::Null);
        if let Some(error) = first.get("error") {
            return Err(upload_error(error, first.get("errortype")));
        }

        match serde_json::from_value::<UploadFileResult>(first) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(error = %e, "Unexpected upload result");
                Err(self.cannot_connect_error(site_url, "invalidresponse", invalid()).await)
            },
        }
    }

    fn perform_head(
        self: &Arc<Self>,
        url: &str,
    ) -> futures::future::Shared<futures::future::BoxFuture<'static, Result<HttpResponse, TransportError>>> {
        let key = InFlightCache::<Result<HttpResponse, TransportError>>::key("head", url, None);
        let inner = Arc::clone(self);
        let owned_url = url.to_string();
        self.head_calls.get_or_insert_with(&key, self.request_timeout(), move || {
            async move {
                let options = HttpRequestOptions::head().with_response_type(ResponseType::Text);
                inner.send_http_request(&owned_url, &options).await
            }
            .boxed()
        })
    }

    async fn get_remote_file_mime_type(self: &Arc<Self>, url: &str, ignore_cache: bool) -> String {
        if !ignore_cache {
            if let Some(cached) = self.mimetype_cache.get(url).map(|entry| entry.value().clone()) {
                return cached;
            }
        }

        match Self::perform_head(self, url).await {
            Ok(response) => {
                let mimetype = response
                    .header("Content-Type")
                    .map(|value| value.split(';').next().unwrap_or_default().trim().to_string())
                    .unwrap_or_default();
                if !mimetype.is_empty() {
                    self.mimetype_cache.insert(url.to_string(), mimetype.clone());
                }
                mimetype
            },
            Err(error) => {
                tracing::debug!(url = %url, status = error.status, "Mimetype probe failed");
                String::new()
            },
        }
    }
}

/// `{error, errortype}` entries of the upload endpoint.
fn upload_error(error: &Value, errortype: Option<&Value>) -> WsError {
    let text = |value: &Value| match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    WsError::Ws(WsErrorPayload {
        errorcode: errortype.map(text),
        message: text(error),
        ..WsErrorPayload::default()
    })
}
