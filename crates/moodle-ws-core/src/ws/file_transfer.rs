//! Platform file-transfer primitive: streaming download and multipart upload.
//!
//! This layer only moves bytes. Redirect following, temp-file handling and
//! response parsing live in the engine ([`crate::WsClient::download_file`],
//! [`crate::WsClient::upload_file`]).

use async_trait::async_trait;
use futures::StreamExt;
use moodle_ws_types::TransferProgress;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::transport::redirect::RedirectSource;
use crate::transport::{codes, HttpResponse, ResponseBody, TransportError};

/// Progress callback invoked as bytes move.
pub type ProgressFn = dyn Fn(TransferProgress) + Send + Sync;

/// Result of one download hop.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub headers: HeaderMap,
    pub bytes_written: u64,
}

/// Multipart upload description.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
    /// Extra form fields (`token`, `filearea`, `itemid`).
    pub params: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub status: u16,
    /// Raw response text.
    pub response: String,
}

#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Download `url` into `target`, overwriting it.
    ///
    /// Redirect answers (3xx) are returned as successful outcomes carrying the
    /// `location` header; 4xx and 5xx answers are errors.
    async fn download(
        &self,
        url: &str,
        target: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<DownloadOutcome, TransportError>;

    /// Upload `file_path` as a single multipart file part.
    async fn upload(
        &self,
        file_path: &Path,
        url: &str,
        request: &UploadRequest,
        on_progress: Option<&ProgressFn>,
    ) -> Result<UploadOutcome, TransportError>;
}

/// A hop that answered with headers may redirect; failed hops are final.
impl RedirectSource for Result<DownloadOutcome, TransportError> {
    fn redirect_headers(&self) -> Option<&HeaderMap> {
        self.as_ref().ok().map(|outcome| &outcome.headers)
    }
}

/// [`FileTransfer`] on top of reqwest.
#[derive(Debug, Clone)]
pub struct HttpFileTransfer {
    client: Client,
}

impl HttpFileTransfer {
    /// `client` should stop at cross-scheme redirects, see
    /// [`crate::utils::http::create_native_client`].
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn io_error(error: &std::io::Error) -> TransportError {
    TransportError::new(codes::GENERIC, format!("File error: {error}"))
}

fn request_error(error: &reqwest::Error) -> TransportError {
    let status = error.status().map_or(0, |status| i32::from(status.as_u16()));
    TransportError::new(status, error.to_string())
}

/// Failed answer with its text body kept for the error message.
fn failure_response(status: StatusCode, headers: HeaderMap, url: &str, text: String) -> TransportError {
    TransportError::from_response(HttpResponse {
        body: ResponseBody::Text(text),
        headers,
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        url: url.to_string(),
    })
}

async fn read_failure(response: Response, url: &str) -> TransportError {
    let status = response.status();
    let headers = response.headers().clone();
    // An unreadable body still reports the status.
    let text = response.text().await.unwrap_or_default();
    failure_response(status, headers, url, text)
}

#[async_trait]
impl FileTransfer for HttpFileTransfer {
    async fn download(
        &self,
        url: &str,
        target: &Path,
        on_progress: Option<&ProgressFn>,
    ) -> Result<DownloadOutcome, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| request_error(&e))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(read_failure(response, url).await);
        }
        let headers = response.headers().clone();
        if status.is_redirection() {
            return Ok(DownloadOutcome { headers, bytes_written: 0 });
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(target).await.map_err(|e| io_error(&e))?;
        let mut loaded = 0_u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| request_error(&e))?;
            file.write_all(&chunk).await.map_err(|e| io_error(&e))?;
            loaded += chunk.len() as u64;
            if let Some(on_progress) = on_progress {
                on_progress(TransferProgress { loaded, total });
            }
        }
        file.flush().await.map_err(|e| io_error(&e))?;

        Ok(DownloadOutcome { headers, bytes_written: loaded })
    }

    async fn upload(
        &self,
        file_path: &Path,
        url: &str,
        request: &UploadRequest,
        on_progress: Option<&ProgressFn>,
    ) -> Result<UploadOutcome, TransportError> {
        let contents = tokio::fs::read(file_path).await.map_err(|e| io_error(&e))?;
        let total = contents.len() as u64;

        let part = Part::bytes(contents)
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
            .map_err(|e| TransportError::new(codes::GENERIC, e.to_string()))?;
        let form = request
            .params
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()))
            .part(request.file_key.clone(), part);

        let mut builder = self.client.post(url).multipart(form);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| request_error(&e))?;
        if let Some(on_progress) = on_progress {
            on_progress(TransferProgress { loaded: total, total: Some(total) });
        }

        let status = response.status();
        if !status.is_success() {
            return Err(read_failure(response, url).await);
        }
        let text = response.text().await.map_err(|e| request_error(&e))?;
        Ok(UploadOutcome { status: status.as_u16(), response: text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_download_streams_to_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("file.txt");
        let seen = Arc::new(AtomicU64::new(0));
        let progress_seen = Arc::clone(&seen);
        let progress = move |p: TransferProgress| progress_seen.store(p.loaded, Ordering::SeqCst);

        let outcome = HttpFileTransfer::new(Client::new())
            .download(&format!("{}/file.txt", server.uri()), &target, Some(&progress as &ProgressFn))
            .await
            .unwrap();

        assert_eq!(outcome.bytes_written, 11);
        assert_eq!(seen.load(Ordering::SeqCst), 11);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_download_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let error = HttpFileTransfer::new(Client::new())
            .download(&format!("{}/missing", server.uri()), &dir.path().join("x"), None)
            .await
            .unwrap_err();
        assert_eq!(error.status, 404);
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_failed_answers_keep_their_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("<p>Down for maintenance</p>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<p>Quota exceeded</p>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let transfer = HttpFileTransfer::new(Client::new());

        let error = transfer
            .download(&format!("{}/file", server.uri()), &dir.path().join("file"), None)
            .await
            .unwrap_err();
        assert_eq!(error.status, 503);
        assert_eq!(error.body_text(), Some("<p>Down for maintenance</p>"));

        let source = dir.path().join("notes.txt");
        std::fs::write(&source, "notes").unwrap();
        let request = UploadRequest {
            file_key: "file".into(),
            file_name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            params: Vec::new(),
            headers: HashMap::new(),
        };
        let error = transfer
            .upload(&source, &format!("{}/webservice/upload.php", server.uri()), &request, None)
            .await
            .unwrap_err();
        assert_eq!(error.status, 500);
        assert_eq!(error.body_text(), Some("<p>Quota exceeded</p>"));
        assert!(error.response.is_some_and(|response| response.url.ends_with("/webservice/upload.php")));
    }
}
