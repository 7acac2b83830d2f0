//! Native (mobile) transport.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;

use super::redirect::{follow_redirects, RedirectSource, LOCATION};
use super::{codes, execute, HttpRequestOptions, HttpResponse, Transport, TransportError, TransportKind};

/// Transport with native error codes and manual cross-scheme redirects.
#[derive(Debug, Clone)]
pub struct NativeTransport {
    client: Client,
    max_redirects: u32,
}

impl NativeTransport {
    /// `client` should stop at cross-scheme redirects, see
    /// [`crate::utils::http::create_native_client`].
    pub fn new(client: Client, max_redirects: u32) -> Self {
        Self { client, max_redirects }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    async fn send(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        let client = &self.client;
        follow_redirects(url, self.max_redirects, LOCATION, |target: String| async move {
            execute(client, &target, options, classify_native_error).await
        })
        .await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }
}

/// Error answers are provisional responses; successful ones are final.
impl RedirectSource for Result<HttpResponse, TransportError> {
    fn redirect_headers(&self) -> Option<&HeaderMap> {
        match self {
            Ok(_) => None,
            Err(error) => error.response.as_deref().map(|response| &response.headers),
        }
    }
}

/// Map a reqwest failure to the native client's error codes.
pub(crate) fn classify_native_error(error: &reqwest::Error) -> i32 {
    if error.is_timeout() {
        return codes::TIMEOUT;
    }
    if error.is_builder() {
        return codes::UNSUPPORTED_URL;
    }
    if error.is_connect() {
        let chain = error_chain_text(error);
        if ["certificate", "tls", "ssl", "handshake"].iter().any(|needle| chain.contains(needle)) {
            return codes::SSL_EXCEPTION;
        }
        if ["dns", "resolve", "lookup", "name or service"].iter().any(|needle| chain.contains(needle))
        {
            return codes::SERVER_NOT_FOUND;
        }
        return codes::NOT_CONNECTED;
    }
    if error.is_decode() || error.is_body() {
        return codes::POST_PROCESSING_FAILED;
    }
    codes::GENERIC
}

fn error_chain_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push(' ');
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpMethod;

    #[tokio::test]
    async fn test_invalid_url_is_unsupported() {
        let transport = NativeTransport::new(Client::new(), 5);
        let error = transport
            .send("not a url", &HttpRequestOptions::new(HttpMethod::Get))
            .await
            .unwrap_err();
        assert_eq!(error.status, codes::UNSUPPORTED_URL);
        assert!(error.response.is_none());
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_connected() {
        let transport = NativeTransport::new(Client::new(), 5);
        let error = transport
            .send("http://127.0.0.1:9/", &HttpRequestOptions::get())
            .await
            .unwrap_err();
        assert_eq!(error.status, codes::NOT_CONNECTED);
    }
}
