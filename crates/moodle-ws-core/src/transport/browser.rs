//! Browser transport.

use async_trait::async_trait;
use reqwest::Client;

use super::{execute, HttpMethod, HttpRequestOptions, HttpResponse, Transport, TransportError, TransportKind};

/// Transport limited to GET, POST and HEAD. Failures without an answer have status 0.
#[derive(Debug, Clone)]
pub struct BrowserTransport {
    client: Client,
}

impl BrowserTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    async fn send(
        &self,
        url: &str,
        options: &HttpRequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        if !matches!(options.method, HttpMethod::Get | HttpMethod::Post | HttpMethod::Head) {
            return Err(TransportError::new(0, "Method not implemented yet."));
        }
        execute(&self.client, url, options, |_| 0).await
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Browser
    }
}
