//! HTTP client construction.

use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

/// Create the client used by the browser transport. Redirects are followed by reqwest.
pub fn create_client(user_agent: &str) -> Result<Client, String> {
    base_builder(user_agent)
        .redirect(Policy::limited(10))
        .build()
        .map_err(|e| format!("HTTP client builder failed: {e}"))
}

/// Create the client used by the native transport and the file transfer.
///
/// Same-scheme redirects are followed automatically. A redirect that switches
/// between HTTP and HTTPS is returned as-is so the caller can follow its
/// `location` header manually.
pub fn create_native_client(user_agent: &str, max_redirects: u32) -> Result<Client, String> {
    let max_redirects = max_redirects as usize;
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error("too many redirects");
        }
        let same_scheme = attempt
            .previous()
            .last()
            .map_or(true, |prev| prev.scheme() == attempt.url().scheme());
        if same_scheme {
            attempt.follow()
        } else {
            attempt.stop()
        }
    });

    base_builder(user_agent)
        .redirect(policy)
        .build()
        .map_err(|e| format!("HTTP client builder failed: {e}"))
}

/// Shared builder with keepalive settings.
fn base_builder(user_agent: &str) -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(user_agent.to_string())
        .connect_timeout(Duration::from_secs(30))
        .tcp_nodelay(true)
        .http2_keep_alive_interval(Duration::from_secs(25))
        .http2_keep_alive_timeout(Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
}
