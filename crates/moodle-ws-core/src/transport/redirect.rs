//! Manual redirect following.
//!
//! Some platform clients refuse to follow redirects that switch between HTTP
//! and HTTPS. Both the native transport and the downloader re-issue the
//! request against the `location` header themselves, with a bounded hop count.

use reqwest::header::HeaderMap;
use std::future::Future;

/// Header carrying the redirect target.
pub const LOCATION: &str = "location";

/// Outcome of one attempt that may point somewhere else.
pub trait RedirectSource {
    /// Headers to inspect for a redirect, or `None` when this outcome is final.
    fn redirect_headers(&self) -> Option<&HeaderMap>;
}

/// Send to `url`, then keep re-sending to the redirect target found in
/// `header` until there is none or `max_redirects` hops were followed.
///
/// When the chain is still redirecting after `max_redirects` hops, the
/// outcome of the first request is returned, so callers see the answer for
/// the URL they asked for.
pub async fn follow_redirects<R, F, Fut>(
    url: &str,
    max_redirects: u32,
    header: &str,
    mut send: F,
) -> R
where
    R: RedirectSource,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = R>,
{
    let mut target = url.to_string();
    let mut remaining = max_redirects;
    let mut original: Option<R> = None;

    loop {
        let outcome = send(target.clone()).await;

        let location = outcome
            .redirect_headers()
            .and_then(|headers| headers.get(header))
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(|value| resolve_location(&target, value));

        match location {
            Some(next) if remaining > 0 => {
                remaining -= 1;
                tracing::debug!(from = %target, to = %next, "Following redirect manually");
                original.get_or_insert(outcome);
                target = next;
            },
            Some(next) => {
                tracing::warn!(url = %url, to = %next, max_redirects, "Too many redirects");
                return original.unwrap_or(outcome);
            },
            None => return outcome,
        }
    }
}

/// Resolve a possibly relative `location` against the URL that returned it.
fn resolve_location(base: &str, location: &str) -> String {
    url::Url::parse(base)
        .and_then(|base| base.join(location))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| location.to_string())
}
