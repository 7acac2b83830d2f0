//! RPC engine: authenticated calls to `webservice/rest/server.php`.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use moodle_ws_types::{StatusWithWarnings, TypeExpected, WsError, WsErrorPayload, WsPreSets};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::oneshot;
use validator::Validate;

use super::coerce::{coerce, is_falsy};
use super::convert::convert_values_to_string;
use super::retry_queue::retry_after;
use super::{redacted, split, Inner, WsClient};
use crate::errors::{get_error_message_from_error, ErrorLike};
use crate::transport::{codes, HttpRequestOptions, ResponseBody, ResponseType, TransportError};
use crate::utils::form;

/// Plugin content calls are cached by the app, so their failures are logged in full.
const SITE_PLUGIN_CONTENT_METHOD: &str = "tool_mobile_get_content";

impl WsClient {
    /// Call a web-service function.
    ///
    /// `data` must be an object (or null for no arguments). Calls made while
    /// the retry queue is non-empty wait behind it.
    pub async fn call(&self, method: &str, data: Value, presets: &WsPreSets) -> Result<Value, WsError> {
        Arc::clone(&self.inner).call(method, data, presets).await
    }

    /// [`WsClient::call`], deserializing the result.
    pub async fn call_as<T>(&self, method: &str, data: Value, presets: &WsPreSets) -> Result<T, WsError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.call(method, data, presets).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::warn!(method = %method, error = %e, "Unexpected response shape");
            WsError::generic(
                self.inner.translator.instant("core.errorinvalidresponse", &[("method", method)]),
            )
        })
    }
}

impl Inner {
    pub(super) async fn call(
        self: Arc<Self>,
        method: &str,
        data: Value,
        presets: &WsPreSets,
    ) -> Result<Value, WsError> {
        if let Err(e) = presets.validate() {
            tracing::debug!(method = %method, error = %e, "Invalid presets");
            return Err(WsError::generic(self.t("core.unexpectederror")));
        }
        if !self.network.is_online() {
            return Err(WsError::network(self.t("core.networkerrormsg")));
        }

        let data = if presets.clean_unicode {
            convert_values_to_string(&data, true)
                .ok_or_else(|| WsError::generic(self.t("core.unicodenotsupportedcleanerror")))?
        } else {
            data
        };
        let mut data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(WsError::generic(self.t("core.unexpectederror"))),
        };
        data.insert("wsfunction".to_string(), Value::String(method.to_string()));
        data.insert("wstoken".to_string(), Value::String(presets.ws_token.clone()));

        let site_url = format!("{}/webservice/rest/server.php?moodlewsrestformat=json", presets.site_url);

        if !self.retry.is_empty() {
            tracing::warn!(method = %method, pending = self.retry.len(), "Calls locked, trying later...");
            let receiver = self.retry.enqueue(method, &site_url, data, presets.clone(), 0);
            if !self.retry.is_cooling_down() {
                self.process_retry_queue();
            }
            return self.await_deferred(receiver).await;
        }

        self.perform_post(method.to_string(), site_url, data, presets.clone(), 0).await
    }

    /// Send a call, split into chunks when `split_request` applies.
    pub(super) fn perform_post(
        self: Arc<Self>,
        method: String,
        site_url: String,
        data: Map<String, Value>,
        presets: WsPreSets,
        attempts: u32,
    ) -> BoxFuture<'static, Result<Value, WsError>> {
        async move {
            let split = presets.split_request.clone();
            let Some(chunks) = split.as_ref().and_then(|split| split::split_data(&data, split)) else {
                return self.perform_single_post(method, site_url, data, presets, attempts).await;
            };

            tracing::debug!(method = %method, chunks = chunks.len(), "Splitting request");
            let calls = chunks.into_iter().map(|chunk| {
                Arc::clone(&self).perform_single_post(
                    method.clone(),
                    site_url.clone(),
                    chunk,
                    presets.clone(),
                    attempts,
                )
            });
            let results = try_join_all(calls).await?;

            Ok(match split {
                Some(split) => split::combine_results(results, &split),
                None => Value::Null,
            })
        }
        .boxed()
    }

    async fn perform_single_post(
        self: Arc<Self>,
        method: String,
        site_url: String,
        data: Map<String, Value>,
        presets: WsPreSets,
        attempts: u32,
    ) -> Result<Value, WsError> {
        // `wsfunction` in the URL only helps debugging; POST variables take precedence.
        let url = format!("{site_url}&wsfunction={method}");
        let response_type = if presets.type_expected.wants_text_response() {
            ResponseType::Text
        } else {
            ResponseType::Json
        };
        let options =
            HttpRequestOptions::post_form(form::serialize_map(&data)).with_response_type(response_type);

        let result = match self.send_http_request(&url, &options).await {
            Ok(response) => self.parse_response(&method, response.body, &presets).await,
            Err(error) if error.status == 429 => {
                return self.queue_rate_limited(method, site_url, data, presets, attempts, &error).await;
            },
            Err(error) => Err(self.classify_post_failure(&error, &presets.site_url).await),
        };

        if let Err(error) = &result {
            self.log_error(&method, error.type_name(), error.message(), redacted(&data));
        }
        result
    }

    /// Validate the body of a successful answer against the presets.
    async fn parse_response(
        &self,
        method: &str,
        body: ResponseBody,
        presets: &WsPreSets,
    ) -> Result<Value, WsError> {
        let data = match body {
            ResponseBody::Text(text) => text_body_value(text, presets.type_expected),
            other => other.into_value(),
        };

        // Some functions always return null, others a primitive or null.
        if data.is_null()
            && (!presets.response_expected || presets.type_expected != TypeExpected::Object)
        {
            return Ok(Value::Null);
        }
        if !presets.response_expected && is_falsy(&data) {
            return Ok(Value::Null);
        }
        if is_falsy(&data) {
            let details = self.invalid_response_details(method);
            return Err(self.cannot_connect_error(&presets.site_url, "serverconnectionpost", details).await);
        }
        if data.get("exception").is_some() {
            if method == SITE_PLUGIN_CONTENT_METHOD {
                tracing::error!(method = %method, response = %data, "Error calling WS");
            }
            return Err(WsError::Ws(WsErrorPayload::from_value(&data)));
        }

        let data = match coerce(data, presets.type_expected) {
            Ok(data) => data,
            Err(_) => {
                tracing::warn!(
                    method = %method,
                    expected = %presets.type_expected,
                    "Response does not have the expected type"
                );
                let details =
                    self.translator.instant("core.errorinvalidresponse", &[("method", method)]);
                return Err(self.cannot_connect_error(&presets.site_url, "invalidresponse", details).await);
            },
        };

        if data.get("debuginfo").is_some() {
            let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
            return Err(WsError::generic(format!("Error. {message}")));
        }
        Ok(data)
    }

    /// Domain error for a failed POST other than 429.
    async fn classify_post_failure(&self, error: &TransportError, site_url: &str) -> WsError {
        if error.status == codes::SSL_EXCEPTION {
            let details = get_error_message_from_error(&ErrorLike::from(error))
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            let details = self.translator.instant("core.certificaterror", &[("details", &details)]);
            return self.cannot_connect_error(site_url, "invalidcertificate", details).await;
        }
        self.transport_failure(error)
    }

    /// Queue a rate-limited call and start the cooldown if none is running.
    async fn queue_rate_limited(
        self: Arc<Self>,
        method: String,
        site_url: String,
        data: Map<String, Value>,
        presets: WsPreSets,
        attempts: u32,
        error: &TransportError,
    ) -> Result<Value, WsError> {
        let attempts = attempts + 1;
        if self.config.max_retry_attempts.is_some_and(|max| attempts > max) {
            tracing::warn!(method = %method, attempts, "Giving up after repeated rate limiting");
            let error = self.create_http_error(error, 429);
            self.log_error(&method, error.type_name(), error.message(), redacted(&data));
            return Err(error);
        }

        let receiver = self.retry.enqueue(&method, &site_url, data, presets, attempts);

        let default = std::time::Duration::from_secs(self.config.retry_after_default_secs);
        let cooldown = retry_after(error.header("Retry-After"), default);
        if self.retry.start_cooldown(cooldown) {
            tracing::warn!(
                status = %error.status,
                cooldown_secs = cooldown.as_secs(),
                pending = self.retry.len(),
                "Rate limited. Retrying later"
            );
            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                tokio::time::sleep(cooldown).await;
                tracing::warn!(pending = inner.retry.len(), "Retrying now");
                inner.retry.finish_cooldown();
                inner.process_retry_queue();
            });
        } else {
            tracing::warn!(method = %method, "Calls locked, trying later...");
        }

        self.await_deferred(receiver).await
    }

    async fn await_deferred(
        &self,
        receiver: oneshot::Receiver<Result<Value, WsError>>,
    ) -> Result<Value, WsError> {
        receiver.await.unwrap_or_else(|_| Err(WsError::generic(self.t("core.unexpectederror"))))
    }

    /// Drain the retry queue in FIFO order with pacing, until it is empty or
    /// a new cooldown starts. Only one drain loop runs at a time.
    pub(super) fn process_retry_queue(self: &Arc<Self>) {
        if !self.retry.begin_drain() {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if inner.retry.is_cooling_down() {
                    break;
                }
                let Some(entry) = inner.retry.pop() else {
                    break;
                };
                tokio::time::sleep(inner.config.retry_pacing()).await;

                let worker = Arc::clone(&inner);
                tokio::spawn(async move {
                    let result = worker
                        .perform_post(entry.method, entry.site_url, entry.data, entry.presets, entry.attempts)
                        .await;
                    // The caller may have gone away.
                    let _ = entry.deferred.send(result);
                });
            }
            tracing::warn!(
                pending = inner.retry.len(),
                cooling_down = inner.retry.is_cooling_down(),
                "Retry queue has stopped"
            );
            inner.retry.end_drain();
            if !inner.retry.is_empty() && !inner.retry.is_cooling_down() {
                inner.process_retry_queue();
            }
        });
    }
}

/// Interpret a text answer requested for a primitive result.
///
/// Empty text stays an empty string, which callers expecting a result reject.
/// Exception objects are decoded so they surface as server errors. For
/// strings, a JSON string literal is unwrapped.
fn text_body_value(text: String, type_expected: TypeExpected) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) if map.contains_key("exception") => Value::Object(map),
        Ok(Value::String(inner)) if type_expected.effective() == TypeExpected::String => {
            Value::String(inner)
        },
        _ => Value::String(text),
    }
}

/// Raise the first warning of a `{status, warnings}` answer when `status` is false.
pub fn throw_on_failed_status(response: &StatusWithWarnings, default_message: &str) -> Result<(), WsError> {
    if response.status {
        return Ok(());
    }
    match response.warnings.first() {
        Some(warning) => Err(WsError::Ws(WsErrorPayload {
            warningcode: Some(warning.warningcode.clone()),
            message: warning.message.clone(),
            ..WsErrorPayload::default()
        })),
        None => Err(WsError::generic(default_message)),
    }
}
