//! AJAX engine: calls to `lib/ajax/service.php` and `service-nologin.php`.

use futures::future::FutureExt;
use moodle_ws_types::{AjaxPreSets, ErrorDebug, WsError, WsErrorPayload};
use serde_json::{json, Value};
use std::sync::Arc;
use url::form_urlencoded::byte_serialize;
use validator::Validate;

use super::coerce::is_falsy;
use super::convert::convert_values_to_string;
use super::inflight::InFlightCache;
use super::{Inner, WsClient};
use crate::errors::{get_error_message_from_error, ErrorLike};
use crate::transport::{codes, HttpRequestOptions, TransportError, TransportKind};

/// Oldest Moodle release with the AJAX endpoints the app relies on.
const MINIMUM_MOODLE_VERSION: &str = "3.1";

const AJAX_ERROR_TYPE: &str = "CoreAjaxError";

impl WsClient {
    /// Call a function through the AJAX endpoint.
    ///
    /// Identical concurrent calls (same site, method and arguments) share a
    /// single request and its outcome.
    pub async fn call_ajax(
        &self,
        method: &str,
        data: Value,
        presets: &AjaxPreSets,
    ) -> Result<Value, WsError> {
        let key = InFlightCache::<Result<Value, WsError>>::key(
            "ajax",
            &presets.site_url,
            Some(&json!({ "methodname": method, "args": data })),
        );
        let inner = Arc::clone(&self.inner);
        let method = method.to_string();
        let presets = presets.clone();
        let ttl = self.inner.request_timeout();

        self.inner
            .ajax_calls
            .get_or_insert_with(&key, ttl, move || {
                async move { inner.perform_ajax(&method, data, &presets).await }.boxed()
            })
            .await
    }
}

impl Inner {
    async fn perform_ajax(
        &self,
        method: &str,
        data: Value,
        presets: &AjaxPreSets,
    ) -> Result<Value, WsError> {
        if presets.validate().is_err() {
            let message = self.t("core.unexpectederror");
            self.log_error(method, AJAX_ERROR_TYPE, &message, data);
            return Err(WsError::Ajax { info: plain_info(message), status: 0 });
        }
        if !self.network.is_online() {
            let message = self.t("core.networkerrormsg");
            self.log_error(method, AJAX_ERROR_TYPE, &message, data);
            return Err(WsError::Ajax { info: plain_info(message), status: 0 });
        }

        let result = self.send_ajax(method, &data, presets).await;
        if let Err(error) = &result {
            let code = error.error_code().unwrap_or("undefined");
            self.log_error(method, &format!("{AJAX_ERROR_TYPE} - {code}"), error.message(), data);
        }
        result
    }

    async fn send_ajax(
        &self,
        method: &str,
        data: &Value,
        presets: &AjaxPreSets,
    ) -> Result<Value, WsError> {
        let script = if presets.no_login { "service-nologin.php" } else { "service.php" };
        let args = convert_values_to_string(data, false).unwrap_or(Value::Null);
        let batch = json!([{ "index": 0, "methodname": method, "args": args }]);
        let lang = self.translator.current_language();

        // `info` has no function, it matches Moodle's AMD ajax module for debugging.
        let mut url = format!("{}/lib/ajax/{script}?info={method}&lang={lang}", presets.site_url);

        let options = if presets.no_login && presets.use_get {
            let encoded: String = byte_serialize(batch.to_string().as_bytes()).collect();
            url.push_str("&args=");
            url.push_str(&encoded);
            HttpRequestOptions::get()
        } else {
            HttpRequestOptions::post_json(batch)
        };

        match self.send_http_request(&url, &options).await {
            Ok(response) => self.parse_ajax_response(method, response.body.into_value(), presets).await,
            Err(error) => Err(self.classify_ajax_failure(&error, &presets.site_url).await),
        }
    }

    async fn parse_ajax_response(
        &self,
        method: &str,
        mut data: Value,
        presets: &AjaxPreSets,
    ) -> Result<Value, WsError> {
        if is_falsy(&data) && !presets.response_expected {
            data = json!([{}]);
        }

        // The endpoint answers with an object on error and an array on success.
        if is_falsy(&data) || !(data.is_object() || data.is_array()) {
            let details = self.invalid_response_details(method);
            let info = self.site_error_info(&presets.site_url, "invalidresponse", details).await;
            return Err(WsError::Ajax { info, status: 0 });
        }
        if data.get("error").is_some_and(|error| !is_falsy(error)) {
            return Err(WsError::AjaxWs(WsErrorPayload::from_value(&data)));
        }

        let Some(first) = data.get(0) else {
            let details = self.invalid_response_details(method);
            let info = self.site_error_info(&presets.site_url, "invalidresponse", details).await;
            return Err(WsError::Ajax { info, status: 0 });
        };
        if first.get("error").is_some_and(|error| !is_falsy(error)) {
            let exception = first.get("exception").cloned().unwrap_or(Value::Null);
            return Err(WsError::AjaxWs(WsErrorPayload::from_value(&exception)));
        }

        Ok(first.get("data").cloned().unwrap_or(Value::Null))
    }

    /// Transport failure to [`WsError::Ajax`], by native code first, then HTTP status.
    async fn classify_ajax_failure(&self, error: &TransportError, site_url: &str) -> WsError {
        let message = get_error_message_from_error(&ErrorLike::from(error)).filter(|m| !m.is_empty());
        let or_default = |default: &str| message.clone().unwrap_or_else(|| default.to_string());

        let native = if self.transport.kind() == TransportKind::Native {
            match error.status {
                codes::SSL_EXCEPTION => {
                    let details = or_default("Invalid certificate");
                    Some(ErrorDebug::new(
                        "invalidcertificate",
                        self.translator.instant("core.certificaterror", &[("details", &details)]),
                    ))
                },
                codes::SERVER_NOT_FOUND => {
                    Some(ErrorDebug::new("servernotfound", or_default("Server could not be found")))
                },
                codes::TIMEOUT => Some(ErrorDebug::new("requesttimeout", or_default("Request timed out"))),
                codes::UNSUPPORTED_URL => {
                    Some(ErrorDebug::new("unsupportedurl", or_default("Url not supported")))
                },
                codes::NOT_CONNECTED => Some(ErrorDebug::new(
                    "connectionerror",
                    or_default("Connection error, is network available?"),
                )),
                codes::ABORTED => Some(ErrorDebug::new("requestaborted", or_default("Request aborted"))),
                codes::POST_PROCESSING_FAILED => Some(ErrorDebug::new(
                    "requestprocessingfailed",
                    or_default("Request processing failed"),
                )),
                _ => None,
            }
        } else {
            None
        };

        let debug = native.unwrap_or_else(|| {
            if error.status == 404 {
                ErrorDebug::new(
                    "endpointnotfound",
                    self.translator.instant("core.ajaxendpointnotfound", &[("$a", MINIMUM_MOODLE_VERSION)]),
                )
            } else {
                let details =
                    format!("[Response status code: {}] {}", error.status, or_default("Unknown error"));
                ErrorDebug::new(
                    "serverconnectionajax",
                    self.translator.instant("core.serverconnection", &[("details", &details)]),
                )
            }
        });

        let mut info = self.site_error_info(site_url, &debug.code, debug.details.clone()).await;
        info.debug = Some(debug);
        WsError::Ajax { info, status: error.status }
    }
}

fn plain_info(message: String) -> moodle_ws_types::SiteErrorInfo {
    moodle_ws_types::SiteErrorInfo { message, ..Default::default() }
}
