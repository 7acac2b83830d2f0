use super::*;
use async_trait::async_trait;
use moodle_ws_types::{AjaxPreSets, TypeExpected, WsPreSets};
use parking_lot::Mutex;
use serde_json::json;

use crate::transport::RequestBody;

type Reply = Box<dyn Fn(&str, &HttpRequestOptions) -> Result<HttpResponse, TransportError> + Send + Sync>;

/// Transport answering from a closure and recording every request.
struct ScriptedTransport {
    kind: TransportKind,
    requests: Mutex<Vec<(String, HttpRequestOptions)>>,
    reply: Reply,
}

impl ScriptedTransport {
    fn new<F>(kind: TransportKind, reply: F) -> Arc<Self>
    where
        F: Fn(&str, &HttpRequestOptions) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self { kind, requests: Mutex::new(Vec::new()), reply: Box::new(reply) })
    }

    fn requests(&self) -> Vec<(String, HttpRequestOptions)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, url: &str, options: &HttpRequestOptions) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push((url.to_string(), options.clone()));
        (self.reply)(url, options)
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

struct Offline;

impl NetworkStatus for Offline {
    fn is_online(&self) -> bool {
        false
    }

    fn is_network_access_limited(&self) -> bool {
        false
    }
}

struct Metered;

impl NetworkStatus for Metered {
    fn is_online(&self) -> bool {
        true
    }

    fn is_network_access_limited(&self) -> bool {
        true
    }
}

struct Mobile;

impl Platform for Mobile {
    fn is_mobile(&self) -> bool {
        true
    }
}

fn ok(body: ResponseBody) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        body,
        headers: HeaderMap::new(),
        status: 200,
        status_text: "OK".to_string(),
        url: String::new(),
    })
}

fn client_with(transport: Arc<ScriptedTransport>) -> (WsClient, Arc<MemoryErrorLog>) {
    let log = Arc::new(MemoryErrorLog::new());
    let client = WsClient::builder()
        .transport(transport)
        .error_log(Arc::clone(&log) as Arc<dyn ErrorLogSink>)
        .build()
        .unwrap();
    (client, log)
}

fn presets() -> WsPreSets {
    WsPreSets::new("https://school.example", "secret-token")
}

#[test]
fn test_builder_picks_transport_from_platform() {
    let desktop = WsClient::new(WsClientConfig::default()).unwrap();
    assert_eq!(desktop.transport_kind(), TransportKind::Browser);

    let mobile = WsClient::builder().platform(Arc::new(Mobile)).build().unwrap();
    assert_eq!(mobile.transport_kind(), TransportKind::Native);
}

#[test]
fn test_builder_rejects_invalid_config() {
    let config = WsClientConfig { user_agent: String::new(), ..WsClientConfig::default() };
    assert!(WsClient::new(config).is_err());
}

#[test]
fn test_request_timeout_follows_network_quality() {
    let metered = WsClient::builder().network_status(Arc::new(Metered)).build().unwrap();
    assert_eq!(metered.request_timeout(), Duration::from_secs(30));
    let wifi = WsClient::new(WsClientConfig::default()).unwrap();
    assert_eq!(wifi.request_timeout(), Duration::from_secs(60));
}

#[tokio::test]
async fn test_call_requires_connectivity() {
    let transport = ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Empty));
    let client = WsClient::builder()
        .transport(transport.clone())
        .network_status(Arc::new(Offline))
        .build()
        .unwrap();

    let error = client.call("core_webservice_get_site_info", json!({}), &presets()).await.unwrap_err();
    assert!(error.is_network_error());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_call_rejects_invalid_presets() {
    let transport = ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Empty));
    let (client, _) = client_with(transport.clone());

    let error = client
        .call("core_webservice_get_site_info", json!({}), &WsPreSets::new("https://school.example", ""))
        .await
        .unwrap_err();
    assert_eq!(error.message(), EnglishStrings::new().instant("core.unexpectederror", &[]));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_call_posts_form_with_function_and_token() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| ok(ResponseBody::Json(json!({"sitename": "School"}))),
    );
    let (client, _) = client_with(transport.clone());

    let result = client
        .call("core_webservice_get_site_info", json!({"serviceshortnames": ["moodle_mobile_app"]}), &presets())
        .await
        .unwrap();
    assert_eq!(result, json!({"sitename": "School"}));

    let requests = transport.requests();
    let (url, options) = &requests[0];
    assert_eq!(
        url,
        "https://school.example/webservice/rest/server.php?moodlewsrestformat=json&wsfunction=core_webservice_get_site_info"
    );
    let Some(RequestBody::Form(body)) = &options.body else {
        panic!("expected a form body, got {:?}", options.body);
    };
    assert!(body.contains("wsfunction=core_webservice_get_site_info"));
    assert!(body.contains("wstoken=secret-token"));
    assert!(body.contains("serviceshortnames%5B0%5D=moodle_mobile_app"));
    assert_eq!(options.timeout, RequestTimeout::After(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_primitive_results_are_requested_as_text() {
    let transport =
        ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Text("0".into())));
    let (client, _) = client_with(transport.clone());

    let result = client
        .call("mod_forum_can_add_discussion", json!({}), &presets().with_type_expected(TypeExpected::Number))
        .await
        .unwrap();
    assert_eq!(result, json!(0));
    assert_eq!(transport.requests()[0].1.response_type, ResponseType::Text);
}

#[tokio::test]
async fn test_invalid_boolean_is_invalid_response() {
    let transport =
        ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Text("yes".into())));
    let (client, log) = client_with(transport);

    let error = client
        .call("core_flag", json!({}), &presets().with_type_expected(TypeExpected::Boolean))
        .await
        .unwrap_err();
    assert!(matches!(error, WsError::Site(_)));
    assert_eq!(error.debug().map(|debug| debug.code.as_str()), Some("invalidresponse"));
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_null_result_when_no_response_expected() {
    let transport =
        ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Json(Value::Null)));
    let (client, _) = client_with(transport);

    let result = client
        .call("core_update", json!({}), &presets().with_response_expected(false))
        .await
        .unwrap();
    assert_eq!(result, Value::Null);

    let error = client.call("core_update", json!({}), &presets()).await.unwrap_err();
    assert_eq!(error.debug().map(|debug| debug.code.as_str()), Some("serverconnectionpost"));
}

#[tokio::test]
async fn test_exception_payload_is_ws_error_and_logged_without_token() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| {
            ok(ResponseBody::Json(json!({
                "exception": "moodle_exception",
                "errorcode": "invalidtoken",
                "message": "Invalid token - token not found",
            })))
        },
    );
    let (client, log) = client_with(transport);

    let error = client.call("core_course_get_courses", json!({"ids": [1]}), &presets()).await.unwrap_err();
    assert!(error.is_expired_token_error());

    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].method, "core_course_get_courses");
    assert_eq!(entries[0].error_type, "WSError");
    assert!(entries[0].data.get("wstoken").is_none());
    assert_eq!(entries[0].data["ids"], json!([1]));
}

#[tokio::test]
async fn test_debuginfo_without_exception_is_generic() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| ok(ResponseBody::Json(json!({"debuginfo": "trace", "message": "Broken"}))),
    );
    let (client, _) = client_with(transport);

    let error = client.call("core_x", json!({}), &presets()).await.unwrap_err();
    assert_eq!(error, WsError::generic("Error. Broken"));
}

#[tokio::test]
async fn test_certificate_failure_is_site_error() {
    let transport = ScriptedTransport::new(
        TransportKind::Native,
        |_, _| Err(TransportError::new(codes::SSL_EXCEPTION, "self signed certificate")),
    );
    let (client, _) = client_with(transport);

    let error = client.call("core_x", json!({}), &presets()).await.unwrap_err();
    let debug = error.debug().cloned().unwrap();
    assert_eq!(debug.code, "invalidcertificate");
    assert!(debug.details.contains("self signed certificate"));
    assert_eq!(error.message(), EnglishStrings::new().instant("core.sitenotfoundhelp", &[]));
}

#[tokio::test]
async fn test_unicode_cleaning_failure() {
    let transport = ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Empty));
    let (client, _) = client_with(transport.clone());

    let error = client
        .call("core_message_send", json!({"text": "😀"}), &presets().with_clean_unicode(true))
        .await
        .unwrap_err();
    assert_eq!(error.message(), EnglishStrings::new().instant("core.unicodenotsupportedcleanerror", &[]));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_ajax_builds_batch_request() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| ok(ResponseBody::Json(json!([{"error": false, "data": {"ok": true}}]))),
    );
    let (client, _) = client_with(transport.clone());

    let result = client
        .call_ajax("core_get_string", json!({"component": "core", "lang": null, "n": 2}), &AjaxPreSets::new("https://school.example"))
        .await
        .unwrap();
    assert_eq!(result, json!({"ok": true}));

    let (url, options) = transport.requests().remove(0);
    assert_eq!(url, "https://school.example/lib/ajax/service.php?info=core_get_string&lang=en");
    assert_eq!(
        options.body,
        Some(RequestBody::Json(json!([{
            "index": 0,
            "methodname": "core_get_string",
            "args": {"component": "core", "n": "2"},
        }])))
    );
}

#[tokio::test]
async fn test_ajax_nologin_get_encodes_args() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| ok(ResponseBody::Json(json!([{"error": false, "data": 1}]))),
    );
    let (client, _) = client_with(transport.clone());

    client
        .call_ajax("tool_mobile_get_public_config", json!({}), &AjaxPreSets::new("https://school.example").no_login(true))
        .await
        .unwrap();

    let (url, options) = transport.requests().remove(0);
    assert!(url.starts_with(
        "https://school.example/lib/ajax/service-nologin.php?info=tool_mobile_get_public_config&lang=en&args="
    ));
    assert!(url.contains("%22methodname%22%3A%22tool_mobile_get_public_config%22"));
    assert_eq!(options.method, crate::transport::HttpMethod::Get);
}

#[tokio::test]
async fn test_ajax_error_payloads() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |url, _| {
            if url.contains("info=first") {
                ok(ResponseBody::Json(json!([{"error": true, "exception": {"errorcode": "nopermissions", "message": "No"}}])))
            } else if url.contains("info=top") {
                ok(ResponseBody::Json(json!({"error": "Invalid session", "errorcode": "servicerequireslogin"})))
            } else {
                ok(ResponseBody::Json(json!("not a batch")))
            }
        },
    );
    let (client, log) = client_with(transport);
    let presets = AjaxPreSets::new("https://school.example");

    let first = client.call_ajax("first", json!({}), &presets).await.unwrap_err();
    assert!(matches!(first, WsError::AjaxWs(_)));
    assert_eq!(first.error_code(), Some("nopermissions"));

    let top = client.call_ajax("top", json!({}), &presets).await.unwrap_err();
    assert_eq!(top.error_code(), Some("servicerequireslogin"));

    let invalid = client.call_ajax("other", json!({}), &presets).await.unwrap_err();
    assert_eq!(invalid.debug().map(|debug| debug.code.as_str()), Some("invalidresponse"));

    let types: Vec<_> = log.entries().into_iter().map(|entry| entry.error_type).collect();
    assert_eq!(
        types,
        vec![
            "CoreAjaxError - nopermissions",
            "CoreAjaxError - servicerequireslogin",
            "CoreAjaxError - invalidresponse",
        ]
    );
}

#[tokio::test]
async fn test_ajax_native_failures_map_to_debug_codes() {
    let transport = ScriptedTransport::new(
        TransportKind::Native,
        |url, _| {
            let status = if url.contains("info=dns") { codes::SERVER_NOT_FOUND } else { codes::TIMEOUT };
            Err(TransportError::new(status, ""))
        },
    );
    let (client, _) = client_with(transport);
    let presets = AjaxPreSets::new("https://school.example");

    let dns = client.call_ajax("dns", json!({}), &presets).await.unwrap_err();
    assert_eq!(dns.debug().map(|debug| debug.code.as_str()), Some("servernotfound"));
    assert_eq!(dns.debug().map(|debug| debug.details.as_str()), Some("Server could not be found"));
    assert_eq!(dns.status(), Some(codes::SERVER_NOT_FOUND));

    let timeout = client.call_ajax("slow", json!({}), &presets).await.unwrap_err();
    assert_eq!(timeout.debug().map(|debug| debug.code.as_str()), Some("requesttimeout"));
}

#[tokio::test]
async fn test_ajax_requires_site_and_connectivity() {
    let transport = ScriptedTransport::new(TransportKind::Browser, |_, _| ok(ResponseBody::Empty));
    let log = Arc::new(MemoryErrorLog::new());
    let client = WsClient::builder()
        .transport(transport.clone())
        .network_status(Arc::new(Offline))
        .error_log(Arc::clone(&log) as Arc<dyn ErrorLogSink>)
        .build()
        .unwrap();

    let error = client.call_ajax("m", json!({}), &AjaxPreSets::new("https://school.example")).await.unwrap_err();
    assert!(matches!(error, WsError::Ajax { .. }));
    assert_eq!(error.message(), EnglishStrings::new().instant("core.networkerrormsg", &[]));
    assert_eq!(log.entries()[0].error_type, "CoreAjaxError");
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_mobile_reads_file_urls_locally() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("config.json");
    std::fs::write(&file, r#"{"a": 1}"#).unwrap();

    let transport = ScriptedTransport::new(TransportKind::Native, |_, _| ok(ResponseBody::Empty));
    let client = WsClient::builder()
        .transport(transport.clone())
        .platform(Arc::new(Mobile))
        .build()
        .unwrap();

    let url = url::Url::from_file_path(&file).unwrap().to_string();
    let response = client.send_http_request(&url, &HttpRequestOptions::get()).await.unwrap();
    assert_eq!(response.body, ResponseBody::Json(json!({"a": 1})));

    let text = client
        .send_http_request(&url, &HttpRequestOptions::get().with_response_type(ResponseType::Text))
        .await
        .unwrap();
    assert_eq!(text.body, ResponseBody::Text(r#"{"a": 1}"#.to_string()));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_http_error_message_joins_help_and_body() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |url, _| {
            let response = HttpResponse {
                body: ResponseBody::Text("<html><body><p>Maintenance</p></body></html>".to_string()),
                headers: HeaderMap::new(),
                status: 503,
                status_text: "Service Unavailable".to_string(),
                url: url.to_string(),
            };
            Err(TransportError {
                status: 503,
                message: "Http failure response".to_string(),
                response: Some(Box::new(response)),
            })
        },
    );
    let (client, _) = client_with(transport);

    let error = client.call("core_x", json!({}), &presets()).await.unwrap_err();
    let strings = EnglishStrings::new();
    assert_eq!(error.status(), Some(503));
    assert_eq!(
        error.message(),
        format!("{}<br><br><p>Maintenance</p>", strings.instant("core.sitenotfoundhelp", &[]))
    );
}

#[tokio::test]
async fn test_network_failure_is_server_connection_error() {
    let transport = ScriptedTransport::new(
        TransportKind::Browser,
        |_, _| Err(TransportError::new(0, "connection refused")),
    );
    let (client, _) = client_with(transport);

    let error = client.call("core_x", json!({}), &presets()).await.unwrap_err();
    assert_eq!(error, WsError::generic("Error connecting to the server. connection refused"));
}
