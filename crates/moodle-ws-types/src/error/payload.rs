//! Payloads carried by structured errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Exception payload returned by the web service.
///
/// Failure bodies look like
/// `{"exception": "...", "errorcode": "...", "message": "...", "debuginfo": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errorcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warningcode: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debuginfo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moreinfourl: Option<String>,
}

impl WsErrorPayload {
    /// Lenient extraction: fields with unexpected types are ignored instead of failing.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| -> Option<String> {
            match value.get(name)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        Self {
            exception: field("exception"),
            errorcode: field("errorcode"),
            warningcode: field("warningcode"),
            message: field("message").unwrap_or_default(),
            debuginfo: field("debuginfo"),
            backtrace: field("backtrace"),
            link: field("link"),
            moreinfourl: field("moreinfourl"),
        }
    }

    pub fn is_expired_token(&self) -> bool {
        match self.errorcode.as_deref() {
            Some("invalidtoken") => true,
            Some("accessexception") => self.message.contains("Invalid token - token expired"),
            _ => false,
        }
    }
}

/// Debug information attached to connection errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDebug {
    /// Short machine code, e.g. `invalidresponse` or `invalidcertificate`.
    pub code: String,
    /// Human-readable details.
    pub details: String,
}

impl ErrorDebug {
    pub fn new(code: impl Into<String>, details: impl Into<String>) -> Self {
        Self { code: code.into(), details: details.into() }
    }
}

/// Support contact information for a site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportConfig {
    pub site_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Body of a "cannot connect to site" style error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support: Option<SupportConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_from_exception_body() {
        let body = json!({
            "exception": "moodle_exception",
            "errorcode": "invalidrecord",
            "message": "Can't find data record in database.",
            "debuginfo": 42,
        });
        let payload = WsErrorPayload::from_value(&body);
        assert_eq!(payload.exception.as_deref(), Some("moodle_exception"));
        assert_eq!(payload.errorcode.as_deref(), Some("invalidrecord"));
        assert_eq!(payload.debuginfo.as_deref(), Some("42"));
        assert!(payload.backtrace.is_none());
    }

    #[test]
    fn test_payload_tolerates_missing_message() {
        let payload = WsErrorPayload::from_value(&json!({"errorcode": "x", "message": null}));
        assert_eq!(payload.message, "");
    }
}
