//! Per-call presets for RPC and AJAX calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use validator::Validate;

/// Runtime type a web-service response must have.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TypeExpected {
    Boolean,
    Number,
    String,
    /// A JSON-encoded string; validated as `String`.
    #[serde(rename = "jsonstring")]
    JsonString,
    #[default]
    Object,
}

impl TypeExpected {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::JsonString => "jsonstring",
            Self::Object => "object",
        }
    }

    /// Type the body is validated against.
    pub fn effective(self) -> Self {
        match self {
            Self::JsonString => Self::String,
            other => other,
        }
    }

    /// Primitive results are requested as text so values like `0` or `false` survive.
    pub fn wants_text_response(self) -> bool {
        matches!(self, Self::Number | Self::Boolean | Self::String)
    }
}

impl fmt::Display for TypeExpected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduction used to merge split-request results: `(accumulated, current, index) -> merged`.
pub type CombineFn = Arc<dyn Fn(Value, Value, usize) -> Value + Send + Sync>;

/// Split an oversized array argument into several requests (PHP `max_input_vars`).
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct SplitRequest {
    /// Name of the array parameter to split.
    pub param: String,
    /// Max number of entries per request.
    #[validate(range(min = 1_usize))]
    pub max_length: usize,
    /// Custom combination of results: `(combined, next, index)`, where `index`
    /// counts from 0 over the results after the first. When absent, array
    /// fields are concatenated.
    #[serde(skip)]
    pub combine: Option<CombineFn>,
}

impl SplitRequest {
    pub fn new(param: impl Into<String>, max_length: usize) -> Self {
        Self { param: param.into(), max_length, combine: None }
    }

    #[must_use]
    pub fn with_combine(mut self, combine: CombineFn) -> Self {
        self.combine = Some(combine);
        self
    }
}

impl fmt::Debug for SplitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitRequest")
            .field("param", &self.param)
            .field("max_length", &self.max_length)
            .field("combine", &self.combine.is_some())
            .finish()
    }
}

/// Presets accepted by authenticated RPC calls.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WsPreSets {
    /// The site URL, without trailing slash.
    #[validate(length(min = 1_u64))]
    pub site_url: String,
    /// The web-service token.
    #[validate(length(min = 1_u64))]
    pub ws_token: String,
    /// Set to false when the expected response is null.
    #[serde(default = "default_true")]
    pub response_expected: bool,
    #[serde(default)]
    pub type_expected: TypeExpected,
    /// Strip multibyte Unicode characters from the arguments.
    #[serde(default)]
    pub clean_unicode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub split_request: Option<SplitRequest>,
}

impl WsPreSets {
    pub fn new(site_url: impl Into<String>, ws_token: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            ws_token: ws_token.into(),
            response_expected: true,
            type_expected: TypeExpected::Object,
            clean_unicode: false,
            split_request: None,
        }
    }

    #[must_use]
    pub fn with_type_expected(mut self, type_expected: TypeExpected) -> Self {
        self.type_expected = type_expected;
        self
    }

    #[must_use]
    pub fn with_response_expected(mut self, response_expected: bool) -> Self {
        self.response_expected = response_expected;
        self
    }

    #[must_use]
    pub fn with_clean_unicode(mut self, clean_unicode: bool) -> Self {
        self.clean_unicode = clean_unicode;
        self
    }

    #[must_use]
    pub fn with_split_request(mut self, split: SplitRequest) -> Self {
        self.split_request = Some(split);
        self
    }
}

/// Presets accepted by AJAX calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct AjaxPreSets {
    #[validate(length(min = 1_u64))]
    pub site_url: String,
    #[serde(default = "default_true")]
    pub response_expected: bool,
    /// Use the no-login endpoint, for requests that don't require authentication.
    #[serde(default)]
    pub no_login: bool,
    /// Send the parameters via GET. Only honoured together with `no_login`.
    #[serde(default)]
    pub use_get: bool,
}

impl AjaxPreSets {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into().trim_end_matches('/').to_string(),
            response_expected: true,
            no_login: false,
            use_get: false,
        }
    }

    #[must_use]
    pub fn no_login(mut self, use_get: bool) -> Self {
        self.no_login = true;
        self.use_get = use_get;
        self
    }

    #[must_use]
    pub fn with_response_expected(mut self, response_expected: bool) -> Self {
        self.response_expected = response_expected;
        self
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_defaults() {
        let presets = WsPreSets::new("https://school.example/", "abc");
        assert_eq!(presets.site_url, "https://school.example");
        assert!(presets.response_expected);
        assert_eq!(presets.type_expected, TypeExpected::Object);
        assert!(presets.validate().is_ok());
    }

    #[test]
    fn test_presets_require_token() {
        assert!(WsPreSets::new("https://school.example", "").validate().is_err());
        assert!(AjaxPreSets::new("").validate().is_err());
    }

    #[test]
    fn test_presets_deserialize_with_defaults() {
        let presets: WsPreSets = serde_json::from_str(
            r#"{"site_url":"https://s.example","ws_token":"t","type_expected":"jsonstring"}"#,
        )
        .unwrap();
        assert!(presets.response_expected);
        assert_eq!(presets.type_expected, TypeExpected::JsonString);
        assert_eq!(presets.type_expected.effective(), TypeExpected::String);
    }

    #[test]
    fn test_split_request_rejects_zero_length() {
        let presets = WsPreSets::new("https://s.example", "t")
            .with_split_request(SplitRequest::new("ids", 0));
        assert!(presets.validate().is_err());
    }
}
