//! Error-log records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record handed to the error-log sink after a failed call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorLogEntry {
    /// Web-service function that failed.
    pub method: String,
    /// Error kind, e.g. `WSError` or `CoreAjaxError - invalidresponse`.
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    /// Epoch milliseconds.
    pub time: i64,
    /// Arguments of the failed call.
    pub data: Value,
}
