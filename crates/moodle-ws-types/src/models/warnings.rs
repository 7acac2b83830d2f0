//! Warning structures returned by many web services.

use serde::{Deserialize, Serialize};

/// A single warning entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WsWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itemid: Option<i64>,
    /// Code the client can use to implement specific behaviour.
    pub warningcode: String,
    /// Untranslated English message.
    pub message: String,
}

/// Response shape `{status, offline?, warnings?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusWithWarnings {
    pub status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
    #[serde(default)]
    pub warnings: Vec<WsWarning>,
}
