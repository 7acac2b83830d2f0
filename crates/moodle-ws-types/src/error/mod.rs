//! Typed error definitions for the web-service layer.
//!
//! Every failure that reaches a caller of the call engines is exactly one
//! [`WsError`] variant. Raw transport failures are classified into one of
//! these kinds before they leave the engine.
//!
//! All errors are designed to be:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants

mod config;
mod payload;

pub use config::ConfigError;
pub use payload::{ErrorDebug, SiteErrorInfo, SupportConfig, WsErrorPayload};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes the app handles itself, so they are not treated as plain WS errors.
const APP_HANDLED_ERROR_CODES: &[&str] = &[
    "userdeleted",
    "upgraderunning",
    "forcepasswordchangenotice",
    "usernotfullysetup",
    "sitepolicynotagreed",
    "sitemaintenance",
    "wsaccessusersuspended",
    "wsaccessuserdeleted",
];

/// Structured error returned by the RPC, AJAX and file-transfer engines.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum WsError {
    /// The device has no connectivity.
    #[error("{message}")]
    Network { message: String },

    /// The server answered with an `exception`/`errorcode` payload.
    #[error("{}", .0.message)]
    Ws(WsErrorPayload),

    /// The site could not be reached or answered with something unusable.
    #[error("{}", .0.message)]
    Site(SiteErrorInfo),

    /// AJAX endpoint failure (transport or invalid response).
    #[error("{}", .info.message)]
    Ajax {
        info: SiteErrorInfo,
        /// Transport status, negative for native client error codes.
        status: i32,
    },

    /// The AJAX endpoint returned an exception payload.
    #[error("{}", .0.message)]
    AjaxWs(WsErrorPayload),

    /// Non-2xx HTTP answer (`status` 0 when the transport reported none).
    #[error("{message}")]
    Http { status: u16, message: String },

    /// User-initiated abort. Presentation layers suppress it.
    #[error("{message}")]
    Canceled { message: String },

    /// Must never be shown to the user.
    #[error("{message}")]
    Silent { message: String },

    /// Fallback kind carrying a plain message.
    #[error("{message}")]
    Generic { message: String },
}

impl WsError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic { message: message.into() }
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::Canceled { message: message.into() }
    }

    pub fn silent() -> Self {
        Self::Silent { message: String::new() }
    }

    /// Build a [`WsError::Ws`] from an error-code/message pair (upload and warning errors).
    pub fn from_code(errorcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ws(WsErrorPayload {
            errorcode: Some(errorcode.into()),
            message: message.into(),
            ..WsErrorPayload::default()
        })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Ws(payload) | Self::AjaxWs(payload) => &payload.message,
            Self::Site(info) | Self::Ajax { info, .. } => &info.message,
            Self::Network { message }
            | Self::Http { message, .. }
            | Self::Canceled { message }
            | Self::Silent { message }
            | Self::Generic { message } => message,
        }
    }

    /// Append text to the message, keeping the error kind.
    pub fn append_to_message(&mut self, text: &str) {
        match self {
            Self::Ws(payload) | Self::AjaxWs(payload) => payload.message.push_str(text),
            Self::Site(info) | Self::Ajax { info, .. } => info.message.push_str(text),
            Self::Network { message }
            | Self::Http { message, .. }
            | Self::Canceled { message }
            | Self::Silent { message }
            | Self::Generic { message } => message.push_str(text),
        }
    }

    /// Name used for error-log records.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Network { .. } => "NetworkError",
            Self::Ws(_) => "WSError",
            Self::Site(_) => "SiteError",
            Self::Ajax { .. } => "AjaxError",
            Self::AjaxWs(_) => "AjaxWSError",
            Self::Http { .. } => "HttpError",
            Self::Canceled { .. } => "CanceledError",
            Self::Silent { .. } => "SilentError",
            Self::Generic { .. } => "Error",
        }
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Ws(payload) | Self::AjaxWs(payload) => payload.errorcode.as_deref(),
            Self::Site(info) | Self::Ajax { info, .. } => info.error_code.as_deref(),
            _ => None,
        }
    }

    pub fn debug(&self) -> Option<&ErrorDebug> {
        match self {
            Self::Site(info) | Self::Ajax { info, .. } => info.debug.as_ref(),
            _ => None,
        }
    }

    /// HTTP or transport status carried by the error, if any.
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Http { status, .. } => Some(i32::from(*status)),
            Self::Ajax { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Silent { .. })
    }

    /// Whether the error was returned by the web service rather than generated by the app.
    pub fn is_web_service_error(&self) -> bool {
        match self {
            Self::Ws(payload) | Self::AjaxWs(payload) => {
                payload.warningcode.is_some()
                    || payload.errorcode.as_deref().is_some_and(|code| {
                        !APP_HANDLED_ERROR_CODES.contains(&code) && !payload.is_expired_token()
                    })
            },
            // 400 and above behave like web-service errors.
            Self::Http { status, .. } => *status >= 400,
            _ => false,
        }
    }

    pub fn is_expired_token_error(&self) -> bool {
        match self {
            Self::Ws(payload) | Self::AjaxWs(payload) => payload.is_expired_token(),
            _ => false,
        }
    }
}

/// Standard Result type using WsError.
pub type Result<T> = std::result::Result<T, WsError>;
