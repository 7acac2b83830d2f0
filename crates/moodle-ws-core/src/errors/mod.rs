//! Error classification and message formatting.
//!
//! Helpers work on [`ErrorLike`], which covers the shapes errors arrive in:
//! plain text, a structured [`WsError`], or a loosely typed object with
//! `message`/`error`/`content`/`body` fields (transport failures, plugin
//! answers). Apart from the translator they are pure.

mod html;

pub use html::{get_error_message_from_html, get_html_body_content};

use moodle_ws_types::WsError;
use regex::Regex;

use crate::collaborators::Translator;
use crate::transport::TransportError;

/// Loosely typed error object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorObject {
    pub message: Option<String>,
    pub error: Option<String>,
    pub content: Option<String>,
    /// HTML body of an error page.
    pub body: Option<String>,
    pub title: Option<String>,
}

/// Any value that may describe an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorLike {
    Missing,
    Text(String),
    Domain { error: WsError, title: Option<String> },
    Object(ErrorObject),
}

impl From<&str> for ErrorLike {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ErrorLike {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<WsError> for ErrorLike {
    fn from(error: WsError) -> Self {
        Self::Domain { error, title: None }
    }
}

impl From<ErrorObject> for ErrorLike {
    fn from(object: ErrorObject) -> Self {
        Self::Object(object)
    }
}

/// A failed answer exposes its body as `error`; otherwise the transport message is used.
impl From<&TransportError> for ErrorLike {
    fn from(error: &TransportError) -> Self {
        match error.body_text().filter(|body| !body.trim().is_empty()) {
            Some(body) => {
                Self::Object(ErrorObject { error: Some(body.to_string()), ..ErrorObject::default() })
            },
            None => Self::Object(ErrorObject {
                message: Some(error.message.clone()),
                ..ErrorObject::default()
            }),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<&String> {
    value.filter(|text| !text.is_empty())
}

/// Human-readable message of an error, if one can be found.
pub fn get_error_message_from_error(error: &ErrorLike) -> Option<String> {
    match error {
        ErrorLike::Missing => None,
        ErrorLike::Text(text) => Some(text.clone()),
        ErrorLike::Domain { error, .. } => Some(error.message().to_string()),
        ErrorLike::Object(object) => non_empty(object.message.as_ref())
            .or_else(|| non_empty(object.error.as_ref()))
            .or_else(|| non_empty(object.content.as_ref()))
            .cloned()
            .or_else(|| object.body.as_deref().map(get_error_message_from_html)),
    }
}

/// Network errors, plus two well-known messages that arrive untyped.
pub fn is_network_error(error: &ErrorLike, translator: &dyn Translator) -> bool {
    if let ErrorLike::Domain { error, .. } = error {
        return error.is_network_error();
    }
    let Some(message) = get_error_message_from_error(error) else {
        return false;
    };
    message == translator.instant("core.networkerrormsg", &[])
        || message == translator.instant("core.fileuploader.errormustbeonlinetoupload", &[])
}

pub fn is_canceled_error(error: &ErrorLike) -> bool {
    matches!(error, ErrorLike::Domain { error, .. } if error.is_canceled())
}

pub fn is_silent_error(error: &ErrorLike) -> bool {
    matches!(error, ErrorLike::Domain { error, .. } if error.is_silent())
}

/// Join the messages of several errors into nested two-paragraph templates.
///
/// Empty messages are dropped. `[A, B, C]` becomes `two(two(A, B), C)`.
pub fn build_several_paragraphs_message(
    paragraphs: &[ErrorLike],
    translator: &dyn Translator,
) -> String {
    let mut messages = paragraphs
        .iter()
        .filter_map(get_error_message_from_error)
        .filter(|message| !message.is_empty());

    let Some(first) = messages.next() else {
        return String::new();
    };
    messages.fold(first, |joined, next| {
        translator.instant("core.twoparagraphs", &[("p1", joined.as_str()), ("p2", next.as_str())])
    })
}

/// Append text to an error, keeping its shape.
pub fn add_text_to_error(error: ErrorLike, text: &str) -> ErrorLike {
    match error {
        ErrorLike::Missing => ErrorLike::Text(text.to_string()),
        ErrorLike::Text(message) => ErrorLike::Text(message + text),
        ErrorLike::Domain { mut error, title } => {
            error.append_to_message(text);
            ErrorLike::Domain { error, title }
        },
        ErrorLike::Object(mut object) => {
            let field = if object.message.is_some() {
                &mut object.message
            } else if object.error.is_some() {
                &mut object.error
            } else if object.content.is_some() {
                &mut object.content
            } else {
                &mut object.body
            };
            if let Some(value) = field.as_mut() {
                value.push_str(text);
            }
            ErrorLike::Object(object)
        },
    }
}

/// Attach a title to an error, keeping its shape. Text becomes an object.
pub fn add_title_to_error(error: ErrorLike, title: &str) -> ErrorLike {
    let title = Some(title.to_string());
    match error {
        ErrorLike::Missing => ErrorLike::Object(ErrorObject { title, ..ErrorObject::default() }),
        ErrorLike::Text(message) => {
            ErrorLike::Object(ErrorObject { message: Some(message), title, ..ErrorObject::default() })
        },
        ErrorLike::Domain { error, .. } => ErrorLike::Domain { error, title },
        ErrorLike::Object(object) => ErrorLike::Object(ErrorObject { title, ..object }),
    }
}

/// Whether `message` is the "site unavailable" help text for any site.
pub fn is_site_unavailable_error_message(message: &str, translator: &dyn Translator) -> bool {
    const PLACEHOLDER: &str = "SITEURLPLACEHOLDER";
    let template = translator.instant("core.siteunavailablehelp", &[("site", PLACEHOLDER)]);
    let pattern = regex::escape(&template).replace(PLACEHOLDER, ".*");
    Regex::new(&pattern).is_ok_and(|regex| regex.is_match(message))
}
