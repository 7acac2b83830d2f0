//! Message extraction from HTML error pages.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static BODY_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*)</body>").ok());

/// Text of the first `.errorbox .errormessage` element, the markup Moodle
/// uses for fatal errors. Empty when there is none.
pub fn get_error_message_from_html(html: &str) -> String {
    let Ok(selector) = Selector::parse(".errorbox .errormessage") else {
        return String::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Inner HTML of `<body>`, or the whole content when there is no body element.
pub fn get_html_body_content(content: &str) -> String {
    BODY_REGEX
        .as_ref()
        .and_then(|regex| regex.captures(content))
        .and_then(|captures| captures.get(1))
        .map_or_else(|| content.to_string(), |body| body.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errorbox_extraction() {
        let html = r#"<html><body><div class="errorbox"><div class="errormessage">Access denied</div></div></body></html>"#;
        assert_eq!(get_error_message_from_html(html), "Access denied");
    }

    #[test]
    fn test_errorbox_missing() {
        assert_eq!(get_error_message_from_html("<p class=\"errormessage\">Nope</p>"), "");
    }

    #[test]
    fn test_body_content() {
        assert_eq!(
            get_html_body_content("<html><head><title>x</title></head><BODY class=\"a\">\n<h1>Down</h1>\n</BODY></html>"),
            "<h1>Down</h1>"
        );
        assert_eq!(get_html_body_content("plain text"), "plain text");
    }
}
