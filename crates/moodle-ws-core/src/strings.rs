//! Built-in English string catalog.

use crate::collaborators::Translator;

/// Keys and English templates used by the call layer.
const CATALOG: &[(&str, &str)] = &[
    ("core.ajaxendpointnotfound", "You need Moodle {{$a}} or later to use this feature."),
    (
        "core.certificaterror",
        "The site certificate is not valid or is not trusted. ({{details}})",
    ),
    (
        "core.errorinvalidresponse",
        "Invalid response received. Please contact your site administrator if the error persists. ({{method}})",
    ),
    (
        "core.networkerrormsg",
        "There was a problem connecting to the site. Please check your connection and try again.",
    ),
    ("core.fileuploader.errormustbeonlinetoupload", "You have to be online to upload files."),
    ("core.serverconnection", "Error connecting to the server. {{details}}"),
    (
        "core.sitenotfoundhelp",
        "Please check the site address and make sure the site is available.",
    ),
    (
        "core.siteunavailablehelp",
        "The site {{site}} is not available right now. Please try again later.",
    ),
    ("core.twoparagraphs", "{{p1}}<br><br>{{p2}}"),
    ("core.unexpectederror", "Unexpected error. Please close and reopen the application."),
    (
        "core.unicodenotsupportedcleanerror",
        "Empty text was found when cleaning Unicode chars.",
    ),
];

/// [`Translator`] over the built-in English catalog.
///
/// Unknown keys translate to themselves.
#[derive(Debug, Clone)]
pub struct EnglishStrings {
    language: String,
}

impl EnglishStrings {
    pub fn new() -> Self {
        Self::with_language("en")
    }

    /// English strings, but report `language` to the server.
    pub fn with_language(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }

    pub fn template(key: &str) -> Option<&'static str> {
        CATALOG.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

impl Default for EnglishStrings {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for EnglishStrings {
    fn instant(&self, key: &str, params: &[(&str, &str)]) -> String {
        let Some(template) = Self::template(key) else {
            return key.to_string();
        };
        fill_template(template, params)
    }

    fn current_language(&self) -> String {
        self.language.clone()
    }
}

/// Replace every `{{name}}` in `template`.
pub fn fill_template(template: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{{{name}}}}}"), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_fills_params() {
        let strings = EnglishStrings::new();
        assert_eq!(
            strings.instant("core.twoparagraphs", &[("p1", "A"), ("p2", "B")]),
            "A<br><br>B"
        );
        assert_eq!(
            strings.instant("core.ajaxendpointnotfound", &[("$a", "3.1")]),
            "You need Moodle 3.1 or later to use this feature."
        );
    }

    #[test]
    fn test_unknown_key_passes_through() {
        assert_eq!(EnglishStrings::new().instant("core.nope", &[]), "core.nope");
    }
}
