//! File download and upload models.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Options for a multipart upload to the draft area.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUploadOptions {
    /// Multipart field name.
    #[serde(default = "default_file_key")]
    pub file_key: String,
    pub file_name: String,
    pub mime_type: String,
    /// Defaults to `draft`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_area: Option<String>,
    /// Defaults to 0 (new draft item).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl FileUploadOptions {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            file_key: default_file_key(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            file_area: None,
            item_id: None,
            headers: HashMap::new(),
        }
    }

    pub fn file_area_or_default(&self) -> &str {
        self.file_area.as_deref().unwrap_or("draft")
    }

    pub fn item_id_or_default(&self) -> i64 {
        self.item_id.unwrap_or(0)
    }
}

fn default_file_key() -> String {
    "file".to_string()
}

/// First entry of the upload endpoint's answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadFileResult {
    pub component: String,
    pub contextid: i64,
    pub userid: i64,
    pub filearea: String,
    pub filename: String,
    pub filepath: String,
    pub itemid: i64,
    pub license: Option<String>,
    pub author: Option<String>,
    /// Serialized file source.
    pub source: Option<String>,
}

/// A downloaded file after it was moved to its final path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadedFileEntry {
    /// Final path, including an appended extension when one was added.
    pub path: PathBuf,
    /// Extension used for the final path, empty when none.
    pub extension: String,
    pub size: u64,
}

/// Progress of a transfer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferProgress {
    pub loaded: u64,
    /// Unknown when the server sent no `Content-Length`.
    pub total: Option<u64>,
}

impl TransferProgress {
    pub fn length_computable(&self) -> bool {
        self.total.is_some()
    }
}
