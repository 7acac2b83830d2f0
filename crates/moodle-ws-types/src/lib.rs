//! # Moodle WS Types
//!
//! Core types, models, and error definitions for the Moodle web-service layer.
//!
//! - **`error`** - Structured error taxonomy returned by every call engine
//! - **`models`** - Call presets, file-transfer models, error-log records, client configuration
//!
//! ## Architecture Role
//!
//! `moodle-ws-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        moodle-ws-types (this crate)
//!                 │
//!                 ▼
//!          moodle-ws-core
//!                 │
//!                 ▼
//!           moodle-ws-cli
//! ```
//!
//! All types are designed to be:
//! - **Serializable** via serde for API/IPC
//! - **Clone** for cheap sharing across async boundaries

pub mod error;
pub mod models;

pub use error::{ConfigError, ErrorDebug, SiteErrorInfo, SupportConfig, WsError, WsErrorPayload};

pub use models::{
    AjaxPreSets, CombineFn, DownloadedFileEntry, ErrorLogEntry, FileUploadOptions, SplitRequest,
    StatusWithWarnings, TransferProgress, TypeExpected, UploadFileResult, WsClientConfig,
    WsPreSets, WsWarning,
};
