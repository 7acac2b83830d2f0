//! Domain models for the web-service layer.

pub mod config;
mod files;
mod log;
mod presets;
mod warnings;

pub use config::WsClientConfig;
pub use files::{DownloadedFileEntry, FileUploadOptions, TransferProgress, UploadFileResult};
pub use log::ErrorLogEntry;
pub use presets::{AjaxPreSets, CombineFn, SplitRequest, TypeExpected, WsPreSets};
pub use warnings::{StatusWithWarnings, WsWarning};
