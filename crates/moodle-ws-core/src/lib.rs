//! # Moodle WS Core
//!
//! Web-service call layer for Moodle sites.
//!
//! ## Architecture
//!
//! ```text
//! moodle-ws-core/src/
//! ├── transport/     # Native and browser HTTP adapters, manual redirect loop
//! ├── ws/            # WsClient: RPC engine, AJAX engine, retry queue, in-flight cache, files
//! ├── errors/        # Error classification and message formatting
//! ├── utils/         # Form serializer, mimetype helpers, reqwest client factory
//! ├── collaborators  # Connectivity, platform, file system, strings, session, error log
//! ├── config         # WsClientConfig loader with env overrides
//! └── logging        # tracing-subscriber bootstrap for binaries
//! ```
//!
//! Every failure returned by [`WsClient`] is a [`moodle_ws_types::WsError`].
//! Raw [`transport::TransportError`]s are classified before they leave the engine.

#![allow(
    clippy::significant_drop_tightening,
    reason = "DashMap and Mutex guards are dropped before every await point"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![allow(
    clippy::module_name_repetitions,
    reason = "Type names like WsClient and WsClientBuilder mirror the protocol vocabulary"
)]
// Test-only lints: allow panic!, println!, etc. in test code
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::float_cmp,
        clippy::unwrap_used,
        clippy::expect_used
    )
)]

pub mod collaborators;
pub mod config;
pub mod errors;
pub mod logging;
pub mod strings;
pub mod transport;
pub mod utils;
pub mod ws;

// Re-export commonly used types
pub use collaborators::{
    AssumeOnline, DesktopPlatform, ErrorLogSink, FileSystem, LocalFileSystem, MemoryErrorLog,
    NetworkStatus, NoSession, NoSupport, Platform, SiteSession, SupportConfigLookup, Translator,
};
pub use strings::EnglishStrings;
pub use transport::{HttpRequestOptions, HttpResponse, ResponseBody, TransportError};
pub use ws::{convert_values_to_string, throw_on_failed_status, WsClient, WsClientBuilder};
