//! Services the call layer consumes but does not own.
//!
//! Each trait has a default implementation suitable for a desktop process;
//! applications embedding the engine replace them through [`crate::WsClientBuilder`].

use async_trait::async_trait;
use moodle_ws_types::{ErrorLogEntry, SupportConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::path::Path;

/// Connectivity oracle.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;

    /// Metered or otherwise limited connection. Shortens request timeouts.
    fn is_network_access_limited(&self) -> bool;
}

/// Always online on an unmetered connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl NetworkStatus for AssumeOnline {
    fn is_online(&self) -> bool {
        true
    }

    fn is_network_access_limited(&self) -> bool {
        false
    }
}

/// Platform oracle. Mobile selects the native transport.
pub trait Platform: Send + Sync {
    fn is_mobile(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopPlatform;

impl Platform for DesktopPlatform {
    fn is_mobile(&self) -> bool {
        false
    }
}

/// File-system service used for downloads and `file://` reads.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create an empty file, truncating any existing one.
    async fn create_file(&self, path: &Path) -> io::Result<()>;

    /// Move a file, replacing the target. Returns the size of the moved file.
    async fn move_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    async fn read_file(&self, path: &Path) -> io::Result<String>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn create_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::File::create(path).await?;
        Ok(())
    }

    async fn move_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::rename(from, to).await {
            // Cross-device moves cannot be renamed.
            tracing::debug!(error = %e, "rename failed, falling back to copy");
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await?;
        }
        Ok(tokio::fs::metadata(to).await?.len())
    }

    async fn read_file(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}

/// Localization service.
pub trait Translator: Send + Sync {
    /// Translate `key`, replacing `{{name}}` placeholders with `params`.
    fn instant(&self, key: &str, params: &[(&str, &str)]) -> String;

    /// Language code sent to the server for localized error strings.
    fn current_language(&self) -> String;
}

/// Logged-in site, if any.
pub trait SiteSession: Send + Sync {
    fn current_site_url(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl SiteSession for NoSession {
    fn current_site_url(&self) -> Option<String> {
        None
    }
}

/// Support contact lookup attached to "cannot connect" errors.
#[async_trait]
pub trait SupportConfigLookup: Send + Sync {
    async fn for_site(&self, site_url: &str) -> Option<SupportConfig>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSupport;

#[async_trait]
impl SupportConfigLookup for NoSupport {
    async fn for_site(&self, _site_url: &str) -> Option<SupportConfig> {
        None
    }
}

/// Sink for failed-call records.
pub trait ErrorLogSink: Send + Sync {
    fn add_error_log(&self, entry: ErrorLogEntry);
}

const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

/// Bounded in-memory error log. Oldest entries are dropped first.
#[derive(Debug)]
pub struct MemoryErrorLog {
    entries: Mutex<VecDeque<ErrorLogEntry>>,
    capacity: usize,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ERROR_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity: capacity.max(1) }
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<ErrorLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorLogSink for MemoryErrorLog {
    fn add_error_log(&self, entry: ErrorLogEntry) {
        tracing::error!(
            method = %entry.method,
            error_type = %entry.error_type,
            "WS call failed: {}",
            entry.message
        );
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}
