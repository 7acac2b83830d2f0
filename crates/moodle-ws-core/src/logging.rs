//! tracing bootstrap for binaries. Library code only emits events.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, or `filter` when unset.
///
/// Calling it twice is harmless: the second install is ignored.
pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let installed = fmt().with_env_filter(env_filter).with_target(false).try_init().is_ok();
    if installed {
        tracing::debug!(filter = %filter, "Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_ignored() {
        init_logging("info");
        init_logging("debug");
    }
}
