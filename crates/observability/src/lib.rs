//! `finsight-observability` — process-wide logging setup.
//!
//! The engines log through `tracing` macros and never decide where the
//! output goes; the hosting binary (or a test harness) decides that
//! exactly once, here.

use tracing_subscriber::EnvFilter;

/// Install JSON logging for the process.
///
/// The filter comes from `RUST_LOG`, falling back to `info`. Safe to call
/// more than once; only the first call installs a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    install(filter);
}

/// Like [`init`], but with an explicit filter instead of `RUST_LOG`.
/// Tests use this to quiet or focus individual engines.
pub fn init_with_filter(directives: &str) {
    install(EnvFilter::new(directives));
}

fn install(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_initialization_is_harmless() {
        init_with_filter("warn");
        init_with_filter("debug");
        init();
    }
}
