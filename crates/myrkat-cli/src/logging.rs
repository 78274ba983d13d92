//! Subscriber set-up for the binary

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber at `level`.
///
/// `RUST_LOG`, when set and valid, replaces `level` entirely. Calling this
/// twice is harmless; the second install is ignored.
pub fn init(level: LevelFilter) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
