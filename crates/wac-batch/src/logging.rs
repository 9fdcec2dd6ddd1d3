use anyhow::{anyhow, Result};
use std::io;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing tracing subscriber: {e}"))
}
