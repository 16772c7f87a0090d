//! Tracing initialization.
//!
//! Console output through the `tracing-subscriber` fmt layer. Verbosity is controlled with the
//! standard `RUST_LOG` environment variable and defaults to `info`; SQL statement logging can be
//! enabled with e.g. `RUST_LOG=info,sqlx=debug`.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing for the server and command line tools.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
