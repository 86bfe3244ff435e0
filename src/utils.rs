//! Small cross-cutting helpers shared across the engine.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a [`tracing`] subscriber honoring `RUST_LOG`, falling back to
/// `b3lob_rs=info` when the environment variable is unset or invalid.
///
/// Intended for binaries and examples embedding the engine; library code
/// never calls this itself.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "b3lob_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
