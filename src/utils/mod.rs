//! Shared utilities: errors, configuration loading and logging setup.

pub mod error;

pub use error::{ErrorResponse, ReplayError, ReplayResult};

use serde::de::DeserializeOwned;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "session_replay=debug";

/// Install the tracing subscriber, using `default_filter` when `RUST_LOG` is unset.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_tracing(default_filter: &str) {
    let initialized = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!("Session replay v{}", env!("CARGO_PKG_VERSION"));
    }
}

/// Read a JSON config file, falling back to defaults when it does not exist
pub fn load_config<T>(path: &Path) -> ReplayResult<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
