//! Tracing subscriber setup.

use arstory_core::error::ExperienceError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::debug_console::DebugConsole;

/// Emit JSON log lines instead of human-readable ones.
pub const ENV_LOG_JSON: &str = "ARSTORY_LOG_JSON";

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// How logs are written.
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// JSON output.
    pub json: bool,
    /// In-memory sink for the on-screen console.
    pub debug_console: Option<DebugConsole>,
}

impl TelemetryConfig {
    /// Reads `ARSTORY_LOG_JSON` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings from `lookup`. `1`, `true` and `yes` enable JSON.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let json = lookup(ENV_LOG_JSON).is_some_and(|raw| {
            matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        });
        Self {
            json,
            debug_console: None,
        }
    }

    /// Also feeds `console`.
    #[must_use]
    pub fn with_debug_console(mut self, console: DebugConsole) -> Self {
        self.debug_console = Some(console);
        self
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), a fmt
/// layer and the optional debug console.
///
/// # Errors
///
/// Returns `ExperienceError::Configuration` if a global subscriber is already
/// installed.
pub fn init(config: &TelemetryConfig) -> Result<(), ExperienceError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(config.debug_console.clone());

    let installed = if config.json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    installed.map_err(|e| ExperienceError::Configuration(format!("tracing already initialised: {e}")))?;
    tracing::info!(json = config.json, "telemetry initialised");
    Ok(())
}
