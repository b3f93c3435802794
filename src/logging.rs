// src/logging.rs

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding per-module log levels,
/// e.g. `PETASPIN_LOG=petaspin_sweep::sweep=debug`.
pub const LOG_ENV: &str = "PETASPIN_LOG";

static INIT: Once = Once::new();

/// Install the global tracing subscriber. Safe to call more than once.
///
/// Falls back to `petaspin_sweep=info` when `PETASPIN_LOG` is unset or invalid.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("petaspin_sweep=info"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(filter)
            .init();
    });
}
