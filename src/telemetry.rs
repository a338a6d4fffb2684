//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs the global subscriber.
///
/// Reads `MUSE_LOG` for per-module levels, e.g. `MUSE_LOG=muse_lib::gateway=debug,muse_lib::reveal=info`.
/// Falls back to `muse_lib=info`. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("MUSE_LOG")
            .unwrap_or_else(|_| EnvFilter::new("muse_lib=info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init();
    });
}
