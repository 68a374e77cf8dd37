// 📜 Logging setup

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// Filter comes from `TC_LOG` (e.g. `TC_LOG=trasparenza_comuni=debug`),
/// falling back to `info`. Safe to call more than once.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("TC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

        // try_init: a host application may already own the global subscriber
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init();
    });
}
