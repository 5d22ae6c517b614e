use tracing::dispatcher;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
///
/// `verbose` lowers the default to `debug`; an explicit `RUST_LOG` always wins.
pub fn init_logging(verbose: bool) {
    if dispatcher::has_been_set() {
        return;
    }

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout is reserved for the JSON report and plan listings.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
