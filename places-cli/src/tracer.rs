use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber once. `RUST_LOG` wins over the verbosity flag.
pub fn init_once_with_level_int(level: u8) {
    // Skip init if has been set
    if dispatcher::has_been_set() {
        return;
    }

    let debug_level = match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(debug_level));

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
