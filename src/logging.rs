//! Logging bootstrap for embedders.

use tracing_subscriber::EnvFilter;

use crate::factory::PluginFactory;

/// Install a process-wide tracing subscriber.
///
/// The `GANGWAY_LOG` environment variable overrides `filter`. Calling
/// this more than once (or alongside an embedder-installed subscriber)
/// is harmless; later calls lose.
pub fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_env("GANGWAY_LOG")
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Install logging with the factory's preferred filter.
pub fn init_logging_for(factory: &dyn PluginFactory) {
    init_logging(factory.log_filter());
}
