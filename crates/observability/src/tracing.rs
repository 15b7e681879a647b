//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process.
///
/// The filter comes from `RUST_LOG` (default `info`). `KEYGATE_LOG_FORMAT`
/// selects the output shape: `json` (the default, one object per line) or
/// `pretty` for local work.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let pretty = std::env::var("KEYGATE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("pretty"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if pretty {
        builder.pretty().try_init()
    } else {
        builder.json().try_init()
    };

    // Already-initialized is fine: tests and embedders may race here.
    let _ = result;
}
