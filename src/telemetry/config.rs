use std::sync::OnceLock;

static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// `--json`: a single envelope per operation goes to stdout.
pub fn set_json_mode(v: bool) {
    let _ = JSON_MODE.set(v);
}

pub fn json_mode() -> bool {
    *JSON_MODE.get().unwrap_or(&false)
}

pub fn logs_are_json() -> bool {
    matches!(std::env::var("DIGEST_LOG_FORMAT").as_deref(), Ok("json"))
}

/// Initialize tracing/logging according to RUST_LOG and DIGEST_LOG_FORMAT.
/// - Defaults to `info` if `RUST_LOG` is unset
/// - Supports `DIGEST_LOG_FORMAT=json` for JSON logs (stderr)
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    use tracing_subscriber::prelude::*; // for .with()

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is reserved for envelopes
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let builder = tracing_subscriber::registry().with(filter);

    if logs_are_json() {
        let _ = builder.with(fmt_layer.json().flatten_event(true)).try_init();
    } else {
        // human-friendly compact text
        let _ = builder.with(fmt_layer.compact()).try_init();
    }
}
