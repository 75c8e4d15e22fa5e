use std::{str::FromStr, sync::atomic::AtomicBool};

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, EnvFilter};

static IS_TRACING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable span tracing when the `TRACE` environment variable is set.
///
/// `TRACE` may be a plain level (`debug`) or a full `tracing_subscriber`
/// directive string (`jmod_cache=trace`).
pub fn enable_tracing_by_env() {
    let Ok(trace_var) = std::env::var("TRACE") else {
        return;
    };

    if IS_TRACING_ENABLED.swap(true, std::sync::atomic::Ordering::SeqCst) {
        return;
    }

    use tracing_subscriber::{fmt, prelude::*};

    let filter = if let Ok(level) = Level::from_str(&trace_var) {
        EnvFilter::default().add_directive(level.into())
    } else {
        EnvFilter::builder()
            .with_regex(true)
            .parse_lossy(&trace_var)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty().with_file(true).with_span_events(FmtSpan::CLOSE))
        .init();
    tracing::trace!("enable_tracing_by_env");
}

/// Initialize the default stderr subscriber used by the CLI.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` picks between DEBUG and
/// WARN. A no-op when `enable_tracing_by_env` already installed a subscriber.
pub fn init_tracing(verbose: bool) {
    if IS_TRACING_ENABLED.swap(true, std::sync::atomic::Ordering::SeqCst) {
        return;
    }

    let default_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
