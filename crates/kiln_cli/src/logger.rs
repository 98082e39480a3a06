//! Logging setup for the `kiln` binary.
//!
//! Library crates log through `tracing`; this module installs the subscriber
//! that prints those events to stderr.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither a flag nor `RUST_LOG` says otherwise.
const DEFAULT_FILTER: &str = "kiln=info";

/// Picks the event filter for the given flags.
///
/// `verbose` wins over `quiet`; without either, `RUST_LOG` is honored and
/// the default is informational output from the kiln crates.
pub fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("kiln=debug")
    } else if quiet {
        EnvFilter::new("kiln=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .compact();

    // A second initialization (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}
