//! Log output setup
//!
//! Library crates log through `tracing`; the CLI decides what is shown.
//! `RUST_LOG` takes precedence over the verbosity flags.

use tracing_subscriber::EnvFilter;

/// Crates whose events follow the verbosity flags; everything else logs warnings only
const CRATES: &[&str] = &["templer", "templer_core", "templer_engine", "templer_render"];

/// Level for the given flags: errors only, info (default), or debug
pub fn level(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        _ => "debug",
    }
}

/// Build the filter directive for `level`
pub fn directive(level: &str) -> String {
    let mut directive = if level == "error" {
        "error".to_string()
    } else {
        "warn".to_string()
    };
    for krate in CRATES {
        directive.push_str(&format!(",{}={}", krate, level));
    }
    directive
}

/// Install the global subscriber writing to stderr
pub fn init(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(level(verbose, quiet))));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
