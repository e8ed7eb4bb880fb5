//! Tracing setup for the terminal binary.
//!
//! - `JLPT_LOG` holds the filter directives (default `warn`, so log lines do
//!   not interleave with the quiz prompts).
//! - `JLPT_LOG_FORMAT=json` switches to structured JSON output.
//!
//! Logs go to stderr; stdout belongs to the quiz.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("JLPT_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("JLPT_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
