use std::io::{self, Stderr};

use tracing_subscriber::{registry::LookupSpan, Layer};

use crate::logging::{config::LoggingConfig, formatter};

/// Консольный слой. Пишет в stderr, чтобы не мешать выводу CLI в stdout.
pub fn layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let writer: fn() -> Stderr = io::stderr;
    formatter::build_formatter(config, writer, config.with_ansi)
}
