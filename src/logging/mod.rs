//! Логирование на базе `tracing`.
//!
//! Консольный и файловый слои собираются по [`LoggingConfig`]; фильтр
//! берётся из `RUST_LOG`, если переменная задана.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Устанавливает глобальный subscriber.
///
/// Повторный вызов в том же процессе вернёт ошибку.
pub fn init_logging(
    mut config: LoggingConfig
) -> Result<LoggingHandle, Box<dyn std::error::Error>> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_enabled {
        layers.push(sinks::console::layer(&config));
    }

    let file_guard = if config.file_enabled {
        let (file_layer, guard) = sinks::file::layer(&config);
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        host = %host,
        log_level = %config.level,
        format = ?config.format,
        file_enabled = config.file_enabled,
        "logging initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
