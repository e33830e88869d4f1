use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{registry::LookupSpan, Layer};

use crate::logging::{config::LoggingConfig, formatter};

/// Файловый слой с суточной ротацией и неблокирующей записью.
///
/// Возвращённый `WorkerGuard` нужно держать до конца работы, иначе хвост
/// лога потеряется.
pub fn layer<S>(config: &LoggingConfig) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::daily(&config.log_dir, &config.file_prefix);
    let (writer, guard) = non_blocking(appender);
    (formatter::build_formatter(config, writer, false), guard)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что после сброса guard в каталоге появляется файл.
    #[test]
    fn test_file_layer_writes() {
        let dir = TempDir::new().unwrap();
        let cfg = LoggingConfig {
            file_enabled: true,
            log_dir: dir.path().to_path_buf(),
            ..Default::default()
        };

        let (layer, guard) = layer::<Registry>(&cfg);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!("written to file");
        });
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
