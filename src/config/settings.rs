use std::path::Path;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use super::BrokerConfig;
use crate::logging::LoggingConfig;

/// Переменная окружения с путём к файлу конфигурации.
pub const CONFIG_PATH_ENV: &str = "AURA_CONFIG";
/// Имя необязательного файла конфигурации в текущем каталоге
/// (`aura-bus.toml`, `aura-bus.yaml`, ...).
pub const DEFAULT_CONFIG_NAME: &str = "aura-bus";

/// Полная конфигурация процесса.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает конфигурацию: значения по умолчанию, затем файл
    /// (`AURA_CONFIG` или `aura-bus.*`), затем переменные `AURA_*`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load_from(path.as_deref().map(Path::new))
    }

    /// То же, что [`Settings::load`], но с явным файлом. Явный файл
    /// обязан существовать.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = BrokerConfig::default();

        let mut builder = Config::builder()
            // Значения по умолчанию
            .set_default(
                "broker.mailbox_dir",
                defaults.mailbox_dir.display().to_string(),
            )?
            .set_default("broker.poll_interval_ms", defaults.poll_interval_ms)?
            .set_default("broker.queue_capacity", defaults.queue_capacity as u64)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        // Переменные окружения вида AURA_BROKER__POLL_INTERVAL_MS
        let cfg = builder
            .add_source(
                Environment::with_prefix("AURA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = cfg.try_deserialize()?;
        settings.logging.apply_env_overrides();
        Ok(settings)
    }
}
