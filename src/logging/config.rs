use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

/// Формат строк лога.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: trace, debug, info, warn, error.
    pub level: String,
    pub format: LogFormat,
    /// Дополнительные директивы фильтра, например `aura_bus::pubsub=trace`.
    pub directives: Vec<String>,
    pub console_enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    pub file_enabled: bool,
    pub log_dir: PathBuf,
    /// Префикс имён суточных файлов лога.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            directives: Vec::new(),
            console_enabled: true,
            with_ansi: true,
            with_target: true,
            file_enabled: false,
            log_dir: PathBuf::from("logs"),
            file_prefix: "aura-bus.log".to_string(),
        }
    }
}

/// Ошибка проверки настроек логирования.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLoggingConfig(pub String);

impl LoggingConfig {
    /// Применяет `AURA_LOG_LEVEL` и `AURA_LOG_FORMAT`, если они заданы.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("AURA_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.level = level.trim().to_ascii_lowercase();
            }
        }
        if let Ok(format) = std::env::var("AURA_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<(), InvalidLoggingConfig> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(InvalidLoggingConfig(format!(
                "unknown log level '{}'",
                self.level
            )));
        }
        if self.file_enabled && self.file_prefix.trim().is_empty() {
            return Err(InvalidLoggingConfig(
                "file_prefix must not be empty when file logging is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Создаёт каталог логов, если файловый вывод включён.
    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        if self.file_enabled {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Строка фильтра для `EnvFilter`: уровень для крейта плюс
    /// дополнительные директивы. Чужие крейты ограничены `warn`.
    pub fn build_filter_directive(&self) -> String {
        let mut parts = vec![
            "warn".to_string(),
            format!("aura_bus={}", self.level),
            format!("aura_error={}", self.level),
        ];
        parts.extend(
            self.directives
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        );
        parts.join(",")
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl fmt::Display for InvalidLoggingConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "invalid logging config: {}", self.0)
    }
}

impl std::error::Error for InvalidLoggingConfig {}
