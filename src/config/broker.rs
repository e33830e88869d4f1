use std::{path::PathBuf, time::Duration};

use aura_error::{ensure, AuraResult, StatusCode};
use serde::{Deserialize, Serialize};

use crate::pubsub::DiscoveryMode;

/// Имя каталога почтового ящика по умолчанию (внутри системного temp).
pub const DEFAULT_MAILBOX_DIR: &str = "aura_pubsub";
/// Имя файла таблицы токенов по умолчанию (внутри каталога ящика).
pub const DEFAULT_TOKEN_FILE: &str = "auth_tokens.bin";

/// Параметры брокера.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Общий каталог почтового ящика. Процессы с одинаковым каталогом
    /// видят сообщения друг друга.
    pub mailbox_dir: PathBuf,
    /// Период сканирования ящика.
    pub poll_interval_ms: u64,
    /// Ёмкость личной очереди каждой подписки.
    pub queue_capacity: usize,
    pub discovery: DiscoveryMode,
    /// Запускать ли фоновый сканер. Без него брокер только пишет в ящик и
    /// читает его список, но не забирает чужие записи.
    pub scan_enabled: bool,
    /// Файл таблицы токенов. Относительный путь считается от `mailbox_dir`.
    pub token_file: PathBuf,
    /// Сколько помнить идентификаторы сообщений, разосланных локально.
    pub seen_ttl_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            mailbox_dir: std::env::temp_dir().join(DEFAULT_MAILBOX_DIR),
            poll_interval_ms: 100,
            queue_capacity: 1024,
            discovery: DiscoveryMode::Poll,
            scan_enabled: true,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            seen_ttl_secs: 60,
        }
    }
}

impl BrokerConfig {
    /// Конфигурация по умолчанию с другим каталогом ящика.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            mailbox_dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn seen_ttl(&self) -> Duration {
        Duration::from_secs(self.seen_ttl_secs)
    }

    /// Та же конфигурация без фонового сканера.
    ///
    /// Так открывают брокер команды, которые не принимают сообщения:
    /// иначе их сканер забрал бы записи, ждущие других процессов.
    pub fn without_scanner(self) -> Self {
        Self {
            scan_enabled: false,
            ..self
        }
    }

    /// Полный путь к файлу таблицы токенов.
    pub fn token_path(&self) -> PathBuf {
        if self.token_file.is_absolute() {
            self.token_file.clone()
        } else {
            self.mailbox_dir.join(&self.token_file)
        }
    }

    pub fn validate(&self) -> AuraResult<()> {
        ensure!(
            !self.mailbox_dir.as_os_str().is_empty(),
            StatusCode::InvalidArgs,
            "mailbox_dir must not be empty"
        );
        ensure!(
            self.poll_interval_ms > 0,
            StatusCode::InvalidArgs,
            "poll_interval_ms must be positive"
        );
        ensure!(
            self.queue_capacity > 0,
            StatusCode::InvalidArgs,
            "queue_capacity must be positive"
        );
        ensure!(
            !self.token_file.as_os_str().is_empty(),
            StatusCode::InvalidArgs,
            "token_file must not be empty"
        );
        Ok(())
    }
}
