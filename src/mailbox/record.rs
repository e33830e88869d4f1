use aura_error::MailboxError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::codec::{decode_framed, encode_framed};

/// Заголовок файла записи сообщения.
pub const RECORD_MAGIC: &[u8; 4] = b"AMR1";
/// Префикс имени файла записи.
pub const RECORD_PREFIX: &str = "msg_";
/// Расширение имени файла записи.
pub const RECORD_EXTENSION: &str = ".rec";

/// Опубликованное сообщение в том виде, в каком оно лежит в почтовом ящике.
///
/// Запись неизменяема: после `persist` её можно только прочитать и удалить.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: Uuid,
    pub topic: String,
    pub payload: Bytes,
    pub published_at: DateTime<Utc>,
    pub publisher: String,
}

/// Ссылка на запись в почтовом ящике: идентификатор и имя файла.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle {
    id: Uuid,
    name: String,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl MessageRecord {
    /// Новая запись со свежим UUID и текущим временем.
    pub fn new(
        topic: impl Into<String>,
        payload: Bytes,
        publisher: impl Into<String>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            topic: topic.into(),
            payload,
            published_at: Utc::now(),
            publisher: publisher.into(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, MailboxError> {
        encode_framed(RECORD_MAGIC, self)
    }

    pub fn decode(
        bytes: &[u8],
        name: &str,
    ) -> Result<Self, MailboxError> {
        decode_framed(RECORD_MAGIC, bytes, name)
    }

    pub fn handle(&self) -> RecordHandle {
        RecordHandle::for_id(self.message_id)
    }
}

impl RecordHandle {
    pub fn for_id(id: Uuid) -> Self {
        Self {
            id,
            name: format!("{RECORD_PREFIX}{}{RECORD_EXTENSION}", id.as_hyphenated()),
        }
    }

    /// Разбирает имя файла. Возвращает `None` для всего, что не является
    /// записью: временных файлов, таблицы токенов, посторонних файлов.
    pub fn parse(name: &str) -> Option<Self> {
        let id = name
            .strip_prefix(RECORD_PREFIX)?
            .strip_suffix(RECORD_EXTENSION)?;
        let id = Uuid::parse_str(id).ok()?;
        Some(Self {
            id,
            name: name.to_string(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for RecordHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
