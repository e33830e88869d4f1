use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::mailbox::MessageRecord;

/// Сообщение, переданное обработчику подписки.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    /// Топик, в который сообщение было опубликовано.
    pub topic: Arc<str>,
    pub payload: Bytes,
    pub published_at: DateTime<Utc>,
    /// Владелец токена, которым сообщение было опубликовано.
    pub publisher: Arc<str>,
    /// Шаблон подписки, через которую сообщение доставлено.
    pub subscription: Arc<str>,
}

/// Элемент личной очереди подписки.
#[derive(Debug, Clone)]
pub(crate) enum Envelope {
    Record(Arc<MessageRecord>),
    /// Сигнал остановки: воркер завершается, не дожидаясь остальных.
    Stop,
}

impl Message {
    pub(crate) fn from_record(
        record: &MessageRecord,
        subscription: Arc<str>,
    ) -> Self {
        Self {
            id: record.message_id,
            topic: Arc::from(record.topic.as_str()),
            payload: record.payload.clone(),
            published_at: record.published_at,
            publisher: Arc::from(record.publisher.as_str()),
            subscription,
        }
    }

    /// Декодирует полезную нагрузку как JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.payload)
    }

    /// Сообщение целиком в виде JSON-конверта
    /// `{"data", "topic", "timestamp", "message_id"}`.
    ///
    /// `data` — нагрузка, разобранная как JSON, либо строка, если нагрузка
    /// не является JSON. `timestamp` — секунды Unix с дробной частью.
    pub fn envelope(&self) -> serde_json::Value {
        let data = self
            .json::<serde_json::Value>()
            .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&self.payload).into_owned()));
        let timestamp = self.published_at.timestamp_micros() as f64 / 1_000_000.0;

        serde_json::json!({
            "data": data,
            "topic": &*self.topic,
            "timestamp": timestamp,
            "message_id": self.id.to_string(),
        })
    }

    /// Полезная нагрузка как UTF-8 строка, если она корректна.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}
