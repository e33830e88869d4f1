use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use uuid::Uuid;

/// Идентификаторы сообщений, уже разосланных локально при публикации.
///
/// Сканер, обнаружив такую запись в почтовом ящике, удаляет её, не
/// рассылая повторно. Записи, которые так и не встретились сканеру
/// (например, их забрал другой процесс), вычищаются по истечении `ttl`.
#[derive(Debug)]
pub(crate) struct SeenSet {
    ttl: Duration,
    ids: Mutex<HashMap<Uuid, Instant>>,
}

impl SeenSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark(
        &self,
        id: Uuid,
    ) {
        self.ids.lock().insert(id, Instant::now());
    }

    /// Снимает отметку, например после неудачной записи.
    pub fn forget(
        &self,
        id: Uuid,
    ) {
        self.ids.lock().remove(&id);
    }

    /// Снимает отметку и сообщает, была ли она.
    pub fn take(
        &self,
        id: Uuid,
    ) -> bool {
        self.ids.lock().remove(&id).is_some()
    }

    /// Удаляет устаревшие отметки. Возвращает число удалённых.
    pub fn prune(&self) -> usize {
        let mut ids = self.ids.lock();
        let before = ids.len();
        let ttl = self.ttl;
        ids.retain(|_, marked| marked.elapsed() < ttl);
        before - ids.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }
}
