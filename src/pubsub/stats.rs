use std::sync::atomic::{AtomicUsize, Ordering};

/// Счётчики брокера. Обновляются без блокировок.
#[derive(Debug, Default)]
pub struct BrokerCounters {
    pub published: AtomicUsize,
    pub publish_failures: AtomicUsize,
    pub denied: AtomicUsize,
    pub enqueued: AtomicUsize,
    pub delivered: AtomicUsize,
    pub dropped: AtomicUsize,
    pub corrupt_records: AtomicUsize,
    pub callback_failures: AtomicUsize,
    pub scans: AtomicUsize,
}

/// Снимок счётчиков брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Успешные публикации.
    pub published: usize,
    /// Публикации, отклонённые из-за топика или сбоя хранилища.
    pub publish_failures: usize,
    /// Операции, отклонённые проверкой прав.
    pub denied: usize,
    /// Сообщения, поставленные в очереди подписок.
    pub enqueued: usize,
    /// Сообщения, успешно обработанные обработчиками.
    pub delivered: usize,
    /// Сообщения, вытесненные из переполненных очередей.
    pub dropped: usize,
    /// Битые записи, удалённые сканером.
    pub corrupt_records: usize,
    /// Ошибки и паники обработчиков.
    pub callback_failures: usize,
    /// Завершённые проходы сканера.
    pub scans: usize,
}

impl BrokerCounters {
    pub fn bump(
        counter: &AtomicUsize,
        by: usize,
    ) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BrokerStats {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        BrokerStats {
            published: load(&self.published),
            publish_failures: load(&self.publish_failures),
            denied: load(&self.denied),
            enqueued: load(&self.enqueued),
            delivered: load(&self.delivered),
            dropped: load(&self.dropped),
            corrupt_records: load(&self.corrupt_records),
            callback_failures: load(&self.callback_failures),
            scans: load(&self.scans),
        }
    }
}
