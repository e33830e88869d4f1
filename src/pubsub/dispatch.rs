use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::broadcast, task::JoinHandle};
use tracing::{debug, warn};

use super::{
    message::Envelope,
    stats::BrokerCounters,
    worker::{self, WorkerContext},
    MessageHandler,
};
use crate::{mailbox::MessageRecord, topic::streams_alias};

pub type SubscriptionId = u64;

/// Результат регистрации подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(SubscriptionId),
    /// Подписка с тем же шаблоном и владельцем уже есть; новый обработчик
    /// отброшен.
    AlreadyActive(SubscriptionId),
}

struct SubscriptionEntry {
    id: SubscriptionId,
    tx: broadcast::Sender<Envelope>,
    worker: JoinHandle<()>,
}

type SubscriptionKey = (Arc<str>, Arc<str>);

#[derive(Default)]
struct Registry {
    entries: HashMap<SubscriptionKey, SubscriptionEntry>,
    next_id: SubscriptionId,
}

/// Реестр подписок и раздача сообщений по их очередям.
///
/// У каждой подписки своя ограниченная очередь и свой воркер. При
/// переполнении очередь теряет самые старые сообщения, публикация не
/// блокируется.
pub struct Dispatcher {
    registry: Mutex<Registry>,
    capacity: usize,
    runtime: Handle,
    counters: Arc<BrokerCounters>,
}

impl Dispatcher {
    pub fn new(
        capacity: usize,
        runtime: Handle,
        counters: Arc<BrokerCounters>,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            capacity: capacity.max(1),
            runtime,
            counters,
        }
    }

    /// Регистрирует подписку `(pattern, owner)` и запускает её воркер.
    ///
    /// Повторная регистрация той же пары ничего не меняет.
    pub fn register(
        &self,
        pattern: &str,
        owner: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Registration {
        let key: SubscriptionKey = (Arc::from(pattern), Arc::from(owner));
        let mut registry = self.registry.lock();

        if let Some(existing) = registry.entries.get(&key) {
            return Registration::AlreadyActive(existing.id);
        }

        registry.next_id += 1;
        let id = registry.next_id;
        let (tx, rx) = broadcast::channel(self.capacity);
        let ctx = WorkerContext {
            id,
            pattern: key.0.clone(),
            owner: key.1.clone(),
            handler,
            counters: self.counters.clone(),
        };
        let worker = worker::spawn(&self.runtime, ctx, rx);

        registry
            .entries
            .insert(key, SubscriptionEntry { id, tx, worker });
        Registration::Created(id)
    }

    /// Снимает подписку и посылает её воркеру сигнал остановки.
    ///
    /// Сообщения, ещё лежащие в очереди, не доставляются.
    pub fn unregister(
        &self,
        pattern: &str,
        owner: &str,
    ) -> bool {
        let key: SubscriptionKey = (Arc::from(pattern), Arc::from(owner));
        let removed = self.registry.lock().entries.remove(&key);

        match removed {
            Some(entry) => {
                stop(&entry);
                debug!(id = entry.id, pattern, owner, "subscription removed");
                true
            }
            None => false,
        }
    }

    /// Кладёт запись в очередь каждой подписки, чей шаблон совпадает с
    /// топиком записи в любую сторону. Возвращает число очередей.
    pub fn fan_out(
        &self,
        record: Arc<MessageRecord>,
    ) -> usize {
        let registry = self.registry.lock();
        let mut reached = 0;

        for ((pattern, _), entry) in registry.entries.iter() {
            if !streams_alias(pattern, &record.topic) {
                continue;
            }
            match entry.tx.send(Envelope::Record(record.clone())) {
                Ok(_) => reached += 1,
                Err(_) => warn!(id = entry.id, %pattern, "subscription worker is gone"),
            }
        }

        BrokerCounters::bump(&self.counters.enqueued, reached);
        reached
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Активные подписки как пары `(pattern, owner)`.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        let mut out: Vec<_> = self
            .registry
            .lock()
            .entries
            .keys()
            .map(|(p, o)| (p.to_string(), o.to_string()))
            .collect();
        out.sort();
        out
    }

    /// Останавливает все воркеры и дожидается их завершения.
    pub async fn shutdown(&self) {
        let entries: Vec<SubscriptionEntry> = self
            .registry
            .lock()
            .entries
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        for entry in &entries {
            stop(entry);
        }
        for entry in entries {
            if let Err(err) = entry.worker.await {
                warn!(id = entry.id, error = %err, "subscription worker did not stop cleanly");
            }
        }
    }
}

fn stop(entry: &SubscriptionEntry) {
    // Stop идёт через ту же очередь; если воркер отстал, он получит Lagged
    // и всё равно дойдёт до Stop.
    if entry.tx.send(Envelope::Stop).is_err() {
        entry.worker.abort();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for entry in self.registry.get_mut().entries.values() {
            let _ = entry.tx.send(Envelope::Stop);
        }
    }
}
