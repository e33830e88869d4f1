use std::{path::PathBuf, sync::Arc};

use aura_error::{AuraResult, AuthError, ErrorExt, ResultExt, StatusCode};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    dedupe::SeenSet,
    dispatch::{Dispatcher, Registration},
    scanner::{self, ScanReport},
    stats::{BrokerCounters, BrokerStats},
    wake::wake_source,
    MessageHandler,
};
use crate::{
    auth::{Action, Token, TokenStore},
    config::BrokerConfig,
    mailbox::{FsMailbox, Mailbox, MessageRecord, RecordHandle},
    topic::{validate_pattern, validate_topic},
};

/// Состояние брокера, общее для всех его дескрипторов и фонового сканера.
pub(crate) struct BrokerShared {
    pub config: BrokerConfig,
    pub tokens: TokenStore,
    pub mailbox: Arc<dyn Mailbox>,
    pub dispatcher: Dispatcher,
    pub seen: SeenSet,
    pub counters: Arc<BrokerCounters>,
    /// Проходы сканера в одном процессе не пересекаются.
    pub scan_lock: Mutex<()>,
}

/// Жизненный цикл фонового сканера. Когда последний дескриптор брокера
/// удалён, сканер получает сигнал остановки.
struct Lifecycle {
    shutdown_tx: watch::Sender<bool>,
    scanner: Mutex<Option<JoinHandle<()>>>,
}

/// Брокер публикаций и подписок по топикам.
///
/// Дескриптор дёшево клонируется. Процессы, открывшие брокер на одном
/// каталоге, обмениваются сообщениями через почтовый ящик в этом каталоге
/// и признают токены друг друга.
///
/// Публичные операции возвращают `bool`: отказ в правах, неверный топик и
/// сбой хранилища записываются в лог и в счётчики, но не пробрасываются.
#[derive(Clone)]
pub struct Broker {
    shared: Arc<BrokerShared>,
    lifecycle: Arc<Lifecycle>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    /// Открывает брокер на каталоге `config.mailbox_dir`.
    ///
    /// Должен вызываться внутри рантайма tokio: сразу запускается сканер,
    /// если он не отключён в `config.scan_enabled`.
    pub fn open(config: BrokerConfig) -> AuraResult<Self> {
        config.validate()?;
        let mailbox = FsMailbox::open(&config.mailbox_dir).context("open mailbox")?;
        let token_file = config.token_path();
        Self::with_mailbox(config, Arc::new(mailbox), Some(token_file))
    }

    /// Собирает брокер над произвольным хранилищем.
    ///
    /// Без `token_file` таблица токенов живёт только в памяти.
    pub fn with_mailbox(
        config: BrokerConfig,
        mailbox: Arc<dyn Mailbox>,
        token_file: Option<PathBuf>,
    ) -> AuraResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            aura_error::GenericError::new(
                StatusCode::Unsupported,
                format!("broker requires a tokio runtime: {e}"),
            )
        })?;

        let tokens = match token_file {
            Some(path) => TokenStore::open(path).context("open token table")?,
            None => TokenStore::in_memory(),
        };

        let counters = Arc::new(BrokerCounters::default());
        let shared = Arc::new(BrokerShared {
            dispatcher: Dispatcher::new(config.queue_capacity, runtime.clone(), counters.clone()),
            seen: SeenSet::new(config.seen_ttl()),
            config,
            tokens,
            mailbox,
            counters,
            scan_lock: Mutex::new(()),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scanner = if shared.config.scan_enabled {
            let wake = wake_source(
                shared.config.discovery,
                shared.config.poll_interval(),
                shared.mailbox.watch_root(),
            );
            Some(runtime.spawn(scanner::run(shared.clone(), wake, shutdown_rx)))
        } else {
            debug!("mailbox scanner disabled");
            None
        };

        info!(
            mailbox = ?shared.mailbox.watch_root(),
            poll_interval_ms = shared.config.poll_interval_ms,
            discovery = ?shared.config.discovery,
            scan_enabled = shared.config.scan_enabled,
            "broker started"
        );

        Ok(Self {
            shared,
            lifecycle: Arc::new(Lifecycle {
                shutdown_tx,
                scanner: Mutex::new(scanner),
            }),
        })
    }

    /// Выпускает токен для `owner` с указанными правами.
    pub fn create_token<I, S>(
        &self,
        owner: &str,
        permissions: I,
    ) -> AuraResult<Token>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shared.tokens.create(owner, permissions)
    }

    /// Подписывает владельца токена на `pattern`.
    ///
    /// Повторная подписка того же владельца на тот же шаблон возвращает
    /// `true` и не создаёт второго воркера; новый обработчик при этом
    /// отбрасывается.
    pub fn subscribe<H: MessageHandler>(
        &self,
        token: &Token,
        pattern: &str,
        handler: H,
    ) -> bool {
        if let Err(err) = validate_pattern(pattern) {
            warn!(pattern, error = %err, "subscribe rejected");
            return false;
        }
        let owner = match self.authorize(token, Action::Subscribe, pattern) {
            Some(owner) => owner,
            None => return false,
        };

        match self
            .shared
            .dispatcher
            .register(pattern, &owner, Arc::new(handler))
        {
            Registration::Created(id) => info!(id, pattern, owner = %owner, "subscribed"),
            Registration::AlreadyActive(id) => {
                debug!(id, pattern, owner = %owner, "already subscribed")
            }
        }
        true
    }

    /// Снимает подписку владельца токена на `pattern`.
    ///
    /// `false`, если права нет или такой подписки не было.
    pub fn unsubscribe(
        &self,
        token: &Token,
        pattern: &str,
    ) -> bool {
        let owner = match self.authorize(token, Action::Unsubscribe, pattern) {
            Some(owner) => owner,
            None => return false,
        };

        let removed = self.shared.dispatcher.unregister(pattern, &owner);
        if removed {
            info!(pattern, owner = %owner, "unsubscribed");
        } else {
            debug!(pattern, owner = %owner, "no such subscription");
        }
        removed
    }

    /// Публикует сообщение в конкретный топик.
    ///
    /// Запись сохраняется в ящике до того, как сообщение раздаётся
    /// локальным подпискам; если запись не удалась, никто ничего не
    /// получает.
    pub fn publish(
        &self,
        token: &Token,
        topic: &str,
        payload: impl Into<Bytes>,
    ) -> bool {
        match self.try_publish(token, topic, payload.into()) {
            Ok(record) => {
                let reached = self.shared.dispatcher.fan_out(Arc::new(record));
                debug!(topic, reached, "message published");
                BrokerCounters::bump(&self.shared.counters.published, 1);
                true
            }
            Err(err) => {
                self.record_failure(&err);
                false
            }
        }
    }

    /// Публикует значение, сериализованное в JSON.
    pub fn publish_json<T: Serialize + ?Sized>(
        &self,
        token: &Token,
        topic: &str,
        value: &T,
    ) -> bool {
        match serde_json::to_vec(value) {
            Ok(payload) => self.publish(token, topic, payload),
            Err(err) => {
                warn!(topic, error = %err, "payload is not serializable");
                BrokerCounters::bump(&self.shared.counters.publish_failures, 1);
                false
            }
        }
    }

    /// Выполняет один проход сканера синхронно.
    pub fn scan_once(&self) -> ScanReport {
        scanner::scan_once(&self.shared)
    }

    /// Записи, ещё лежащие в почтовом ящике.
    pub fn pending(&self) -> AuraResult<Vec<RecordHandle>> {
        self.shared.mailbox.list_pending()
    }

    pub fn stats(&self) -> BrokerStats {
        self.shared.counters.snapshot()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.dispatcher.len()
    }

    /// Активные подписки как пары `(pattern, owner)`.
    pub fn subscriptions(&self) -> Vec<(String, String)> {
        self.shared.dispatcher.subscriptions()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.shared.tokens
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Останавливает сканер и все воркеры подписок.
    ///
    /// Сообщения, оставшиеся в очередях, не доставляются. Записи в ящике
    /// остаются для других процессов.
    pub async fn shutdown(&self) {
        let _ = self.lifecycle.shutdown_tx.send(true);
        let scanner = self.lifecycle.scanner.lock().take();
        if let Some(scanner) = scanner {
            if let Err(err) = scanner.await {
                error!(error = %err, "mailbox scanner did not stop cleanly");
            }
        }
        self.shared.dispatcher.shutdown().await;
        info!("broker stopped");
    }

    fn try_publish(
        &self,
        token: &Token,
        topic: &str,
        payload: Bytes,
    ) -> AuraResult<MessageRecord> {
        validate_topic(topic)?;
        let owner = self.shared.tokens.check(token, Action::Publish, topic)?;

        let record = MessageRecord::new(topic, payload, owner.as_ref());
        // отметка ставится до записи, чтобы собственный сканер не успел
        // разослать запись второй раз
        self.shared.seen.mark(record.message_id);
        if let Err(err) = self.shared.mailbox.persist(&record) {
            self.shared.seen.forget(record.message_id);
            return Err(err.context(format!("persist message for {topic}")));
        }
        Ok(record)
    }

    fn authorize(
        &self,
        token: &Token,
        action: Action,
        topic: &str,
    ) -> Option<Arc<str>> {
        match self.shared.tokens.check(token, action, topic) {
            Ok(owner) => Some(owner),
            Err(err) => {
                BrokerCounters::bump(&self.shared.counters.denied, 1);
                log_denied(&err);
                None
            }
        }
    }

    fn record_failure(
        &self,
        err: &aura_error::StackError,
    ) {
        let counters = &self.shared.counters;
        match err.downcast_ref::<AuthError>() {
            Some(auth) => {
                BrokerCounters::bump(&counters.denied, 1);
                log_denied(auth);
            }
            None if err.status_code().is_client_error() => {
                BrokerCounters::bump(&counters.publish_failures, 1);
                warn!(error = %err, "publish rejected");
            }
            None => {
                BrokerCounters::bump(&counters.publish_failures, 1);
                error!(error = %err, code = %err.status_code(), "publish failed");
            }
        }
    }
}

fn log_denied(err: &AuthError) {
    let tags = err.metrics_tags();
    let tag = |key: &str| {
        tags.iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("-")
    };
    warn!(
        owner = tag("owner"),
        action = tag("action"),
        topic = tag("topic"),
        code = %err.status_code(),
        "{}",
        err.client_message()
    );
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Drop for Lifecycle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("mailbox", &self.shared.mailbox.watch_root())
            .field("subscriptions", &self.shared.dispatcher.len())
            .field("tokens", &self.shared.tokens.len())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
