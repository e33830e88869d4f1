//! Подсистема Publish–Subscribe.
//!
//! - `broker`: публичный фасад: токены, подписки, публикация, остановка.
//! - `dispatch`: реестр подписок и раздача сообщений по их очередям.
//! - `worker`: воркер подписки, вызывающий обработчик.
//! - `scanner`: фоновый просмотр почтового ящика.
//! - `wake`: источники пробуждения сканера (таймер или события ФС).
//! - `dedupe` (приватный): отметки локально разосланных сообщений.
//!
//! Порядок доставки гарантирован только внутри одной подписки одного
//! процесса. Между процессами сообщения приходят в порядке обнаружения
//! записей сканером, и этот порядок может отличаться от порядка
//! публикации.

pub mod broker;
mod dedupe;
pub mod dispatch;
pub mod handler;
pub mod message;
pub mod scanner;
pub mod stats;
pub mod wake;
mod worker;

pub use broker::Broker;
pub use dispatch::{Dispatcher, Registration, SubscriptionId};
pub use handler::MessageHandler;
pub use message::Message;
pub use scanner::ScanReport;
pub use stats::{BrokerCounters, BrokerStats};
pub use wake::{wake_source, DiscoveryMode, PollWake, WakeSource, WatchWake};
