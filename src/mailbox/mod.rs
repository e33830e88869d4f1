//! Почтовый ящик: общее хранилище записей опубликованных сообщений.
//!
//! Каждая запись хранится отдельно и появляется атомарно. Несколько
//! процессов могут писать в один ящик и сканировать его одновременно;
//! запись, удалённая чужим сканером, просто пропускается.

pub mod codec;
pub mod fs;
pub mod memory;
pub mod record;

use std::path::Path;

use aura_error::AuraResult;

pub use fs::FsMailbox;
pub use memory::MemoryMailbox;
pub use record::{MessageRecord, RecordHandle};

/// Хранилище записей сообщений.
///
/// Методы синхронные: файловая реализация вызывается из `spawn_blocking`
/// и из потока публикации.
pub trait Mailbox: Send + Sync + 'static {
    /// Атомарно сохраняет запись. После возврата `Ok` запись видна
    /// любому сканеру этого ящика.
    fn persist(
        &self,
        record: &MessageRecord,
    ) -> AuraResult<RecordHandle>;

    /// Текущий список записей, ожидающих доставки.
    fn list_pending(&self) -> AuraResult<Vec<RecordHandle>>;

    /// Читает и декодирует запись.
    ///
    /// Ошибка с кодом `NotFound` означает, что запись уже забрал другой
    /// сканер; `CorruptedData` означает, что запись не читается.
    fn load(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<MessageRecord>;

    /// Удаляет запись. `Ok(false)`, если её уже не было.
    fn delete(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<bool>;

    /// Каталог для наблюдения за изменениями, если хранилище файловое.
    fn watch_root(&self) -> Option<&Path> {
        None
    }
}
