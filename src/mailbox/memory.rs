use std::collections::BTreeMap;

use aura_error::{AuraResult, MailboxError};
use parking_lot::Mutex;

use super::{
    record::{MessageRecord, RecordHandle},
    Mailbox,
};

/// Почтовый ящик в памяти одного процесса.
///
/// Хранит закодированные байты, чтобы вести себя как файловый ящик,
/// в том числе при битых записях.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    records: Mutex<BTreeMap<RecordHandle, Vec<u8>>>,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Кладёт произвольные байты под заданным именем.
    ///
    /// Нужен, чтобы имитировать запись, оставленную другим процессом.
    pub fn insert_raw(
        &self,
        handle: RecordHandle,
        bytes: Vec<u8>,
    ) {
        self.records.lock().insert(handle, bytes);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Mailbox for MemoryMailbox {
    fn persist(
        &self,
        record: &MessageRecord,
    ) -> AuraResult<RecordHandle> {
        let handle = record.handle();
        let bytes = record.encode()?;
        self.records.lock().insert(handle.clone(), bytes);
        Ok(handle)
    }

    fn list_pending(&self) -> AuraResult<Vec<RecordHandle>> {
        Ok(self.records.lock().keys().cloned().collect())
    }

    fn load(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<MessageRecord> {
        let records = self.records.lock();
        let bytes = records.get(handle).ok_or_else(|| MailboxError::Missing {
            name: handle.name().to_string(),
        })?;
        Ok(MessageRecord::decode(bytes, handle.name())?)
    }

    fn delete(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<bool> {
        Ok(self.records.lock().remove(handle).is_some())
    }
}
