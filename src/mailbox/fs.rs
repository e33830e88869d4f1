use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use aura_error::{AuraResult, MailboxError};
use tracing::trace;

use super::{
    codec::write_atomic,
    record::{MessageRecord, RecordHandle},
    Mailbox,
};

/// Префикс временных файлов; сканер их не видит.
const TEMP_PREFIX: &str = ".msg-";

/// Почтовый ящик в общем каталоге: по одному файлу на запись.
#[derive(Debug, Clone)]
pub struct FsMailbox {
    root: PathBuf,
}

impl FsMailbox {
    /// Открывает ящик, создавая каталог при необходимости.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, MailboxError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| MailboxError::io(&root, &e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(
        &self,
        handle: &RecordHandle,
    ) -> PathBuf {
        self.root.join(handle.name())
    }
}

impl Mailbox for FsMailbox {
    fn persist(
        &self,
        record: &MessageRecord,
    ) -> AuraResult<RecordHandle> {
        let handle = record.handle();
        let bytes = record.encode()?;
        write_atomic(&self.path_of(&handle), TEMP_PREFIX, &bytes)?;
        trace!(record = %handle, size = bytes.len(), "record persisted");
        Ok(handle)
    }

    fn list_pending(&self) -> AuraResult<Vec<RecordHandle>> {
        let entries = fs::read_dir(&self.root).map_err(|e| MailboxError::io(&self.root, &e))?;

        let mut handles = Vec::new();
        for entry in entries {
            // запись могла исчезнуть между readdir и stat, это не ошибка
            let Ok(entry) = entry else { continue };
            if let Some(handle) = entry.file_name().to_str().and_then(RecordHandle::parse) {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    fn load(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<MessageRecord> {
        let path = self.path_of(handle);
        let bytes = fs::read(&path).map_err(|e| MailboxError::io(&path, &e))?;
        Ok(MessageRecord::decode(&bytes, handle.name())?)
    }

    fn delete(
        &self,
        handle: &RecordHandle,
    ) -> AuraResult<bool> {
        let path = self.path_of(handle);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MailboxError::io(&path, &e).into()),
        }
    }

    fn watch_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use aura_error::StatusCode;
    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;

    fn record(topic: &str) -> MessageRecord {
        MessageRecord::new(topic, Bytes::from_static(b"payload"), "tester")
    }

    /// Тест проверяет полный цикл: сохранить, найти, прочитать, удалить.
    #[test]
    fn test_persist_list_load_delete() {
        let dir = TempDir::new().unwrap();
        let mailbox = FsMailbox::open(dir.path()).unwrap();

        let rec = record("tasks/new");
        let handle = mailbox.persist(&rec).unwrap();

        assert_eq!(mailbox.list_pending().unwrap(), vec![handle.clone()]);
        assert_eq!(mailbox.load(&handle).unwrap(), rec);

        assert!(mailbox.delete(&handle).unwrap());
        assert!(!mailbox.delete(&handle).unwrap());
        assert!(mailbox.list_pending().unwrap().is_empty());
    }

    /// Тест проверяет, что посторонние файлы в каталоге игнорируются.
    #[test]
    fn test_list_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        let mailbox = FsMailbox::open(dir.path()).unwrap();

        fs::write(dir.path().join("auth_tokens.bin"), b"ATK1").unwrap();
        fs::write(dir.path().join(".msg-half-written"), b"AM").unwrap();
        mailbox.persist(&record("a/b")).unwrap();

        assert_eq!(mailbox.list_pending().unwrap().len(), 1);
    }

    /// Тест проверяет коды ошибок для пропавшей и битой записи.
    #[test]
    fn test_load_error_codes() {
        let dir = TempDir::new().unwrap();
        let mailbox = FsMailbox::open(dir.path()).unwrap();

        let gone = record("x").handle();
        let err = mailbox.load(&gone).unwrap_err();
        assert!(err.is(StatusCode::NotFound));

        let broken = record("y").handle();
        fs::write(dir.path().join(broken.name()), b"garbage").unwrap();
        let err = mailbox.load(&broken).unwrap_err();
        assert!(err.is(StatusCode::CorruptedData));
    }

    /// Тест проверяет, что каталог создаётся при открытии.
    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("aura_pubsub");
        let mailbox = FsMailbox::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(mailbox.watch_root(), Some(nested.as_path()));
    }
}
