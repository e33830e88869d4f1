use crate::{ErrorExt, StatusCode};

/// Ошибки почтового ящика (хранилища записей сообщений).
#[derive(Debug, Clone)]
pub enum MailboxError {
    /// Сбой ввода-вывода при работе с файлом или каталогом
    Io {
        path: String,
        kind: std::io::ErrorKind,
        reason: String,
    },
    /// Запись прочитана, но не декодируется (битый файл)
    CorruptRecord { name: String, reason: String },
    /// Запись не удалось сериализовать
    Encode { reason: String },
    /// Записи с таким именем нет
    Missing { name: String },
}

impl MailboxError {
    /// Создаёт `Io` из `std::io::Error` с указанием пути.
    pub fn io(
        path: impl AsRef<std::path::Path>,
        err: &std::io::Error,
    ) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            kind: err.kind(),
            reason: err.to_string(),
        }
    }

    /// `true`, если файл уже удалён (например, сканером другого процесса).
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing { .. } => true,
            Self::Io { kind, .. } => *kind == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl std::fmt::Display for MailboxError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Io { path, reason, .. } => write!(f, "Mailbox I/O error at {path}: {reason}"),
            Self::CorruptRecord { name, reason } => {
                write!(f, "Corrupt record {name}: {reason}")
            }
            Self::Encode { reason } => write!(f, "Record encoding failed: {reason}"),
            Self::Missing { name } => write!(f, "Record not found: {name}"),
        }
    }
}

impl std::error::Error for MailboxError {}

impl ErrorExt for MailboxError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Io { kind, .. } if *kind == std::io::ErrorKind::NotFound => StatusCode::NotFound,
            Self::Io { .. } => StatusCode::Io,
            Self::CorruptRecord { .. } => StatusCode::CorruptedData,
            Self::Encode { .. } => StatusCode::SerializationFailed,
            Self::Missing { .. } => StatusCode::NotFound,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_missing_detection() {
        let not_found = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(MailboxError::io("/tmp/x", &not_found).is_missing());
        assert!(MailboxError::Missing { name: "a".into() }.is_missing());

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert!(!MailboxError::io("/tmp/x", &denied).is_missing());
    }

    #[test]
    fn test_status_codes() {
        let corrupt = MailboxError::CorruptRecord {
            name: "msg_1.rec".into(),
            reason: "bad magic".into(),
        };
        assert_eq!(corrupt.status_code(), StatusCode::CorruptedData);
        assert!(!corrupt.status_code().is_retryable());

        let io_err = io::Error::new(io::ErrorKind::Other, "disk");
        let err = MailboxError::io("/tmp/x", &io_err);
        assert_eq!(err.status_code(), StatusCode::Io);
        assert!(err.status_code().is_retryable());
        assert!(err.to_string().contains("/tmp/x"));
    }
}
