use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок брокера.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (топики, шаблоны)
/// - 3xxx: Авторизация / Разрешения
/// - 4xxx: Перегрузка очередей
/// - 5xxx: Хранилище (почтовый ящик, таблица токенов)
/// - 6xxx: IO
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    AlreadyExists = 2001,
    InvalidTopic = 2010,
    InvalidPattern = 2011,

    // === 3xxx: Авторизация/Разрешение ===
    PermissionDenied = 3001,
    InvalidToken = 3003,
    InvalidPermission = 3010,

    // === 4xxx: Перегрузка ===
    QueueOverflow = 4003,

    // === 5xxx: Хранилище ===
    StorageUnavailable = 5000,
    CorruptedData = 5002,
    SerializationFailed = 5003,
    DeserializationFailed = 5004,

    // === 6xxx: IO ===
    Io = 6000,
    Timeout = 6002,
    UnexpectedEof = 6007,
}

/// Рекомендуемый уровень логирования.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Имеет ли смысл повторить операцию на следующем тике.
    ///
    /// Сканер почтового ящика использует это, чтобы отличать временные
    /// сбои чтения каталога от битых записей.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::StorageUnavailable | Self::Io | Self::QueueOverflow
        )
    }

    /// Ошибка вызывающей стороны (неверный топик, токен, права).
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=4999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Внутренняя или инфраструктурная ошибка.
    pub fn is_server_error(&self) -> bool {
        matches!(self.code(), 1000..=1999 | 5000..=6999)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists | Self::PermissionDenied => LogLevel::Debug,
            Self::InvalidArgs
            | Self::InvalidTopic
            | Self::InvalidPattern
            | Self::InvalidToken
            | Self::InvalidPermission => LogLevel::Info,
            Self::QueueOverflow | Self::Timeout | Self::CorruptedData => LogLevel::Warn,
            Self::Internal | Self::StorageUnavailable => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
