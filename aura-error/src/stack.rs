use std::{fmt, panic::Location, sync::Arc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, StatusCode};

/// Основная ошибка брокера с цепочкой контекстов.
///
/// Контекст добавляется по мере того, как ошибка поднимается по стеку
/// вызовов; для каждого контекста запоминается место вызова.
#[derive(Clone)]
pub struct StackError {
    inner: Arc<dyn ErrorExt>,
    contexts: Arc<Vec<ErrorContext>>,
}

/// Контекст ошибки с location tracking.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: Option<&'static Location<'static>>,
}

/// Структура для сериализации ошибок (например, для CLI с `--json`).
#[cfg(feature = "serde")]
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    /// Создаёт новую ошибку.
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            inner: Arc::new(err),
            contexts: Arc::new(Vec::new()),
        }
    }

    /// Добавляет контекст к ошибке.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        let mut new_contexts = (*self.contexts).clone();
        new_contexts.push(ErrorContext {
            message: msg.into(),
            location: Some(Location::caller()),
        });
        self.contexts = Arc::new(new_contexts);
        self
    }

    /// Возвращает код статуса.
    pub fn status_code(&self) -> StatusCode {
        self.inner.status_code()
    }

    /// Возвращает сообщение для вызывающей стороны.
    pub fn client_message(&self) -> String {
        self.inner.client_message()
    }

    /// Возвращает корневую ошибку.
    pub fn root(&self) -> &dyn ErrorExt {
        self.inner.as_ref()
    }

    /// Возвращает все контексты.
    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    /// Теги корневой ошибки.
    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.inner.metrics_tags()
    }

    /// Попытка downcast к конкретному типу ошибки.
    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    /// `true`, если корневая ошибка имеет указанный код.
    pub fn is(
        &self,
        code: StatusCode,
    ) -> bool {
        self.status_code() == code
    }

    /// Сериализация для машинно-читаемого вывода.
    #[cfg(feature = "serde")]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.status_code().code(),
            message: self.client_message(),
            #[cfg(debug_assertions)]
            contexts: Some(self.format_contexts()),
            #[cfg(not(debug_assertions))]
            contexts: None,
        }
    }

    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    fn format_contexts(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|ctx| match ctx.location {
                Some(loc) => format!("{} ({}:{})", ctx.message, loc.file(), loc.line()),
                None => ctx.message.clone(),
            })
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("StackError")
            .field("code", &self.status_code())
            .field("error", &self.inner.log_message())
            .field("contexts", &self.contexts)
            .finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if !self.contexts.is_empty() {
            let contexts: Vec<&str> = self.contexts.iter().map(|c| c.message.as_str()).collect();
            write!(f, "{}: {}", contexts.join(" → "), self.inner)
        } else {
            write!(f, "{}", self.inner)
        }
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

impl From<StackError> for std::io::Error {
    fn from(e: StackError) -> Self {
        std::io::Error::other(e.to_string())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthError, MailboxError};

    #[test]
    fn test_context_chain() {
        let err = AuthError::UnknownToken {
            token: "t-1".to_string(),
        };
        let stack = StackError::new(err)
            .context("authorize publish")
            .context("publish handler");

        assert_eq!(stack.contexts().len(), 2);
        assert_eq!(stack.contexts()[0].message, "authorize publish");
        assert!(stack.contexts()[0].location.is_some());
    }

    #[test]
    fn test_downcast() {
        let stack = StackError::new(MailboxError::CorruptRecord {
            name: "msg_x.rec".to_string(),
            reason: "bad magic".to_string(),
        });

        let down = stack.downcast_ref::<MailboxError>();
        assert!(matches!(down, Some(MailboxError::CorruptRecord { .. })));
        assert!(stack.downcast_ref::<AuthError>().is_none());
    }

    #[test]
    fn test_display() {
        let err = AuthError::PermissionDenied {
            owner: "agentA".to_string(),
            action: "publish".to_string(),
            topic: "billing/new".to_string(),
        };
        let display = StackError::new(err).context("publish").to_string();
        assert!(display.starts_with("publish: "));
        assert!(display.contains("billing/new"));
    }

    #[test]
    fn test_is_code() {
        let stack = StackError::new(MailboxError::CorruptRecord {
            name: "n".into(),
            reason: "r".into(),
        });
        assert!(stack.is(StatusCode::CorruptedData));
        assert!(!stack.is(StatusCode::Io));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialization() {
        let stack = StackError::new(AuthError::UnknownToken {
            token: "abc".to_string(),
        })
        .context("authorize");

        let response = stack.to_response();
        assert_eq!(response.code, StatusCode::InvalidToken as u32);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("Unknown token"));
    }
}
