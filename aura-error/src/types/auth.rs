use crate::{ErrorExt, StatusCode};

/// Ошибки контроля доступа.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// Токен отсутствует в таблице (ни в памяти, ни на диске)
    UnknownToken { token: String },
    /// Токен есть, но его права не покрывают (действие, топик)
    PermissionDenied {
        owner: String,
        action: String,
        topic: String,
    },
    /// Строку права не удалось разобрать
    InvalidPermission { permission: String, reason: String },
    /// Таблицу токенов не удалось сохранить или прочитать
    TokenTable { reason: String },
}

impl std::fmt::Display for AuthError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            // значение токена — это capability, в сообщения его не выводим
            Self::UnknownToken { .. } => write!(f, "Unknown token"),
            Self::PermissionDenied {
                owner,
                action,
                topic,
            } => write!(f, "Permission denied: {owner} cannot {action} {topic}"),
            Self::InvalidPermission { permission, reason } => {
                write!(f, "Invalid permission '{permission}': {reason}")
            }
            Self::TokenTable { reason } => write!(f, "Token table error: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl ErrorExt for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownToken { .. } => StatusCode::InvalidToken,
            Self::PermissionDenied { .. } => StatusCode::PermissionDenied,
            Self::InvalidPermission { .. } => StatusCode::InvalidPermission,
            Self::TokenTable { .. } => StatusCode::StorageUnavailable,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "auth".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::PermissionDenied {
            owner,
            action,
            topic,
        } = self
        {
            tags.push(("owner", owner.clone()));
            tags.push(("action", action.clone()));
            tags.push(("topic", topic.clone()));
        }
        tags
    }
}
