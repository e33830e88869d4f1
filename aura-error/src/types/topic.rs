use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки валидации имён топиков и шаблонов подписки.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,

    #[error("topic '{topic}' has an empty segment at position {index}")]
    EmptySegment { topic: String, index: usize },

    #[error("concrete topic '{topic}' contains wildcard segment '{segment}'")]
    WildcardInTopic { topic: String, segment: String },

    #[error("pattern '{pattern}' has misplaced wildcard in segment '{segment}'")]
    MisplacedWildcard { pattern: String, segment: String },
}

impl ErrorExt for TopicError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::MisplacedWildcard { .. } => StatusCode::InvalidPattern,
            _ => StatusCode::InvalidTopic,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
