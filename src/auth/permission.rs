use std::{fmt, str::FromStr};

use aura_error::AuthError;
use serde::{Deserialize, Serialize};

use crate::topic::{covers, validate_pattern, MULTI_LEVEL, SEPARATOR, SINGLE_LEVEL};

/// Действие, на которое выдаётся право.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Subscribe,
    Publish,
    Unsubscribe,
}

/// Разобранное право доступа.
///
/// Строковая форма:
/// - `*` — любое действие на любом топике;
/// - `<action>:*` — действие на любом топике;
/// - `<action>:<pattern>` — действие на топиках, покрытых шаблоном.
///
/// В шаблоне права сегмент `*` означает «что угодно»: последний сегмент
/// становится `#`, остальные `+`. Так `publish:orders/*` разрешает
/// публикацию в `orders/new` и `orders/eu/new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    All,
    AnyTopic(Action),
    Scoped { action: Action, pattern: String },
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Action {
    pub const ALL: [Action; 3] = [Action::Subscribe, Action::Publish, Action::Unsubscribe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Publish => "publish",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

impl Permission {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let invalid = |reason: &str| AuthError::InvalidPermission {
            permission: raw.to_string(),
            reason: reason.to_string(),
        };

        let raw_trimmed = raw.trim();
        if raw_trimmed == "*" {
            return Ok(Self::All);
        }

        let (action, scope) = raw_trimmed
            .split_once(':')
            .ok_or_else(|| invalid("expected '<action>:<pattern>' or '*'"))?;
        let action = action
            .parse::<Action>()
            .map_err(|_| invalid("unknown action"))?;

        match scope {
            "*" => Ok(Self::AnyTopic(action)),
            "" => Err(invalid("empty pattern")),
            pattern => {
                let pattern = normalize_grant(pattern);
                validate_pattern(&pattern).map_err(|e| invalid(&e.to_string()))?;
                Ok(Self::Scoped { action, pattern })
            }
        }
    }

    /// Разрешает ли право `action` над `topic`.
    ///
    /// `topic` может быть шаблоном подписки: тогда право должно покрывать
    /// каждый топик, который этот шаблон может получить.
    pub fn allows(
        &self,
        action: Action,
        topic: &str,
    ) -> bool {
        match self {
            Self::All => true,
            Self::AnyTopic(a) => *a == action,
            Self::Scoped { action: a, pattern } => *a == action && covers(pattern, topic),
        }
    }

    pub fn action(&self) -> Option<Action> {
        match self {
            Self::All => None,
            Self::AnyTopic(a) | Self::Scoped { action: a, .. } => Some(*a),
        }
    }
}

/// Переводит `*`-сегменты права в wildcard-сегменты шаблона.
fn normalize_grant(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split(SEPARATOR).collect();
    let last = segments.len() - 1;

    segments
        .iter()
        .enumerate()
        .map(|(i, s)| match *s {
            "*" if i == last => MULTI_LEVEL,
            "*" => SINGLE_LEVEL,
            other => other,
        })
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subscribe" => Ok(Self::Subscribe),
            "publish" => Ok(Self::Publish),
            "unsubscribe" => Ok(Self::Unsubscribe),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Permission {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::AnyTopic(action) => write!(f, "{action}:*"),
            Self::Scoped { action, pattern } => write!(f, "{action}:{pattern}"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
