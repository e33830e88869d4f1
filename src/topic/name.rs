use aura_error::TopicError;

use super::{MULTI_LEVEL, SEPARATOR, SINGLE_LEVEL};

/// Проверяет конкретный топик, в который публикуется сообщение.
///
/// Сегменты непустые, wildcard-символы `+` и `#` запрещены.
pub fn validate_topic(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    for (index, segment) in topic.split(SEPARATOR).enumerate() {
        if segment.is_empty() {
            return Err(TopicError::EmptySegment {
                topic: topic.to_string(),
                index,
            });
        }
        if segment.contains(['+', '#']) {
            return Err(TopicError::WildcardInTopic {
                topic: topic.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    Ok(())
}

/// Проверяет шаблон подписки.
///
/// `+` допустим только целым сегментом, `#` только целым последним
/// сегментом.
pub fn validate_pattern(pattern: &str) -> Result<(), TopicError> {
    if pattern.is_empty() {
        return Err(TopicError::Empty);
    }
    let mut segments = pattern.split(SEPARATOR).enumerate().peekable();
    while let Some((index, segment)) = segments.next() {
        if segment.is_empty() {
            return Err(TopicError::EmptySegment {
                topic: pattern.to_string(),
                index,
            });
        }
        let is_last = segments.peek().is_none();
        let misplaced = match segment {
            SINGLE_LEVEL => false,
            MULTI_LEVEL => !is_last,
            other => other.contains(['+', '#']),
        };
        if misplaced {
            return Err(TopicError::MisplacedWildcard {
                pattern: pattern.to_string(),
                segment: segment.to_string(),
            });
        }
    }
    Ok(())
}

/// `true`, если строка содержит wildcard-сегмент.
pub fn is_pattern(s: &str) -> bool {
    s.split(SEPARATOR)
        .any(|segment| segment == SINGLE_LEVEL || segment == MULTI_LEVEL)
}
