use super::{MULTI_LEVEL, SEPARATOR, SINGLE_LEVEL};

/// Проверяет, совпадает ли шаблон подписки с топиком.
///
/// Правила в порядке приоритета:
/// 1. Если последний сегмент шаблона `#`, топик должен содержать как минимум
///    `len(pattern) - 1` сегментов, и первые `len(pattern) - 1` сегментов
///    должны совпасть дословно. Одиночный `#` совпадает со всем.
/// 2. Иначе число сегментов должно совпадать, а каждый сегмент шаблона либо
///    равен сегменту топика, либо является `+`.
///
/// `#` не в конце шаблона сравнивается как обычный текст.
pub fn matches(
    pattern: &str,
    topic: &str,
) -> bool {
    let mut pattern_parts = pattern.split(SEPARATOR).peekable();
    let mut topic_parts = topic.split(SEPARATOR);

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (Some(MULTI_LEVEL), _) if pattern_parts.peek().is_none() => return true,
            (Some(p), Some(t)) => {
                if p != SINGLE_LEVEL && p != t {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Симметричное сопоставление: `a` совпадает с `b` или `b` с `a`.
///
/// Диспетчер использует его, чтобы топик, совпадающий с шаблоном в любую
/// сторону, считался одним потоком сообщений.
pub fn streams_alias(
    a: &str,
    b: &str,
) -> bool {
    matches(a, b) || matches(b, a)
}

/// Проверяет, что `grant` покрывает `pattern`: любой конкретный топик,
/// подходящий под `pattern`, подходит и под `grant`.
///
/// Для конкретного топика результат совпадает с [`matches`]. Для шаблонов
/// запрещает расширение: `a/+` не покрывает `a/#`.
pub fn covers(
    grant: &str,
    pattern: &str,
) -> bool {
    let mut grant_parts = grant.split(SEPARATOR).peekable();
    let mut pattern_parts = pattern.split(SEPARATOR);

    loop {
        match (grant_parts.next(), pattern_parts.next()) {
            (Some(MULTI_LEVEL), _) if grant_parts.peek().is_none() => return true,
            (Some(_), Some(MULTI_LEVEL)) => return false,
            (Some(SINGLE_LEVEL), Some(_)) => {}
            (Some(g), Some(p)) => {
                if p == SINGLE_LEVEL || g != p {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}
