//! Генераторы топиков и шаблонов для property-тестов.

use proptest::prelude::*;

/// Сегмент топика: короткое слово из маленького алфавита, чтобы совпадения
/// встречались часто.
pub fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("a".to_string()),
        Just("b".to_string()),
        Just("tasks".to_string()),
        "[a-d]{1,3}",
    ]
}

/// Конкретный топик из 1..=5 сегментов.
pub fn topic() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..=5).prop_map(|s| s.join("/"))
}

/// Шаблон подписки: сегменты или `+`, и, возможно, `#` в конце.
pub fn pattern() -> impl Strategy<Value = String> {
    let part = prop_oneof![3 => segment(), 1 => Just("+".to_string())];
    (prop::collection::vec(part, 0..=4), any::<bool>()).prop_filter_map(
        "pattern must not be empty",
        |(mut parts, multi)| {
            if multi {
                parts.push("#".to_string());
            }
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("/"))
            }
        },
    )
}
