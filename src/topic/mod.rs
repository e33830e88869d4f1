//! Топики и шаблоны подписки.
//!
//! - `matcher`: чистые функции сопоставления шаблона и топика.
//! - `name`: валидация конкретных топиков и шаблонов.

pub mod matcher;
pub mod name;

pub use matcher::*;
pub use name::*;

/// Разделитель уровней топика.
pub const SEPARATOR: char = '/';
/// Одноуровневый wildcard: совпадает ровно с одним сегментом.
pub const SINGLE_LEVEL: &str = "+";
/// Многоуровневый wildcard: допустим только последним сегментом шаблона.
pub const MULTI_LEVEL: &str = "#";
