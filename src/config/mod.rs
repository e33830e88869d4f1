//! Конфигурация брокера и процесса.

pub mod broker;
pub mod settings;

pub use broker::*;
pub use settings::*;
