//! Контроль доступа: токены, их владельцы и права.

pub mod permission;
pub mod tokens;

pub use permission::{Action, Permission};
pub use tokens::{Token, TokenGrant, TokenStore};
