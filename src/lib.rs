/// Access control: tokens, owners, permission strings.
pub mod auth;
/// Broker and process configuration loading.
pub mod config;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Durable mailbox: shared storage of published message records.
pub mod mailbox;
/// Pub/Sub: Broker, dispatcher, subscription workers, mailbox scanner.
pub mod pubsub;
/// Topic names, subscription patterns and wildcard matching.
pub mod topic;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Tokens and permissions.
pub use auth::{Action, Permission, Token, TokenGrant, TokenStore};
/// Configuration.
pub use config::{BrokerConfig, Settings};
/// Error types shared with the `aura-error` crate.
pub use aura_error::{AuraResult, StackError, StatusCode};
/// Logging bootstrap.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Mailbox storage.
pub use mailbox::{FsMailbox, Mailbox, MemoryMailbox, MessageRecord, RecordHandle};
/// Pub/Sub API.
pub use pubsub::{Broker, BrokerStats, DiscoveryMode, Message, MessageHandler, ScanReport};
/// Topic matching.
pub use topic::{covers, matches, streams_alias, validate_pattern, validate_topic};
