//! Core domain logic for the Hydrate water-point community feed.
//! This crate is the single source of truth for reaction invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::notification::{
    NewNotification, Notification, NotificationCursor, NotificationId, NotificationKind,
};
pub use model::post::{Post, PostId, PostReactionState, PostValidationError};
pub use model::reaction::{ReactionKind, ReactionState, Transition};
pub use model::user::{UserId, UserIdError};
pub use repo::memory::{MemoryNotificationRepository, MemoryReactionStore};
pub use repo::notification_repo::{
    NotificationError, NotificationListQuery, NotificationRepository, NotificationResult,
    SqliteNotificationRepository,
};
pub use repo::reaction_store::{
    PostListQuery, ReactionStore, SqliteReactionStore, StoreError, StoreResult,
};
pub use service::notification_service::{NotificationService, NotificationServiceError};
pub use service::post_service::{PostService, PostServiceError};
pub use service::reaction_engine::{
    ClientHint, NotificationDelivery, NotificationDeliveryFailed, ReactionEngine, ReactionError,
    ToggleOutcome,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
