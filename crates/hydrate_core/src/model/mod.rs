//! Domain model for feed posts, reactions and notifications.
//!
//! # Responsibility
//! - Define canonical data structures used by stores and the reaction engine.
//! - Own the pure reaction state machine so every backend applies the same
//!   transitions.
//!
//! # Invariants
//! - `liked_by` and `disliked_by` are disjoint for every post.
//! - Reaction counts always equal the cardinality of their membership set.

pub mod notification;
pub mod post;
pub mod reaction;
pub mod user;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in Unix epoch milliseconds.
///
/// Clamps to `0` if the clock reads earlier than the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
