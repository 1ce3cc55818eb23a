//! Repository layer: reaction store and notification emitter backends.
//!
//! # Responsibility
//! - Define the storage contracts the reaction engine depends on.
//! - Provide SQLite (durable) and in-memory (embedded) implementations.
//!
//! # Invariants
//! - Transitions on one post are linearizable; different posts never share
//!   a lock in the in-memory backend.
//! - Write conflicts are retried inside the store and never reach callers as
//!   a distinct error; only exhausted retries surface.
//! - A contended SQLite transition waits at most about
//!   `max_attempts * (TRANSITION_LOCK_WAIT + 128ms)` in total.
//! - Notification ids and timestamps are assigned by the store.

pub mod memory;
pub mod notification_repo;
pub mod reaction_store;

use std::time::Duration;

/// Default bound on attempts for one logical transition.
pub const DEFAULT_MAX_TRANSITION_ATTEMPTS: u32 = 8;

/// SQLite lock wait per transition attempt. Kept short so the store's own
/// attempt bound, not the connection busy timeout, sets the total wait.
pub const TRANSITION_LOCK_WAIT: Duration = Duration::from_millis(50);

const RETRY_BACKOFF_BASE_MS: u64 = 2;
const RETRY_BACKOFF_MAX_SHIFT: u32 = 6;

/// Backoff before retry number `attempt` (1-based): 2ms, 4ms, ... capped at 128ms.
pub(crate) fn retry_backoff(attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(RETRY_BACKOFF_MAX_SHIFT);
    Duration::from_millis(RETRY_BACKOFF_BASE_MS << shift)
}

#[cfg(test)]
mod tests {
    use super::retry_backoff;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(2));
        assert_eq!(retry_backoff(2), Duration::from_millis(4));
        assert_eq!(retry_backoff(7), Duration::from_millis(128));
        assert_eq!(retry_backoff(40), Duration::from_millis(128));
    }
}
