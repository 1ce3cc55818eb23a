//! Reaction engine use-case.
//!
//! # Responsibility
//! - Turn one like/dislike press into exactly one store transition.
//! - Decide whether the press notifies the post author and append that
//!   notification after the transition commits.
//!
//! # Invariants
//! - A missing post yields `NotFound` with no mutation and no notification.
//! - Only transitions into `Liked` by someone other than the author notify.
//! - A failed notification append never rolls back the committed reaction.
//! - Retrying the same press is intent-level: a second press of the same
//!   button toggles back. Transport retries must not resend blindly.

use crate::model::notification::{NewNotification, NotificationId};
use crate::model::post::PostId;
use crate::model::reaction::{ReactionKind, ReactionState, Transition};
use crate::model::user::UserId;
use crate::repo::notification_repo::NotificationRepository;
use crate::repo::reaction_store::{ReactionStore, StoreError};
use crate::repo::DEFAULT_MAX_TRANSITION_ATTEMPTS;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// What the client should do after a failed toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientHint {
    /// Content is gone; reload the feed.
    RefreshFeed,
    /// Outcome unknown or transient; the user may press again.
    TryAgain,
}

/// Errors surfaced by `toggle_reaction`.
#[derive(Debug)]
pub enum ReactionError {
    /// The post does not exist (or was deleted mid-request).
    NotFound(PostId),
    /// The user's state kept changing under concurrent presses.
    StateContention { post_id: PostId, attempts: u32 },
    /// Store failure, including exhausted write-lock retries.
    Store(StoreError),
}

impl ReactionError {
    pub fn client_hint(&self) -> ClientHint {
        match self {
            Self::NotFound(_) => ClientHint::RefreshFeed,
            Self::StateContention { .. } | Self::Store(_) => ClientHint::TryAgain,
        }
    }
}

impl Display for ReactionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "post not found: {id}"),
            Self::StateContention { post_id, attempts } => write!(
                f,
                "reaction state on post {post_id} changed concurrently {attempts} times"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReactionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ReactionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Non-fatal failure to record the author notification.
///
/// The reaction it belongs to is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDeliveryFailed {
    pub target_user_id: UserId,
    pub reason: String,
}

impl Display for NotificationDeliveryFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "notification for {} was not recorded: {}",
            self.target_user_id, self.reason
        )
    }
}

impl Error for NotificationDeliveryFailed {}

/// Notification side effect of one toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationDelivery {
    /// The transition does not notify, or the user reacted to their own post.
    NotRequired,
    Delivered { notification_id: NotificationId },
    Failed(NotificationDeliveryFailed),
}

/// Result of one committed toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub post_id: PostId,
    pub like_count: u64,
    pub dislike_count: u64,
    pub user_state: ReactionState,
    pub transition: Transition,
    pub notification: NotificationDelivery,
}

impl ToggleOutcome {
    /// The non-fatal delivery failure, if any.
    pub fn delivery_failure(&self) -> Option<&NotificationDeliveryFailed> {
        match &self.notification {
            NotificationDelivery::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Applies reaction presses through a store and emits author notifications.
pub struct ReactionEngine<S: ReactionStore, N: NotificationRepository> {
    store: S,
    notifications: N,
    max_attempts: u32,
}

impl<S: ReactionStore, N: NotificationRepository> ReactionEngine<S, N> {
    pub fn new(store: S, notifications: N) -> Self {
        Self::with_max_attempts(store, notifications, DEFAULT_MAX_TRANSITION_ATTEMPTS)
    }

    /// Bounds how often a press is recomputed after losing a race (min 1).
    pub fn with_max_attempts(store: S, notifications: N, max_attempts: u32) -> Self {
        Self {
            store,
            notifications,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    /// Current state of `user` on `post_id`.
    pub fn user_state(&self, post_id: PostId, user: &UserId) -> Result<ReactionState, ReactionError> {
        self.store.user_state(post_id, user).map_err(Into::into)
    }

    /// Applies one press of `kind` by `user` on `post_id`.
    ///
    /// # Contract
    /// - Exactly one transition is committed on success.
    /// - `NotFound` and store errors commit nothing and notify nobody.
    /// - A notification failure is reported in the outcome, not as `Err`.
    pub fn toggle_reaction(
        &self,
        post_id: PostId,
        user: &UserId,
        kind: ReactionKind,
    ) -> Result<ToggleOutcome, ReactionError> {
        let mut attempt = 0;
        let state = loop {
            attempt += 1;
            let transition = self.store.user_state(post_id, user)?.press(kind);
            match self.store.apply_transition(post_id, user, transition) {
                Ok(state) => break state,
                Err(StoreError::StaleState { actual, .. }) => {
                    if attempt >= self.max_attempts {
                        warn!(
                            "event=reaction_toggle module=engine status=error post_id={} error_code=state_contention attempts={}",
                            post_id, attempt
                        );
                        return Err(ReactionError::StateContention {
                            post_id,
                            attempts: attempt,
                        });
                    }
                    debug!(
                        "event=reaction_toggle module=engine status=retry post_id={} observed={:?} attempt={}",
                        post_id, actual, attempt
                    );
                }
                Err(err) => {
                    warn!(
                        "event=reaction_toggle module=engine status=error post_id={} error={}",
                        post_id, err
                    );
                    return Err(err.into());
                }
            }
        };

        let transition = state.applied;
        let notification = if transition.notifies_author() && state.author_id != *user {
            self.notify_author(&state.author_id, user, post_id)
        } else {
            NotificationDelivery::NotRequired
        };

        info!(
            "event=reaction_toggle module=engine status=ok post_id={} transition={} likes={} dislikes={} attempts={}",
            post_id,
            transition.as_str(),
            state.like_count,
            state.dislike_count,
            attempt
        );

        Ok(ToggleOutcome {
            post_id,
            like_count: state.like_count,
            dislike_count: state.dislike_count,
            user_state: state.user_state,
            transition,
            notification,
        })
    }

    fn notify_author(&self, author: &UserId, actor: &UserId, post_id: PostId) -> NotificationDelivery {
        let event = NewNotification::like(author.clone(), actor.clone(), post_id);
        match self.notifications.append(&event) {
            Ok(stored) => NotificationDelivery::Delivered {
                notification_id: stored.id,
            },
            Err(err) => {
                warn!(
                    "event=notification_append module=engine status=error post_id={} error={}",
                    post_id, err
                );
                NotificationDelivery::Failed(NotificationDeliveryFailed {
                    target_user_id: author.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientHint, NotificationDelivery, ReactionEngine, ReactionError};
    use crate::model::post::Post;
    use crate::model::reaction::{ReactionKind, ReactionState, Transition};
    use crate::model::user::UserId;
    use crate::repo::memory::{MemoryNotificationRepository, MemoryReactionStore};
    use crate::repo::reaction_store::ReactionStore;
    use uuid::Uuid;

    fn user(value: &str) -> UserId {
        UserId::parse(value).unwrap()
    }

    #[test]
    fn self_like_updates_counts_without_notification() {
        let engine = ReactionEngine::new(
            MemoryReactionStore::new(),
            MemoryNotificationRepository::new(),
        );
        let author = user("author");
        let post = Post::new(author.clone(), "my fountain").unwrap();
        engine.store().create_post(&post).unwrap();

        let outcome = engine
            .toggle_reaction(post.id, &author, ReactionKind::Like)
            .unwrap();
        assert_eq!(outcome.like_count, 1);
        assert_eq!(outcome.user_state, ReactionState::Liked);
        assert_eq!(outcome.transition, Transition::AddLike);
        assert_eq!(outcome.notification, NotificationDelivery::NotRequired);
    }

    #[test]
    fn missing_post_maps_to_refresh_hint() {
        let engine = ReactionEngine::new(
            MemoryReactionStore::new(),
            MemoryNotificationRepository::new(),
        );
        let missing = Uuid::new_v4();

        let err = engine
            .toggle_reaction(missing, &user("alice"), ReactionKind::Dislike)
            .unwrap_err();
        assert!(matches!(err, ReactionError::NotFound(id) if id == missing));
        assert_eq!(err.client_hint(), ClientHint::RefreshFeed);
    }

    #[test]
    fn outcome_serializes_with_tagged_delivery() {
        let engine = ReactionEngine::new(
            MemoryReactionStore::new(),
            MemoryNotificationRepository::new(),
        );
        let post = Post::new(user("author"), "body").unwrap();
        engine.store().create_post(&post).unwrap();

        let outcome = engine
            .toggle_reaction(post.id, &user("alice"), ReactionKind::Dislike)
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["user_state"], "disliked");
        assert_eq!(json["transition"], "add_dislike");
        assert_eq!(json["notification"]["status"], "not_required");
    }
}
