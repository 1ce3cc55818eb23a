//! Notification records addressed to one user.
//!
//! # Invariants
//! - Records are immutable once stored; ids come from the store.
//! - `created_at` never decreases across appends for the same target.

use crate::model::post::PostId;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

const LIKE_MESSAGE: &str = "Someone liked your post";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone liked one of the target's posts.
    Like,
    /// Hydration reminder.
    Reminder,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Reminder => "reminder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "reminder" => Some(Self::Reminder),
            _ => None,
        }
    }
}

/// Event to append. Carries no id or timestamp; the store assigns both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub target_user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub post_id: Option<PostId>,
    pub actor_id: Option<UserId>,
}

impl NewNotification {
    /// Like event for the author of `post_id`.
    ///
    /// The message never embeds the actor's id; clients render the actor
    /// from `actor_id`.
    pub fn like(author: UserId, actor: UserId, post_id: PostId) -> Self {
        Self {
            message: LIKE_MESSAGE.to_string(),
            target_user_id: author,
            kind: NotificationKind::Like,
            post_id: Some(post_id),
            actor_id: Some(actor),
        }
    }

    pub fn reminder(target: UserId, message: impl Into<String>) -> Self {
        Self {
            target_user_id: target,
            kind: NotificationKind::Reminder,
            message: message.into(),
            post_id: None,
            actor_id: None,
        }
    }
}

/// Stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub target_user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub post_id: Option<PostId>,
    pub actor_id: Option<UserId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Store-assigned insertion order; breaks `created_at` ties.
    pub sequence: i64,
}

impl Notification {
    pub fn cursor(&self) -> NotificationCursor {
        NotificationCursor {
            created_at: self.created_at,
            sequence: self.sequence,
        }
    }
}

/// Keyset position in a newest-first notification listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationCursor {
    pub created_at: i64,
    pub sequence: i64,
}
