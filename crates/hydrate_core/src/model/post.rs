//! Feed post model and its reaction aggregate.
//!
//! # Responsibility
//! - Define the post record shared by every reaction store backend.
//! - Apply a transition to an in-memory post without breaking invariants.
//!
//! # Invariants
//! - `id` and `author_id` never change after creation.
//! - `like_count == liked_by.len()` and `dislike_count == disliked_by.len()`.
//! - `liked_by ∩ disliked_by = ∅`.

use crate::model::now_epoch_ms;
use crate::model::reaction::{ReactionKind, ReactionState, Transition};
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a feed post.
pub type PostId = Uuid;

pub const POST_BODY_MAX_CHARS: usize = 2000;

/// Feed post with its full reaction membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub body: String,
    pub like_count: u64,
    pub dislike_count: u64,
    pub liked_by: BTreeSet<UserId>,
    pub disliked_by: BTreeSet<UserId>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Reaction counts and the acting user's state after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReactionState {
    pub post_id: PostId,
    pub author_id: UserId,
    pub like_count: u64,
    pub dislike_count: u64,
    pub user_state: ReactionState,
    /// Membership delta that produced this state.
    pub applied: Transition,
}

/// Invariant violations on a post aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostValidationError {
    EmptyBody,
    BodyTooLong { chars: usize },
    CountMismatch {
        kind: ReactionKind,
        count: u64,
        members: usize,
    },
    OverlappingReaction(UserId),
}

impl Display for PostValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyBody => write!(f, "post body must not be blank"),
            Self::BodyTooLong { chars } => write!(
                f,
                "post body has {chars} characters; at most {POST_BODY_MAX_CHARS} are allowed"
            ),
            Self::CountMismatch {
                kind,
                count,
                members,
            } => write!(
                f,
                "{} count {count} does not match {members} members",
                kind.as_str()
            ),
            Self::OverlappingReaction(user) => {
                write!(f, "user {user} both likes and dislikes the post")
            }
        }
    }
}

impl Error for PostValidationError {}

impl Post {
    /// Creates a new post with a generated id and no reactions.
    ///
    /// The body is trimmed; blank or oversized bodies are rejected.
    pub fn new(author_id: UserId, body: impl AsRef<str>) -> Result<Self, PostValidationError> {
        let body = normalize_body(body.as_ref())?;
        Ok(Self {
            id: Uuid::new_v4(),
            author_id,
            body,
            like_count: 0,
            dislike_count: 0,
            liked_by: BTreeSet::new(),
            disliked_by: BTreeSet::new(),
            created_at: now_epoch_ms(),
        })
    }

    /// Current state of `user` on this post.
    pub fn state_of(&self, user: &UserId) -> ReactionState {
        if self.liked_by.contains(user) {
            ReactionState::Liked
        } else if self.disliked_by.contains(user) {
            ReactionState::Disliked
        } else {
            ReactionState::Neutral
        }
    }

    /// Applies `transition` for `user` if the user is in its source state.
    ///
    /// Returns the observed state unchanged as `Err` when the precondition
    /// does not hold; the post is left untouched in that case.
    pub fn apply(
        &mut self,
        user: &UserId,
        transition: Transition,
    ) -> Result<PostReactionState, ReactionState> {
        let current = self.state_of(user);
        if current != transition.source() {
            return Err(current);
        }

        if let Some(kind) = transition.removed() {
            self.members_mut(kind).remove(user);
        }
        if let Some(kind) = transition.added() {
            self.members_mut(kind).insert(user.clone());
        }
        self.like_count = self.liked_by.len() as u64;
        self.dislike_count = self.disliked_by.len() as u64;

        Ok(self.reaction_state(user, transition))
    }

    /// Snapshot of counts as seen by `user` after `applied`.
    pub fn reaction_state(&self, user: &UserId, applied: Transition) -> PostReactionState {
        PostReactionState {
            post_id: self.id,
            author_id: self.author_id.clone(),
            like_count: self.like_count,
            dislike_count: self.dislike_count,
            user_state: self.state_of(user),
            applied,
        }
    }

    /// Checks body and reaction invariants.
    pub fn validate(&self) -> Result<(), PostValidationError> {
        normalize_body(&self.body)?;
        for (kind, count, members) in [
            (ReactionKind::Like, self.like_count, &self.liked_by),
            (ReactionKind::Dislike, self.dislike_count, &self.disliked_by),
        ] {
            if count != members.len() as u64 {
                return Err(PostValidationError::CountMismatch {
                    kind,
                    count,
                    members: members.len(),
                });
            }
        }
        if let Some(user) = self.liked_by.intersection(&self.disliked_by).next() {
            return Err(PostValidationError::OverlappingReaction(user.clone()));
        }
        Ok(())
    }

    fn members_mut(&mut self, kind: ReactionKind) -> &mut BTreeSet<UserId> {
        match kind {
            ReactionKind::Like => &mut self.liked_by,
            ReactionKind::Dislike => &mut self.disliked_by,
        }
    }
}

/// Trims a post body and enforces length bounds.
pub fn normalize_body(body: &str) -> Result<String, PostValidationError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(PostValidationError::EmptyBody);
    }
    let chars = trimmed.chars().count();
    if chars > POST_BODY_MAX_CHARS {
        return Err(PostValidationError::BodyTooLong { chars });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{Post, PostValidationError};
    use crate::model::reaction::{ReactionKind, ReactionState, Transition};
    use crate::model::user::UserId;

    fn user(value: &str) -> UserId {
        UserId::parse(value).unwrap()
    }

    #[test]
    fn new_post_trims_body_and_starts_neutral() {
        let post = Post::new(user("author"), "  fonte na praça  ").unwrap();
        assert_eq!(post.body, "fonte na praça");
        assert_eq!(post.state_of(&user("alice")), ReactionState::Neutral);
        post.validate().unwrap();
    }

    #[test]
    fn new_post_rejects_blank_body() {
        assert_eq!(
            Post::new(user("author"), " \n ").unwrap_err(),
            PostValidationError::EmptyBody
        );
    }

    #[test]
    fn switch_moves_membership_in_one_step() {
        let mut post = Post::new(user("author"), "body").unwrap();
        let alice = user("alice");
        post.apply(&alice, Transition::AddDislike).unwrap();

        let state = post.apply(&alice, Transition::SwitchDislikeToLike).unwrap();
        assert_eq!((state.like_count, state.dislike_count), (1, 0));
        assert_eq!(state.user_state, ReactionState::Liked);
        assert!(post.disliked_by.is_empty());
        post.validate().unwrap();
    }

    #[test]
    fn apply_rejects_stale_source_state_without_mutation() {
        let mut post = Post::new(user("author"), "body").unwrap();
        let alice = user("alice");
        post.apply(&alice, Transition::AddLike).unwrap();
        let before = post.clone();

        let observed = post.apply(&alice, Transition::AddLike).unwrap_err();
        assert_eq!(observed, ReactionState::Liked);
        assert_eq!(post, before);
    }

    #[test]
    fn validate_detects_count_drift_and_overlap() {
        let mut post = Post::new(user("author"), "body").unwrap();
        post.like_count = 2;
        assert!(matches!(
            post.validate(),
            Err(PostValidationError::CountMismatch {
                kind: ReactionKind::Like,
                count: 2,
                members: 0
            })
        ));

        let mut post = Post::new(user("author"), "body").unwrap();
        post.liked_by.insert(user("bob"));
        post.disliked_by.insert(user("bob"));
        post.like_count = 1;
        post.dislike_count = 1;
        assert_eq!(
            post.validate(),
            Err(PostValidationError::OverlappingReaction(user("bob")))
        );
    }
}
