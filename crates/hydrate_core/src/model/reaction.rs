//! Reaction state machine.
//!
//! # Responsibility
//! - Map a `(current state, pressed button)` pair to exactly one transition.
//! - Describe each transition as a membership delta that stores apply
//!   atomically.
//!
//! # Invariants
//! - The state of a `(post, user)` pair is derived from membership and never
//!   stored on its own.
//! - Every transition removes at most one kind and adds at most one kind, and
//!   never adds the kind it removes.
//! - Only transitions that end in `Liked` notify the post author.

use serde::{Deserialize, Serialize};

/// Button pressed by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    /// Storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    /// Parses a storage/wire label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "like" => Some(Self::Like),
            "dislike" => Some(Self::Dislike),
            _ => None,
        }
    }
}

/// A user's reaction state on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionState {
    Neutral,
    Liked,
    Disliked,
}

impl ReactionState {
    /// Derives the state from the kind of membership row a user holds.
    pub fn from_membership(kind: Option<ReactionKind>) -> Self {
        match kind {
            None => Self::Neutral,
            Some(ReactionKind::Like) => Self::Liked,
            Some(ReactionKind::Dislike) => Self::Disliked,
        }
    }

    /// Membership kind held in this state.
    pub fn membership(self) -> Option<ReactionKind> {
        match self {
            Self::Neutral => None,
            Self::Liked => Some(ReactionKind::Like),
            Self::Disliked => Some(ReactionKind::Dislike),
        }
    }

    /// Selects the transition triggered by pressing `kind` in this state.
    ///
    /// Pressing the button of the current reaction toggles it off; pressing
    /// the other button switches in one step.
    pub fn press(self, kind: ReactionKind) -> Transition {
        match (self, kind) {
            (Self::Neutral, ReactionKind::Like) => Transition::AddLike,
            (Self::Liked, ReactionKind::Like) => Transition::RemoveLike,
            (Self::Disliked, ReactionKind::Like) => Transition::SwitchDislikeToLike,
            (Self::Neutral, ReactionKind::Dislike) => Transition::AddDislike,
            (Self::Disliked, ReactionKind::Dislike) => Transition::RemoveDislike,
            (Self::Liked, ReactionKind::Dislike) => Transition::SwitchLikeToDislike,
        }
    }
}

/// One atomic named change of a post's reaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    AddLike,
    RemoveLike,
    AddDislike,
    RemoveDislike,
    SwitchLikeToDislike,
    SwitchDislikeToLike,
}

impl Transition {
    /// State the user must be in for this transition to apply.
    pub fn source(self) -> ReactionState {
        match self {
            Self::AddLike | Self::AddDislike => ReactionState::Neutral,
            Self::RemoveLike | Self::SwitchLikeToDislike => ReactionState::Liked,
            Self::RemoveDislike | Self::SwitchDislikeToLike => ReactionState::Disliked,
        }
    }

    /// State the user is in after the transition.
    pub fn target(self) -> ReactionState {
        match self {
            Self::RemoveLike | Self::RemoveDislike => ReactionState::Neutral,
            Self::AddLike | Self::SwitchDislikeToLike => ReactionState::Liked,
            Self::AddDislike | Self::SwitchLikeToDislike => ReactionState::Disliked,
        }
    }

    /// Membership kind the user leaves, if any.
    pub fn removed(self) -> Option<ReactionKind> {
        self.source().membership()
    }

    /// Membership kind the user joins, if any.
    pub fn added(self) -> Option<ReactionKind> {
        self.target().membership()
    }

    /// Whether applying this transition should notify the post author.
    ///
    /// Self-reactions are filtered by the engine, not here.
    pub fn notifies_author(self) -> bool {
        self.target() == ReactionState::Liked
    }

    /// Stable label for logs and the FFI surface.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddLike => "add_like",
            Self::RemoveLike => "remove_like",
            Self::AddDislike => "add_dislike",
            Self::RemoveDislike => "remove_dislike",
            Self::SwitchLikeToDislike => "switch_like_to_dislike",
            Self::SwitchDislikeToLike => "switch_dislike_to_like",
        }
    }
}
