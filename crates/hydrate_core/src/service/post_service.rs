//! Feed post use-cases.
//!
//! # Responsibility
//! - Create, read, list and delete posts around the reaction store.
//!
//! # Invariants
//! - Only the author may delete a post.
//! - Deleting a post removes its reaction membership with it.

use crate::model::post::{Post, PostId, PostValidationError};
use crate::model::user::UserId;
use crate::repo::reaction_store::{PostListQuery, ReactionStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from post use-cases.
#[derive(Debug)]
pub enum PostServiceError {
    InvalidPost(PostValidationError),
    NotFound(PostId),
    /// Requester is not the post author.
    PermissionDenied(PostId),
    Store(StoreError),
}

impl Display for PostServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPost(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "post not found: {id}"),
            Self::PermissionDenied(id) => write!(f, "only the author may delete post {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PostServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPost(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for PostServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Validation(err) => Self::InvalidPost(err),
            other => Self::Store(other),
        }
    }
}

impl From<PostValidationError> for PostServiceError {
    fn from(value: PostValidationError) -> Self {
        Self::InvalidPost(value)
    }
}

/// Feed facade over a reaction store.
pub struct PostService<S: ReactionStore> {
    store: S,
}

impl<S: ReactionStore> PostService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Publishes a new post by `author`.
    pub fn create_post(&self, author: &UserId, body: &str) -> Result<Post, PostServiceError> {
        let post = Post::new(author.clone(), body)?;
        self.store.create_post(&post)?;
        info!("event=post_create module=posts status=ok post_id={}", post.id);
        Ok(post)
    }

    pub fn get_post(&self, id: PostId) -> Result<Option<Post>, PostServiceError> {
        self.store.get_post(id).map_err(Into::into)
    }

    /// Lists the feed, newest first.
    pub fn list_posts(&self, query: &PostListQuery) -> Result<Vec<Post>, PostServiceError> {
        self.store.list_posts(query).map_err(Into::into)
    }

    /// Deletes a post on behalf of its author.
    pub fn delete_post(&self, id: PostId, requester: &UserId) -> Result<(), PostServiceError> {
        let Some(post) = self.store.get_post(id)? else {
            return Err(PostServiceError::NotFound(id));
        };
        if post.author_id != *requester {
            warn!("event=post_delete module=posts status=denied post_id={}", id);
            return Err(PostServiceError::PermissionDenied(id));
        }
        self.store.delete_post(id)?;
        info!("event=post_delete module=posts status=ok post_id={}", id);
        Ok(())
    }
}
