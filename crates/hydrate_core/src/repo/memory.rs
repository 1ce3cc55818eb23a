//! In-process reaction store and notification emitter.
//!
//! # Responsibility
//! - Back the reaction engine when the store is embedded in the app process.
//! - Serve as a thread-safe reference backend in tests.
//!
//! # Invariants
//! - Each post sits behind its own mutex; the post map lock is only held to
//!   find or insert/remove a slot, never while a transition runs.
//! - A deleted post's slot is emptied under its mutex before it leaves the
//!   map, so an in-flight transition sees `NotFound` instead of mutating a
//!   detached copy.

use crate::model::notification::{NewNotification, Notification, NotificationId};
use crate::model::now_epoch_ms;
use crate::model::post::{Post, PostId, PostReactionState};
use crate::model::reaction::{ReactionState, Transition};
use crate::model::user::UserId;
use crate::repo::notification_repo::{
    normalize_message, normalize_notification_limit, NotificationError, NotificationListQuery,
    NotificationRepository, NotificationResult,
};
use crate::repo::reaction_store::{
    normalize_post_limit, PostListQuery, ReactionStore, StoreError, StoreResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

type PostSlot = Arc<Mutex<Option<Post>>>;

/// Reaction store holding every post in memory.
#[derive(Debug, Default)]
pub struct MemoryReactionStore {
    posts: RwLock<HashMap<PostId, PostSlot>>,
}

impl MemoryReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: PostId) -> StoreResult<Option<PostSlot>> {
        let posts = self
            .posts
            .read()
            .map_err(|_| StoreError::Unavailable("post map lock poisoned"))?;
        Ok(posts.get(&id).cloned())
    }
}

fn lock_slot(slot: &PostSlot) -> StoreResult<MutexGuard<'_, Option<Post>>> {
    slot.lock().map_err(|_| StoreError::Unavailable("post lock poisoned"))
}

impl ReactionStore for MemoryReactionStore {
    fn create_post(&self, post: &Post) -> StoreResult<PostId> {
        post.validate()?;
        if post.like_count != 0 || post.dislike_count != 0 {
            return Err(StoreError::InvalidData(
                "new posts must not carry reactions".to_string(),
            ));
        }

        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Unavailable("post map lock poisoned"))?;
        if posts.contains_key(&post.id) {
            return Err(StoreError::InvalidData(format!(
                "post id {} already exists",
                post.id
            )));
        }
        posts.insert(post.id, Arc::new(Mutex::new(Some(post.clone()))));
        Ok(post.id)
    }

    fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        match self.slot(id)? {
            Some(slot) => Ok(lock_slot(&slot)?.clone()),
            None => Ok(None),
        }
    }

    fn list_posts(&self, query: &PostListQuery) -> StoreResult<Vec<Post>> {
        let slots: Vec<PostSlot> = self
            .posts
            .read()
            .map_err(|_| StoreError::Unavailable("post map lock poisoned"))?
            .values()
            .cloned()
            .collect();

        let mut posts = Vec::with_capacity(slots.len());
        for slot in &slots {
            if let Some(post) = lock_slot(slot)?.as_ref() {
                posts.push(post.clone());
            }
        }
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(posts
            .into_iter()
            .skip(query.offset as usize)
            .take(normalize_post_limit(query.limit) as usize)
            .collect())
    }

    fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let mut posts = self
            .posts
            .write()
            .map_err(|_| StoreError::Unavailable("post map lock poisoned"))?;
        let Some(slot) = posts.remove(&id) else {
            return Err(StoreError::NotFound(id));
        };
        lock_slot(&slot)?.take();
        Ok(())
    }

    fn user_state(&self, post_id: PostId, user: &UserId) -> StoreResult<ReactionState> {
        let slot = self.slot(post_id)?.ok_or(StoreError::NotFound(post_id))?;
        let guard = lock_slot(&slot)?;
        let post = guard.as_ref().ok_or(StoreError::NotFound(post_id))?;
        Ok(post.state_of(user))
    }

    fn apply_transition(
        &self,
        post_id: PostId,
        user: &UserId,
        transition: Transition,
    ) -> StoreResult<PostReactionState> {
        let slot = self.slot(post_id)?.ok_or(StoreError::NotFound(post_id))?;
        let mut guard = lock_slot(&slot)?;
        let post = guard.as_mut().ok_or(StoreError::NotFound(post_id))?;
        post.apply(user, transition)
            .map_err(|actual| StoreError::StaleState {
                post_id,
                expected: transition.source(),
                actual,
            })
    }
}

#[derive(Debug, Default)]
struct NotificationLog {
    next_sequence: i64,
    by_target: HashMap<UserId, Vec<Notification>>,
    owners: HashMap<NotificationId, UserId>,
}

/// Notification emitter holding every record in memory.
///
/// Records per target are kept in insertion order, which is also ascending
/// `(created_at, sequence)` order.
#[derive(Debug, Default)]
pub struct MemoryNotificationRepository {
    log: Mutex<NotificationLog>,
}

impl MemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> NotificationResult<MutexGuard<'_, NotificationLog>> {
        self.log
            .lock()
            .map_err(|_| NotificationError::Unavailable("notification log lock poisoned"))
    }
}

impl NotificationRepository for MemoryNotificationRepository {
    fn append(&self, event: &NewNotification) -> NotificationResult<Notification> {
        let message = normalize_message(&event.message)?;
        let mut log = self.log()?;

        log.next_sequence += 1;
        let sequence = log.next_sequence;
        let id = Uuid::new_v4();
        let records = log
            .by_target
            .entry(event.target_user_id.clone())
            .or_default();
        let floor = records.last().map_or(i64::MIN, |last| last.created_at);

        let notification = Notification {
            id,
            target_user_id: event.target_user_id.clone(),
            kind: event.kind,
            message,
            post_id: event.post_id,
            actor_id: event.actor_id.clone(),
            created_at: now_epoch_ms().max(floor),
            sequence,
        };
        records.push(notification.clone());
        log.owners.insert(id, event.target_user_id.clone());
        Ok(notification)
    }

    fn get(&self, id: NotificationId) -> NotificationResult<Option<Notification>> {
        let log = self.log()?;
        let found = log
            .owners
            .get(&id)
            .and_then(|target| log.by_target.get(target))
            .and_then(|records| records.iter().find(|record| record.id == id))
            .cloned();
        Ok(found)
    }

    fn list_for_target(
        &self,
        target: &UserId,
        query: &NotificationListQuery,
    ) -> NotificationResult<Vec<Notification>> {
        let log = self.log()?;
        let Some(records) = log.by_target.get(target) else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .rev()
            .filter(|record| query.before.map_or(true, |cursor| record.cursor() < cursor))
            .take(normalize_notification_limit(query.limit) as usize)
            .cloned()
            .collect())
    }

    fn delete(&self, id: NotificationId) -> NotificationResult<()> {
        let mut log = self.log()?;
        let Some(target) = log.owners.remove(&id) else {
            return Err(NotificationError::NotFound(id));
        };
        if let Some(records) = log.by_target.get_mut(&target) {
            records.retain(|record| record.id != id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryNotificationRepository, MemoryReactionStore};
    use crate::model::notification::NewNotification;
    use crate::model::post::Post;
    use crate::model::reaction::{ReactionState, Transition};
    use crate::model::user::UserId;
    use crate::repo::notification_repo::{NotificationListQuery, NotificationRepository};
    use crate::repo::reaction_store::{ReactionStore, StoreError};

    fn user(value: &str) -> UserId {
        UserId::parse(value).unwrap()
    }

    #[test]
    fn deleted_post_rejects_transitions_and_reads() {
        let store = MemoryReactionStore::new();
        let post = Post::new(user("author"), "body").unwrap();
        store.create_post(&post).unwrap();
        store.delete_post(post.id).unwrap();

        let err = store
            .apply_transition(post.id, &user("alice"), Transition::AddLike)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == post.id));
        assert!(store.get_post(post.id).unwrap().is_none());
        assert!(matches!(
            store.delete_post(post.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn stale_transition_reports_observed_state() {
        let store = MemoryReactionStore::new();
        let post = Post::new(user("author"), "body").unwrap();
        store.create_post(&post).unwrap();
        store
            .apply_transition(post.id, &user("alice"), Transition::AddDislike)
            .unwrap();

        let err = store
            .apply_transition(post.id, &user("alice"), Transition::AddLike)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleState {
                expected: ReactionState::Neutral,
                actual: ReactionState::Disliked,
                ..
            }
        ));
    }

    #[test]
    fn notification_log_keeps_sequence_and_timestamp_monotonic() {
        let repo = MemoryNotificationRepository::new();
        let target = user("author");
        let first = repo
            .append(&NewNotification::reminder(target.clone(), "drink water"))
            .unwrap();
        let second = repo
            .append(&NewNotification::reminder(target.clone(), "drink more water"))
            .unwrap();

        assert!(second.sequence > first.sequence);
        assert!(second.created_at >= first.created_at);
        let listed = repo
            .list_for_target(&target, &NotificationListQuery::default())
            .unwrap();
        assert_eq!(listed, vec![second, first]);
    }
}
