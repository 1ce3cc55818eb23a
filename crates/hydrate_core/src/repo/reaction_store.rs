//! Reaction store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Hold the authoritative reaction state per post.
//! - Apply one named transition per call as an atomic read-modify-write.
//!
//! # Invariants
//! - A transition is applied only if the user is still in its source state;
//!   otherwise `StaleState` is returned and nothing is written.
//! - Membership rows and post counters change in the same SQLite transaction.
//! - `SQLITE_BUSY` while taking the write lock is a transient conflict and is
//!   retried here, up to `max_attempts`.
//! - Each attempt waits at most `TRANSITION_LOCK_WAIT` for the lock; the
//!   connection's normal busy timeout is restored before returning.

use crate::db::{DbError, DbResult, BUSY_TIMEOUT};
use crate::model::post::{Post, PostId, PostReactionState, PostValidationError};
use crate::model::reaction::{ReactionKind, ReactionState, Transition};
use crate::model::user::UserId;
use crate::repo::{retry_backoff, DEFAULT_MAX_TRANSITION_ATTEMPTS, TRANSITION_LOCK_WAIT};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const POSTS_DEFAULT_LIMIT: u32 = 20;
const POSTS_LIMIT_MAX: u32 = 50;

const POST_SELECT_SQL: &str = "SELECT
    uuid,
    author_id,
    body,
    like_count,
    dislike_count,
    created_at
FROM posts";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from reaction store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target post does not exist at the time of the operation.
    NotFound(PostId),
    /// The user's state changed between read and apply.
    StaleState {
        post_id: PostId,
        expected: ReactionState,
        actual: ReactionState,
    },
    /// Write lock stayed contended for every allowed attempt.
    ConflictRetriesExhausted { post_id: PostId, attempts: u32 },
    /// Post rejected by model validation.
    Validation(PostValidationError),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
    /// In-process state is unusable (poisoned lock).
    Unavailable(&'static str),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "post not found: {id}"),
            Self::StaleState {
                post_id,
                expected,
                actual,
            } => write!(
                f,
                "reaction state on post {post_id} is {actual:?}, expected {expected:?}"
            ),
            Self::ConflictRetriesExhausted { post_id, attempts } => write!(
                f,
                "post {post_id} stayed locked by concurrent writers after {attempts} attempts"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted post data: {message}"),
            Self::Unavailable(what) => write!(f, "reaction store unavailable: {what}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PostValidationError> for StoreError {
    fn from(value: PostValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Pagination options for the feed listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostListQuery {
    /// Defaults to 20 and clamps to 50.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Normalizes feed page size.
pub fn normalize_post_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => POSTS_DEFAULT_LIMIT,
        Some(value) => value.min(POSTS_LIMIT_MAX),
    }
}

/// Storage contract for posts and their reaction membership.
pub trait ReactionStore {
    /// Persists a freshly created post.
    fn create_post(&self, post: &Post) -> StoreResult<PostId>;
    /// Loads one post with full membership.
    fn get_post(&self, id: PostId) -> StoreResult<Option<Post>>;
    /// Lists posts newest first.
    fn list_posts(&self, query: &PostListQuery) -> StoreResult<Vec<Post>>;
    /// Removes a post and every membership entry that references it.
    fn delete_post(&self, id: PostId) -> StoreResult<()>;
    /// Reads the user's current state on a post.
    fn user_state(&self, post_id: PostId, user: &UserId) -> StoreResult<ReactionState>;
    /// Applies one transition atomically with respect to other transitions
    /// on the same post.
    fn apply_transition(
        &self,
        post_id: PostId,
        user: &UserId,
        transition: Transition,
    ) -> StoreResult<PostReactionState>;
}

/// SQLite-backed reaction store.
///
/// Borrows a connection; concurrent callers each open their own connection
/// to the same database file.
pub struct SqliteReactionStore<'conn> {
    conn: &'conn Connection,
    max_attempts: u32,
}

impl<'conn> SqliteReactionStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_max_attempts(conn, DEFAULT_MAX_TRANSITION_ATTEMPTS)
    }

    /// Overrides the bound on write-lock attempts per transition (min 1).
    pub fn with_max_attempts(conn: &'conn Connection, max_attempts: u32) -> Self {
        Self {
            conn,
            max_attempts: max_attempts.max(1),
        }
    }

    fn try_apply(
        &self,
        post_id: PostId,
        user: &UserId,
        transition: Transition,
    ) -> StoreResult<PostReactionState> {
        let post_uuid = post_id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let Some(author_id) = load_author(&tx, post_uuid.as_str())? else {
            return Err(StoreError::NotFound(post_id));
        };

        let actual = ReactionState::from_membership(load_membership(
            &tx,
            post_uuid.as_str(),
            user,
        )?);
        if actual != transition.source() {
            return Err(StoreError::StaleState {
                post_id,
                expected: transition.source(),
                actual,
            });
        }

        match (transition.removed(), transition.added()) {
            (None, Some(added)) => {
                tx.execute(
                    "INSERT INTO post_reactions (post_uuid, user_id, kind)
                     VALUES (?1, ?2, ?3);",
                    params![post_uuid.as_str(), user.as_str(), added.as_str()],
                )?;
            }
            (Some(_), None) => {
                tx.execute(
                    "DELETE FROM post_reactions
                     WHERE post_uuid = ?1
                       AND user_id = ?2;",
                    params![post_uuid.as_str(), user.as_str()],
                )?;
            }
            (Some(_), Some(added)) => {
                tx.execute(
                    "UPDATE post_reactions
                     SET kind = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE post_uuid = ?1
                       AND user_id = ?2;",
                    params![post_uuid.as_str(), user.as_str(), added.as_str()],
                )?;
            }
            (None, None) => {}
        }

        tx.execute(
            "UPDATE posts
             SET like_count = like_count + ?2,
                 dislike_count = dislike_count + ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                post_uuid.as_str(),
                count_delta(transition, ReactionKind::Like),
                count_delta(transition, ReactionKind::Dislike),
            ],
        )?;

        let (like_count, dislike_count): (i64, i64) = tx.query_row(
            "SELECT like_count, dislike_count FROM posts WHERE uuid = ?1;",
            [post_uuid.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        tx.commit()?;

        Ok(PostReactionState {
            post_id,
            author_id,
            like_count: to_count(like_count, "like_count")?,
            dislike_count: to_count(dislike_count, "dislike_count")?,
            user_state: transition.target(),
            applied: transition,
        })
    }

    fn apply_with_retries(
        &self,
        post_id: PostId,
        user: &UserId,
        transition: Transition,
    ) -> StoreResult<PostReactionState> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_apply(post_id, user, transition) {
                Err(StoreError::Db(err)) if err.is_transient() => {
                    if attempt >= self.max_attempts {
                        warn!(
                            "event=transition_conflict module=store status=error post_id={} transition={} attempts={}",
                            post_id,
                            transition.as_str(),
                            attempt
                        );
                        return Err(StoreError::ConflictRetriesExhausted {
                            post_id,
                            attempts: attempt,
                        });
                    }
                    debug!(
                        "event=transition_conflict module=store status=retry post_id={} transition={} attempt={}",
                        post_id,
                        transition.as_str(),
                        attempt
                    );
                    std::thread::sleep(retry_backoff(attempt));
                }
                other => return other,
            }
        }
    }
}

impl ReactionStore for SqliteReactionStore<'_> {
    fn create_post(&self, post: &Post) -> StoreResult<PostId> {
        post.validate()?;
        if post.like_count != 0 || post.dislike_count != 0 {
            return Err(StoreError::InvalidData(
                "new posts must not carry reactions".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO posts (uuid, author_id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4);",
            params![
                post.id.to_string(),
                post.author_id.as_str(),
                post.body.as_str(),
                post.created_at,
            ],
        )?;
        Ok(post.id)
    }

    fn get_post(&self, id: PostId) -> StoreResult<Option<Post>> {
        // Counters and membership must come from one snapshot.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let mut stmt = tx.prepare(&format!("{POST_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_post_row(&tx, row)?));
        }
        Ok(None)
    }

    fn list_posts(&self, query: &PostListQuery) -> StoreResult<Vec<Post>> {
        let mut sql = format!("{POST_SELECT_SQL} ORDER BY created_at DESC, uuid ASC LIMIT ?");
        let mut bind_values = vec![Value::Integer(i64::from(normalize_post_limit(
            query.limit,
        )))];
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let mut stmt = tx.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_post_row(&tx, row)?);
        }
        Ok(posts)
    }

    fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM posts WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn user_state(&self, post_id: PostId, user: &UserId) -> StoreResult<ReactionState> {
        let post_uuid = post_id.to_string();
        if load_author(self.conn, post_uuid.as_str())?.is_none() {
            return Err(StoreError::NotFound(post_id));
        }
        let kind = load_membership(self.conn, post_uuid.as_str(), user)?;
        Ok(ReactionState::from_membership(kind))
    }

    fn apply_transition(
        &self,
        post_id: PostId,
        user: &UserId,
        transition: Transition,
    ) -> StoreResult<PostReactionState> {
        self.conn.busy_timeout(TRANSITION_LOCK_WAIT)?;
        let result = self.apply_with_retries(post_id, user, transition);
        let restored = self.conn.busy_timeout(BUSY_TIMEOUT);
        let state = result?;
        restored?;
        Ok(state)
    }
}

fn count_delta(transition: Transition, kind: ReactionKind) -> i64 {
    let added = i64::from(transition.added() == Some(kind));
    let removed = i64::from(transition.removed() == Some(kind));
    added - removed
}

fn load_author(conn: &Connection, post_uuid: &str) -> StoreResult<Option<UserId>> {
    let author: Option<String> = conn
        .query_row(
            "SELECT author_id FROM posts WHERE uuid = ?1;",
            [post_uuid],
            |row| row.get(0),
        )
        .optional()?;
    author.map(|value| parse_user_id(&value, "posts.author_id")).transpose()
}

fn load_membership(
    conn: &Connection,
    post_uuid: &str,
    user: &UserId,
) -> StoreResult<Option<ReactionKind>> {
    let kind: Option<String> = conn
        .query_row(
            "SELECT kind FROM post_reactions WHERE post_uuid = ?1 AND user_id = ?2;",
            params![post_uuid, user.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    kind.map(|value| parse_reaction_kind(&value)).transpose()
}

fn load_members(
    conn: &Connection,
    post_uuid: &str,
) -> DbResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, kind
         FROM post_reactions
         WHERE post_uuid = ?1
         ORDER BY user_id ASC;",
    )?;
    let mut rows = stmt.query([post_uuid])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push((row.get(0)?, row.get(1)?));
    }
    Ok(members)
}

fn parse_post_row(conn: &Connection, row: &Row<'_>) -> StoreResult<Post> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{uuid_text}` in posts.uuid"))
    })?;
    let author_text: String = row.get("author_id")?;

    let mut liked_by = BTreeSet::new();
    let mut disliked_by = BTreeSet::new();
    for (user_text, kind_text) in load_members(conn, uuid_text.as_str())? {
        let user = parse_user_id(&user_text, "post_reactions.user_id")?;
        match parse_reaction_kind(&kind_text)? {
            ReactionKind::Like => liked_by.insert(user),
            ReactionKind::Dislike => disliked_by.insert(user),
        };
    }

    let post = Post {
        id,
        author_id: parse_user_id(&author_text, "posts.author_id")?,
        body: row.get("body")?,
        like_count: to_count(row.get("like_count")?, "like_count")?,
        dislike_count: to_count(row.get("dislike_count")?, "dislike_count")?,
        liked_by,
        disliked_by,
        created_at: row.get("created_at")?,
    };
    post.validate()?;
    Ok(post)
}

fn parse_user_id(value: &str, column: &str) -> StoreResult<UserId> {
    UserId::parse(value)
        .map_err(|err| StoreError::InvalidData(format!("invalid user id in {column}: {err}")))
}

fn parse_reaction_kind(value: &str) -> StoreResult<ReactionKind> {
    ReactionKind::parse(value).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid reaction kind `{value}` in post_reactions.kind"
        ))
    })
}

fn to_count(value: i64, column: &str) -> StoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("negative value {value} in posts.{column}")))
}
