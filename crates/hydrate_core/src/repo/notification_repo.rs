//! Notification emitter contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append immutable notification records for a target user.
//! - List a target's notifications newest first with keyset pagination.
//! - Delete one record by id.
//!
//! # Invariants
//! - Every append stores exactly one new row; ids are generated here.
//! - `created_at` is clamped so it never goes below the target's latest
//!   record, which keeps `(created_at, sequence)` ordering equal to
//!   insertion order per target.

use crate::db::DbError;
use crate::model::notification::{
    NewNotification, Notification, NotificationCursor, NotificationId, NotificationKind,
};
use crate::model::now_epoch_ms;
use crate::model::user::UserId;
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NOTIFICATIONS_DEFAULT_LIMIT: u32 = 20;
const NOTIFICATIONS_LIMIT_MAX: u32 = 100;
const NOTIFICATION_MESSAGE_MAX_CHARS: usize = 280;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    seq,
    uuid,
    target_user_id,
    kind,
    message,
    post_uuid,
    actor_id,
    created_at
FROM notifications";

pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors from notification persistence.
#[derive(Debug)]
pub enum NotificationError {
    Db(DbError),
    NotFound(NotificationId),
    InvalidMessage(String),
    InvalidData(String),
    Unavailable(&'static str),
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::InvalidMessage(reason) => write!(f, "invalid notification message: {reason}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted notification data: {message}")
            }
            Self::Unavailable(what) => write!(f, "notification store unavailable: {what}"),
        }
    }
}

impl Error for NotificationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for NotificationError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for NotificationError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Listing options for one target's notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationListQuery {
    /// Only records strictly older than this position are returned.
    pub before: Option<NotificationCursor>,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
}

/// Normalizes notification page size.
pub fn normalize_notification_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTIFICATIONS_DEFAULT_LIMIT,
        Some(value) => value.min(NOTIFICATIONS_LIMIT_MAX),
    }
}

/// Trims a message and enforces length bounds.
pub fn normalize_message(message: &str) -> NotificationResult<String> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(NotificationError::InvalidMessage(
            "message must not be blank".to_string(),
        ));
    }
    let chars = trimmed.chars().count();
    if chars > NOTIFICATION_MESSAGE_MAX_CHARS {
        return Err(NotificationError::InvalidMessage(format!(
            "message has {chars} characters; at most {NOTIFICATION_MESSAGE_MAX_CHARS} are allowed"
        )));
    }
    Ok(trimmed.to_string())
}

/// Append-only notification storage contract.
pub trait NotificationRepository {
    /// Stores a new record and returns it with its assigned id and order.
    fn append(&self, event: &NewNotification) -> NotificationResult<Notification>;
    /// Loads one record by id.
    fn get(&self, id: NotificationId) -> NotificationResult<Option<Notification>>;
    /// Lists a target's records newest first.
    fn list_for_target(
        &self,
        target: &UserId,
        query: &NotificationListQuery,
    ) -> NotificationResult<Vec<Notification>>;
    /// Deletes one record; `NotFound` if it does not exist.
    fn delete(&self, id: NotificationId) -> NotificationResult<()>;
}

/// SQLite-backed notification emitter.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn append(&self, event: &NewNotification) -> NotificationResult<Notification> {
        let message = normalize_message(&event.message)?;
        let id = Uuid::new_v4();

        // Single statement: the clamp and the insert share one write lock.
        let (sequence, created_at): (i64, i64) = self.conn.query_row(
            "INSERT INTO notifications (
                uuid,
                target_user_id,
                kind,
                message,
                post_uuid,
                actor_id,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                MAX(?7, COALESCE(
                    (SELECT MAX(created_at) FROM notifications WHERE target_user_id = ?2),
                    ?7
                ))
            )
            RETURNING seq, created_at;",
            params![
                id.to_string(),
                event.target_user_id.as_str(),
                event.kind.as_str(),
                message.as_str(),
                event.post_id.map(|value| value.to_string()),
                event.actor_id.as_ref().map(UserId::as_str),
                now_epoch_ms(),
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Notification {
            id,
            target_user_id: event.target_user_id.clone(),
            kind: event.kind,
            message,
            post_id: event.post_id,
            actor_id: event.actor_id.clone(),
            created_at,
            sequence,
        })
    }

    fn get(&self, id: NotificationId) -> NotificationResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }

    fn list_for_target(
        &self,
        target: &UserId,
        query: &NotificationListQuery,
    ) -> NotificationResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE target_user_id = ?1
               AND (
                 ?2 IS NULL
                 OR created_at < ?2
                 OR (created_at = ?2 AND seq < ?3)
               )
             ORDER BY created_at DESC, seq DESC
             LIMIT ?4;"
        ))?;
        let mut rows = stmt.query(params![
            target.as_str(),
            query.before.map(|cursor| cursor.created_at),
            query.before.map(|cursor| cursor.sequence),
            i64::from(normalize_notification_limit(query.limit)),
        ])?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn delete(&self, id: NotificationId) -> NotificationResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(NotificationError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_notification_row(row: &Row<'_>) -> NotificationResult<Notification> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "notifications.uuid")?;

    let kind_text: String = row.get("kind")?;
    let kind = NotificationKind::parse(&kind_text).ok_or_else(|| {
        NotificationError::InvalidData(format!(
            "invalid notification kind `{kind_text}` in notifications.kind"
        ))
    })?;

    let target_text: String = row.get("target_user_id")?;
    let post_id = match row.get::<_, Option<String>>("post_uuid")? {
        Some(value) => Some(parse_uuid(&value, "notifications.post_uuid")?),
        None => None,
    };
    let actor_id = match row.get::<_, Option<String>>("actor_id")? {
        Some(value) => Some(parse_user_id(&value, "notifications.actor_id")?),
        None => None,
    };

    Ok(Notification {
        id,
        target_user_id: parse_user_id(&target_text, "notifications.target_user_id")?,
        kind,
        message: row.get("message")?,
        post_id,
        actor_id,
        created_at: row.get("created_at")?,
        sequence: row.get("seq")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> NotificationResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        NotificationError::InvalidData(format!("invalid uuid value `{value}` in {column}"))
    })
}

fn parse_user_id(value: &str, column: &str) -> NotificationResult<UserId> {
    UserId::parse(value).map_err(|err| {
        NotificationError::InvalidData(format!("invalid user id in {column}: {err}"))
    })
}
