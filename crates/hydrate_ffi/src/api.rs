//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose feed, reaction and notification use-cases to Dart via FRB.
//! - Flatten core errors into plain response envelopes the UI can render.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - IDs cross the boundary as UTF-8 strings; malformed IDs are reported in
//!   the envelope, never thrown.
//! - A reaction whose notification failed is still reported as `ok=true`.

use hydrate_core::db::open_db;
use hydrate_core::repo::notification_repo::normalize_notification_limit;
use hydrate_core::repo::reaction_store::normalize_post_limit;
use hydrate_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    init_logging_from_config, ping as ping_inner, ClientHint, CoreConfig, Notification,
    NotificationCursor, NotificationDelivery, NotificationKind, NotificationListQuery,
    NotificationService, Post, PostListQuery, PostService, ReactionEngine, ReactionKind,
    ReactionState, SqliteNotificationRepository, SqliteReactionStore, UserId,
};
use log::warn;
use rusqlite::Connection;
use std::sync::OnceLock;
use uuid::Uuid;

static FFI_CONFIG: OnceLock<CoreConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Feed post projection for one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPostItem {
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    pub like_count: u64,
    pub dislike_count: u64,
    /// Viewer's own reaction (`neutral|liked|disliked`).
    pub viewer_state: String,
    pub created_at: i64,
}

/// Feed listing envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedListResponse {
    pub items: Vec<FeedPostItem>,
    /// Human-readable response message for diagnostics.
    pub message: String,
    /// Effective applied page size.
    pub applied_limit: u32,
}

/// Generic action envelope for post commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedActionResponse {
    pub ok: bool,
    pub post_id: Option<String>,
    pub message: String,
}

impl FeedActionResponse {
    fn success(message: impl Into<String>, post_id: String) -> Self {
        Self {
            ok: true,
            post_id: Some(post_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            post_id: None,
            message: message.into(),
        }
    }
}

/// Result of one reaction press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionToggleResponse {
    pub ok: bool,
    pub post_id: String,
    pub like_count: u64,
    pub dislike_count: u64,
    /// Caller's state after the press (`neutral|liked|disliked`).
    pub user_state: String,
    /// `not_required|delivered|failed`; empty when `ok=false`.
    pub notification_status: String,
    /// `refresh_feed|try_again` on failure.
    pub client_hint: Option<String>,
    pub message: String,
}

impl ReactionToggleResponse {
    fn failure(post_id: String, client_hint: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            post_id,
            like_count: 0,
            dislike_count: 0,
            user_state: String::new(),
            notification_status: String::new(),
            client_hint: client_hint.map(str::to_string),
            message: message.into(),
        }
    }
}

/// Notification projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub notification_id: String,
    /// `like|reminder`.
    pub kind: String,
    pub message: String,
    pub post_id: Option<String>,
    pub actor_id: Option<String>,
    pub created_at: i64,
    pub sequence: i64,
}

/// Notification page envelope.
///
/// Pass the last item's `created_at` and `sequence` back as the `before_*`
/// arguments to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationListResponse {
    pub items: Vec<NotificationItem>,
    pub message: String,
    pub applied_limit: u32,
}

/// Generic action envelope for notification commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationActionResponse {
    pub ok: bool,
    pub notification_id: Option<String>,
    pub message: String,
}

impl NotificationActionResponse {
    fn success(message: impl Into<String>, notification_id: String) -> Self {
        Self {
            ok: true,
            notification_id: Some(notification_id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            notification_id: None,
            message: message.into(),
        }
    }
}

/// Publishes a post to the feed.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns the created post ID on success.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_create_post(author_id: String, body: String) -> FeedActionResponse {
    let result = with_connection(|conn| {
        let author = parse_user(&author_id, "author_id")?;
        PostService::new(SqliteReactionStore::new(conn))
            .create_post(&author, &body)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(post) => FeedActionResponse::success("Post created.", post.id.to_string()),
        Err(err) => FeedActionResponse::failure(format!("feed_create_post failed: {err}")),
    }
}

/// Lists the feed newest first, projected for `viewer_id`.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - `limit` defaults to 20 and clamps to 50.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_list_posts(viewer_id: String, limit: Option<u32>, offset: u32) -> FeedListResponse {
    let applied_limit = normalize_post_limit(limit);
    let result = with_connection(|conn| {
        let viewer = parse_user(&viewer_id, "viewer_id")?;
        let query = PostListQuery {
            limit: Some(applied_limit),
            offset,
        };
        let posts = PostService::new(SqliteReactionStore::new(conn))
            .list_posts(&query)
            .map_err(|err| err.to_string())?;
        Ok(posts
            .iter()
            .map(|post| to_feed_post_item(post, &viewer))
            .collect::<Vec<_>>())
    });
    match result {
        Ok(items) => {
            let message = if items.is_empty() {
                "No posts.".to_string()
            } else {
                format!("Loaded {} post(s).", items.len())
            };
            FeedListResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(err) => FeedListResponse {
            items: Vec::new(),
            message: format!("feed_list_posts failed: {err}"),
            applied_limit,
        },
    }
}

/// Deletes a post on behalf of its author.
#[flutter_rust_bridge::frb(sync)]
pub fn feed_delete_post(post_id: String, requester_id: String) -> FeedActionResponse {
    let result = with_connection(|conn| {
        let id = parse_id(&post_id, "post_id")?;
        let requester = parse_user(&requester_id, "requester_id")?;
        PostService::new(SqliteReactionStore::new(conn))
            .delete_post(id, &requester)
            .map_err(|err| err.to_string())?;
        Ok(id)
    });
    match result {
        Ok(id) => FeedActionResponse::success("Post deleted.", id.to_string()),
        Err(err) => FeedActionResponse::failure(format!("feed_delete_post failed: {err}")),
    }
}

/// Applies one like/dislike press.
///
/// Input semantics:
/// - `kind`: `like|dislike` (case-insensitive).
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Failures carry a `client_hint`; retries must come from a fresh user
///   press, since a repeated press toggles back.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_reaction(post_id: String, user_id: String, kind: String) -> ReactionToggleResponse {
    let id = match parse_id(&post_id, "post_id") {
        Ok(id) => id,
        Err(err) => return ReactionToggleResponse::failure(post_id, None, err),
    };
    let user = match parse_user(&user_id, "user_id") {
        Ok(user) => user,
        Err(err) => return ReactionToggleResponse::failure(post_id, None, err),
    };
    let Some(kind) = ReactionKind::parse(kind.trim().to_ascii_lowercase().as_str()) else {
        return ReactionToggleResponse::failure(
            post_id,
            None,
            format!("unsupported reaction kind `{kind}`; expected like|dislike"),
        );
    };

    let conn = match open_db(&ffi_config().db_path) {
        Ok(conn) => conn,
        Err(err) => {
            return ReactionToggleResponse::failure(
                post_id,
                Some("try_again"),
                format!("toggle_reaction failed: DB open failed: {err}"),
            )
        }
    };
    let engine = ReactionEngine::with_max_attempts(
        SqliteReactionStore::with_max_attempts(&conn, ffi_config().max_transition_attempts),
        SqliteNotificationRepository::new(&conn),
        ffi_config().max_transition_attempts,
    );

    match engine.toggle_reaction(id, &user, kind) {
        Ok(outcome) => {
            let (notification_status, message) = match &outcome.notification {
                NotificationDelivery::NotRequired => ("not_required", "Reaction saved.".to_string()),
                NotificationDelivery::Delivered { .. } => {
                    ("delivered", "Reaction saved; author notified.".to_string())
                }
                NotificationDelivery::Failed(failure) => {
                    ("failed", format!("Reaction saved; {failure}"))
                }
            };
            ReactionToggleResponse {
                ok: true,
                post_id,
                like_count: outcome.like_count,
                dislike_count: outcome.dislike_count,
                user_state: reaction_state_label(outcome.user_state).to_string(),
                notification_status: notification_status.to_string(),
                client_hint: None,
                message,
            }
        }
        Err(err) => ReactionToggleResponse::failure(
            post_id,
            Some(client_hint_label(err.client_hint())),
            format!("toggle_reaction failed: {err}"),
        ),
    }
}

/// Lists `user_id`'s notifications newest first.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - The cursor applies only when both `before_*` values are present.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn list_notifications(
    user_id: String,
    before_created_at: Option<i64>,
    before_sequence: Option<i64>,
    limit: Option<u32>,
) -> NotificationListResponse {
    let applied_limit =
        normalize_notification_limit(limit.or(Some(ffi_config().notification_page_limit)));
    let before = match (before_created_at, before_sequence) {
        (Some(created_at), Some(sequence)) => Some(NotificationCursor {
            created_at,
            sequence,
        }),
        _ => None,
    };
    let result = with_connection(|conn| {
        let user = parse_user(&user_id, "user_id")?;
        let query = NotificationListQuery {
            before,
            limit: Some(applied_limit),
        };
        let notifications = NotificationService::new(SqliteNotificationRepository::new(conn))
            .list_notifications(&user, &query)
            .map_err(|err| err.to_string())?;
        Ok(notifications
            .into_iter()
            .map(to_notification_item)
            .collect::<Vec<_>>())
    });
    match result {
        Ok(items) => {
            let message = if items.is_empty() {
                "No notifications.".to_string()
            } else {
                format!("Loaded {} notification(s).", items.len())
            };
            NotificationListResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(err) => NotificationListResponse {
            items: Vec::new(),
            message: format!("list_notifications failed: {err}"),
            applied_limit,
        },
    }
}

/// Deletes a notification owned by `requester_id`.
#[flutter_rust_bridge::frb(sync)]
pub fn delete_notification(
    notification_id: String,
    requester_id: String,
) -> NotificationActionResponse {
    let result = with_connection(|conn| {
        let id = parse_id(&notification_id, "notification_id")?;
        let requester = parse_user(&requester_id, "requester_id")?;
        NotificationService::new(SqliteNotificationRepository::new(conn))
            .delete_notification(id, &requester)
            .map_err(|err| err.to_string())?;
        Ok(id)
    });
    match result {
        Ok(id) => NotificationActionResponse::success("Notification deleted.", id.to_string()),
        Err(err) => {
            NotificationActionResponse::failure(format!("delete_notification failed: {err}"))
        }
    }
}

/// Appends a hydration reminder for `target_user_id`.
#[flutter_rust_bridge::frb(sync)]
pub fn send_reminder(target_user_id: String, message: String) -> NotificationActionResponse {
    let result = with_connection(|conn| {
        let target = parse_user(&target_user_id, "target_user_id")?;
        NotificationService::new(SqliteNotificationRepository::new(conn))
            .remind(&target, &message)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(stored) => NotificationActionResponse::success("Reminder sent.", stored.id.to_string()),
        Err(err) => NotificationActionResponse::failure(format!("send_reminder failed: {err}")),
    }
}

fn ffi_config() -> &'static CoreConfig {
    FFI_CONFIG.get_or_init(|| {
        let config = CoreConfig::from_env_lenient();
        // A host that already called `init_logging` with other settings wins.
        if let Err(err) = init_logging_from_config(&config) {
            warn!("event=ffi_config module=ffi status=error error={}", err);
        }
        config
    })
}

fn with_connection<T>(f: impl FnOnce(&Connection) -> Result<T, String>) -> Result<T, String> {
    let db_path = &ffi_config().db_path;
    let conn = open_db(db_path).map_err(|err| {
        warn!("event=ffi_db_open module=ffi status=error error={}", err);
        format!("DB open failed: {err}")
    })?;
    f(&conn)
}

fn parse_user(value: &str, field: &str) -> Result<UserId, String> {
    UserId::parse(value).map_err(|err| format!("invalid {field}: {err}"))
}

fn parse_id(value: &str, field: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value.trim()).map_err(|err| format!("invalid {field} `{value}`: {err}"))
}

fn to_feed_post_item(post: &Post, viewer: &UserId) -> FeedPostItem {
    FeedPostItem {
        post_id: post.id.to_string(),
        author_id: post.author_id.to_string(),
        body: post.body.clone(),
        like_count: post.like_count,
        dislike_count: post.dislike_count,
        viewer_state: reaction_state_label(post.state_of(viewer)).to_string(),
        created_at: post.created_at,
    }
}

fn to_notification_item(notification: Notification) -> NotificationItem {
    NotificationItem {
        notification_id: notification.id.to_string(),
        kind: notification_kind_label(notification.kind).to_string(),
        message: notification.message,
        post_id: notification.post_id.map(|id| id.to_string()),
        actor_id: notification.actor_id.map(|actor| actor.to_string()),
        created_at: notification.created_at,
        sequence: notification.sequence,
    }
}

fn reaction_state_label(state: ReactionState) -> &'static str {
    match state {
        ReactionState::Neutral => "neutral",
        ReactionState::Liked => "liked",
        ReactionState::Disliked => "disliked",
    }
}

fn notification_kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Like => "like",
        NotificationKind::Reminder => "reminder",
    }
}

fn client_hint_label(hint: ClientHint) -> &'static str {
    match hint {
        ClientHint::RefreshFeed => "refresh_feed",
        ClientHint::TryAgain => "try_again",
    }
}
