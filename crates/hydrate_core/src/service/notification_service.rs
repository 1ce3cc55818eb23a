//! Notification feed use-cases.
//!
//! # Responsibility
//! - List a user's notifications newest first.
//! - Delete a notification on behalf of its owner only.
//! - Append hydration reminders.
//!
//! # Invariants
//! - Only the target user may delete a notification.
//! - Listing never reorders records already returned: pages are cut by a
//!   `(created_at, sequence)` cursor, not by offset.

use crate::model::notification::{NewNotification, Notification, NotificationId};
use crate::model::user::UserId;
use crate::repo::notification_repo::{
    NotificationError, NotificationListQuery, NotificationRepository,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from notification use-cases.
#[derive(Debug)]
pub enum NotificationServiceError {
    NotFound(NotificationId),
    /// Requester is not the notification's target user.
    PermissionDenied(NotificationId),
    Repo(NotificationError),
}

impl Display for NotificationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::PermissionDenied(id) => {
                write!(f, "notification {id} belongs to another user")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotificationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NotificationError> for NotificationServiceError {
    fn from(value: NotificationError) -> Self {
        match value {
            NotificationError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Notification feed facade.
pub struct NotificationService<N: NotificationRepository> {
    repo: N,
}

impl<N: NotificationRepository> NotificationService<N> {
    pub fn new(repo: N) -> Self {
        Self { repo }
    }

    /// Lists `user`'s notifications, newest first.
    pub fn list_notifications(
        &self,
        user: &UserId,
        query: &NotificationListQuery,
    ) -> Result<Vec<Notification>, NotificationServiceError> {
        self.repo.list_for_target(user, query).map_err(Into::into)
    }

    /// Deletes a notification owned by `requester`.
    ///
    /// # Errors
    /// - `NotFound` if the id is unknown (or already deleted).
    /// - `PermissionDenied` if `requester` is not the target user.
    pub fn delete_notification(
        &self,
        id: NotificationId,
        requester: &UserId,
    ) -> Result<(), NotificationServiceError> {
        let Some(existing) = self.repo.get(id)? else {
            return Err(NotificationServiceError::NotFound(id));
        };
        if existing.target_user_id != *requester {
            warn!(
                "event=notification_delete module=notifications status=denied notification_id={}",
                id
            );
            return Err(NotificationServiceError::PermissionDenied(id));
        }
        self.repo.delete(id)?;
        info!(
            "event=notification_delete module=notifications status=ok notification_id={}",
            id
        );
        Ok(())
    }

    /// Appends a hydration reminder for `target`.
    pub fn remind(
        &self,
        target: &UserId,
        message: &str,
    ) -> Result<Notification, NotificationServiceError> {
        let stored = self
            .repo
            .append(&NewNotification::reminder(target.clone(), message))?;
        info!(
            "event=notification_append module=notifications status=ok kind=reminder notification_id={}",
            stored.id
        );
        Ok(stored)
    }
}
