//! Notification dispatch with per-user preference gating.
//!
//! Dispatch is a synchronous, in-process call made by the component that
//! triggered it. Storage failures surface to that caller.

use std::sync::Arc;

use domains::{
    Clock, DomainError, Notification, NotificationKind, NotificationRepository, PreferenceRepository,
    PreferenceUpdate, Result, User, UserPreference,
};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct NotificationDispatcher {
    preferences: Arc<dyn PreferenceRepository>,
    notifications: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationDispatcher {
    pub fn new(
        preferences: Arc<dyn PreferenceRepository>,
        notifications: Arc<dyn NotificationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            preferences,
            notifications,
            clock,
        }
    }

    /// Creates a notification for `user_id` unless their preferences mute
    /// this `kind`. Returns the stored notification, or `None` when gated.
    #[instrument(skip(self, message), fields(kind = %kind))]
    pub async fn notify(
        &self,
        user_id: Uuid,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Result<Option<Notification>> {
        let prefs = self.preferences.get_or_create_preferences(user_id).await?;
        if !prefs.allows(kind) {
            debug!(%user_id, "notification muted by user preference");
            return Ok(None);
        }

        let notification = Notification {
            id: Uuid::now_v7(),
            user_id,
            kind,
            message: message.into(),
            is_read: false,
            created_at: self.clock.now(),
        };
        self.notifications.insert_notification(&notification).await?;
        debug!(notification_id = %notification.id, %user_id, "notification dispatched");
        Ok(Some(notification))
    }

    /// Marks a notification as read. Only its recipient may do so; repeating
    /// the call is harmless.
    #[instrument(skip(self, requester), fields(requester_id = %requester.id))]
    pub async fn mark_read(&self, notification_id: Uuid, requester: &User) -> Result<Notification> {
        let mut notification = self
            .notifications
            .find_notification(notification_id)
            .await?
            .ok_or_else(|| DomainError::not_found("notification", notification_id))?;

        if notification.user_id != requester.id {
            warn!("attempt to mark another user's notification as read");
            return Err(DomainError::Permission(
                "only the recipient may mark a notification as read".to_string(),
            ));
        }
        if notification.is_read {
            return Ok(notification);
        }

        if !self.notifications.mark_notification_read(notification_id).await? {
            return Err(DomainError::not_found("notification", notification_id));
        }
        notification.is_read = true;
        Ok(notification)
    }

    /// The user's notifications, newest first.
    pub async fn inbox(&self, user: &User) -> Result<Vec<Notification>> {
        Ok(self.notifications.list_notifications(user.id).await?)
    }

    pub async fn preferences(&self, user: &User) -> Result<UserPreference> {
        Ok(self.preferences.get_or_create_preferences(user.id).await?)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update_preferences(
        &self,
        user: &User,
        update: PreferenceUpdate,
    ) -> Result<UserPreference> {
        let mut prefs = self.preferences.get_or_create_preferences(user.id).await?;
        prefs.apply(update);
        self.preferences.save_preferences(&prefs).await?;
        Ok(prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domains::{FixedClock, MockNotificationRepository, MockPreferenceRepository, Role};

    fn user() -> User {
        User {
            id: Uuid::now_v7(),
            username: "reader".into(),
            email: "reader@example.com".into(),
            password_hash: String::new(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    fn dispatcher(
        prefs: MockPreferenceRepository,
        notes: MockNotificationRepository,
    ) -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(prefs),
            Arc::new(notes),
            Arc::new(FixedClock::new(Utc::now())),
        )
    }

    #[tokio::test]
    async fn test_muted_kind_is_not_stored() {
        let mut prefs = MockPreferenceRepository::new();
        prefs.expect_get_or_create_preferences().returning(|id| {
            let mut p = UserPreference::defaults_for(id);
            p.notify_on_rating = false;
            Ok(p)
        });
        let mut notes = MockNotificationRepository::new();
        notes.expect_insert_notification().never();

        let out = dispatcher(prefs, notes)
            .notify(Uuid::now_v7(), "4 stars", NotificationKind::Rating)
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_rejection_ignores_preferences() {
        let mut prefs = MockPreferenceRepository::new();
        prefs.expect_get_or_create_preferences().returning(|id| {
            Ok(UserPreference {
                user_id: id,
                notify_on_comment: false,
                notify_on_rating: false,
                notify_on_recipe_approval: false,
            })
        });
        let mut notes = MockNotificationRepository::new();
        notes.expect_insert_notification().times(1).returning(|_| Ok(()));

        let out = dispatcher(prefs, notes)
            .notify(Uuid::now_v7(), "too salty", NotificationKind::Rejection)
            .await
            .unwrap()
            .expect("rejection must be delivered");
        assert!(!out.is_read);
        assert_eq!(out.message, "too salty");
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut prefs = MockPreferenceRepository::new();
        prefs
            .expect_get_or_create_preferences()
            .returning(|id| Ok(UserPreference::defaults_for(id)));
        let mut notes = MockNotificationRepository::new();
        notes
            .expect_insert_notification()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let err = dispatcher(prefs, notes)
            .notify(Uuid::now_v7(), "hi", NotificationKind::Comment)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Storage(_)));
    }

    #[tokio::test]
    async fn test_mark_read_requires_recipient() {
        let owner = user();
        let intruder = user();
        let note = Notification {
            id: Uuid::now_v7(),
            user_id: owner.id,
            kind: NotificationKind::Comment,
            message: "new comment".into(),
            is_read: false,
            created_at: Utc::now(),
        };
        let stored = note.clone();
        let mut notes = MockNotificationRepository::new();
        notes
            .expect_find_notification()
            .returning(move |_| Ok(Some(stored.clone())));
        notes.expect_mark_notification_read().times(1).returning(|_| Ok(true));

        let d = dispatcher(MockPreferenceRepository::new(), notes);
        let err = d.mark_read(note.id, &intruder).await.unwrap_err();
        assert!(matches!(err, DomainError::Permission(_)));

        let read = d.mark_read(note.id, &owner).await.unwrap();
        assert!(read.is_read);
    }

    #[tokio::test]
    async fn test_mark_read_unknown_notification() {
        let mut notes = MockNotificationRepository::new();
        notes.expect_find_notification().returning(|_| Ok(None));
        let err = dispatcher(MockPreferenceRepository::new(), notes)
            .mark_read(Uuid::now_v7(), &user())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "notification", .. }));
    }
}
