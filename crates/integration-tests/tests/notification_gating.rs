use domains::{DomainError, NotificationKind, PreferenceUpdate, Role};
use integration_tests::Harness;

fn mute_everything() -> PreferenceUpdate {
    PreferenceUpdate {
        notify_on_comment: Some(false),
        notify_on_rating: Some(false),
        notify_on_recipe_approval: Some(false),
    }
}

#[tokio::test]
async fn test_preferences_default_to_everything_on() {
    let h = Harness::new();
    let user = h.user(Role::User).await;

    let prefs = h.moderation.notifications().preferences(&user).await.unwrap();
    assert_eq!(prefs.user_id, user.id);
    assert!(prefs.notify_on_comment && prefs.notify_on_rating && prefs.notify_on_recipe_approval);

    let updated = h
        .moderation
        .notifications()
        .update_preferences(
            &user,
            PreferenceUpdate {
                notify_on_rating: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.notify_on_rating);
    assert!(updated.notify_on_comment);

    let reloaded = h.moderation.notifications().preferences(&user).await.unwrap();
    assert!(!reloaded.notify_on_rating);
}

#[tokio::test]
async fn test_rejection_bypasses_preferences() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    h.moderation
        .notifications()
        .update_preferences(&owner, mute_everything())
        .await
        .unwrap();

    let recipe = h.recipe(&owner, "Salted Caramel").await;
    h.moderation.submit_for_review(recipe.id, &owner).await.unwrap();
    h.moderation.reject(recipe.id, &admin, "too salty").await.unwrap();

    let inbox = h.moderation.notifications().inbox(&owner).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationKind::Rejection);
    assert!(inbox[0].message.contains("too salty"));
}

#[tokio::test]
async fn test_muted_kinds_are_dropped() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;
    h.moderation
        .notifications()
        .update_preferences(&owner, mute_everything())
        .await
        .unwrap();

    let recipe = h.published_recipe(&owner, &admin, "Quiet Quiche").await;
    h.moderation.rate(recipe.id, &fan, 4).await.unwrap();
    h.moderation.comment(recipe.id, &fan, "Lovely crust").await.unwrap();

    assert!(h.moderation.notifications().inbox(&owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rating_mute_leaves_other_kinds_alone() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;
    h.moderation
        .notifications()
        .update_preferences(
            &owner,
            PreferenceUpdate {
                notify_on_rating: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let recipe = h.published_recipe(&owner, &admin, "Focaccia").await;
    h.moderation.rate(recipe.id, &fan, 5).await.unwrap();
    h.moderation.comment(recipe.id, &fan, "So airy").await.unwrap();

    let mut kinds: Vec<_> = h
        .moderation
        .notifications()
        .inbox(&owner)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.kind.to_string())
        .collect();
    kinds.sort();
    assert_eq!(kinds, vec!["approval", "comment"]);
}

#[tokio::test]
async fn test_mark_read_is_recipient_only_and_idempotent() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    h.published_recipe(&owner, &admin, "Bagels").await;

    let inbox = h.moderation.notifications().inbox(&owner).await.unwrap();
    let note = &inbox[0];
    assert!(!note.is_read);

    let notifications = h.moderation.notifications();
    assert!(matches!(
        notifications.mark_read(note.id, &admin).await,
        Err(DomainError::Permission(_))
    ));

    let read = notifications.mark_read(note.id, &owner).await.unwrap();
    assert!(read.is_read);
    let again = notifications.mark_read(note.id, &owner).await.unwrap();
    assert!(again.is_read);

    assert!(notifications.inbox(&owner).await.unwrap()[0].is_read);
    assert!(matches!(
        notifications.mark_read(uuid::Uuid::now_v7(), &owner).await,
        Err(DomainError::NotFound { entity: "notification", .. })
    ));
}
