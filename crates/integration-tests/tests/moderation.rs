use chrono::Duration;
use domains::{DomainError, NotificationKind, Role};
use integration_tests::Harness;

#[tokio::test]
async fn test_comment_notifies_owner() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;
    let recipe = h.published_recipe(&owner, &admin, "Carbonara").await;

    let comment = h
        .moderation
        .comment(recipe.id, &fan, "  No cream, good.  ")
        .await
        .unwrap();
    assert_eq!(comment.content, "No cream, good.");
    assert_eq!(comment.user_id, fan.id);

    let inbox = h.moderation.notifications().inbox(&owner).await.unwrap();
    let comments: Vec<_> = inbox
        .iter()
        .filter(|n| n.kind == NotificationKind::Comment)
        .collect();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].message.contains(&fan.username));
    assert!(comments[0].message.contains("Carbonara"));
}

#[tokio::test]
async fn test_owner_commenting_on_own_recipe_is_silent() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let recipe = h.published_recipe(&owner, &admin, "Risotto").await;

    h.moderation
        .comment(recipe.id, &owner, "Use arborio")
        .await
        .unwrap();

    let inbox = h.moderation.notifications().inbox(&owner).await.unwrap();
    assert!(inbox.iter().all(|n| n.kind != NotificationKind::Comment));
}

#[tokio::test]
async fn test_comment_rules() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;

    let private = h.recipe(&owner, "Work in progress").await;
    assert!(matches!(
        h.moderation.comment(private.id, &fan, "Can't wait").await,
        Err(DomainError::RecipeNotPublic(_))
    ));
    assert!(matches!(
        h.moderation.comment(private.id, &fan, "  ").await,
        Err(DomainError::RecipeNotPublic(_))
    ));

    let public = h.published_recipe(&owner, &admin, "Finished").await;
    assert!(matches!(
        h.moderation.comment(public.id, &fan, "   ").await,
        Err(DomainError::Validation(_))
    ));
    assert!(matches!(
        h.moderation.comment(uuid::Uuid::now_v7(), &fan, "Hello?").await,
        Err(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_comments_are_listed_oldest_first() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;
    let recipe = h.published_recipe(&owner, &admin, "Pad Thai").await;

    for text in ["first", "second", "third"] {
        h.moderation.comment(recipe.id, &fan, text).await.unwrap();
        h.clock.advance(Duration::minutes(1));
    }

    let listed: Vec<_> = h
        .moderation
        .comments(recipe.id, None)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.content)
        .collect();
    assert_eq!(listed, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_inbox_is_newest_first() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let fan = h.user(Role::User).await;
    let recipe = h.published_recipe(&owner, &admin, "Pierogi").await;

    h.clock.advance(Duration::minutes(5));
    h.moderation.rate(recipe.id, &fan, 4).await.unwrap();
    h.clock.advance(Duration::minutes(5));
    h.moderation.comment(recipe.id, &fan, "Perfect dough").await.unwrap();

    let kinds: Vec<_> = h
        .moderation
        .notifications()
        .inbox(&owner)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::Comment, NotificationKind::Rating, NotificationKind::Approval]
    );
}

#[tokio::test]
async fn test_receipt_serializes_for_clients() {
    let h = Harness::new();
    let owner = h.user(Role::User).await;
    let admin = h.user(Role::Admin).await;
    let recipe = h.published_recipe(&owner, &admin, "Churros").await;

    let receipt = h.moderation.rate(recipe.id, &owner, 5).await.unwrap();
    let json = serde_json::to_value(&receipt).unwrap();
    assert_eq!(json["average_rating"], 5.0);
    assert_eq!(json["created"], true);
    assert_eq!(json["rating"]["value"], 5);
}
