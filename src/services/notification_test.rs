use super::*;
use crate::models::NewNotification;
use crate::state::test_helpers::test_app_state;

async fn seed(state: &AppState, user_id: Uuid, title: &str) -> Notification {
    state
        .repos
        .notifications
        .insert_notification(&NewNotification {
            user_id,
            title: title.into(),
            message: "m".into(),
            kind: "info".into(),
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn list_is_newest_first_and_scoped() {
    let state = test_app_state();
    let user = Uuid::new_v4();
    seed(&state, user, "older").await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    seed(&state, user, "newer").await;
    seed(&state, Uuid::new_v4(), "someone else").await;

    let titles: Vec<String> = list_for_user(&state, user)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["newer", "older"]);
}

#[tokio::test]
async fn mark_read_requires_ownership() {
    let state = test_app_state();
    let user = Uuid::new_v4();
    let n = seed(&state, user, "hi").await;

    assert!(matches!(mark_read(&state, n.id, Uuid::new_v4()).await, Err(NotificationError::NotFound(_))));
    assert!(mark_read(&state, n.id, user).await.unwrap().read);
}
