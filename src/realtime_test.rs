use super::*;
use crate::models::SessionStatus;

fn session_event() -> RealtimeEvent {
    RealtimeEvent::SessionInsert {
        session: Session {
            id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            status: SessionStatus::Live,
            room_id: Some("room-x".into()),
            started_at: None,
            ended_at: None,
        },
    }
}

#[tokio::test]
async fn subscriber_receives_only_its_topic() {
    let feed = ChangeFeed::new(8);
    let (mine, theirs) = (Uuid::new_v4(), Uuid::new_v4());
    let mut sub = feed.subscribe(Topic::PsychiatristSessions(mine));

    assert_eq!(feed.publish(Topic::PsychiatristSessions(theirs), &session_event()), 0);
    let event = session_event();
    assert_eq!(feed.publish(Topic::PsychiatristSessions(mine), &event), 1);

    assert_eq!(sub.recv().await, Some(event));
    assert!(sub.rx.try_recv().is_err());
}

#[tokio::test]
async fn user_topic_is_distinct_from_sessions_topic() {
    let feed = ChangeFeed::new(8);
    let id = Uuid::new_v4();
    let _sub = feed.subscribe(Topic::User(id));
    assert_eq!(feed.publish(Topic::PsychiatristSessions(id), &session_event()), 0);
    assert_eq!(feed.publish(Topic::User(id), &session_event()), 1);
}

#[tokio::test]
async fn dropping_subscription_unregisters() {
    let feed = ChangeFeed::new(8);
    let topic = Topic::User(Uuid::new_v4());
    let sub = feed.subscribe(topic);
    assert_eq!(feed.subscriber_count(), 1);

    sub.unsubscribe();
    assert_eq!(feed.subscriber_count(), 0);
    assert_eq!(feed.publish(topic, &session_event()), 0);
}

#[tokio::test]
async fn full_queue_drops_without_blocking() {
    let feed = ChangeFeed::new(1);
    let topic = Topic::User(Uuid::new_v4());
    let mut sub = feed.subscribe(topic);

    assert_eq!(feed.publish(topic, &session_event()), 1);
    assert_eq!(feed.publish(topic, &session_event()), 0);
    // Still registered; only the overflow was lost.
    assert_eq!(feed.subscriber_count(), 1);

    assert!(sub.recv().await.is_some());
    assert!(sub.rx.try_recv().is_err());
    assert_eq!(feed.publish(topic, &session_event()), 1);
}

#[tokio::test]
async fn close_ends_streams_and_refuses_new_subscribers() {
    let feed = ChangeFeed::new(4);
    let topic = Topic::User(Uuid::new_v4());
    let mut sub = feed.subscribe(topic);

    feed.close();
    assert_eq!(sub.recv().await, None);

    let mut late = feed.subscribe(topic);
    assert_eq!(feed.subscriber_count(), 0);
    assert_eq!(late.recv().await, None);
}

#[test]
fn events_serialize_with_event_tag() {
    let value = serde_json::to_value(RealtimeEvent::Connected { topic: "user".into() }).unwrap();
    assert_eq!(value["event"], "realtime:connected");
    assert_eq!(value["topic"], "user");

    let value = serde_json::to_value(RealtimeEvent::AuthChanged { transition: AuthTransition::SignedOut, profile: None })
        .unwrap();
    assert_eq!(value["event"], "auth:changed");
    assert_eq!(value["transition"], "signed_out");
    assert!(value["profile"].is_null());

    let value = serde_json::to_value(session_event()).unwrap();
    assert_eq!(value["event"], "session:insert");
    assert_eq!(value["session"]["status"], "live");
}

#[test]
fn close_racing_subscribe_leaves_nobody_registered() {
    for _ in 0..50 {
        let feed = ChangeFeed::new(4);
        let start = Arc::new(std::sync::Barrier::new(2));
        let subscriber = {
            let (feed, start) = (feed.clone(), Arc::clone(&start));
            std::thread::spawn(move || {
                start.wait();
                (0..100)
                    .map(|_| feed.subscribe(Topic::User(Uuid::nil())))
                    .collect::<Vec<_>>()
            })
        };
        start.wait();
        feed.close();
        let held = subscriber.join().unwrap();

        assert_eq!(feed.subscriber_count(), 0);
        assert_eq!(feed.publish(Topic::User(Uuid::nil()), &session_event()), 0);
        drop(held);
    }
}
