use super::*;
use crate::models::Trend;
use crate::state::test_helpers::test_app_state;
use time::OffsetDateTime;

fn metrics(client_id: Uuid, current: f64, previous: f64, trend: Trend) -> ProgressMetrics {
    ProgressMetrics {
        client_id,
        current_score: current,
        previous_score: previous,
        trend,
        insights: vec!["Sleeping better".into()],
        assessment_count: 3,
        session_count: 5,
        updated_at: OffsetDateTime::now_utc(),
    }
}

#[test]
fn compare_improvement() {
    let a = TrendAnalysis::compare(7.5, 6.0);
    assert!((a.difference - 1.5).abs() < f64::EPSILON);
    assert!((a.percentage - 25.0).abs() < f64::EPSILON);
    assert!(a.improving);
    assert!(a.significant);
}

#[test]
fn compare_small_decline_is_not_significant() {
    let a = TrendAnalysis::compare(6.6, 7.0);
    assert!(!a.improving);
    assert!((a.percentage - 5.7).abs() < 1e-9);
    assert!(!a.significant);
}

#[test]
fn compare_without_previous_score_is_zero_percent() {
    let a = TrendAnalysis::compare(4.0, 0.0);
    assert!(a.improving);
    assert!(a.percentage.abs() < f64::EPSILON);
    assert!(!a.significant);
}

#[tokio::test]
async fn missing_snapshot_is_none() {
    let state = test_app_state();
    assert!(get_for_client(&state, Uuid::new_v4()).await.unwrap().is_none());
    assert!(view_for_client(&state, Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn view_keeps_stored_trend() {
    let state = test_app_state();
    let client = Uuid::new_v4();
    // Scores went up but the stored trend says declining; the view must not
    // second-guess it.
    state
        .repos
        .progress
        .upsert_progress(&metrics(client, 8.0, 5.0, Trend::Declining))
        .await
        .unwrap();

    let view = view_for_client(&state, client).await.unwrap().unwrap();
    assert_eq!(view.metrics.trend, Trend::Declining);
    assert!(view.analysis.improving);
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["trend"], "declining");
    assert_eq!(json["scale_max"], 10.0);
}
