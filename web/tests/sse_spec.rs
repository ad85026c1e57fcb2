use axum::{body::Body, http::Request};
use futures_util::StreamExt;
use std::time::Duration;
use tower::ServiceExt; // for oneshot

fn test_app() -> (axum::Router, hearth_store::Store, letting::Profile, String) {
    let mut settings = settings::Settings::default();
    settings.auth.jwt_secret = "unit-test-secret-unit-test-secret!!".to_string();
    let store = hearth_store::Store::open_in_memory().unwrap();
    let landlord = store
        .create_profile(hearth_store::NewProfile {
            email: "amara@example.com".to_string(),
            password_hash: "unused-in-this-test".to_string(),
            display_name: "Amara".to_string(),
            phone: None,
            role: letting::Role::Landlord,
        })
        .unwrap();
    let token = hearth_web::auth::issue_token(
        &landlord,
        &settings.auth.jwt_secret,
        Duration::from_secs(3600),
    )
    .unwrap();
    let state = hearth_web::AppState::new(&settings, store.clone()).unwrap();
    (hearth_web::create_app(state), store, landlord, token)
}

#[tokio::test]
async fn stream_sets_sse_headers_and_opens_with_init() {
    // Faster heartbeat for test
    std::env::set_var("SSE_HEARTBEAT_SECONDS", "1");
    let (app, _store, _landlord, token) = test_app();

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/events/stream")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let headers = resp.headers();
    assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");

    let body = resp.into_body();
    let first = tokio::time::timeout(Duration::from_secs(2), async {
        let chunk = body.into_data_stream().next().await.unwrap().unwrap();
        String::from_utf8_lossy(&chunk).to_string()
    })
    .await
    .expect("init event should arrive promptly");
    assert!(first.contains("event: init"));
    assert!(first.contains("connected to change feed"));
}

#[tokio::test]
async fn change_events_reach_a_scoped_subscriber() {
    std::env::set_var("SSE_HEARTBEAT_SECONDS", "1");
    let (app, store, landlord, token) = test_app();

    // The handler subscribes before the body starts streaming, so a
    // mutation right after the response headers is not missed.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/events/stream")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    store
        .create_property(landlord.id, "Kira Heights", "Plot 12, Kira Road")
        .unwrap();

    let mut stream = resp.into_body().into_data_stream();
    let collected = tokio::time::timeout(Duration::from_secs(5), async move {
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if collected.contains("event: change") {
                break;
            }
        }
        collected
    })
    .await
    .expect("change event should arrive");

    assert!(collected.contains("event: init"));
    assert!(collected.contains("event: change"));
    assert!(collected.contains("\"entity\":\"property\""));
    assert!(collected.contains("\"op\":\"created\""));
}

#[tokio::test]
async fn foreign_changes_are_filtered_out() {
    std::env::set_var("SSE_HEARTBEAT_SECONDS", "1");
    let (app, store, _landlord, token) = test_app();

    // A second landlord's property must not leak into this feed.
    let rival = store
        .create_profile(hearth_store::NewProfile {
            email: "okello@example.com".to_string(),
            password_hash: "unused-in-this-test".to_string(),
            display_name: "Okello".to_string(),
            phone: None,
            role: letting::Role::Landlord,
        })
        .unwrap();

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/events/stream")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    store
        .create_property(rival.id, "Rival Court", "Plot 9")
        .unwrap();

    // Read until the first heartbeat; no change event should precede it.
    let mut stream = resp.into_body().into_data_stream();
    let collected = tokio::time::timeout(Duration::from_secs(5), async move {
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if collected.contains("event: heartbeat") {
                break;
            }
        }
        collected
    })
    .await
    .expect("heartbeat should arrive");

    assert!(!collected.contains("event: change"));
}

#[tokio::test]
async fn stream_requires_a_session() {
    let (app, _store, _landlord, _token) = test_app();

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/events/stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}
