mod support;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use ohclips::{DocumentStore, router};
use serde_json::{Value, json};
use support::{register, seed_clip, test_app, test_app_with, test_config, token_for, uid_for};
use tower::ServiceExt;

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.5");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app();
    let router = router(app.state.clone());

    let response = router
        .clone()
        .oneshot(post_json("/api/like", None, json!({ "clipId": "c1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(get("/api/clips/recent", Some("not-a-jwt")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router.oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn like_route_toggles_and_reports_count() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    register(app.store.as_ref(), "bob").await;
    seed_clip(app.store.as_ref(), "c1", "alice", 0).await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("bob"));

    let response = router
        .clone()
        .oneshot(post_json("/api/like", Some(&token), json!({ "clipId": "c1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "liked": true, "likes": 1 }));

    let response = router
        .oneshot(post_json("/api/like", Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "Missing clip ID." }));
}

#[tokio::test]
async fn unregistered_principal_is_unauthorized() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    seed_clip(app.store.as_ref(), "c1", "alice", 0).await;
    let router = router(app.state.clone());
    let token = token_for("uid-stranger");

    let response = router
        .oneshot(post_json("/api/comment", Some(&token), json!({ "clipId": "c1", "comment": "hello there" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, json!({ "error": "Not authorized." }));
    assert!(app.store.comments("c1").await.unwrap().is_empty());
}

#[tokio::test]
async fn like_route_is_rate_limited_per_ip() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    register(app.store.as_ref(), "bob").await;
    seed_clip(app.store.as_ref(), "c1", "alice", 0).await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("bob"));

    for _ in 0..20 {
        let response = router
            .clone()
            .oneshot(post_json("/api/like", Some(&token), json!({ "clipId": "c1" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = router
        .clone()
        .oneshot(post_json("/api/like", Some(&token), json!({ "clipId": "c1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Too many requests from this IP, please try again after an hour" })
    );

    // Other routes and other clients keep working.
    let response = router
        .oneshot(post_json("/api/comment", Some(&token), json!({ "clipId": "c1", "comment": "still here" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn comment_route_returns_persisted_comment() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    seed_clip(app.store.as_ref(), "c1", "alice", 0).await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("alice"));

    let response = router
        .oneshot(post_json("/api/comment", Some(&token), json!({ "clipId": "c1", "comment": "you idiot" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["commentData"]["comment"], "you *****");

    let stored = app.store.comments("c1").await.unwrap();
    assert_eq!(body["commentData"]["date"], json!(stored[0].date));
}

#[tokio::test]
async fn cors_preflight_only_allows_listed_origins() {
    let app = test_app();
    let router = router(app.state.clone());
    let preflight = |origin: &str| {
        Request::builder()
            .method("OPTIONS")
            .uri("/api/like")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let response = router.clone().oneshot(preflight("https://ohclips.vercel.app")).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://ohclips.vercel.app"
    );

    let response = router.oneshot(preflight("https://evil.example.com")).await.unwrap();
    assert!(!response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn upload_then_webhook_creates_clip() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("alice"));

    let response = router
        .clone()
        .oneshot(post_json("/api/getUploadAuth", Some(&token), json!({ "title": "Ace clutch", "game": "Valorant" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["url"], "https://storage.example.com/upload/abc");
    let passthrough = app.video_host.requests.lock().unwrap()[0].clone();
    assert_eq!(passthrough.user_id, "alice");

    let event = json!({
        "type": "video.asset.ready",
        "data": {
            "playback_ids": [{ "id": "playback-1" }],
            "passthrough": serde_json::to_string(&passthrough).unwrap(),
        }
    });
    let response = router
        .clone()
        .oneshot(post_json("/api/mux-webhook", None, event))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post_json("/api/mux-webhook", None, json!({ "type": "video.upload.created" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(get("/api/clips/recent", Some(&token))).await.unwrap();
    let feed = json_body(response).await;
    let feed = feed.as_array().expect("feed array");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["video"]["playback_id"], "playback-1");
    assert_eq!(feed[0]["video"]["likes"], 0);
    assert_eq!(feed[0]["likesArray"], json!([]));
}

#[tokio::test]
async fn upload_requires_title_and_game() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("alice"));

    let response = router
        .oneshot(post_json("/api/getUploadAuth", Some(&token), json!({ "title": "Ace clutch" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({ "error": "Missing required fields" }));
    assert!(app.video_host.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn games_are_served_from_cache_after_first_fetch() {
    let app = test_app();
    let router = router(app.state.clone());

    let first = json_body(router.clone().oneshot(get("/api/games", None)).await.unwrap()).await;
    assert_eq!(first["source"], "origin");
    assert_eq!(first["games"][0]["box_art_url"], "https://cdn.example.com/valorant-285x380.jpg");

    let second = json_body(router.oneshot(get("/api/games", None)).await.unwrap()).await;
    assert_eq!(second["source"], "cache");
    assert_eq!(second["games"], first["games"]);
    assert_eq!(app.games.fetches.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn delete_route_enforces_ownership() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    register(app.store.as_ref(), "mallory").await;
    seed_clip(app.store.as_ref(), "c1", "alice", 0).await;
    let router = router(app.state.clone());

    let response = router
        .clone()
        .oneshot(post_json("/api/deleteClip", Some(&token_for(&uid_for("mallory"))), json!({ "clipId": "c1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .clone()
        .oneshot(post_json("/api/deleteClip", Some(&token_for(&uid_for("alice"))), json!({ "clipId": "c1" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "success": true }));

    let response = router
        .oneshot(get("/api/clips/c1", Some(&token_for(&uid_for("alice")))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn following_route_uses_callers_follow_set() {
    let app = test_app();
    for name in ["alice", "bob"] {
        register(app.store.as_ref(), name).await;
    }
    seed_clip(app.store.as_ref(), "b1", "bob", 0).await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("alice"));

    let feed = json_body(router.clone().oneshot(get("/api/clips/following", Some(&token))).await.unwrap()).await;
    assert_eq!(feed, json!([]));

    let response = router
        .clone()
        .oneshot(post_json("/api/follow", Some(&token), json!({ "username": "bob" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let feed = json_body(router.oneshot(get("/api/clips/following", Some(&token))).await.unwrap()).await;
    assert_eq!(feed[0]["video"]["id"], "b1");
}

struct StalledGames;

#[async_trait::async_trait]
impl ohclips::catalog::GameSource for StalledGames {
    async fn fetch_games(&self) -> ohclips::ServiceResult<Vec<ohclips::catalog::RawGame>> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_handlers_are_cut_off_with_a_server_error() {
    let app = test_app();
    let mut config = support::test_config();
    config.request_timeout_secs = 2;
    let state = ohclips::AppState::new(
        config,
        ohclips::gateway::Collaborators {
            store: app.store.clone(),
            rate_limits: app.store.clone(),
            authenticator: std::sync::Arc::new(ohclips::gateway::JwtAuthenticator::new(support::TEST_SECRET)),
            video_host: app.video_host.clone(),
            games: std::sync::Arc::new(StalledGames),
            filter: std::sync::Arc::new(ohclips::filter::WordListFilter::default()),
        },
    );

    let response = router(state).oneshot(get("/api/games", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await, json!({ "error": "Request timed out" }));
}

fn raw_post(uri: &str, token: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn malformed_bodies_get_a_json_error_without_parser_detail() {
    let app = test_app();
    register(app.store.as_ref(), "alice").await;
    let router = router(app.state.clone());
    let token = token_for(&uid_for("alice"));

    for uri in ["/api/like", "/api/comment", "/api/follow", "/api/mux-webhook"] {
        let response = router.clone().oneshot(raw_post(uri, Some(&token), "{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(json_body(response).await, json!({ "error": "Invalid request body" }), "{uri}");
    }
}

fn mux_signature(secret: &str, timestamp: i64, body: &str) -> String {
    use hmac::{Hmac, Mac};
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{body}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[tokio::test]
async fn webhook_requires_a_valid_signature_when_a_secret_is_set() {
    let mut config = test_config();
    config.mux_webhook_secret = "whsec-test".to_string();
    let app = test_app_with(config);
    register(app.store.as_ref(), "alice").await;
    let router = router(app.state.clone());

    let passthrough = json!({ "title": "Ace clutch", "game": "Valorant", "userId": "alice" }).to_string();
    let body = json!({
        "type": "video.asset.ready",
        "data": { "playback_ids": [{ "id": "playback-9" }], "passthrough": passthrough }
    })
    .to_string();

    let forged = Request::builder()
        .method("POST")
        .uri("/api/mux-webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let response = router.clone().oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
    assert_eq!(app.store.clip_count().await.unwrap(), 0);

    let signed = Request::builder()
        .method("POST")
        .uri("/api/mux-webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header("mux-signature", mux_signature("whsec-test", chrono::Utc::now().timestamp(), &body))
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(signed).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.clip_count().await.unwrap(), 1);
}
