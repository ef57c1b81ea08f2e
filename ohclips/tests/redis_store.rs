//! Store contract checks against a live Redis. Run with `--ignored`.

mod support;

use std::{sync::Arc, time::Duration};

use ohclips::{DocumentStore, RateLimitStore, StoreError, store::{ClipQuery, RateDecision, RateQuota}, types::Like};
use support::{TestNamespace, base_time, register, seed_clip, uid_for};

fn like(username: &str) -> Like {
    Like {
        date: base_time(),
        uid: uid_for(username),
    }
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn registration_and_follow_sets() {
    let ns = TestNamespace::unique();
    let store = ns.store().await;
    register(&store, "alice").await;
    register(&store, "bob").await;

    let taken = store
        .register_user(&ohclips::types::NewUser {
            username: "alice".into(),
            uid: "uid-other".into(),
            photo_url: "https://example.com/a.svg".into(),
            created_at: base_time(),
        })
        .await;
    assert!(matches!(taken, Err(StoreError::UniqueConstraintViolation { .. })));
    assert_eq!(store.username_for_principal(&uid_for("bob")).await.unwrap().as_deref(), Some("bob"));

    store.follow("alice", "bob").await.unwrap();
    store.follow("alice", "bob").await.unwrap();
    assert!(matches!(store.follow("alice", "ghost").await, Err(StoreError::NotFound { .. })));
    let alice = store.user("alice").await.unwrap().expect("alice");
    assert_eq!(alice.following.len(), 1);

    store.unfollow("alice", "bob").await.unwrap();
    assert!(store.user("alice").await.unwrap().expect("alice").following.is_empty());
    assert_eq!(store.user_count().await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn concurrent_toggles_keep_counter_exact() {
    let ns = TestNamespace::unique();
    let store = Arc::new(ns.store().await);
    register(store.as_ref(), "alice").await;
    seed_clip(store.as_ref(), "c1", "alice", 0).await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let name = format!("user{i}");
                store.toggle_like("c1", &name, &like(&name)).await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().liked);
    }
    assert_eq!(store.clip("c1").await.unwrap().unwrap().likes, 16);

    let outcome = store.toggle_like("c1", "user0", &like("user0")).await.unwrap();
    assert_eq!((outcome.liked, outcome.likes), (false, 15));
    assert_eq!(store.likes_for_many(&["c1".to_string()]).await.unwrap()[0].len(), 15);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn feeds_order_and_cascade_delete() {
    let ns = TestNamespace::unique();
    let store = ns.store().await;
    register(&store, "alice").await;
    register(&store, "bob").await;
    seed_clip(&store, "a", "alice", 0).await;
    seed_clip(&store, "b", "alice", 0).await;
    seed_clip(&store, "c", "bob", 10).await;
    store.toggle_like("a", "bob", &like("bob")).await.unwrap();
    store.toggle_like("b", "bob", &like("bob")).await.unwrap();

    let top: Vec<String> = store.clips(&ClipQuery::top(2)).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(top, ["a", "b"]);
    let recent: Vec<String> = store.clips(&ClipQuery::recent(1)).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(recent, ["c"]);
    let mine = store.clips(&ClipQuery::by_authors(vec!["bob".into()])).await.unwrap();
    assert_eq!(mine.len(), 1);

    assert!(matches!(store.delete_clip("a", "bob").await, Err(StoreError::NotOwner { .. })));
    let report = store.delete_clip("a", "alice").await.unwrap();
    assert_eq!(report.likes_removed, 1);
    assert!(store.clip("a").await.unwrap().is_none());
    assert_eq!(store.clip_count().await.unwrap(), 2);
    let top: Vec<String> = store.clips(&ClipQuery::top(5)).await.unwrap().into_iter().map(|c| c.id).collect();
    assert!(!top.contains(&"a".to_string()));
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn cache_and_rate_windows_expire() {
    let ns = TestNamespace::unique();
    let store = ns.store().await;

    store.cache_set("games", "[]", Duration::from_secs(1)).await.unwrap();
    assert_eq!(store.cache_get("games").await.unwrap().as_deref(), Some("[]"));

    let quota = RateQuota {
        max: 1,
        window: Duration::from_millis(300),
    };
    assert_eq!(store.check("like", "1.1.1.1", quota).await.unwrap(), RateDecision::Allowed);
    let RateDecision::Limited { retry_after } = store.check("like", "1.1.1.1", quota).await.unwrap() else {
        panic!("second request in the window should be limited");
    };
    assert!(retry_after <= quota.window);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(store.cache_get("games").await.unwrap(), None);
    assert_eq!(store.check("like", "1.1.1.1", quota).await.unwrap(), RateDecision::Allowed);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn top_feed_with_many_unliked_clips_is_newest_first() {
    let ns = TestNamespace::unique();
    let store = ns.store().await;
    register(&store, "alice").await;
    for minute in 0..30 {
        seed_clip(&store, &format!("z{minute:02}"), "alice", minute).await;
    }
    store.toggle_like("z03", "alice", &like("alice")).await.unwrap();

    let top: Vec<String> = store.clips(&ClipQuery::top(4)).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(top, ["z03", "z29", "z28", "z27"]);

    store.toggle_like("z03", "alice", &like("alice")).await.unwrap();
    let top: Vec<String> = store.clips(&ClipQuery::top(2)).await.unwrap().into_iter().map(|c| c.id).collect();
    assert_eq!(top, ["z29", "z28"]);
}
