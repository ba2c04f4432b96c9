mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use gatecache::cache::keys;
use gatecache::cache::{CacheBackend, LimitVerdict, LocalBackend, SessionRecord, StaticResponse};
use gatecache::error::CacheError;

fn text(body: &str) -> StaticResponse {
    StaticResponse {
        content_type: "text/plain; charset=utf-8".into(),
        body: body.into(),
        status_code: 200,
    }
}

#[tokio::test]
async fn sixty_per_minute_admits_fifty_nine_charges_at_once() {
    let h = harness(&[("DecreasePerMin", "60")]);

    for n in 1..=59 {
        assert_eq!(
            h.cache().ip_limit("1.1.1.1", 1.0).await.unwrap(),
            LimitVerdict::Allowed,
            "charge {}",
            n
        );
    }
    assert!(h.cache().ip_limit("1.1.1.1", 1.0).await.unwrap().is_blocked());
    assert!(h.cache().ip_check("1.1.1.1").await.unwrap().is_blocked());

    // blocked attempts leave the count alone
    let counter = h.cache().ip_counter("1.1.1.1").await.unwrap().unwrap();
    assert_eq!(counter.count, 59.0);

    // one second of decay frees exactly one unit
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(
        h.cache().ip_limit("1.1.1.1", 1.0).await.unwrap(),
        LimitVerdict::Allowed
    );
    assert!(h.cache().ip_limit("1.1.1.1", 1.0).await.unwrap().is_blocked());
}

#[tokio::test]
async fn peek_reports_time_until_unblocked() {
    let h = harness(&[("DecreasePerMin", "10")]);

    // a first charge is always admitted, whatever its size
    assert_eq!(
        h.cache().ip_limit("2.2.2.2", 15.0).await.unwrap(),
        LimitVerdict::Allowed
    );

    h.clock.advance(Duration::from_millis(35_000));
    let verdict = h.cache().ip_check("2.2.2.2").await.unwrap();
    assert_eq!(verdict.retry_in(), Some(Duration::from_millis(1_000)));

    h.clock.advance(Duration::from_millis(1_001));
    assert_eq!(h.cache().ip_check("2.2.2.2").await.unwrap(), LimitVerdict::Allowed);
}

#[tokio::test]
async fn peek_never_charges() {
    let h = harness(&[("DecreasePerMin", "10")]);

    assert_eq!(h.cache().ip_check("3.3.3.3").await.unwrap(), LimitVerdict::Allowed);
    assert!(h.cache().ip_counter("3.3.3.3").await.unwrap().is_none());

    h.cache().ip_limit("3.3.3.3", 4.0).await.unwrap();
    for _ in 0..5 {
        h.cache().ip_check("3.3.3.3").await.unwrap();
    }
    assert_eq!(h.cache().ip_counter("3.3.3.3").await.unwrap().unwrap().count, 4.0);
}

#[tokio::test]
async fn clock_stepping_back_does_not_refill() {
    let h = harness(&[("DecreasePerMin", "10")]);

    h.cache().ip_limit("4.4.4.4", 5.0).await.unwrap();
    h.clock.set(START_MS - 60_000);
    h.cache().ip_limit("4.4.4.4", 1.0).await.unwrap();

    let counter = h.cache().ip_counter("4.4.4.4").await.unwrap().unwrap();
    assert_eq!(counter.count, 6.0);
}

#[tokio::test]
async fn ip_and_key_limiters_do_not_share_counters() {
    let h = harness(&[("DecreasePerMin", "10")]);

    h.cache().limit("5.5.5.5", 3.0).await.unwrap();
    assert!(h.cache().ip_counter("5.5.5.5").await.unwrap().is_none());
    assert_eq!(h.cache().limit_counter("5.5.5.5").await.unwrap().unwrap().count, 3.0);
}

#[tokio::test]
async fn bad_arguments_are_rejected() {
    let h = harness(&[]);

    assert!(matches!(
        h.cache().ip_limit("", 1.0).await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.cache().limit("k", -1.0).await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.cache().get_public_response("GET /", Duration::ZERO).await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.cache().put_public_response("GET /", text("x"), Duration::ZERO).await,
        Err(CacheError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.cache().resolve_session("").await,
        Err(CacheError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn public_response_expires_after_its_horizon() {
    let h = harness(&[]);
    let horizon = Duration::from_millis(1_000);

    h.cache()
        .put_public_response("GET /bench/cache", text("OK"), horizon)
        .await
        .unwrap();

    h.clock.advance(Duration::from_millis(500));
    let hit = h.cache().get_public_response("GET /bench/cache", horizon).await.unwrap();
    assert_eq!(hit.map(|e| e.body), Some("OK".to_string()));

    h.clock.advance(Duration::from_millis(499));
    assert!(h.cache().get_public_response("GET /bench/cache", horizon).await.unwrap().is_some());

    // gone the moment the horizon is reached
    h.clock.advance(Duration::from_millis(1));
    assert!(h.cache().get_public_response("GET /bench/cache", horizon).await.unwrap().is_none());
    assert!(!h.backend.exists(&keys::public_response_key("GET /bench/cache")).await.unwrap());
}

#[tokio::test]
async fn private_responses_are_per_session() {
    let h = harness(&[]);
    let horizon = Duration::from_secs(5);

    h.cache()
        .put_private_response("GET /me", "token-a", text("alice"), horizon)
        .await
        .unwrap();

    let own = h.cache().get_private_response("GET /me", "token-a", horizon).await.unwrap();
    assert_eq!(own.map(|e| e.body), Some("alice".to_string()));
    assert!(h.cache().get_private_response("GET /me", "token-b", horizon).await.unwrap().is_none());
    assert!(h.cache().get_public_response("GET /me", horizon).await.unwrap().is_none());
}

#[tokio::test]
async fn session_is_loaded_once_then_served_from_cache() {
    let h = harness(&[]);
    h.store.insert_session("tok", "alice", CLIENT_IP, START_MS);
    h.store.grant("alice", "app.cache", true, true);
    h.store.grant("alice", "app.users", true, false);

    let first = h.cache().resolve_session("tok").await.unwrap().unwrap();
    assert_eq!(first.username, "alice");
    assert_eq!(
        first.permissions,
        vec!["app.cache.read", "app.cache.write", "app.users.read"]
    );
    assert_eq!(first.browser, BROWSER);
    assert_eq!(first.time, at(START_MS));

    let second = h.cache().resolve_session("tok").await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(h.store.lookups(), 1);
}

#[tokio::test]
async fn unknown_token_leaves_cache_untouched() {
    let h = harness(&[]);

    assert!(h.cache().resolve_session("nope").await.unwrap().is_none());
    assert!(!h.backend.exists(&keys::webtoken_key("nope")).await.unwrap());
}

#[tokio::test]
async fn duplicated_token_rows_are_treated_as_absent() {
    let h = harness(&[]);
    h.store.insert_session("dup", "alice", CLIENT_IP, START_MS);
    h.store.insert_session("dup", "bob", CLIENT_IP, START_MS);

    assert!(h.cache().resolve_session("dup").await.unwrap().is_none());
}

#[tokio::test]
async fn invalidation_drops_only_the_cached_copy() {
    let h = harness(&[]);
    h.store.insert_session("tok", "alice", CLIENT_IP, START_MS);

    h.cache().resolve_session("tok").await.unwrap();
    h.cache().invalidate_session("tok").await.unwrap();
    assert!(h.store.has_session("tok"));

    assert!(h.cache().resolve_session("tok").await.unwrap().is_some());
    assert_eq!(h.store.lookups(), 2);
}

#[tokio::test]
async fn added_session_resolves_without_the_store() {
    let h = harness(&[]);
    let record = SessionRecord {
        username: "carol".into(),
        language: "de".into(),
        permissions: vec!["app.cache.read".into()],
        ip: CLIENT_IP.into(),
        browser: BROWSER.into(),
        time: at(START_MS),
    };

    h.cache().add_session("fresh", &record).await.unwrap();
    assert_eq!(h.cache().resolve_session("fresh").await.unwrap(), Some(record));
    assert_eq!(h.store.lookups(), 0);
}

#[tokio::test]
async fn full_cache_does_not_fail_session_resolution() {
    let h = harness_on(&[], |_| Arc::new(LocalBackend::with_capacity_limit(8)));
    h.store.insert_session("tok", "alice", CLIENT_IP, START_MS);

    let record = h.cache().resolve_session("tok").await.unwrap();
    assert_eq!(record.map(|r| r.username), Some("alice".to_string()));
    assert!(!h.backend.exists(&keys::webtoken_key("tok")).await.unwrap());
}

#[tokio::test]
async fn purge_removes_entries_stamped_before_cutoff() {
    let h = harness(&[]);
    h.store.insert_session("tok", "alice", CLIENT_IP, START_MS + 10_000);

    h.cache().ip_limit("6.6.6.6", 1.0).await.unwrap();
    h.clock.advance(Duration::from_secs(10));
    h.cache()
        .put_public_response("GET /x", text("x"), Duration::from_secs(60))
        .await
        .unwrap();
    h.cache().resolve_session("tok").await.unwrap();
    // not a cache record, never touched
    h.backend.set("foreign", "1".into(), None).await.unwrap();

    let removed = h.cache().purge_older_than(START_MS + 5_000).await.unwrap();
    assert_eq!(removed, 1);

    let mut left = h.backend.keys().await.unwrap();
    left.sort();
    assert_eq!(
        left,
        vec![
            keys::public_response_key("GET /x"),
            keys::webtoken_key("tok"),
            "foreign".to_string(),
        ]
    );
}

#[tokio::test]
async fn wipe_empties_the_store() {
    let h = harness(&[]);
    h.cache().ip_limit("7.7.7.7", 1.0).await.unwrap();
    h.cache()
        .put_public_response("GET /y", text("y"), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(h.cache().memory_usage().await.unwrap() > 0);

    h.cache().wipe().await.unwrap();
    assert!(h.backend.keys().await.unwrap().is_empty());
    assert_eq!(h.cache().memory_usage().await.unwrap(), 0);
}
