mod common;

use std::time::Duration;

use common::{Gauge, Metered, Plain, Sleeper, Unhealthy};
use scopevisor::{Deadline, DeadlineReason, HealthCheckError, InjectorOpts, RootScope, Scope};
use tokio::time::Instant;

fn bounded(parallelism: usize) -> RootScope {
    RootScope::with_opts(InjectorOpts {
        health_check_parallelism: parallelism,
        ..InjectorOpts::default()
    })
}

fn provide_metered(scope: &Scope, gauge: &Gauge, count: usize) {
    for i in 0..count {
        scope
            .provide_named_value(
                format!("m{i}"),
                Metered {
                    gauge: gauge.clone(),
                    delay: Duration::from_millis(10),
                },
            )
            .unwrap();
    }
}

#[tokio::test]
async fn test_services_without_capability_are_absent() {
    let root = RootScope::new();
    for name in ["a", "b", "c", "d"] {
        root.provide_named_value(name, Plain).unwrap();
    }
    assert!(root.health_check().await.is_empty());
}

#[tokio::test]
async fn test_mixed_outcomes() {
    let root = RootScope::new();
    root.provide_named_value("healthy", Sleeper::ms(0)).unwrap();
    root.provide_named_value("broken", Unhealthy).unwrap();
    root.provide_named_value("plain", Plain).unwrap();

    let report = root.health_check().await;
    assert_eq!(report.len(), 2);
    assert!(report["healthy"].is_ok());

    let err = report["broken"].as_ref().unwrap_err();
    assert_eq!(err.as_label(), "health_check_failure");
    assert_eq!(err.to_string(), "health check failed: connection refused");
}

#[tokio::test]
async fn test_unbuilt_lazy_services_are_skipped() {
    let root = RootScope::new();
    root.provide_named("lazy", |_: &Scope| Ok(Unhealthy)).unwrap();
    assert!(root.health_check().await.is_empty());

    root.invoke_named::<Unhealthy>("lazy").unwrap();
    let report = root.health_check().await;
    assert!(report["lazy"].is_err());
}

#[tokio::test(start_paused = true)]
async fn test_parallelism_is_bounded() {
    let gauge = Gauge::default();
    let root = bounded(2);
    provide_metered(&root, &gauge, 6);

    let start = Instant::now();
    let report = root.health_check().await;
    assert_eq!(report.len(), 6);
    assert!(report.values().all(Result::is_ok));
    assert_eq!(gauge.peak(), 2);
    assert_eq!(start.elapsed(), Duration::from_millis(30));

    assert!(root.shutdown().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_runs_everything_at_once() {
    let gauge = Gauge::default();
    let root = RootScope::new();
    provide_metered(&root, &gauge, 6);

    let start = Instant::now();
    let report = root.health_check().await;
    assert_eq!(report.len(), 6);
    assert_eq!(gauge.peak(), 6);
    assert_eq!(start.elapsed(), Duration::from_millis(10));
}

#[tokio::test(start_paused = true)]
async fn test_pool_is_shared_by_concurrent_rounds() {
    let gauge = Gauge::default();
    let root = bounded(1);
    let left = root.scope("left").unwrap();
    let right = root.scope("right").unwrap();
    provide_metered(&left, &gauge, 2);
    provide_metered(&right, &gauge, 2);

    let (l, r) = tokio::join!(left.health_check(), right.health_check());
    assert_eq!(l.len(), 2);
    assert_eq!(r.len(), 2);
    assert!(l.values().chain(r.values()).all(Result::is_ok));
    assert_eq!(gauge.peak(), 1);

    assert!(root.shutdown().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_caller_cancellation_is_prompt() {
    let root = RootScope::new();
    root.provide_named_value("slow", Sleeper::ms(60_000)).unwrap();
    root.provide_named_value("slower", Sleeper::ms(120_000)).unwrap();

    let ctx = Deadline::background();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let report = root.health_check_with_context(&ctx).await;
    assert_eq!(start.elapsed(), Duration::from_millis(5));
    assert_eq!(report.len(), 2);
    for result in report.values() {
        match result {
            Err(HealthCheckError::Timeout { reason }) => {
                assert_eq!(*reason, DeadlineReason::Cancelled)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_caller_deadline_tighter_than_options() {
    let root = RootScope::with_opts(InjectorOpts {
        health_check_global_timeout: Duration::from_secs(5),
        health_check_timeout: Duration::from_secs(1),
        ..InjectorOpts::default()
    });
    root.provide_named_value("slow", Sleeper::ms(500)).unwrap();

    let ctx = Deadline::background().with_timeout(Duration::from_millis(100));
    let start = Instant::now();
    let report = root.health_check_with_context(&ctx).await;
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert!(report["slow"].as_ref().unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_global_timeout_tighter_than_check_timeout() {
    let root = RootScope::with_opts(InjectorOpts {
        health_check_global_timeout: Duration::from_millis(10),
        health_check_timeout: Duration::from_secs(1),
        ..InjectorOpts::default()
    });
    root.provide_named_value("slow", Sleeper::ms(50)).unwrap();

    let start = Instant::now();
    let report = root.health_check().await;
    assert_eq!(start.elapsed(), Duration::from_millis(10));
    match &report["slow"] {
        Err(HealthCheckError::Timeout { reason }) => assert_eq!(*reason, DeadlineReason::Expired),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_huge_timeouts_behave_as_unbounded() {
    let root = RootScope::with_opts(InjectorOpts {
        health_check_global_timeout: Duration::from_secs(u64::MAX),
        health_check_timeout: Duration::MAX,
        ..InjectorOpts::default()
    });
    root.provide_named_value("svc", Sleeper::ms(0)).unwrap();

    let report = root.health_check().await;
    assert_eq!(report.len(), 1);
    assert!(report["svc"].is_ok());
}

#[tokio::test]
async fn test_service_names_cannot_spoof_nested_keys() {
    let root = RootScope::new();
    let err = root.provide_named_value("a/x", Plain).unwrap_err();
    assert_eq!(err.as_label(), "service_invalid_name");

    root.scope("a").unwrap().provide_named_value("x", Sleeper::ms(0)).unwrap();
    let report = root.health_check().await;
    assert_eq!(report.keys().cloned().collect::<Vec<_>>(), vec!["a/x".to_string()]);
    assert!(report["a/x"].is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_queued_checks_time_out_while_waiting_for_permit() {
    let root = RootScope::with_opts(InjectorOpts {
        health_check_parallelism: 1,
        health_check_timeout: Duration::from_millis(15),
        ..InjectorOpts::default()
    });
    root.provide_named_value("first", Sleeper::ms(10)).unwrap();
    root.provide_named_value("second", Sleeper::ms(10)).unwrap();
    root.provide_named_value("third", Sleeper::ms(10)).unwrap();

    let report = root.health_check().await;
    assert!(report["first"].is_ok());
    // second would run 10..20ms, past its 15ms bound; third never gets a permit.
    assert!(report["second"].as_ref().unwrap_err().is_timeout());
    assert!(report["third"].as_ref().unwrap_err().is_timeout());

    assert!(root.shutdown().await.is_ok());
}

#[tokio::test]
async fn test_nested_scopes_are_keyed_by_path() {
    let root = RootScope::new();
    root.provide_named_value("cache", Sleeper::ms(0)).unwrap();
    let api = root.scope("api").unwrap();
    api.provide_named_value("cache", Sleeper::ms(0)).unwrap();
    let db = api.scope("db").unwrap();
    db.provide_named_value("pool", Unhealthy).unwrap();
    root.scope("jobs").unwrap().provide_named_value("cron", Plain).unwrap();

    let report = root.health_check().await;
    let mut keys: Vec<&str> = report.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["api/cache", "api/db/pool", "cache"]);
    assert!(report["api/db/pool"].is_err());

    let api_only = api.health_check().await;
    assert_eq!(api_only.len(), 2);
    assert!(!api_only.contains_key("cache"));
}

#[tokio::test]
async fn test_named_check_resolves_through_ancestors() {
    let root = RootScope::new();
    root.provide_named_value("shared", Unhealthy).unwrap();
    let leaf = root.scope("a").unwrap().scope("b").unwrap();

    let ctx = Deadline::background();
    let err = leaf.health_check_named(&ctx, "shared").await.unwrap_err();
    assert_eq!(err.as_label(), "health_check_failure");

    let err = leaf.health_check_named(&ctx, "missing").await.unwrap_err();
    assert_eq!(err.to_string(), "health check target `missing` not found");
}

#[tokio::test]
async fn test_scopes_can_be_created_during_a_round() {
    let root = RootScope::new();
    root.provide_named_value("svc", Sleeper::ms(5)).unwrap();

    let handle = {
        let scope = root.as_scope().clone();
        tokio::spawn(async move { scope.health_check().await })
    };
    for i in 0..16 {
        root.scope(&format!("s{i}")).unwrap();
    }
    let report = handle.await.unwrap();
    assert!(report["svc"].is_ok());
    assert_eq!(root.children().len(), 16);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_pool_and_rejects_new_checks() {
    let root = bounded(1);
    root.provide_named_value("busy", Sleeper::ms(20)).unwrap();

    let ctx = Deadline::background();
    let in_flight = root.queue_service_healthcheck(&ctx, &root, "busy");
    tokio::time::sleep(Duration::from_millis(1)).await;

    let start = Instant::now();
    assert!(root.shutdown().await.is_ok());
    assert_eq!(start.elapsed(), Duration::from_millis(19));
    assert!(in_flight.await.is_ok());

    root.provide_named_value("late", Sleeper::ms(0)).unwrap();
    let err = root
        .queue_service_healthcheck(&ctx, &root, "late")
        .await
        .unwrap_err();
    assert_eq!(err.as_label(), "health_check_pool_closed");
}
