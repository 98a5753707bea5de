use crate::common::*;
use cadence_crawl::crawler::{run_once, schedule_store, telemetry_log, RunOutcome};
use cadence_crawl::output::load_records;
use cadence_crawl::sources::build_orchestrator;
use cadence_crawl::state::Phase;
use cadence_crawl::storage::{Interval, ScheduleEntry};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn healthy_product_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/categories/dairy/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(vec![product(7, true)])))
        .mount(&server)
        .await;
    server
}

async fn broken_coupon_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/coupon/.*$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_failing_source_does_not_affect_others() {
    let products = healthy_product_server().await;
    let coupons = broken_coupon_server().await;

    let db = TestDb::new();
    let sources = format!(
        "{}{}",
        product_source("groceries", &products.uri(), 1, 9, 10),
        coupon_source("coupons", &coupons.uri(), 10)
    );
    let config = create_test_config(&db, "", &sources);
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.due, vec!["coupons", "groceries"]);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert!(matches!(report.outcomes.get("groceries"), Some(RunOutcome::Completed(_))));
    assert!(matches!(report.outcomes.get("coupons"), Some(RunOutcome::Failed(_))));

    // Records land only in the successful source's collection
    assert_eq!(load_records(store.as_ref(), "data", "groceries").unwrap().len(), 1);
    assert!(load_records(store.as_ref(), "data", "coupons").unwrap().is_empty());

    // The completed source is not due again; the failed one still is
    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.due, vec!["coupons"]);
}

#[tokio::test]
async fn test_completion_survives_reopen() {
    let products = healthy_product_server().await;
    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &products.uri(), 1, 9, 10));

    let report = run_once(&config, db.open()).await.unwrap();
    assert_eq!(report.succeeded(), 1);

    // A new process sees the stored completion and the stored schedule
    let store = db.open();
    let orchestrator = build_orchestrator(&config, store.clone()).unwrap();
    let due = orchestrator.due_sources(chrono::Utc::now()).await.unwrap();
    assert!(due.is_empty());

    let later = chrono::Utc::now() + chrono::Duration::minutes(10);
    let due = orchestrator.due_sources(later).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].source_name, "groceries");
}

#[tokio::test]
async fn test_edited_schedule_is_not_reseeded() {
    let products = healthy_product_server().await;
    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &products.uri(), 1, 9, 10));
    let store = db.open();

    run_once(&config, store.clone()).await.unwrap();
    let schedules = schedule_store(&config, store.clone());
    schedules
        .update(&ScheduleEntry::new("groceries", Interval::default()))
        .unwrap();

    // Seeding on the next start keeps the edited zero interval, so the
    // source is due immediately
    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.due, vec!["groceries"]);
    assert_eq!(
        schedules.get("groceries").unwrap().unwrap().interval,
        Interval::default()
    );
}

#[tokio::test]
async fn test_schedule_without_adapter_is_skipped() {
    let products = healthy_product_server().await;
    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &products.uri(), 1, 9, 10));
    let store = db.open();

    schedule_store(&config, store.clone())
        .create(&ScheduleEntry::new("legacy", Interval::new(0, 0, 1, 0)))
        .unwrap();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.due, vec!["groceries"]);
    assert_eq!(report.unknown, vec!["legacy"]);
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn test_run_deadline_cancels_slow_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/categories/dairy/search/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(vec![product(1, true)]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let db = TestDb::new();
    let config = create_test_config(
        &db,
        "run-deadline-secs = 1",
        &product_source("groceries", &server.uri(), 1, 9, 10),
    );
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert!(matches!(
        report.outcomes.get("groceries"),
        Some(RunOutcome::TimedOut(limit)) if *limit == Duration::from_secs(1)
    ));

    // Link creation had finished before the deadline and keeps its record
    let history = telemetry_log(&config, store.clone()).history("groceries").unwrap();
    let phases: Vec<Phase> = history.iter().map(|r| r.phase).collect();
    assert_eq!(phases, vec![Phase::LinksCreated]);
}
