use crate::common::*;
use cadence_crawl::crawler::{run_once, telemetry_log, RunOutcome, StageError};
use cadence_crawl::output::load_records;
use cadence_crawl::state::Phase;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(server: &MockServer, page: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/coupon/get"))
        .and(query_param("category_id", "JBGDg"))
        .and(query_param("order_by", "newest"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: u64, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/api/coupon/find/{}", id)))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_coupon_run_end_to_end() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, listing_page(2, &[1, 2])).await;
    mount_listing(&server, 2, listing_page(2, &[3])).await;
    mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(coupon_detail(1))).await;
    mount_detail(&server, 2, ResponseTemplate::new(200).set_body_json(coupon_detail(2))).await;
    mount_detail(&server, 3, ResponseTemplate::new(429)).await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &coupon_source("coupons", &server.uri(), 10));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.due, vec!["coupons"]);

    match report.outcomes.get("coupons") {
        Some(RunOutcome::Completed(summary)) => {
            assert_eq!(summary.targets, 3);
            assert_eq!(summary.payloads, 2);
            assert_eq!(summary.soft_empty, 1);
            assert_eq!(summary.records, 2);
        }
        other => panic!("Expected a completed run, got {:?}", other),
    }

    let records = load_records(store.as_ref(), "data", "coupons").unwrap();
    assert_eq!(records.len(), 2);
    let mut codes: Vec<&str> = records.iter().map(|r| r["code"].as_str().unwrap()).collect();
    codes.sort();
    assert_eq!(codes, vec!["CODE1", "CODE2"]);
    assert!(records.iter().all(|r| !r.contains_key("description")));

    let history = telemetry_log(&config, store.clone()).history("coupons").unwrap();
    let phases: Vec<Phase> = history.iter().rev().map(|r| r.phase).collect();
    assert_eq!(phases, Phase::ALL.to_vec());
}

#[tokio::test]
async fn test_rate_limited_probe_fails_link_creation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/coupon/get"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &coupon_source("coupons", &server.uri(), 10));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    match report.outcomes.get("coupons") {
        Some(RunOutcome::Failed(e)) => {
            assert_eq!(e.phase, Phase::LinksCreated);
            assert!(matches!(e.cause, StageError::Links(_)));
        }
        other => panic!("Expected a failed run, got {:?}", other),
    }

    // A failed first phase leaves no telemetry at all
    let telemetry = telemetry_log(&config, store.clone());
    assert!(telemetry.history("coupons").unwrap().is_empty());
    assert!(telemetry.last_completion("coupons").unwrap().is_none());
}

#[tokio::test]
async fn test_rate_limited_listing_page_is_skipped() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, listing_page(2, &[1])).await;
    Mock::given(method("GET"))
        .and(path("/api/coupon/get"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    mount_detail(&server, 1, ResponseTemplate::new(200).set_body_json(coupon_detail(1))).await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &coupon_source("coupons", &server.uri(), 10));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.succeeded(), 1);
    assert_eq!(load_records(store.as_ref(), "data", "coupons").unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_detail_fails_parse_phase() {
    let server = MockServer::start().await;
    mount_listing(&server, 1, listing_page(1, &[1])).await;
    mount_detail(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": {"id": 1}})),
    )
    .await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &coupon_source("coupons", &server.uri(), 10));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    match report.outcomes.get("coupons") {
        Some(RunOutcome::Failed(e)) => assert_eq!(e.phase, Phase::DataParsed),
        other => panic!("Expected a failed run, got {:?}", other),
    }

    let history = telemetry_log(&config, store.clone()).history("coupons").unwrap();
    let phases: Vec<Phase> = history.iter().rev().map(|r| r.phase).collect();
    assert_eq!(phases, vec![Phase::LinksCreated, Phase::LinksDownloaded]);
    assert!(load_records(store.as_ref(), "data", "coupons").unwrap().is_empty());
}
