use crate::common::*;
use cadence_crawl::crawler::{run_once, telemetry_log, RunOutcome};
use cadence_crawl::output::load_records;
use cadence_crawl::state::Phase;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/v1/categories/dairy/search/";

#[tokio::test]
async fn test_product_run_respects_page_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(vec![product(1, true), product(2, false)])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(vec![product(3, true)])))
        .expect(0)
        .mount(&server)
        .await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &server.uri(), 30, 2, 60));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    match report.outcomes.get("groceries") {
        Some(RunOutcome::Completed(summary)) => {
            assert_eq!(summary.targets, 2);
            assert_eq!(summary.soft_empty, 1);
            assert_eq!(summary.records, 2);
        }
        other => panic!("Expected a completed run, got {:?}", other),
    }

    let mut records = load_records(store.as_ref(), "data", "groceries").unwrap();
    records.sort_by_key(|r| r["id"].as_u64());
    assert_eq!(
        serde_json::Value::Object(records[0].clone()),
        json!({
            "id": 1, "title": "Product 1", "category": "dairy",
            "exist": true, "rrp_price": 100, "selling_price": 90
        })
    );
    assert_eq!(records[1]["exist"], json!(false));
    assert!(records[1]["selling_price"].is_null());
}

#[tokio::test]
async fn test_forbidden_fails_download_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &server.uri(), 3, 9, 60));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    match report.outcomes.get("groceries") {
        Some(RunOutcome::Failed(e)) => {
            assert_eq!(e.phase, Phase::LinksDownloaded);
            assert!(e.to_string().contains("403"));
        }
        other => panic!("Expected a failed run, got {:?}", other),
    }

    let history = telemetry_log(&config, store.clone()).history("groceries").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].phase, Phase::LinksCreated);
}

#[tokio::test]
async fn test_all_pages_rate_limited_still_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let db = TestDb::new();
    let config = create_test_config(&db, "", &product_source("groceries", &server.uri(), 2, 9, 60));
    let store = db.open();

    let report = run_once(&config, store.clone()).await.unwrap();
    assert_eq!(report.succeeded(), 1);

    // Zero records still produce a full phase trail and a completion
    let telemetry = telemetry_log(&config, store.clone());
    assert_eq!(telemetry.history("groceries").unwrap().len(), 4);
    assert!(telemetry.last_completion("groceries").unwrap().is_some());
    assert!(load_records(store.as_ref(), "data", "groceries").unwrap().is_empty());
}
