//! Error handling and recovery scenarios
//!
//! Failures abort the run, but everything persisted before the failure stays
//! in the store so the next run resumes from it.

use std::sync::Arc;

use chrono::NaiveDate;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_harvester::error::{Error, FetchError, ParseError};
use catalog_harvester::sources::{SourceAdapter, SourceKind, SourceOptions};
use catalog_harvester::storage::{ItemStore, MockItemStore};

use crate::common::{self, atom_page, entry, HARVESTER};

fn atom(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/atom+xml")
}

fn opensearch(server: &MockServer) -> Box<dyn SourceAdapter> {
    SourceKind::OpenSearch
        .build(&SourceOptions::new(format!(
            "{}/search?from={{start_date}}",
            server.uri()
        )))
        .unwrap()
}

fn page_url(server: &MockServer, page: u32) -> String {
    format!("{}/search?page={page}", server.uri())
}

async fn mount_page(server: &MockServer, page: u32, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", page.to_string()))
        .respond_with(atom(body))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_first_page(server: &MockServer, body: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", "2020-01-01"))
        .respond_with(atom(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_malformed_entry_aborts_and_keeps_previous_pages() {
    let server = MockServer::start().await;

    mount_first_page(
        &server,
        atom_page(
            &[
                entry("A", "2020-01-01T00:00:00Z"),
                entry("B", "2020-01-02T00:00:00Z"),
            ],
            Some(&page_url(&server, 2)),
        ),
    )
    .await;

    let no_identifier =
        r#"<entry><date name="ingestiondate">2020-01-03T00:00:00Z</date></entry>"#.to_string();
    mount_page(&server, 2, atom_page(&[no_identifier], None), 1).await;

    let store = common::memory_store();
    let err = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Parse(ParseError::MissingField { .. })));
    assert_eq!(store.stats(HARVESTER).unwrap().records, 2);
    assert_eq!(
        store.max_source_date(HARVESTER).unwrap().as_deref(),
        Some("2020-01-02T00:00:00Z")
    );
}

#[tokio::test]
async fn test_fetch_failure_is_fatal_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let err = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap_err();

    match err {
        Error::Fetch(FetchError::RetriesExhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Status { status: 503, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.stats(HARVESTER).unwrap().records, 0);
}

#[tokio::test]
async fn test_transient_fetch_failure_recovers() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    mount_first_page(&server, atom_page(&[entry("A", "2020-01-01T00:00:00Z")], None)).await;

    let store = common::memory_store();
    let report = common::harvester(opensearch(&server), store, "2020-01-01")
        .run()
        .await
        .unwrap();
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn test_non_feed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    mount_first_page(&server, "<html><body>Service maintenance</body></html>".into()).await;

    let err = common::harvester(opensearch(&server), common::memory_store(), "2020-01-01")
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse(ParseError::MalformedFeed(_))));
}

#[tokio::test]
async fn test_repeated_cursor_stops_the_run() {
    let server = MockServer::start().await;
    let start_url = format!("{}/search?from=2020-01-01", server.uri());

    mount_first_page(
        &server,
        atom_page(
            &[entry("A", "2020-01-01T00:00:00Z")],
            Some(&page_url(&server, 2)),
        ),
    )
    .await;
    // Page 2 points back at page 1
    mount_page(
        &server,
        2,
        atom_page(&[entry("B", "2020-01-02T00:00:00Z")], Some(&start_url)),
        1,
    )
    .await;

    let store = common::memory_store();
    let err = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap_err();

    match err {
        Error::CursorRepeated(url) => assert_eq!(url, start_url),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.stats(HARVESTER).unwrap().records, 2);
}

#[tokio::test]
async fn test_page_limit_ends_run_early() {
    let server = MockServer::start().await;

    mount_first_page(
        &server,
        atom_page(
            &[entry("A", "2020-01-01T00:00:00Z")],
            Some(&page_url(&server, 2)),
        ),
    )
    .await;
    mount_page(
        &server,
        2,
        atom_page(
            &[entry("B", "2020-01-02T00:00:00Z")],
            Some(&page_url(&server, 3)),
        ),
        1,
    )
    .await;
    mount_page(
        &server,
        3,
        atom_page(&[entry("C", "2020-01-03T00:00:00Z")], None),
        0,
    )
    .await;

    let store = common::memory_store();
    let report = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .with_max_pages(Some(2))
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert!(report.page_limit_reached);
    assert_eq!(store.stats(HARVESTER).unwrap().records, 2);
}

#[tokio::test]
async fn test_transient_store_failures_are_retried() {
    let server = MockServer::start().await;
    mount_first_page(
        &server,
        atom_page(
            &[
                entry("A", "2020-01-01T00:00:00Z"),
                entry("B", "2020-01-02T00:00:00Z"),
            ],
            None,
        ),
    )
    .await;

    let store = Arc::new(MockItemStore::new());
    store.fail_next_inserts(2);

    let report = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(store.insert_calls(), 4);
    assert_eq!(store.identifiers(), vec!["A".to_string(), "B".to_string()]);
}

#[tokio::test]
async fn test_persistent_store_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_first_page(
        &server,
        atom_page(&[entry("A", "2020-01-01T00:00:00Z")], None),
    )
    .await;

    let store = Arc::new(MockItemStore::new());
    store.fail_next_inserts(10);

    let err = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Store(_)));
    assert_eq!(store.insert_calls(), 3);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_duplicates_within_a_page_are_skipped() {
    let server = MockServer::start().await;
    mount_first_page(
        &server,
        atom_page(
            &[
                entry("A", "2020-01-01T00:00:00Z"),
                entry("A", "2020-01-01T00:00:00Z"),
            ],
            None,
        ),
    )
    .await;

    let store = common::memory_store();
    let report = common::harvester(opensearch(&server), store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap();

    assert_eq!(report.entries, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);
}

#[tokio::test]
async fn test_malformed_missing_dates_is_a_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing/O3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"missing": []}"#))
        .expect(1)
        .mount(&server)
        .await;

    let options = SourceOptions::new(format!(
        "{}/missing/{{coverage}}?from={{start_date}}",
        server.uri()
    ))
    .coverage("O3")
    .today(NaiveDate::from_ymd_opt(2023, 1, 20).unwrap());

    let err = common::harvester(
        SourceKind::Gome2.build(&options).unwrap(),
        common::memory_store(),
        "2023-01-15",
    )
    .run()
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Parse(ParseError::MalformedJson(_))));
}
