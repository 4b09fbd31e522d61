//! End-to-end harvest runs, one or more per source kind

use std::time::{Duration, Instant};

use chrono::NaiveDate;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_harvester::config::HarvesterConfig;
use catalog_harvester::harvest::{Harvester, Pacer};
use catalog_harvester::sources::{SourceKind, SourceOptions};
use catalog_harvester::storage::{open_sqlite_store, ItemStore, SqliteItemStore};

use crate::common::{self, atom_page, entry, missing_dates, HARVESTER};

fn atom(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/atom+xml")
}

fn json(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/json")
}

/// Two-page OpenSearch catalog: A and B on the first page, C on the second
async fn mount_two_pages(server: &MockServer, from: &str) {
    let page2 = format!("{}/search?page=2", server.uri());

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", from))
        .respond_with(atom(atom_page(
            &[
                entry("S1_A", "2020-01-01T10:00:00.000Z"),
                entry("S1_B", "2020-01-02T10:00:00.000Z"),
            ],
            Some(&page2),
        )))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(atom(atom_page(
            &[entry("S1_C", "2020-01-03T10:00:00.000Z")],
            None,
        )))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_opensearch_follows_next_links_until_absent() {
    let server = MockServer::start().await;
    mount_two_pages(&server, "2020-01-01T00:00:00.000Z").await;

    let store = common::memory_store();
    let source = SourceKind::OpenSearch
        .build(&SourceOptions::new(format!(
            "{}/search?from={{start_date}}",
            server.uri()
        )))
        .unwrap();

    let report = common::harvester(source, store.clone(), "2020-01-01T00:00:00.000Z")
        .run()
        .await
        .unwrap();

    assert_eq!(report.start_date, "2020-01-01T00:00:00.000Z");
    assert_eq!(report.pages, 2);
    assert_eq!(report.entries, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.duplicates, 0);
    assert!(!report.page_limit_reached);

    let stats = store.stats(HARVESTER).unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(
        stats.latest_source_date.as_deref(),
        Some("2020-01-03T10:00:00.000Z")
    );

    let record = store.get("S1_C").unwrap().unwrap();
    assert_eq!(record.harvester, HARVESTER);
    assert_eq!(record.source, common::SOURCE);
    assert!(record.content.unwrap().contains("Sentinel-1"));
}

#[tokio::test]
async fn test_second_run_resumes_from_latest_source_date() {
    let server = MockServer::start().await;
    mount_two_pages(&server, "2020-01-01T00:00:00.000Z").await;

    // The second run must start from the largest stored ingestion date
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", "2020-01-03T10:00:00.000Z"))
        .respond_with(atom(atom_page(
            &[
                entry("S1_C", "2020-01-03T10:00:00.000Z"),
                entry("S1_D", "2020-01-04T10:00:00.000Z"),
            ],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let template = format!("{}/search?from={{start_date}}", server.uri());

    let first = common::harvester(
        SourceKind::OpenSearch.build(&SourceOptions::new(&template)).unwrap(),
        store.clone(),
        "2020-01-01T00:00:00.000Z",
    )
    .run()
    .await
    .unwrap();
    assert_eq!(first.inserted, 3);

    let second = common::harvester(
        SourceKind::OpenSearch.build(&SourceOptions::new(&template)).unwrap(),
        store.clone(),
        "2020-01-01T00:00:00.000Z",
    )
    .run()
    .await
    .unwrap();

    assert_eq!(second.start_date, "2020-01-03T10:00:00.000Z");
    assert_eq!(second.pages, 1);
    assert_eq!(second.inserted, 1);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.stats(HARVESTER).unwrap().records, 4);
}

#[tokio::test]
async fn test_rerun_against_unchanged_catalog_keeps_store_contents() {
    let server = MockServer::start().await;

    // The catalog answers every query with the same page
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(atom(atom_page(
            &[
                entry("S2_A", "2020-01-01T10:00:00.000Z"),
                entry("S2_B", "2020-01-02T10:00:00.000Z"),
            ],
            None,
        )))
        .expect(2)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let template = format!("{}/catalog?from={{start_date}}", server.uri());
    let run = || {
        common::harvester(
            SourceKind::OpenSearch.build(&SourceOptions::new(&template)).unwrap(),
            store.clone(),
            "2020-01-01T00:00:00.000Z",
        )
    };

    let first = run().run().await.unwrap();
    assert_eq!(first.inserted, 2);
    let before = store.harvested_since(HARVESTER, None, 100).unwrap();

    let second = run().run().await.unwrap();
    let after = store.harvested_since(HARVESTER, None, 100).unwrap();

    assert_eq!(second.start_date, "2020-01-02T10:00:00.000Z");
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(before, after);
    assert_eq!(after.len(), 2);
}

#[tokio::test]
async fn test_default_pacing_spaces_page_fetches() {
    let server = MockServer::start().await;
    mount_two_pages(&server, "2020-01-01T00:00:00.000Z").await;

    let source = SourceKind::OpenSearch
        .build(&SourceOptions::new(format!(
            "{}/search?from={{start_date}}",
            server.uri()
        )))
        .unwrap();
    let harvester = common::harvester(source, common::memory_store(), "2020-01-01T00:00:00.000Z")
        .with_pacer(Pacer::default());

    let started = Instant::now();
    let report = harvester.run().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.pages, 2);
    // One pause between the two pages and none after the last one
    assert!(elapsed >= Duration::from_millis(950), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn test_resume_point_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("items.db");

    {
        let store = SqliteItemStore::open(&db_path).unwrap();
        store
            .insert(&common::identity().record("OLD", "2021-06-01T00:00:00.000Z", None))
            .unwrap();
        // A newer record of another harvester must not move the resume point
        store
            .insert(
                &catalog_harvester::HarvestIdentity::new("other", "elsewhere")
                    .record("OTHER", "2030-01-01T00:00:00.000Z", None),
            )
            .unwrap();
    }

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("from", "2021-06-01T00:00:00.000Z"))
        .respond_with(atom(atom_page(
            &[entry("NEW", "2021-06-02T00:00:00.000Z")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = open_sqlite_store(&db_path).unwrap();
    let source = SourceKind::OpenSearch
        .build(&SourceOptions::new(format!(
            "{}/search?from={{start_date}}",
            server.uri()
        )))
        .unwrap();

    let report = common::harvester(source, store.clone(), "2019-01-01T00:00:00.000Z")
        .run()
        .await
        .unwrap();

    assert_eq!(report.start_date, "2021-06-01T00:00:00.000Z");
    assert_eq!(report.inserted, 1);
    assert!(store.get("NEW").unwrap().is_some());
}

#[tokio::test]
async fn test_relative_next_link_is_resolved_against_current_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("from", "2020-01-01"))
        .respond_with(atom(atom_page(
            &[entry("A", "2020-01-01T00:00:00Z")],
            Some("search?page=2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/search"))
        .and(query_param("page", "2"))
        .respond_with(atom(atom_page(&[entry("B", "2020-01-02T00:00:00Z")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let source = SourceKind::OpenSearch
        .build(&SourceOptions::new(format!(
            "{}/api/search?from={{start_date}}",
            server.uri()
        )))
        .unwrap();

    let report = common::harvester(source, store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap();
    assert_eq!(report.pages, 2);
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn test_dhus_restores_ordering_on_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dhus/search"))
        .and(query_param("q", "ingestiondate:[2020-01-01T00:00:00.000Z TO NOW]"))
        .respond_with(atom(atom_page(
            &[entry("S2A_1", "2020-01-01T01:00:00.000Z")],
            Some(&format!("{}/dhus/search?q=*&start=1&rows=1", server.uri())),
        )))
        .expect(1)
        .mount(&server)
        .await;

    // Only the reordered link is served; the bare one would 404
    Mock::given(method("GET"))
        .and(path("/dhus/search"))
        .and(query_param("start", "1"))
        .and(query_param("orderby", "ingestiondate asc"))
        .respond_with(atom(atom_page(
            &[entry("S2A_2", "2020-01-01T02:00:00.000Z")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let source = SourceKind::Dhus
        .build(&SourceOptions::new(format!(
            "{}/dhus/search?q=ingestiondate:[{{start_date}} TO {{end_date}}]",
            server.uri()
        )))
        .unwrap();

    let report = common::harvester(source, store.clone(), "2020-01-01T00:00:00.000Z")
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages, 2);
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn test_probav_derives_identifier_from_urn() {
    let server = MockServer::start().await;

    let probav_entry = r#"  <entry>
    <identifier>urn:ogc:def:EOP:VITO:PROBAV_S5_TOC_1KM_V001:PROBAV_S5_TOC_20200101_1KM_V101</identifier>
    <date name="ingestiondate">2020-01-02T00:00:00Z</date>
  </entry>
"#
    .to_string();

    Mock::given(method("GET"))
        .and(path("/vito/search"))
        .and(query_param("start", "2020-01-01"))
        .and(query_param("end", ""))
        .respond_with(atom(atom_page(&[probav_entry], None)))
        .expect(1)
        .mount(&server)
        .await;

    let store = common::memory_store();
    let source = SourceKind::ProbaV
        .build(&SourceOptions::new(format!(
            "{}/vito/search?start={{start_date}}&end={{end_date}}",
            server.uri()
        )))
        .unwrap();

    let report = common::harvester(source, store.clone(), "2020-01-01")
        .run()
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    let record = store
        .get("PROBAV_S5_TOC_1KM_V001_PROBAV_S5_TOC_20200101_1KM_V101")
        .unwrap()
        .unwrap();
    assert_eq!(record.source_date, "2020-01-02T00:00:00Z");
}

#[tokio::test]
async fn test_gap_detection_walks_months_until_today() {
    let server = MockServer::start().await;

    for (from, missing) in [
        ("2023-01-15", vec!["2023-01-20"]),
        ("2023-02-01", vec![]),
        ("2023-03-01", vec![]),
    ] {
        Mock::given(method("GET"))
            .and(path("/missing/O3"))
            .and(query_param("from", from))
            .respond_with(json(missing_dates(&missing)))
            .expect(1)
            .mount(&server)
            .await;
    }

    let store = common::memory_store();
    let options = SourceOptions::new(format!(
        "{}/missing/{{coverage}}?from={{start_date}}",
        server.uri()
    ))
    .coverage("O3")
    .today(NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
    let source = SourceKind::Gome2.build(&options).unwrap();

    let report = common::harvester(source, store.clone(), "2023-01-15")
        .run()
        .await
        .unwrap();

    // 17 January days minus one missing, all of February, 1 March
    assert_eq!(report.pages, 3);
    assert_eq!(report.inserted, 16 + 28 + 1);

    assert!(store.get("O3_2023-01-20").unwrap().is_none());
    let record = store.get("O3_2023-01-15").unwrap().unwrap();
    assert_eq!(record.source_date, "2023-01-15");
    assert_eq!(record.content, None);

    assert_eq!(
        store.max_source_date(HARVESTER).unwrap().as_deref(),
        Some("2023-03-01")
    );
}

#[tokio::test]
async fn test_from_config_sends_basic_auth() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(atom(atom_page(&[entry("AUTH_1", "2020-01-01T00:00:00Z")], None)))
        .expect(1)
        .mount(&server)
        .await;

    let toml = format!(
        r#"
harvester_name = "{HARVESTER}"
source_name = "secured"
source = "opensearch"
database = "{}"
url_template = "{}/search?from={{start_date}}"
start_date = "2020-01-01"
timeout = 5

[auth]
username = "user"
password = "pass"
"#,
        dir.path().join("items.db").display(),
        server.uri()
    );
    let config = HarvesterConfig::from_toml(&toml).unwrap();
    config.validate().unwrap();

    let store = open_sqlite_store(&config.database).unwrap();
    let report = Harvester::from_config(&config, store.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(store.get("AUTH_1").unwrap().unwrap().source, "secured");
}
