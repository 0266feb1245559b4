use std::collections::HashMap;
use std::sync::Arc;

use chain_types::RawRecord;
use chain_types::testing::aggregate_record;
use data::{FetchPipelineError, PayloadFetcher, PipelineOptions, ProgressPhase, write_payload};
use serde_json::json;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Fragments of a header-bearing first group: the 14 header slots, then the data url prefix.
fn header_group(content: &str) -> Vec<String> {
    let mut parts = vec!["owner".to_owned(), "id-42".into(), "serial-7".into(), "a message".into()];
    parts.extend((1..=10).map(|i| format!("x{i}")));
    parts.push(format!("data:text/html;base64,{content}"));
    parts
}

fn records() -> Vec<RawRecord> {
    let first = header_group("PGgxPkhp");
    let first: Vec<&str> = first.iter().map(String::as_str).collect();

    let mut records = vec![
        aggregate_record(0, &first),
        aggregate_record(1, &["PC9oMT4", "8cD5vazwvcD4="]),
        aggregate_record(2, &["PGJyPg=="]),
    ];
    records.sort_by(|a, b| b.id.cmp(&a.id));
    records
}

struct Index(Arc<Vec<RawRecord>>);

impl Respond for Index {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "offset")
            .map(|(_, v)| v.into_owned());
        let data: Vec<_> = match offset {
            None => self.0.iter().take(2).collect(),
            Some(cursor) => self.0.iter().filter(|r| r.id.as_deref().unwrap() < cursor.as_str()).take(2).collect(),
        };
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

struct Bodies(Arc<HashMap<String, RawRecord>>);

impl Respond for Bodies {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let hash = request.url.path().rsplit('/').next().unwrap_or_default();
        match self.0.get(hash) {
            Some(r) => ResponseTemplate::new(200).set_body_json(r),
            None => ResponseTemplate::new(404),
        }
    }
}

async fn replica(records: &Arc<Vec<RawRecord>>, healthy: bool) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/records/confirmed"))
        .and(query_param("address", "TADDR"))
        .respond_with(Index(records.clone()))
        .mount(&server)
        .await;

    let body_mock = Mock::given(method("GET")).and(path_regex(r"^/records/confirmed/[0-9A-F]+$"));
    if healthy {
        let by_hash = records.iter().map(|r| (r.content_hash().unwrap().to_owned(), r.clone())).collect();
        body_mock.respond_with(Bodies(Arc::new(by_hash))).mount(&server).await;
    } else {
        body_mock.respond_with(ResponseTemplate::new(502)).mount(&server).await;
    }

    server
}

fn options() -> PipelineOptions {
    PipelineOptions {
        page_size: 10,
        concurrency: 2,
        retries: 2,
        base_delay_ms: 1,
        ..PipelineOptions::default()
    }
}

#[tokio::test]
async fn test_download_from_replicas() {
    let records = Arc::new(records());
    let healthy = replica(&records, true).await;
    let broken = replica(&records, false).await;

    let fetcher = PayloadFetcher::from_endpoints([healthy.uri(), broken.uri()]).unwrap();
    let outcome = fetcher.download("TADDR", &options()).await.unwrap();

    assert_eq!(outcome.refs.len(), 3);
    assert!(outcome.failed.is_empty());

    let reconstruction = &outcome.reconstruction;
    assert_eq!(reconstruction.header.mime_type, "text/html");
    assert_eq!(reconstruction.header.owner, "owner");
    assert_eq!(reconstruction.header.id, "id-42");
    assert_eq!(reconstruction.header.message, "a message");
    assert_eq!(
        reconstruction.payload_text(),
        "data:text/html;base64,PGgxPkhpPC9oMT48cD5vazwvcD4=PGJyPg=="
    );
    assert_eq!(reconstruction.header.size, reconstruction.payload.len());
    assert!(reconstruction.report.gap_analysis.as_ref().unwrap().is_complete);

    let progress = fetcher.get_progress();
    assert_eq!(progress.phase, ProgressPhase::Complete);
    assert_eq!(progress.current_step, 3);

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("payload.b64");
    let written = write_payload(&out, reconstruction, true).unwrap();
    assert_eq!(std::fs::read(&out).unwrap(), b"PGgxPkhpPC9oMT48cD5vazwvcD4=PGJyPg==");
    assert_eq!(written, 36);

    let whole = dir.path().join("payload.txt");
    write_payload(&whole, reconstruction, false).unwrap();
    assert_eq!(std::fs::read(&whole).unwrap(), reconstruction.payload);
}

#[tokio::test]
async fn test_index_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/records/confirmed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = PayloadFetcher::from_endpoints([server.uri()]).unwrap();
    let err = fetcher.download("TADDR", &options()).await.unwrap_err();

    assert!(matches!(err, FetchPipelineError::EnumerationError(_)));
    assert_eq!(fetcher.get_progress().phase, ProgressPhase::FetchingList);
}
