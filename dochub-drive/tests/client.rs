use dochub_core::{
    Category, HierarchyNode, NodeKey, ResolvedPath, RunStatus, SuppliersByCategory, resolve,
};
use dochub_drive::{DriveClient, DriveErrorClass};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_paths() -> Vec<ResolvedPath> {
    let hierarchy = vec![
        HierarchyNode::new(NodeKey::Tenders, 0),
        HierarchyNode::new(NodeKey::Category, 1),
    ];
    let categories = vec![Category {
        id: "c1".to_string(),
        title: "Zemní práce".to_string(),
    }];
    resolve(&hierarchy, &categories, &SuppliersByCategory::new()).paths
}

#[tokio::test]
async fn resolve_root_posts_bearer_token_and_reference() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/structure/resolve-root"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "projectId": "p1",
            "url": "https://drive.example.com/f/abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rootId": "root-42",
            "rootName": "Projekt Alfa",
            "rootWebUrl": "https://drive.example.com/web/root-42"
        })))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let root = client
        .resolve_root("p1", "https://drive.example.com/f/abc")
        .await
        .unwrap();

    assert_eq!(root.root_id, "root-42");
    assert_eq!(root.root_name, "Projekt Alfa");
    assert_eq!(
        root.root_web_url.as_deref(),
        Some("https://drive.example.com/web/root-42")
    );
}

#[tokio::test]
async fn start_job_submits_resolved_paths() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/structure/jobs"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "projectId": "p1",
            "runId": "run-1",
            "rootId": "root-42",
            "paths": [
                {"segments": ["03_Vyberova_rizeni"], "sourceNodeId": "tenders"},
                {
                    "segments": ["03_Vyberova_rizeni", "Zemni_prace"],
                    "sourceNodeId": "category",
                    "binding": {"entityKind": "category", "entityId": "c1"}
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "jobId": "job-7"
        })))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let job = client
        .start_job("p1", "run-1", "root-42", &sample_paths())
        .await
        .unwrap();

    assert_eq!(job.job_id, "job-7");
}

#[tokio::test]
async fn poll_job_parses_row_shaped_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/structure/jobs/job-7"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "running",
            "step": "Creating folders",
            "progress_percent": 40,
            "total_actions": 5,
            "completed_actions": 2,
            "logs": ["✔ 01_PD", "↻ 03_Vyberova_rizeni"],
            "error": null,
            "started_at": "2026-08-20T10:00:00Z",
            "finished_at": null
        })))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let snapshot = client.poll_job("job-7").await.unwrap();

    assert_eq!(snapshot.status, RunStatus::Running);
    assert_eq!(snapshot.step.as_deref(), Some("Creating folders"));
    assert_eq!(snapshot.progress_percent, 40);
    assert_eq!(snapshot.total_actions, Some(5));
    assert_eq!(snapshot.completed_actions, 2);
    assert_eq!(snapshot.logs.len(), 2);
    assert!(!snapshot.is_terminal());
}

#[tokio::test]
async fn snapshot_with_finish_time_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/structure/jobs/job-8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "progress_percent": 100,
            "completed_actions": 5,
            "total_actions": 5,
            "logs": [],
            "finished_at": "2026-08-20T10:00:09Z"
        })))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let snapshot = client.poll_job("job-8").await.unwrap();

    assert_eq!(snapshot.status, RunStatus::Success);
    assert!(snapshot.is_terminal());
}

#[tokio::test]
async fn auth_failures_classify_as_auth_and_do_not_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/structure/resolve-root"))
        .respond_with(ResponseTemplate::new(401).set_body_string("missing token"))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "bad-token").unwrap();
    let error = client
        .resolve_root("p1", "https://drive.example.com/f/abc")
        .await
        .unwrap_err();

    assert_eq!(error.classification(), Some(DriveErrorClass::Auth));
    assert!(!error.is_retryable());
    assert!(error.to_string().contains("missing token"));
}

#[tokio::test]
async fn missing_roots_classify_as_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/structure/resolve-root"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such folder"))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let error = client
        .resolve_root("p1", "https://drive.example.com/f/gone")
        .await
        .unwrap_err();

    assert_eq!(error.classification(), Some(DriveErrorClass::NotFound));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/structure/jobs/job-9"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = DriveClient::new(&server.uri(), "test-token").unwrap();
    let error = client.poll_job("job-9").await.unwrap_err();

    assert_eq!(error.classification(), Some(DriveErrorClass::Transient));
    assert!(error.is_retryable());
}
