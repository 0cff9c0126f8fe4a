//! End-to-end tests of the HTTP surface
//!
//! Drives the full filter stack with `warp::test`, using the built-in
//! modules and in-memory collaborators from `agent_modules::testing`.

use agent_modules::api::{routes, ApiState, Authenticator};
use agent_modules::modules::{ModuleRegistry, ModuleServices};
use agent_modules::testing::mocks::{mock_services, MockDatastore, MockLlmProvider};
use agent_modules::Dispatcher;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;

const KEY: &str = "test-shared-secret";

fn state_with(services: ModuleServices, key: Option<&str>) -> ApiState {
    let dispatcher = Dispatcher::new(Arc::new(ModuleRegistry::with_builtin_modules()), services);
    ApiState::new(
        Arc::new(dispatcher),
        Authenticator::new(key.map(str::to_string)),
        "x-api-key",
    )
}

async fn post_execute(state: ApiState, body: Value) -> (StatusCode, Value) {
    let api = routes(state);
    let res = warp::test::request()
        .method("POST")
        .path("/execute")
        .header("x-api-key", KEY)
        .json(&body)
        .reply(&api)
        .await;
    let body = serde_json::from_slice(res.body()).unwrap();
    (res.status(), body)
}

#[tokio::test]
async fn test_protected_routes_reject_missing_key() {
    let api = routes(state_with(ModuleServices::default(), Some(KEY)));

    for (method, path) in [("GET", "/modules"), ("POST", "/execute"), ("GET", "/metrics")] {
        let res = warp::test::request()
            .method(method)
            .path(path)
            .json(&json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {}}))
            .reply(&api)
            .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["detail"], "Invalid API key");
    }
}

#[tokio::test]
async fn test_wrong_key_is_rejected() {
    let api = routes(state_with(ModuleServices::default(), Some(KEY)));
    let res = warp::test::request()
        .path("/modules")
        .header("x-api-key", "not-the-key")
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_open_routes_need_no_key() {
    let api = routes(state_with(ModuleServices::default(), Some(KEY)));

    for path in ["/", "/health"] {
        let res = warp::test::request().path(path).reply(&api).await;
        assert_eq!(res.status(), StatusCode::OK, "{path}");
    }
}

#[tokio::test]
async fn test_permissive_mode_accepts_any_caller() {
    let api = routes(state_with(ModuleServices::default(), None));
    let res = warp::test::request().path("/modules").reply(&api).await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_modules_catalog_lists_schemas() {
    let api = routes(state_with(ModuleServices::default(), Some(KEY)));
    let res = warp::test::request()
        .path("/modules")
        .header("x-api-key", KEY)
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    let catalog = body.as_array().unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0]["id"], "nlp_processor");
    assert_eq!(catalog[1]["id"], "data_processor");
    for entry in catalog {
        assert!(entry["input_schema"].is_object());
        assert!(entry["description"].as_str().is_some_and(|d| !d.is_empty()));
    }
}

#[tokio::test]
async fn test_unknown_module_is_failed_envelope_with_200() {
    let (status, body) = post_execute(
        state_with(ModuleServices::default(), Some(KEY)),
        json!({"module_id": "bogus", "org_id": "o", "input_data": {}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["output"], Value::Null);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("bogus"));
    assert!(error.contains("nlp_processor"));
    assert!(error.contains("data_processor"));
}

#[tokio::test]
async fn test_clean_operation_drops_incomplete_rows() {
    let (status, body) = post_execute(
        state_with(ModuleServices::default(), Some(KEY)),
        json!({
            "module_id": "data_processor",
            "org_id": "org-1",
            "input_data": {"data": [{"a": 1}, {"a": null}], "operation": "clean"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["error"], Value::Null);
    let output = &body["output"];
    assert_eq!(output["original_rows"], 2);
    assert_eq!(output["cleaned_rows"], 1);
    assert_eq!(output["rows_removed"], 1);
    assert_eq!(output["cleaned_data"], json!([{"a": 1}]));
}

#[tokio::test]
async fn test_missing_data_is_domain_failure() {
    let (status, body) = post_execute(
        state_with(ModuleServices::default(), Some(KEY)),
        json!({"module_id": "data_processor", "org_id": "o", "input_data": {}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error"], "No data provided for processing");
}

#[tokio::test]
async fn test_repeated_requests_get_distinct_ids_and_identical_output() {
    let state = state_with(ModuleServices::default(), Some(KEY));

    for input in [
        json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {"text": "héllo wörld"}}),
        json!({
            "module_id": "data_processor",
            "org_id": "o",
            "input_data": {"data": [{"x": 1.5}, {"x": 2.5}], "operation": "summary"}
        }),
    ] {
        let (_, first) = post_execute(state.clone(), input.clone()).await;
        let (_, second) = post_execute(state.clone(), input).await;

        assert_eq!(first["status"], "completed");
        assert_ne!(first["execution_id"], second["execution_id"]);
        assert_eq!(first["output"], second["output"]);
    }
}

#[tokio::test]
async fn test_mock_nlp_counts_characters() {
    let (_, body) = post_execute(
        state_with(ModuleServices::default(), None),
        json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {"text": "héllo"}}),
    )
    .await;

    let output = &body["output"];
    assert_eq!(output["character_count"], 5);
    assert_eq!(output["model"], "mock");
    assert_eq!(
        output["processed_text"],
        "[NLP Processing] Text analyzed: 5 characters"
    );
}

#[tokio::test]
async fn test_llm_failure_is_reported_as_failed_envelope() {
    let llm: Arc<dyn agent_modules::llm::LlmProvider> = Arc::new(MockLlmProvider::with_failure());
    let services = ModuleServices::default().with_llm(Some(llm));

    let (status, body) = post_execute(
        state_with(services, None),
        json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {"text": "hi"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("OpenAI processing failed"));
}

#[tokio::test]
async fn test_execution_is_audited_with_task_id() {
    let datastore = Arc::new(MockDatastore::new());
    let (_, body) = post_execute(
        state_with(mock_services(datastore.clone()), None),
        json!({
            "module_id": "data_processor",
            "org_id": "org-9",
            "task_id": "task-7",
            "input_data": {"data": [{"a": 1}], "operation": "summary"}
        }),
    )
    .await;

    assert_eq!(body["status"], "completed");
    let rows = datastore.inserted();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].org_id, "org-9");
    assert_eq!(rows[0].module_id, "data_processor");
    assert_eq!(rows[0].task_id.as_deref(), Some("task-7"));
    assert_eq!(datastore.open_connections(), 0);
}

#[tokio::test]
async fn test_audit_failure_does_not_change_response() {
    let datastore = Arc::new(MockDatastore::failing_inserts());
    let (status, body) = post_execute(
        state_with(mock_services(datastore.clone()), None),
        json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {"text": "hi"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(datastore.open_connections(), 0);
}

#[tokio::test]
async fn test_missing_envelope_field_is_400() {
    let api = routes(state_with(ModuleServices::default(), None));
    let res = warp::test::request()
        .method("POST")
        .path("/execute")
        .json(&json!({"module_id": "nlp_processor", "input_data": {}}))
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_reports_executions() {
    let state = state_with(ModuleServices::default(), Some(KEY));
    post_execute(
        state.clone(),
        json!({"module_id": "nlp_processor", "org_id": "o", "input_data": {"text": "x"}}),
    )
    .await;

    let api = routes(state);
    let res = warp::test::request()
        .path("/metrics")
        .header("x-api-key", KEY)
        .reply(&api)
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert!(body["executions"]["received"].as_u64().unwrap() >= 1);
}
