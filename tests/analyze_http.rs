//! HTTP API tests: spawn the server on an ephemeral port and call it with reqwest.

mod common;

use common::{reply_with_chart, setup_data_root, ScriptedModel};
use json_visualizer::config::Config;
use json_visualizer::server::run_server_on;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

struct TestServer {
    base: String,
    model: Arc<ScriptedModel>,
    _tmp: TempDir,
}

async fn spawn(model: ScriptedModel) -> TestServer {
    let (tmp, cfg) = setup_data_root();
    spawn_with(tmp, cfg, model).await
}

async fn spawn_with(tmp: TempDir, cfg: Config, model: ScriptedModel) -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let model = Arc::new(model);
    let served = model.clone();
    tokio::spawn(async move {
        run_server_on(listener, &cfg, served).await.unwrap();
    });
    TestServer {
        base: format!("http://{}", addr),
        model,
        _tmp: tmp,
    }
}

async fn post_analyze(server: &TestServer, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_list_files_local() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let resp = reqwest::get(format!(
        "{}/list_files?source_type=local&prefix=run_&max_files=2",
        server.base
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["files"][0]["key"], "run_1.json");
    assert_eq!(body["files"][1]["key"], "run_2.json");
    assert!(body["files"][0]["size"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_list_files_s3_without_bucket() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let resp = reqwest::get(format!("{}/list_files?source_type=s3", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("bucket_name"));
}

#[tokio::test]
async fn test_analyze_with_chart() {
    let server = spawn(ScriptedModel::replying(&reply_with_chart(
        "Two runs passed and one failed.",
        r#"{"chart_type": "pie", "fields": ["status"], "aggregation": "distinct"}"#,
    )))
    .await;

    let (status, body) = post_analyze(
        &server,
        json!({
            "source_type": "local",
            "prefix": "run_",
            "max_files": 10,
            "query": "How many runs failed?"
        }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["message"], "Two runs passed and one failed.");
    assert_eq!(body["success"], true);
    assert_eq!(body["files_processed"], 3);
    assert_eq!(body["total_files_found"], 4);
    assert!(body.get("visualization_error").is_none());

    let trace = &body["visualization"]["data"][0];
    assert_eq!(trace["type"], "pie");
    assert_eq!(trace["labels"], json!(["pass", "fail"]));
    assert_eq!(trace["values"], json!([2.0, 1.0]));
    assert_eq!(
        body["visualization"]["layout"]["template"],
        "plotly_white"
    );
    assert_eq!(server.model.calls(), 1);
}

#[tokio::test]
async fn test_analyze_dark_mode_recolors() {
    let reply = reply_with_chart(
        "Status breakdown.",
        r#"{"chart_type": "bar", "fields": ["status"], "aggregation": "distinct"}"#,
    );
    let server = spawn(ScriptedModel::replying(&reply)).await;
    let base = json!({ "prefix": "run_", "query": "Status breakdown" });

    let (_, light) = post_analyze(&server, base.clone()).await;
    let mut dark_body = base;
    dark_body["dark_mode"] = json!(true);
    let (_, dark) = post_analyze(&server, dark_body).await;

    let (l, d) = (&light["visualization"], &dark["visualization"]);
    assert_eq!(l["data"][0]["x"], d["data"][0]["x"]);
    assert_eq!(l["data"][0]["y"], d["data"][0]["y"]);
    assert_eq!(d["layout"]["template"], "plotly_dark");
    assert_ne!(l["layout"]["paper_bgcolor"], d["layout"]["paper_bgcolor"]);
}

#[tokio::test]
async fn test_analyze_missing_field_keeps_answer() {
    let server = spawn(ScriptedModel::replying(&reply_with_chart(
        "No coverage data.",
        r#"{"chart_type": "bar", "fields": ["coverage"], "aggregation": "mean"}"#,
    )))
    .await;

    let (status, body) = post_analyze(&server, json!({ "query": "Average coverage?" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "No coverage data.");
    assert!(body.get("visualization").is_none());
    assert!(body["visualization_error"]
        .as_str()
        .unwrap()
        .contains("coverage"));
}

#[tokio::test]
async fn test_analyze_s3_without_bucket() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let (status, body) =
        post_analyze(&server, json!({ "source_type": "s3", "query": "anything" })).await;
    assert_eq!(status, 400);
    assert!(body["detail"].is_string());
    assert_eq!(server.model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_empty_query() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let (status, body) = post_analyze(&server, json!({ "query": "  " })).await;
    assert_eq!(status, 400);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_analyze_no_files() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = Config::minimal();
    cfg.sources.local.root = tmp.path().to_path_buf();
    let server = spawn_with(tmp, cfg, ScriptedModel::replying("unused")).await;

    let (status, body) = post_analyze(&server, json!({ "query": "anything" })).await;
    assert_eq!(status, 404);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_analyze_nothing_loaded() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let (status, body) =
        post_analyze(&server, json!({ "prefix": "run_4", "query": "anything" })).await;
    assert_eq!(status, 422);
    assert!(body["detail"].is_string());
    assert_eq!(server.model.calls(), 0);
}

#[tokio::test]
async fn test_analyze_model_failure() {
    let server = spawn(ScriptedModel::failing("connection refused")).await;
    let (status, body) = post_analyze(&server, json!({ "query": "anything" })).await;
    assert_eq!(status, 502);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_analyze_malformed_body() {
    let server = spawn(ScriptedModel::replying("unused")).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/analyze", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].is_string());
}
