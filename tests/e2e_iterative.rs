//! End-to-end coverage of `ExecutionEngine::run` in iterative mode
//! against a hand rolled fake agent, standing in for scenarios where a
//! single `waitForExit` job runs to completion, and where a two-job
//! pipeline stops its dependencies in reverse order once the job that
//! waits for exit finishes.

mod support;

use bench_config::{Configuration, JobOptions, JobSource, JobTemplate};
use bench_engine::{ExecutionEngine, RunParams};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use support::{spawn_fake_agent, CallLog};

fn minimal_job(endpoint: String, wait_for_exit: bool) -> JobTemplate {
    JobTemplate {
        source: JobSource {
            project: Some("demo".to_string()),
            ..Default::default()
        },
        executable: None,
        endpoints: vec![endpoint],
        wait_for_exit,
        options: JobOptions::default(),
        dot_net_trace: false,
        collect: false,
        variables: Default::default(),
        self_contained: false,
        service: "demo".to_string(),
        driver_version: 2,
        run_id: String::new(),
    }
}

fn json_ok(body: serde_json::Value) -> (u16, String) {
    (200, body.to_string())
}

#[tokio::test]
async fn single_wait_for_exit_job_runs_to_completion() {
    let running_calls = Arc::new(AtomicU32::new(0));
    let calls_for_handler = running_calls.clone();

    let (endpoint, log) = spawn_fake_agent(move |method, path, _body, log: &CallLog| {
        log.lock().unwrap().push(format!("{method} {path}"));
        match (method, path) {
            ("GET", "/health") => json_ok(serde_json::json!({})),
            ("GET", "/info") => json_ok(serde_json::json!({"os": "linux", "arch": "x64"})),
            ("POST", "/jobs") => json_ok(serde_json::json!({"id": "job-1"})),
            ("GET", "/jobs/job-1/state") => {
                let n = calls_for_handler.fetch_add(1, Ordering::SeqCst);
                let state = if n < 1 { "Running" } else { "Stopped" };
                json_ok(serde_json::json!(state))
            }
            ("GET", "/jobs/job-1") => json_ok(serde_json::json!({
                "state": "Stopped",
                "measurements": [],
                "metadata": [],
            })),
            ("POST", "/jobs/job-1/stop") => json_ok(serde_json::json!({})),
            ("GET", "/jobs/job-1/assets") => (404, "{}".to_string()),
            ("DELETE", "/jobs/job-1") => json_ok(serde_json::json!({})),
            _ => (404, "{}".to_string()),
        }
    })
    .await;

    let mut jobs = indexmap::IndexMap::new();
    jobs.insert("bench".to_string(), minimal_job(endpoint, true));
    let configuration = Configuration { jobs, variables: Default::default() };
    let dependencies = vec!["bench".to_string()];

    let engine = ExecutionEngine::new();
    engine.preflight(&configuration, &dependencies).await.expect("preflight succeeds");

    let result = engine
        .run(&configuration, &dependencies, &RunParams::default())
        .await
        .expect("run completes");

    assert_eq!(result.return_code, 0);
    let calls = log.lock().unwrap().clone();
    assert!(calls.contains(&"POST /jobs".to_string()));
    assert!(calls.contains(&"POST /jobs/job-1/stop".to_string()));
    assert!(calls.contains(&"DELETE /jobs/job-1".to_string()));
}

#[tokio::test]
async fn two_job_pipeline_stops_dependencies_in_reverse_order() {
    let (upstream_endpoint, upstream_log) = spawn_fake_agent(|method, path, _body, log: &CallLog| {
        log.lock().unwrap().push(format!("{method} {path}"));
        match (method, path) {
            ("GET", "/health") => json_ok(serde_json::json!({})),
            ("GET", "/info") => json_ok(serde_json::json!({"os": "linux", "arch": "x64"})),
            ("POST", "/jobs") => json_ok(serde_json::json!({"id": "upstream-1"})),
            ("GET", "/jobs/upstream-1") => json_ok(serde_json::json!({
                "state": "Running",
                "measurements": [],
                "metadata": [],
            })),
            ("POST", "/jobs/upstream-1/clear") => json_ok(serde_json::json!({})),
            ("POST", "/jobs/upstream-1/stop") => json_ok(serde_json::json!({})),
            ("GET", "/jobs/upstream-1/assets") => (404, "{}".to_string()),
            ("DELETE", "/jobs/upstream-1") => json_ok(serde_json::json!({})),
            _ => (404, "{}".to_string()),
        }
    })
    .await;

    let downstream_calls = Arc::new(AtomicU32::new(0));
    let downstream_calls_for_handler = downstream_calls.clone();
    let (downstream_endpoint, downstream_log) = spawn_fake_agent(move |method, path, _body, log: &CallLog| {
        log.lock().unwrap().push(format!("{method} {path}"));
        match (method, path) {
            ("GET", "/health") => json_ok(serde_json::json!({})),
            ("GET", "/info") => json_ok(serde_json::json!({"os": "linux", "arch": "x64"})),
            ("POST", "/jobs") => json_ok(serde_json::json!({"id": "downstream-1"})),
            ("GET", "/jobs/downstream-1/state") => {
                let n = downstream_calls_for_handler.fetch_add(1, Ordering::SeqCst);
                let state = if n < 1 { "Running" } else { "Stopped" };
                json_ok(serde_json::json!(state))
            }
            ("GET", "/jobs/downstream-1") => json_ok(serde_json::json!({
                "state": "Stopped",
                "measurements": [],
                "metadata": [],
            })),
            ("POST", "/jobs/downstream-1/stop") => json_ok(serde_json::json!({})),
            ("GET", "/jobs/downstream-1/assets") => (404, "{}".to_string()),
            ("DELETE", "/jobs/downstream-1") => json_ok(serde_json::json!({})),
            _ => (404, "{}".to_string()),
        }
    })
    .await;

    let mut jobs = indexmap::IndexMap::new();
    jobs.insert("upstream".to_string(), minimal_job(upstream_endpoint, false));
    jobs.insert("downstream".to_string(), minimal_job(downstream_endpoint, true));
    let configuration = Configuration { jobs, variables: Default::default() };
    let dependencies = vec!["upstream".to_string(), "downstream".to_string()];

    let engine = ExecutionEngine::new();
    let result = engine
        .run(&configuration, &dependencies, &RunParams::default())
        .await
        .expect("pipeline run completes");

    assert_eq!(result.return_code, 0);
    assert!(downstream_log.lock().unwrap().contains(&"POST /jobs/downstream-1/stop".to_string()));
    assert!(upstream_log.lock().unwrap().contains(&"POST /jobs/upstream-1/stop".to_string()));
}

#[tokio::test]
async fn wait_for_exit_job_terminating_failed_sets_nonzero_return_code() {
    let (endpoint, _log) = spawn_fake_agent(|method, path, _body, log: &CallLog| {
        log.lock().unwrap().push(format!("{method} {path}"));
        match (method, path) {
            ("GET", "/health") => json_ok(serde_json::json!({})),
            ("GET", "/info") => json_ok(serde_json::json!({"os": "linux", "arch": "x64"})),
            ("POST", "/jobs") => json_ok(serde_json::json!({"id": "job-1"})),
            ("GET", "/jobs/job-1/state") => json_ok(serde_json::json!("Failed")),
            ("GET", "/jobs/job-1") => json_ok(serde_json::json!({
                "state": "Failed",
                "measurements": [],
                "metadata": [],
            })),
            ("POST", "/jobs/job-1/stop") => json_ok(serde_json::json!({})),
            ("GET", "/jobs/job-1/assets") => (404, "{}".to_string()),
            ("DELETE", "/jobs/job-1") => json_ok(serde_json::json!({})),
            _ => (404, "{}".to_string()),
        }
    })
    .await;

    let mut jobs = indexmap::IndexMap::new();
    jobs.insert("bench".to_string(), minimal_job(endpoint, true));
    let configuration = Configuration { jobs, variables: Default::default() };
    let dependencies = vec!["bench".to_string()];

    let engine = ExecutionEngine::new();
    let result = engine
        .run(&configuration, &dependencies, &RunParams::default())
        .await
        .expect("run completes despite the job failing");

    assert_eq!(result.return_code, 1);
}
