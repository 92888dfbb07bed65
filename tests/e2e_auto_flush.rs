//! End-to-end coverage of `ExecutionEngine::run` in auto-flush streaming
//! mode: a single job, a single delimiter arriving on the first poll,
//! producing exactly one flushed result document.

mod support;

use bench_config::{Configuration, JobOptions, JobSource, JobTemplate};
use bench_engine::{ExecutionEngine, RunParams};
use support::CallLog;

fn streaming_job(endpoint: String) -> JobTemplate {
    JobTemplate {
        source: JobSource {
            project: Some("demo".to_string()),
            ..Default::default()
        },
        executable: None,
        endpoints: vec![endpoint],
        wait_for_exit: true,
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

#[tokio::test(flavor = "multi_thread")]
async fn auto_flush_emits_one_document_per_delimiter() {
    let (endpoint, log) = support::spawn_fake_agent(|method, path, _body, log: &CallLog| {
        log.lock().unwrap().push(format!("{method} {path}"));
        match (method, path) {
            ("GET", "/health") => json_ok(serde_json::json!({})),
            ("GET", "/info") => json_ok(serde_json::json!({"os": "linux", "arch": "x64"})),
            ("POST", "/jobs") => json_ok(serde_json::json!({"id": "stream-1"})),
            ("GET", "/jobs/stream-1") => json_ok(serde_json::json!({
                "state": "Stopped",
                "measurements": [
                    {
                        "name": "latency",
                        "timestamp": "2024-01-01T00:00:00Z",
                        "value": 12.5,
                        "isDelimiter": false
                    },
                    {
                        "name": "iteration",
                        "timestamp": "2024-01-01T00:00:01Z",
                        "value": 0,
                        "isDelimiter": true
                    }
                ],
                "metadata": [
                    {
                        "name": "latency",
                        "source": "client",
                        "shortDescription": "request latency",
                        "format": null,
                        "aggregate": "Avg",
                        "reduce": "Avg"
                    }
                ]
            })),
            ("POST", "/jobs/stream-1/flush") => json_ok(serde_json::json!({})),
            ("POST", "/jobs/stream-1/stop") => json_ok(serde_json::json!({})),
            ("GET", "/jobs/stream-1/assets") => (404, "{}".to_string()),
            ("DELETE", "/jobs/stream-1") => json_ok(serde_json::json!({})),
            _ => (404, "{}".to_string()),
        }
    })
    .await;

    let mut jobs = indexmap::IndexMap::new();
    jobs.insert("stream".to_string(), streaming_job(endpoint));
    let configuration = Configuration { jobs, variables: Default::default() };
    let dependencies = vec!["stream".to_string()];

    let engine = ExecutionEngine::new();
    let result = engine
        .run(
            &configuration,
            &dependencies,
            &RunParams {
                auto_flush: true,
                ..RunParams::default()
            },
        )
        .await
        .expect("auto-flush run completes");

    assert_eq!(result.return_code, 0);
    let job_result = result.job_results.jobs.get("stream").expect("stream job result present");
    assert!(job_result.results.contains_key("latency"));

    let calls = log.lock().unwrap().clone();
    assert!(calls.contains(&"POST /jobs/stream-1/flush".to_string()));
    assert!(calls.contains(&"DELETE /jobs/stream-1".to_string()));
}
