//! Drives the dependency list through its lifecycle (spec.md §4.3).
//!
//! Operations against the distinct endpoints of *one* job are fanned out
//! and awaited together (`futures::future::join_all`) — a peer failing
//! never stops a sibling endpoint from completing its own start/stop.
//! Operations across *different* jobs within one iteration stay strictly
//! sequential, in dependency order.

use crate::dependency::span_should_keep_running;
use crate::error::{EngineError, Result};
use crate::trace::trace_destination;
use bench_agent::{JobConnection, JobConnectionOps, JobState, MeasurementMetadata};
use bench_config::{Configuration, JobTemplate};
use bench_metrics::{aggregate_agent, normalize, reduce_across_agents, ExecutionResult, JobResult, JobResults, ResultSink};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct RunParams {
    pub iterations: u32,
    pub span: Option<Duration>,
    pub repeat_anchor: Option<String>,
    pub auto_flush: bool,
    pub output: Option<PathBuf>,
    pub no_measurements: bool,
    pub no_metadata: bool,
    pub properties: HashMap<String, String>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            span: None,
            repeat_anchor: None,
            auto_flush: false,
            output: None,
            no_measurements: false,
            no_metadata: false,
            properties: HashMap::new(),
        }
    }
}

type Connections = Vec<Arc<dyn JobConnectionOps>>;

pub struct ExecutionEngine {
    client: reqwest::Client,
    stop_requested: Arc<AtomicBool>,
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionEngine {
    pub fn new() -> Self {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let watcher = stop_requested.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl-c received, stopping after the current pass");
                watcher.store(true, Ordering::SeqCst);
            }
        });
        Self {
            client: JobConnection::build_client(),
            stop_requested,
        }
    }

    fn connections_for(&self, job: &JobTemplate) -> Connections {
        job.endpoints
            .iter()
            .map(|endpoint| Arc::new(JobConnection::new(self.client.clone(), endpoint.clone())) as Arc<dyn JobConnectionOps>)
            .collect()
    }

    /// Validate source/executable presence and probe every endpoint
    /// within a 10s deadline (enforced by `JobConnectionOps::preflight`).
    pub async fn preflight(&self, configuration: &Configuration, dependencies: &[String]) -> Result<()> {
        for job_name in dependencies {
            let job = configuration
                .jobs
                .get(job_name)
                .ok_or_else(|| EngineError::UnknownJob(job_name.clone()))?;
            if job.source.is_empty() && job.executable.is_none() {
                return Err(EngineError::PreflightFailed {
                    endpoint: job_name.clone(),
                    reason: "no source or executable declared".to_string(),
                });
            }
            if job.endpoints.is_empty() {
                return Err(EngineError::PreflightFailed {
                    endpoint: job_name.clone(),
                    reason: "no endpoints declared".to_string(),
                });
            }
            for endpoint in &job.endpoints {
                let connection = JobConnection::new(self.client.clone(), endpoint.clone());
                connection.preflight().await.map_err(|source| EngineError::PreflightFailed {
                    endpoint: endpoint.clone(),
                    reason: source.to_string(),
                })?;
            }
        }
        Ok(())
    }

    pub async fn run(&self, configuration: &Configuration, dependencies: &[String], params: &RunParams) -> Result<ExecutionResult> {
        if params.auto_flush {
            self.run_auto_flush(configuration, dependencies, params).await
        } else {
            self.run_iterative(configuration, dependencies, params).await
        }
    }

    async fn run_iterative(&self, configuration: &Configuration, dependencies: &[String], params: &RunParams) -> Result<ExecutionResult> {
        let mut running: HashMap<String, Connections> = HashMap::new();
        let mut last_result = ExecutionResult::empty();
        let run_start = Instant::now();

        loop {
            let mut failure_observed = false;
            let span_active = params.span.map(|span| run_start.elapsed() < span).unwrap_or(false);

            'dependencies: for _ in 0..params.iterations.max(1) {
                for job_name in dependencies {
                    let job = configuration
                        .jobs
                        .get(job_name)
                        .ok_or_else(|| EngineError::UnknownJob(job_name.clone()))?;
                    let keep_alive = span_should_keep_running(job_name, dependencies, params.repeat_anchor.as_deref(), span_active);

                    if running.contains_key(job_name) && keep_alive {
                        if !job.wait_for_exit {
                            if let Some(conns) = running.get(job_name) {
                                futures::future::join_all(conns.iter().map(|c| c.clear_measurements())).await;
                            }
                        }
                    } else {
                        let connections = self.connections_for(job);
                        let infos = futures::future::join_all(connections.iter().map(|c| c.get_info())).await;
                        let satisfies_requirements = infos.iter().all(|info| match info {
                            Ok(info) => info.satisfies(job.options.required_operating_system.as_deref(), job.options.required_architecture.as_deref()),
                            Err(_) => false,
                        });
                        if !satisfies_requirements {
                            info!(job = %job_name, "agent requirements not satisfied, skipping scenario");
                            return Ok(ExecutionResult::empty());
                        }

                        let template = serde_json::to_value(job).unwrap_or(serde_json::Value::Null);
                        let start_results = futures::future::join_all(connections.iter().map(|c| c.start(job_name, &template))).await;
                        for result in start_results {
                            if let Err(source) = result {
                                return Err(EngineError::StartFailed {
                                    job: job_name.clone(),
                                    source,
                                });
                            }
                        }

                        if job.wait_for_exit {
                            let terminal_states = poll_until_terminal(&connections).await;
                            stop_drain_delete(job_name, &connections).await;
                            if terminal_states.iter().any(|s| matches!(s, Ok(state) if *state == JobState::Failed)) {
                                warn!(job = %job_name, "job reported Failed, aborting iteration");
                                failure_observed = true;
                                break 'dependencies;
                            }
                        } else {
                            running.insert(job_name.clone(), connections);
                        }
                    }

                    if let Some(conns) = running.get(job_name) {
                        let states = futures::future::join_all(conns.iter().map(|c| c.get_state())).await;
                        if states.iter().any(|s| matches!(s, Ok(state) if *state == JobState::Failed)) {
                            warn!(job = %job_name, "job reported Failed, aborting iteration");
                            failure_observed = true;
                            break 'dependencies;
                        }
                    }
                }
            }

            self.collect_traces(configuration, dependencies, &running, span_active, params).await;

            for job_name in dependencies.iter().rev() {
                let job = configuration.jobs.get(job_name).ok_or_else(|| EngineError::UnknownJob(job_name.clone()))?;
                let keep_alive = span_should_keep_running(job_name, dependencies, params.repeat_anchor.as_deref(), span_active);
                if !job.wait_for_exit && !keep_alive {
                    if let Some(conns) = running.remove(job_name) {
                        stop_drain_delete(job_name, &conns).await;
                    }
                }
            }

            let job_results = self.aggregate(dependencies, &running, params).await;
            last_result = ExecutionResult {
                job_results,
                return_code: 0,
            }
            .with_failure_observed(failure_observed);

            if let Some(output) = &params.output {
                let path = if params.span.is_some() {
                    ResultSink::next_rotated_path(output)
                } else {
                    output.clone()
                };
                ResultSink::write(&path, &last_result)?;
            }

            let span_over = match params.span {
                None => true,
                Some(span) => run_start.elapsed() >= span,
            };
            if span_over || self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
        }

        Ok(last_result)
    }

    async fn run_auto_flush(&self, configuration: &Configuration, dependencies: &[String], params: &RunParams) -> Result<ExecutionResult> {
        if dependencies.len() != 1 {
            return Err(EngineError::AutoFlushPrecondition);
        }
        let job_name = dependencies[0].clone();
        let job = configuration
            .jobs
            .get(&job_name)
            .ok_or_else(|| EngineError::UnknownJob(job_name.clone()))?;
        if job.endpoints.len() != 1 {
            return Err(EngineError::AutoFlushPrecondition);
        }
        let span_budget = params.span.filter(|span| *span > Duration::ZERO);
        if !job.wait_for_exit && span_budget.is_none() {
            return Err(EngineError::AutoFlushPrecondition);
        }

        let connection: Arc<dyn JobConnectionOps> = Arc::new(JobConnection::new(self.client.clone(), job.endpoints[0].clone()));
        let template = serde_json::to_value(job).unwrap_or(serde_json::Value::Null);
        connection
            .start(&job_name, &template)
            .await
            .map_err(|source| EngineError::StartFailed { job: job_name.clone(), source })?;

        let start_time = Instant::now();
        let mut last_result = ExecutionResult::empty();

        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let snapshot = connection.try_update().await?;
            let mut stop = snapshot.state.is_terminal();
            if let Some(span) = span_budget {
                if start_time.elapsed() >= span {
                    stop = true;
                }
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                stop = true;
            }

            if let Some(mut batch) = connection.queue().drain_through_first_delimiter() {
                connection.flush_measurements().await?;
                let mut metadata: Vec<MeasurementMetadata> = snapshot.metadata.clone();
                normalize(&mut metadata, &mut batch);
                let summary = aggregate_agent(&batch, &metadata);
                let reduced = reduce_across_agents(&[summary], &metadata);
                let mut jobs = HashMap::new();
                jobs.insert(
                    job_name.clone(),
                    JobResult {
                        results: reduced,
                        metadata: if params.no_metadata { Vec::new() } else { metadata },
                        measurements: if params.no_measurements { Vec::new() } else { vec![batch] },
                        environment: HashMap::new(),
                    },
                );
                last_result = ExecutionResult {
                    job_results: JobResults {
                        jobs,
                        properties: params.properties.clone(),
                    },
                    return_code: 0,
                };
                if let Some(output) = &params.output {
                    let path = ResultSink::next_rotated_path(output);
                    ResultSink::write(&path, &last_result)?;
                }
            }

            if stop {
                break;
            }
        }

        stop_drain_delete(&job_name, std::slice::from_ref(&connection)).await;
        Ok(last_result)
    }

    async fn collect_traces(
        &self,
        configuration: &Configuration,
        dependencies: &[String],
        running: &HashMap<String, Connections>,
        span_active: bool,
        params: &RunParams,
    ) {
        for job_name in dependencies {
            let Some(job) = configuration.jobs.get(job_name) else { continue };
            let keep_alive = span_should_keep_running(job_name, dependencies, params.repeat_anchor.as_deref(), span_active);
            if keep_alive || !(job.dot_net_trace || job.collect) {
                continue;
            }
            let Some(connections) = running.get(job_name) else { continue };
            for connection in connections {
                let os = connection.get_info().await.map(|info| info.os).unwrap_or_else(|_| "linux".to_string());
                let destination = trace_destination(job_name, job.options.trace_output.as_deref(), job.collect, &os, Utc::now());
                if let Err(error) = connection.download_dotnet_trace(&destination).await {
                    warn!(job = %job_name, %error, "trace download failed, continuing");
                }
            }
        }
    }

    async fn aggregate(&self, dependencies: &[String], running: &HashMap<String, Connections>, params: &RunParams) -> JobResults {
        let mut jobs = HashMap::new();
        for job_name in dependencies {
            let Some(connections) = running.get(job_name) else { continue };
            let mut per_agent_summaries = Vec::new();
            let mut per_agent_measurements = Vec::new();
            let mut metadata: Vec<MeasurementMetadata> = Vec::new();

            for connection in connections {
                let snapshot = connection.try_update().await.ok();
                let mut measurements = snapshot
                    .as_ref()
                    .map(|s| s.measurements.clone())
                    .unwrap_or_else(|| connection.queue().snapshot());
                let mut agent_metadata = snapshot.map(|s| s.metadata).unwrap_or_default();
                if metadata.is_empty() {
                    metadata = agent_metadata.clone();
                }
                normalize(&mut agent_metadata, &mut measurements);
                per_agent_summaries.push(aggregate_agent(&measurements, &agent_metadata));
                per_agent_measurements.push(measurements);
            }

            let results = reduce_across_agents(&per_agent_summaries, &metadata);
            jobs.insert(
                job_name.clone(),
                JobResult {
                    results,
                    metadata: if params.no_metadata { Vec::new() } else { metadata },
                    measurements: if params.no_measurements { Vec::new() } else { per_agent_measurements },
                    environment: HashMap::new(),
                },
            );
        }
        JobResults {
            jobs,
            properties: params.properties.clone(),
        }
    }
}

async fn poll_until_terminal(connections: &[Arc<dyn JobConnectionOps>]) -> Vec<bench_agent::Result<JobState>> {
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let states = futures::future::join_all(connections.iter().map(|c| c.get_state())).await;
        if states.iter().all(|s| matches!(s, Ok(state) if state.is_terminal())) {
            return states;
        }
    }
}

/// The stop → tryUpdate → downloadAssets → delete sequence repeated at
/// every job-teardown point in the algorithm (spec.md §4.3).
async fn stop_drain_delete(job_name: &str, connections: &[Arc<dyn JobConnectionOps>]) {
    futures::future::join_all(connections.iter().map(|c| c.stop())).await;
    futures::future::join_all(connections.iter().map(|c| c.try_update())).await;
    futures::future::join_all(connections.iter().map(|c| c.download_assets(job_name, Path::new(".")))).await;
    futures::future::join_all(connections.iter().map(|c| c.delete())).await;
}
