//! Output shapes produced by aggregation (spec.md §3).

use bench_agent::{Measurement, MeasurementMetadata};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One job's contribution to a run: summary values keyed by measurement
/// name, the metadata that drove aggregation, the raw per-agent streams
/// (one inner vector per endpoint, in endpoint order), and any environment
/// facts reported by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    pub results: HashMap<String, serde_json::Value>,
    pub metadata: Vec<MeasurementMetadata>,
    pub measurements: Vec<Vec<Measurement>>,
    pub environment: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResults {
    pub jobs: HashMap<String, JobResult>,
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "jobResults")]
    pub job_results: JobResults,
    #[serde(rename = "returnCode")]
    pub return_code: i32,
}

impl ExecutionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// §9 open-question resolution: nonzero iff at least one dependency
    /// observed `Failed` in this invocation.
    pub fn with_failure_observed(mut self, failed: bool) -> Self {
        self.return_code = if failed { 1 } else { 0 };
        self
    }
}
