//! Wire types for the agent protocol (spec.md §4.4, §6). The agent itself
//! is an external collaborator; only the shape it speaks is owned here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    New,
    Initializing,
    Waiting,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
    Deleted,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Stopped | JobState::Failed | JobState::Deleted)
    }
}

/// Reduction applied to one agent's samples (`aggregate`) or across
/// per-agent aggregates (`reduce`) for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    All,
    First,
    Last,
    Avg,
    Count,
    Max,
    Median,
    Min,
    Sum,
    Delta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
    #[serde(rename = "isDelimiter", default)]
    pub is_delimiter: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementMetadata {
    pub name: String,
    pub source: String,
    #[serde(rename = "shortDescription")]
    pub short_description: String,
    /// Numeric format hint, `"object"` (not numerically reducible), or
    /// `"json"` (string to be parsed before aggregation, then rewritten
    /// to `"object"`).
    pub format: Option<String>,
    pub aggregate: Operation,
    pub reduce: Operation,
}

/// Snapshot returned by `tryUpdateJobAsync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub state: JobState,
    #[serde(default)]
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub metadata: Vec<MeasurementMetadata>,
}

/// `GetInfo` response: at minimum OS/arch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub os: String,
    pub arch: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AgentInfo {
    pub fn satisfies(&self, required_os: Option<&str>, required_arch: Option<&str>) -> bool {
        let os_ok = required_os
            .map(|req| req.eq_ignore_ascii_case(&self.os))
            .unwrap_or(true);
        let arch_ok = required_arch
            .map(|req| req.eq_ignore_ascii_case(&self.arch))
            .unwrap_or(true);
        os_ok && arch_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_exactly_stopped_failed_deleted() {
        assert!(JobState::Stopped.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Deleted.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::New.is_terminal());
    }

    #[test]
    fn agent_info_satisfies_matches_case_insensitively() {
        let info = AgentInfo {
            os: "Linux".to_string(),
            arch: "x64".to_string(),
            extra: Default::default(),
        };
        assert!(info.satisfies(Some("linux"), Some("X64")));
        assert!(!info.satisfies(Some("windows"), None));
        assert!(info.satisfies(None, None));
    }
}
