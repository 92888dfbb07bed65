//! The typed model materialized only after template evaluation completes
//! (per design note: avoid mirroring this shape while the tree is still
//! heterogeneous and templated).

use crate::error::{ConfigError, Result};
use crate::value::ConfigValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "dockerFile")]
    pub docker_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "dockerLoad")]
    pub docker_load: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "localFolder")]
    pub local_folder: Option<String>,
}

impl JobSource {
    pub fn is_empty(&self) -> bool {
        self.project.is_none()
            && self.docker_file.is_none()
            && self.docker_load.is_none()
            && self.local_folder.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    #[serde(skip_serializing_if = "Option::is_none", rename = "requiredOperatingSystem")]
    pub required_operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "requiredArchitecture")]
    pub required_architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "traceOutput")]
    pub trace_output: Option<String>,
    #[serde(default, rename = "discardResults")]
    pub discard_results: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    #[serde(default)]
    pub source: JobSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default, rename = "waitForExit")]
    pub wait_for_exit: bool,
    #[serde(default)]
    pub options: JobOptions,
    #[serde(default, rename = "dotNetTrace")]
    pub dot_net_trace: bool,
    #[serde(default)]
    pub collect: bool,
    #[serde(default)]
    pub variables: ConfigValue,
    #[serde(default, rename = "selfContained")]
    pub self_contained: bool,
    #[serde(default)]
    pub service: String,
    #[serde(default = "default_driver_version", rename = "driverVersion")]
    pub driver_version: i64,
    #[serde(default, rename = "runId")]
    pub run_id: String,
}

fn default_driver_version() -> i64 {
    2
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    pub jobs: IndexMap<String, JobTemplate>,
    pub variables: ConfigValue,
}

impl JobTemplate {
    /// Build a typed job from the assembled tree entry at `service_key`,
    /// after PatchObject/profile/override/template passes have all run.
    pub fn from_value(service_key: &str, value: &ConfigValue) -> Result<Self> {
        let source = value
            .get_ci("source")
            .map(parse_source)
            .unwrap_or_default();
        let executable = value.get_ci("executable").and_then(|v| v.as_str()).map(str::to_string);

        if source.is_empty() && executable.is_none() {
            return Err(ConfigError::ConfigInvalid(format!(
                "job '{service_key}' has no source descriptor (project|executable|dockerFile|dockerLoad)"
            )));
        }

        let endpoints: Vec<String> = value
            .get_ci("endpoints")
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if endpoints.is_empty() {
            return Err(ConfigError::ConfigInvalid(format!(
                "job '{service_key}' declares no endpoints"
            )));
        }

        let options = value
            .get_ci("options")
            .map(parse_options)
            .unwrap_or_default();

        Ok(JobTemplate {
            source,
            executable,
            endpoints,
            wait_for_exit: value.get_ci("waitForExit").and_then(|v| v.as_bool()).unwrap_or(false),
            options,
            dot_net_trace: value.get_ci("dotNetTrace").and_then(|v| v.as_bool()).unwrap_or(false),
            collect: value.get_ci("collect").and_then(|v| v.as_bool()).unwrap_or(false),
            variables: value.get_ci("variables").cloned().unwrap_or(ConfigValue::empty_object()),
            self_contained: value.get_ci("selfContained").and_then(|v| v.as_bool()).unwrap_or(false),
            service: value
                .get_ci("service")
                .and_then(|v| v.as_str())
                .unwrap_or(service_key)
                .to_string(),
            driver_version: value
                .get_ci("driverVersion")
                .and_then(|v| v.as_f64())
                .map(|n| n as i64)
                .unwrap_or(2),
            run_id: value.get_ci("runId").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
    }
}

fn parse_source(value: &ConfigValue) -> JobSource {
    JobSource {
        project: value.get_ci("project").and_then(|v| v.as_str()).map(str::to_string),
        docker_file: value.get_ci("dockerFile").and_then(|v| v.as_str()).map(str::to_string),
        docker_load: value.get_ci("dockerLoad").and_then(|v| v.as_str()).map(str::to_string),
        local_folder: value.get_ci("localFolder").and_then(|v| v.as_str()).map(str::to_string),
    }
}

fn parse_options(value: &ConfigValue) -> JobOptions {
    JobOptions {
        required_operating_system: value
            .get_ci("requiredOperatingSystem")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        required_architecture: value
            .get_ci("requiredArchitecture")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        trace_output: value.get_ci("traceOutput").and_then(|v| v.as_str()).map(str::to_string),
        discard_results: value.get_ci("discardResults").and_then(|v| v.as_bool()).unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn job_value() -> ConfigValue {
        let mut m = IndexMap::new();
        m.insert("executable".to_string(), ConfigValue::Str("echo".into()));
        m.insert(
            "endpoints".to_string(),
            ConfigValue::Array(vec![ConfigValue::Str("http://a/".into())]),
        );
        m.insert("waitForExit".to_string(), ConfigValue::Bool(true));
        ConfigValue::Object(m)
    }

    #[test]
    fn builds_job_template_from_value() {
        let job = JobTemplate::from_value("srv", &job_value()).unwrap();
        assert_eq!(job.executable.as_deref(), Some("echo"));
        assert!(job.wait_for_exit);
        assert_eq!(job.driver_version, 2);
    }

    #[test]
    fn rejects_job_with_no_source_descriptor() {
        let mut m = IndexMap::new();
        m.insert(
            "endpoints".to_string(),
            ConfigValue::Array(vec![ConfigValue::Str("http://a/".into())]),
        );
        let err = JobTemplate::from_value("srv", &ConfigValue::Object(m)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigInvalid(_)));
    }

    #[test]
    fn rejects_job_with_no_endpoints() {
        let mut m = IndexMap::new();
        m.insert("executable".to_string(), ConfigValue::Str("echo".into()));
        let err = JobTemplate::from_value("srv", &ConfigValue::Object(m)).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigInvalid(_)));
    }
}
