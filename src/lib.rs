//! Benchctl orchestration library.
//!
//! Wires the three core subsystems together: [`bench_config`] assembles a
//! concrete [`Configuration`](bench_config::Configuration), [`bench_engine`]
//! drives it through the agent lifecycle, and [`bench_metrics`] turns the
//! collected measurements into a result document.

use bench_config::{AssembleRequest, ConfigAssembler, ConfigValue};
use bench_engine::{ExecutionEngine, RunParams};
use bench_metrics::ExecutionResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid key=value pair: '{0}'")]
    InvalidKeyValue(String),
    #[error("invalid --span duration '{0}', expected HH:mm:ss")]
    InvalidSpan(String),
    #[error(transparent)]
    Config(#[from] bench_config::ConfigError),
    #[error(transparent)]
    Engine(#[from] bench_engine::EngineError),
    #[error(transparent)]
    Sink(#[from] bench_metrics::SinkError),
}

pub type Result<T> = std::result::Result<T, RunError>;

pub struct RunRequest {
    pub configs: Vec<String>,
    pub scenario: Option<String>,
    pub jobs: Vec<String>,
    pub profiles: Vec<String>,
    pub output: Option<PathBuf>,
    pub variables: ConfigValue,
    pub properties: HashMap<String, String>,
    pub overrides: Vec<(String, String)>,
    pub session: String,
    pub description: Option<String>,
    pub run_id: String,
    pub iterations: Option<u32>,
    pub span: Option<Duration>,
    pub repeat: Option<String>,
    pub auto_flush: bool,
    pub no_measurements: bool,
    pub no_metadata: bool,
    pub sql: Option<String>,
    pub table: String,
    pub compare: Vec<PathBuf>,
}

/// `--variable K=V`: integer-looking values are parsed as integers, the
/// rest stay strings.
pub fn parse_variables(raw: &[String]) -> ConfigValue {
    let mut map = indexmap::IndexMap::new();
    for entry in raw {
        if let Some((key, value)) = entry.split_once('=') {
            let parsed = match value.parse::<i64>() {
                Ok(n) => ConfigValue::Num(n as f64),
                Err(_) => ConfigValue::Str(value.to_string()),
            };
            map.insert(key.to_string(), parsed);
        }
    }
    ConfigValue::Object(map)
}

/// `--property K=V`, attached verbatim to `jobResults.properties`.
pub fn parse_key_values(raw: &[String]) -> Result<HashMap<String, String>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| RunError::InvalidKeyValue(entry.clone()))
        })
        .collect()
}

/// `HH:mm:ss` wall-clock duration.
pub fn parse_span(raw: &str) -> Result<Duration> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [hours, minutes, seconds] = parts[..] else {
        return Err(RunError::InvalidSpan(raw.to_string()));
    };
    let hours: u64 = hours.parse().map_err(|_| RunError::InvalidSpan(raw.to_string()))?;
    let minutes: u64 = minutes.parse().map_err(|_| RunError::InvalidSpan(raw.to_string()))?;
    let seconds: u64 = seconds.parse().map_err(|_| RunError::InvalidSpan(raw.to_string()))?;
    Ok(Duration::from_secs(hours * 3600 + minutes * 60 + seconds))
}

/// `--sql`/`--table`: if the literal value names a defined environment
/// variable, substitute its content.
pub fn resolve_env_alias(raw: &str) -> String {
    std::env::var(raw).unwrap_or_else(|_| raw.to_string())
}

pub async fn run(request: RunRequest) -> Result<ExecutionResult> {
    let scenario = request.scenario.clone();
    let assembler = ConfigAssembler::new();
    let assemble_request = AssembleRequest {
        sources: request.configs,
        scenario: request.scenario,
        custom_jobs: request.jobs,
        overrides: request.overrides,
        cli_variables: request.variables,
        profiles: request.profiles,
        run_id: request.run_id.clone(),
    };
    let assembled = assembler.assemble(&assemble_request).await?;

    info!(
        session = %request.session,
        run_id = %request.run_id,
        dependencies = ?assembled.dependencies,
        "assembled configuration"
    );

    let engine = ExecutionEngine::new();
    engine.preflight(&assembled.configuration, &assembled.dependencies).await?;

    let mut properties = request.properties;
    properties.insert("session".to_string(), request.session.clone());
    properties.insert("runId".to_string(), request.run_id.clone());
    if let Some(description) = &request.description {
        properties.insert("description".to_string(), description.clone());
    }
    if !request.compare.is_empty() {
        let joined = request
            .compare
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",");
        properties.insert("compareAgainst".to_string(), joined);
    }

    let params = RunParams {
        iterations: request.iterations.unwrap_or(1),
        span: request.span,
        repeat_anchor: request.repeat,
        auto_flush: request.auto_flush,
        output: request.output,
        no_measurements: request.no_measurements,
        no_metadata: request.no_metadata,
        properties,
    };

    let result = engine.run(&assembled.configuration, &assembled.dependencies, &params).await?;

    if request.sql.is_some() {
        let sink = bench_metrics::NoOpSqlSink { table: request.table.clone() };
        bench_metrics::SqlSink::write_row(
            &sink,
            &request.session,
            scenario.as_deref(),
            request.description.as_deref(),
            &request.run_id,
            &result,
        )?;
    }

    if !request.compare.is_empty() {
        info!(count = request.compare.len(), "comparison against prior result documents requested but not evaluated here");
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_variables_coerces_integer_looking_values() {
        let vars = parse_variables(&["port=8080".to_string(), "name=svc".to_string()]);
        let obj = vars.as_object().unwrap();
        assert_eq!(obj.get("port").unwrap().as_f64(), Some(8080.0));
        assert_eq!(obj.get("name").unwrap().as_str(), Some("svc"));
    }

    #[test]
    fn parse_span_converts_to_seconds() {
        assert_eq!(parse_span("00:05:30").unwrap(), Duration::from_secs(5 * 60 + 30));
    }

    #[test]
    fn parse_span_rejects_malformed_input() {
        assert!(parse_span("5 minutes").is_err());
    }

    #[test]
    fn parse_key_values_requires_equals_sign() {
        assert!(parse_key_values(&["novalue".to_string()]).is_err());
    }

    #[test]
    fn resolve_env_alias_falls_back_to_literal() {
        assert_eq!(resolve_env_alias("BENCHCTL_DEFINITELY_UNSET_VAR"), "BENCHCTL_DEFINITELY_UNSET_VAR");
    }
}
