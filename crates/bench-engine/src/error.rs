use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("preflight failed for endpoint {endpoint}: {reason}")]
    PreflightFailed { endpoint: String, reason: String },

    #[error("job '{job}' could not be started: {source}")]
    StartFailed {
        job: String,
        #[source]
        source: bench_agent::AgentError,
    },

    #[error("auto-flush mode requires exactly one dependency with exactly one endpoint")]
    AutoFlushPrecondition,

    #[error("--iterations and --span are mutually exclusive")]
    ConflictingIterationSpan,

    #[error("job '{0}' referenced in dependencies has no template in the assembled configuration")]
    UnknownJob(String),

    #[error(transparent)]
    Config(#[from] bench_config::ConfigError),

    #[error(transparent)]
    Agent(#[from] bench_agent::AgentError),

    #[error(transparent)]
    Sink(#[from] bench_metrics::SinkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
