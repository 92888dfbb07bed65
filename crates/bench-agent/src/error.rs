use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent refused to start job '{job}' on {endpoint}: {source}")]
    StartFailed {
        job: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Transient HTTP failure; the caller retries by continuing to poll.
    /// Escalates to `StartFailed` only if the agent's last observed state
    /// was `Failed`.
    #[error("transient transport error talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("trace download failed for {endpoint}: {source}")]
    TraceFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("agent at {endpoint} returned unexpected status {status}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    #[error("failed to write downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
