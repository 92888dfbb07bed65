use thiserror::Error;

/// The eight error kinds a configuration pass can surface, per the
/// controller's documented propagation policy: these are fatal before
/// any agent is contacted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration source not found or unreadable: {0}")]
    ConfigNotFound(String),

    #[error("unsupported configuration format for '{0}' (expected .json, .yml, or .yaml)")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to fetch configuration over HTTP: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
