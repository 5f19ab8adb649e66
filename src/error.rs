use thiserror::Error;

/// Failures surfaced by the proof-of-work solver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("invalid solver config: {0}")]
    InvalidConfig(String),
    #[error("difficulty {0} outside supported range 0-40")]
    InvalidDifficulty(u32),
    #[error("nonce space exhausted without a matching hash")]
    Exhausted,
}

/// Failures from loading or validating client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level client failures: configuration, TLS setup, connection
/// establishment, or a fatal solver error inside the session.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tls setup failed: {0}")]
    Tls(#[from] rustls::Error),
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
    #[error("no private key found in {0}")]
    NoPrivateKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection failed after {attempts} attempts, last error: {last}")]
    ConnectFailed { attempts: u32, last: String },
    #[error("proof-of-work solver failed: {0}")]
    Solve(#[from] SolveError),
}
