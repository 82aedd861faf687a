//! Daemon-level fault taxonomy (§10.2). Wraps the engine's own error type
//! and adds the process-level failure modes (config I/O, HTTP bind).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to parse config file: {0}")]
    ConfigFileParsingError(#[from] toml::de::Error),

    #[error("failed to write config file: {0}")]
    ConfigWriteError(#[source] std::io::Error),

    #[error("failed to bind http listener: {0}")]
    BindError(#[source] std::io::Error),

    #[error(transparent)]
    Engine(#[from] emm_attach::EngineError),
}
