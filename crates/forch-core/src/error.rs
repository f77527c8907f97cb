use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForchError {
    #[error("backlog not found: create {0} in the project root")]
    BacklogNotFound(String),

    #[error("backlog changed on disk: block at {start}..={end} no longer matches feature '{feature}'")]
    OffsetMismatch {
        feature: String,
        start: usize,
        end: usize,
    },

    #[error("invalid transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },

    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("verification cancelled")]
    Cancelled,

    #[error("verification task crashed: {0}")]
    TaskCrashed(String),

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("data directory not found: set HOME or pass an explicit skills directory")]
    DataDirNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, ForchError>;
