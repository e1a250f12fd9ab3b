use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// Both sides define the same node and the active policy forbids replacing it
    #[error("Conflicting definitions at {path}")]
    Conflict { path: String },

    /// Removal template expects a different shape than the graph holds
    #[error("Removal template {path} is {expected} but the original field is not")]
    ShapeMismatch { path: String, expected: &'static str },

    #[error("Invalid removal template at {path}: {reason}")]
    InvalidTemplate { path: String, reason: String },

    #[error("No exposure set for {0}")]
    EmptyExposure(String),

    #[error("Unresolved {kind} target: {name}")]
    Unresolved { kind: &'static str, name: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict { path: path.into() }
    }

    pub fn invalid_template(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
