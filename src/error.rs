use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("policy not found: {0}")]
    NotFound(String),

    #[error("cannot modify system policy: {0}")]
    ImmutablePolicy(String),

    #[error("Invalid action format: {0}")]
    InvalidAction(String),

    #[error("Invalid resource pattern: {0}")]
    InvalidResource(String),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Invalid policy effect: {0} (expected ALLOW or DENY)")]
    InvalidEffect(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Policy store could not be reached or returned a failure
    #[error("Policy store error: {0}")]
    Store(String),

    /// Group membership lookup failed
    #[error("Group lookup error: {0}")]
    GroupLookup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PolicyError {
    /// True for failures of the engine's collaborators rather than of the
    /// caller's input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, PolicyError::Store(_) | PolicyError::GroupLookup(_))
    }
}

pub type Result<T> = std::result::Result<T, PolicyError>;
