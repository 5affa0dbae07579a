use thiserror::Error;

/// Unified error type for the node agent
#[derive(Error, Debug)]
pub enum NodeError {
    /// Invalid process configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener descriptor could not be built
    #[error("Inbound build error: {0}")]
    Build(String),

    /// Proxy engine rejected or could not perform an operation
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Remote panel request failed
    #[error("Panel API error: {0}")]
    Api(String),

    /// Some per-user operations in a sync cycle failed
    #[error("{failed} of {attempted} user operations failed")]
    PartialSync { failed: usize, attempted: usize },

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the proxy engine capability traits
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("no such inbound tag: {0}")]
    UnknownInbound(String),

    #[error("inbound tag already exists: {0}")]
    DuplicateInbound(String),

    #[error("handler {0} does not implement user management")]
    NotUserManager(String),

    #[error("user {0} already exists")]
    UserExists(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("invalid account for {email}: {reason}")]
    InvalidAccount { email: String, reason: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, NodeError>;
