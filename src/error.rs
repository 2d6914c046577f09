//! Error taxonomy for the client.
//!
//! Local validation failures never reach the network; transport, server and
//! contract failures leave the session untouched. `Stale` marks a response
//! that arrived after the session moved on and was dropped.

use thiserror::Error;

/// Rejected environment parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("grid must be at least 2x2 (got {width}x{height})")]
    GridTooSmall { width: i64, height: i64 },

    #[error("grid {width}x{height} exceeds {max} states")]
    GridTooLarge { width: i64, height: i64, max: usize },

    #[error("start cell ({x}, {y}) is outside the {width}x{height} grid")]
    StartOutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("target cell ({x}, {y}) is outside the {width}x{height} grid")]
    TargetOutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("start and target must be different cells")]
    StartEqualsTarget,

    #[error("forbidden cell ({x}, {y}) is outside the {width}x{height} grid")]
    ForbiddenOutOfBounds { x: i64, y: i64, width: u32, height: u32 },

    #[error("forbidden cell ({x}, {y}) is already listed")]
    DuplicateForbidden { x: i64, y: i64 },

    #[error("start cell cannot be forbidden")]
    ForbiddenOnStart,

    #[error("target cell cannot be forbidden")]
    ForbiddenOnTarget,

    #[error("action set is empty")]
    NoActions,

    #[error("action {0} listed more than once")]
    DuplicateAction(&'static str),

    #[error("not a valid coordinate: {0:?}")]
    InvalidCoordinate(String),

    #[error("unknown algorithm: {0:?}")]
    UnknownAlgorithm(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid environment: {0}")]
    Config(#[from] ConfigError),

    #[error("iteration {requested} is out of range (recorded: {total})")]
    OutOfRange { requested: i64, total: u32 },

    #[error("not a valid iteration number: {0:?}")]
    InvalidIteration(String),

    #[error("environment not initialized")]
    NotInitialized,

    #[error("no policy displayed; run the solver first")]
    NoPolicy,

    #[error("no iterations recorded yet")]
    NoIterations,

    #[error("solver already converged after {0} iterations")]
    Converged(u32),

    #[error("another solver request is still in flight")]
    Busy,

    #[error("stop the running simulation or animation first")]
    DriverActive,

    #[error("solver unreachable: {0}")]
    Transport(String),

    #[error("solver error: {0}")]
    Server(String),

    #[error("malformed solver response: {0}")]
    Contract(String),

    #[error("response discarded: the session moved on")]
    Stale,

    #[error("settings: {0}")]
    Settings(String),
}

impl ClientError {
    /// True for failures detected before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Config(_)
                | ClientError::OutOfRange { .. }
                | ClientError::InvalidIteration(_)
                | ClientError::NotInitialized
                | ClientError::NoPolicy
                | ClientError::NoIterations
                | ClientError::Converged(_)
                | ClientError::Busy
                | ClientError::DriverActive
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}
