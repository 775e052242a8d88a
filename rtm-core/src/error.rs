//! Error types for the RTM core
//!
//! Every failure carries an [`ErrorKind`] so callers can tell a lookup miss
//! apart from a simulated backend rejection without parsing messages.

use thiserror::Error;

use crate::service::ServiceOp;

/// Coarse classification of an [`RtmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A node, requirement or item lookup failed
    NotFound,
    /// The target exists but cannot take part in the operation
    InvalidTarget,
    /// A simulated service rejected the request
    Rejected,
    /// The operation was cancelled before it resolved
    Cancelled,
    /// The same kind of operation is already in flight
    Busy,
}

/// Errors raised by the navigation, table, gap analysis and service layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RtmError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Node is not a folder: {0}")]
    NotAFolder(String),

    #[error("Path broken at depth {depth}: '{missing_id}' is not a folder at that level")]
    PathBroken { depth: usize, missing_id: String },

    #[error("Requirement not found: {0}")]
    RequirementNotFound(String),

    #[error("Unlinked item not found: {0}")]
    ItemNotFound(String),

    #[error("Item {0} has no recommendation to accept")]
    NoRecommendation(String),

    #[error("{op} rejected: {reason}")]
    ServiceRejected { op: ServiceOp, reason: String },

    #[error("{0} was cancelled")]
    Cancelled(ServiceOp),

    #[error("{0} is already in progress")]
    Busy(ServiceOp),
}

impl RtmError {
    /// Returns the coarse kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            RtmError::NodeNotFound(_)
            | RtmError::PathBroken { .. }
            | RtmError::RequirementNotFound(_)
            | RtmError::ItemNotFound(_) => ErrorKind::NotFound,
            RtmError::DuplicateNodeId(_)
            | RtmError::NotAFolder(_)
            | RtmError::NoRecommendation(_) => ErrorKind::InvalidTarget,
            RtmError::ServiceRejected { .. } => ErrorKind::Rejected,
            RtmError::Cancelled(_) => ErrorKind::Cancelled,
            RtmError::Busy(_) => ErrorKind::Busy,
        }
    }
}

/// Result alias used throughout the core
pub type RtmResult<T> = std::result::Result<T, RtmError>;
