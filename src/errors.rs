use thiserror::Error;

use crate::types::ObjectId;

/// Errors that can occur while collecting relation members and assembling areas.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Pending-reference bookkeeping disagrees with itself. Always fatal.
    #[error("invariant violation: {message} (relation: {relation_id}, member: {member_id:?})")]
    Invariant {
        message: String,
        relation_id: ObjectId,
        member_id: Option<ObjectId>,
    },

    #[error("buffer capacity exceeded: {required} bytes required, capacity is {capacity}")]
    Capacity { required: usize, capacity: usize },

    #[error("buffer error: {message} (offset: {offset})")]
    Buffer { message: String, offset: usize },

    #[error("phase error: {message}")]
    Phase { message: String },

    #[error("input error: {message} (line: {line:?})")]
    Input { message: String, line: Option<usize> },

    #[error("assembler error: {message} (object: {object_id})")]
    Assembler { message: String, object_id: ObjectId },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias for results using `CollectorError`.
pub type Result<T> = std::result::Result<T, CollectorError>;
