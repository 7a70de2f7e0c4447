//! Error types.

use crate::LaneId;

/// An error raised while building or running a simulation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A geometric construction has no well defined result,
    /// e.g. normalising a zero vector or intersecting parallel lines.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
    /// The road network description is inconsistent.
    #[error("invalid network: {0}")]
    InvalidNetwork(String),
    /// A lane ID does not refer to a lane in the network.
    #[error("unknown lane {0:?}")]
    UnknownLane(LaneId),
    /// A snapshot could not be written or read.
    #[cfg(feature = "serde")]
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// A specialised result type for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;
