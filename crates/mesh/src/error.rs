//! Error types for MeshRoute mesh operations.
//!
//! Each concern has its own error enum so call sites can match on exactly
//! what they handle; [`MeshError`] aggregates them for callers that only
//! need to report.

use meshroute_core::NodeAddress;
use thiserror::Error;

/// Errors produced while decoding a command frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Datagram carried no tag byte
    #[error("Empty frame")]
    Empty,

    /// First byte matches no known command
    #[error("Unknown command tag 0x{0:02x}")]
    UnknownTag(u8),

    /// Payload length violates the command's size contract
    #[error("Unexpected payload size {len} for {command}")]
    InvalidSize {
        /// Command name
        command: &'static str,
        /// Offending payload length in bytes
        len: usize,
    },
}

/// Errors produced by the routing table store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Attempted table is larger than the store's capacity
    #[error("Routing table of {len} entries exceeds capacity {capacity}")]
    CapacityExceeded {
        /// Attempted number of entries
        len: usize,
        /// Store capacity
        capacity: usize,
    },
}

/// Point-to-point send failures reported by the link layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Send did not complete within its timeout
    #[error("Send to {0} timed out")]
    Timeout(NodeAddress),

    /// Destination is not known to the link layer
    #[error("Destination {0} unreachable")]
    Unreachable(NodeAddress),

    /// Link layer reported a failure code
    #[error("Link error code {0}")]
    Link(i32),
}

impl TransportError {
    /// Numeric code for log lines; 0 is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            TransportError::Timeout(_) => -1,
            TransportError::Unreachable(_) => -2,
            TransportError::Link(code) => *code,
        }
    }
}

/// Status publication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// Sink is not connected
    #[error("Status sink disconnected")]
    Disconnected,

    /// Publish was refused
    #[error("Publish to {topic} failed: {reason}")]
    Rejected {
        /// Topic the publish targeted
        topic: String,
        /// Failure description
        reason: String,
    },
}

/// Sensor acquisition failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// Bus transaction failed
    #[error("Sensor bus error: {0}")]
    Bus(String),
}

/// Errors that can occur in mesh operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Frame decoding errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Routing table store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Status sink errors
    #[error("Status sink error: {0}")]
    Sink(#[from] SinkError),

    /// Sensor errors
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Link layer failed to come up
    #[error("Link startup failed: {0}")]
    Startup(String),

    /// Node configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] meshroute_core::Error),

    /// Task settings the runtime cannot operate with
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
