//! Layer2 database error types.

use thiserror::Error;

use crate::addr::LinkAddr;

/// Layer2 database errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Layer2Error {
    /// No network with this interface name
    #[error("unknown layer2 network: {0}")]
    UnknownNetwork(String),

    /// No neighbor with this address on the network
    #[error("unknown layer2 neighbor {neighbor} on {network}")]
    UnknownNeighbor {
        /// Interface name
        network: String,
        /// Neighbor link address
        neighbor: LinkAddr,
    },

    /// Origin name already registered
    #[error("layer2 origin already registered: {0}")]
    DuplicateOrigin(String),

    /// Entry belongs to a different origin
    #[error("entry is owned by a different origin")]
    ForeignOrigin,

    /// Value kind does not match the metric
    #[error("wrong value type for metric {0}")]
    TypeMismatch(&'static str),

    /// No metric with this key
    #[error("unknown layer2 metric: {0}")]
    UnknownMetric(String),

    /// Link layer address could not be parsed
    #[error("invalid link layer address: {0}")]
    InvalidLinkAddr(String),

    /// IP address or prefix could not be parsed
    #[error("invalid ip prefix: {0}")]
    InvalidPrefix(String),

    /// Number could not be parsed
    #[error("invalid number '{input}': {reason}")]
    InvalidNumber {
        /// Offending text
        input: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// Configuration entry could not be parsed
    #[error("invalid layer2 config entry '{0}'")]
    InvalidEntry(String),
}
