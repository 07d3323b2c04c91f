//! Layer2 link information database for mesh.
//!
//! Radios, configuration and other data sources (origins) report per
//! interface network metrics and per neighbor metrics. Every value keeps
//! the origin that wrote it; a value may only be replaced by the same
//! origin or one with a strictly higher priority. Networks and neighbors
//! disappear automatically on commit once no origin holds data for them.
//!
//! ## Example
//!
//! ```ignore
//! let mut db = Layer2Db::new();
//! let radio = db.add_origin("nl80211", ORIGIN_PRIORITY_RELIABLE)?;
//! db.add_network("wlan0");
//! db.add_neighbor("wlan0", "02:00:00:00:00:01".parse()?)?
//!     .set_value(NeighborMetric::RxSignal, radio, Layer2Value::Integer(-61_000))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod addr;
pub mod config;
pub mod data;
pub mod database;
pub mod error;
pub mod isonumber;
pub mod metadata;
pub mod origin;

// Re-export main types
pub use addr::{IpPrefix, LinkAddr};
pub use config::{ConfigEntry, ConfiguredLayer2, InterfaceConfig};
pub use data::{Layer2Data, Layer2Value};
pub use database::{
    EventKind, InterfaceMonitor, Layer2Db, Layer2Event, Layer2Neigh, Layer2Net, NeighborMatch,
    NoopMonitor,
};
pub use error::Layer2Error;
pub use isonumber::{format_value, parse_bool, parse_value};
pub use metadata::{
    DataKind, Metadata, NeighborMetric, NetworkMetric, NetworkType, NEIGHBOR_METRIC_COUNT,
    NETWORK_METRIC_COUNT,
};
pub use origin::{
    may_overwrite, Origin, OriginId, OriginRef, ORIGIN_PRIORITY_CONFIGURED,
    ORIGIN_PRIORITY_RELIABLE, ORIGIN_PRIORITY_UNKNOWN, ORIGIN_PRIORITY_UNRELIABLE,
};
