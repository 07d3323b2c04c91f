//! Metric slots of networks and neighbors and their presentation metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Layer2Error;

/// Kind of value stored in a metric slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// Fixed point integer
    Integer,
    /// Flag
    Boolean,
}

/// Presentation metadata of one metric slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Configuration and display key
    pub key: &'static str,
    /// Unit, empty for plain counters
    pub unit: &'static str,
    /// Number of decimal fraction digits in the stored integer
    pub fraction: u8,
    /// Scale prefixes by 1024 instead of 1000
    pub binary: bool,
    /// Value kind
    pub kind: DataKind,
}

const fn int(key: &'static str, unit: &'static str, fraction: u8, binary: bool) -> Metadata {
    Metadata {
        key,
        unit,
        fraction,
        binary,
        kind: DataKind::Integer,
    }
}

const fn flag(key: &'static str) -> Metadata {
    Metadata {
        key,
        unit: "",
        fraction: 0,
        binary: false,
        kind: DataKind::Boolean,
    }
}

/// Number of neighbor metric slots
pub const NEIGHBOR_METRIC_COUNT: usize = 17;
/// Number of network metric slots
pub const NETWORK_METRIC_COUNT: usize = 13;

/// Per neighbor metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NeighborMetric {
    /// Outgoing signal strength
    TxSignal,
    /// Incoming signal strength
    RxSignal,
    /// Outgoing bitrate
    TxBitrate,
    /// Incoming bitrate
    RxBitrate,
    /// Maximum outgoing bitrate
    TxMaxBitrate,
    /// Maximum incoming bitrate
    RxMaxBitrate,
    /// Bytes sent
    TxBytes,
    /// Bytes received
    RxBytes,
    /// Frames sent
    TxFrames,
    /// Frames received
    RxFrames,
    /// Outgoing throughput
    TxThroughput,
    /// Retransmissions
    TxRetries,
    /// Failed transmissions
    TxFailed,
    /// Link latency
    Latency,
    /// Free link resources
    Resources,
    /// Outgoing relative link quality
    TxRlq,
    /// Incoming relative link quality
    RxRlq,
}

const NEIGHBOR_METADATA: [Metadata; NEIGHBOR_METRIC_COUNT] = [
    int("tx_signal", "dBm", 3, false),
    int("rx_signal", "dBm", 3, false),
    int("tx_bitrate", "bit/s", 0, true),
    int("rx_bitrate", "bit/s", 0, true),
    int("tx_max_bitrate", "bit/s", 0, true),
    int("rx_max_bitrate", "bit/s", 0, true),
    int("tx_bytes", "byte", 0, true),
    int("rx_bytes", "byte", 0, true),
    int("tx_frames", "", 0, false),
    int("rx_frames", "", 0, false),
    int("tx_throughput", "bit/s", 0, true),
    int("tx_retries", "", 0, false),
    int("tx_failed", "", 0, false),
    int("latency", "s", 6, false),
    int("resources", "", 0, false),
    int("tx_rlq", "", 0, false),
    int("rx_rlq", "", 0, false),
];

impl NeighborMetric {
    /// All neighbor metrics in slot order
    pub const ALL: [NeighborMetric; NEIGHBOR_METRIC_COUNT] = [
        NeighborMetric::TxSignal,
        NeighborMetric::RxSignal,
        NeighborMetric::TxBitrate,
        NeighborMetric::RxBitrate,
        NeighborMetric::TxMaxBitrate,
        NeighborMetric::RxMaxBitrate,
        NeighborMetric::TxBytes,
        NeighborMetric::RxBytes,
        NeighborMetric::TxFrames,
        NeighborMetric::RxFrames,
        NeighborMetric::TxThroughput,
        NeighborMetric::TxRetries,
        NeighborMetric::TxFailed,
        NeighborMetric::Latency,
        NeighborMetric::Resources,
        NeighborMetric::TxRlq,
        NeighborMetric::RxRlq,
    ];

    /// Slot index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Presentation metadata
    pub fn metadata(self) -> &'static Metadata {
        &NEIGHBOR_METADATA[self.index()]
    }

    /// Configuration key
    pub fn key(self) -> &'static str {
        self.metadata().key
    }
}

impl FromStr for NeighborMetric {
    type Err = Layer2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| Layer2Error::UnknownMetric(s.to_string()))
    }
}

/// Per network metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkMetric {
    /// Primary frequency
    Frequency1,
    /// Secondary frequency
    Frequency2,
    /// Primary channel bandwidth
    Bandwidth1,
    /// Secondary channel bandwidth
    Bandwidth2,
    /// Noise level
    Noise,
    /// Time the channel was active
    ChannelActive,
    /// Time the channel was busy
    ChannelBusy,
    /// Time spent receiving
    ChannelRx,
    /// Time spent transmitting
    ChannelTx,
    /// Maximum transmission unit
    Mtu,
    /// Modulation is selected by probing
    McsByProbing,
    /// Interface only receives unicast
    RxOnlyUnicast,
    /// Interface only transmits unicast
    TxOnlyUnicast,
}

const NETWORK_METADATA: [Metadata; NETWORK_METRIC_COUNT] = [
    int("frequency1", "Hz", 0, false),
    int("frequency2", "Hz", 0, false),
    int("bandwidth1", "Hz", 0, false),
    int("bandwidth2", "Hz", 0, false),
    int("noise", "dBm", 3, false),
    int("ch_active", "s", 9, false),
    int("ch_busy", "s", 9, false),
    int("ch_rx", "s", 9, false),
    int("ch_tx", "s", 9, false),
    int("mtu", "byte", 0, false),
    flag("mcs_by_probing"),
    flag("rx_only_unicast"),
    flag("tx_only_unicast"),
];

impl NetworkMetric {
    /// All network metrics in slot order
    pub const ALL: [NetworkMetric; NETWORK_METRIC_COUNT] = [
        NetworkMetric::Frequency1,
        NetworkMetric::Frequency2,
        NetworkMetric::Bandwidth1,
        NetworkMetric::Bandwidth2,
        NetworkMetric::Noise,
        NetworkMetric::ChannelActive,
        NetworkMetric::ChannelBusy,
        NetworkMetric::ChannelRx,
        NetworkMetric::ChannelTx,
        NetworkMetric::Mtu,
        NetworkMetric::McsByProbing,
        NetworkMetric::RxOnlyUnicast,
        NetworkMetric::TxOnlyUnicast,
    ];

    /// Slot index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Presentation metadata
    pub fn metadata(self) -> &'static Metadata {
        &NETWORK_METADATA[self.index()]
    }

    /// Configuration key
    pub fn key(self) -> &'static str {
        self.metadata().key
    }
}

impl FromStr for NetworkMetric {
    type Err = Layer2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.key() == s)
            .ok_or_else(|| Layer2Error::UnknownMetric(s.to_string()))
    }
}

/// Link technology of a network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Not known
    #[default]
    Undefined,
    /// Radio
    Wireless,
    /// Wired ethernet
    Ethernet,
    /// Tunnel interface
    Tunnel,
}

impl NetworkType {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Undefined => "undefined",
            NetworkType::Wireless => "wireless",
            NetworkType::Ethernet => "ethernet",
            NetworkType::Tunnel => "tunnel",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
