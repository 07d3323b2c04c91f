//! Administratively configured layer2 data.
//!
//! Every interface section carries three lists of text entries:
//!
//! - `l2net`: `<network-key> <value>`
//! - `l2default`: `<neighbor-key> <value>`, the neighbor default of a network
//! - `l2neighbor`: `<neighbor-key> <value> <mac>`
//!
//! Values use ISO prefixes (`54M`, `-92.5`) for integer metrics and
//! `true`/`false` style words for flags.
//!
//! Configured values are written with [`ORIGIN_PRIORITY_CONFIGURED`], so a
//! radio reporting the same metric with a reliable origin wins. Applying a
//! new configuration never leaves a gap: the old values are first handed to
//! a stale origin, the new ones written, and only what remains on the stale
//! origin is removed afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::addr::LinkAddr;
use crate::data::Layer2Value;
use crate::database::{EventKind, Layer2Db, Layer2Event};
use crate::isonumber::{parse_bool, parse_value};
use crate::metadata::{DataKind, Metadata, NeighborMetric, NetworkMetric};
use crate::origin::{OriginRef, ORIGIN_PRIORITY_CONFIGURED};
use crate::Layer2Error;

/// Name of the origin owning configured values
pub const CONFIG_ORIGIN: &str = "layer2 config";
/// Name of the origin holding values of the previous configuration
pub const STALE_CONFIG_ORIGIN: &str = "layer2 config old";

/// Layer2 configuration of one interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Interface name
    pub name: String,
    /// Network metric entries
    pub l2net: Vec<String>,
    /// Neighbor default entries
    pub l2default: Vec<String>,
    /// Per neighbor entries
    pub l2neighbor: Vec<String>,
}

impl InterfaceConfig {
    /// Parse all entries, failing on the first invalid one
    pub fn entries(&self) -> Result<Vec<ConfigEntry>, Layer2Error> {
        let net = self.l2net.iter().map(|e| ConfigEntry::parse_net(e));
        let def = self.l2default.iter().map(|e| ConfigEntry::parse_default(e));
        let neigh = self.l2neighbor.iter().map(|e| ConfigEntry::parse_neighbor(e));
        net.chain(def).chain(neigh).collect()
    }
}

/// One parsed configuration entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEntry {
    /// Network metric
    Net {
        /// Metric slot
        metric: NetworkMetric,
        /// Configured value
        value: Layer2Value,
    },
    /// Neighbor default of the network
    Default {
        /// Metric slot
        metric: NeighborMetric,
        /// Configured value
        value: Layer2Value,
    },
    /// Metric of a single neighbor
    Neighbor {
        /// Metric slot
        metric: NeighborMetric,
        /// Configured value
        value: Layer2Value,
        /// Neighbor address
        neighbor: LinkAddr,
    },
}

impl ConfigEntry {
    /// Parse an `l2net` entry
    pub fn parse_net(entry: &str) -> Result<Self, Layer2Error> {
        let mut words = entry.split_whitespace();
        let (key, text) = match (words.next(), words.next(), words.next()) {
            (Some(key), Some(text), None) => (key, text),
            _ => return Err(Layer2Error::InvalidEntry(entry.to_string())),
        };

        let metric: NetworkMetric = key.parse()?;
        let value = parse_metric_value(metric.metadata(), text)?;
        Ok(ConfigEntry::Net { metric, value })
    }

    /// Parse an `l2default` entry
    pub fn parse_default(entry: &str) -> Result<Self, Layer2Error> {
        let mut words = entry.split_whitespace();
        let (key, text) = match (words.next(), words.next(), words.next()) {
            (Some(key), Some(text), None) => (key, text),
            _ => return Err(Layer2Error::InvalidEntry(entry.to_string())),
        };

        let metric: NeighborMetric = key.parse()?;
        let value = parse_metric_value(metric.metadata(), text)?;
        Ok(ConfigEntry::Default { metric, value })
    }

    /// Parse an `l2neighbor` entry
    pub fn parse_neighbor(entry: &str) -> Result<Self, Layer2Error> {
        let mut words = entry.split_whitespace();
        let (key, text, mac) = match (words.next(), words.next(), words.next(), words.next()) {
            (Some(key), Some(text), Some(mac), None) => (key, text, mac),
            _ => return Err(Layer2Error::InvalidEntry(entry.to_string())),
        };

        let metric: NeighborMetric = key.parse()?;
        let value = parse_metric_value(metric.metadata(), text)?;
        let neighbor: LinkAddr = mac.parse()?;
        if !matches!(neighbor, LinkAddr::Mac48(_)) {
            return Err(Layer2Error::InvalidLinkAddr(mac.to_string()));
        }
        Ok(ConfigEntry::Neighbor {
            metric,
            value,
            neighbor,
        })
    }
}

fn parse_metric_value(meta: &Metadata, text: &str) -> Result<Layer2Value, Layer2Error> {
    match meta.kind {
        DataKind::Integer => parse_value(text, meta.fraction, meta.binary).map(Layer2Value::Integer),
        DataKind::Boolean => parse_bool(text).map(Layer2Value::Boolean),
    }
}

/// Configured layer2 data of all interfaces
#[derive(Debug)]
pub struct ConfiguredLayer2 {
    current: OriginRef,
    stale: OriginRef,
    interfaces: BTreeMap<String, Vec<ConfigEntry>>,
}

impl ConfiguredLayer2 {
    /// Register the configuration origins in `db`
    pub fn new(db: &mut Layer2Db) -> Result<Self, Layer2Error> {
        let current = db.add_origin(CONFIG_ORIGIN, ORIGIN_PRIORITY_CONFIGURED)?;
        let stale = match db.add_origin(STALE_CONFIG_ORIGIN, ORIGIN_PRIORITY_CONFIGURED - 1) {
            Ok(stale) => stale,
            Err(e) => {
                db.remove_origin(current.id);
                return Err(e);
            }
        };

        Ok(Self {
            current,
            stale,
            interfaces: BTreeMap::new(),
        })
    }

    /// Origin owning configured values
    pub fn origin(&self) -> OriginRef {
        self.current
    }

    /// Parsed entries of an interface
    pub fn entries(&self, ifname: &str) -> Option<&[ConfigEntry]> {
        self.interfaces.get(ifname).map(Vec::as_slice)
    }

    /// Replace the configuration of an interface and apply it. An invalid
    /// entry rejects the whole section and keeps the previous one.
    pub fn set_interface(
        &mut self,
        db: &mut Layer2Db,
        config: &InterfaceConfig,
    ) -> Result<(), Layer2Error> {
        let entries = config.entries()?;
        debug!(
            "Configured {} layer2 entries for {}",
            entries.len(),
            config.name
        );
        self.interfaces.insert(config.name.clone(), entries);
        self.apply(db, &config.name)
    }

    /// Drop the configuration of an interface and remove its values
    pub fn remove_interface(&mut self, db: &mut Layer2Db, ifname: &str) -> bool {
        if self.interfaces.remove(ifname).is_none() {
            return false;
        }
        db.net_relabel(ifname, self.stale, self.current.id);
        db.net_remove(ifname, self.stale.id);
        info!("Removed layer2 configuration of {}", ifname);
        true
    }

    /// Write the configured values of an interface into `db`
    pub fn apply(&self, db: &mut Layer2Db, ifname: &str) -> Result<(), Layer2Error> {
        let Some(entries) = self.interfaces.get(ifname) else {
            return Ok(());
        };
        if entries.is_empty() && db.network(ifname).is_none() {
            return Ok(());
        }

        db.add_network(ifname);
        db.net_relabel(ifname, self.stale, self.current.id);

        for entry in entries {
            match *entry {
                ConfigEntry::Net { metric, value } => {
                    if let Some(net) = db.network_mut(ifname) {
                        net.set_value(metric, self.current, value)?;
                    }
                }
                ConfigEntry::Default { metric, value } => {
                    if let Some(net) = db.network_mut(ifname) {
                        net.set_neighbor_default(metric, self.current, value)?;
                    }
                }
                ConfigEntry::Neighbor {
                    metric,
                    value,
                    neighbor,
                } => {
                    db.add_neighbor(ifname, neighbor)?
                        .set_value(metric, self.current, value)?;
                }
            }
        }

        db.net_remove(ifname, self.stale.id);
        Ok(())
    }

    /// Re-apply every configured interface touched by a change or removal
    /// in `events`. Returns the number of interfaces re-applied.
    pub fn reapply(&self, db: &mut Layer2Db, events: &[Layer2Event]) -> Result<usize, Layer2Error> {
        let touched: BTreeSet<&str> = events
            .iter()
            .filter(|e| e.kind() != EventKind::Added)
            .map(Layer2Event::network)
            .filter(|name| self.interfaces.contains_key(*name))
            .collect();

        for ifname in &touched {
            debug!("Re-applying layer2 configuration of {}", ifname);
            self.apply(db, ifname)?;
        }
        Ok(touched.len())
    }

    /// Remove all configured values and unregister the origins
    pub fn unregister(self, db: &mut Layer2Db) {
        db.remove_origin(self.current.id);
        db.remove_origin(self.stale.id);
    }
}
