//! Layer2 database entities.
//!
//! Ownership is a strict tree: the database owns networks keyed by
//! interface name, a network owns its neighbors keyed by link address, a
//! neighbor owns its destinations and remote IPs. Children never point
//! back at their parent; operations address them by (interface, address).

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::addr::{IpPrefix, LinkAddr};
use crate::data::{Layer2Data, Layer2Value};
use crate::metadata::{
    NeighborMetric, NetworkMetric, NetworkType, NEIGHBOR_METRIC_COUNT, NETWORK_METRIC_COUNT,
};
use crate::origin::{Origin, OriginId, OriginRef};
use crate::Layer2Error;

mod lifecycle;

/// Lifecycle step reported for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Entity created
    Added,
    /// Entity committed with remaining data
    Changed,
    /// Entity removed
    Removed,
}

/// Change notification queued by the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Layer2Event {
    /// Network event
    Network {
        /// Interface name
        network: String,
        /// What happened
        kind: EventKind,
    },
    /// Neighbor event
    Neighbor {
        /// Interface name
        network: String,
        /// Neighbor address
        neighbor: LinkAddr,
        /// What happened
        kind: EventKind,
    },
    /// Destination event
    Destination {
        /// Interface name
        network: String,
        /// Neighbor address
        neighbor: LinkAddr,
        /// Destination address
        destination: LinkAddr,
        /// What happened
        kind: EventKind,
    },
}

impl Layer2Event {
    /// Interface the event belongs to
    pub fn network(&self) -> &str {
        match self {
            Layer2Event::Network { network, .. }
            | Layer2Event::Neighbor { network, .. }
            | Layer2Event::Destination { network, .. } => network,
        }
    }

    /// Lifecycle step
    pub fn kind(&self) -> EventKind {
        match self {
            Layer2Event::Network { kind, .. }
            | Layer2Event::Neighbor { kind, .. }
            | Layer2Event::Destination { kind, .. } => *kind,
        }
    }
}

/// Operating system interface listener attached to every network
pub trait InterfaceMonitor: fmt::Debug {
    /// Start listening for changes of `ifname`
    fn watch(&mut self, ifname: &str);

    /// Stop listening for `ifname`
    fn unwatch(&mut self, ifname: &str);
}

/// Monitor that ignores all interfaces
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl InterfaceMonitor for NoopMonitor {
    fn watch(&mut self, _ifname: &str) {}

    fn unwatch(&mut self, _ifname: &str) {}
}

/// A layer2 neighbor reachable through a network
#[derive(Debug, Clone)]
pub struct Layer2Neigh {
    addr: LinkAddr,
    data: [Layer2Data; NEIGHBOR_METRIC_COUNT],
    destinations: BTreeMap<LinkAddr, OriginRef>,
    remote_ips: BTreeMap<IpPrefix, OriginRef>,
}

impl Layer2Neigh {
    fn new(addr: LinkAddr) -> Self {
        Self {
            addr,
            data: [Layer2Data::default(); NEIGHBOR_METRIC_COUNT],
            destinations: BTreeMap::new(),
            remote_ips: BTreeMap::new(),
        }
    }

    /// Link layer address
    pub fn addr(&self) -> LinkAddr {
        self.addr
    }

    /// Own value of a metric, without network default
    pub fn data(&self, metric: NeighborMetric) -> &Layer2Data {
        &self.data[metric.index()]
    }

    /// Set a metric, returns whether the value changed
    pub fn set_value(
        &mut self,
        metric: NeighborMetric,
        origin: OriginRef,
        value: Layer2Value,
    ) -> Result<bool, Layer2Error> {
        let meta = metric.metadata();
        if value.kind() != meta.kind {
            return Err(Layer2Error::TypeMismatch(meta.key));
        }
        Ok(self.data[metric.index()].set(origin, value))
    }

    /// Destinations behind this neighbor and their origins
    pub fn destinations(&self) -> &BTreeMap<LinkAddr, OriginRef> {
        &self.destinations
    }

    /// Remote IP addresses of this neighbor and their origins
    pub fn remote_ips(&self) -> &BTreeMap<IpPrefix, OriginRef> {
        &self.remote_ips
    }

    /// Add or re-own a remote IP address
    pub fn add_ip(&mut self, origin: OriginRef, ip: IpPrefix) {
        self.remote_ips.insert(ip, origin);
    }

    /// Remove a remote IP address owned by `origin`
    pub fn remove_ip(&mut self, ip: &IpPrefix, origin: OriginId) -> Result<(), Layer2Error> {
        match self.remote_ips.get(ip) {
            Some(owner) if owner.id == origin => {
                self.remote_ips.remove(ip);
                Ok(())
            }
            Some(_) => Err(Layer2Error::ForeignOrigin),
            None => Ok(()),
        }
    }

    /// Clear all metrics of `origin`, returns whether anything was cleared
    pub fn cleanup(&mut self, origin: OriginId) -> bool {
        let mut changed = false;
        for data in self.data.iter_mut() {
            changed |= data.reset_if(origin);
        }
        changed
    }

    /// Hand all data of `old` over to `new`
    pub fn relabel(&mut self, new: OriginRef, old: OriginId) {
        for data in self.data.iter_mut() {
            data.relabel(new, old);
        }
        for owner in self.remote_ips.values_mut().chain(self.destinations.values_mut()) {
            if owner.id == old {
                *owner = new;
            }
        }
    }

    /// Whether the neighbor still holds anything
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
            && self.remote_ips.is_empty()
            && !self.data.iter().any(Layer2Data::has_value)
    }

    /// Metrics with a value, in slot order
    pub fn values(&self) -> impl Iterator<Item = (NeighborMetric, &Layer2Data)> + '_ {
        NeighborMetric::ALL
            .into_iter()
            .map(|m| (m, &self.data[m.index()]))
            .filter(|(_, d)| d.has_value())
    }
}

/// A layer2 network, one per interface
#[derive(Debug, Clone)]
pub struct Layer2Net {
    name: String,
    /// Link technology
    pub network_type: NetworkType,
    /// Operating system interface index
    pub if_index: Option<u32>,
    data: [Layer2Data; NETWORK_METRIC_COUNT],
    neighdata: [Layer2Data; NEIGHBOR_METRIC_COUNT],
    neighbors: BTreeMap<LinkAddr, Layer2Neigh>,
    peer_ips: BTreeMap<IpPrefix, OriginRef>,
}

impl Layer2Net {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network_type: NetworkType::default(),
            if_index: None,
            data: [Layer2Data::default(); NETWORK_METRIC_COUNT],
            neighdata: [Layer2Data::default(); NEIGHBOR_METRIC_COUNT],
            neighbors: BTreeMap::new(),
            peer_ips: BTreeMap::new(),
        }
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Network metric
    pub fn data(&self, metric: NetworkMetric) -> &Layer2Data {
        &self.data[metric.index()]
    }

    /// Set a network metric, returns whether the value changed
    pub fn set_value(
        &mut self,
        metric: NetworkMetric,
        origin: OriginRef,
        value: Layer2Value,
    ) -> Result<bool, Layer2Error> {
        let meta = metric.metadata();
        if value.kind() != meta.kind {
            return Err(Layer2Error::TypeMismatch(meta.key));
        }
        Ok(self.data[metric.index()].set(origin, value))
    }

    /// Neighbor default of a metric
    pub fn neighbor_default(&self, metric: NeighborMetric) -> &Layer2Data {
        &self.neighdata[metric.index()]
    }

    /// Set a neighbor default, returns whether the value changed
    pub fn set_neighbor_default(
        &mut self,
        metric: NeighborMetric,
        origin: OriginRef,
        value: Layer2Value,
    ) -> Result<bool, Layer2Error> {
        let meta = metric.metadata();
        if value.kind() != meta.kind {
            return Err(Layer2Error::TypeMismatch(meta.key));
        }
        Ok(self.neighdata[metric.index()].set(origin, value))
    }

    /// Neighbor value, falling back to the network default
    pub fn neighbor_value(&self, neighbor: &LinkAddr, metric: NeighborMetric) -> Option<&Layer2Data> {
        self.neighbors
            .get(neighbor)
            .map(|n| n.data(metric))
            .filter(|d| d.has_value())
            .or_else(|| Some(self.neighbor_default(metric)).filter(|d| d.has_value()))
    }

    /// Look up a neighbor
    pub fn neighbor(&self, addr: &LinkAddr) -> Option<&Layer2Neigh> {
        self.neighbors.get(addr)
    }

    /// Look up a neighbor for modification
    pub fn neighbor_mut(&mut self, addr: &LinkAddr) -> Option<&mut Layer2Neigh> {
        self.neighbors.get_mut(addr)
    }

    /// All neighbors in address order
    pub fn neighbors(&self) -> impl Iterator<Item = &Layer2Neigh> + '_ {
        self.neighbors.values()
    }

    /// Local peer addresses of the radio or modem
    pub fn peer_ips(&self) -> &BTreeMap<IpPrefix, OriginRef> {
        &self.peer_ips
    }

    /// Add or re-own a local peer address
    pub fn add_ip(&mut self, origin: OriginRef, ip: IpPrefix) {
        self.peer_ips.insert(ip, origin);
    }

    /// Remove a local peer address owned by `origin`
    pub fn remove_ip(&mut self, ip: &IpPrefix, origin: OriginId) -> Result<(), Layer2Error> {
        match self.peer_ips.get(ip) {
            Some(owner) if owner.id == origin => {
                self.peer_ips.remove(ip);
                Ok(())
            }
            Some(_) => Err(Layer2Error::ForeignOrigin),
            None => Ok(()),
        }
    }

    /// Clear network metrics and neighbor defaults of `origin`, and with
    /// `cleanup_neighbors` the metrics of every neighbor too
    pub fn cleanup(&mut self, origin: OriginId, cleanup_neighbors: bool) -> bool {
        let mut changed = false;
        for data in self.data.iter_mut().chain(self.neighdata.iter_mut()) {
            changed |= data.reset_if(origin);
        }
        if cleanup_neighbors {
            for neigh in self.neighbors.values_mut() {
                changed |= neigh.cleanup(origin);
            }
        }
        changed
    }

    /// Hand all data of `old`, including neighbor data, over to `new`
    pub fn relabel(&mut self, new: OriginRef, old: OriginId) {
        for data in self.data.iter_mut().chain(self.neighdata.iter_mut()) {
            data.relabel(new, old);
        }
        for owner in self.peer_ips.values_mut() {
            if owner.id == old {
                *owner = new;
            }
        }
        for neigh in self.neighbors.values_mut() {
            neigh.relabel(new, old);
        }
    }

    /// Whether the network still holds anything
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
            && self.peer_ips.is_empty()
            && !self
                .data
                .iter()
                .chain(self.neighdata.iter())
                .any(Layer2Data::has_value)
    }

    /// Network metrics with a value, in slot order
    pub fn values(&self) -> impl Iterator<Item = (NetworkMetric, &Layer2Data)> + '_ {
        NetworkMetric::ALL
            .into_iter()
            .map(|m| (m, &self.data[m.index()]))
            .filter(|(_, d)| d.has_value())
    }

    /// Neighbor defaults with a value, in slot order
    pub fn neighbor_defaults(&self) -> impl Iterator<Item = (NeighborMetric, &Layer2Data)> + '_ {
        NeighborMetric::ALL
            .into_iter()
            .map(|m| (m, &self.neighdata[m.index()]))
            .filter(|(_, d)| d.has_value())
    }
}

/// Result of a best prefix match over all neighbor addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborMatch<'a> {
    /// Network of the neighbor
    pub network: &'a str,
    /// Neighbor owning the prefix
    pub neighbor: LinkAddr,
    /// Matching prefix
    pub prefix: IpPrefix,
    /// Origin of the prefix
    pub origin: OriginRef,
}

/// The layer2 database
#[derive(Debug)]
pub struct Layer2Db {
    origins: BTreeMap<OriginId, Origin>,
    next_origin: u32,
    networks: BTreeMap<String, Layer2Net>,
    events: Vec<Layer2Event>,
    monitor: Box<dyn InterfaceMonitor>,
}
