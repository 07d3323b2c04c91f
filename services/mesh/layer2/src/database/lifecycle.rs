//! Layer2Db lifecycle operations.

use std::collections::btree_map::Entry;
use std::mem;
use std::net::IpAddr;

use tracing::{debug, info};

use super::{
    EventKind, InterfaceMonitor, Layer2Db, Layer2Event, Layer2Neigh, Layer2Net, NeighborMatch,
    NoopMonitor,
};
use crate::addr::LinkAddr;
use crate::data::Layer2Data;
use crate::metadata::NeighborMetric;
use crate::origin::{Origin, OriginId, OriginRef};
use crate::Layer2Error;

fn neighbor_event(network: &str, neighbor: LinkAddr, kind: EventKind) -> Layer2Event {
    Layer2Event::Neighbor {
        network: network.to_string(),
        neighbor,
        kind,
    }
}

fn destination_event(
    network: &str,
    neighbor: LinkAddr,
    destination: LinkAddr,
    kind: EventKind,
) -> Layer2Event {
    Layer2Event::Destination {
        network: network.to_string(),
        neighbor,
        destination,
        kind,
    }
}

/// Report removal of a neighbor and everything below it
fn drop_neighbor(network: &str, neigh: Layer2Neigh, events: &mut Vec<Layer2Event>) {
    for destination in neigh.destinations.keys() {
        events.push(destination_event(
            network,
            neigh.addr,
            *destination,
            EventKind::Removed,
        ));
    }
    debug!("Removing layer2 neighbor {} from {}", neigh.addr, network);
    events.push(neighbor_event(network, neigh.addr, EventKind::Removed));
}

/// Remove a neighbor that holds nothing anymore, returns whether it was removed
fn commit_neighbor(net: &mut Layer2Net, addr: LinkAddr, events: &mut Vec<Layer2Event>) -> bool {
    let Some(neigh) = net.neighbors.get(&addr) else {
        return false;
    };
    if !neigh.is_empty() {
        events.push(neighbor_event(&net.name, addr, EventKind::Changed));
        return false;
    }
    if let Some(neigh) = net.neighbors.remove(&addr) {
        drop_neighbor(&net.name, neigh, events);
    }
    true
}

/// Remove everything `origin` contributed to a neighbor, then commit it
fn remove_neighbor_data(
    net: &mut Layer2Net,
    addr: LinkAddr,
    origin: OriginId,
    events: &mut Vec<Layer2Event>,
) -> bool {
    let network = net.name.as_str();
    let Some(neigh) = net.neighbors.get_mut(&addr) else {
        return false;
    };

    let mut changed = false;
    neigh.destinations.retain(|destination, owner| {
        if owner.id != origin {
            return true;
        }
        events.push(destination_event(
            network,
            addr,
            *destination,
            EventKind::Removed,
        ));
        changed = true;
        false
    });

    let ips = neigh.remote_ips.len();
    neigh.remote_ips.retain(|_, owner| owner.id != origin);
    changed |= ips != neigh.remote_ips.len();

    changed |= neigh.cleanup(origin);

    if changed {
        commit_neighbor(net, addr, events);
    }
    changed
}

impl Layer2Db {
    /// Create an empty database without interface monitoring
    pub fn new() -> Self {
        Self::with_monitor(Box::new(NoopMonitor))
    }

    /// Create an empty database watching interfaces through `monitor`
    pub fn with_monitor(monitor: Box<dyn InterfaceMonitor>) -> Self {
        Self {
            origins: Default::default(),
            next_origin: 0,
            networks: Default::default(),
            events: Vec::new(),
            monitor,
        }
    }

    /// Register a data source
    pub fn add_origin(&mut self, name: &str, priority: u8) -> Result<OriginRef, Layer2Error> {
        if self.origins.values().any(|o| o.name == name) {
            return Err(Layer2Error::DuplicateOrigin(name.to_string()));
        }

        let id = OriginId(self.next_origin);
        self.next_origin += 1;
        self.origins.insert(
            id,
            Origin {
                name: name.to_string(),
                priority,
            },
        );
        debug!("Registered layer2 origin '{}' ({}) with priority {}", name, id, priority);
        Ok(OriginRef { id, priority })
    }

    /// Remove a data source together with all data it contributed
    pub fn remove_origin(&mut self, id: OriginId) -> bool {
        let Some(origin) = self.origins.remove(&id) else {
            return false;
        };

        let names: Vec<String> = self.networks.keys().cloned().collect();
        for name in names {
            self.net_remove(&name, id);
        }
        debug!("Removed layer2 origin '{}' ({})", origin.name, id);
        true
    }

    /// Look up an origin
    pub fn origin(&self, id: OriginId) -> Option<&Origin> {
        self.origins.get(&id)
    }

    /// All origins in registration order
    pub fn origins(&self) -> impl Iterator<Item = (OriginId, &Origin)> + '_ {
        self.origins.iter().map(|(id, o)| (*id, o))
    }

    /// Get or create the network of an interface
    pub fn add_network(&mut self, name: &str) -> &mut Layer2Net {
        match self.networks.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Adding layer2 network {}", name);
                self.monitor.watch(name);
                self.events.push(Layer2Event::Network {
                    network: name.to_string(),
                    kind: EventKind::Added,
                });
                entry.insert(Layer2Net::new(name))
            }
        }
    }

    /// Look up a network
    pub fn network(&self, name: &str) -> Option<&Layer2Net> {
        self.networks.get(name)
    }

    /// Look up a network for modification
    pub fn network_mut(&mut self, name: &str) -> Option<&mut Layer2Net> {
        self.networks.get_mut(name)
    }

    /// All networks in interface name order
    pub fn networks(&self) -> impl Iterator<Item = &Layer2Net> + '_ {
        self.networks.values()
    }

    /// Clear the metrics `origin` set on a network, optionally on its
    /// neighbors too. Entities are kept until the next commit.
    pub fn net_cleanup(&mut self, name: &str, origin: OriginId, cleanup_neighbors: bool) -> bool {
        self.networks
            .get_mut(name)
            .map(|net| net.cleanup(origin, cleanup_neighbors))
            .unwrap_or(false)
    }

    /// Remove everything `origin` contributed to a network and its
    /// neighbors, then commit. Returns whether anything changed.
    pub fn net_remove(&mut self, name: &str, origin: OriginId) -> bool {
        let Some(net) = self.networks.get_mut(name) else {
            return false;
        };
        let events = &mut self.events;

        let mut changed = false;
        let neighbors: Vec<LinkAddr> = net.neighbors.keys().copied().collect();
        for addr in neighbors {
            changed |= remove_neighbor_data(net, addr, origin, events);
        }

        let ips = net.peer_ips.len();
        net.peer_ips.retain(|_, owner| owner.id != origin);
        changed |= ips != net.peer_ips.len();

        changed |= net.cleanup(origin, false);

        if changed {
            self.net_commit(name);
        }
        changed
    }

    /// Remove the neighbors that hold nothing anymore, then the network if
    /// it is empty too. Returns whether the network was removed.
    pub fn net_commit(&mut self, name: &str) -> bool {
        let Some(net) = self.networks.get_mut(name) else {
            return false;
        };
        let empty: Vec<LinkAddr> = net
            .neighbors
            .iter()
            .filter(|(_, neigh)| neigh.is_empty())
            .map(|(addr, _)| *addr)
            .collect();
        for addr in empty {
            if let Some(neigh) = net.neighbors.remove(&addr) {
                drop_neighbor(&net.name, neigh, &mut self.events);
            }
        }

        if !net.is_empty() {
            self.events.push(Layer2Event::Network {
                network: name.to_string(),
                kind: EventKind::Changed,
            });
            return false;
        }
        self.remove_network(name)
    }

    /// Hand all data of `old` on a network over to `new`
    pub fn net_relabel(&mut self, name: &str, new: OriginRef, old: OriginId) {
        if let Some(net) = self.networks.get_mut(name) {
            net.relabel(new, old);
        }
    }

    /// Remove a network with all its neighbors regardless of content
    pub fn remove_network(&mut self, name: &str) -> bool {
        let Some(net) = self.networks.remove(name) else {
            return false;
        };

        for neigh in net.neighbors.into_values() {
            drop_neighbor(&net.name, neigh, &mut self.events);
        }
        self.events.push(Layer2Event::Network {
            network: net.name.clone(),
            kind: EventKind::Removed,
        });
        self.monitor.unwatch(&net.name);
        info!("Removed layer2 network {}", net.name);
        true
    }

    /// Get or create a neighbor on an existing network
    pub fn add_neighbor(
        &mut self,
        network: &str,
        addr: LinkAddr,
    ) -> Result<&mut Layer2Neigh, Layer2Error> {
        let net = self
            .networks
            .get_mut(network)
            .ok_or_else(|| Layer2Error::UnknownNetwork(network.to_string()))?;

        Ok(match net.neighbors.entry(addr) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("Adding layer2 neighbor {} to {}", addr, network);
                self.events
                    .push(neighbor_event(network, addr, EventKind::Added));
                entry.insert(Layer2Neigh::new(addr))
            }
        })
    }

    /// Remove everything `origin` contributed to a neighbor, then commit it
    pub fn neigh_remove(&mut self, network: &str, addr: LinkAddr, origin: OriginId) -> bool {
        match self.networks.get_mut(network) {
            Some(net) => remove_neighbor_data(net, addr, origin, &mut self.events),
            None => false,
        }
    }

    /// Remove the neighbor if it holds nothing anymore. Returns whether it
    /// was removed.
    pub fn neigh_commit(&mut self, network: &str, addr: LinkAddr) -> bool {
        match self.networks.get_mut(network) {
            Some(net) => commit_neighbor(net, addr, &mut self.events),
            None => false,
        }
    }

    /// Add a destination behind a neighbor. Returns `false` if it already
    /// existed, in which case its origin is kept.
    pub fn add_destination(
        &mut self,
        network: &str,
        neighbor: LinkAddr,
        destination: LinkAddr,
        origin: OriginRef,
    ) -> Result<bool, Layer2Error> {
        let neigh = self
            .networks
            .get_mut(network)
            .ok_or_else(|| Layer2Error::UnknownNetwork(network.to_string()))?
            .neighbors
            .get_mut(&neighbor)
            .ok_or_else(|| Layer2Error::UnknownNeighbor {
                network: network.to_string(),
                neighbor,
            })?;

        if neigh.destinations.contains_key(&destination) {
            return Ok(false);
        }
        neigh.destinations.insert(destination, origin);
        self.events.push(destination_event(
            network,
            neighbor,
            destination,
            EventKind::Added,
        ));
        Ok(true)
    }

    /// Remove a destination. Returns whether it existed.
    pub fn remove_destination(
        &mut self,
        network: &str,
        neighbor: LinkAddr,
        destination: LinkAddr,
    ) -> bool {
        let removed = self
            .networks
            .get_mut(network)
            .and_then(|net| net.neighbors.get_mut(&neighbor))
            .and_then(|neigh| neigh.destinations.remove(&destination))
            .is_some();

        if removed {
            self.events.push(destination_event(
                network,
                neighbor,
                destination,
                EventKind::Removed,
            ));
        }
        removed
    }

    /// Longest neighbor prefix containing `addr`, over all networks
    pub fn best_neighbor_match(&self, addr: IpAddr) -> Option<NeighborMatch<'_>> {
        let mut best: Option<NeighborMatch<'_>> = None;

        for net in self.networks.values() {
            for neigh in net.neighbors.values() {
                for (prefix, origin) in &neigh.remote_ips {
                    if !prefix.contains(addr) {
                        continue;
                    }
                    if best
                        .as_ref()
                        .map_or(true, |b| prefix.prefix_len() > b.prefix.prefix_len())
                    {
                        best = Some(NeighborMatch {
                            network: &net.name,
                            neighbor: neigh.addr,
                            prefix: *prefix,
                            origin: *origin,
                        });
                    }
                }
            }
        }
        best
    }

    /// Neighbor metric on an interface, falling back to the network default
    pub fn query_neighbor(
        &self,
        ifname: &str,
        neighbor: &LinkAddr,
        metric: NeighborMetric,
    ) -> Option<&Layer2Data> {
        self.networks.get(ifname)?.neighbor_value(neighbor, metric)
    }

    /// Drain queued change notifications
    pub fn take_events(&mut self) -> Vec<Layer2Event> {
        mem::take(&mut self.events)
    }
}

impl Default for Layer2Db {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::addr::IpPrefix;
    use crate::data::Layer2Value;
    use crate::metadata::NetworkMetric;
    use crate::origin::{ORIGIN_PRIORITY_CONFIGURED, ORIGIN_PRIORITY_RELIABLE};

    const WLAN: &str = "wlan0";

    fn mac(last: u8) -> LinkAddr {
        LinkAddr::Mac48([0x02, 0, 0, 0, 0, last])
    }

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[derive(Debug, Default, Clone)]
    struct RecordingMonitor(Rc<RefCell<Vec<String>>>);

    impl InterfaceMonitor for RecordingMonitor {
        fn watch(&mut self, ifname: &str) {
            self.0.borrow_mut().push(format!("+{}", ifname));
        }

        fn unwatch(&mut self, ifname: &str) {
            self.0.borrow_mut().push(format!("-{}", ifname));
        }
    }

    #[test]
    fn test_duplicate_origin() {
        let mut db = Layer2Db::new();
        db.add_origin("nl80211", ORIGIN_PRIORITY_RELIABLE).unwrap();
        assert_eq!(
            db.add_origin("nl80211", ORIGIN_PRIORITY_RELIABLE),
            Err(Layer2Error::DuplicateOrigin("nl80211".to_string()))
        );
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut db = Layer2Db::new();
        db.add_network(WLAN).if_index = Some(3);
        assert_eq!(db.add_network(WLAN).if_index, Some(3));

        db.add_neighbor(WLAN, mac(1)).unwrap();
        db.add_neighbor(WLAN, mac(1)).unwrap();

        let events = db.take_events();
        assert_eq!(events.len(), 2);
        assert!(db.take_events().is_empty());
    }

    #[test]
    fn test_add_neighbor_unknown_network() {
        let mut db = Layer2Db::new();
        assert!(matches!(
            db.add_neighbor("eth9", mac(1)),
            Err(Layer2Error::UnknownNetwork(_))
        ));
    }

    #[test]
    fn test_empty_network_removed_on_commit() {
        let mut db = Layer2Db::new();
        let origin = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN)
            .set_value(NetworkMetric::Mtu, origin, Layer2Value::Integer(1500))
            .unwrap();

        assert!(!db.net_commit(WLAN));
        assert!(db.net_cleanup(WLAN, origin.id, false));
        assert!(db.net_commit(WLAN));
        assert!(db.network(WLAN).is_none());
    }

    #[test]
    fn test_network_with_neighbor_never_auto_removed() {
        let mut db = Layer2Db::new();
        let origin = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN);
        db.add_neighbor(WLAN, mac(1))
            .unwrap()
            .set_value(NeighborMetric::RxSignal, origin, Layer2Value::Integer(-60_000))
            .unwrap();

        assert!(!db.net_commit(WLAN));
        assert!(db.network(WLAN).is_some());
    }

    #[test]
    fn test_commit_drops_emptied_neighbors_first() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN);
        for last in [1, 2] {
            db.add_neighbor(WLAN, mac(last))
                .unwrap()
                .set_value(NeighborMetric::RxSignal, radio, Layer2Value::Integer(-60_000))
                .unwrap();
        }
        db.take_events();

        assert!(db.net_cleanup(WLAN, radio.id, true));
        assert!(db.network(WLAN).unwrap().neighbor(&mac(1)).is_some());

        assert!(db.net_commit(WLAN));
        assert!(db.network(WLAN).is_none());
        assert_eq!(
            db.take_events(),
            vec![
                neighbor_event(WLAN, mac(1), EventKind::Removed),
                neighbor_event(WLAN, mac(2), EventKind::Removed),
                Layer2Event::Network {
                    network: WLAN.to_string(),
                    kind: EventKind::Removed
                },
            ]
        );
    }

    #[test]
    fn test_commit_keeps_neighbors_with_data() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN);
        db.add_neighbor(WLAN, mac(1)).unwrap();
        db.add_neighbor(WLAN, mac(2))
            .unwrap()
            .set_value(NeighborMetric::RxSignal, radio, Layer2Value::Integer(-60_000))
            .unwrap();

        assert!(!db.net_commit(WLAN));
        let net = db.network(WLAN).unwrap();
        assert!(net.neighbor(&mac(1)).is_none());
        assert!(net.neighbor(&mac(2)).is_some());
    }

    #[test]
    fn test_net_remove_cascades_bottom_up() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN)
            .set_value(NetworkMetric::Frequency1, radio, Layer2Value::Integer(2_412_000_000))
            .unwrap();
        db.add_neighbor(WLAN, mac(1))
            .unwrap()
            .set_value(NeighborMetric::TxBitrate, radio, Layer2Value::Integer(54_000_000))
            .unwrap();
        db.add_destination(WLAN, mac(1), mac(9), radio).unwrap();
        db.take_events();

        assert!(db.net_remove(WLAN, radio.id));
        assert!(db.network(WLAN).is_none());

        let events = db.take_events();
        assert_eq!(
            events,
            vec![
                destination_event(WLAN, mac(1), mac(9), EventKind::Removed),
                neighbor_event(WLAN, mac(1), EventKind::Removed),
                Layer2Event::Network {
                    network: WLAN.to_string(),
                    kind: EventKind::Removed
                },
            ]
        );
    }

    #[test]
    fn test_net_remove_keeps_other_origins() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        let config = db.add_origin("config", ORIGIN_PRIORITY_CONFIGURED).unwrap();
        db.add_network(WLAN);
        db.add_neighbor(WLAN, mac(1))
            .unwrap()
            .set_value(NeighborMetric::Latency, config, Layer2Value::Integer(2_000))
            .unwrap();
        db.add_neighbor(WLAN, mac(2))
            .unwrap()
            .set_value(NeighborMetric::Latency, radio, Layer2Value::Integer(1_000))
            .unwrap();

        assert!(db.net_remove(WLAN, radio.id));

        let net = db.network(WLAN).unwrap();
        assert!(net.neighbor(&mac(1)).is_some());
        assert!(net.neighbor(&mac(2)).is_none());
    }

    #[test]
    fn test_remove_origin_everywhere() {
        let monitor = RecordingMonitor::default();
        let mut db = Layer2Db::with_monitor(Box::new(monitor.clone()));
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();

        for ifname in ["wlan0", "wlan1"] {
            db.add_network(ifname)
                .set_value(NetworkMetric::Noise, radio, Layer2Value::Integer(-95_000))
                .unwrap();
        }

        assert!(db.remove_origin(radio.id));
        assert!(!db.remove_origin(radio.id));
        assert_eq!(db.networks().count(), 0);
        assert_eq!(
            *monitor.0.borrow(),
            vec!["+wlan0", "+wlan1", "-wlan0", "-wlan1"]
        );
    }

    #[test]
    fn test_remove_network_forces_children() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network(WLAN);
        db.add_neighbor(WLAN, mac(1)).unwrap();
        db.add_neighbor(WLAN, mac(2)).unwrap();
        db.add_destination(WLAN, mac(2), mac(7), radio).unwrap();
        db.take_events();

        assert!(db.remove_network(WLAN));
        let events = db.take_events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].kind(), EventKind::Removed);
        assert!(events.iter().all(|e| e.network() == WLAN));
    }

    #[test]
    fn test_relabel_hands_over_all_data() {
        let mut db = Layer2Db::new();
        let old = db.add_origin("old", ORIGIN_PRIORITY_CONFIGURED).unwrap();
        let new = db.add_origin("new", ORIGIN_PRIORITY_CONFIGURED).unwrap();
        db.add_network(WLAN)
            .set_neighbor_default(NeighborMetric::TxRlq, old, Layer2Value::Integer(80))
            .unwrap();
        db.add_neighbor(WLAN, mac(1))
            .unwrap()
            .add_ip(old, prefix("10.0.0.2"));

        db.net_relabel(WLAN, new, old.id);

        assert!(!db.net_remove(WLAN, old.id));
        let net = db.network(WLAN).unwrap();
        assert_eq!(net.neighbor_default(NeighborMetric::TxRlq).origin(), Some(new));
        assert_eq!(
            net.neighbor(&mac(1)).unwrap().remote_ips()[&prefix("10.0.0.2")],
            new
        );
    }

    #[test]
    fn test_query_falls_back_to_network_default() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        let net = db.add_network(WLAN);
        net.set_neighbor_default(NeighborMetric::TxBitrate, radio, Layer2Value::Integer(6_000_000))
            .unwrap();
        db.add_neighbor(WLAN, mac(1))
            .unwrap()
            .set_value(NeighborMetric::TxBitrate, radio, Layer2Value::Integer(54_000_000))
            .unwrap();

        let own = db.query_neighbor(WLAN, &mac(1), NeighborMetric::TxBitrate);
        assert_eq!(own.and_then(Layer2Data::integer), Some(54_000_000));

        let fallback = db.query_neighbor(WLAN, &mac(2), NeighborMetric::TxBitrate);
        assert_eq!(fallback.and_then(Layer2Data::integer), Some(6_000_000));

        assert!(db
            .query_neighbor(WLAN, &mac(1), NeighborMetric::Latency)
            .is_none());
        assert!(db
            .query_neighbor("eth0", &mac(1), NeighborMetric::TxBitrate)
            .is_none());
    }

    #[test]
    fn test_best_neighbor_match_prefers_longest_prefix() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        db.add_network("wlan0");
        db.add_network("wlan1");
        db.add_neighbor("wlan0", mac(1))
            .unwrap()
            .add_ip(radio, prefix("10.0.0.0/8"));
        db.add_neighbor("wlan1", mac(2))
            .unwrap()
            .add_ip(radio, prefix("10.1.0.0/16"));

        let hit = db.best_neighbor_match("10.1.2.3".parse().unwrap()).unwrap();
        assert_eq!(hit.network, "wlan1");
        assert_eq!(hit.neighbor, mac(2));
        assert_eq!(hit.prefix, prefix("10.1.0.0/16"));

        let hit = db.best_neighbor_match("10.9.0.1".parse().unwrap()).unwrap();
        assert_eq!(hit.neighbor, mac(1));

        assert!(db.best_neighbor_match("192.168.0.1".parse().unwrap()).is_none());
    }

    #[test]
    fn test_destinations() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        let other = db.add_origin("other", ORIGIN_PRIORITY_CONFIGURED).unwrap();
        db.add_network(WLAN);
        db.add_neighbor(WLAN, mac(1)).unwrap();

        assert!(db.add_destination(WLAN, mac(1), mac(9), radio).unwrap());
        assert!(!db.add_destination(WLAN, mac(1), mac(9), other).unwrap());
        assert_eq!(
            db.network(WLAN).unwrap().neighbor(&mac(1)).unwrap().destinations()[&mac(9)],
            radio
        );
        assert!(matches!(
            db.add_destination(WLAN, mac(5), mac(9), radio),
            Err(Layer2Error::UnknownNeighbor { .. })
        ));

        assert!(db.remove_destination(WLAN, mac(1), mac(9)));
        assert!(!db.remove_destination(WLAN, mac(1), mac(9)));
    }

    #[test]
    fn test_foreign_ip_removal_rejected() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        let other = db.add_origin("other", ORIGIN_PRIORITY_CONFIGURED).unwrap();
        let net = db.add_network(WLAN);
        net.add_ip(radio, prefix("fd00::1"));

        assert_eq!(
            net.remove_ip(&prefix("fd00::1"), other.id),
            Err(Layer2Error::ForeignOrigin)
        );
        assert!(net.remove_ip(&prefix("fd00::1"), radio.id).is_ok());
        assert!(net.peer_ips().is_empty());
    }

    #[test]
    fn test_type_mismatch() {
        let mut db = Layer2Db::new();
        let radio = db.add_origin("radio", ORIGIN_PRIORITY_RELIABLE).unwrap();
        let net = db.add_network(WLAN);
        assert_eq!(
            net.set_value(NetworkMetric::McsByProbing, radio, Layer2Value::Integer(1)),
            Err(Layer2Error::TypeMismatch("mcs_by_probing"))
        );
        assert_eq!(
            net.set_value(NetworkMetric::McsByProbing, radio, Layer2Value::Boolean(true)),
            Ok(true)
        );
    }
}
