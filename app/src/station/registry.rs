//! The node registry: the single owned arena of controller nodes, keyed by
//! address. Only the update cycle mutates it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::catalog::ModuleKind;

/// A module node about to be created. Emitted by discovery, registered
/// after the controller confirmed the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub address: String,
    pub station_id: String,
    pub kind: ModuleKind,
    pub name: String,
    /// Parent node address; `None` means the node hangs directly off the
    /// controller (station-status nodes).
    pub parent: Option<String>,
}

#[derive(Debug)]
pub struct ModuleNode {
    pub address: String,
    pub station_id: String,
    pub kind: ModuleKind,
    pub name: String,
    slots: HashMap<&'static str, f64>,
}

impl ModuleNode {
    fn new(descriptor: NodeDescriptor) -> Self {
        Self {
            address: descriptor.address,
            station_id: descriptor.station_id,
            kind: descriptor.kind,
            name: descriptor.name,
            slots: HashMap::new(),
        }
    }

    pub fn slot(&self, name: &str) -> Option<f64> {
        self.slots.get(name).copied()
    }

    /// Stores a slot value; returns whether the stored value changed.
    /// Absent fields never reach this point, so prior values survive
    /// partial snapshots.
    pub fn set_slot(&mut self, slot: &'static str, value: f64) -> bool {
        self.slots.insert(slot, value) != Some(value)
    }

    pub fn slot_values(&self) -> Vec<(&'static str, f64)> {
        let mut values: Vec<_> = self.slots.iter().map(|(k, v)| (*k, *v)).collect();
        values.sort_by_key(|(slot, _)| *slot);
        values
    }
}

#[derive(Default)]
pub struct StationRegistry {
    nodes: HashMap<String, ModuleNode>,
    creation_order: Vec<String>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent node creation. The returned flag tells whether the node
    /// was created by this call.
    pub fn register_if_absent(&mut self, descriptor: NodeDescriptor) -> (&mut ModuleNode, bool) {
        match self.nodes.entry(descriptor.address.clone()) {
            Entry::Occupied(existing) => (existing.into_mut(), false),
            Entry::Vacant(slot) => {
                self.creation_order.push(slot.key().clone());
                (slot.insert(ModuleNode::new(descriptor)), true)
            }
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains_key(address)
    }

    /// Whether any node of this station has been created yet.
    pub fn knows_station(&self, station_id: &str) -> bool {
        self.nodes.values().any(|node| node.station_id == station_id)
    }

    pub fn lookup(&self, address: &str) -> Option<&ModuleNode> {
        self.nodes.get(address)
    }

    pub fn lookup_mut(&mut self, address: &str) -> Option<&mut ModuleNode> {
        self.nodes.get_mut(address)
    }

    /// All nodes in creation order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.creation_order
            .iter()
            .filter_map(|address| self.nodes.get(address))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(address: &str, kind: ModuleKind) -> NodeDescriptor {
        NodeDescriptor {
            address: address.to_owned(),
            station_id: "000ec6aabbcc".to_owned(),
            kind,
            name: "Backyard".to_owned(),
            parent: None,
        }
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut registry = StationRegistry::new();

        let (_, created) = registry.register_if_absent(descriptor("000ec6aabbcc", ModuleKind::MainStatus));
        assert!(created);

        let (_, created) = registry.register_if_absent(descriptor("000ec6aabbcc", ModuleKind::MainStatus));
        assert!(!created);

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_iteration_follows_creation_order() {
        let mut registry = StationRegistry::new();
        registry.register_if_absent(descriptor("000ec6aabbcc", ModuleKind::MainStatus));
        registry.register_if_absent(descriptor("000ec6aabbccto", ModuleKind::TempOutside));
        registry.register_if_absent(descriptor("000ec6aabbccpr", ModuleKind::Pressure));

        let addresses: Vec<_> = registry.all_nodes().map(|n| n.address.as_str()).collect();
        assert_eq!(addresses, vec!["000ec6aabbcc", "000ec6aabbccto", "000ec6aabbccpr"]);
    }

    #[test]
    fn test_slot_change_detection() {
        let mut registry = StationRegistry::new();
        let (node, _) = registry.register_if_absent(descriptor("000ec6aabbcc", ModuleKind::MainStatus));

        assert!(node.set_slot("CLITEMP", 72.5));
        assert!(!node.set_slot("CLITEMP", 72.5));
        assert!(node.set_slot("CLITEMP", 73.0));
        assert_eq!(node.slot("CLITEMP"), Some(73.0));
    }

    #[test]
    fn test_lookup_unknown_address() {
        let registry = StationRegistry::new();
        assert!(registry.lookup("ffffffffffff").is_none());
    }

    #[test]
    fn test_knows_station_after_any_node() {
        let mut registry = StationRegistry::new();
        assert!(!registry.knows_station("000ec6aabbcc"));

        registry.register_if_absent(descriptor("000ec6aabbccto", ModuleKind::TempOutside));
        assert!(registry.knows_station("000ec6aabbcc"));
        assert!(!registry.knows_station("ecfabc112233"));
    }
}
