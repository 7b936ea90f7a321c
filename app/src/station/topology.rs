//! Station identity and node discovery.
//!
//! A station's telemetry keys decide which module nodes exist. Discovery
//! is idempotent: it only emits descriptors for addresses the registry
//! does not know yet, in catalog order.

use serde_json::{Map, Value};

use super::catalog::ModuleKind;
use super::registry::{NodeDescriptor, StationRegistry};
use crate::port::StationSnapshot;

/// Hardware family, derived from the first three MAC octets. Purely
/// informational for naming and diagnostics; all families get the same
/// per-module topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationClass {
    /// Observer IP module, used by most fixed sensor arrays.
    ObserverIp,
    /// WS-2902 console.
    Ws2902,
    /// WS-1002-WIFI console (reports no rain total).
    Ws1002,
    Generic,
}

impl StationClass {
    fn from_mac(mac: &str) -> Self {
        let prefix: String = mac
            .chars()
            .filter(|c| *c != ':')
            .take(6)
            .collect::<String>()
            .to_uppercase();

        match prefix.as_str() {
            "000EC6" => StationClass::ObserverIp,
            "ECFABC" => StationClass::Ws2902,
            "C0210D" => StationClass::Ws1002,
            _ => StationClass::Generic,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StationClass::ObserverIp => "Observer IP",
            StationClass::Ws2902 => "WS-2902",
            StationClass::Ws1002 => "WS-1002",
            StationClass::Generic => "generic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationIdentity {
    /// MAC with separators stripped, lowercased. Nothing else is removed:
    /// dropping zero digits (as one firmware-era integration did) can
    /// collide distinct MACs.
    pub station_id: String,
    pub class: StationClass,
    pub name: String,
}

impl StationIdentity {
    pub fn new(mac_address: &str, name: &str) -> Self {
        let station_id = mac_address.replace(':', "").to_lowercase();
        let class = StationClass::from_mac(mac_address);

        let name = if name.is_empty() {
            station_id.clone()
        } else {
            name.to_owned()
        };

        Self {
            station_id,
            class,
            name,
        }
    }

    pub fn from_snapshot(snapshot: &StationSnapshot) -> Self {
        Self::new(&snapshot.mac_address, &snapshot.info.name)
    }

    pub fn node_address(&self, kind: ModuleKind) -> String {
        format!("{}{}", self.station_id, kind.address_suffix())
    }

    fn node_name(&self, kind: ModuleKind) -> String {
        match kind {
            ModuleKind::MainStatus => self.name.clone(),
            _ => format!("{} {}", self.name, kind.label()),
        }
    }
}

/// Emits a descriptor for every module whose defining fields are all
/// present in `data` and whose address the registry does not know yet.
/// Catalog order keeps address assignment deterministic.
pub fn discover(
    identity: &StationIdentity,
    data: &Map<String, Value>,
    registry: &StationRegistry,
) -> Vec<NodeDescriptor> {
    let mut descriptors = vec![];

    for kind in ModuleKind::all() {
        if !kind.defining_fields().iter().all(|field| data.contains_key(field)) {
            continue;
        }

        let address = identity.node_address(kind);
        if registry.contains(&address) {
            continue;
        }

        let parent = match kind {
            ModuleKind::MainStatus => None,
            _ => Some(identity.station_id.clone()),
        };

        descriptors.push(NodeDescriptor {
            address,
            station_id: identity.station_id.clone(),
            kind,
            name: identity.node_name(kind),
            parent,
        });
    }

    descriptors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(fields: &[(&str, f64)]) -> Map<String, Value> {
        fields.iter().map(|(k, v)| (k.to_string(), json!(v))).collect()
    }

    fn backyard() -> StationIdentity {
        StationIdentity::new("00:0E:C6:AA:BB:CC", "Backyard")
    }

    #[test]
    fn test_station_id_strips_separators_and_lowercases() {
        let identity = backyard();
        assert_eq!(identity.station_id, "000ec6aabbcc");
        assert_eq!(identity.class, StationClass::ObserverIp);
    }

    #[test]
    fn test_zero_digits_survive_normalization() {
        let identity = StationIdentity::new("C0:21:0D:00:00:01", "Console");
        assert_eq!(identity.station_id, "c0210d000001");
        assert_eq!(identity.class, StationClass::Ws1002);
    }

    #[test]
    fn test_unknown_prefix_is_generic() {
        let identity = StationIdentity::new("12:34:56:78:9A:BC", "Shed");
        assert_eq!(identity.class, StationClass::Generic);
    }

    #[test]
    fn test_main_status_is_always_discovered() {
        let registry = StationRegistry::new();
        let descriptors = discover(&backyard(), &Map::new(), &registry);

        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].kind, ModuleKind::MainStatus);
        assert_eq!(descriptors[0].address, "000ec6aabbcc");
        assert_eq!(descriptors[0].parent, None);
    }

    #[test]
    fn test_discovery_follows_field_presence() {
        let registry = StationRegistry::new();
        let data = data(&[("tempf", 72.5), ("humidity", 55.0), ("winddir", 10.0)]);

        let descriptors = discover(&backyard(), &data, &registry);
        let kinds: Vec<_> = descriptors.iter().map(|d| d.kind).collect();

        assert_eq!(
            kinds,
            vec![
                ModuleKind::MainStatus,
                ModuleKind::TempOutside,
                ModuleKind::HumidityOutside,
                ModuleKind::Wind,
            ]
        );
    }

    #[test]
    fn test_grouped_modules_need_all_fields() {
        let registry = StationRegistry::new();

        let partial = data(&[("baromabsin", 29.9)]);
        let descriptors = discover(&backyard(), &partial, &registry);
        assert!(!descriptors.iter().any(|d| d.kind == ModuleKind::Pressure));

        let complete = data(&[("baromabsin", 29.9), ("baromrelin", 30.1)]);
        let descriptors = discover(&backyard(), &complete, &registry);
        let pressure: Vec<_> = descriptors.iter().filter(|d| d.kind == ModuleKind::Pressure).collect();
        assert_eq!(pressure.len(), 1);
        assert_eq!(pressure[0].address, "000ec6aabbccpr");
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let mut registry = StationRegistry::new();
        let data = data(&[("tempf", 72.5), ("soilhum2", 40.0)]);

        let first = discover(&backyard(), &data, &registry);
        assert!(!first.is_empty());
        for descriptor in first {
            registry.register_if_absent(descriptor);
        }

        let second = discover(&backyard(), &data, &registry);
        assert!(second.is_empty());
    }

    #[test]
    fn test_module_nodes_hang_off_their_station() {
        let registry = StationRegistry::new();
        let data = data(&[("temp3f", 68.0)]);

        let descriptors = discover(&backyard(), &data, &registry);
        let aux = descriptors
            .iter()
            .find(|d| d.kind == ModuleKind::AuxTempHumidity(3))
            .expect("aux sensor not discovered");

        assert_eq!(aux.address, "000ec6aabbccas3");
        assert_eq!(aux.parent.as_deref(), Some("000ec6aabbcc"));
        assert_eq!(aux.name, "Backyard Sensor 3");
    }
}
