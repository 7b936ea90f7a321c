//! Applies one telemetry snapshot to the registry.
//!
//! Every catalog entry whose vendor field is present routes independently.
//! Fields for modules that were never discovered, or for stations the
//! registry does not know, are skipped silently; absent fields leave prior
//! slot values untouched.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::catalog::{self, FieldContext};
use super::registry::StationRegistry;

/// One slot update that was applied to the registry. `changed` drives
/// reporting to the controller: unchanged values are not re-sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotWrite {
    pub address: String,
    pub slot: &'static str,
    pub value: f64,
    pub changed: bool,
}

pub fn route_snapshot(
    station_id: &str,
    data: &Map<String, Value>,
    registry: &mut StationRegistry,
) -> Vec<SlotWrite> {
    let mut writes = vec![];
    let mut ambiguous_indexes = HashSet::new();

    for entry in catalog::entries() {
        let Some(raw) = data.get(&entry.field) else {
            continue;
        };

        let Some(raw) = raw.as_f64() else {
            tracing::trace!("Ignoring non-numeric value for field {}: {}", entry.field, raw);
            continue;
        };

        if !context_allows(entry.context, data, &mut ambiguous_indexes) {
            continue;
        }

        let address = format!("{}{}", station_id, entry.kind.address_suffix());
        let Some(node) = registry.lookup_mut(&address) else {
            continue;
        };

        let value = match entry.convert {
            Some(conversion) => conversion.apply(raw),
            None => raw,
        };

        let changed = node.set_slot(entry.slot, value);
        writes.push(SlotWrite {
            address,
            slot: entry.slot,
            value,
            changed,
        });
    }

    writes
}

/// Resolves guarded entries against sibling fields in the current
/// snapshot. When a snapshot carries both an aux sensor and a soil sensor
/// at the same index, the shared fields cannot be attributed: they are
/// skipped with a diagnostic instead of guessed. With no sibling context
/// at all, the aux sensor wins.
fn context_allows(
    context: FieldContext,
    data: &Map<String, Value>,
    ambiguous_indexes: &mut HashSet<u8>,
) -> bool {
    let (n, wants_aux) = match context {
        FieldContext::Unconditional => return true,
        FieldContext::AuxSensor(n) => (n, true),
        FieldContext::SoilSensor(n) => (n, false),
    };

    let aux_present = data.contains_key(&catalog::aux_temp_field(n));
    let soil_present =
        data.contains_key(&catalog::soil_humidity_field(n)) || data.contains_key(&catalog::soil_temp_field(n));

    match (aux_present, soil_present) {
        (true, true) => {
            if ambiguous_indexes.insert(n) {
                tracing::warn!(
                    "Aux sensor and soil sensor both report at index {}; skipping their shared fields",
                    n
                );
            }
            false
        }
        (false, true) => !wants_aux,
        //aux context, or no context at all (tie-break toward aux)
        _ => wants_aux,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::station::topology::{self, StationIdentity};

    fn data(fields: &[(&str, Value)]) -> Map<String, Value> {
        fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn backyard() -> StationIdentity {
        StationIdentity::new("00:0E:C6:AA:BB:CC", "Backyard")
    }

    fn discover_and_register(identity: &StationIdentity, data: &Map<String, Value>, registry: &mut StationRegistry) {
        for descriptor in topology::discover(identity, data, registry) {
            registry.register_if_absent(descriptor);
        }
    }

    #[test]
    fn test_main_cluster_routing_with_derivations() {
        let identity = backyard();
        let data = data(&[
            ("tempf", json!(72.5)),
            ("humidity", json!(55)),
            ("solarradiation", json!(400)),
            ("winddir", json!(10)),
        ]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);

        let writes = route_snapshot(&identity.station_id, &data, &mut registry);
        assert!(!writes.is_empty());

        let main = registry.lookup("000ec6aabbcc").expect("station node missing");
        assert_eq!(main.slot("CLITEMP"), Some(72.5));
        assert_eq!(main.slot("CLIHUM"), Some(55.0));
        assert_eq!(main.slot("LUMIN"), Some(50633.0));
        assert_eq!(main.slot("GV16"), Some(1.0));
    }

    #[test]
    fn test_absent_fields_keep_last_known_values() {
        let identity = backyard();
        let full = data(&[
            ("tempf", json!(72.5)),
            ("humidity", json!(55)),
            ("solarradiation", json!(400)),
            ("winddir", json!(10)),
        ]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &full, &mut registry);
        route_snapshot(&identity.station_id, &full, &mut registry);

        let partial = data(&[("tempf", json!(73.0))]);
        let writes = route_snapshot(&identity.station_id, &partial, &mut registry);

        //tempf feeds the station cluster and the outside-temperature node
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|w| w.changed));

        let main = registry.lookup("000ec6aabbcc").unwrap();
        assert_eq!(main.slot("CLITEMP"), Some(73.0));
        assert_eq!(main.slot("CLIHUM"), Some(55.0));
        assert_eq!(main.slot("LUMIN"), Some(50633.0));
        assert_eq!(main.slot("GV16"), Some(1.0));
    }

    #[test]
    fn test_unknown_station_updates_nothing() {
        let mut registry = StationRegistry::new();
        let data = data(&[("tempf", json!(72.5))]);

        let writes = route_snapshot("ffffffffffff", &data, &mut registry);
        assert!(writes.is_empty());
    }

    #[test]
    fn test_undiscovered_module_is_skipped() {
        let identity = backyard();
        let initial = data(&[("tempf", json!(72.5))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &initial, &mut registry);

        //humidity module was never discovered; its field is dropped but
        //the station cluster slot still updates
        let update = data(&[("tempf", json!(73.0)), ("humidity", json!(60))]);
        let writes = route_snapshot(&identity.station_id, &update, &mut registry);

        assert!(writes.iter().any(|w| w.slot == "CLIHUM"));
        assert!(!writes.iter().any(|w| w.address.ends_with("ho")));
    }

    #[test]
    fn test_repeated_snapshot_reports_no_changes() {
        let identity = backyard();
        let data = data(&[("tempf", json!(72.5)), ("winddir", json!(190))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);

        let first = route_snapshot(&identity.station_id, &data, &mut registry);
        assert!(first.iter().all(|w| w.changed));

        let second = route_snapshot(&identity.station_id, &data, &mut registry);
        assert_eq!(first.len(), second.len());
        assert!(second.iter().all(|w| !w.changed));
    }

    #[test]
    fn test_battery_follows_aux_context() {
        let identity = backyard();
        let data = data(&[("temp3f", json!(68.0)), ("batt3", json!(1))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);
        route_snapshot(&identity.station_id, &data, &mut registry);

        let aux = registry.lookup("000ec6aabbccas3").expect("aux node missing");
        assert_eq!(aux.slot("ST"), Some(68.0));
        assert_eq!(aux.slot("GV1"), Some(1.0));
    }

    #[test]
    fn test_battery_follows_soil_context() {
        let identity = backyard();
        let data = data(&[("soilhum2", json!(40.0)), ("soiltemp2", json!(55.0)), ("batt2", json!(1))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);
        route_snapshot(&identity.station_id, &data, &mut registry);

        let soil = registry.lookup("000ec6aabbccsm2").expect("soil node missing");
        assert_eq!(soil.slot("ST"), Some(40.0));
        assert_eq!(soil.slot("GV0"), Some(55.0));
        assert_eq!(soil.slot("GV1"), Some(1.0));
    }

    #[test]
    fn test_conflicting_context_skips_shared_fields() {
        let identity = backyard();
        let data = data(&[
            ("temp4f", json!(68.0)),
            ("soilhum4", json!(40.0)),
            ("batt4", json!(1)),
            ("feelsLike4", json!(66.0)),
        ]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);
        route_snapshot(&identity.station_id, &data, &mut registry);

        //own fields still route
        let aux = registry.lookup("000ec6aabbccas4").unwrap();
        assert_eq!(aux.slot("ST"), Some(68.0));
        let soil = registry.lookup("000ec6aabbccsm4").unwrap();
        assert_eq!(soil.slot("ST"), Some(40.0));

        //shared fields are attributed to neither
        assert_eq!(aux.slot("GV1"), None);
        assert_eq!(aux.slot("GV2"), None);
        assert_eq!(soil.slot("GV1"), None);
    }

    #[test]
    fn test_battery_without_context_prefers_aux() {
        let identity = backyard();
        let initial = data(&[("temp5f", json!(68.0))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &initial, &mut registry);

        let update = data(&[("batt5", json!(0))]);
        route_snapshot(&identity.station_id, &update, &mut registry);

        let aux = registry.lookup("000ec6aabbccas5").unwrap();
        assert_eq!(aux.slot("GV1"), Some(0.0));
    }

    #[test]
    fn test_non_numeric_values_are_ignored() {
        let identity = backyard();
        let data = data(&[("tempf", json!("not-a-number"))]);

        let mut registry = StationRegistry::new();
        discover_and_register(&identity, &data, &mut registry);

        let writes = route_snapshot(&identity.station_id, &data, &mut registry);
        assert!(writes.is_empty());
    }
}
