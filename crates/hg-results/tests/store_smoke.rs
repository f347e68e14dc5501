use std::collections::BTreeMap;

use hg_core::ObjectId;
use hg_results::*;

fn snapshot() -> PipeStates {
    let plugs = vec![
        PlugState {
            mass: 1000.0,
            temp: 89.5,
            entry_temp: 90.0,
            entry_step: 4,
        },
        PlugState {
            mass: 135_140.0,
            temp: 88.25,
            entry_temp: 90.0,
            entry_step: -1,
        },
    ];
    PipeStates {
        step: 5,
        pipes: BTreeMap::from([
            (ObjectId::from_index(2), plugs.clone()),
            (ObjectId::from_index(3), plugs[1..].to_vec()),
        ]),
    }
}

#[test]
fn save_and_load_snapshot() {
    let temp_dir = std::env::temp_dir().join("hg_results_store_smoke");
    let _ = std::fs::remove_dir_all(&temp_dir);

    let store = SnapshotStore::new(temp_dir.clone()).unwrap();
    let states = snapshot();
    store.save("day-1", &states).unwrap();
    store.save("day-2", &states).unwrap();

    assert!(store.has_snapshot("day-1"));
    assert_eq!(store.list().unwrap(), vec!["day-1", "day-2"]);

    let loaded = store.load("day-1").unwrap();
    assert_eq!(loaded, states);

    store.delete("day-1").unwrap();
    assert!(!store.has_snapshot("day-1"));
    assert!(matches!(
        store.load("day-1"),
        Err(ResultsError::SnapshotNotFound { .. })
    ));

    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn rejects_path_like_names() {
    let temp_dir = std::env::temp_dir().join("hg_results_store_names");
    let store = SnapshotStore::new(temp_dir.clone()).unwrap();
    for name in ["", "../escape", "a/b", ".hidden"] {
        assert!(matches!(
            store.save(name, &snapshot()),
            Err(ResultsError::InvalidName { .. })
        ));
    }
    let _ = std::fs::remove_dir_all(&temp_dir);
}

#[test]
fn pipe_states_json_uses_object_ids_as_keys() {
    let json = snapshot().to_json().unwrap();
    assert!(json.contains("\"2\""));
    assert!(json.contains("\"entry_step\": -1"));
    assert_eq!(PipeStates::from_json(&json).unwrap(), snapshot());
}

#[test]
fn reports_serialize_by_level() {
    let report = HeatLossReport::SupplyReturn {
        supply: HeatAndLoss {
            heat: Aggregate::Value(12.5),
            loss: Aggregate::Value(0.5),
        },
        return_: HeatAndLoss {
            heat: Aggregate::Series(vec![1.0, 2.0]),
            loss: Aggregate::Series(vec![0.0, 0.1]),
        },
    };
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.starts_with("{\"supply_return\""));
    assert!(json.contains("\"return\""));
    let back: HeatLossReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}
