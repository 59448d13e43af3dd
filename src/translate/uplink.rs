//! Uplink translator (C6): vendor state-push JSON → VDA5050 `state` / `visualization` /
//! `connection` / `factsheet`.

use std::f64::consts::PI;

use serde_json::Value;

use crate::protocol::vda5050::{
    ActionState, ActionStatus, AgvPosition, BatteryState, Connection, ConnectionState, EStop,
    Error, ErrorLevel, Header, MapInfo, OperatingMode, SafetyState, State, Velocity,
    Visualization,
};

fn get_f64(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(|x| x.as_f64())
}

fn get_bool(v: &Value, key: &str) -> Option<bool> {
    v.get(key).and_then(|x| x.as_bool())
}

fn get_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|x| x.as_str())
}

/// Normalises a raw angle to radians in `[-pi, pi]`. Vendors disagree on units; if the
/// magnitude exceeds 2*pi we assume degrees (no valid radian reading exceeds that).
fn normalize_theta(raw: f64) -> f64 {
    let radians = if raw.abs() > 2.0 * PI {
        raw.to_radians()
    } else {
        raw
    };
    let mut theta = radians % (2.0 * PI);
    if theta > PI {
        theta -= 2.0 * PI;
    } else if theta < -PI {
        theta += 2.0 * PI;
    }
    theta
}

fn agv_position(vendor: &Value) -> Option<AgvPosition> {
    let x = get_f64(vendor, "x")?;
    let y = get_f64(vendor, "y")?;
    let raw_theta = get_f64(vendor, "angle").or_else(|| get_f64(vendor, "yaw")).unwrap_or(0.0);
    let map_id = get_str(vendor, "current_map").unwrap_or("default").to_string();
    let localization_score = get_f64(vendor, "confidence").map(|c| c.clamp(0.0, 1.0));
    Some(AgvPosition {
        x,
        y,
        theta: normalize_theta(raw_theta),
        map_id,
        map_description: None,
        position_initialized: true,
        localization_score,
        deviation_range: None,
    })
}

fn velocity(vendor: &Value) -> Option<Velocity> {
    if !["vx", "vy", "w"].iter().any(|k| vendor.get(*k).is_some()) {
        return None;
    }
    Some(Velocity {
        vx: get_f64(vendor, "vx"),
        vy: get_f64(vendor, "vy"),
        omega: get_f64(vendor, "w"),
    })
}

fn battery_state(vendor: &Value) -> BatteryState {
    BatteryState {
        battery_charge: get_f64(vendor, "battery_level").unwrap_or(0.0),
        battery_voltage: get_f64(vendor, "voltage"),
        battery_health: None,
        charging: get_bool(vendor, "charging").unwrap_or(false),
        reach: None,
    }
}

fn task_status_to_action_status(status: &str) -> ActionStatus {
    match status.to_ascii_uppercase().as_str() {
        "RUNNING" => ActionStatus::Running,
        "COMPLETED" | "FINISHED" => ActionStatus::Finished,
        "FAILED" | "CANCELED" => ActionStatus::Failed,
        _ => ActionStatus::Waiting,
    }
}

fn action_states(vendor: &Value, header_id: u32) -> Vec<ActionState> {
    let Some(task_status) = get_str(vendor, "task_status") else {
        return Vec::new();
    };
    vec![ActionState {
        action_id: format!("action_{header_id}"),
        action_type: get_str(vendor, "task_type").map(String::from),
        action_description: None,
        action_status: task_status_to_action_status(task_status),
        result_description: Some(task_status.to_string()),
    }]
}

fn errors_and_warnings(vendor: &Value) -> Vec<Error> {
    let mut out = Vec::new();
    if let Some(errors) = vendor.get("errors").and_then(|v| v.as_array()) {
        for e in errors {
            out.push(Error {
                error_type: "DEVICE_ERROR".to_string(),
                error_level: ErrorLevel::Fatal,
                error_description: Some(value_to_description(e)),
                error_references: None,
            });
        }
    }
    if let Some(warnings) = vendor.get("warnings").and_then(|v| v.as_array()) {
        for w in warnings {
            out.push(Error {
                error_type: "DEVICE_WARNING".to_string(),
                error_level: ErrorLevel::Warning,
                error_description: Some(value_to_description(w)),
                error_references: None,
            });
        }
    }
    out
}

fn value_to_description(v: &Value) -> String {
    v.as_str().map(String::from).unwrap_or_else(|| v.to_string())
}

fn safety_state(vendor: &Value) -> SafetyState {
    let emergency = get_bool(vendor, "emergency").unwrap_or(false);
    let soft_emc = get_bool(vendor, "soft_emc").unwrap_or(false);
    let blocked = get_bool(vendor, "blocked").unwrap_or(false);
    SafetyState {
        e_stop: if emergency || soft_emc { EStop::Triggered } else { EStop::Autoack },
        field_violation: blocked,
    }
}

fn operating_mode(vendor: &Value) -> OperatingMode {
    if get_bool(vendor, "emergency").unwrap_or(false) {
        OperatingMode::Emergency
    } else if get_bool(vendor, "soft_emc").unwrap_or(false) {
        OperatingMode::Semiautomatic
    } else if get_bool(vendor, "charging").unwrap_or(false) {
        OperatingMode::Service
    } else {
        OperatingMode::Automatic
    }
}

fn driving(vendor: &Value) -> bool {
    match get_bool(vendor, "is_stop") {
        Some(is_stop) => !is_stop,
        None => {
            let vx = get_f64(vendor, "vx").unwrap_or(0.0);
            let vy = get_f64(vendor, "vy").unwrap_or(0.0);
            let w = get_f64(vendor, "w").unwrap_or(0.0);
            vx != 0.0 || vy != 0.0 || w != 0.0
        }
    }
}

/// Builds the VDA5050 `state` uplink from a vendor state-push JSON body, per §4.6.
pub fn state_from_vendor(
    vendor: &Value,
    header_id: u32,
    manufacturer: &str,
    order_id: &str,
    order_update_id: u32,
) -> State {
    let serial_number = get_str(vendor, "vehicle_id").unwrap_or("unknown").to_string();
    let position = agv_position(vendor);
    let current_station = get_str(vendor, "current_station");
    let node_states = current_station
        .filter(|s| !s.is_empty())
        .map(|s| crate::protocol::vda5050::state::NodeState {
            node_id: s.to_string(),
            sequence_id: 0,
            node_description: None,
            released: false,
        })
        .into_iter()
        .collect::<Vec<_>>();
    let last_node_id = current_station.unwrap_or("").to_string();

    State {
        header: Header::new(header_id, manufacturer, &serial_number),
        order_id: order_id.to_string(),
        order_update_id,
        zone_set_id: None,
        last_node_id,
        last_node_sequence_id: 0,
        driving: driving(vendor),
        paused: get_bool(vendor, "is_stop"),
        new_base_request: None,
        distance_since_last_node: get_f64(vendor, "target_dist"),
        operating_mode: operating_mode(vendor),
        node_states,
        edge_states: Vec::new(),
        agv_position: position,
        velocity: velocity(vendor),
        action_states: action_states(vendor, header_id),
        battery_state: battery_state(vendor),
        errors: errors_and_warnings(vendor),
        information: Vec::new(),
        safety_state: safety_state(vendor),
        maps: get_str(vendor, "current_map")
            .map(|m| {
                vec![MapInfo {
                    map_id: m.to_string(),
                    map_version: None,
                    map_status: Some("ENABLED".to_string()),
                    map_description: None,
                }]
            })
            .unwrap_or_default(),
        loads: Vec::new(),
    }
}

/// Builds the VDA5050 `visualization` uplink: position and velocity only, per §6.1.
pub fn visualization_from_vendor(vendor: &Value, header_id: u32, manufacturer: &str, serial: &str) -> Visualization {
    Visualization {
        header: Header::new(header_id, manufacturer, serial),
        agv_position: agv_position(vendor),
        velocity: velocity(vendor),
    }
}

pub fn connection_uplink(
    header_id: u32,
    manufacturer: &str,
    serial: &str,
    state: ConnectionState,
) -> Connection {
    Connection {
        header: Header::new(header_id, manufacturer, serial),
        connection_state: state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scenario_4_state_push_to_state() {
        let vendor = json!({
            "vehicle_id": "A",
            "x": 1.0,
            "y": 2.0,
            "angle": 180.0,
            "current_map": "m",
            "battery_level": 0.5,
            "emergency": false,
            "is_stop": true
        });
        let state = state_from_vendor(&vendor, 1, "acme", "order_A", 0);
        let pos = state.agv_position.unwrap();
        assert_eq!(pos.x, 1.0);
        assert_eq!(pos.y, 2.0);
        assert!((pos.theta - PI).abs() < 1e-9);
        assert!(pos.position_initialized);
        assert_eq!(state.battery_state.battery_charge, 0.5);
        assert_eq!(state.safety_state.e_stop, EStop::Autoack);
        assert_eq!(state.paused, Some(true));
        assert!(!state.driving);
        assert_eq!(state.operating_mode, OperatingMode::Automatic);
        assert_eq!(state.header.serial_number, "A");
    }

    #[test]
    fn localization_score_is_clamped() {
        let vendor = json!({"vehicle_id": "A", "x": 0.0, "y": 0.0, "confidence": 1.7});
        let pos = agv_position(&vendor).unwrap();
        assert_eq!(pos.localization_score, Some(1.0));
    }

    #[test]
    fn small_angle_is_treated_as_radians_already() {
        let vendor = json!({"vehicle_id": "A", "x": 0.0, "y": 0.0, "angle": 1.0});
        let pos = agv_position(&vendor).unwrap();
        assert!((pos.theta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn driving_defaults_from_motion_when_is_stop_absent() {
        let vendor = json!({"vehicle_id": "A", "vx": 1.0});
        assert!(driving(&vendor));
        let vendor = json!({"vehicle_id": "A"});
        assert!(!driving(&vendor));
    }

    #[test]
    fn emergency_sets_triggered_and_emergency_mode() {
        let vendor = json!({"vehicle_id": "A", "emergency": true});
        assert_eq!(safety_state(&vendor).e_stop, EStop::Triggered);
        assert_eq!(operating_mode(&vendor), OperatingMode::Emergency);
    }
}
