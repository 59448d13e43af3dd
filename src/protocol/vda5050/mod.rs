//! Typed VDA5050 topic payloads (C3): common header plus the six topics.

pub mod common;
pub mod connection;
pub mod factsheet;
pub mod instant_actions;
pub mod order;
pub mod state;
pub mod visualization;

pub use common::{
    Action, ActionParameter, ActionParameterValue, AgvPosition, BlockingType, ControlPoint,
    Header, NodePosition, Trajectory, Velocity,
};
pub use connection::{Connection, ConnectionState};
pub use factsheet::Factsheet;
pub use instant_actions::InstantActions;
pub use order::{Edge, Node, Order};
pub use state::{
    ActionState, ActionStatus, BatteryState, EStop, Error, ErrorLevel, MapInfo, OperatingMode,
    SafetyState, State,
};
pub use visualization::Visualization;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_round_trip_omits_absent_header_fields() {
        let conn = Connection {
            header: Header::new(1, "acme", "agv-1"),
            connection_state: ConnectionState::Online,
        };
        let json = serde_json::to_value(&conn).unwrap();
        assert_eq!(json["connectionState"], "ONLINE");
        assert_eq!(json["manufacturer"], "acme");
        let back: Connection = serde_json::from_value(json).unwrap();
        assert_eq!(back.connection_state, ConnectionState::Online);
    }

    #[test]
    fn visualization_omits_absent_optionals() {
        let viz = Visualization {
            header: Header::new(1, "acme", "agv-1"),
            agv_position: None,
            velocity: None,
        };
        let json = serde_json::to_value(&viz).unwrap();
        assert!(json.get("agvPosition").is_none());
        assert!(json.get("velocity").is_none());
    }

    #[test]
    fn factsheet_header_fields_are_optional() {
        let fs = Factsheet {
            header_id: None,
            timestamp: None,
            version: "2.0.0".to_string(),
            manufacturer: "acme".to_string(),
            serial_number: "agv-1".to_string(),
            type_specification: Default::default(),
            physical_parameters: Default::default(),
            protocol_limits: Default::default(),
            protocol_features: Default::default(),
            agv_geometry: Default::default(),
            load_specification: Default::default(),
        };
        let json = serde_json::to_value(&fs).unwrap();
        assert!(json.get("headerId").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn action_parameter_value_untagged_decode() {
        let v: ActionParameterValue = serde_json::from_str("1.5").unwrap();
        assert_eq!(v.as_f64(), Some(1.5));
        let v: ActionParameterValue = serde_json::from_str("\"true\"").unwrap();
        assert_eq!(v.as_bool(), Some(true));
    }
}
