//! `factsheet` topic payload: static AGV self-description.

use serde::{Deserialize, Serialize};

use super::common::Header;

/// Deviation from the common header: `headerId`/`timestamp` are optional here, the only
/// topic where that's true.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Factsheet {
    pub header_id: Option<u32>,
    pub timestamp: Option<String>,
    pub version: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub type_specification: TypeSpecification,
    pub physical_parameters: PhysicalParameters,
    pub protocol_limits: ProtocolLimits,
    pub protocol_features: ProtocolFeatures,
    pub agv_geometry: AgvGeometry,
    pub load_specification: LoadSpecification,
}

impl Factsheet {
    pub fn with_header(mut self, header: Header) -> Self {
        self.header_id = Some(header.header_id);
        self.timestamp = Some(header.timestamp);
        self.version = header.version;
        self.manufacturer = header.manufacturer;
        self.serial_number = header.serial_number;
        self
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpecification {
    pub series_name: Option<String>,
    pub series_description: Option<String>,
    pub agv_kinematic: Option<String>,
    pub agv_class: Option<String>,
    pub max_load_mass: Option<f64>,
    pub localization_types: Vec<String>,
    pub navigation_types: Vec<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalParameters {
    pub speed_min: Option<f64>,
    pub speed_max: Option<f64>,
    pub acceleration_max: Option<f64>,
    pub deceleration_max: Option<f64>,
    pub height_min: Option<f64>,
    pub height_max: Option<f64>,
    pub width: Option<f64>,
    pub length: Option<f64>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolLimits {
    pub max_string_lens: Option<MaxStringLens>,
    pub max_array_lens: Option<MaxArrayLens>,
    pub timing: Option<Timing>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaxStringLens {
    pub msg_len: Option<u32>,
    pub topic_serial_len: Option<u32>,
    pub id_len: Option<u32>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaxArrayLens {
    pub order_nodes: Option<u32>,
    pub order_edges: Option<u32>,
    pub node_actions: Option<u32>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub min_order_interval: Option<f64>,
    pub min_state_interval: Option<f64>,
    pub default_state_interval: Option<f64>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolFeatures {
    pub optional_parameters: Vec<String>,
    pub agv_actions: Vec<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgvGeometry {
    pub wheel_definitions: Vec<serde_json::Value>,
    pub envelopes2d: Vec<serde_json::Value>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadSpecification {
    pub load_positions: Vec<String>,
    pub load_sets: Vec<serde_json::Value>,
}
