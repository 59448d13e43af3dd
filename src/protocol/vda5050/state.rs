//! `state` topic payload: the AGV's full status report.

use serde::{Deserialize, Serialize};

use super::common::{AgvPosition, Header, Velocity};

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(flatten)]
    pub header: Header,
    pub order_id: String,
    pub order_update_id: u32,
    pub zone_set_id: Option<String>,
    pub last_node_id: String,
    pub last_node_sequence_id: u32,
    pub driving: bool,
    pub paused: Option<bool>,
    pub new_base_request: Option<bool>,
    pub distance_since_last_node: Option<f64>,
    pub operating_mode: OperatingMode,
    pub node_states: Vec<NodeState>,
    pub edge_states: Vec<EdgeState>,
    pub agv_position: Option<AgvPosition>,
    pub velocity: Option<Velocity>,
    pub action_states: Vec<ActionState>,
    pub battery_state: BatteryState,
    pub errors: Vec<Error>,
    pub information: Vec<InfoEntry>,
    pub safety_state: SafetyState,
    pub maps: Vec<MapInfo>,
    pub loads: Vec<Load>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingMode {
    Automatic,
    Semiautomatic,
    Manual,
    Service,
    Teachin,
    Emergency,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub node_id: String,
    pub sequence_id: u32,
    pub node_description: Option<String>,
    pub released: bool,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EdgeState {
    pub edge_id: String,
    pub sequence_id: u32,
    pub edge_description: Option<String>,
    pub released: bool,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActionState {
    pub action_id: String,
    pub action_type: Option<String>,
    pub action_description: Option<String>,
    pub action_status: ActionStatus,
    pub result_description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Waiting,
    Initializing,
    Running,
    Paused,
    Finished,
    Failed,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BatteryState {
    pub battery_charge: f64,
    pub battery_voltage: Option<f64>,
    pub battery_health: Option<f64>,
    pub charging: bool,
    pub reach: Option<u32>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    pub error_type: String,
    pub error_level: ErrorLevel,
    pub error_description: Option<String>,
    pub error_references: Option<Vec<ErrorReference>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorLevel {
    Warning,
    Fatal,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReference {
    pub reference_key: String,
    pub reference_value: String,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InfoEntry {
    pub info_type: String,
    pub info_level: Option<String>,
    pub info_description: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SafetyState {
    pub e_stop: EStop,
    pub field_violation: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EStop {
    Autoack,
    Manual,
    Remote,
    Triggered,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    pub map_id: String,
    pub map_version: Option<String>,
    pub map_status: Option<String>,
    pub map_description: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Load {
    pub load_id: Option<String>,
    pub load_type: Option<String>,
    pub load_position: Option<String>,
    pub weight: Option<f64>,
}
