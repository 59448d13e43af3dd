//! Types shared across the six VDA5050 topic payloads.

use serde::{Deserialize, Serialize};

pub const VDA5050_VERSION: &str = "2.0.0";

/// Common header carried by every VDA5050 message.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub header_id: u32,
    pub timestamp: String,
    pub version: String,
    pub manufacturer: String,
    pub serial_number: String,
}

impl Header {
    pub fn new(header_id: u32, manufacturer: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            header_id,
            timestamp: crate::utils::now_iso8601(),
            version: VDA5050_VERSION.to_string(),
            manufacturer: manufacturer.into(),
            serial_number: serial_number.into(),
        }
    }
}

/// Node Action Object.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub action_type: String,
    pub action_id: String,
    pub action_description: Option<String>,
    pub blocking_type: BlockingType,
    pub action_parameters: Option<Vec<ActionParameter>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockingType {
    None,
    Soft,
    Hard,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ActionParameter {
    pub key: String,
    pub value: ActionParameterValue,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum ActionParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ActionParameterValue>),
}

impl ActionParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ActionParameterValue::Int(i) => Some(*i as f64),
            ActionParameterValue::Float(f) => Some(*f),
            ActionParameterValue::Str(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ActionParameterValue::Bool(b) => Some(*b),
            ActionParameterValue::Str(s) => s.parse::<bool>().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ActionParameterValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Node position as carried by order nodes (distinct from `AgvPosition`: no
/// `positionInitialized`/`localizationScore`, but carries allowed deviations).
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    pub map_id: String,
    pub theta: Option<f64>,
    pub allowed_deviation_xy: Option<f64>,
    pub allowed_deviation_theta: Option<f64>,
    pub map_description: Option<String>,
}

/// AGV's own reported position, carried by `state` and `visualization`.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgvPosition {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub map_id: String,
    pub map_description: Option<String>,
    pub position_initialized: bool,
    pub localization_score: Option<f64>,
    pub deviation_range: Option<f64>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Velocity {
    pub vx: Option<f64>,
    pub vy: Option<f64>,
    pub omega: Option<f64>,
}

/// NURBS control point, carried by edge trajectories. Not produced by this bridge but
/// round-tripped on decode (the teacher's simulator consumes trajectories for motion
/// interpolation; the bridge only forwards them).
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControlPoint {
    pub x: f64,
    pub y: f64,
    pub weight: Option<f64>,
    pub orientation: Option<f64>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub degree: i64,
    pub knot_vector: Vec<f64>,
    pub control_points: Vec<ControlPoint>,
}
