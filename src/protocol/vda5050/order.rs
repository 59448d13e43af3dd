//! `order` topic payload: the navigation/action graph sent downlink to an AGV.

use serde::{Deserialize, Serialize};

use super::common::{Action, Header, NodePosition, Trajectory};

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(flatten)]
    pub header: Header,
    pub order_id: String,
    pub order_update_id: u32,
    pub zone_set_id: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub node_id: String,
    pub sequence_id: u32,
    pub node_description: Option<String>,
    pub released: bool,
    pub node_position: Option<NodePosition>,
    pub actions: Vec<Action>,
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub edge_id: String,
    pub sequence_id: u32,
    pub edge_description: Option<String>,
    pub released: bool,
    pub start_node_id: String,
    pub end_node_id: String,
    pub max_speed: Option<f64>,
    pub max_height: Option<f64>,
    pub min_height: Option<f64>,
    pub orientation: Option<f64>,
    pub direction: Option<String>,
    pub rotation_allowed: Option<bool>,
    pub max_rotation_speed: Option<f64>,
    pub length: Option<f64>,
    pub trajectory: Option<Trajectory>,
    pub actions: Vec<Action>,
}
