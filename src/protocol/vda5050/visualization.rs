//! `visualization` topic payload: high-rate position/velocity feed.

use serde::{Deserialize, Serialize};

use super::common::{AgvPosition, Header, Velocity};

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    #[serde(flatten)]
    pub header: Header,
    pub agv_position: Option<AgvPosition>,
    pub velocity: Option<Velocity>,
}
