//! `connection` topic payload: AGV reachability edges.

use serde::{Deserialize, Serialize};

use super::common::Header;

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(flatten)]
    pub header: Header,
    pub connection_state: ConnectionState,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionState {
    Online,
    Offline,
    Connectionbroken,
}
