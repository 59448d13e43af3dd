//! `instantActions` topic payload.

use serde::{Deserialize, Serialize};

use super::common::{Action, Header};

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InstantActions {
    #[serde(flatten)]
    pub header: Header,
    pub actions: Vec<Action>,
}
