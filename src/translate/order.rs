//! Order translator (C4): VDA5050 order graph → ordered vendor move-task list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::protocol::registry;
use crate::protocol::vda5050::{Edge, Order};

use super::TaskIdCounter;

pub const SELF_POSITION: &str = "SELF_POSITION";

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MoveTask {
    pub source_id: String,
    pub id: String,
    pub task_id: String,
    pub operation: Option<String>,
}

impl MoveTask {
    fn mv(source_id: impl Into<String>, id: impl Into<String>, task_id: String) -> Self {
        Self {
            source_id: source_id.into(),
            id: id.into(),
            task_id,
            operation: None,
        }
    }

    fn in_place(task_id: String, operation: impl Into<String>) -> Self {
        Self {
            source_id: SELF_POSITION.to_string(),
            id: SELF_POSITION.to_string(),
            task_id,
            operation: Some(operation.into()),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct MoveTaskListBody {
    pub move_task_list: Vec<MoveTask>,
}

/// Operation names carried by a node/edge's `actions`, pre-resolved from the registry.
/// Unknown action types are dropped (they cannot appear in a move-task list).
fn operations(actions: &[crate::protocol::vda5050::Action]) -> Vec<String> {
    actions
        .iter()
        .filter_map(|a| registry::vendor_operation_name(&a.action_type))
        .map(String::from)
        .collect()
}

/// Translates a VDA5050 order into the vendor move-task list, per the emission order in
/// §4.4: edges sorted by sequenceId, pending node actions flushed at start/end nodes,
/// dangling node actions (no incident edge) flushed last in iteration order.
pub fn translate_order(order: &Order) -> MoveTaskListBody {
    let mut pending: HashMap<&str, Vec<String>> = HashMap::new();
    let mut order_of_nodes: Vec<&str> = Vec::new();
    for node in &order.nodes {
        if !node.actions.is_empty() {
            let ops = operations(&node.actions);
            if !ops.is_empty() {
                order_of_nodes.push(node.node_id.as_str());
                pending.insert(node.node_id.as_str(), ops);
            }
        }
    }

    let mut sorted_edges: Vec<&Edge> = order.edges.iter().collect();
    sorted_edges.sort_by_key(|e| e.sequence_id);

    let mut counter = TaskIdCounter::new(order.order_id.clone());
    let mut tasks = Vec::new();

    for edge in &sorted_edges {
        if let Some(ops) = pending.remove(edge.start_node_id.as_str()) {
            for op in ops {
                tasks.push(MoveTask::in_place(counter.next_id(), op));
            }
        }

        let edge_ops = operations(&edge.actions);
        let mv = MoveTask::mv(
            edge.start_node_id.clone(),
            edge.end_node_id.clone(),
            counter.next_id(),
        );
        tasks.push(mv);
        for op in edge_ops {
            tasks.push(MoveTask::in_place(counter.next_id(), op));
        }
    }

    if let Some(last_edge) = sorted_edges.last() {
        if let Some(ops) = pending.remove(last_edge.end_node_id.as_str()) {
            for op in ops {
                tasks.push(MoveTask::in_place(counter.next_id(), op));
            }
        }
    }

    for node_id in order_of_nodes {
        if let Some(ops) = pending.remove(node_id) {
            for op in ops {
                tasks.push(MoveTask::in_place(counter.next_id(), op));
            }
        }
    }

    MoveTaskListBody {
        move_task_list: tasks,
    }
}
