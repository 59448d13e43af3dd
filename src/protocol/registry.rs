//! Static VDA5050 action ↔ `(port-role, message-type, body-shape)` registry (C2).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortRole {
    StatePush,
    Movement,
    Relocation,
    Authority,
    Safety,
}

impl PortRole {
    pub const ALL: [PortRole; 5] = [
        PortRole::StatePush,
        PortRole::Movement,
        PortRole::Relocation,
        PortRole::Authority,
        PortRole::Safety,
    ];
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortRole::StatePush => "state-push",
            PortRole::Movement => "movement",
            PortRole::Relocation => "relocation",
            PortRole::Authority => "authority",
            PortRole::Safety => "safety",
        };
        f.write_str(s)
    }
}

/// Vendor message type. Documentation-only range split (not enforced by the type):
/// request/command 2000-6999, uplink state push 9300, rest reserved.
pub type MessageType = u16;

pub const MSG_MOVE_TASK_LIST: MessageType = 3066;
pub const MSG_START_PAUSE: MessageType = 3001;
pub const MSG_STOP_PAUSE: MessageType = 3002;
pub const MSG_CANCEL_ORDER: MessageType = 3003;
pub const MSG_TRANSLATE: MessageType = 3055;
pub const MSG_TURN: MessageType = 3056;
pub const MSG_ROTATE_LOAD: MessageType = 3057;
pub const MSG_RELOC: MessageType = 2002;
pub const MSG_CANCEL_RELOC: MessageType = 2004;
pub const MSG_CLEAR_ERRORS: MessageType = 4009;
pub const MSG_GRAB_AUTHORITY: MessageType = 4005;
pub const MSG_RELEASE_AUTHORITY: MessageType = 4006;
pub const MSG_SOFT_EMC: MessageType = 6004;
pub const MSG_STATE_PUSH: MessageType = 9300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    MoveTaskList,
    Empty,
    Params,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub action: &'static str,
    pub port_role: PortRole,
    pub message_type: MessageType,
    pub body_shape: BodyShape,
}

/// The full action registry, reproduced exactly per the contract: every VDA5050
/// instant action this bridge recognises, plus the whole-order-graph binding used by
/// the order translator.
pub const REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        action: "pick",
        port_role: PortRole::Movement,
        message_type: MSG_MOVE_TASK_LIST,
        body_shape: BodyShape::MoveTaskList,
    },
    RegistryEntry {
        action: "drop",
        port_role: PortRole::Movement,
        message_type: MSG_MOVE_TASK_LIST,
        body_shape: BodyShape::MoveTaskList,
    },
    RegistryEntry {
        action: "startPause",
        port_role: PortRole::Movement,
        message_type: MSG_START_PAUSE,
        body_shape: BodyShape::Empty,
    },
    RegistryEntry {
        action: "stopPause",
        port_role: PortRole::Movement,
        message_type: MSG_STOP_PAUSE,
        body_shape: BodyShape::Empty,
    },
    RegistryEntry {
        action: "cancelOrder",
        port_role: PortRole::Movement,
        message_type: MSG_CANCEL_ORDER,
        body_shape: BodyShape::Empty,
    },
    RegistryEntry {
        action: "translate",
        port_role: PortRole::Movement,
        message_type: MSG_TRANSLATE,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "turn",
        port_role: PortRole::Movement,
        message_type: MSG_TURN,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "rotateLoad",
        port_role: PortRole::Movement,
        message_type: MSG_ROTATE_LOAD,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "reloc",
        port_role: PortRole::Relocation,
        message_type: MSG_RELOC,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "cancelReloc",
        port_role: PortRole::Relocation,
        message_type: MSG_CANCEL_RELOC,
        body_shape: BodyShape::Empty,
    },
    RegistryEntry {
        action: "clearErrors",
        port_role: PortRole::Authority,
        message_type: MSG_CLEAR_ERRORS,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "grabAuthority",
        port_role: PortRole::Authority,
        message_type: MSG_GRAB_AUTHORITY,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "releaseAuthority",
        port_role: PortRole::Authority,
        message_type: MSG_RELEASE_AUTHORITY,
        body_shape: BodyShape::Params,
    },
    RegistryEntry {
        action: "softEmc",
        port_role: PortRole::Safety,
        message_type: MSG_SOFT_EMC,
        body_shape: BodyShape::Params,
    },
];

pub fn lookup(action: &str) -> Option<&'static RegistryEntry> {
    REGISTRY.iter().find(|e| e.action == action)
}

/// Vendor operation name for an in-place move-task-list step, per the order translator (C4).
pub fn vendor_operation_name(action: &str) -> Option<&'static str> {
    let name = match action {
        "pick" => "JackLoad",
        "drop" => "JackUnload",
        "translate" => "Translate",
        "turn" => "Turn",
        "rotateLoad" => "RotateLoad",
        "softEmc" => "EmergencyStop",
        "startPause" => "Pause",
        "stopPause" => "Resume",
        "cancelOrder" => "Cancel",
        "reloc" => "Reloc",
        "cancelReloc" => "CancelReloc",
        "clearErrors" => "ClearErrors",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_binds_to_move_task_list() {
        let e = lookup("pick").unwrap();
        assert_eq!(e.port_role, PortRole::Movement);
        assert_eq!(e.message_type, MSG_MOVE_TASK_LIST);
        assert_eq!(e.body_shape, BodyShape::MoveTaskList);
    }

    #[test]
    fn unknown_action_not_found() {
        assert!(lookup("doBackflip").is_none());
    }

    #[test]
    fn order_graph_message_type_is_canonical_3066() {
        assert_eq!(MSG_MOVE_TASK_LIST, 3066);
    }

    #[test]
    fn every_registry_action_has_a_vendor_operation_name() {
        for entry in REGISTRY {
            assert!(
                vendor_operation_name(entry.action).is_some(),
                "missing vendor op name for {}",
                entry.action
            );
        }
    }
}
