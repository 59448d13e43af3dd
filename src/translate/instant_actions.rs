//! Instant-action translator (C5): VDA5050 instant actions → vendor egress packets.

use serde_json::{json, Value};
use tracing::warn;

use crate::protocol::registry::{self, BodyShape, PortRole};
use crate::protocol::vda5050::{Action, ActionParameterValue, InstantActions};

use super::order::SELF_POSITION;
use super::TaskIdCounter;

#[derive(Debug, Clone, PartialEq)]
pub struct EgressPacket {
    pub port_role: PortRole,
    pub message_type: u16,
    pub body: Value,
}

fn param<'a>(action: &'a Action, key: &str) -> Option<&'a ActionParameterValue> {
    action
        .action_parameters
        .as_ref()?
        .iter()
        .find(|p| p.key == key)
        .map(|p| &p.value)
}

fn params_object(action: &Action) -> Value {
    match action.action_type.as_str() {
        "reloc" => {
            let mut obj = serde_json::Map::new();
            let is_auto = param(action, "isAuto").and_then(|v| v.as_bool()).unwrap_or(false);
            let home = param(action, "home").and_then(|v| v.as_bool()).unwrap_or(false);
            if let Some(v) = param(action, "isAuto") {
                if let Some(b) = v.as_bool() {
                    obj.insert("isAuto".into(), json!(b));
                }
            }
            if let Some(v) = param(action, "home") {
                if let Some(b) = v.as_bool() {
                    obj.insert("home".into(), json!(b));
                }
            }
            if let Some(v) = param(action, "length").and_then(|v| v.as_f64()) {
                obj.insert("length".into(), json!(v));
            }
            if !is_auto && !home {
                for key in ["x", "y", "angle"] {
                    if let Some(v) = param(action, key).and_then(|v| v.as_f64()) {
                        obj.insert(key.into(), json!(v));
                    }
                }
            }
            Value::Object(obj)
        }
        "translate" => {
            let mut obj = serde_json::Map::new();
            if let Some(v) = param(action, "dist").and_then(|v| v.as_f64()) {
                obj.insert("dist".into(), json!(v));
            }
            for key in ["vx", "vy"] {
                if let Some(v) = param(action, key).and_then(|v| v.as_f64()) {
                    obj.insert(key.into(), json!(v));
                }
            }
            if let Some(v) = param(action, "mode").and_then(|v| v.as_str()) {
                obj.insert("mode".into(), json!(v));
            }
            Value::Object(obj)
        }
        "turn" => {
            let mut obj = serde_json::Map::new();
            if let Some(v) = param(action, "angle").and_then(|v| v.as_f64()) {
                obj.insert("angle".into(), json!(v));
            }
            if let Some(v) = param(action, "vw").and_then(|v| v.as_f64()) {
                obj.insert("vw".into(), json!(v));
            }
            if let Some(v) = param(action, "mode").and_then(|v| v.as_str()) {
                obj.insert("mode".into(), json!(v));
            }
            Value::Object(obj)
        }
        "rotateLoad" => {
            let mut obj = serde_json::Map::new();
            for key in ["increase_spin_angle", "robot_spin_angle", "global_spin_angle"] {
                if let Some(v) = param(action, key).and_then(|v| v.as_f64()) {
                    obj.insert(key.into(), json!(v));
                }
            }
            if let Some(v) = param(action, "spin_direction").and_then(|v| v.as_str()) {
                obj.insert("spin_direction".into(), json!(v));
            }
            Value::Object(obj)
        }
        "softEmc" => {
            let status = param(action, "status").and_then(|v| v.as_bool()).unwrap_or(false);
            json!({ "status": status })
        }
        "clearErrors" => {
            let codes = parse_error_codes(param(action, "error_codes"));
            match codes {
                Some(codes) => json!({ "error_codes": codes }),
                None => json!({}),
            }
        }
        "grabAuthority" | "releaseAuthority" => {
            let value = param(action, "value")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_default();
            json!({ "value": value })
        }
        _ => json!({}),
    }
}

fn parse_error_codes(value: Option<&ActionParameterValue>) -> Option<Vec<i64>> {
    match value? {
        ActionParameterValue::List(items) => Some(
            items
                .iter()
                .filter_map(|i| i.as_f64())
                .map(|f| f as i64)
                .collect(),
        ),
        ActionParameterValue::Str(s) => {
            if let Ok(v) = serde_json::from_str::<Vec<i64>>(s) {
                return Some(v);
            }
            Some(
                s.split(',')
                    .filter_map(|part| part.trim().parse::<i64>().ok())
                    .collect(),
            )
        }
        ActionParameterValue::Int(i) => Some(vec![*i]),
        _ => None,
    }
}

/// One-shot `grabAuthority` packet sent right after the authority port connects (§4.7),
/// built directly rather than from a decoded action since there is no inbound `Action` here.
pub fn grab_authority_packet(nickname: &str) -> Value {
    json!({ "nick_name": nickname })
}

/// Translates a VDA5050 instant-actions payload into vendor egress packets, in the
/// input's order. Unknown action types are dropped with a warning, not fatally.
pub fn translate_instant_actions(ia: &InstantActions) -> Vec<EgressPacket> {
    let mut counter = TaskIdCounter::new(ia.header.header_id.to_string());
    let mut packets = Vec::new();

    for action in &ia.actions {
        let Some(entry) = registry::lookup(&action.action_type) else {
            warn!(action_type = %action.action_type, "unknown instant action, dropping");
            continue;
        };

        let body = match entry.body_shape {
            BodyShape::MoveTaskList => json!({
                "move_task_list": [{
                    "id": SELF_POSITION,
                    "source_id": SELF_POSITION,
                    "task_id": counter.next_id(),
                    "operation": registry::vendor_operation_name(&action.action_type).unwrap_or_default(),
                }]
            }),
            BodyShape::Empty => json!({}),
            BodyShape::Params => params_object(action),
        };

        packets.push(EgressPacket {
            port_role: entry.port_role,
            message_type: entry.message_type,
            body,
        });
    }

    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::vda5050::{ActionParameter, BlockingType, Header};

    fn action(action_type: &str, params: Vec<(&str, ActionParameterValue)>) -> Action {
        Action {
            action_type: action_type.to_string(),
            action_id: "a1".to_string(),
            action_description: None,
            blocking_type: BlockingType::Hard,
            action_parameters: Some(
                params
                    .into_iter()
                    .map(|(k, v)| ActionParameter {
                        key: k.to_string(),
                        value: v,
                    })
                    .collect(),
            ),
        }
    }

    fn ia(actions: Vec<Action>) -> InstantActions {
        InstantActions {
            header: Header::new(1, "acme", "agv-1"),
            actions,
        }
    }

    #[test]
    fn mixed_kinds_scenario() {
        let payload = ia(vec![
            action("startPause", vec![]),
            action(
                "reloc",
                vec![
                    ("x", ActionParameterValue::Float(1.0)),
                    ("y", ActionParameterValue::Float(2.0)),
                    ("angle", ActionParameterValue::Float(0.0)),
                ],
            ),
        ]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].port_role, PortRole::Movement);
        assert_eq!(packets[0].message_type, 3001);
        assert_eq!(packets[0].body, json!({}));
        assert_eq!(packets[1].port_role, PortRole::Relocation);
        assert_eq!(packets[1].message_type, 2002);
        assert_eq!(packets[1].body, json!({"x": 1.0, "y": 2.0, "angle": 0.0}));
    }

    #[test]
    fn unknown_action_is_dropped_not_fatal() {
        let payload = ia(vec![action("doBackflip", vec![]), action("startPause", vec![])]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].message_type, 3001);
    }

    #[test]
    fn pick_uses_move_task_list_shape() {
        let payload = ia(vec![action("pick", vec![])]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets[0].message_type, 3066);
        let list = packets[0].body["move_task_list"].as_array().unwrap();
        assert_eq!(list[0]["operation"], "JackLoad");
    }

    #[test]
    fn reloc_omits_coordinates_when_home_is_true() {
        let payload = ia(vec![action(
            "reloc",
            vec![
                ("home", ActionParameterValue::Bool(true)),
                ("x", ActionParameterValue::Float(1.0)),
            ],
        )]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets[0].body, json!({"home": true}));
    }

    #[test]
    fn clear_errors_parses_comma_separated_string() {
        let payload = ia(vec![action(
            "clearErrors",
            vec![("error_codes", ActionParameterValue::Str("1, 2, 3".to_string()))],
        )]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets[0].body, json!({"error_codes": [1, 2, 3]}));
    }

    #[test]
    fn turn_requires_angle_and_vw() {
        let payload = ia(vec![action(
            "turn",
            vec![
                ("angle", ActionParameterValue::Float(1.57)),
                ("vw", ActionParameterValue::Float(0.2)),
            ],
        )]);
        let packets = translate_instant_actions(&payload);
        assert_eq!(packets[0].body, json!({"angle": 1.57, "vw": 0.2}));
    }
}
