use std::collections::HashSet;

use serde_json::Value;

use super::parse::layout_position;
use super::{Repair, fresh_id, non_empty_str};
use crate::catalog::GENERIC_TYPE;
use crate::{Bag, Catalog, Node, Position};

/// Keys read into typed [`Node`] fields. Everything else is passed through.
const NODE_KEYS: [&str; 7] = [
    "id",
    "name",
    "type",
    "typeVersion",
    "parameters",
    "position",
    "webhookId",
];

/// Fill the missing fields of one node record.
///
/// `index` is the node's position among the retained nodes and only drives
/// the default layout. Caller-supplied parameters are never overwritten by
/// catalogue defaults.
pub(crate) fn enhance_node(
    raw: &Bag,
    index: usize,
    catalog: &Catalog,
    repairs: &mut Vec<Repair>,
) -> Node {
    let id = match raw.get("id").and_then(non_empty_str) {
        Some(id) => id.to_string(),
        None => {
            let assigned = fresh_id();
            repairs.push(Repair::MissingNodeId {
                index,
                assigned: assigned.clone(),
            });
            assigned
        }
    };

    let node_type = raw
        .get("type")
        .and_then(non_empty_str)
        .map(|t| catalog.canonical_type(t.trim()))
        .unwrap_or_else(|| GENERIC_TYPE.to_string());

    let name = raw
        .get("name")
        .and_then(non_empty_str)
        .map(str::to_string)
        .unwrap_or_else(|| catalog.label(&node_type).to_string());

    let type_version = raw
        .get("typeVersion")
        .and_then(parse_type_version)
        .unwrap_or_else(|| catalog.latest_version(&node_type));

    let position = raw
        .get("position")
        .and_then(parse_position)
        .unwrap_or_else(|| layout_position(index));

    let mut parameters = match raw.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        None | Some(Value::Null) => Bag::new(),
        Some(_) => {
            repairs.push(Repair::ParametersReplaced {
                node_id: id.clone(),
            });
            Bag::new()
        }
    };
    if let Some(defaults) = catalog.default_parameters(&node_type) {
        merge_defaults(&mut parameters, defaults);
    }

    let webhook_id = match raw.get("webhookId").and_then(non_empty_str) {
        Some(supplied) => Some(supplied.to_string()),
        None if catalog.needs_webhook(&node_type) => Some(id.clone()),
        None => None,
    };

    let extra = raw
        .iter()
        .filter(|(key, _)| !NODE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Node {
        id,
        name,
        node_type,
        type_version,
        parameters,
        position,
        webhook_id,
        extra,
    }
}

/// Add each default key that is not already present. Idempotent.
fn merge_defaults(parameters: &mut Bag, defaults: &Bag) {
    for (key, value) in defaults {
        if !parameters.contains_key(key) {
            parameters.insert(key.clone(), value.clone());
        }
    }
}

/// Positive integers are kept, positive floats floored, numeric strings parsed.
fn parse_type_version(value: &Value) -> Option<u32> {
    let version = match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => v as f64,
            None => n.as_f64()?,
        },
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !version.is_finite() || version < 1.0 || version > u32::MAX as f64 {
        return None;
    }
    Some(version.floor() as u32)
}

/// Accepts `[x, y]` or `{"x": .., "y": ..}`.
fn parse_position(value: &Value) -> Option<Position> {
    let (x, y) = match value {
        Value::Array(pair) if pair.len() == 2 => (pair[0].as_f64()?, pair[1].as_f64()?),
        Value::Object(map) => (map.get("x")?.as_f64()?, map.get("y")?.as_f64()?),
        _ => return None,
    };
    (x.is_finite() && y.is_finite()).then_some(Position { x, y })
}

/// Give every node after the first holder of an id a fresh one.
///
/// A `webhookId` that mirrored the replaced id follows the node to its new id.
pub(crate) fn ensure_unique_ids(nodes: &mut [Node], repairs: &mut Vec<Repair>) {
    let mut seen: HashSet<String> = HashSet::with_capacity(nodes.len());
    for node in nodes.iter_mut() {
        if seen.insert(node.id.clone()) {
            continue;
        }
        let mut assigned = fresh_id();
        while seen.contains(&assigned) {
            assigned = fresh_id();
        }
        if node.webhook_id.as_deref() == Some(node.id.as_str()) {
            node.webhook_id = Some(assigned.clone());
        }
        repairs.push(Repair::DuplicateNodeId {
            id: std::mem::replace(&mut node.id, assigned.clone()),
            assigned: assigned.clone(),
        });
        seen.insert(assigned);
    }
}

/// Suffix later duplicate names with the lowest free counter (`"Gmail 2"`).
pub(crate) fn ensure_unique_names(nodes: &mut [Node], repairs: &mut Vec<Repair>) {
    let mut taken: HashSet<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(nodes.len());
    for node in nodes.iter_mut() {
        if seen.insert(node.name.clone()) {
            continue;
        }
        let renamed = (2..)
            .map(|n| format!("{} {}", node.name, n))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_else(|| format!("{} {}", node.name, fresh_id()));
        taken.insert(renamed.clone());
        seen.insert(renamed.clone());
        repairs.push(Repair::DuplicateNodeName {
            name: std::mem::replace(&mut node.name, renamed.clone()),
            renamed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enhance(value: Value, index: usize) -> (Node, Vec<Repair>) {
        let mut repairs = Vec::new();
        let raw = value.as_object().cloned().unwrap_or_default();
        let node = enhance_node(&raw, index, Catalog::shared(), &mut repairs);
        (node, repairs)
    }

    #[test]
    fn test_empty_object_yields_generic_node() {
        let (node, repairs) = enhance(json!({}), 0);
        assert!(!node.id.is_empty());
        assert_eq!(node.node_type, GENERIC_TYPE);
        assert_eq!(node.name, "No Operation");
        assert_eq!(node.type_version, 1);
        assert!(node.parameters.is_empty());
        assert!(node.webhook_id.is_none());
        assert!(matches!(repairs[0], Repair::MissingNodeId { index: 0, .. }));
    }

    #[test]
    fn test_unknown_type_gets_generic_label_and_version() {
        let (node, _) = enhance(json!({"id": "x", "type": "acme.frobnicate"}), 0);
        assert_eq!(node.name, "Node");
        assert_eq!(node.type_version, 1);
        assert_eq!(node.node_type, "acme.frobnicate");
        assert!(node.parameters.is_empty());
    }

    #[test]
    fn test_known_type_fills_label_version_and_webhook() {
        let (node, repairs) = enhance(json!({"id": "hook", "type": "n8n-nodes-base.webhook"}), 0);
        assert!(repairs.is_empty());
        assert_eq!(node.name, "Webhook");
        assert_eq!(node.type_version, 2);
        assert_eq!(node.webhook_id.as_deref(), Some("hook"));
        assert_eq!(node.parameters["httpMethod"], "POST");
    }

    #[test]
    fn test_supplied_webhook_id_is_kept() {
        let (node, _) = enhance(
            json!({"id": "hook", "type": "n8n-nodes-base.webhook", "webhookId": "public-1"}),
            0,
        );
        assert_eq!(node.webhook_id.as_deref(), Some("public-1"));
    }

    #[test]
    fn test_parameter_merge_keeps_caller_values() {
        let (node, _) = enhance(
            json!({
                "id": "mail",
                "type": "n8n-nodes-base.gmail",
                "parameters": {"foo": "bar", "subject": "Custom"}
            }),
            0,
        );
        assert_eq!(node.parameters["foo"], "bar");
        assert_eq!(node.parameters["subject"], "Custom");
        assert_eq!(node.parameters["sendTo"], "={{ $json.email }}");
        assert_eq!(node.parameters["operation"], "send");

        let (slack, _) = enhance(
            json!({"type": "slack", "parameters": {"text": "hi"}}),
            0,
        );
        assert_eq!(slack.parameters["text"], "hi");
        assert_eq!(slack.parameters["operation"], "postMessage");
        assert_eq!(slack.parameters["channel"], "={{$env.SLACK_CHANNEL}}");

        let (http, _) = enhance(json!({"type": "httpRequest", "parameters": {"method": "POST"}}), 0);
        assert_eq!(http.parameters["method"], "POST");
        assert_eq!(http.parameters["url"], "={{$env.API_ENDPOINT}}");

        let (cron, _) = enhance(json!({"type": "cron"}), 0);
        assert_eq!(cron.parameters["rule"], json!({"hour": 9, "minute": 0}));

        let (custom_cron, _) = enhance(
            json!({"type": "cron", "parameters": {"rule": {"hour": 18}}}),
            0,
        );
        assert_eq!(custom_cron.parameters["rule"], json!({"hour": 18}));
    }

    #[test]
    fn test_enhance_is_idempotent() {
        let (first, _) = enhance(json!({"type": "googleSheets", "parameters": {"x": 1}}), 2);
        let again = serde_json::to_value(&first).unwrap();
        let (second, repairs) = enhance(again, 2);
        assert!(repairs.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_short_type_is_canonicalized() {
        let (node, _) = enhance(json!({"id": "a", "type": "webhook"}), 0);
        assert_eq!(node.node_type, "n8n-nodes-base.webhook");
    }

    #[test]
    fn test_non_object_parameters_replaced() {
        let (node, repairs) = enhance(json!({"id": "a", "parameters": "oops"}), 0);
        assert!(node.parameters.is_empty());
        assert_eq!(
            repairs,
            vec![Repair::ParametersReplaced {
                node_id: "a".into()
            }]
        );
    }

    #[test]
    fn test_default_layout_is_deterministic() {
        let (a, _) = enhance(json!({"id": "a"}), 0);
        let (b, _) = enhance(json!({"id": "b"}), 1);
        assert_eq!(a.position, layout_position(0));
        assert_eq!(b.position.y, a.position.y);
        assert!(b.position.x > a.position.x);
    }

    #[test]
    fn test_position_and_version_parsing() {
        let (node, _) = enhance(
            json!({"id": "a", "position": {"x": 5, "y": 6}, "typeVersion": 4.2}),
            0,
        );
        assert_eq!(node.position, Position { x: 5.0, y: 6.0 });
        assert_eq!(node.type_version, 4);

        let (node, _) = enhance(json!({"id": "a", "position": [1], "typeVersion": -3}), 3);
        assert_eq!(node.position, layout_position(3));
        assert_eq!(node.type_version, 1);
    }

    #[test]
    fn test_extra_keys_pass_through() {
        let (node, _) = enhance(json!({"id": "a", "disabled": true, "notes": "hi"}), 0);
        assert_eq!(node.extra["disabled"], true);
        assert_eq!(node.extra["notes"], "hi");
        assert!(!node.extra.contains_key("id"));
    }

    #[test]
    fn test_duplicate_ids_regenerated_after_first() {
        let (a, _) = enhance(json!({"id": "same", "type": "webhook"}), 0);
        let (b, _) = enhance(json!({"id": "same", "type": "webhook"}), 1);
        let mut nodes = vec![a, b];
        let mut repairs = Vec::new();
        ensure_unique_ids(&mut nodes, &mut repairs);
        assert_eq!(nodes[0].id, "same");
        assert_ne!(nodes[1].id, "same");
        assert_eq!(nodes[1].webhook_id.as_deref(), Some(nodes[1].id.as_str()));
        assert!(matches!(&repairs[0], Repair::DuplicateNodeId { id, .. } if id == "same"));
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let mut nodes: Vec<Node> = ["Gmail", "Gmail", "Gmail 2", "Gmail"]
            .iter()
            .enumerate()
            .map(|(i, name)| enhance(json!({"id": format!("n{}", i), "name": name}), i).0)
            .collect();
        let mut repairs = Vec::new();
        ensure_unique_names(&mut nodes, &mut repairs);
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Gmail", "Gmail 3", "Gmail 2", "Gmail 4"]);
        assert_eq!(repairs.len(), 2);
    }
}
