use chrono::DateTime;
use serde_json::{Value, json};

use super::{fresh_id, non_empty_str};
use crate::{Bag, Catalog, Connections, Node, WorkflowDocument};

/// Per-pass values the finalizer stamps onto the document.
pub(crate) struct Stamp<'a> {
    pub name: String,
    pub now: &'a str,
    /// A structural repair happened; the old `versionId` no longer applies.
    pub structural_change: bool,
}

/// Number of trigger nodes, never less than one.
pub fn trigger_count(nodes: &[Node], catalog: &Catalog) -> u32 {
    let triggers = nodes
        .iter()
        .filter(|n| catalog.is_trigger(&n.node_type))
        .count();
    u32::try_from(triggers).unwrap_or(u32::MAX).max(1)
}

/// Assemble the document, recomputing derived fields and defaulting the
/// top-level ones. Tags are left empty for the tag pass.
pub(crate) fn finalize(
    container: &Bag,
    nodes: Vec<Node>,
    connections: Connections,
    stamp: Stamp<'_>,
    catalog: &Catalog,
) -> WorkflowDocument {
    let id = string_or_fresh(container.get("id"));
    let version_id = match container.get("versionId").and_then(non_empty_str) {
        Some(version) if !stamp.structural_change => version.to_string(),
        _ => fresh_id(),
    };
    let created_at = container
        .get("createdAt")
        .and_then(timestamp_from)
        .unwrap_or_else(|| stamp.now.to_string());

    WorkflowDocument {
        id,
        name: stamp.name,
        trigger_count: trigger_count(&nodes, catalog),
        nodes,
        connections,
        active: container
            .get("active")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        settings: object_or(container.get("settings"), || {
            json!({"executionOrder": "v1"})
        }),
        tags: Vec::new(),
        created_at,
        updated_at: stamp.now.to_string(),
        version_id,
        pin_data: object_or(container.get("pinData"), || json!({})),
        static_data: object_or(container.get("staticData"), || json!({})),
        meta: object_or(container.get("meta"), || {
            json!({"templateCreatedBy": "flowmend", "instanceId": fresh_id()})
        }),
    }
}

fn string_or_fresh(value: Option<&Value>) -> String {
    value
        .and_then(non_empty_str)
        .map(str::to_string)
        .unwrap_or_else(fresh_id)
}

fn object_or(value: Option<&Value>, default: impl FnOnce() -> Value) -> Bag {
    match value {
        Some(Value::Object(map)) => map.clone(),
        _ => match default() {
            Value::Object(map) => map,
            _ => Bag::new(),
        },
    }
}

/// Strings are kept verbatim; epoch milliseconds are converted.
fn timestamp_from(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => non_empty_str(value).map(str::to_string),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        _ => None,
    }
}
