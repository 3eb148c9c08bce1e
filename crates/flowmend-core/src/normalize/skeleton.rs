use serde_json::json;

use super::enhance::enhance_node;
use super::metadata::{self, Stamp};
use super::parse::sanitize_path;
use super::tags::normalize_tags;
use super::fresh_id;
use crate::catalog::BASE_PACKAGE;
use crate::{Catalog, Connections, Edge, WorkflowDocument};

const DEFAULT_NOTE: &str = "Generated by AI Bot";
const MAX_NOTE_CHARS: usize = 500;
const SKELETON_TAGS: [&str; 2] = ["generated", "basic"];

/// The minimal valid document: a webhook trigger feeding one field-setting
/// action that carries the description as a `note` field.
///
/// Nodes go through the same enhancement as candidate nodes, so normalizing
/// a skeleton again leaves it unchanged.
pub(crate) fn build(
    name: String,
    description: &str,
    now: &str,
    catalog: &Catalog,
) -> WorkflowDocument {
    let trigger_id = fresh_id();
    let action_id = fresh_id();

    let raw_nodes = [
        json!({
            "id": trigger_id,
            "name": "Automation Trigger",
            "type": format!("{}.webhook", BASE_PACKAGE),
            "parameters": {"httpMethod": "POST", "path": sanitize_path(&name)}
        }),
        json!({
            "id": action_id,
            "name": "Process Data",
            "type": format!("{}.set", BASE_PACKAGE),
            "parameters": {
                "keepOnlySet": true,
                "values": {"string": [{"name": "note", "value": note(description)}]}
            }
        }),
    ];

    let mut ignored = Vec::new();
    let nodes = raw_nodes
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| raw.as_object().map(|raw| (index, raw)))
        .map(|(index, raw)| enhance_node(raw, index, catalog, &mut ignored))
        .collect();

    let mut connections = Connections::new();
    connections.insert(trigger_id, vec![vec![Edge::main(action_id)]]);

    let container = json!({
        "settings": {"timezone": "UTC", "saveManualExecutions": true}
    });
    let container = container.as_object().cloned().unwrap_or_default();

    let mut document = metadata::finalize(
        &container,
        nodes,
        connections,
        Stamp {
            name,
            now,
            structural_change: true,
        },
        catalog,
    );
    document.tags = normalize_tags(Some(&json!(SKELETON_TAGS)), now);
    document
}

fn note(description: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        return DEFAULT_NOTE.to_string();
    }
    description.chars().take(MAX_NOTE_CHARS).collect()
}
