//! Read-only reports over a finished document: node and edge counts, the
//! `{{$env.NAME}}` variables its parameters reference, and the credentials
//! its node types need before it can run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::catalog::BASE_PACKAGE;
use crate::{Catalog, WorkflowDocument};

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\$env\.([A-Z_][A-Z0-9_]*)\s*\}\}").expect("invalid env reference regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStats {
    pub name: String,
    pub total_nodes: usize,
    pub total_connections: usize,
    /// Actual trigger nodes, unlike `triggerCount` which never drops below one.
    pub trigger_count: usize,
    /// Node count per type, built-in package prefix stripped.
    pub node_types: BTreeMap<String, usize>,
    /// Has nodes, and edges unless it is a single node.
    pub has_valid_structure: bool,
}

impl WorkflowStats {
    pub fn of(document: &WorkflowDocument, catalog: &Catalog) -> Self {
        let prefix = format!("{}.", BASE_PACKAGE);
        let mut node_types = BTreeMap::new();
        let mut trigger_count = 0;
        for node in &document.nodes {
            let short = node
                .node_type
                .strip_prefix(&prefix)
                .unwrap_or(&node.node_type);
            *node_types.entry(short.to_string()).or_insert(0) += 1;
            if catalog.is_trigger(&node.node_type) {
                trigger_count += 1;
            }
        }

        let total_nodes = document.nodes.len();
        let total_connections = document.edge_count();
        Self {
            name: document.name.clone(),
            total_nodes,
            total_connections,
            trigger_count,
            node_types,
            has_valid_structure: total_nodes > 0 && (total_connections > 0 || total_nodes == 1),
        }
    }
}

impl fmt::Display for WorkflowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Workflow: {}", self.name)?;
        writeln!(f, "Nodes: {}", self.total_nodes)?;
        writeln!(f, "Connections: {}", self.total_connections)?;
        writeln!(f, "Triggers: {}", self.trigger_count)?;
        writeln!(f, "Node types:")?;
        for (node_type, count) in &self.node_types {
            writeln!(f, "  - {}: {}", node_type, count)?;
        }
        write!(
            f,
            "Ready to import: {}",
            if self.has_valid_structure { "yes" } else { "no" }
        )
    }
}

/// Environment variables referenced as `{{$env.NAME}}` anywhere in node
/// parameters or passthrough fields. Sorted, no duplicates.
pub fn env_variables(document: &WorkflowDocument) -> Vec<String> {
    let mut found = BTreeSet::new();
    for node in &document.nodes {
        for value in node.parameters.values().chain(node.extra.values()) {
            collect_env_references(value, &mut found);
        }
    }
    found.into_iter().collect()
}

fn collect_env_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            for captures in ENV_REFERENCE.captures_iter(text) {
                found.insert(captures[1].to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_env_references(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect_env_references(v, found)),
        _ => {}
    }
}

/// Credentials the document's node types need, sorted and deduplicated.
pub fn suggest_credentials(document: &WorkflowDocument, catalog: &Catalog) -> Vec<String> {
    document
        .nodes
        .iter()
        .filter_map(|node| catalog.credential(&node.node_type))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Everything a user needs to know before importing the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub stats: WorkflowStats,
    pub env_variables: Vec<String>,
    pub credentials: Vec<String>,
}

pub fn inspect(document: &WorkflowDocument, catalog: &Catalog) -> Inspection {
    Inspection {
        stats: WorkflowStats::of(document, catalog),
        env_variables: env_variables(document),
        credentials: suggest_credentials(document, catalog),
    }
}

impl fmt::Display for Inspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        if !self.env_variables.is_empty() {
            write!(f, "\nEnvironment variables: {}", self.env_variables.join(", "))?;
        }
        if !self.credentials.is_empty() {
            write!(f, "\nCredentials: {}", self.credentials.join(", "))?;
        }
        Ok(())
    }
}
