use std::collections::HashSet;

use crate::{Catalog, WorkflowDocument, normalize::trigger_count};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Workflow has no nodes")]
    NoNodes,

    #[error("Workflow name is empty")]
    EmptyName,

    #[error("Node id is empty (node '{0}')")]
    EmptyNodeId(String),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Connection source {0} is not a node")]
    DanglingSource(String),

    #[error("Edge {0}->{1} targets a missing node")]
    DanglingTarget(String, String),

    #[error("triggerCount is {actual}, expected {expected}")]
    TriggerCountMismatch { expected: u32, actual: u32 },
}

/// Check a document against the structural invariants a normalized document
/// always satisfies.
pub fn validate_document(
    document: &WorkflowDocument,
    catalog: &Catalog,
) -> Result<(), ValidationError> {
    if document.nodes.is_empty() {
        return Err(ValidationError::NoNodes);
    }
    if document.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let mut ids = HashSet::with_capacity(document.nodes.len());
    for node in &document.nodes {
        if node.id.is_empty() {
            return Err(ValidationError::EmptyNodeId(node.name.clone()));
        }
        if !ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNodeId(node.id.clone()));
        }
    }

    for (source, lanes) in &document.connections {
        if !ids.contains(source.as_str()) {
            return Err(ValidationError::DanglingSource(source.clone()));
        }
        for edge in lanes.iter().flatten() {
            if !ids.contains(edge.target_node_id.as_str()) {
                return Err(ValidationError::DanglingTarget(
                    source.clone(),
                    edge.target_node_id.clone(),
                ));
            }
        }
    }

    let expected = trigger_count(&document.nodes, catalog);
    if document.trigger_count != expected {
        return Err(ValidationError::TriggerCountMismatch {
            expected,
            actual: document.trigger_count,
        });
    }

    Ok(())
}
