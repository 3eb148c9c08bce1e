//! Candidate document → valid [`WorkflowDocument`].
//!
//! The pipeline is total: every input, including `null`, produces a document
//! that passes [`validate_document`](crate::validate_document). Stages run in
//! a fixed order:
//!
//! ```text
//! candidate check ──► skeleton                       (unsalvageable)
//!        │
//!        └──► enhance nodes ─► connections ─► metadata ─► tags
//! ```

mod connections;
mod enhance;
mod metadata;
mod parse;
mod skeleton;
mod tags;


use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Bag, Catalog, WorkflowDocument};

pub use metadata::trigger_count;
pub use parse::{extract_json, parse_candidate};

// ── Public types ────────────────────────────────────────────────

/// Naming hints used when the candidate carries no usable name, and by the
/// fallback skeleton.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hints {
    pub name: String,
    pub description: String,
}

/// A condition absorbed while normalizing. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The candidate was not an object.
    MalformedContainer,
    /// No node entry survived; the skeleton was used instead.
    EmptyOrInvalidNodeSet,
    /// A `nodes` entry that was not an object.
    NonObjectNodeDropped { index: usize },
    MissingNodeId { index: usize, assigned: String },
    DuplicateNodeId { id: String, assigned: String },
    DuplicateNodeName { name: String, renamed: String },
    /// `parameters` was present but not an object.
    ParametersReplaced { node_id: String },
    /// `connections` was present but not an object.
    MalformedConnections,
    DanglingConnectionSource { source: String },
    DanglingEdge { source: String, target: String },
    DuplicateEdge { source: String, target: String },
    /// A connection key or edge target named a node instead of its id.
    ResolvedByName { reference: String, id: String },
    DefaultChainSynthesized { edges: usize },
}

impl Repair {
    /// Whether the repair changed the node set or the graph. Structural
    /// repairs force a fresh `versionId`.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Repair::DuplicateNodeName { .. } | Repair::ParametersReplaced { .. }
        )
    }
}

impl fmt::Display for Repair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repair::MalformedContainer => write!(f, "Candidate is not an object"),
            Repair::EmptyOrInvalidNodeSet => write!(f, "Candidate has no usable nodes"),
            Repair::NonObjectNodeDropped { index } => {
                write!(f, "Node entry #{} dropped: not an object", index)
            }
            Repair::MissingNodeId { index, assigned } => {
                write!(f, "Node #{} had no id, assigned {}", index, assigned)
            }
            Repair::DuplicateNodeId { id, assigned } => {
                write!(f, "Duplicate node id '{}' replaced with {}", id, assigned)
            }
            Repair::DuplicateNodeName { name, renamed } => {
                write!(f, "Duplicate node name '{}' renamed to '{}'", name, renamed)
            }
            Repair::ParametersReplaced { node_id } => {
                write!(f, "Node {}: parameters was not an object", node_id)
            }
            Repair::MalformedConnections => write!(f, "Connections is not an object"),
            Repair::DanglingConnectionSource { source } => {
                write!(f, "Connection source '{}' dropped: node not found", source)
            }
            Repair::DanglingEdge { source, target } if target.is_empty() => {
                write!(f, "Edge from '{}' dropped: no target", source)
            }
            Repair::DanglingEdge { source, target } => {
                write!(f, "Edge {}->{} dropped: node not found", source, target)
            }
            Repair::DuplicateEdge { source, target } => {
                write!(f, "Duplicate edge {}->{} collapsed", source, target)
            }
            Repair::ResolvedByName { reference, id } => {
                write!(f, "Node reference '{}' resolved by name to {}", reference, id)
            }
            Repair::DefaultChainSynthesized { edges } => {
                write!(f, "No valid connections, linked nodes in order ({} edges)", edges)
            }
        }
    }
}

/// A normalized document and the repairs it took to get there.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub document: WorkflowDocument,
    pub repairs: Vec<Repair>,
}

impl NormalizeOutcome {
    pub fn used_skeleton(&self) -> bool {
        self.repairs.iter().any(|r| {
            matches!(
                r,
                Repair::MalformedContainer | Repair::EmptyOrInvalidNodeSet
            )
        })
    }
}

// ── Orchestrator ────────────────────────────────────────────────

/// Where the candidate check sends a candidate.
enum Route<'a> {
    Skeleton { name: String },
    Enhance { container: &'a Bag, entries: &'a [Value] },
}

/// Normalizes candidates against a node type catalogue.
#[derive(Debug, Clone)]
pub struct Normalizer<'c> {
    catalog: &'c Catalog,
    hints: Hints,
}

impl Default for Normalizer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer<'static> {
    /// A normalizer over the built-in catalogue.
    pub fn new() -> Self {
        Self::with_catalog(Catalog::shared())
    }
}

impl<'c> Normalizer<'c> {
    pub fn with_catalog(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            hints: Hints::default(),
        }
    }

    pub fn hints(mut self, hints: Hints) -> Self {
        self.hints = hints;
        self
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    /// Normalize `candidate` into a valid document. Never fails.
    pub fn normalize(&self, candidate: &Value) -> NormalizeOutcome {
        let now = timestamp_now();
        let mut repairs = Vec::new();

        let document = match self.check_candidate(candidate, &mut repairs) {
            Route::Skeleton { name } => {
                warn!("Candidate unsalvageable, using fallback skeleton");
                skeleton::build(name, &self.hints.description, &now, self.catalog)
            }
            Route::Enhance { container, entries } => {
                match self.enhance_and_finish(container, entries, &now, &mut repairs) {
                    Some(document) => document,
                    None => {
                        warn!("No usable nodes after enhancement, using fallback skeleton");
                        repairs.push(Repair::EmptyOrInvalidNodeSet);
                        let name = parse::document_name(container.get("name"), &self.hints);
                        skeleton::build(name, &self.hints.description, &now, self.catalog)
                    }
                }
            }
        };

        for repair in &repairs {
            debug!("Repair: {}", repair);
        }
        info!(
            "Normalized workflow '{}': {} nodes, {} edges, {} repairs",
            document.name,
            document.nodes.len(),
            document.edge_count(),
            repairs.len()
        );

        NormalizeOutcome { document, repairs }
    }

    /// The minimal valid document for the configured hints.
    pub fn skeleton(&self) -> WorkflowDocument {
        let name = parse::document_name(None, &self.hints);
        skeleton::build(name, &self.hints.description, &timestamp_now(), self.catalog)
    }

    fn check_candidate<'a>(&self, candidate: &'a Value, repairs: &mut Vec<Repair>) -> Route<'a> {
        let Some(container) = candidate.as_object() else {
            repairs.push(Repair::MalformedContainer);
            return Route::Skeleton {
                name: parse::document_name(None, &self.hints),
            };
        };
        match container.get("nodes").and_then(Value::as_array) {
            Some(entries) if !entries.is_empty() => Route::Enhance { container, entries },
            _ => {
                repairs.push(Repair::EmptyOrInvalidNodeSet);
                Route::Skeleton {
                    name: parse::document_name(container.get("name"), &self.hints),
                }
            }
        }
    }

    /// Returns `None` when no node entry was an object.
    fn enhance_and_finish(
        &self,
        container: &Bag,
        entries: &[Value],
        now: &str,
        repairs: &mut Vec<Repair>,
    ) -> Option<WorkflowDocument> {
        let mut nodes = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match entry.as_object() {
                Some(raw) => {
                    let position = nodes.len();
                    nodes.push(enhance::enhance_node(raw, position, self.catalog, repairs));
                }
                None => repairs.push(Repair::NonObjectNodeDropped { index }),
            }
        }
        if nodes.is_empty() {
            return None;
        }

        enhance::ensure_unique_ids(&mut nodes, repairs);
        enhance::ensure_unique_names(&mut nodes, repairs);

        let connections =
            connections::repair_connections(&nodes, container.get("connections"), repairs);

        let structural_change = repairs.iter().any(Repair::is_structural);
        let name = parse::document_name(container.get("name"), &self.hints);
        let mut document = metadata::finalize(
            container,
            nodes,
            connections,
            metadata::Stamp {
                name,
                now,
                structural_change,
            },
            self.catalog,
        );

        document.tags = tags::normalize_tags(container.get("tags"), now);
        Some(document)
    }
}

/// Normalize with the built-in catalogue and no hints.
pub fn normalize(candidate: &Value) -> WorkflowDocument {
    Normalizer::new().normalize(candidate).document
}

/// Normalize with naming hints for the fallback path.
pub fn normalize_with_hints(candidate: &Value, hints: Hints) -> NormalizeOutcome {
    Normalizer::new().hints(hints).normalize(candidate)
}

// ── Shared helpers ──────────────────────────────────────────────

pub(crate) fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// A string value with visible content.
pub(crate) fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}
