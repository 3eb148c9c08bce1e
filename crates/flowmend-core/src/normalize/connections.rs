use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::Repair;
use crate::{Connections, Edge, MAIN_PORT, Node};

/// An edge as read from the candidate, before its target is checked.
struct RawEdge {
    target: Option<String>,
    port_type: String,
    port_index: u32,
}

/// Maps node references (ids, or unique names) to final node ids.
struct NodeResolver<'a> {
    ids: HashSet<&'a str>,
    names: HashMap<&'a str, &'a str>,
    order: HashMap<&'a str, usize>,
}

impl<'a> NodeResolver<'a> {
    fn new(nodes: &'a [Node]) -> Self {
        Self {
            ids: nodes.iter().map(|n| n.id.as_str()).collect(),
            names: nodes
                .iter()
                .map(|n| (n.name.as_str(), n.id.as_str()))
                .collect(),
            order: nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.id.as_str(), i))
                .collect(),
        }
    }

    /// Ids win over names.
    fn resolve(&self, reference: &str, repairs: &mut Vec<Repair>) -> Option<&'a str> {
        if let Some(&id) = self.ids.get(reference) {
            return Some(id);
        }
        let id = self.names.get(reference).copied()?;
        repairs.push(Repair::ResolvedByName {
            reference: reference.to_string(),
            id: id.to_string(),
        });
        Some(id)
    }
}

/// Prune the candidate's connection map against the final node set.
///
/// Sources and targets that name no node are dropped. When nothing valid is
/// left and there are at least two nodes, the nodes are chained in sequence
/// order on `main` port 0.
pub(crate) fn repair_connections(
    nodes: &[Node],
    raw: Option<&Value>,
    repairs: &mut Vec<Repair>,
) -> Connections {
    let resolver = NodeResolver::new(nodes);
    let mut connections = Connections::new();

    match raw {
        Some(Value::Object(map)) => {
            for (key, entry) in map {
                let Some(source) = resolver.resolve(key, repairs) else {
                    repairs.push(Repair::DanglingConnectionSource {
                        source: key.clone(),
                    });
                    continue;
                };
                let lanes = read_lanes(entry);
                let slot: &mut Vec<Vec<Edge>> =
                    connections.entry(source.to_string()).or_default();
                if slot.len() < lanes.len() {
                    slot.resize_with(lanes.len(), Vec::new);
                }
                for (lane, raw_edges) in lanes.into_iter().enumerate() {
                    for raw_edge in raw_edges {
                        let target = raw_edge
                            .target
                            .as_deref()
                            .and_then(|t| resolver.resolve(t, repairs));
                        match target {
                            Some(target) => slot[lane].push(Edge {
                                target_node_id: target.to_string(),
                                port_type: raw_edge.port_type,
                                port_index: raw_edge.port_index,
                            }),
                            None => repairs.push(Repair::DanglingEdge {
                                source: source.to_string(),
                                target: raw_edge.target.unwrap_or_default(),
                            }),
                        }
                    }
                }
            }
        }
        None | Some(Value::Null) => {}
        Some(_) => repairs.push(Repair::MalformedConnections),
    }

    for (source, lanes) in connections.iter_mut() {
        for lane in lanes.iter_mut() {
            dedup_lane(source, lane, repairs);
        }
        while lanes.last().is_some_and(|lane| lane.is_empty()) {
            lanes.pop();
        }
    }
    connections.retain(|_, lanes| !lanes.is_empty());

    if connections.is_empty() && nodes.len() >= 2 {
        for pair in nodes.windows(2) {
            connections.insert(pair[0].id.clone(), vec![vec![Edge::main(&pair[1].id)]]);
        }
        repairs.push(Repair::DefaultChainSynthesized {
            edges: nodes.len() - 1,
        });
    }

    connections.sort_by(|a, _, b, _| {
        let rank = |id: &String| resolver.order.get(id.as_str()).copied();
        rank(a).cmp(&rank(b))
    });
    connections
}

/// Read one source entry into lanes of raw edges.
///
/// Accepted shapes:
/// - `[[edge, ..], ..]` — one list per lane
/// - `{"main": [[edge, ..], ..]}` — lanes keyed by port type
///
/// A lane that is a single edge (not a list) counts as a one-edge lane.
fn read_lanes(entry: &Value) -> Vec<Vec<RawEdge>> {
    match entry {
        Value::Array(lanes) => lanes.iter().map(|lane| read_lane(lane, MAIN_PORT)).collect(),
        Value::Object(ports) => ports
            .iter()
            .flat_map(|(port, lanes)| match lanes {
                Value::Array(lanes) => lanes
                    .iter()
                    .map(|lane| read_lane(lane, port))
                    .collect::<Vec<_>>(),
                single => vec![read_lane(single, port)],
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn read_lane(lane: &Value, default_port: &str) -> Vec<RawEdge> {
    match lane {
        Value::Array(edges) => edges
            .iter()
            .map(|edge| read_edge(edge, default_port))
            .collect(),
        Value::Null => Vec::new(),
        single => vec![read_edge(single, default_port)],
    }
}

fn read_edge(edge: &Value, default_port: &str) -> RawEdge {
    let field = |primary: &str, alias: &str| edge.get(primary).or_else(|| edge.get(alias));
    let target = match edge {
        Value::String(target) => Some(target.clone()),
        _ => field("targetNodeId", "node")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    let port_type = field("portType", "type")
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(default_port)
        .to_string();
    let port_index = field("portIndex", "index")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or(0);
    RawEdge {
        target: target.filter(|t| !t.is_empty()),
        port_type,
        port_index,
    }
}

fn dedup_lane(source: &str, lane: &mut Vec<Edge>, repairs: &mut Vec<Repair>) {
    let mut seen = HashSet::with_capacity(lane.len());
    lane.retain(|edge| {
        if seen.insert(edge.clone()) {
            return true;
        }
        repairs.push(Repair::DuplicateEdge {
            source: source.to_string(),
            target: edge.target_node_id.clone(),
        });
        false
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bag, Position};
    use serde_json::json;

    fn node(id: &str, name: &str) -> Node {
        Node {
            id: id.into(),
            name: name.into(),
            node_type: "n8n-nodes-base.set".into(),
            type_version: 3,
            parameters: Bag::new(),
            position: Position::default(),
            webhook_id: None,
            extra: Bag::new(),
        }
    }

    fn repair(nodes: &[Node], raw: Value) -> (Connections, Vec<Repair>) {
        let mut repairs = Vec::new();
        let connections = repair_connections(nodes, Some(&raw), &mut repairs);
        (connections, repairs)
    }

    #[test]
    fn test_dangling_target_pruned_single_node_stays_empty() {
        let nodes = vec![node("a", "A")];
        let (connections, repairs) = repair(&nodes, json!({"a": [[{"targetNodeId": "b"}]]}));
        assert!(connections.is_empty());
        assert_eq!(
            repairs,
            vec![Repair::DanglingEdge {
                source: "a".into(),
                target: "b".into()
            }]
        );
    }

    #[test]
    fn test_dangling_source_dropped() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let (connections, repairs) = repair(
            &nodes,
            json!({"ghost": [[{"targetNodeId": "a"}]], "a": [[{"targetNodeId": "b"}]]}),
        );
        assert_eq!(connections.len(), 1);
        assert_eq!(connections["a"][0], vec![Edge::main("b")]);
        assert!(repairs.contains(&Repair::DanglingConnectionSource {
            source: "ghost".into()
        }));
    }

    #[test]
    fn test_default_chain_in_node_order() {
        let nodes = vec![node("a", "A"), node("b", "B"), node("c", "C")];
        let mut repairs = Vec::new();
        let connections = repair_connections(&nodes, None, &mut repairs);
        assert_eq!(connections.len(), 2);
        assert_eq!(connections["a"], vec![vec![Edge::main("b")]]);
        assert_eq!(connections["b"], vec![vec![Edge::main("c")]]);
        assert!(!connections.contains_key("c"));
        assert_eq!(repairs, vec![Repair::DefaultChainSynthesized { edges: 2 }]);
    }

    #[test]
    fn test_all_invalid_falls_back_to_chain() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let (connections, _) = repair(&nodes, json!({"x": [[{"targetNodeId": "y"}]]}));
        assert_eq!(connections["a"], vec![vec![Edge::main("b")]]);
    }

    #[test]
    fn test_port_keyed_shape_with_aliases() {
        let nodes = vec![node("a", "A"), node("b", "B"), node("c", "C")];
        let (connections, repairs) = repair(
            &nodes,
            json!({
                "a": {"main": [
                    [{"node": "b", "type": "main", "index": 0}],
                    [{"node": "c", "index": 1}]
                ]}
            }),
        );
        assert!(repairs.is_empty());
        assert_eq!(connections["a"][0], vec![Edge::main("b")]);
        assert_eq!(
            connections["a"][1],
            vec![Edge {
                target_node_id: "c".into(),
                port_type: "main".into(),
                port_index: 1
            }]
        );
    }

    #[test]
    fn test_names_resolve_to_ids() {
        let nodes = vec![node("id-1", "Form Webhook"), node("id-2", "Save to Sheets")];
        let (connections, repairs) = repair(
            &nodes,
            json!({"Form Webhook": {"main": [[{"node": "Save to Sheets"}]]}}),
        );
        assert_eq!(connections["id-1"], vec![vec![Edge::main("id-2")]]);
        assert_eq!(repairs.len(), 2);
        assert!(repairs
            .iter()
            .all(|r| matches!(r, Repair::ResolvedByName { .. })));
    }

    #[test]
    fn test_loose_edge_shapes() {
        let nodes = vec![node("a", "A"), node("b", "B"), node("c", "C")];
        let (connections, _) = repair(&nodes, json!({"a": ["b"], "b": [{"targetNodeId": "c"}]}));
        assert_eq!(connections["a"], vec![vec![Edge::main("b")]]);
        assert_eq!(connections["b"], vec![vec![Edge::main("c")]]);
    }

    #[test]
    fn test_duplicates_collapsed_and_trailing_lanes_trimmed() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let (connections, repairs) = repair(
            &nodes,
            json!({"a": [[], [{"targetNodeId": "b"}, {"targetNodeId": "b"}], [{"targetNodeId": "zzz"}]]}),
        );
        assert_eq!(connections["a"], vec![vec![], vec![Edge::main("b")]]);
        assert!(repairs.contains(&Repair::DuplicateEdge {
            source: "a".into(),
            target: "b".into()
        }));
    }

    #[test]
    fn test_output_keys_follow_node_order() {
        let nodes = vec![node("z", "Z"), node("a", "A"), node("m", "M")];
        let (connections, _) = repair(
            &nodes,
            json!({"a": [["m"]], "z": [["a"]]}),
        );
        let keys: Vec<&str> = connections.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_malformed_connections_value() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let (connections, repairs) = repair(&nodes, json!("a->b"));
        assert_eq!(connections["a"], vec![vec![Edge::main("b")]]);
        assert_eq!(repairs[0], Repair::MalformedConnections);
    }
}
