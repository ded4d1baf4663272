//! Adapter from the `/api/graph` payload to a render-ready node/edge model.
//!
//! Layout is left to whoever draws the model; this module only decides
//! labels, groups, tooltips and which edges are well formed.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::query::{build_graph_query, clamp_graph_limit, GraphQuery};
use crate::session::Ticket;
use crate::types::{value_text, GraphPayload, RawNode};

/// Node properties consulted for the label, highest priority first.
pub const LABEL_PROPERTIES: &[&str] = &["ticker", "symbol", "metric", "quarter"];
pub const DEFAULT_GROUP: &str = "Node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNodeView {
    pub id: String,
    pub label: String,
    pub group: String,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdgeView {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: String,
    pub directed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphModel {
    nodes: Vec<GraphNodeView>,
    edges: Vec<GraphEdgeView>,
    index: HashMap<String, usize>,
}

impl GraphModel {
    pub fn from_payload(payload: &GraphPayload) -> Self {
        let mut nodes = Vec::with_capacity(payload.nodes.len());
        let mut index = HashMap::with_capacity(payload.nodes.len());
        for node in &payload.nodes {
            if index.contains_key(&node.id) {
                continue;
            }
            index.insert(node.id.clone(), nodes.len());
            nodes.push(GraphNodeView {
                id: node.id.clone(),
                label: node_label(node),
                group: node
                    .labels
                    .first()
                    .filter(|label| !label.trim().is_empty())
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_GROUP.to_string()),
                tooltip: node_tooltip(node),
            });
        }

        let mut edges = Vec::with_capacity(payload.edges.len());
        for edge in &payload.edges {
            if !index.contains_key(&edge.source) || !index.contains_key(&edge.target) {
                warn!(
                    "Dropping graph edge {} ({} -> {}): endpoint not in node set",
                    edge.id, edge.source, edge.target
                );
                continue;
            }
            edges.push(GraphEdgeView {
                id: edge.id.clone(),
                from: edge.source.clone(),
                to: edge.target.clone(),
                label: edge.edge_type.clone().unwrap_or_default(),
                directed: true,
            });
        }

        Self {
            nodes,
            edges,
            index,
        }
    }

    pub fn nodes(&self) -> &[GraphNodeView] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdgeView] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Distinct groups in first-seen order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if !groups.contains(&node.group.as_str()) {
                groups.push(node.group.as_str());
            }
        }
        groups
    }
}

/// First non-empty of `ticker`, `symbol`, `metric`, `quarter`, the first
/// label tag, then the raw id.
pub fn node_label(node: &RawNode) -> String {
    LABEL_PROPERTIES
        .iter()
        .filter_map(|key| node.properties.get(*key))
        .map(value_text)
        .chain(node.labels.iter().cloned())
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_else(|| node.id.clone())
}

fn node_tooltip(node: &RawNode) -> String {
    let mut lines = Vec::new();
    if !node.labels.is_empty() {
        lines.push(node.labels.join(":"));
    }
    let mut properties: Vec<(&String, String)> = node
        .properties
        .iter()
        .map(|(key, value)| (key, value_text(value)))
        .filter(|(_, text)| !text.is_empty())
        .collect();
    properties.sort_by(|a, b| a.0.cmp(b.0));
    lines.extend(properties.into_iter().map(|(key, text)| format!("{key}: {text}")));
    if lines.is_empty() {
        lines.push(node.id.clone());
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRequest {
    pub ticket: Ticket,
    pub query: String,
}

/// The displayed graph. Each load replaces the whole model; responses for
/// anything but the latest request are ignored.
#[derive(Debug, Clone, Default)]
pub struct GraphView {
    generation: u64,
    query: GraphQuery,
    model: GraphModel,
    loading: bool,
}

impl GraphView {
    pub fn new(limit: u32) -> Self {
        Self {
            query: GraphQuery {
                ticker: None,
                limit: clamp_graph_limit(limit),
            },
            ..Self::default()
        }
    }

    pub fn request(&mut self, ticker: Option<String>) -> GraphRequest {
        self.generation += 1;
        self.query.ticker = ticker
            .map(|ticker| ticker.trim().to_string())
            .filter(|ticker| !ticker.is_empty());
        self.loading = true;
        GraphRequest {
            ticket: Ticket::new(self.generation),
            query: build_graph_query(&self.query),
        }
    }

    /// Installs the payload if it answers the latest request.
    pub fn accept(&mut self, ticket: Ticket, payload: &GraphPayload) -> bool {
        if ticket.generation() != self.generation {
            warn!(
                "Ignoring stale graph response (generation {} < {})",
                ticket.generation(),
                self.generation
            );
            return false;
        }
        self.replace(payload);
        self.loading = false;
        info!(
            "Graph loaded: {} nodes, {} edges",
            self.model.nodes().len(),
            self.model.edges().len()
        );
        true
    }

    /// Swaps the whole node and edge set for the one in `payload`.
    pub fn replace(&mut self, payload: &GraphPayload) {
        self.model = GraphModel::from_payload(payload);
    }

    /// Marks the latest request as finished without touching the model.
    pub fn fail(&mut self, ticket: Ticket) -> bool {
        if ticket.generation() != self.generation {
            return false;
        }
        self.loading = false;
        true
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn focus(&self) -> Option<&str> {
        self.query.ticker.as_deref()
    }

    pub fn limit(&self) -> u32 {
        self.query.limit
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.query.limit = clamp_graph_limit(limit);
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> GraphPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn ticker_beats_symbol() {
        let graph = payload(json!({
            "nodes": [{"id": "n1", "labels": ["Ticker"], "properties": {"ticker": "AAPL", "symbol": "A"}}],
            "edges": []
        }));
        let model = GraphModel::from_payload(&graph);
        assert_eq!(model.nodes()[0].label, "AAPL");
        assert_eq!(model.nodes()[0].group, "Ticker");
    }

    #[test]
    fn label_priority_walks_properties_then_labels_then_id() {
        let nodes = payload(json!({"nodes": [
            {"id": "a", "properties": {"symbol": "MSFT", "metric": "EPS"}},
            {"id": "b", "properties": {"metric": "", "quarter": "2024-Q2"}},
            {"id": "c", "labels": ["Fact"], "properties": {"name": "x"}},
            {"id": "d"}
        ]}));
        let model = GraphModel::from_payload(&nodes);
        let labels: Vec<&str> = model.nodes().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["MSFT", "2024-Q2", "Fact", "d"]);
        assert_eq!(model.nodes()[3].group, DEFAULT_GROUP);
    }

    #[test]
    fn edges_default_label_and_are_directed() {
        let graph = payload(json!({
            "nodes": [{"id": "a"}, {"id": "b"}],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "b", "target": "a", "type": "HAS_FACT"}
            ]
        }));
        let model = GraphModel::from_payload(&graph);
        assert_eq!(model.edges()[0].label, "");
        assert_eq!(model.edges()[1].label, "HAS_FACT");
        assert!(model.edges().iter().all(|edge| edge.directed));
        assert_eq!(model.edges()[1].from, "b");
        assert_eq!(model.node_index("b"), Some(1));
    }

    #[test]
    fn dangling_edges_and_duplicate_nodes_are_dropped() {
        let graph = payload(json!({
            "nodes": [{"id": "a", "properties": {"ticker": "X"}}, {"id": "a", "properties": {"ticker": "Y"}}],
            "edges": [{"id": "e1", "source": "a", "target": "zzz"}]
        }));
        let model = GraphModel::from_payload(&graph);
        assert_eq!(model.nodes().len(), 1);
        assert_eq!(model.nodes()[0].label, "X");
        assert!(model.edges().is_empty());
    }

    #[test]
    fn tooltip_lists_labels_and_sorted_properties() {
        let graph = payload(json!({"nodes": [
            {"id": "a", "labels": ["Fact", "Metric"], "properties": {"value": 1.2, "metric": "EPS", "note": null}}
        ]}));
        let model = GraphModel::from_payload(&graph);
        assert_eq!(model.nodes()[0].tooltip, "Fact:Metric\nmetric: EPS\nvalue: 1.2");
    }

    #[test]
    fn reload_replaces_instead_of_accumulating() {
        let mut view = GraphView::new(50);
        let first = view.request(Some("AAPL".to_string()));
        assert!(view.accept(
            first.ticket,
            &payload(json!({"nodes": [{"id": "a"}, {"id": "b"}]}))
        ));
        assert_eq!(view.model().nodes().len(), 2);

        let second = view.request(Some("MSFT".to_string()));
        assert!(view.accept(second.ticket, &payload(json!({"nodes": [{"id": "c"}]}))));
        assert_eq!(view.model().nodes().len(), 1);
        assert_eq!(view.model().nodes()[0].id, "c");
        assert_eq!(view.focus(), Some("MSFT"));
    }

    #[test]
    fn replace_is_idempotent() {
        let graph = payload(json!({
            "nodes": [{"id": "a"}, {"id": "b"}],
            "edges": [{"id": "e", "source": "a", "target": "b"}]
        }));
        let mut view = GraphView::new(50);
        view.replace(&graph);
        view.replace(&graph);
        assert_eq!(view.model().nodes().len(), 2);
        assert_eq!(view.model().edges().len(), 1);
    }

    #[test]
    fn late_response_for_older_request_is_ignored() {
        let mut view = GraphView::new(50);
        let old = view.request(Some("AAPL".to_string()));
        let current = view.request(None);
        assert!(current.query.starts_with("limit="));
        assert!(view.accept(current.ticket, &payload(json!({"nodes": [{"id": "new"}]}))));
        assert!(!view.accept(old.ticket, &payload(json!({"nodes": [{"id": "old"}]}))));
        assert_eq!(view.model().nodes()[0].id, "new");
        assert!(!view.fail(old.ticket));
        assert!(!view.is_loading());
    }

    #[test]
    fn groups_are_distinct_in_order() {
        let graph = payload(json!({"nodes": [
            {"id": "a", "labels": ["Ticker"]},
            {"id": "b", "labels": ["Fact"]},
            {"id": "c", "labels": ["Ticker"]}
        ]}));
        assert_eq!(GraphModel::from_payload(&graph).groups(), vec!["Ticker", "Fact"]);
    }
}
