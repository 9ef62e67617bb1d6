//! Hierarchy + positions → node/edge records for the storage side.
//!
//! Identifiers are never generated here: every `id` and `parent_id` comes
//! from the caller's [`IdResolver`].

use crate::hierarchy::{UrlHierarchy, UrlHierarchyNode};
use crate::layout::{Position, Positions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Maps a hierarchy node to the identifier the storage side knows it by.
pub trait IdResolver {
    fn resolve(&self, node: &UrlHierarchyNode) -> Option<String>;
}

/// URL -> id, as returned by [`crate::store::GraphStore::assign_ids`].
impl IdResolver for HashMap<String, String> {
    fn resolve(&self, node: &UrlHierarchyNode) -> Option<String> {
        self.get(&node.url).cloned()
    }
}

impl<F> IdResolver for F
where
    F: Fn(&UrlHierarchyNode) -> Option<String>,
{
    fn resolve(&self, node: &UrlHierarchyNode) -> Option<String> {
        self(node)
    }
}

/// Uses the normalized path as id. For output that is never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIds;

impl IdResolver for PathIds {
    fn resolve(&self, node: &UrlHierarchyNode) -> Option<String> {
        Some(node.path.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedNode {
    pub id: String,
    pub url: String,
    pub title: String,
    pub depth: usize,
    pub path: String,
    pub parent_id: Option<String>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub nodes: Vec<ProjectedNode>,
    pub edges: Vec<Edge>,
}

impl Projection {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn get(&self, id: &str) -> Option<&ProjectedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Project the first `max_nodes` hierarchy nodes (display order).
///
/// `positions` is keyed by path. Nodes the resolver cannot identify are
/// skipped; a parent outside the projected set leaves `parent_id` empty and
/// produces no edge.
pub fn project<R>(
    hierarchy: &UrlHierarchy,
    positions: &Positions,
    resolver: &R,
    max_nodes: usize,
) -> Projection
where
    R: IdResolver + ?Sized,
{
    if hierarchy.len() > max_nodes {
        info!(
            "Truncating {} nodes to the first {}",
            hierarchy.len(),
            max_nodes
        );
    }

    let selected: Vec<&UrlHierarchyNode> = hierarchy.iter().take(max_nodes).collect();

    let mut ids: HashMap<&str, String> = HashMap::with_capacity(selected.len());
    for node in &selected {
        match resolver.resolve(node) {
            Some(id) => {
                ids.insert(node.path.as_str(), id);
            }
            None => warn!("No id for {}, leaving it out of the graph", node.url),
        }
    }

    let mut projection = Projection::default();
    for node in selected {
        let Some(id) = ids.get(node.path.as_str()) else {
            continue;
        };

        let parent_id = node
            .parent_path
            .as_deref()
            .and_then(|parent| ids.get(parent))
            .cloned();

        let position = positions.get(&node.path).copied().unwrap_or_else(|| {
            debug!("No position for {}, placing at origin", node.path);
            Position::ORIGIN
        });

        if let Some(source) = &parent_id {
            projection.edges.push(Edge {
                source: source.clone(),
                target: id.clone(),
            });
        }

        projection.nodes.push(ProjectedNode {
            id: id.clone(),
            url: node.url.clone(),
            title: node.title.clone(),
            depth: node.depth,
            path: node.path.clone(),
            parent_id,
            position,
        });
    }

    debug!(
        "Projected {} nodes and {} edges",
        projection.node_count(),
        projection.edge_count()
    );
    projection
}
