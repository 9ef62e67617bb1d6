//! End-to-end pipeline: entries → hierarchy → positions → projection.

use crate::cache::HierarchyCache;
use crate::error::{GraphError, Result};
use crate::hierarchy::{HierarchyInput, UrlHierarchy, build_hierarchy};
use crate::layout::{LayoutKind, LayoutOptions, Positions, compute_layout_or_grid};
use crate::projection::{IdResolver, Projection, project};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct SiteGraph {
    pub layout: LayoutKind,
    pub hierarchy: UrlHierarchy,
    pub positions: Positions,
    pub projection: Projection,
}

/// Build the hierarchy and cut it to `max_nodes` (display order).
/// Fails only when nothing usable is left.
pub fn prepare_hierarchy<I>(entries: &[I], max_nodes: usize) -> Result<UrlHierarchy>
where
    I: Clone + Into<HierarchyInput>,
{
    finish_hierarchy(&build_hierarchy(entries), max_nodes)
}

/// [`prepare_hierarchy`] through a caller-owned cache.
pub fn prepare_hierarchy_cached<I>(
    cache: &mut HierarchyCache,
    entries: &[I],
    max_nodes: usize,
) -> Result<UrlHierarchy>
where
    I: Clone + Into<HierarchyInput>,
{
    let hierarchy = cache.get_or_build(entries);
    finish_hierarchy(&hierarchy, max_nodes)
}

fn finish_hierarchy(hierarchy: &UrlHierarchy, max_nodes: usize) -> Result<UrlHierarchy> {
    if hierarchy.is_empty() {
        return Err(GraphError::NoUrls);
    }
    if hierarchy.len() > max_nodes {
        info!(
            "Sitemap has {} pages, keeping the first {}",
            hierarchy.len(),
            max_nodes
        );
    }
    Ok(hierarchy.truncated(max_nodes))
}

/// Positions keyed by path. A failing layout degrades to the grid.
pub fn layout_hierarchy(
    hierarchy: &UrlHierarchy,
    kind: LayoutKind,
    options: &LayoutOptions,
) -> Positions {
    compute_layout_or_grid(kind, &hierarchy.to_layout_nodes(), options)
}

/// Lay out a prepared hierarchy and project it with `resolver`.
pub fn graph_from_hierarchy<R>(
    hierarchy: UrlHierarchy,
    kind: LayoutKind,
    options: &LayoutOptions,
    resolver: &R,
    max_nodes: usize,
) -> SiteGraph
where
    R: IdResolver + ?Sized,
{
    graph_from_hierarchy_pinned(
        hierarchy,
        kind,
        options,
        &Positions::new(),
        resolver,
        max_nodes,
    )
}

/// [`graph_from_hierarchy`], but any page with an entry in `pinned` (keyed
/// by path) keeps that position instead of the computed one.
pub fn graph_from_hierarchy_pinned<R>(
    hierarchy: UrlHierarchy,
    kind: LayoutKind,
    options: &LayoutOptions,
    pinned: &Positions,
    resolver: &R,
    max_nodes: usize,
) -> SiteGraph
where
    R: IdResolver + ?Sized,
{
    let mut positions = layout_hierarchy(&hierarchy, kind, options);
    let mut kept = 0usize;
    for (path, position) in pinned {
        if let Some(slot) = positions.get_mut(path) {
            *slot = *position;
            kept += 1;
        }
    }
    if kept > 0 {
        debug!("Kept {} pinned positions", kept);
    }

    let projection = project(&hierarchy, &positions, resolver, max_nodes);
    SiteGraph {
        layout: kind,
        hierarchy,
        positions,
        projection,
    }
}

pub fn build_site_graph<I, R>(
    entries: &[I],
    kind: LayoutKind,
    options: &LayoutOptions,
    resolver: &R,
    max_nodes: usize,
) -> Result<SiteGraph>
where
    I: Clone + Into<HierarchyInput>,
    R: IdResolver + ?Sized,
{
    let hierarchy = prepare_hierarchy(entries, max_nodes)?;
    Ok(graph_from_hierarchy(
        hierarchy, kind, options, resolver, max_nodes,
    ))
}
