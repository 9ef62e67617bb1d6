//! Layout engine: interchangeable strategies that turn a node list into
//! `{node_id: (x, y)}`.
//!
//! Every strategy places every input node exactly once and is a pure
//! function of `(nodes, options)`. Positions are the top-left corner of a
//! `node_width` x `node_height` box.

mod depth_columns;
mod force;
mod grid;
mod radial;
mod tree;

pub use depth_columns::DepthColumnsLayout;
pub use force::ForceLayout;
pub use grid::GridLayout;
pub use radial::RadialLayout;
pub use tree::TreeLayout;

use crate::error::LayoutError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_WIDTH: f64 = 1200.0;
pub const DEFAULT_HEIGHT: f64 = 800.0;
pub const DEFAULT_NODE_WIDTH: f64 = 288.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 200.0;
pub const DEFAULT_ITERATIONS: usize = 150;
pub const DEFAULT_SEED: u64 = 42;

/// A node handed to the layout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: String,
    pub url: String,
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl LayoutNode {
    pub fn new(id: impl Into<String>, url: impl Into<String>, depth: usize) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            depth,
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Node id -> position. Ordered so serialized output is stable.
pub type Positions = BTreeMap<String, Position>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutKind {
    Grid,
    DepthColumns,
    Radial,
    Force,
    Tree,
}

impl LayoutKind {
    pub const ALL: [LayoutKind; 5] = [
        LayoutKind::Grid,
        LayoutKind::DepthColumns,
        LayoutKind::Radial,
        LayoutKind::Force,
        LayoutKind::Tree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::Grid => "grid",
            LayoutKind::DepthColumns => "depth-columns",
            LayoutKind::Radial => "radial",
            LayoutKind::Force => "force",
            LayoutKind::Tree => "tree",
        }
    }

    /// Spacing used when the caller does not set one.
    pub fn default_spacing(&self) -> f64 {
        match self {
            LayoutKind::Grid => 40.0,
            LayoutKind::DepthColumns => 100.0,
            LayoutKind::Radial => 100.0,
            LayoutKind::Force => 100.0,
            LayoutKind::Tree => 60.0,
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "grid" => Ok(LayoutKind::Grid),
            "depth-columns" | "depth_columns" | "depth" | "columns" => Ok(LayoutKind::DepthColumns),
            "radial" => Ok(LayoutKind::Radial),
            "force" => Ok(LayoutKind::Force),
            "tree" | "dagre" => Ok(LayoutKind::Tree),
            other => Err(LayoutError::UnknownLayout(other.to_string())),
        }
    }
}

/// Caller-facing options. Every field is optional; [`LayoutOptions::resolve`]
/// fills the gaps with per-algorithm defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing: Option<f64>,
    /// Force layout only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    /// Force layout only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl LayoutOptions {
    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_node_size(mut self, width: f64, height: f64) -> Self {
        self.node_width = Some(width);
        self.node_height = Some(height);
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = Some(spacing);
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Values set in `other` win over values set in `self`.
    pub fn merged_with(&self, other: &LayoutOptions) -> LayoutOptions {
        LayoutOptions {
            width: other.width.or(self.width),
            height: other.height.or(self.height),
            node_width: other.node_width.or(self.node_width),
            node_height: other.node_height.or(self.node_height),
            spacing: other.spacing.or(self.spacing),
            iterations: other.iterations.or(self.iterations),
            seed: other.seed.or(self.seed),
        }
    }

    pub fn resolve(&self, kind: LayoutKind) -> Result<ResolvedOptions, LayoutError> {
        let resolved = ResolvedOptions {
            width: self.width.unwrap_or(DEFAULT_WIDTH),
            height: self.height.unwrap_or(DEFAULT_HEIGHT),
            node_width: self.node_width.unwrap_or(DEFAULT_NODE_WIDTH),
            node_height: self.node_height.unwrap_or(DEFAULT_NODE_HEIGHT),
            spacing: self.spacing.unwrap_or_else(|| kind.default_spacing()),
            iterations: self.iterations.unwrap_or(DEFAULT_ITERATIONS),
            seed: self.seed.unwrap_or(DEFAULT_SEED),
        };

        for (name, value) in [
            ("width", resolved.width),
            ("height", resolved.height),
            ("node_width", resolved.node_width),
            ("node_height", resolved.node_height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidOptions { name, value });
            }
        }
        if !resolved.spacing.is_finite() || resolved.spacing < 0.0 {
            return Err(LayoutError::InvalidOptions {
                name: "spacing",
                value: resolved.spacing,
            });
        }

        Ok(resolved)
    }
}

/// Fully populated, validated options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOptions {
    pub width: f64,
    pub height: f64,
    pub node_width: f64,
    pub node_height: f64,
    pub spacing: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl ResolvedOptions {
    pub fn defaults_for(kind: LayoutKind) -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            node_width: DEFAULT_NODE_WIDTH,
            node_height: DEFAULT_NODE_HEIGHT,
            spacing: kind.default_spacing(),
            iterations: DEFAULT_ITERATIONS,
            seed: DEFAULT_SEED,
        }
    }

    /// Horizontal distance between neighbouring node origins.
    pub fn column_step(&self) -> f64 {
        self.node_width + self.spacing
    }

    /// Vertical distance between neighbouring node origins.
    pub fn row_step(&self) -> f64 {
        self.node_height + self.spacing
    }
}

pub trait LayoutAlgorithm {
    fn kind(&self) -> LayoutKind;

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError>;
}

pub fn algorithm_for(kind: LayoutKind) -> Box<dyn LayoutAlgorithm> {
    match kind {
        LayoutKind::Grid => Box::new(GridLayout),
        LayoutKind::DepthColumns => Box::new(DepthColumnsLayout),
        LayoutKind::Radial => Box::new(RadialLayout),
        LayoutKind::Force => Box::new(ForceLayout),
        LayoutKind::Tree => Box::new(TreeLayout),
    }
}

/// Run one layout algorithm. Errors on duplicate ids, invalid options, or
/// an algorithm-specific failure; never silently drops a node.
pub fn compute_layout(
    kind: LayoutKind,
    nodes: &[LayoutNode],
    options: &LayoutOptions,
) -> Result<Positions, LayoutError> {
    check_unique_ids(nodes)?;
    let resolved = options.resolve(kind)?;

    debug!("Computing {} layout for {} nodes", kind, nodes.len());
    let positions = algorithm_for(kind).compute(nodes, &resolved)?;

    for node in nodes {
        match positions.get(&node.id) {
            Some(position) if position.is_finite() => {}
            _ => return Err(LayoutError::NonFinite(node.id.clone())),
        }
    }

    Ok(positions)
}

/// Like [`compute_layout`], but a failing algorithm degrades to the grid
/// layout instead of leaving nodes unpositioned.
pub fn compute_layout_or_grid(
    kind: LayoutKind,
    nodes: &[LayoutNode],
    options: &LayoutOptions,
) -> Positions {
    match compute_layout(kind, nodes, options) {
        Ok(positions) => positions,
        Err(e) => {
            warn!("{} layout failed ({}), falling back to grid", kind, e);
            let grid_options = options
                .resolve(LayoutKind::Grid)
                .unwrap_or_else(|_| ResolvedOptions::defaults_for(LayoutKind::Grid));
            grid::place(nodes, &grid_options)
        }
    }
}

fn check_unique_ids(nodes: &[LayoutNode]) -> Result<(), LayoutError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(LayoutError::DuplicateNode(node.id.clone()));
        }
    }
    Ok(())
}

/// Nodes grouped by depth, each group sorted by URL then id.
pub(crate) fn depth_groups(nodes: &[LayoutNode]) -> BTreeMap<usize, Vec<&LayoutNode>> {
    let mut groups: BTreeMap<usize, Vec<&LayoutNode>> = BTreeMap::new();
    for node in nodes {
        groups.entry(node.depth).or_default().push(node);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.id.cmp(&b.id)));
    }
    groups
}
