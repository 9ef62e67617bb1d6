pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod hierarchy;
pub mod layout;
pub mod projection;
pub mod report;
pub mod store;
pub mod trie;

pub use cache::HierarchyCache;
pub use config::{FetchOptions, SiteGraphConfig};
pub use error::{GraphError, LayoutError};
pub use graph::{SiteGraph, build_site_graph, prepare_hierarchy};
pub use hierarchy::{HierarchyInput, ParentLink, UrlHierarchy, UrlHierarchyNode, build_hierarchy};
pub use layout::{
    LayoutKind, LayoutNode, LayoutOptions, Position, Positions, compute_layout,
    compute_layout_or_grid,
};
pub use projection::{Edge, IdResolver, PathIds, ProjectedNode, Projection, project};
pub use store::GraphStore;
