use thiserror::Error;

/// Raised by a single layout algorithm. Callers normally recover through
/// [`crate::layout::compute_layout_or_grid`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Invalid layout option {name}: {value}")]
    InvalidOptions { name: &'static str, value: f64 },

    #[error("Layout produced a non-finite position for {0}")]
    NonFinite(String),

    #[error("Parent links form a cycle through {0}")]
    Cycle(String),

    #[error("Unknown layout '{0}' (expected grid, depth-columns, radial, force or tree)")]
    UnknownLayout(String),
}

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("No usable URLs found in the sitemap")]
    NoUrls,

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
