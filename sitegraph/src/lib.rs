// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

pub use handlers::{
    InitOutcome, LayoutRequest, SitemapSource, build_graph, init_config_dir, load_config,
    load_entries, move_node,
};
