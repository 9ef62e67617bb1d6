pub mod entry;
pub mod error;
pub mod fetcher;
pub mod parser;

pub use entry::SitemapEntry;
pub use error::ScanError;
pub use fetcher::{ProgressCallback, SitemapFetcher};
pub use parser::{SitemapDocument, parse_document};
