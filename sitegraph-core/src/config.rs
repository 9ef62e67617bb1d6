use crate::error::{GraphError, Result};
use crate::layout::{LayoutKind, LayoutOptions};
use serde::{Deserialize, Serialize};
use sitegraph_scanner::SitemapFetcher;
use sitegraph_scanner::fetcher::{
    DEFAULT_BATCH_SIZE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_SITEMAPS, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/sitegraph";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "sitegraph.db";
pub const DEFAULT_MAX_NODES: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub max_depth: usize,
    pub max_sitemaps: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_sitemaps: DEFAULT_MAX_SITEMAPS,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchOptions {
    pub fn build_fetcher(&self) -> sitegraph_scanner::error::Result<SitemapFetcher> {
        Ok(
            SitemapFetcher::with_client_settings(self.timeout_secs, &self.user_agent)?
                .with_max_depth(self.max_depth)
                .with_max_sitemaps(self.max_sitemaps)
                .with_batch_size(self.batch_size),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteGraphConfig {
    pub fetch: FetchOptions,
    pub layout_kind: LayoutKind,
    pub layout: LayoutOptions,
    pub max_nodes: usize,
}

impl Default for SiteGraphConfig {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            layout_kind: LayoutKind::Tree,
            layout: LayoutOptions::default(),
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl SiteGraphConfig {
    /// Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| GraphError::Config(format!("{}: {}", path.display(), e)))
    }

    /// `load` when the file exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GraphError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// `~` expanded form of `dir`, or of the default config dir.
pub fn config_dir(dir: Option<&str>) -> PathBuf {
    let raw = dir.unwrap_or(DEFAULT_CONFIG_DIR);
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}
