//! Page hierarchy reconstructed from URL path structure alone.
//!
//! Parents are resolved in ascending depth order against a [`PathTrie`]:
//! exact parent, then the closest existing ancestor, then the site root,
//! otherwise the page stays an unattached root.

use crate::layout::LayoutNode;
use crate::trie::PathTrie;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use sitegraph_scanner::SitemapEntry;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

pub const ROOT_PATH: &str = "/";

/// One URL handed to the builder, with an optional display title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HierarchyInput {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl HierarchyInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl From<&str> for HierarchyInput {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for HierarchyInput {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl From<SitemapEntry> for HierarchyInput {
    fn from(entry: SitemapEntry) -> Self {
        Self::new(entry.url)
    }
}

impl From<&SitemapEntry> for HierarchyInput {
    fn from(entry: &SitemapEntry) -> Self {
        Self::new(entry.url.clone())
    }
}

/// How a node found its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentLink {
    /// Depth 0, never looks for a parent.
    TopLevel,
    Exact,
    Ancestor,
    RootFallback,
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlHierarchyNode {
    pub path: String,
    pub url: String,
    pub domain: String,
    pub depth: usize,
    pub parent_path: Option<String>,
    pub children: Vec<String>,
    pub title: String,
    pub link: ParentLink,
}

impl UrlHierarchyNode {
    pub fn is_root(&self) -> bool {
        self.parent_path.is_none()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }
}

/// Path-keyed forest, iterated in input (display) order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UrlHierarchy {
    nodes: IndexMap<String, UrlHierarchyNode>,
}

impl UrlHierarchy {
    pub fn get(&self, path: &str) -> Option<&UrlHierarchyNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UrlHierarchyNode> {
        self.nodes.values()
    }

    /// Nodes without a parent, in display order.
    pub fn roots(&self) -> impl Iterator<Item = &UrlHierarchyNode> {
        self.nodes.values().filter(|n| n.is_root())
    }

    /// `(parent, child)` path pairs, one per link, in child display order.
    pub fn edges(&self) -> Vec<(&str, &str)> {
        self.nodes
            .values()
            .filter_map(|n| Some((n.parent_path.as_deref()?, n.path.as_str())))
            .collect()
    }

    /// Layout input with the path as node id.
    pub fn to_layout_nodes(&self) -> Vec<LayoutNode> {
        self.nodes
            .values()
            .map(|n| {
                let node = LayoutNode::new(n.path.clone(), n.url.clone(), n.depth);
                match &n.parent_path {
                    Some(parent) => node.with_parent(parent.clone()),
                    None => node,
                }
            })
            .collect()
    }

    /// The first `max_nodes` nodes in display order. Links to a dropped
    /// parent are cut, leaving the child as an orphan.
    pub fn truncated(&self, max_nodes: usize) -> UrlHierarchy {
        if self.nodes.len() <= max_nodes {
            return self.clone();
        }

        let mut nodes: IndexMap<String, UrlHierarchyNode> = self
            .nodes
            .iter()
            .take(max_nodes)
            .map(|(path, node)| (path.clone(), node.clone()))
            .collect();

        let kept: HashSet<String> = nodes.keys().cloned().collect();
        for node in nodes.values_mut() {
            node.children.retain(|child| kept.contains(child));
            if let Some(parent) = &node.parent_path
                && !kept.contains(parent)
            {
                node.parent_path = None;
                node.link = ParentLink::Orphan;
            }
        }

        UrlHierarchy { nodes }
    }

    /// Pre-order walk from each root, with the nesting level.
    pub fn walk_depth_first(&self) -> Vec<(&UrlHierarchyNode, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(&UrlHierarchyNode, usize)> = self.roots().map(|n| (n, 0)).collect();
        stack.reverse();

        while let Some((node, level)) = stack.pop() {
            out.push((node, level));
            for child in node.children.iter().rev() {
                if let Some(child) = self.nodes.get(child) {
                    stack.push((child, level + 1));
                }
            }
        }

        out
    }
}

struct ParsedUrl {
    url: String,
    domain: String,
    segments: Vec<String>,
    title: Option<String>,
}

/// Build the page forest for `entries`.
///
/// Malformed URLs are dropped with a warning; the first URL seen for a
/// path wins.
pub fn build_hierarchy<I>(entries: &[I]) -> UrlHierarchy
where
    I: Clone + Into<HierarchyInput>,
{
    let mut parsed: IndexMap<String, ParsedUrl> = IndexMap::with_capacity(entries.len());

    for entry in entries {
        let input: HierarchyInput = entry.clone().into();
        let url = match Url::parse(input.url.trim()) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping malformed URL {}: {}", input.url, e);
                continue;
            }
        };

        let segments: Vec<String> = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let path = path_key(&segments);

        if parsed.contains_key(&path) {
            debug!("Ignoring duplicate path {} ({})", path, input.url);
            continue;
        }

        parsed.insert(
            path,
            ParsedUrl {
                url: input.url.trim().to_string(),
                domain: url.host_str().unwrap_or_default().to_string(),
                segments,
                title: input.title.filter(|t| !t.trim().is_empty()),
            },
        );
    }

    // Stable sort keeps input order within a depth.
    let mut by_depth: Vec<usize> = (0..parsed.len()).collect();
    by_depth.sort_by_key(|&i| parsed[i].segments.len());

    let mut trie = PathTrie::new();
    let mut links: Vec<(Option<String>, ParentLink)> = vec![(None, ParentLink::Orphan); parsed.len()];

    for i in by_depth {
        let (path, page) = match parsed.get_index(i) {
            Some(entry) => entry,
            None => continue,
        };
        let depth = page.segments.len();

        links[i] = if depth == 0 {
            (None, ParentLink::TopLevel)
        } else {
            match trie.closest_ancestor(&page.segments) {
                Some((parent, d)) if d + 1 == depth => (Some(parent.to_string()), ParentLink::Exact),
                Some((parent, 0)) => (Some(parent.to_string()), ParentLink::RootFallback),
                Some((parent, _)) => (Some(parent.to_string()), ParentLink::Ancestor),
                None => (None, ParentLink::Orphan),
            }
        };

        trie.insert(&page.segments, path.clone());
    }

    let mut nodes: IndexMap<String, UrlHierarchyNode> = parsed
        .into_iter()
        .zip(links)
        .map(|((path, page), (parent_path, link))| {
            let title = page.title.unwrap_or_else(|| derive_title(&page.segments));
            let node = UrlHierarchyNode {
                path: path.clone(),
                url: page.url,
                domain: page.domain,
                depth: page.segments.len(),
                parent_path,
                children: Vec::new(),
                title,
                link,
            };
            (path, node)
        })
        .collect();

    let pairs: Vec<(String, String)> = nodes
        .values()
        .filter_map(|n| Some((n.parent_path.clone()?, n.path.clone())))
        .collect();
    for (parent, child) in pairs {
        if let Some(parent) = nodes.get_mut(&parent) {
            parent.children.push(child);
        }
    }

    debug!("Built hierarchy with {} nodes", nodes.len());
    UrlHierarchy { nodes }
}

fn path_key<S: AsRef<str>>(segments: &[S]) -> String {
    if segments.is_empty() {
        return ROOT_PATH.to_string();
    }
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment.as_ref());
    }
    path
}

/// "Home" for the root, otherwise a readable form of the last segment:
/// `/blog/getting-started.html` becomes "Getting Started".
pub fn derive_title<S: AsRef<str>>(segments: &[S]) -> String {
    let Some(last) = segments.last() else {
        return "Home".to_string();
    };
    let raw = last.as_ref();
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let stem = match decoded.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic()) =>
        {
            stem
        }
        _ => &*decoded,
    };

    let words: Vec<String> = stem
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();

    if words.is_empty() {
        raw.to_string()
    } else {
        words.join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(urls: &[&str]) -> UrlHierarchy {
        build_hierarchy(urls)
    }

    #[test]
    fn test_paths_are_normalized() {
        let h = build(&[
            "https://example.com",
            "https://example.com/docs/",
            "https://example.com//docs//intro?x=1",
        ]);
        assert!(h.contains("/"));
        assert!(h.contains("/docs"));
        assert!(h.contains("/docs/intro"));
        assert_eq!(h.get("/docs/intro").unwrap().depth, 2);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let inputs = vec![
            HierarchyInput::new("https://example.com/a").with_title("First"),
            HierarchyInput::new("https://example.com/a/").with_title("Second"),
        ];
        let h = build_hierarchy(&inputs);
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("/a").unwrap().title, "First");
        assert_eq!(h.get("/a").unwrap().url, "https://example.com/a");
    }

    #[test]
    fn test_malformed_urls_are_dropped() {
        let h = build(&["not a url", "https://example.com/ok", "http://[::1"]);
        assert_eq!(h.len(), 1);
        assert!(h.contains("/ok"));
    }

    #[test]
    fn test_ancestor_and_root_fallback() {
        let h = build(&[
            "https://example.com/docs/guide/setup/linux",
            "https://example.com/docs",
            "https://example.com/",
            "https://example.com/blog/2024/post",
        ]);

        let linux = h.get("/docs/guide/setup/linux").unwrap();
        assert_eq!(linux.parent_path.as_deref(), Some("/docs"));
        assert_eq!(linux.link, ParentLink::Ancestor);

        let post = h.get("/blog/2024/post").unwrap();
        assert_eq!(post.parent_path.as_deref(), Some("/"));
        assert_eq!(post.link, ParentLink::RootFallback);

        assert_eq!(h.get("/docs").unwrap().link, ParentLink::Exact);
        assert_eq!(h.get("/").unwrap().link, ParentLink::TopLevel);
    }

    #[test]
    fn test_similar_prefix_is_not_an_ancestor() {
        let h = build(&["https://example.com/blog", "https://example.com/blogroll/x"]);
        let x = h.get("/blogroll/x").unwrap();
        assert_eq!(x.parent_path, None);
        assert_eq!(x.link, ParentLink::Orphan);
    }

    #[test]
    fn test_children_in_display_order() {
        let h = build(&[
            "https://example.com/",
            "https://example.com/b",
            "https://example.com/a",
            "https://example.com/c/deep",
        ]);
        assert_eq!(h.get("/").unwrap().children, vec!["/b", "/a", "/c/deep"]);
        assert_eq!(h.roots().count(), 1);
        assert_eq!(h.edges().len(), 3);
    }

    #[test]
    fn test_walk_depth_first() {
        let h = build(&[
            "https://example.com/",
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/a/x",
        ]);
        let walk: Vec<(&str, usize)> = h
            .walk_depth_first()
            .into_iter()
            .map(|(n, level)| (n.path.as_str(), level))
            .collect();
        assert_eq!(walk, vec![("/", 0), ("/a", 1), ("/a/x", 2), ("/b", 1)]);
    }

    #[test]
    fn test_truncated_cuts_links_to_dropped_parents() {
        let h = build(&[
            "https://example.com/a/x",
            "https://example.com/",
            "https://example.com/a",
        ]);
        assert_eq!(h.get("/a/x").unwrap().parent_path.as_deref(), Some("/a"));

        let t = h.truncated(2);
        assert_eq!(t.len(), 2);
        let x = t.get("/a/x").unwrap();
        assert_eq!(x.parent_path, None);
        assert_eq!(x.link, ParentLink::Orphan);
        assert!(t.get("/").unwrap().children.is_empty());
    }

    #[test]
    fn test_to_layout_nodes() {
        let h = build(&["https://example.com/", "https://example.com/a"]);
        let nodes = h.to_layout_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].id, "/a");
        assert_eq!(nodes[1].parent_id.as_deref(), Some("/"));
        assert_eq!(nodes[0].parent_id, None);
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title::<&str>(&[]), "Home");
        assert_eq!(derive_title(&["blog", "getting-started.html"]), "Getting Started");
        assert_eq!(derive_title(&["caf%C3%A9_menu"]), "Café Menu");
        assert_eq!(derive_title(&["release", "v1.2"]), "V1.2");
        assert_eq!(derive_title(&["---"]), "---");
    }
}
