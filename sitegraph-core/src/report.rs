// Text and JSON renderings of sitemap entries and page hierarchies

use crate::hierarchy::{ParentLink, UrlHierarchy, UrlHierarchyNode};
use crate::layout::LayoutKind;
use crate::projection::Projection;
use serde::{Deserialize, Serialize};
use sitegraph_scanner::SitemapEntry;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const HEAVY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCounts {
    pub top_level: usize,
    pub exact: usize,
    pub ancestor: usize,
    pub root_fallback: usize,
    pub orphan: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchySummary {
    pub source: String,
    pub total_entries: usize,
    pub total_nodes: usize,
    pub root_count: usize,
    pub max_depth: usize,
    pub domains: Vec<String>,
    pub links: LinkCounts,
}

impl HierarchySummary {
    /// `total_entries` is the raw entry count before dedup and URL parsing.
    pub fn new(source: &str, total_entries: usize, hierarchy: &UrlHierarchy) -> Self {
        let mut links = LinkCounts::default();
        let mut domains: Vec<String> = Vec::new();
        let mut max_depth = 0;

        for node in hierarchy.iter() {
            match node.link {
                ParentLink::TopLevel => links.top_level += 1,
                ParentLink::Exact => links.exact += 1,
                ParentLink::Ancestor => links.ancestor += 1,
                ParentLink::RootFallback => links.root_fallback += 1,
                ParentLink::Orphan => links.orphan += 1,
            }
            if !domains.contains(&node.domain) {
                domains.push(node.domain.clone());
            }
            max_depth = max_depth.max(node.depth);
        }

        Self {
            source: source.to_string(),
            total_entries,
            total_nodes: hierarchy.len(),
            root_count: hierarchy.roots().count(),
            max_depth,
            domains,
            links,
        }
    }
}

/// ASCII tree of the hierarchy, one root per top-level branch.
pub fn render_tree(hierarchy: &UrlHierarchy) -> String {
    if hierarchy.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut out = String::new();
    for root in hierarchy.roots() {
        out.push_str(&format!("{}  {}\n", root.path, root.title));
        render_children(hierarchy, root, "", &mut out);
    }
    out
}

fn render_children(
    hierarchy: &UrlHierarchy,
    node: &UrlHierarchyNode,
    prefix: &str,
    out: &mut String,
) {
    let children: Vec<&UrlHierarchyNode> = node
        .children
        .iter()
        .filter_map(|path| hierarchy.get(path))
        .collect();

    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };
        out.push_str(&format!(
            "{}{}{}  {}\n",
            prefix,
            connector,
            display_segment(node, child),
            child.title
        ));

        let next_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
        render_children(hierarchy, child, &next_prefix, out);
    }
}

/// Path of `child` relative to `parent`; the full path when the link was a
/// fallback that skipped segments.
fn display_segment(parent: &UrlHierarchyNode, child: &UrlHierarchyNode) -> String {
    match child.path.strip_prefix(parent.path.trim_end_matches('/')) {
        Some(rest) if child.link == ParentLink::Exact => rest.trim_start_matches('/').to_string(),
        _ => child.path.clone(),
    }
}

pub fn generate_text_report(summary: &HierarchySummary, hierarchy: &UrlHierarchy) -> String {
    let mut report = String::new();

    report.push_str(HEAVY_RULE);
    report.push_str("                           SITEGRAPH HIERARCHY\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');

    report.push_str(&format!("Source:       {}\n", summary.source));
    report.push_str(&format!("Entries:      {}\n", summary.total_entries));
    report.push_str(&format!("Pages:        {}\n", summary.total_nodes));
    report.push_str(&format!("Roots:        {}\n", summary.root_count));
    report.push_str(&format!("Max depth:    {}\n", summary.max_depth));
    report.push_str(&format!("Domains:      {}\n", format_domains(&summary.domains)));
    report.push('\n');

    let links = &summary.links;
    if links.ancestor + links.root_fallback + links.orphan > 0 {
        report.push_str("Parent links:\n");
        report.push_str(&format!("  exact          {}\n", links.exact));
        report.push_str(&format!("  ancestor       {}\n", links.ancestor));
        report.push_str(&format!("  root fallback  {}\n", links.root_fallback));
        report.push_str(&format!("  orphan         {}\n", links.orphan));
        report.push('\n');
    }

    report.push_str(HEAVY_RULE);
    report.push_str("TREE\n");
    report.push_str(HEAVY_RULE);
    report.push('\n');
    report.push_str(&render_tree(hierarchy));

    report
}

pub fn generate_json_report(
    summary: &HierarchySummary,
    hierarchy: &UrlHierarchy,
    projection: Option<&Projection>,
) -> Result<String, serde_json::Error> {
    let nodes: Vec<&UrlHierarchyNode> = hierarchy.iter().collect();
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": summary,
            "hierarchy": nodes,
            "graph": projection,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// JSON report carrying one graph per layout, in the order given.
pub fn generate_layouts_json_report(
    summary: &HierarchySummary,
    hierarchy: &UrlHierarchy,
    graphs: &[(LayoutKind, &Projection)],
) -> Result<String, serde_json::Error> {
    let nodes: Vec<&UrlHierarchyNode> = hierarchy.iter().collect();
    let graphs: Vec<serde_json::Value> = graphs
        .iter()
        .map(|(kind, projection)| {
            serde_json::json!({
                "layout": kind,
                "nodes": projection.nodes,
                "edges": projection.edges,
            })
        })
        .collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "sitegraph",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "summary": summary,
            "hierarchy": nodes,
            "graphs": graphs,
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// One line per entry (text) or the entry list (JSON).
pub fn format_entries(
    entries: &[SitemapEntry],
    format: ReportFormat,
) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(entries),
        ReportFormat::Text => {
            let mut out = String::new();
            for entry in entries {
                out.push_str(&entry.url);
                if let Some(modified) = entry.last_modified {
                    out.push_str(&format!("  {}", modified.format("%Y-%m-%d")));
                }
                if let Some(priority) = entry.priority {
                    out.push_str(&format!("  {:.1}", priority));
                }
                out.push('\n');
            }
            Ok(out)
        }
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn format_domains(domains: &[String]) -> String {
    match domains {
        [] => "none".to_string(),
        [only] => only.clone(),
        many => format!("{} domains", many.len()),
    }
}
