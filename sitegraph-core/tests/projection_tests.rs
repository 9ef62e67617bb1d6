// Tests for projecting hierarchies into node/edge records

use sitegraph_core::graph::build_site_graph;
use sitegraph_core::hierarchy::{UrlHierarchyNode, build_hierarchy};
use sitegraph_core::layout::{LayoutKind, LayoutOptions, Positions, compute_layout};
use sitegraph_core::projection::{PathIds, project};
use std::collections::{HashMap, HashSet};

fn six_hundred_urls() -> Vec<String> {
    let mut urls = vec!["https://example.com/".to_string()];
    for section in 0..20 {
        urls.push(format!("https://example.com/s{}", section));
    }
    let mut page = 0;
    while urls.len() < 600 {
        urls.push(format!("https://example.com/s{}/p{}", page % 20, page));
        page += 1;
    }
    urls
}

#[test]
fn test_oversized_input_is_truncated_deterministically() {
    let urls = six_hundred_urls();
    let hierarchy = build_hierarchy(&urls);
    assert_eq!(hierarchy.len(), 600);

    let layout = compute_layout(
        LayoutKind::Grid,
        &hierarchy.to_layout_nodes(),
        &LayoutOptions::default(),
    )
    .unwrap();
    let projection = project(&hierarchy, &layout, &PathIds, 500);

    assert_eq!(projection.node_count(), 500);
    let expected: Vec<&str> = hierarchy.iter().take(500).map(|n| n.path.as_str()).collect();
    let actual: Vec<&str> = projection.nodes.iter().map(|n| n.path.as_str()).collect();
    assert_eq!(actual, expected);

    let ids: HashSet<&str> = projection.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &projection.edges {
        assert!(ids.contains(edge.source.as_str()));
        assert!(ids.contains(edge.target.as_str()));
    }

    let again = project(&hierarchy, &layout, &PathIds, 500);
    assert_eq!(again, projection);
}

#[test]
fn test_dropped_parent_leaves_no_dangling_reference() {
    // children listed before their section page
    let mut urls = vec!["https://example.com/".to_string()];
    for i in 0..5 {
        urls.push(format!("https://example.com/late/{}", i));
    }
    urls.push("https://example.com/late".to_string());

    let hierarchy = build_hierarchy(&urls);
    let projection = project(&hierarchy, &Positions::new(), &PathIds, 6);

    assert_eq!(projection.node_count(), 6);
    assert!(projection.get("/late").is_none());
    for node in &projection.nodes {
        if let Some(parent) = &node.parent_id {
            assert!(projection.get(parent).is_some());
        }
    }
    assert!(projection.edges.iter().all(|e| e.source != "/late"));
}

#[test]
fn test_edges_follow_hierarchy_links() {
    let urls = [
        "https://example.com/",
        "https://example.com/a",
        "https://example.com/a/b",
        "https://example.com/c/d",
    ];
    let graph = build_site_graph(
        &urls,
        LayoutKind::Tree,
        &LayoutOptions::default(),
        &PathIds,
        500,
    )
    .unwrap();

    let pairs: Vec<(&str, &str)> = graph
        .projection
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str()))
        .collect();
    assert_eq!(pairs, vec![("/", "/a"), ("/a", "/a/b"), ("/", "/c/d")]);
}

#[test]
fn test_map_resolver_uses_urls() {
    let urls = ["https://example.com/", "https://example.com/a"];
    let ids: HashMap<String, String> = urls
        .iter()
        .enumerate()
        .map(|(i, u)| (u.to_string(), format!("node-{}", i)))
        .collect();

    let graph = build_site_graph(&urls, LayoutKind::Grid, &LayoutOptions::default(), &ids, 500)
        .unwrap();
    let a = graph.projection.get("node-1").unwrap();
    assert_eq!(a.parent_id.as_deref(), Some("node-0"));
    assert_eq!(a.position, graph.positions["/a"]);
}

#[test]
fn test_closure_resolver() {
    let h = build_hierarchy(&["https://example.com/", "https://example.com/x"]);
    let resolver = |node: &UrlHierarchyNode| Some(format!("id:{}", node.path));
    let projection = project(&h, &Positions::new(), &resolver, 10);
    assert_eq!(projection.nodes[1].id, "id:/x");
    assert_eq!(projection.nodes[1].parent_id.as_deref(), Some("id:/"));
}
