use super::{LayoutAlgorithm, LayoutKind, LayoutNode, Position, Positions, ResolvedOptions};
use crate::error::LayoutError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

const MAX_SWEEPS: usize = 8;

/// Layered top-to-bottom drawing of the parent/child tree.
///
/// Phases:
///   1. DAG from `parent_id` links; roots hung under a synthetic root
///   2. Rank = longest-path distance from the synthetic root
///   3. Within-rank ordering: DFS preorder, then barycenter sweeps kept only
///      while they reduce crossings. Every node has one parent, so the
///      preorder of a tree is already crossing-free and the sweeps return
///      at once; they only do work on layers that arrive with crossings.
///   4. x: subtrees packed left to right along their contours, parents
///      centered over their children, one `node_width + spacing` minimum
///      gap per rank. Moving a parent moves its whole subtree.
pub struct TreeLayout;

impl LayoutAlgorithm for TreeLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Tree
    }

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError> {
        if nodes.is_empty() {
            return Ok(Positions::new());
        }

        let tree = LayeredTree::build(nodes)?;
        let (ranks, mut layers) = tree.layering();
        minimize_crossings(&mut layers, &tree.parent, &tree.children);
        let xs = assign_x(tree.root, &layers, &tree.children, options.column_step());

        let real = 0..nodes.len();
        let min_x = real.clone().map(|i| xs[i]).fold(f64::INFINITY, f64::min);
        let first_rank = real.clone().map(|i| ranks[i]).min().unwrap_or(0);

        Ok(real
            .map(|i| {
                let x = options.spacing + xs[i] - min_x;
                let y = options.spacing + (ranks[i] - first_rank) as f64 * options.row_step();
                (nodes[i].id.clone(), Position::new(x, y))
            })
            .collect())
    }
}

/// Parent/children arrays over node indices. Index `nodes.len()` is the
/// virtual root when one was needed.
struct LayeredTree {
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    root: usize,
}

impl LayeredTree {
    fn build(nodes: &[LayoutNode]) -> Result<Self, LayoutError> {
        let n = nodes.len();
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.as_str(), i))
            .collect();

        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(n, n);
        let handles: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
        let mut parent: Vec<Option<usize>> = vec![None; n];

        for (i, node) in nodes.iter().enumerate() {
            let resolved = node
                .parent_id
                .as_deref()
                .and_then(|id| index.get(id).copied())
                .filter(|&p| p != i);
            if let Some(p) = resolved {
                parent[i] = Some(p);
                graph.add_edge(handles[p], handles[i], ());
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| LayoutError::Cycle(nodes[graph[cycle.node_id()]].id.clone()))?;

        let roots: Vec<usize> = (0..n).filter(|&i| parent[i].is_none()).collect();
        let top_level: Vec<usize> = roots
            .iter()
            .copied()
            .filter(|&r| nodes[r].depth == 0)
            .collect();

        let root = if roots.len() == 1 {
            roots[0]
        } else if top_level.len() == 1 {
            let site_root = top_level[0];
            for &r in roots.iter().filter(|&&r| r != site_root) {
                parent[r] = Some(site_root);
            }
            site_root
        } else {
            let virtual_root = n;
            parent.push(None);
            for &r in &roots {
                parent[r] = Some(virtual_root);
            }
            virtual_root
        };

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); parent.len()];
        for (child, p) in parent.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(child);
            }
        }

        Ok(Self {
            parent,
            children,
            root,
        })
    }

    /// Ranks for every index, and the layers in DFS preorder.
    fn layering(&self) -> (Vec<usize>, Vec<Vec<usize>>) {
        let mut ranks = vec![0usize; self.parent.len()];
        let mut layers: Vec<Vec<usize>> = Vec::new();
        let mut stack = vec![self.root];

        while let Some(v) = stack.pop() {
            let rank = self.parent[v].map(|p| ranks[p] + 1).unwrap_or(0);
            ranks[v] = rank;
            if layers.len() <= rank {
                layers.resize_with(rank + 1, Vec::new);
            }
            layers[rank].push(v);
            stack.extend(self.children[v].iter().rev());
        }

        (ranks, layers)
    }
}

fn minimize_crossings(
    layers: &mut Vec<Vec<usize>>,
    parent: &[Option<usize>],
    children: &[Vec<usize>],
) {
    let mut best = layers.clone();
    let mut best_crossings = cross_count(layers, children);
    if best_crossings == 0 {
        return;
    }

    let mut order = vec![0usize; parent.len()];
    for sweep in 0..MAX_SWEEPS {
        if sweep % 2 == 0 {
            for r in 1..layers.len() {
                record_order(&layers[r - 1], &mut order);
                let (upper, lower) = layers.split_at_mut(r);
                let previous_rank = &upper[r - 1];
                sort_by_barycenter(&mut lower[0], |v, current| match parent[v] {
                    Some(p) if previous_rank.contains(&p) => order[p] as f64,
                    _ => current as f64,
                });
            }
        } else {
            for r in (0..layers.len().saturating_sub(1)).rev() {
                record_order(&layers[r + 1], &mut order);
                let order = &order;
                sort_by_barycenter(&mut layers[r], |v, current| {
                    if children[v].is_empty() {
                        current as f64
                    } else {
                        let sum: usize = children[v].iter().map(|&c| order[c]).sum();
                        sum as f64 / children[v].len() as f64
                    }
                });
            }
        }

        let crossings = cross_count(layers, children);
        if crossings < best_crossings {
            best = layers.clone();
            best_crossings = crossings;
            if crossings == 0 {
                break;
            }
        }
    }

    *layers = best;
}

fn record_order(layer: &[usize], order: &mut [usize]) {
    for (i, &v) in layer.iter().enumerate() {
        order[v] = i;
    }
}

fn sort_by_barycenter(layer: &mut [usize], barycenter: impl Fn(usize, usize) -> f64) {
    let mut keyed: Vec<(f64, usize)> = layer
        .iter()
        .enumerate()
        .map(|(current, &v)| (barycenter(v, current), v))
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (slot, (_, v)) in layer.iter_mut().zip(keyed) {
        *slot = v;
    }
}

fn cross_count(layers: &[Vec<usize>], children: &[Vec<usize>]) -> usize {
    layers
        .windows(2)
        .map(|pair| two_layer_cross_count(&pair[0], &pair[1], children))
        .sum()
}

/// Bilayer crossing count with an accumulator tree.
fn two_layer_cross_count(north: &[usize], south: &[usize], children: &[Vec<usize>]) -> usize {
    if south.is_empty() {
        return 0;
    }

    let south_pos: HashMap<usize, usize> = south.iter().enumerate().map(|(i, &v)| (v, i)).collect();

    let mut south_entries: Vec<usize> = Vec::new();
    for &v in north {
        let mut entries: Vec<usize> = children[v]
            .iter()
            .filter_map(|c| south_pos.get(c).copied())
            .collect();
        entries.sort_unstable();
        south_entries.extend(entries);
    }

    let mut first_index: usize = 1;
    while first_index < south.len() {
        first_index <<= 1;
    }
    let tree_size = 2 * first_index - 1;
    first_index -= 1;
    let mut tree = vec![0usize; tree_size];

    let mut crossings = 0;
    for pos in south_entries {
        let mut index = pos + first_index;
        tree[index] += 1;
        let mut weight_sum = 0;
        while index > 0 {
            if index % 2 == 1 {
                weight_sum += tree[index + 1];
            }
            index = (index - 1) >> 1;
            tree[index] += 1;
        }
        crossings += weight_sum;
    }

    crossings
}

/// x for every index. Siblings follow their order in `layers`.
fn assign_x(root: usize, layers: &[Vec<usize>], children: &[Vec<usize>], step: f64) -> Vec<f64> {
    let mut order = vec![0usize; children.len()];
    for layer in layers {
        record_order(layer, &mut order);
    }

    let mut offsets = vec![0.0; children.len()];
    place_subtree(root, children, &order, step, &mut offsets);

    // offsets are relative to the parent; resolve top-down
    let mut xs = vec![0.0; children.len()];
    for layer in layers {
        for &v in layer {
            for &c in &children[v] {
                xs[c] = xs[v] + offsets[c];
            }
        }
    }
    xs
}

/// Lays out the subtree under `v` relative to `v` and returns its contour:
/// the leftmost and rightmost x at each rank below and including `v`.
fn place_subtree(
    v: usize,
    children: &[Vec<usize>],
    order: &[usize],
    step: f64,
    offsets: &mut [f64],
) -> Vec<(f64, f64)> {
    let mut kids = children[v].clone();
    if kids.is_empty() {
        return vec![(0.0, 0.0)];
    }
    kids.sort_by_key(|&c| order[c]);

    let mut contour: Vec<(f64, f64)> = Vec::new();
    let mut placed: Vec<f64> = Vec::with_capacity(kids.len());
    for &c in &kids {
        let sub = place_subtree(c, children, order, step, offsets);
        let shift = contour
            .iter()
            .zip(&sub)
            .map(|(&(_, right), &(left, _))| right + step - left)
            .fold(0.0, f64::max);

        for (i, &(left, right)) in sub.iter().enumerate() {
            match contour.get_mut(i) {
                Some(level) => level.1 = right + shift,
                None => contour.push((left + shift, right + shift)),
            }
        }
        placed.push(shift);
    }

    let center = (placed[0] + placed[placed.len() - 1]) / 2.0;
    for (&c, x) in kids.iter().zip(&placed) {
        offsets[c] = x - center;
    }

    let mut own = Vec::with_capacity(contour.len() + 1);
    own.push((0.0, 0.0));
    own.extend(contour.into_iter().map(|(l, r)| (l - center, r - center)));
    own
}
