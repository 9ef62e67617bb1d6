use super::{LayoutAlgorithm, LayoutKind, LayoutNode, Position, Positions, ResolvedOptions};
use crate::error::LayoutError;
use std::collections::HashMap;
use std::f64::consts::TAU;

/// Pull toward the viewport center, as a fraction of the offset per step.
/// Keeps disconnected components from drifting apart.
const GRAVITY: f64 = 0.02;
const MIN_DISTANCE: f64 = 0.01;

/// Fruchterman–Reingold simulation over the parent/child edges.
///
/// Nodes start on a spiral (`index / total` of a turn, radius growing with
/// depth) with seeded jitter, then relax under node-node repulsion `k²/d`
/// and edge attraction `d²/k` while the temperature cools linearly to zero.
/// The same seed always produces the same positions.
pub struct ForceLayout;

impl LayoutAlgorithm for ForceLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Force
    }

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError> {
        if nodes.is_empty() {
            return Ok(Positions::new());
        }

        let mut centers = seed_positions(nodes, options);
        let edges = edge_indices(nodes);
        simulate(&mut centers, &edges, options);

        // Shift so the top-left-most box sits at the margin.
        let min_x = centers.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
        let min_y = centers.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
        let shift_x = options.spacing - (min_x - options.node_width / 2.0);
        let shift_y = options.spacing - (min_y - options.node_height / 2.0);

        Ok(nodes
            .iter()
            .zip(centers)
            .map(|(node, c)| {
                let top_left = Position::new(
                    c.x - options.node_width / 2.0 + shift_x,
                    c.y - options.node_height / 2.0 + shift_y,
                );
                (node.id.clone(), top_left)
            })
            .collect())
    }
}

fn seed_positions(nodes: &[LayoutNode], options: &ResolvedOptions) -> Vec<Position> {
    let mut rng = XorShift64Star::new(options.seed);
    let total = nodes.len() as f64;
    let step = options.column_step();
    let jitter = options.spacing / 2.0;
    let (cx, cy) = (options.width / 2.0, options.height / 2.0);

    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let fraction = index as f64 / total;
            let angle = fraction * TAU;
            let radius = (node.depth as f64 + fraction) * step;
            Position::new(
                cx + radius * angle.cos() + rng.next_f64_signed() * jitter,
                cy + radius * angle.sin() + rng.next_f64_signed() * jitter,
            )
        })
        .collect()
}

/// (parent index, child index) for every resolvable parent link.
fn edge_indices(nodes: &[LayoutNode]) -> Vec<(usize, usize)> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    nodes
        .iter()
        .enumerate()
        .filter_map(|(child, node)| {
            let parent = *index.get(node.parent_id.as_deref()?)?;
            (parent != child).then_some((parent, child))
        })
        .collect()
}

fn simulate(centers: &mut [Position], edges: &[(usize, usize)], options: &ResolvedOptions) {
    let n = centers.len();
    if n < 2 || options.iterations == 0 {
        return;
    }

    let k = options.column_step();
    let k_squared = k * k;
    let initial_temperature = options.width.max(options.height) / 10.0;
    let (cx, cy) = (options.width / 2.0, options.height / 2.0);
    let mut displacement = vec![Position::ORIGIN; n];

    for iteration in 0..options.iterations {
        displacement.fill(Position::ORIGIN);

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy, distance) = separation(centers, i, j);
                let force = k_squared / distance;
                let (fx, fy) = (dx / distance * force, dy / distance * force);
                displacement[i].x += fx;
                displacement[i].y += fy;
                displacement[j].x -= fx;
                displacement[j].y -= fy;
            }
        }

        for &(parent, child) in edges {
            let (dx, dy, distance) = separation(centers, child, parent);
            let force = distance * distance / k;
            let (fx, fy) = (dx / distance * force, dy / distance * force);
            displacement[child].x -= fx;
            displacement[child].y -= fy;
            displacement[parent].x += fx;
            displacement[parent].y += fy;
        }

        let temperature =
            initial_temperature * (1.0 - iteration as f64 / options.iterations as f64);

        for (center, disp) in centers.iter_mut().zip(displacement.iter()) {
            let gx = disp.x - (center.x - cx) * GRAVITY;
            let gy = disp.y - (center.y - cy) * GRAVITY;
            let length = (gx * gx + gy * gy).sqrt().max(MIN_DISTANCE);
            let capped = length.min(temperature);
            center.x += gx / length * capped;
            center.y += gy / length * capped;
        }
    }
}

/// Vector from `b` to `a` and its length. Coincident nodes are split along
/// a direction derived from their indices so the result stays deterministic.
fn separation(centers: &[Position], a: usize, b: usize) -> (f64, f64, f64) {
    let mut dx = centers[a].x - centers[b].x;
    let mut dy = centers[a].y - centers[b].y;
    let mut distance = (dx * dx + dy * dy).sqrt();
    if distance < MIN_DISTANCE {
        let angle = (a * 31 + b * 17) as f64;
        dx = angle.cos() * MIN_DISTANCE;
        dy = angle.sin() * MIN_DISTANCE;
        distance = MIN_DISTANCE;
    }
    (dx, dy, distance)
}

#[derive(Debug, Clone)]
struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Uniform in [-1, 1).
    fn next_f64_signed(&mut self) -> f64 {
        let u = self.next_u64() >> 11;
        let v = (u as f64) / ((1u64 << 53) as f64);
        (v * 2.0) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> Vec<LayoutNode> {
        vec![
            LayoutNode::new("/", "https://example.com/", 0),
            LayoutNode::new("/a", "https://example.com/a", 1).with_parent("/"),
            LayoutNode::new("/b", "https://example.com/b", 1).with_parent("/"),
            LayoutNode::new("/a/x", "https://example.com/a/x", 2).with_parent("/a"),
            LayoutNode::new("/a/y", "https://example.com/a/y", 2).with_parent("/a"),
        ]
    }

    fn distance(p: &Position, q: &Position) -> f64 {
        ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt()
    }

    #[test]
    fn test_same_seed_same_positions() {
        let options = ResolvedOptions::defaults_for(LayoutKind::Force);
        let first = ForceLayout.compute(&small_tree(), &options).unwrap();
        let second = ForceLayout.compute(&small_tree(), &options).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seed_changes_positions() {
        let mut options = ResolvedOptions::defaults_for(LayoutKind::Force);
        let first = ForceLayout.compute(&small_tree(), &options).unwrap();
        options.seed = 7;
        let second = ForceLayout.compute(&small_tree(), &options).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_relaxation_separates_nodes() {
        let options = ResolvedOptions::defaults_for(LayoutKind::Force);
        let positions = ForceLayout.compute(&small_tree(), &options).unwrap();

        let all: Vec<&Position> = positions.values().collect();
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert!(distance(all[i], all[j]) > 1.0);
            }
        }
    }

    #[test]
    fn test_result_starts_at_margin() {
        let options = ResolvedOptions::defaults_for(LayoutKind::Force);
        let positions = ForceLayout.compute(&small_tree(), &options).unwrap();
        let min_x = positions.values().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = positions.values().map(|p| p.y).fold(f64::INFINITY, f64::min);
        assert!((min_x - options.spacing).abs() < 1e-6);
        assert!((min_y - options.spacing).abs() < 1e-6);
    }

    #[test]
    fn test_single_node_and_zero_iterations() {
        let mut options = ResolvedOptions::defaults_for(LayoutKind::Force);
        let one = vec![LayoutNode::new("only", "https://example.com/", 0)];
        let positions = ForceLayout.compute(&one, &options).unwrap();
        assert!((positions["only"].x - options.spacing).abs() < 1e-9);
        assert!((positions["only"].y - options.spacing).abs() < 1e-9);

        options.iterations = 0;
        let seeded = ForceLayout.compute(&small_tree(), &options).unwrap();
        assert_eq!(seeded.len(), 5);
        assert!(seeded.values().all(|p| p.is_finite()));
    }

    #[test]
    fn test_unknown_parent_is_ignored() {
        let nodes = vec![
            LayoutNode::new("a", "https://example.com/a", 1).with_parent("missing"),
            LayoutNode::new("b", "https://example.com/b", 1).with_parent("b"),
        ];
        assert!(edge_indices(&nodes).is_empty());
    }
}
