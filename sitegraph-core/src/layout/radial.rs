use super::{
    LayoutAlgorithm, LayoutKind, LayoutNode, Position, Positions, ResolvedOptions, depth_groups,
};
use crate::error::LayoutError;
use std::f64::consts::{FRAC_PI_2, TAU};

/// Concentric rings by depth around the viewport center.
///
/// Ring `d` sits at radius `d * ring_step`, pushed outward when its nodes
/// would not fit around the circumference or when it would crowd the ring
/// inside it. Nodes on a ring are spread evenly starting at 12 o'clock.
pub struct RadialLayout;

impl LayoutAlgorithm for RadialLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Radial
    }

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError> {
        let center_x = options.width / 2.0;
        let center_y = options.height / 2.0;
        let ring_step = options.node_width.max(options.node_height) + options.spacing;

        let to_top_left = |cx: f64, cy: f64| {
            Position::new(
                cx - options.node_width / 2.0,
                cy - options.node_height / 2.0,
            )
        };

        let mut positions = Positions::new();
        let mut previous_radius: Option<f64> = None;

        for (depth, ring) in depth_groups(nodes) {
            if depth == 0 && ring.len() == 1 {
                positions.insert(ring[0].id.clone(), to_top_left(center_x, center_y));
                previous_radius = Some(0.0);
                continue;
            }

            let count = ring.len() as f64;
            let fit_radius = count * options.column_step() / TAU;
            let nominal = if depth == 0 {
                // Several top-level pages (multi-domain input) share an inner ring.
                ring_step / 2.0
            } else {
                depth as f64 * ring_step
            };
            let mut radius = nominal.max(fit_radius);
            if let Some(previous) = previous_radius {
                radius = radius.max(previous + ring_step);
            }
            previous_radius = Some(radius);

            for (index, node) in ring.into_iter().enumerate() {
                let angle = -FRAC_PI_2 + index as f64 * TAU / count;
                let position = to_top_left(
                    center_x + radius * angle.cos(),
                    center_y + radius * angle.sin(),
                );
                positions.insert(node.id.clone(), position);
            }
        }

        Ok(positions)
    }
}
