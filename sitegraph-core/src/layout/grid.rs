use super::{LayoutAlgorithm, LayoutKind, LayoutNode, Position, Positions, ResolvedOptions};
use crate::error::LayoutError;

/// Row-major grid in input order. Depends on nothing but the node count,
/// which is why it doubles as the fallback for every other layout.
pub struct GridLayout;

impl LayoutAlgorithm for GridLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Grid
    }

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError> {
        Ok(place(nodes, options))
    }
}

pub(crate) fn columns_for(options: &ResolvedOptions) -> usize {
    ((options.width / options.column_step()).floor() as usize).max(1)
}

pub(crate) fn place(nodes: &[LayoutNode], options: &ResolvedOptions) -> Positions {
    let columns = columns_for(options);
    let margin = options.spacing;

    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let row = index / columns;
            let col = index % columns;
            let position = Position::new(
                margin + col as f64 * options.column_step(),
                margin + row as f64 * options.row_step(),
            );
            (node.id.clone(), position)
        })
        .collect()
}
