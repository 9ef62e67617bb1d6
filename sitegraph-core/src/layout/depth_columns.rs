use super::{
    LayoutAlgorithm, LayoutKind, LayoutNode, Position, Positions, ResolvedOptions, depth_groups,
};
use crate::error::LayoutError;

/// One column per depth, left to right; rows sorted by URL within a column.
pub struct DepthColumnsLayout;

impl LayoutAlgorithm for DepthColumnsLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::DepthColumns
    }

    fn compute(
        &self,
        nodes: &[LayoutNode],
        options: &ResolvedOptions,
    ) -> Result<Positions, LayoutError> {
        let margin = options.spacing;
        let mut positions = Positions::new();

        for (depth, column) in depth_groups(nodes) {
            let x = margin + depth as f64 * options.column_step();
            for (row, node) in column.into_iter().enumerate() {
                let y = margin + row as f64 * options.row_step();
                positions.insert(node.id.clone(), Position::new(x, y));
            }
        }

        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_by_depth_rows_by_url() {
        let nodes = vec![
            LayoutNode::new("root", "https://example.com/", 0),
            LayoutNode::new("zeta", "https://example.com/zeta", 1),
            LayoutNode::new("alpha", "https://example.com/alpha", 1),
            LayoutNode::new("deep", "https://example.com/alpha/deep", 2),
        ];
        let options = ResolvedOptions::defaults_for(LayoutKind::DepthColumns);
        let positions = DepthColumnsLayout.compute(&nodes, &options).unwrap();

        assert_eq!(positions["root"], Position::new(100.0, 100.0));
        assert_eq!(positions["alpha"], Position::new(488.0, 100.0));
        assert_eq!(positions["zeta"], Position::new(488.0, 400.0));
        assert_eq!(positions["deep"], Position::new(876.0, 100.0));
    }

    #[test]
    fn test_same_url_tie_broken_by_id() {
        let nodes = vec![
            LayoutNode::new("b", "https://example.com/x", 1),
            LayoutNode::new("a", "https://example.com/x", 1),
        ];
        let options = ResolvedOptions::defaults_for(LayoutKind::DepthColumns);
        let positions = DepthColumnsLayout.compute(&nodes, &options).unwrap();
        assert!(positions["a"].y < positions["b"].y);
    }
}
