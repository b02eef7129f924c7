//! Solved decision tree structures
//!
//! A tree routes a vectorized input through split nodes (`condition · x >= 0`
//! goes to `greater`) until it reaches a leaf, whose linear map produces the
//! output vector directly.

use crate::errors::{Result, SynthError};
use crate::expression::round_to;
use serde::{Deserialize, Serialize};

/// A tree node (split or leaf)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Internal {
        /// Split coefficients over the input vector
        condition: Vec<f64>,
        greater: Box<Node>,
        less: Box<Node>,
    },
    Leaf {
        /// Output width x input width
        map: Vec<Vec<f64>>,
    },
}

/// Which child of a split an input is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    Greater,
    Less,
}

pub(crate) fn dot(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}

/// Decide the branch for a split sum. The sum is rounded first so that
/// floating point noise around an exact zero routes to `greater`.
pub fn route(condition: &[f64], input: &[f64], tolerance: f64) -> Branch {
    if round_to(dot(condition, input), tolerance) >= 0.0 {
        Branch::Greater
    } else {
        Branch::Less
    }
}

impl Node {
    pub fn leaf(map: Vec<Vec<f64>>) -> Self {
        Node::Leaf { map }
    }

    pub fn internal(condition: Vec<f64>, greater: Node, less: Node) -> Self {
        Node::Internal {
            condition,
            greater: Box::new(greater),
            less: Box::new(less),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Number of levels (a single leaf has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { greater, less, .. } => 1 + greater.depth().max(less.depth()),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Internal { greater, less, .. } => greater.leaf_count() + less.leaf_count(),
        }
    }

    /// Follow the splits for `input` and return the reached leaf map.
    pub fn find_leaf(&self, input: &[f64], tolerance: f64) -> &[Vec<f64>] {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { map } => return map,
                Node::Internal {
                    condition,
                    greater,
                    less,
                } => {
                    node = match route(condition, input, tolerance) {
                        Branch::Greater => &**greater,
                        Branch::Less => &**less,
                    };
                }
            }
        }
    }

    /// Evaluate the tree on a vectorized input.
    pub fn evaluate(&self, input: &[f64], tolerance: f64) -> Vec<f64> {
        self.find_leaf(input, tolerance)
            .iter()
            .map(|row| dot(row, input))
            .collect()
    }

    /// Replace every leaf with a split whose condition is all zeros (so every
    /// input routes to `greater`) and whose two children copy the leaf. The
    /// result computes the same function one level deeper.
    pub fn extend_trivially(&self, input_width: usize) -> Node {
        match self {
            Node::Leaf { map } => Node::internal(
                vec![0.0; input_width],
                Node::leaf(map.clone()),
                Node::leaf(map.clone()),
            ),
            Node::Internal {
                condition,
                greater,
                less,
            } => Node::internal(
                condition.clone(),
                greater.extend_trivially(input_width),
                less.extend_trivially(input_width),
            ),
        }
    }

    /// Check every condition and map against the expected widths.
    pub fn validate(&self, input_width: usize, output_width: usize) -> Result<()> {
        match self {
            Node::Leaf { map } => {
                if map.len() != output_width {
                    return Err(SynthError::ShapeMismatch(format!(
                        "leaf has {} output rows, expected {}",
                        map.len(),
                        output_width
                    )));
                }
                if let Some(row) = map.iter().find(|row| row.len() != input_width) {
                    return Err(SynthError::ShapeMismatch(format!(
                        "leaf row has {} columns, expected {}",
                        row.len(),
                        input_width
                    )));
                }
                Ok(())
            }
            Node::Internal {
                condition,
                greater,
                less,
            } => {
                if condition.len() != input_width {
                    return Err(SynthError::ShapeMismatch(format!(
                        "condition has {} columns, expected {}",
                        condition.len(),
                        input_width
                    )));
                }
                greater.validate(input_width, output_width)?;
                less.validate(input_width, output_width)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-14;

    fn step_tree() -> Node {
        Node::internal(
            vec![0.15, -0.05],
            Node::leaf(vec![vec![0.0, 1.0]]),
            Node::leaf(vec![vec![0.0, -1.0]]),
        )
    }

    #[test]
    fn test_routing() {
        let tree = step_tree();
        assert_eq!(tree.evaluate(&[1.0, 1.0], TOL), vec![1.0]);
        assert_eq!(tree.evaluate(&[-1.0, 1.0], TOL), vec![-1.0]);
    }

    #[test]
    fn test_noise_around_zero_routes_greater() {
        // 0.15 * (1/3) - 0.05 is a tiny negative number in floating point
        let x = 2.0 / 3.0 * 2.0 - 1.0;
        assert_eq!(route(&[0.15, -0.05], &[x, 1.0], TOL), Branch::Greater);
    }

    #[test]
    fn test_depth_and_leaves() {
        let tree = step_tree();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.leaf_count(), 2);
        assert!(!tree.is_leaf());
    }

    #[test]
    fn test_extend_trivially_preserves_function() {
        let tree = step_tree();
        let deeper = tree.extend_trivially(2);
        assert_eq!(deeper.depth(), 3);
        assert_eq!(deeper.leaf_count(), 4);
        for x in [-1.0, -0.3, 0.2, 1.0] {
            let input = [x, 1.0];
            assert_eq!(tree.evaluate(&input, TOL), deeper.evaluate(&input, TOL));
        }
    }

    #[test]
    fn test_validate_widths() {
        let tree = step_tree();
        assert!(tree.validate(2, 1).is_ok());
        assert!(tree.validate(3, 1).is_err());
        assert!(tree.validate(2, 2).is_err());
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&Node::leaf(vec![vec![1.0]])).unwrap();
        assert_eq!(json, r#"{"kind":"leaf","map":[[1.0]]}"#);
        let back: Node = serde_json::from_str(&json).unwrap();
        assert!(back.is_leaf());
    }
}
