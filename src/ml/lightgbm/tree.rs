//! A single decision tree in LightGBM's array layout
//!
//! Internal nodes are indexed `0..num_leaves - 1`. A child reference `c >= 0` is an
//! internal node; `c < 0` is leaf `!c`.

use ndarray::ArrayView1;

use crate::ml::ModelError;

const CATEGORICAL_MASK: u8 = 1;
const DEFAULT_LEFT_MASK: u8 = 2;
const ZERO_THRESHOLD: f64 = 1e-35;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

impl MissingType {
    fn of(decision_type: u8) -> Self {
        match (decision_type >> 2) & 3 {
            1 => Self::Zero,
            2 => Self::NaN,
            _ => Self::None,
        }
    }
}

fn is_zero(v: f64) -> bool {
    (-ZERO_THRESHOLD..=ZERO_THRESHOLD).contains(&v)
}

fn in_bitset(bits: &[u32], pos: usize) -> bool {
    let word = pos / 32;
    word < bits.len() && (bits[word] >> (pos % 32)) & 1 == 1
}

/// Where a child reference points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Internal(usize),
    Leaf(usize),
}

impl Node {
    fn from_child(child: i32) -> Self {
        if child >= 0 {
            Node::Internal(child as usize)
        } else {
            Node::Leaf(!child as usize)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub num_leaves: usize,
    pub split_feature: Vec<usize>,
    pub split_gain: Vec<f64>,
    pub threshold: Vec<f64>,
    pub decision_type: Vec<u8>,
    pub left_child: Vec<i32>,
    pub right_child: Vec<i32>,
    /// Already multiplied by the tree's shrinkage
    pub leaf_value: Vec<f64>,
    pub leaf_count: Vec<f64>,
    pub internal_count: Vec<f64>,
    pub cat_boundaries: Vec<usize>,
    pub cat_threshold: Vec<u32>,
}

impl Tree {
    pub fn num_internal(&self) -> usize {
        self.num_leaves.saturating_sub(1)
    }

    /// Check array lengths and child references
    pub fn validate(&self, index: usize) -> Result<(), ModelError> {
        let err = |msg: String| Err(ModelError::Parse(format!("Tree={}: {}", index, msg)));

        if self.num_leaves == 0 {
            return err("num_leaves must be positive".to_string());
        }
        if self.leaf_value.len() != self.num_leaves {
            return err(format!(
                "leaf_value has {} entries for {} leaves",
                self.leaf_value.len(),
                self.num_leaves
            ));
        }

        let n = self.num_internal();
        let arrays = [
            ("split_feature", self.split_feature.len()),
            ("threshold", self.threshold.len()),
            ("decision_type", self.decision_type.len()),
            ("left_child", self.left_child.len()),
            ("right_child", self.right_child.len()),
        ];
        for (name, len) in arrays {
            if len != n {
                return err(format!("{} has {} entries for {} internal nodes", name, len, n));
            }
        }

        for &child in self.left_child.iter().chain(self.right_child.iter()) {
            let in_range = match Node::from_child(child) {
                Node::Internal(i) => i < n,
                Node::Leaf(i) => i < self.num_leaves,
            };
            if !in_range {
                return err(format!("child reference {} out of range", child));
            }
        }

        if let Err(msg) = self.check_structure() {
            return err(msg);
        }

        for node in 0..n {
            if self.is_categorical(node) {
                let cat_idx = self.threshold[node] as usize;
                if cat_idx + 1 >= self.cat_boundaries.len()
                    || self.cat_boundaries[cat_idx + 1] > self.cat_threshold.len()
                {
                    return err(format!("categorical split {} has no bitset", node));
                }
            }
        }

        Ok(())
    }

    /// Every node is reached from the root exactly once
    fn check_structure(&self) -> Result<(), String> {
        let n = self.num_internal();
        if n == 0 {
            return Ok(());
        }

        let mut seen_internal = vec![false; n];
        let mut seen_leaf = vec![false; self.num_leaves];
        let mut stack = vec![Node::Internal(0)];

        while let Some(node) = stack.pop() {
            let seen = match node {
                Node::Internal(i) => &mut seen_internal[i],
                Node::Leaf(i) => &mut seen_leaf[i],
            };
            if *seen {
                return Err(format!("{:?} is reachable more than once", node));
            }
            *seen = true;

            if let Node::Internal(i) = node {
                let (left, right) = self.children(i);
                stack.push(left);
                stack.push(right);
            }
        }

        if let Some(i) = seen_internal.iter().position(|v| !v) {
            return Err(format!("internal node {} is unreachable", i));
        }
        if let Some(i) = seen_leaf.iter().position(|v| !v) {
            return Err(format!("leaf {} is unreachable", i));
        }
        Ok(())
    }

    /// Node counts are present for every node (required for TreeSHAP cover)
    pub fn has_counts(&self) -> bool {
        self.leaf_count.len() == self.num_leaves && self.internal_count.len() == self.num_internal()
    }

    fn is_categorical(&self, node: usize) -> bool {
        self.decision_type[node] & CATEGORICAL_MASK != 0
    }

    fn numerical_goes_left(&self, node: usize, mut fval: f64) -> bool {
        let decision = self.decision_type[node];
        let missing = MissingType::of(decision);

        if fval.is_nan() && missing != MissingType::NaN {
            fval = 0.0;
        }
        if (missing == MissingType::Zero && is_zero(fval))
            || (missing == MissingType::NaN && fval.is_nan())
        {
            return decision & DEFAULT_LEFT_MASK != 0;
        }
        fval <= self.threshold[node]
    }

    fn categorical_goes_left(&self, node: usize, fval: f64) -> bool {
        let category = if fval.is_nan() {
            if MissingType::of(self.decision_type[node]) == MissingType::NaN {
                return false;
            }
            0
        } else if fval < 0.0 {
            return false;
        } else {
            fval as usize
        };

        let cat_idx = self.threshold[node] as usize;
        let start = self.cat_boundaries[cat_idx];
        let end = self.cat_boundaries[cat_idx + 1];
        in_bitset(&self.cat_threshold[start..end], category)
    }

    /// Child of internal `node` taken for feature value `fval`
    pub fn next(&self, node: usize, fval: f64) -> Node {
        let left = if self.is_categorical(node) {
            self.categorical_goes_left(node, fval)
        } else {
            self.numerical_goes_left(node, fval)
        };
        Node::from_child(if left { self.left_child[node] } else { self.right_child[node] })
    }

    pub fn children(&self, node: usize) -> (Node, Node) {
        (
            Node::from_child(self.left_child[node]),
            Node::from_child(self.right_child[node]),
        )
    }

    pub fn feature_at(&self, node: usize) -> usize {
        self.split_feature[node]
    }

    /// Training-sample count reaching `node`
    pub fn cover(&self, node: Node) -> f64 {
        match node {
            Node::Internal(i) => self.internal_count[i],
            Node::Leaf(i) => self.leaf_count[i],
        }
    }

    pub fn leaf(&self, row: ArrayView1<'_, f64>) -> usize {
        if self.num_leaves == 1 {
            return 0;
        }
        let mut node = 0;
        loop {
            match self.next(node, row[self.split_feature[node]]) {
                Node::Internal(i) => node = i,
                Node::Leaf(i) => return i,
            }
        }
    }

    pub fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.leaf_value[self.leaf(row)]
    }

    /// Count-weighted mean leaf value: the tree's output over the training data
    pub fn expected_value(&self) -> f64 {
        let total: f64 = self.leaf_count.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        self.leaf_value
            .iter()
            .zip(self.leaf_count.iter())
            .map(|(v, c)| v * c)
            .sum::<f64>()
            / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(decision_type: u8, threshold: f64) -> Tree {
        Tree {
            num_leaves: 2,
            split_feature: vec![0],
            split_gain: vec![1.0],
            threshold: vec![threshold],
            decision_type: vec![decision_type],
            left_child: vec![-1],
            right_child: vec![-2],
            leaf_value: vec![-1.0, 1.0],
            leaf_count: vec![50.0, 50.0],
            internal_count: vec![100.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_numerical_split() {
        let tree = stump(2, 0.5);
        assert_eq!(tree.predict(array![0.5].view()), -1.0);
        assert_eq!(tree.predict(array![0.51].view()), 1.0);
    }

    #[test]
    fn test_zero_missing_uses_default_direction() {
        // missing type Zero, default left
        let tree = stump(4 | 2, -1.0);
        assert_eq!(tree.predict(array![0.0].view()), -1.0);
        assert_eq!(tree.predict(array![f64::NAN].view()), -1.0);
        assert_eq!(tree.predict(array![-2.0].view()), -1.0);
        assert_eq!(tree.predict(array![3.0].view()), 1.0);

        // missing type None: zero is an ordinary value
        let plain = stump(2, -1.0);
        assert_eq!(plain.predict(array![0.0].view()), 1.0);
    }

    #[test]
    fn test_nan_missing_default_right() {
        let tree = stump(8, 10.0);
        assert_eq!(tree.predict(array![f64::NAN].view()), 1.0);
        assert_eq!(tree.predict(array![0.0].view()), -1.0);
    }

    #[test]
    fn test_categorical_bitset() {
        let mut tree = stump(1, 0.0);
        tree.cat_boundaries = vec![0, 1];
        // categories 1 and 3
        tree.cat_threshold = vec![0b1010];
        tree.validate(0).unwrap();

        assert_eq!(tree.predict(array![1.0].view()), -1.0);
        assert_eq!(tree.predict(array![3.0].view()), -1.0);
        assert_eq!(tree.predict(array![2.0].view()), 1.0);
        assert_eq!(tree.predict(array![-1.0].view()), 1.0);
        assert_eq!(tree.predict(array![40.0].view()), 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_children() {
        let mut tree = stump(2, 0.5);
        tree.right_child = vec![-3];
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn test_validate_rejects_cycles_and_orphans() {
        // root points back at itself
        let mut tree = stump(2, 0.5);
        tree.left_child = vec![0];
        assert!(tree.validate(0).is_err());

        // two internal nodes referencing each other below the root
        let tree = Tree {
            num_leaves: 4,
            split_feature: vec![0, 0, 0],
            split_gain: vec![1.0, 1.0, 1.0],
            threshold: vec![0.5, 0.5, 0.5],
            decision_type: vec![2, 2, 2],
            left_child: vec![-1, 2, 1],
            right_child: vec![-2, -3, -4],
            leaf_value: vec![0.0; 4],
            ..Default::default()
        };
        assert!(tree.validate(0).is_err());

        // leaf referenced twice
        let mut tree = stump(2, 0.5);
        tree.right_child = vec![-1];
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn test_expected_value() {
        let mut tree = stump(2, 0.5);
        tree.leaf_count = vec![75.0, 25.0];
        assert!((tree.expected_value() - (-0.5)).abs() < 1e-12);
    }
}
