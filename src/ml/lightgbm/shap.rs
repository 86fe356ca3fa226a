//! Exact path-dependent TreeSHAP (Lundberg et al., Algorithm 2)
//!
//! Attributions are in raw-score space and use training-sample counts as cover.
//! For every row, `sum(phi) + expected_value == raw margin`.

use ndarray::ArrayView1;

use super::tree::{Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    /// `-1` for the root placeholder
    feature_index: i32,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Append a split to `path`; `path.len()` is the unique depth before the push.
fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature_index: i32) {
    let depth = path.len();
    path.push(PathElement {
        feature_index,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

/// Undo the extension at `path_index`; the path shrinks by one.
fn unwind_path(path: &mut Vec<PathElement>, path_index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in path_index..depth {
        path[i].feature_index = path[i + 1].feature_index;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with element `path_index` removed
fn unwound_path_sum(path: &[PathElement], path_index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((depth - i) as f64 / denom);
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((depth - i) as f64 / denom);
        }
    }
    total
}

struct TreeShap<'t, 'r, 'p> {
    tree: &'t Tree,
    row: ArrayView1<'r, f64>,
    phi: &'p mut [f64],
}

impl TreeShap<'_, '_, '_> {
    fn recurse(
        &mut self,
        node: Node,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature_index: i32,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature_index);

        let node = match node {
            Node::Leaf(leaf) => {
                let value = self.tree.leaf_value[leaf];
                for i in 1..path.len() {
                    let w = unwound_path_sum(&path, i);
                    let el = path[i];
                    self.phi[el.feature_index as usize] += w * (el.one_fraction - el.zero_fraction) * value;
                }
                return;
            }
            Node::Internal(node) => node,
        };

        let split = self.tree.feature_at(node);
        let hot = self.tree.next(node, self.row[split]);
        let (left, right) = self.tree.children(node);
        let cold = if hot == left { right } else { left };

        let cover = self.tree.cover(Node::Internal(node));
        let (hot_zero, cold_zero) = if cover > 0.0 {
            (self.tree.cover(hot) / cover, self.tree.cover(cold) / cover)
        } else {
            (0.5, 0.5)
        };

        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(previous) = path.iter().position(|el| el.feature_index == split as i32) {
            incoming_zero = path[previous].zero_fraction;
            incoming_one = path[previous].one_fraction;
            unwind_path(&mut path, previous);
        }

        let split = split as i32;
        self.recurse(hot, &path, hot_zero * incoming_zero, incoming_one, split);
        self.recurse(cold, &path, cold_zero * incoming_zero, 0.0, split);
    }
}

/// Add one tree's attributions for `row` into `phi` (length = feature count)
pub fn tree_shap(tree: &Tree, row: ArrayView1<'_, f64>, phi: &mut [f64]) {
    if tree.num_leaves < 2 {
        return;
    }
    let mut state = TreeShap { tree, row, phi };
    state.recurse(Node::Internal(0), &[], 1.0, 1.0, -1);
}
