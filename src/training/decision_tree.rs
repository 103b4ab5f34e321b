//! Regression tree used by the random forest

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Best split found for one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// CART regression tree with the mean squared error criterion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split, all when `None`
    pub max_features: Option<usize>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit the tree; `rng` draws the feature subset of every split.
    pub fn fit<R: Rng>(&mut self, x: &Array2<f64>, y: &Array1<f64>, rng: &mut R) -> Result<()> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PipelineError::InvalidInput(
                "cannot fit a tree on zero rows".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut importances = vec![0.0; n_features];

        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut importances, rng));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(())
    }

    fn build_tree<R: Rng>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut R,
    ) -> TreeNode {
        let n_samples = indices.len();
        let y_subset: Vec<f64> = indices.iter().map(|&i| y[i]).collect();
        let leaf = |y_subset: &[f64]| TreeNode::Leaf {
            value: mean(y_subset),
            n_samples,
        };

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || is_constant(&y_subset);
        if should_stop {
            return leaf(&y_subset);
        }

        let features = self.draw_features(x.ncols(), rng);
        let Some(best) = self.find_best_split(x, y, indices, &features) else {
            return leaf(&y_subset);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);
        if left_indices.is_empty() || right_indices.is_empty() {
            return leaf(&y_subset);
        }

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity: variance(&y_subset),
        }
    }

    fn draw_features<R: Rng>(&self, n_features: usize, rng: &mut R) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => sample(rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        }
    }

    /// Scan every candidate feature in parallel; ties go to the lowest feature index.
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
        let total_sq_sum: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
        let parent_impurity = total_sq_sum / n - (total_sum / n).powi(2);

        let mut candidates: Vec<SplitCandidate> = features
            .par_iter()
            .filter_map(|&feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    indices.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut best: Option<SplitCandidate> = None;
                let mut left_sum = 0.0;
                let mut left_sq_sum = 0.0;

                for split in 1..pairs.len() {
                    let (prev_x, prev_y) = pairs[split - 1];
                    left_sum += prev_y;
                    left_sq_sum += prev_y * prev_y;

                    let next_x = pairs[split].0;
                    if next_x <= prev_x {
                        continue;
                    }
                    let left_count = split;
                    let right_count = pairs.len() - split;
                    if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                        continue;
                    }

                    let left_impurity = mse_from_sums(left_count, left_sum, left_sq_sum);
                    let right_impurity = mse_from_sums(
                        right_count,
                        total_sum - left_sum,
                        total_sq_sum - left_sq_sum,
                    );
                    let weighted =
                        (left_count as f64 * left_impurity + right_count as f64 * right_impurity) / n;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(0.0, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: split_threshold(prev_x, next_x),
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        candidates.sort_by_key(|c| c.feature_idx);
        candidates
            .into_iter()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("DecisionTree".to_string()))?;

        Ok(x.rows()
            .into_iter()
            .map(|row| predict_sample(root, row))
            .collect())
    }

    /// Normalized impurity decrease per feature
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

fn predict_sample(node: &TreeNode, sample: ArrayView1<f64>) -> f64 {
    let mut node = node;
    loop {
        match node {
            TreeNode::Leaf { value, .. } => return *value,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                node = if sample[*feature_idx] <= *threshold { left } else { right };
            }
        }
    }
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}

/// Midpoint of two consecutive distinct values, falling back to `lower` when
/// rounding lands the midpoint on `upper`.
fn split_threshold(lower: f64, upper: f64) -> f64 {
    let mid = lower / 2.0 + upper / 2.0;
    if mid >= upper || !mid.is_finite() {
        lower
    } else {
        mid
    }
}

/// Var = E[X²] - E[X]²
fn mse_from_sums(count: usize, sum: f64, sq_sum: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let n = count as f64;
    (sq_sum / n - (sum / n).powi(2)).max(0.0)
}

fn mean(y: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter().sum::<f64>() / y.len() as f64
}

fn variance(y: &[f64]) -> f64 {
    let m = mean(y);
    mean(&y.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>())
}

fn is_constant(y: &[f64]) -> bool {
    match y.first() {
        None => true,
        Some(&first) => y.iter().all(|&v| (v - first).abs() < 1e-10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut rng()).unwrap();

        // fully grown tree reproduces distinct training targets
        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.get_n_leaves(), 5);
    }

    #[test]
    fn test_step_function() {
        let x = array![[0.0, 7.0], [1.0, 3.0], [2.0, 9.0], [10.0, 1.0], [11.0, 4.0], [12.0, 8.0]];
        let y = array![5.0, 5.0, 5.0, 50.0, 50.0, 50.0];

        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut rng()).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.predict(&array![[3.0, 0.0], [9.0, 0.0]]).unwrap(), array![5.0, 50.0]);

        let importances = tree.feature_importances().unwrap();
        assert!((importances[0] - 1.0).abs() < 1e-12);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];

        let mut tree = DecisionTree::new().with_max_depth(Some(1));
        tree.fit(&x, &y, &mut rng()).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.predict(&x).unwrap(), array![0.5, 0.5, 2.5, 2.5]);
    }

    #[test]
    fn test_min_samples_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 9.0];

        let mut tree = DecisionTree::new().with_min_samples_leaf(2);
        tree.fit(&x, &y, &mut rng()).unwrap();

        // the outlier cannot be isolated in a leaf of its own
        let prediction = tree.predict(&array![[6.0]]).unwrap()[0];
        assert_eq!(prediction, 4.5);
    }

    #[test]
    fn test_split_between_adjacent_floats() {
        let a = f64::from_bits(1.0f64.to_bits() + 1);
        let b = f64::from_bits(a.to_bits() + 1);
        // the rounded midpoint of a and b is b itself
        assert_eq!(a / 2.0 + b / 2.0, b);

        let x = array![[a], [b]];
        let y = array![0.0, 1.0];
        let mut tree = DecisionTree::new();
        tree.fit(&x, &y, &mut rng()).unwrap();

        assert_eq!(tree.get_depth(), 2);
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_split_threshold() {
        assert_eq!(split_threshold(1.0, 3.0), 2.0);
        assert_eq!(split_threshold(f64::MAX, f64::INFINITY), f64::MAX);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut tree = DecisionTree::new();
        let err = tree.fit(&array![[1.0], [2.0]], &array![1.0], &mut rng()).unwrap_err();
        assert!(matches!(err, PipelineError::ShapeError { .. }));
    }

    #[test]
    fn test_not_fitted() {
        let tree = DecisionTree::new();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(PipelineError::NotFitted(_))));
    }
}
