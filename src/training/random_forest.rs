//! Random Forest regressor

use super::decision_tree::DecisionTree;
use crate::config::{parse_params, Params};
use crate::error::{PipelineError, Result};
use crate::estimator::Regressor;
use crate::frame::{check_target_len, to_matrix};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Seed used when `random_state` is not given
const DEFAULT_SEED: u64 = 42;

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "MaxFeaturesValue")]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    #[default]
    All,
}

/// Config form of [`MaxFeatures`]: a name, a count or a fraction
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MaxFeaturesValue {
    Count(usize),
    Fraction(f64),
    Name(String),
}

impl TryFrom<MaxFeaturesValue> for MaxFeatures {
    type Error = String;

    fn try_from(value: MaxFeaturesValue) -> std::result::Result<Self, Self::Error> {
        match value {
            MaxFeaturesValue::Count(0) => Err("max_features must be at least 1".to_string()),
            MaxFeaturesValue::Count(n) => Ok(MaxFeatures::Fixed(n)),
            MaxFeaturesValue::Fraction(f) if f > 0.0 && f <= 1.0 => Ok(MaxFeatures::Fraction(f)),
            MaxFeaturesValue::Fraction(f) => {
                Err(format!("max_features fraction must be in (0, 1], got {}", f))
            }
            MaxFeaturesValue::Name(name) => match name.as_str() {
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                "all" => Ok(MaxFeatures::All),
                other => Err(format!("unknown max_features {:?}", other)),
            },
        }
    }
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

fn default_n_estimators() -> usize {
    100
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_true() -> bool {
    true
}

/// Parameters of the `random-forest-regressor` stage
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RandomForestParams {
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default)]
    pub max_features: MaxFeatures,
    #[serde(default = "default_true")]
    pub bootstrap: bool,
    #[serde(default)]
    pub random_state: Option<u64>,
}

/// Random Forest model
///
/// Each tree is grown on its own bootstrap sample drawn from a ChaCha8
/// stream seeded with `random_state + tree_index`, so a fixed seed gives the
/// same forest regardless of how rayon schedules the trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: Option<u64>,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Construct from `random-forest-regressor` config params
    pub fn from_params(estimator: &str, params: &Params) -> Result<Self> {
        let p: RandomForestParams = parse_params(estimator, params)?;
        if p.n_estimators == 0 {
            return Err(PipelineError::invalid_params(estimator, "`n_estimators` must be at least 1"));
        }
        if p.min_samples_split < 2 {
            return Err(PipelineError::invalid_params(
                estimator,
                "`min_samples_split` must be at least 2",
            ));
        }
        if p.min_samples_leaf == 0 {
            return Err(PipelineError::invalid_params(
                estimator,
                "`min_samples_leaf` must be at least 1",
            ));
        }

        let mut forest = Self::new(p.n_estimators)
            .with_min_samples_split(p.min_samples_split)
            .with_min_samples_leaf(p.min_samples_leaf)
            .with_max_features(p.max_features)
            .with_bootstrap(p.bootstrap);
        forest.max_depth = p.max_depth;
        forest.random_state = p.random_state;
        Ok(forest)
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Fit the forest on a feature matrix
    pub fn fit_array(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
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
                "cannot fit a forest on zero rows".to_string(),
            ));
        }

        let max_features = self.max_features.resolve(n_features);
        let base_seed = self.random_state.unwrap_or(DEFAULT_SEED);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features));

                if self.bootstrap {
                    let sample_indices: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot = y.select(Axis(0), &sample_indices);
                    tree.fit(&x_boot, &y_boot, &mut rng)?;
                } else {
                    tree.fit(x, y, &mut rng)?;
                }

                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        self.compute_feature_importances();

        debug!(
            n_trees = self.trees.len(),
            n_samples,
            n_features,
            max_features,
            "Fitted random forest"
        );
        Ok(())
    }

    /// Mean of the tree predictions
    pub fn predict_array(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("RandomForestRegressor".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        let all_predictions = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for predictions in &all_predictions {
            sum += predictions;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances: Array1<f64> = Array1::zeros(self.n_features);
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                total_importances += imp;
            }
        }

        let total = total_importances.sum();
        if total > 0.0 {
            total_importances /= total;
        }
        self.feature_importances = Some(total_importances);
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Fitted trees
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &DataFrame, y: &Array1<f64>) -> Result<()> {
        check_target_len(x, y)?;
        self.fit_array(&to_matrix(x)?, y)
    }

    fn predict(&self, x: &DataFrame) -> Result<Array1<f64>> {
        self.predict_array(&to_matrix(x)?)
    }
}
