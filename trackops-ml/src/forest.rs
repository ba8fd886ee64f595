//! Random forest: bootstrap-bagged decision trees with sqrt-feature
//! subsampling and majority voting.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::MlError;
use crate::model::Classifier;
use crate::tree::{DecisionTree, TreeParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        // The voltage training defaults.
        Self {
            n_estimators: 150,
            max_depth: Some(12),
            min_samples_split: 5,
            min_samples_leaf: 2,
            seed: 42,
        }
    }
}

pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_classes: 0,
            n_features: 0,
        }
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), MlError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(MlError::training(format!(
                "feature/label length mismatch: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        if self.params.n_estimators == 0 {
            return Err(MlError::training("n_estimators must be nonzero"));
        }
        self.n_features = x[0].len();
        self.n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let max_features = ((self.n_features as f64).sqrt().round() as usize).max(1);

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.trees = Vec::with_capacity(self.params.n_estimators);
        for estimator in 0..self.params.n_estimators {
            // Bootstrap sample with replacement.
            let mut sample_x = Vec::with_capacity(x.len());
            let mut sample_y = Vec::with_capacity(y.len());
            for _ in 0..x.len() {
                let i = rng.gen_range(0..x.len());
                sample_x.push(x[i].clone());
                sample_y.push(y[i]);
            }

            let mut tree = DecisionTree::new(TreeParams {
                max_depth: self.params.max_depth,
                min_samples_split: self.params.min_samples_split,
                min_samples_leaf: self.params.min_samples_leaf,
                max_features: Some(max_features),
                seed: self.params.seed.wrapping_add(estimator as u64),
            });
            tree.fit(&sample_x, &sample_y)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Vec<usize> {
        if self.trees.is_empty() {
            return vec![0; x.len()];
        }
        let mut votes = vec![vec![0usize; self.n_classes]; x.len()];
        for tree in &self.trees {
            for (ballot, prediction) in votes.iter_mut().zip(tree.predict(x)) {
                ballot[prediction] += 1;
            }
        }
        votes
            .iter()
            .map(|ballot| {
                ballot
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, &count)| count)
                    .map(|(class, _)| class)
                    .unwrap_or(0)
            })
            .collect()
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(importances) = tree.feature_importances() {
                for (total, value) in totals.iter_mut().zip(importances) {
                    *total += value;
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for total in &mut totals {
                *total /= sum;
            }
        }
        Some(totals)
    }
}
