//! Multinomial logistic regression via full-batch gradient descent.

use serde::{Deserialize, Serialize};

use crate::error::MlError;
use crate::model::Classifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 200,
            l2: 1e-3,
        }
    }
}

pub struct LogisticRegression {
    params: LogisticParams,
    /// Per-class weight rows; the last column is the bias.
    weights: Vec<Vec<f64>>,
    n_features: usize,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            weights: Vec::new(),
            n_features: 0,
        }
    }

    fn scores(&self, row: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|w| {
                let bias = w[self.n_features];
                row.iter().zip(w).map(|(x, wi)| x * wi).sum::<f64>() + bias
            })
            .collect()
    }

    fn softmax(scores: &[f64]) -> Vec<f64> {
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        exps.iter().map(|e| e / sum).collect()
    }
}

impl Classifier for LogisticRegression {
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), MlError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(MlError::training(format!(
                "feature/label length mismatch: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        self.n_features = x[0].len();
        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let n = x.len() as f64;

        self.weights = vec![vec![0.0; self.n_features + 1]; n_classes];

        for _epoch in 0..self.params.epochs {
            let mut gradients = vec![vec![0.0; self.n_features + 1]; n_classes];
            for (row, &label) in x.iter().zip(y) {
                let probabilities = Self::softmax(&self.scores(row));
                for (class, gradient) in gradients.iter_mut().enumerate() {
                    let error = probabilities[class] - if class == label { 1.0 } else { 0.0 };
                    for (g, value) in gradient.iter_mut().zip(row) {
                        *g += error * value;
                    }
                    gradient[self.n_features] += error;
                }
            }
            for (weights, gradient) in self.weights.iter_mut().zip(&gradients) {
                for (w, g) in weights.iter_mut().zip(gradient) {
                    *w -= self.params.learning_rate * (g / n + self.params.l2 * *w);
                }
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Vec<usize> {
        if self.weights.is_empty() {
            return vec![0; x.len()];
        }
        x.iter()
            .map(|row| {
                let scores = self.scores(row);
                scores
                    .iter()
                    .enumerate()
                    .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(class, _)| class)
                    .unwrap_or(0)
            })
            .collect()
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.weights.is_empty() {
            return None;
        }
        let mut importances = vec![0.0; self.n_features];
        for weights in &self.weights {
            for (importance, w) in importances.iter_mut().zip(weights) {
                *importance += w.abs();
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for importance in &mut importances {
                *importance /= sum;
            }
        }
        Some(importances)
    }
}
