//! Classification evaluation metrics and cross-validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::MlError;
use crate::model::Classifier;

/// Fraction of predictions matching the true labels.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / y_true.len() as f64
}

/// Confusion matrix indexed `[true_class][predicted_class]`.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        matrix[t][p] += 1;
    }
    matrix
}

/// Per-class precision/recall/f1 plus support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Serializable report in the shape the tracking artifacts expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub classes: BTreeMap<String, ClassMetrics>,
}

/// Build a classification report. `class_names` is index-aligned; classes
/// beyond the provided names fall back to their numeric label.
pub fn classification_report(
    y_true: &[usize],
    y_pred: &[usize],
    class_names: &[&str],
) -> ClassificationReport {
    let n_classes = y_true
        .iter()
        .chain(y_pred)
        .copied()
        .max()
        .map_or(0, |m| m + 1);
    let matrix = confusion_matrix(y_true, y_pred, n_classes);

    let mut classes = BTreeMap::new();
    let mut macro_precision = 0.0;
    let mut macro_recall = 0.0;
    let mut macro_f1 = 0.0;

    for class in 0..n_classes {
        let true_positive = matrix[class][class];
        let predicted: usize = (0..n_classes).map(|t| matrix[t][class]).sum();
        let actual: usize = matrix[class].iter().sum();

        let precision = if predicted > 0 {
            true_positive as f64 / predicted as f64
        } else {
            0.0
        };
        let recall = if actual > 0 {
            true_positive as f64 / actual as f64
        } else {
            0.0
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        macro_precision += precision;
        macro_recall += recall;
        macro_f1 += f1_score;

        let name = class_names
            .get(class)
            .map(|s| s.to_string())
            .unwrap_or_else(|| class.to_string());
        classes.insert(
            name,
            ClassMetrics {
                precision,
                recall,
                f1_score,
                support: actual,
            },
        );
    }

    let n = n_classes.max(1) as f64;
    ClassificationReport {
        accuracy: accuracy(y_true, y_pred),
        macro_precision: macro_precision / n,
        macro_recall: macro_recall / n,
        macro_f1: macro_f1 / n,
        classes,
    }
}

/// Cross-validation result with mean/std aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationResult {
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub metric_name: String,
}

impl CrossValidationResult {
    pub fn from_scores(scores: Vec<f64>, metric_name: &str) -> Self {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        Self {
            fold_scores: scores,
            mean_score: mean,
            std_score: variance.sqrt(),
            metric_name: metric_name.to_string(),
        }
    }
}

/// Stratified k-fold cross-validation, scoring accuracy. `factory` builds
/// a fresh model per fold.
pub fn cross_validate<F>(
    x: &[Vec<f64>],
    y: &[usize],
    k: usize,
    seed: u64,
    factory: F,
) -> Result<CrossValidationResult, MlError>
where
    F: Fn() -> Box<dyn Classifier>,
{
    if k < 2 {
        return Err(MlError::invalid_input("cv requires at least 2 folds"));
    }
    if y.len() < k {
        return Err(MlError::invalid_input(format!(
            "cannot make {} folds from {} samples",
            k,
            y.len()
        )));
    }

    // Deal each class round-robin into folds so per-fold class balance
    // mirrors the whole set.
    let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
    let mut next_fold = 0usize;
    for class in 0..n_classes {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);
        for index in members {
            folds[next_fold].push(index);
            next_fold = (next_fold + 1) % k;
        }
    }

    let mut scores = Vec::with_capacity(k);
    for held_out in 0..k {
        let mut x_train = Vec::new();
        let mut y_train = Vec::new();
        for (fold_index, fold) in folds.iter().enumerate() {
            if fold_index == held_out {
                continue;
            }
            for &i in fold {
                x_train.push(x[i].clone());
                y_train.push(y[i]);
            }
        }
        let x_test: Vec<Vec<f64>> = folds[held_out].iter().map(|&i| x[i].clone()).collect();
        let y_test: Vec<usize> = folds[held_out].iter().map(|&i| y[i]).collect();

        let mut model = factory();
        model.fit(&x_train, &y_train)?;
        scores.push(accuracy(&y_test, &model.predict(&x_test)));
    }

    Ok(CrossValidationResult::from_scores(scores, "accuracy"))
}
