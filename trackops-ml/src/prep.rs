//! Dataset preprocessing: splitting and feature scaling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::Dataset;
use crate::error::MlError;

/// Train/test partition of a dataset.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<usize>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<usize>,
}

/// Shuffle-split a dataset. With `stratify`, per-class proportions are
/// preserved in both partitions.
pub fn train_test_split(
    dataset: &Dataset,
    test_size: f64,
    seed: u64,
    stratify: bool,
) -> Result<SplitData, MlError> {
    if !(0.0..1.0).contains(&test_size) || test_size == 0.0 {
        return Err(MlError::invalid_input(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if dataset.is_empty() {
        return Err(MlError::dataset("cannot split an empty dataset"));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut test_indices = Vec::new();
    let mut train_indices = Vec::new();

    if stratify {
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); dataset.n_classes()];
        for (i, &label) in dataset.labels.iter().enumerate() {
            by_class[label].push(i);
        }
        for mut group in by_class {
            group.shuffle(&mut rng);
            let n_test = ((group.len() as f64) * test_size).round() as usize;
            test_indices.extend_from_slice(&group[..n_test]);
            train_indices.extend_from_slice(&group[n_test..]);
        }
    } else {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        indices.shuffle(&mut rng);
        let n_test = ((dataset.len() as f64) * test_size).round() as usize;
        test_indices.extend_from_slice(&indices[..n_test]);
        train_indices.extend_from_slice(&indices[n_test..]);
    }

    if train_indices.is_empty() || test_indices.is_empty() {
        return Err(MlError::dataset(
            "split produced an empty partition; adjust test_size",
        ));
    }

    let take = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
        let x = indices.iter().map(|&i| dataset.features[i].clone()).collect();
        let y = indices.iter().map(|&i| dataset.labels[i]).collect();
        (x, y)
    };
    let (x_train, y_train) = take(&train_indices);
    let (x_test, y_test) = take(&test_indices);

    Ok(SplitData {
        x_train,
        y_train,
        x_test,
        y_test,
    })
}

/// Zero-mean unit-variance scaling fitted on the training partition.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Result<Self, MlError> {
        if x.is_empty() {
            return Err(MlError::dataset("cannot fit scaler on empty data"));
        }
        let n_features = x[0].len();
        let n = x.len() as f64;

        let mut means = vec![0.0; n_features];
        for row in x {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut stds = vec![0.0; n_features];
        for row in x {
            for ((std, value), mean) in stds.iter_mut().zip(row).zip(&means) {
                *std += (value - mean).powi(2);
            }
        }
        for std in &mut stds {
            *std = (*std / n).sqrt();
            // Constant columns pass through unscaled.
            if *std == 0.0 {
                *std = 1.0;
            }
        }

        Ok(Self { means, stds })
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter()
            .map(|row| {
                row.iter()
                    .zip(&self.means)
                    .zip(&self.stds)
                    .map(|((value, mean), std)| (value - mean) / std)
                    .collect()
            })
            .collect()
    }

    pub fn fit_transform(x: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>), MlError> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x);
        Ok((scaler, scaled))
    }
}
