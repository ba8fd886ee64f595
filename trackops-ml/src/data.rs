//! Synthetic datasets for tracked training demos.
//!
//! Two generators: a generic two-class blob dataset and a voltage
//! fluctuation dataset whose labels derive from environmental and
//! operational stress factors. Both are fully seeded, so a run is
//! reproducible from its logged `random_state` parameter.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::MlError;

/// Human-readable names for the voltage stability classes, index-aligned
/// with the labels.
pub const VOLTAGE_CLASS_LABELS: [&str; 3] = ["Stable", "Minor Fluctuation", "Major Fluctuation"];

/// An in-memory tabular dataset: row-major features plus class labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_classes(&self) -> usize {
        self.labels.iter().copied().max().map_or(0, |m| m + 1)
    }

    /// Per-class sample counts, indexed by label.
    pub fn class_distribution(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Draw from N(mean, std) via Box-Muller over two uniforms.
fn normal(rng: &mut StdRng, mean: f64, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + std * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Draw from Exp(scale) by inverse transform.
fn exponential(rng: &mut StdRng, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(f64::EPSILON..1.0);
    -scale * u.ln()
}

/// Two-class Gaussian blobs: the first five features carry a
/// class-dependent mean shift, the rest are pure noise.
pub fn classification_blobs(n_samples: usize, n_features: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let informative = n_features.min(5);

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let label = i % 2;
        let shift = if label == 0 { -1.0 } else { 1.0 };
        let mut row = Vec::with_capacity(n_features);
        for feature in 0..n_features {
            let mean = if feature < informative { shift } else { 0.0 };
            row.push(normal(&mut rng, mean, 1.0));
        }
        features.push(row);
        labels.push(label);
    }

    Dataset {
        feature_names: (0..n_features).map(|i| format!("feature_{}", i)).collect(),
        features,
        labels,
    }
}

/// Voltage fluctuation dataset: nine environmental/operational features
/// and a three-way stability label derived from stress factors.
pub fn voltage_dataset(n_samples: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);

    let feature_names: Vec<String> = [
        "temperature_celsius",
        "humidity_percent",
        "electrical_load_percent",
        "equipment_age_years",
        "maintenance_days_ago",
        "hour_of_day",
        "day_of_year",
        "ambient_vibration",
        "power_factor",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);

    for _ in 0..n_samples {
        let temperature = normal(&mut rng, 25.0, 8.0);
        let humidity = rng.gen_range(30.0..90.0);
        let load: f64 = rng.gen_range(30.0..95.0);
        let age = rng.gen_range(0.0..15.0);
        let maintenance_days = exponential(&mut rng, 30.0);
        let hour = rng.gen_range(0.0..24.0);
        let day_of_year = rng.gen_range(1..366) as f64;
        let vibration = rng.gen_range(0.0..10.0);
        let power_factor = rng.gen_range(0.7..1.0);

        let mut stability = 1.0;
        stability -= (temperature - 25.0).abs() / 10.0 * 0.3;
        stability -= (load / 100.0).powi(2) * 0.4;
        stability -= age / 15.0 * 0.25;
        let peak_hour = (8.0..=10.0).contains(&hour) || (18.0..=20.0).contains(&hour);
        if peak_hour {
            stability -= 0.2;
        }
        stability += (-maintenance_days / 60.0).exp() * 0.3;
        stability += normal(&mut rng, 0.0, 0.1);

        labels.push(stability_label(stability));
        features.push(vec![
            temperature,
            humidity,
            load,
            age,
            maintenance_days,
            hour,
            day_of_year,
            vibration,
            power_factor,
        ]);
    }

    let dataset = Dataset {
        feature_names,
        features,
        labels,
    };
    info!(
        samples = dataset.len(),
        distribution = ?dataset.class_distribution(),
        "generated voltage fluctuation dataset"
    );
    dataset
}

fn stability_label(stability: f64) -> usize {
    if stability < 0.6 {
        2
    } else if stability < 0.8 {
        1
    } else {
        0
    }
}
