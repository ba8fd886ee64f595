//! # trackops-ml
//!
//! Toy model training against synthetic data, logged end to end through
//! the tracking server. The models here exist to exercise the tracking
//! surface (parameters, metrics, artifacts, tags) with a realistic
//! workload, not to compete on modeling.

pub mod data;
pub mod error;
pub mod forest;
pub mod linear;
pub mod metrics;
pub mod model;
pub mod prep;
pub mod trainer;
pub mod tree;

pub use data::{classification_blobs, voltage_dataset, Dataset, VOLTAGE_CLASS_LABELS};
pub use error::{MlError, Result};
pub use forest::{ForestParams, RandomForest};
pub use linear::{LogisticParams, LogisticRegression};
pub use metrics::{
    accuracy, classification_report, confusion_matrix, cross_validate, ClassificationReport,
    CrossValidationResult,
};
pub use model::{Classifier, ModelKind};
pub use prep::{train_test_split, SplitData, StandardScaler};
pub use trainer::{run_training, TrainingOutcome, TrainingSpec};
