//! Training: split, classifier families, evaluation and the batch pipeline.

pub mod classifier;
pub mod metrics;
pub mod pipeline;
pub mod split;
pub mod trainer;

pub use classifier::{
    BernoulliNaiveBayes, Classifier, ClassifierConfig, ModelFamily, ProbabilisticClassifier,
    SoftmaxRegression,
};
pub use metrics::{AccuracySummary, ClassReport, ConfusionMatrix, EvaluationReport, ModelMetrics};
pub use pipeline::{PipelineRun, run_pipeline};
pub use split::{StratifiedSplit, stratified_split};
pub use trainer::{TrainedModel, TrainingOutcome, train};
