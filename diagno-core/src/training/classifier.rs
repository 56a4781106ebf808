//! Probabilistic classifiers over binary symptom vectors.
//!
//! Two families are available:
//! - [`SoftmaxRegression`]: multinomial logistic regression trained with
//!   full-batch gradient descent and L2 regularization.
//! - [`BernoulliNaiveBayes`]: per-class Bernoulli likelihoods with additive
//!   smoothing.
//!
//! Both produce a probability distribution over class indices `0..n_classes`.

use crate::error::DiagnoError;
use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Human-readable description of a classifier family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFamily {
    pub model_type: &'static str,
    pub kernel: &'static str,
}

/// A classifier that yields a full class distribution per input.
pub trait ProbabilisticClassifier: Send + Sync {
    /// Fit on encoded rows `x` with class indices `y` in `0..n_classes`.
    fn fit(&mut self, x: &[FeatureVector], y: &[usize], n_classes: usize)
    -> Result<(), DiagnoError>;

    /// Probability per class index. Sums to 1.
    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, DiagnoError>;

    /// Most probable class index; the lowest index wins a tie.
    fn predict(&self, x: &FeatureVector) -> Result<usize, DiagnoError> {
        let proba = self.predict_proba(x)?;
        Ok(argmax(&proba))
    }

    fn family(&self) -> ModelFamily;

    /// Number of classes, 0 when unfitted.
    fn n_classes(&self) -> usize;

    /// Input width, 0 when unfitted.
    fn n_features(&self) -> usize;
}

/// First index holding the maximum value.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn check_training_input(
    x: &[FeatureVector],
    y: &[usize],
    n_classes: usize,
) -> Result<usize, DiagnoError> {
    if x.is_empty() {
        return Err(DiagnoError::training("Cannot fit with zero samples"));
    }
    if x.len() != y.len() {
        return Err(DiagnoError::training(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    if n_classes < 2 {
        return Err(DiagnoError::training("Need at least 2 classes"));
    }
    if let Some(bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(DiagnoError::training(format!(
            "label index {bad} out of range for {n_classes} classes"
        )));
    }
    let width = x[0].len();
    if x.iter().any(|row| row.len() != width) {
        return Err(DiagnoError::training("Rows have inconsistent widths"));
    }
    Ok(width)
}

fn check_width(expected: usize, x: &FeatureVector) -> Result<(), DiagnoError> {
    if expected == 0 {
        return Err(DiagnoError::inference("Model not fitted"));
    }
    if x.len() != expected {
        return Err(DiagnoError::inference(format!(
            "Input has {} features, model expects {expected}",
            x.len()
        )));
    }
    Ok(())
}

/// Normalize log-scores into probabilities without overflow.
fn softmax_in_place(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

/// Multinomial logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    tolerance: f64,
    /// `weights[class][feature]`
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

impl Default for SoftmaxRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftmaxRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 500,
            l2: 1e-3,
            tolerance: 1e-5,
            weights: Vec::new(),
            bias: Vec::new(),
        }
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    fn validate(&self) -> Result<(), DiagnoError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(DiagnoError::training(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(DiagnoError::training(format!(
                "l2 must be non-negative, got {}",
                self.l2
            )));
        }
        if self.epochs == 0 {
            return Err(DiagnoError::training("epochs must be at least 1"));
        }
        Ok(())
    }

    fn scores(&self, active: &[usize], out: &mut [f64]) {
        for (c, score) in out.iter_mut().enumerate() {
            *score = self.bias[c] + active.iter().map(|&j| self.weights[c][j]).sum::<f64>();
        }
    }
}

impl ProbabilisticClassifier for SoftmaxRegression {
    fn fit(
        &mut self,
        x: &[FeatureVector],
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), DiagnoError> {
        self.validate()?;
        let n_features = check_training_input(x, y, n_classes)?;
        let n = x.len() as f64;

        // Binary inputs: only active positions contribute to scores and gradients.
        let active: Vec<Vec<usize>> = x.iter().map(FeatureVector::active_indices).collect();

        self.weights = vec![vec![0.0; n_features]; n_classes];
        self.bias = vec![0.0; n_classes];

        let mut proba = vec![0.0; n_classes];
        let mut grad_w = vec![vec![0.0; n_features]; n_classes];
        let mut grad_b = vec![0.0; n_classes];

        let mut epochs_run = 0;
        for _ in 0..self.epochs {
            epochs_run += 1;
            for g in grad_w.iter_mut() {
                g.fill(0.0);
            }
            grad_b.fill(0.0);

            for (idx, &label) in active.iter().zip(y) {
                self.scores(idx, &mut proba);
                softmax_in_place(&mut proba);
                for c in 0..n_classes {
                    let err = proba[c] - if c == label { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    for &j in idx {
                        grad_w[c][j] += err;
                    }
                }
            }

            let mut max_grad: f64 = 0.0;
            for c in 0..n_classes {
                for j in 0..n_features {
                    let g = grad_w[c][j] / n + self.l2 * self.weights[c][j];
                    self.weights[c][j] -= self.learning_rate * g;
                    max_grad = max_grad.max(g.abs());
                }
                let g = grad_b[c] / n;
                self.bias[c] -= self.learning_rate * g;
                max_grad = max_grad.max(g.abs());
            }

            if !max_grad.is_finite() {
                return Err(DiagnoError::training("Gradient diverged"));
            }
            if max_grad < self.tolerance {
                break;
            }
        }

        if self
            .weights
            .iter()
            .flatten()
            .chain(&self.bias)
            .any(|w| !w.is_finite())
        {
            return Err(DiagnoError::training("Non-finite weights after fitting"));
        }

        tracing::debug!(epochs = epochs_run, n_classes, n_features, "Softmax regression fitted");
        Ok(())
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, DiagnoError> {
        check_width(self.n_features(), x)?;
        let mut proba = vec![0.0; self.bias.len()];
        self.scores(&x.active_indices(), &mut proba);
        softmax_in_place(&mut proba);
        Ok(proba)
    }

    fn family(&self) -> ModelFamily {
        ModelFamily {
            model_type: "Multinomial Logistic Regression",
            kernel: "linear",
        }
    }

    fn n_classes(&self) -> usize {
        self.bias.len()
    }

    fn n_features(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }
}

/// Bernoulli Naive Bayes with additive smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BernoulliNaiveBayes {
    alpha: f64,
    class_log_prior: Vec<f64>,
    /// `ln P(x_j = 1 | class)`
    log_p: Vec<Vec<f64>>,
    /// `ln P(x_j = 0 | class)`
    log_not_p: Vec<Vec<f64>>,
}

impl Default for BernoulliNaiveBayes {
    fn default() -> Self {
        Self::new()
    }
}

impl BernoulliNaiveBayes {
    pub fn new() -> Self {
        Self {
            alpha: 1.0,
            class_log_prior: Vec::new(),
            log_p: Vec::new(),
            log_not_p: Vec::new(),
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl ProbabilisticClassifier for BernoulliNaiveBayes {
    fn fit(
        &mut self,
        x: &[FeatureVector],
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), DiagnoError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(DiagnoError::training(format!(
                "alpha must be positive, got {}",
                self.alpha
            )));
        }
        let n_features = check_training_input(x, y, n_classes)?;

        let mut class_counts = vec![0usize; n_classes];
        let mut feature_counts = vec![vec![0usize; n_features]; n_classes];
        for (row, &label) in x.iter().zip(y) {
            class_counts[label] += 1;
            for j in row.active_indices() {
                feature_counts[label][j] += 1;
            }
        }
        if let Some(empty) = class_counts.iter().position(|&c| c == 0) {
            return Err(DiagnoError::training(format!(
                "class index {empty} has no training rows"
            )));
        }

        let total = x.len() as f64;
        self.class_log_prior = class_counts
            .iter()
            .map(|&c| (c as f64 / total).ln())
            .collect();
        self.log_p = Vec::with_capacity(n_classes);
        self.log_not_p = Vec::with_capacity(n_classes);
        for (c, counts) in feature_counts.iter().enumerate() {
            let denom = class_counts[c] as f64 + 2.0 * self.alpha;
            let p: Vec<f64> = counts
                .iter()
                .map(|&k| (k as f64 + self.alpha) / denom)
                .collect();
            self.log_p.push(p.iter().map(|v| v.ln()).collect());
            self.log_not_p.push(p.iter().map(|v| (1.0 - v).ln()).collect());
        }

        tracing::debug!(n_classes, n_features, "Bernoulli naive Bayes fitted");
        Ok(())
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, DiagnoError> {
        check_width(self.n_features(), x)?;
        let mut scores: Vec<f64> = (0..self.class_log_prior.len())
            .map(|c| {
                self.class_log_prior[c]
                    + x.as_slice()
                        .iter()
                        .enumerate()
                        .map(|(j, &v)| {
                            if v != 0.0 {
                                self.log_p[c][j]
                            } else {
                                self.log_not_p[c][j]
                            }
                        })
                        .sum::<f64>()
            })
            .collect();
        softmax_in_place(&mut scores);
        Ok(scores)
    }

    fn family(&self) -> ModelFamily {
        ModelFamily {
            model_type: "Bernoulli Naive Bayes",
            kernel: "none",
        }
    }

    fn n_classes(&self) -> usize {
        self.class_log_prior.len()
    }

    fn n_features(&self) -> usize {
        self.log_p.first().map_or(0, Vec::len)
    }
}

/// A classifier of either family, as persisted in the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum Classifier {
    Softmax(SoftmaxRegression),
    NaiveBayes(BernoulliNaiveBayes),
}

impl Classifier {
    fn inner(&self) -> &dyn ProbabilisticClassifier {
        match self {
            Self::Softmax(m) => m,
            Self::NaiveBayes(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ProbabilisticClassifier {
        match self {
            Self::Softmax(m) => m,
            Self::NaiveBayes(m) => m,
        }
    }
}

impl ProbabilisticClassifier for Classifier {
    fn fit(
        &mut self,
        x: &[FeatureVector],
        y: &[usize],
        n_classes: usize,
    ) -> Result<(), DiagnoError> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict_proba(&self, x: &FeatureVector) -> Result<Vec<f64>, DiagnoError> {
        self.inner().predict_proba(x)
    }

    fn family(&self) -> ModelFamily {
        self.inner().family()
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }
}

/// Classifier choice and hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierConfig {
    Softmax {
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_epochs")]
        epochs: usize,
        #[serde(default = "default_l2")]
        l2: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    NaiveBayes {
        #[serde(default = "default_alpha")]
        alpha: f64,
    },
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::Softmax {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_learning_rate() -> f64 {
    0.5
}

fn default_epochs() -> usize {
    500
}

fn default_l2() -> f64 {
    1e-3
}

fn default_tolerance() -> f64 {
    1e-5
}

fn default_alpha() -> f64 {
    1.0
}

impl ClassifierConfig {
    /// Unfitted classifier for this configuration.
    pub fn build(&self) -> Classifier {
        match *self {
            Self::Softmax {
                learning_rate,
                epochs,
                l2,
                tolerance,
            } => Classifier::Softmax(
                SoftmaxRegression::new()
                    .with_learning_rate(learning_rate)
                    .with_epochs(epochs)
                    .with_l2(l2)
                    .with_tolerance(tolerance),
            ),
            Self::NaiveBayes { alpha } => {
                Classifier::NaiveBayes(BernoulliNaiveBayes::new().with_alpha(alpha))
            }
        }
    }
}
