//! Stratified train/test split.

use crate::error::DiagnoError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Row indices assigned to each side of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows so each class keeps roughly its overall proportion in the
/// holdout set.
///
/// `y` holds class indices into `labels`. The test side receives
/// `ceil(test_fraction * n)` rows, distributed by largest remainder, and
/// every class keeps at least one row on each side.
pub fn stratified_split(
    y: &[usize],
    labels: &[String],
    test_fraction: f64,
    seed: u64,
) -> Result<StratifiedSplit, DiagnoError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DiagnoError::config(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if y.is_empty() {
        return Err(DiagnoError::training("Cannot split an empty dataset"));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); labels.len()];
    for (row, &class) in y.iter().enumerate() {
        let bucket = by_class.get_mut(class).ok_or_else(|| {
            DiagnoError::training(format!("label index {class} has no label name"))
        })?;
        bucket.push(row);
    }
    for (class, rows) in by_class.iter().enumerate() {
        if rows.len() < 2 {
            return Err(DiagnoError::InsufficientClassSamples {
                label: labels[class].clone(),
                count: rows.len(),
            });
        }
    }

    let counts: Vec<usize> = by_class.iter().map(Vec::len).collect();
    let allocation = allocate_test_rows(&counts, test_fraction);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::with_capacity(allocation.iter().sum());
    for (rows, &n_test) in by_class.iter_mut().zip(&allocation) {
        rows.shuffle(&mut rng);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();

    tracing::debug!(
        train = train.len(),
        test = test.len(),
        classes = labels.len(),
        "Stratified split"
    );
    Ok(StratifiedSplit { train, test })
}

/// Per-class holdout counts. Each class gets between 1 and `count - 1` rows;
/// the total tracks `ceil(fraction * n)` as closely as those bounds allow.
fn allocate_test_rows(counts: &[usize], fraction: f64) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    let target = (fraction * n as f64).ceil() as usize;

    let ideal: Vec<f64> = counts.iter().map(|&c| c as f64 * fraction).collect();
    let mut alloc: Vec<usize> = ideal
        .iter()
        .zip(counts)
        .map(|(&v, &c)| (v.floor() as usize).clamp(1, c - 1))
        .collect();

    let mut total: usize = alloc.iter().sum();
    while total < target {
        let Some(class) = pick(&ideal, &alloc, |c| alloc[c] < counts[c] - 1, true) else {
            break;
        };
        alloc[class] += 1;
        total += 1;
    }
    while total > target {
        let Some(class) = pick(&ideal, &alloc, |c| alloc[c] > 1, false) else {
            break;
        };
        alloc[class] -= 1;
        total -= 1;
    }
    alloc
}

/// Eligible class with the largest (or smallest) remainder `ideal - alloc`.
/// Ties go to the lower class index.
fn pick(
    ideal: &[f64],
    alloc: &[usize],
    eligible: impl Fn(usize) -> bool,
    largest: bool,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (class, (&want, &have)) in ideal.iter().zip(alloc).enumerate() {
        if !eligible(class) {
            continue;
        }
        let remainder = want - have as f64;
        let better = match best {
            None => true,
            Some((_, r)) if largest => remainder > r,
            Some((_, r)) => remainder < r,
        };
        if better {
            best = Some((class, remainder));
        }
    }
    best.map(|(class, _)| class)
}
