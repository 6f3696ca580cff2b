//! Classification metrics over a batch of logits.

use ndarray::{ArrayView1, ArrayView2, Axis};

use crate::error::{Error, Result};

/// Top-k accuracy, in percent, for each requested `k`.
///
/// A sample counts as correct for `k` when its label is among the `k`
/// highest-scoring classes. Classes are ranked by descending score; equal
/// scores rank the lower class index first, so results are deterministic.
///
/// # Errors
///
/// - [`Error::EmptyBatch`] if `logits` has no rows
/// - [`Error::ShapeMismatch`] if `labels` and `logits` disagree on the batch
///   size, or a label is not a valid class index
/// - [`Error::InvalidTopK`] if any `k` is zero or larger than the class count
///
/// # Example
///
/// ```
/// use corruption_bench::stats::top_k_accuracy;
/// use ndarray::array;
///
/// let logits = array![[0.1, 0.7, 0.2], [0.5, 0.3, 0.2]];
/// let acc = top_k_accuracy(logits.view(), &[1, 1], &[1, 2]).unwrap();
/// assert_eq!(acc, vec![50.0, 100.0]);
/// ```
pub fn top_k_accuracy(logits: ArrayView2<'_, f32>, labels: &[i64], ks: &[usize]) -> Result<Vec<f64>> {
    let (batch, classes) = logits.dim();
    check_batch(batch, classes, labels)?;
    if let Some(&k) = ks.iter().find(|&&k| k == 0 || k > classes) {
        return Err(Error::InvalidTopK { k, classes });
    }

    let ranks: Vec<usize> = logits
        .axis_iter(Axis(0))
        .zip(labels)
        .map(|(row, &label)| rank_of(row, label as usize))
        .collect();

    Ok(ks
        .iter()
        .map(|&k| {
            let correct = ranks.iter().filter(|&&rank| rank < k).count();
            correct as f64 * 100.0 / batch as f64
        })
        .collect())
}

/// Mean cross-entropy of the softmax of `logits` against `labels`.
///
/// Uses the max-subtracted log-sum-exp so large logits do not overflow.
pub fn cross_entropy(logits: ArrayView2<'_, f32>, labels: &[i64]) -> Result<f64> {
    let (batch, classes) = logits.dim();
    check_batch(batch, classes, labels)?;

    let total: f64 = logits
        .axis_iter(Axis(0))
        .zip(labels)
        .map(|(row, &label)| {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
            let sum: f64 = row.iter().map(|&v| (f64::from(v) - max).exp()).sum();
            max + sum.ln() - f64::from(row[label as usize])
        })
        .sum();
    Ok(total / batch as f64)
}

fn check_batch(batch: usize, classes: usize, labels: &[i64]) -> Result<()> {
    if batch == 0 {
        return Err(Error::EmptyBatch);
    }
    if labels.len() != batch {
        return Err(Error::ShapeMismatch {
            what: "labels vs logits rows".to_string(),
            expected: batch.to_string(),
            actual: labels.len().to_string(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&l| l < 0 || l as usize >= classes) {
        return Err(Error::ShapeMismatch {
            what: "label class index".to_string(),
            expected: format!("0..{classes}"),
            actual: bad.to_string(),
        });
    }
    Ok(())
}

/// Position of `label` in the stable descending ranking of `row`.
fn rank_of(row: ArrayView1<'_, f32>, label: usize) -> usize {
    let score = row[label];
    row.iter()
        .enumerate()
        .filter(|&(j, &v)| v.total_cmp(&score).is_gt() || (v.total_cmp(&score).is_eq() && j < label))
        .count()
}
