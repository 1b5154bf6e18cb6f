//! Receiver operating characteristic

use crate::{Error, Result};
use std::cmp::Ordering;

/// Points of a ROC curve, ordered by decreasing threshold.
///
/// The first point is always `(0, 0)` with an infinite threshold, and the
/// last is `(1, 1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    /// False positive rate at each threshold
    pub fpr: Vec<f64>,
    /// True positive rate at each threshold
    pub tpr: Vec<f64>,
    /// Score cut-offs, decreasing
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Area under this curve.
    ///
    /// # Errors
    ///
    /// See [`auc`].
    pub fn auc(&self) -> Result<f64> {
        auc(&self.fpr, &self.tpr)
    }
}

/// ROC curve of `scores` against binary `labels` (1 is positive).
///
/// Collinear intermediate points are dropped; only points where the curve
/// changes direction are kept.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the lengths differ, a score is NaN, a
/// label is not 0 or 1, or the labels do not contain both classes.
pub fn roc_curve(labels: &[f64], scores: &[f64]) -> Result<RocCurve> {
    if labels.len() != scores.len() {
        return Err(Error::InvalidInput(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(Error::InvalidInput("scores contain NaN".to_string()));
    }
    if let Some(bad) = labels.iter().find(|&&l| l != 0.0 && l != 1.0) {
        return Err(Error::InvalidInput(format!("label {bad} is not 0 or 1")));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    // Cumulative counts at the last index of every distinct score.
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0.0_f64, 0.0_f64);
    for (pos, &idx) in order.iter().enumerate() {
        if labels[idx] == 1.0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let next_differs = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if next_differs {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[idx]);
        }
    }

    let (Some(&positives), Some(&negatives)) = (tps.last(), fps.last()) else {
        return Err(Error::InvalidInput("no samples".to_string()));
    };
    if positives == 0.0 || negatives == 0.0 {
        return Err(Error::InvalidInput(
            "ROC needs both positive and negative labels".to_string(),
        ));
    }

    let keep = turning_points(&fps, &tps);
    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(fps[i] / negatives);
        curve.tpr.push(tps[i] / positives);
        curve.thresholds.push(thresholds[i]);
    }
    Ok(curve)
}

/// Indices of the endpoints and of every point where either series bends.
fn turning_points(fps: &[f64], tps: &[f64]) -> Vec<usize> {
    let n = fps.len();
    (0..n)
        .filter(|&i| {
            i == 0 || i + 1 == n || {
                let second_diff = |v: &[f64]| v[i + 1] - 2.0 * v[i] + v[i - 1];
                second_diff(fps) != 0.0 || second_diff(tps) != 0.0
            }
        })
        .collect()
}

/// Area under a curve by the trapezoidal rule.
///
/// `x` may be increasing or decreasing; a decreasing `x` yields the same
/// positive area.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the lengths differ, there are fewer
/// than two points, or `x` is not monotonic.
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(Error::InvalidInput(format!(
            "x has {} points, y has {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(Error::InvalidInput(
            "at least 2 points are needed to compute an area".to_string(),
        ));
    }

    let steps: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let direction = if steps.iter().all(|&d| d >= 0.0) {
        1.0
    } else if steps.iter().all(|&d| d <= 0.0) {
        -1.0
    } else {
        return Err(Error::InvalidInput("x is neither increasing nor decreasing".to_string()));
    };

    let area: f64 = steps
        .iter()
        .zip(y.windows(2))
        .map(|(dx, w)| dx * (w[0] + w[1]) / 2.0)
        .sum();
    Ok(direction * area)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_separation() {
        let curve = roc_curve(&[0.0, 1.0], &[0.2, 0.8]).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert_eq!(curve.auc().unwrap(), 1.0);
    }

    #[test]
    fn test_reference_values() {
        let curve = roc_curve(&[0.0, 0.0, 1.0, 1.0], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert_eq!(&curve.thresholds[1..], &[0.8, 0.4, 0.35, 0.1]);
        assert!((curve.auc().unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ties_share_a_threshold() {
        let curve = roc_curve(&[0.0, 1.0, 0.0, 1.0], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(curve.fpr, vec![0.0, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 1.0]);
        assert!((curve.auc().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_an_error() {
        assert!(roc_curve(&[1.0, 1.0], &[0.2, 0.9]).is_err());
        assert!(roc_curve(&[0.0, 0.0], &[0.2, 0.9]).is_err());
        assert!(roc_curve(&[], &[]).is_err());
    }

    #[test]
    fn test_auc_decreasing_x() {
        assert!((auc(&[1.0, 0.0], &[1.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(auc(&[0.0, 1.0, 0.5], &[0.0, 1.0, 1.0]).is_err());
    }
}
