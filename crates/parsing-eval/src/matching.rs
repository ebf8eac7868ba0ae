//! Greedy per-image assignment of predicted instances to ground-truth instances.

use crate::miou;
use crate::types::LabelMask;

/// Best ground-truth match of one predicted instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRecord {
    /// Index of the matched ground-truth instance, `None` if no instance scored above 0.
    pub gt: Option<usize>,
    pub iou: f64,
}

/// For every prediction, the ground-truth instance with the highest mean-IoU.
///
/// Each prediction is matched independently, so several predictions may pick
/// the same ground truth. Only scores strictly above 0 count as a match (NaN
/// never does); the first instance reaching the best score wins.
pub fn best_matches(
    preds: &[LabelMask],
    gts: &[LabelMask],
    num_classes: usize,
) -> Vec<MatchRecord> {
    preds
        .iter()
        .map(|pred| {
            let mut best = MatchRecord { gt: None, iou: 0.0 };
            for (j, gt) in gts.iter().enumerate() {
                let iou = miou::mean_iou(pred, gt, num_classes);
                if iou > best.iou {
                    best = MatchRecord { gt: Some(j), iou };
                }
            }
            best
        })
        .collect()
}

/// Order records by descending score, keeping arrival order among ties.
pub fn sort_by_score(records: &mut [MatchRecord]) {
    records.sort_by(|a, b| b.iou.total_cmp(&a.iou));
}

/// True-positive flags for sorted records at one threshold.
///
/// A record is a true positive when its ground truth is still unclaimed and
/// its score reaches `thr`; it then claims that ground truth. Everything else,
/// duplicates included, is a false positive.
///
/// An unmatched record (`gt: None`) is a false positive at every threshold,
/// including `thr <= 0`, where its score of 0 would otherwise qualify. It
/// never claims anything.
pub fn assign_at(records: &[MatchRecord], thr: f64) -> Vec<bool> {
    let mut claimed: Vec<usize> = Vec::new();
    records
        .iter()
        .map(|r| match r.gt {
            Some(gt) if !claimed.contains(&gt) && r.iou >= thr => {
                claimed.push(gt);
                true
            }
            _ => false,
        })
        .collect()
}

/// [`assign_at`] for each threshold, claims reset between thresholds.
pub fn assign(records: &[MatchRecord], thresholds: &[f64]) -> Vec<Vec<bool>> {
    thresholds.iter().map(|&t| assign_at(records, t)).collect()
}
