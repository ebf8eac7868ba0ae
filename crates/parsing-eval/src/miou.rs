//! Per-instance mean-IoU between two label masks.

use crate::types::LabelMask;

/// `n × n` confusion histogram, row-major: `hist[gt * n + pred]`.
///
/// Labels at or above `n` in either mask count as background. With `n == 0`
/// there is no class to count into and the histogram is empty.
pub fn confusion(gt: &[u8], pred: &[u8], n: usize) -> Vec<u64> {
    if n == 0 {
        return Vec::new();
    }
    let clamp = |v: u8| if (v as usize) < n { v as usize } else { 0 };
    let mut hist = vec![0u64; n * n];
    for (&g, &p) in gt.iter().zip(pred) {
        hist[clamp(g) * n + clamp(p)] += 1;
    }
    hist
}

/// IoU for each class: `diag / (row_sum + col_sum - diag)`.
///
/// A class absent from both masks has a zero union and yields NaN.
pub fn per_class_iou(gt: &[u8], pred: &[u8], n: usize) -> Vec<f64> {
    let hist = confusion(gt, pred, n);
    (0..n)
        .map(|c| {
            let inter = hist[c * n + c];
            let gt_pix: u64 = hist[c * n..(c + 1) * n].iter().sum();
            let pred_pix: u64 = (0..n).map(|r| hist[r * n + c]).sum();
            let union = gt_pix + pred_pix - inter;
            inter as f64 / union as f64
        })
        .collect()
}

/// Mean of the foreground (class 1..n) IoUs, skipping NaN entries.
///
/// Returns NaN when no foreground class appears in either mask.
pub fn mean_iou(pred: &LabelMask, gt: &LabelMask, n: usize) -> f64 {
    let ious = per_class_iou(&gt.data, &pred.data, n);
    let (sum, count) = ious
        .iter()
        .skip(1)
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
