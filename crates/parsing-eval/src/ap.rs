//! Precision/recall curves and VOC-style average precision.

use crate::params::ApMode;

/// Cumulative recall and precision over tp/fp flags in arrival order.
///
/// `npos == 0` is not guarded: recall becomes NaN or infinite.
pub fn cumulative_pr(tp: &[bool], fp: &[bool], npos: usize) -> (Vec<f64>, Vec<f64>) {
    let mut ctp = 0u64;
    let mut cfp = 0u64;
    let mut recall = Vec::with_capacity(tp.len());
    let mut precision = Vec::with_capacity(tp.len());
    for (&t, &f) in tp.iter().zip(fp) {
        ctp += u64::from(t);
        cfp += u64::from(f);
        recall.push(ctp as f64 / npos as f64);
        precision.push(ctp as f64 / ((ctp + cfp) as f64).max(f64::EPSILON));
    }
    (recall, precision)
}

/// Average precision of a PR curve.
pub fn voc_ap(recall: &[f64], precision: &[f64], mode: ApMode) -> f64 {
    match mode {
        ApMode::ElevenPoint => (0..=10)
            .map(|i| {
                // i * 0.1, not i / 10: the 0.3, 0.6 and 0.7 levels sit one ulp
                // above their decimal values
                let level = i as f64 * 0.1;
                recall
                    .iter()
                    .zip(precision)
                    .filter(|&(&r, _)| r >= level)
                    .map(|(_, &p)| p)
                    .reduce(f64::max)
                    .unwrap_or(0.0)
                    / 11.0
            })
            .sum(),
        ApMode::Area => {
            let mut mrec = Vec::with_capacity(recall.len() + 2);
            mrec.push(0.0);
            mrec.extend_from_slice(recall);
            mrec.push(1.0);
            let mut mpre = Vec::with_capacity(precision.len() + 2);
            mpre.push(0.0);
            mpre.extend_from_slice(precision);
            mpre.push(0.0);

            // precision envelope, non-increasing left to right
            for i in (1..mpre.len()).rev() {
                mpre[i - 1] = mpre[i - 1].max(mpre[i]);
            }

            (0..mrec.len() - 1)
                .filter(|&i| mrec[i + 1] != mrec[i])
                .map(|i| (mrec[i + 1] - mrec[i]) * mpre[i + 1])
                .sum()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(tp: &[u8]) -> (Vec<bool>, Vec<bool>) {
        (
            tp.iter().map(|&v| v == 1).collect(),
            tp.iter().map(|&v| v == 0).collect(),
        )
    }

    #[test]
    fn test_cumulative_pr() {
        let (tp, fp) = flags(&[1, 0, 1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 2);
        assert_eq!(rec, vec![0.5, 0.5, 1.0]);
        assert_eq!(prec[0], 1.0);
        assert_eq!(prec[1], 0.5);
        assert!((prec[2] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_area_ap_known_curve() {
        let (tp, fp) = flags(&[1, 0, 1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 2);
        let ap = voc_ap(&rec, &prec, ApMode::Area);
        assert!((ap - (0.5 + 0.5 * 2.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_eleven_point_known_curve() {
        let (tp, fp) = flags(&[1, 0, 1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 2);
        let ap = voc_ap(&rec, &prec, ApMode::ElevenPoint);
        assert!((ap - (6.0 + 5.0 * 2.0 / 3.0) / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_prefix_is_one() {
        let (tp, fp) = flags(&[1, 1, 1, 0, 0]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 3);
        assert!((voc_ap(&rec, &prec, ApMode::Area) - 1.0).abs() < 1e-12);
        assert!((voc_ap(&rec, &prec, ApMode::ElevenPoint) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_recall_bounded() {
        let (tp, fp) = flags(&[0, 1, 0, 1, 0, 0, 1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 5);
        for mode in [ApMode::Area, ApMode::ElevenPoint] {
            let ap = voc_ap(&rec, &prec, mode);
            assert!(ap > 0.0 && ap < 1.0, "{:?}: {}", mode, ap);
        }
    }

    #[test]
    fn test_empty_curve_is_zero() {
        assert_eq!(voc_ap(&[], &[], ApMode::Area), 0.0);
        assert_eq!(voc_ap(&[], &[], ApMode::ElevenPoint), 0.0);
    }

    #[test]
    fn test_all_false_positives_is_zero() {
        let (tp, fp) = flags(&[0, 0, 0]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 4);
        assert_eq!(voc_ap(&rec, &prec, ApMode::Area), 0.0);
    }

    #[test]
    fn test_zero_npos_propagates_nan() {
        let (tp, fp) = flags(&[0, 0]);
        let (rec, _) = cumulative_pr(&tp, &fp, 0);
        assert!(rec.iter().all(|r| r.is_nan()));
        let (tp, fp) = flags(&[1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 0);
        assert!(rec[0].is_infinite());
        assert!(voc_ap(&rec, &prec, ApMode::Area).is_nan());
    }

    #[test]
    fn test_eleven_point_levels_above_exact_decimals() {
        // recall reaches exactly 0.3, short of the 0.3 level (0.30000000000000004)
        let (tp, fp) = flags(&[1, 1, 1]);
        let (rec, prec) = cumulative_pr(&tp, &fp, 10);
        assert_eq!(rec[2], 0.3);
        let ap = voc_ap(&rec, &prec, ApMode::ElevenPoint);
        assert!((ap - 3.0 / 11.0).abs() < 1e-12);
    }
}
