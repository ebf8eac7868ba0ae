//! Instance-level parsing evaluation (APp): per-image greedy matching
//! accumulated into per-threshold precision/recall across a dataset.
//!
//! A [`ParsingEval`] is driven the way a detection framework drives its
//! evaluators: `reset()` once, `process()` for every batch, then `evaluate()`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::ap;
use crate::compose;
use crate::dataset::PartDataset;
use crate::matching::{self, MatchRecord};
use crate::params::Params;
use crate::types::{ImageInput, ImageOutput, PartAnnotation};
use crate::{Error, Result};

/// Running counters of one evaluation session.
#[derive(Debug, Clone)]
struct Session {
    /// Parameters in force when the session was started.
    params: Params,
    /// tp[t] / fp[t]: one flag per predicted instance, in arrival order.
    tp: Vec<Vec<bool>>,
    fp: Vec<Vec<bool>>,
    npos: usize,
    num_images: usize,
    total_time: Duration,
    /// End of the previous `process` call (or of `reset`).
    mark: Instant,
}

impl Session {
    fn new(params: Params) -> Self {
        let num_thrs = params.iou_thrs.len();
        Session {
            params,
            tp: vec![Vec::new(); num_thrs],
            fp: vec![Vec::new(); num_thrs],
            npos: 0,
            num_images: 0,
            total_time: Duration::ZERO,
            mark: Instant::now(),
        }
    }
}

/// Outcome of scoring one image, committed to the session once the whole
/// batch has been scored.
struct ImageEval {
    num_gt: usize,
    /// Per threshold, true-positive flag of each sorted prediction.
    tp: Vec<Vec<bool>>,
}

/// AP at one overlap threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdAp {
    pub iou_thr: f64,
    pub ap: f64,
    pub tp: usize,
    pub fp: usize,
}

/// Final metrics of a session.
#[derive(Debug, Clone, Serialize)]
pub struct ParsingReport {
    pub per_threshold: Vec<ThresholdAp>,
    /// Mean AP over all thresholds.
    pub ap_vol: f64,
    /// Seconds spent between `process` calls, i.e. in inference.
    pub total_time: f64,
    pub fps: f64,
    pub npos: usize,
    pub num_images: usize,
}

impl ParsingReport {
    /// Metrics by name: `APp@<thr>` for every threshold, `APpvol`, `total_time`, `fps`.
    pub fn metrics(&self) -> Vec<(String, f64)> {
        let mut out: Vec<(String, f64)> = self
            .per_threshold
            .iter()
            .map(|t| (format!("APp@{}", t.iou_thr), t.ap))
            .collect();
        out.push(("APpvol".to_string(), self.ap_vol));
        out.push(("total_time".to_string(), self.total_time));
        out.push(("fps".to_string(), self.fps));
        out
    }

    /// Look up a metric by the name used in [`metrics`](Self::metrics).
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics()
            .into_iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Print the summary table to stdout.
    pub fn summarize(&self) {
        for t in &self.per_threshold {
            println!(
                " {:<10} = {:0.3}  (npos={}, tp={}, fp={})",
                format!("APp@{}", t.iou_thr),
                t.ap,
                self.npos,
                t.tp,
                t.fp
            );
        }
        println!(" {:<10} = {:0.3}", "APpvol", self.ap_vol);
        println!(" {:<10} = {:0.2}", "total_time", self.total_time);
        println!(" {:<10} = {:0.2}", "fps", self.fps);
    }
}

/// The parsing evaluation object.
///
/// `params` may be edited between sessions; a running session keeps the
/// parameters it was started with until the next `reset()`.
#[derive(Clone)]
pub struct ParsingEval {
    pub dataset: Arc<PartDataset>,
    pub params: Params,
    session: Option<Session>,
}

impl ParsingEval {
    /// Create an evaluator. The configured output directory is created here;
    /// failing to create it is not an error.
    pub fn new(dataset: Arc<PartDataset>, params: Params) -> Result<Self> {
        params.validate()?;
        if let Some(dir) = &params.output_dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                log::debug!("could not create output dir {:?}: {}", dir, e);
            }
        }
        Ok(ParsingEval {
            dataset,
            params,
            session: None,
        })
    }

    /// Start a fresh session with the current `params`, discarding all counters.
    pub fn reset(&mut self) {
        self.session = Some(Session::new(self.params.clone()));
    }

    /// Score one batch. The time since the previous call (or `reset`) is
    /// counted as inference time.
    pub fn process(&mut self, inputs: &[ImageInput], outputs: &[ImageOutput]) -> Result<()> {
        let elapsed = self.session()?.mark.elapsed();
        self.process_timed(inputs, outputs, elapsed)?;
        if let Some(s) = self.session.as_mut() {
            s.mark = Instant::now();
        }
        Ok(())
    }

    /// [`process`](Self::process) with the inference time supplied by the caller.
    ///
    /// A batch is applied all-or-nothing: if any image fails, no counters change.
    pub fn process_timed(
        &mut self,
        inputs: &[ImageInput],
        outputs: &[ImageOutput],
        elapsed: Duration,
    ) -> Result<()> {
        let params = &self.session()?.params;
        params.validate()?;
        if inputs.len() != outputs.len() {
            return Err(Error::LengthMismatch {
                inputs: inputs.len(),
                outputs: outputs.len(),
            });
        }

        let evals = inputs
            .iter()
            .zip(outputs)
            .map(|(input, output)| {
                let anns = self.dataset.get_anns(input.image_id)?;
                self.evaluate_img(params, input.image_id, &anns, output)
            })
            .collect::<Result<Vec<_>>>()?;

        let session = self.session.as_mut().ok_or(Error::NotStarted)?;
        session.num_images += inputs.len();
        session.total_time += elapsed;
        for eval in evals {
            session.npos += eval.num_gt;
            for (t, flags) in eval.tp.into_iter().enumerate() {
                session.fp[t].extend(flags.iter().map(|&b| !b));
                session.tp[t].extend(flags);
            }
        }
        Ok(())
    }

    fn evaluate_img(
        &self,
        params: &Params,
        image_id: u64,
        anns: &[&PartAnnotation],
        output: &ImageOutput,
    ) -> Result<ImageEval> {
        let preds = &output.instances;
        let Some(first) = preds.first() else {
            // nothing to match, the ground truth only counts towards recall
            let [h, w] = params.fallback_size;
            let gts = compose::compose(anns, h, w)?;
            return Ok(ImageEval {
                num_gt: gts.len(),
                tp: vec![Vec::new(); params.iou_thrs.len()],
            });
        };

        let (h, w) = (first.height, first.width);
        for p in preds {
            if p.data.len() != h * w {
                return Err(Error::MaskShape {
                    expected: h * w,
                    actual: p.data.len(),
                });
            }
        }
        let gts = compose::compose(anns, h, w)?;

        let mut records = matching::best_matches(preds, &gts, params.num_classes);
        matching::sort_by_score(&mut records);
        log::debug!("image {}: [{}]", image_id, format_records(&records));

        Ok(ImageEval {
            num_gt: gts.len(),
            tp: matching::assign(&records, &params.iou_thrs),
        })
    }

    /// Compute per-threshold AP and throughput from everything processed so far.
    ///
    /// Counters are left untouched, so processing may continue afterwards.
    /// With no ground truth or no elapsed time the affected values are NaN or
    /// infinite rather than an error.
    pub fn evaluate(&self) -> Result<ParsingReport> {
        let s = self.session()?;
        if s.npos == 0 {
            log::warn!("no ground-truth instances processed, recall is undefined");
        }
        if s.total_time.is_zero() {
            log::warn!("no elapsed time recorded, fps is undefined");
        }

        let per_threshold: Vec<ThresholdAp> = s
            .params
            .iou_thrs
            .iter()
            .enumerate()
            .map(|(t, &iou_thr)| {
                let (rec, prec) = ap::cumulative_pr(&s.tp[t], &s.fp[t], s.npos);
                let ap = ap::voc_ap(&rec, &prec, s.params.ap_mode);
                let tp = s.tp[t].iter().filter(|&&b| b).count();
                let fp = s.fp[t].iter().filter(|&&b| b).count();
                log::info!("APp@{}: {:.3}, {}, {}, {}", iou_thr, ap, s.npos, tp, fp);
                ThresholdAp { iou_thr, ap, tp, fp }
            })
            .collect();

        let ap_vol =
            per_threshold.iter().map(|t| t.ap).sum::<f64>() / per_threshold.len() as f64;
        let total_time = s.total_time.as_secs_f64();
        let fps = s.num_images as f64 / total_time;
        log::info!("APpvol: {:.3}", ap_vol);
        log::info!("total_time: {:.2}", total_time);
        log::info!("fps: {:.2}", fps);

        Ok(ParsingReport {
            per_threshold,
            ap_vol,
            total_time,
            fps,
            npos: s.npos,
            num_images: s.num_images,
        })
    }

    /// Fold another worker's counters into this session: totals add up and
    /// the other worker's flags are appended after this one's.
    pub fn merge(&mut self, other: &ParsingEval) -> Result<()> {
        let theirs = other.session()?.clone();
        let ours = self.session.as_mut().ok_or(Error::NotStarted)?;
        if theirs.params.iou_thrs != ours.params.iou_thrs {
            return Err(Error::IncompatibleThresholds);
        }
        ours.npos += theirs.npos;
        ours.num_images += theirs.num_images;
        ours.total_time += theirs.total_time;
        for (t, (tp, fp)) in theirs.tp.into_iter().zip(theirs.fp).enumerate() {
            ours.tp[t].extend(tp);
            ours.fp[t].extend(fp);
        }
        Ok(())
    }

    pub fn npos(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.npos)
    }

    pub fn num_images(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.num_images)
    }

    pub fn total_time(&self) -> Duration {
        self.session
            .as_ref()
            .map_or(Duration::ZERO, |s| s.total_time)
    }

    /// Number of flags recorded so far at each threshold.
    pub fn num_records(&self) -> Vec<usize> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, |s| s.tp.iter().map(Vec::len).collect())
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotStarted)
    }
}

fn format_records(records: &[MatchRecord]) -> String {
    records
        .iter()
        .map(|r| match r.gt {
            Some(gt) => format!("{}:{:.3}", gt, r.iou),
            None => format!("-1:{:.3}", r.iou),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
