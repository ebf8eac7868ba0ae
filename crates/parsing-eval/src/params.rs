use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a precision/recall curve is integrated into a single AP value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApMode {
    /// Area under the monotone precision envelope (VOC 2010+).
    #[default]
    Area,
    /// Mean of the max precision at 11 recall levels (VOC 2007).
    ElevenPoint,
}

/// Evaluation parameters.
///
/// Defaults: 9 overlap thresholds (0.1:0.1:0.9), a 7-class parsing taxonomy
/// (background plus 6 parts) and area-based AP.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Params {
    /// Mean-IoU thresholds at which a match counts as a true positive.
    pub iou_thrs: Vec<f64>,
    /// Size of the class taxonomy including background. Labels at or above
    /// this value are treated as background.
    pub num_classes: usize,
    pub ap_mode: ApMode,
    /// `[height, width]` used to rasterize ground truth for images without predictions.
    pub fallback_size: [usize; 2],
    /// Directory for evaluation artifacts, created when the evaluator is built.
    pub output_dir: Option<PathBuf>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            iou_thrs: (1..=9).map(|i| i as f64 / 10.0).collect(),
            num_classes: 7,
            ap_mode: ApMode::Area,
            fallback_size: [100, 100],
            output_dir: None,
        }
    }
}

impl Params {
    /// Load parameters from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let params: Params = serde_json::from_reader(reader)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject parameters the scorer cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_classes == 0 {
            return Err(crate::Error::InvalidParams(
                "num_classes must be at least 1".to_string(),
            ));
        }
        if self.iou_thrs.is_empty() {
            return Err(crate::Error::InvalidParams(
                "iou_thrs must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
