use serde::{Deserialize, Serialize};

/// Top-level ground-truth file: COCO-style images plus part annotations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Dataset {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<PartAnnotation>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Image {
    pub id: u64,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// One ground-truth part polygon owned by a parent instance (a person).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PartAnnotation {
    #[serde(default)]
    pub id: u64,
    pub image_id: u64,
    /// Index of the owning instance within its image.
    pub parent_id: u64,
    pub category_id: u64,
    /// Contours, each a flat list of `[x, y, x, y, ...]` coordinates.
    #[serde(default)]
    pub segmentation: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    /// Polygon format: list of polygons, each a flat list of [x, y, x, y, ...] coordinates.
    Polygon(Vec<Vec<f64>>),
    /// Compressed RLE format (as stored in COCO JSON results).
    CompressedRle { size: [u32; 2], counts: String },
    /// Uncompressed RLE format.
    UncompressedRle { size: [u32; 2], counts: Vec<u32> },
}

/// Run-length encoding for masks.
#[derive(Debug, Clone, PartialEq)]
pub struct Rle {
    pub h: u32,
    pub w: u32,
    /// Run counts: alternating runs of 0s and 1s, starting with 0s.
    pub counts: Vec<u32>,
}

/// Per-pixel class labels for one instance, row-major (`y * width + x`).
///
/// 0 is background; 1.. are part classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMask {
    pub height: usize,
    pub width: usize,
    pub data: Vec<u8>,
}

impl LabelMask {
    pub fn zeros(height: usize, width: usize) -> Self {
        LabelMask {
            height,
            width,
            data: vec![0; height * width],
        }
    }

    /// Wrap row-major labels, checking the length against `height * width`.
    pub fn from_vec(height: usize, width: usize, data: Vec<u8>) -> crate::Result<Self> {
        if data.len() != height * width {
            return Err(crate::Error::MaskShape {
                expected: height * width,
                actual: data.len(),
            });
        }
        Ok(LabelMask {
            height,
            width,
            data,
        })
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// One image of a batch, as handed over by the detection framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageInput {
    pub image_id: u64,
}

/// Predicted instances for one image, in the same order as its [`ImageInput`].
#[derive(Debug, Clone, Default)]
pub struct ImageOutput {
    pub instances: Vec<LabelMask>,
}

/// One record of a predictions file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagePrediction {
    pub image_id: u64,
    #[serde(default)]
    pub instances: Vec<PredictedInstance>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictedInstance {
    /// `[height, width]` of the instance mask.
    pub size: [u32; 2],
    #[serde(default)]
    pub parts: Vec<PredictedPart>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PredictedPart {
    pub category_id: u8,
    pub segmentation: Segmentation,
}
