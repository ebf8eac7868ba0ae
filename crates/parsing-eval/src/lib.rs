pub mod ap;
pub mod compose;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod mask;
pub mod matching;
pub mod miou;
pub mod params;
pub mod types;

pub use dataset::PartDataset;
pub use error::{Error, Result};
pub use eval::{ParsingEval, ParsingReport, ThresholdAp};
pub use params::{ApMode, Params};
pub use types::{
    Dataset, ImageInput, ImageOutput, ImagePrediction, LabelMask, PartAnnotation, Rle,
    Segmentation,
};
