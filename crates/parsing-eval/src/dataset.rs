//! Ground-truth catalog and predictions-file loading.

use std::collections::HashMap;
use std::path::Path;

use crate::mask;
use crate::types::{Dataset, ImageOutput, ImagePrediction, LabelMask, PartAnnotation};
use crate::{Error, Result};

/// Part annotations indexed by image id.
pub struct PartDataset {
    pub dataset: Dataset,
    /// img_id -> indices into dataset.annotations
    img_to_anns: HashMap<u64, Vec<usize>>,
    /// img_id -> index into dataset.images
    imgs: HashMap<u64, usize>,
}

impl PartDataset {
    /// Load a ground-truth JSON file and build indices.
    pub fn new(annotation_file: &Path) -> Result<Self> {
        let file = std::fs::File::open(annotation_file)?;
        let reader = std::io::BufReader::new(file);
        let dataset: Dataset = serde_json::from_reader(reader)?;
        Ok(Self::from_dataset(dataset))
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let mut img_to_anns: HashMap<u64, Vec<usize>> = HashMap::new();
        for (i, ann) in dataset.annotations.iter().enumerate() {
            img_to_anns.entry(ann.image_id).or_default().push(i);
        }
        let imgs = dataset
            .images
            .iter()
            .enumerate()
            .map(|(i, img)| (img.id, i))
            .collect();
        PartDataset {
            dataset,
            img_to_anns,
            imgs,
        }
    }

    /// Annotations of one image, in file order.
    ///
    /// An image listed in `images` without annotations yields an empty list;
    /// an id known neither from `images` nor from any annotation is an error.
    pub fn get_anns(&self, image_id: u64) -> Result<Vec<&PartAnnotation>> {
        match self.img_to_anns.get(&image_id) {
            Some(idx) => Ok(idx.iter().map(|&i| &self.dataset.annotations[i]).collect()),
            None if self.imgs.contains_key(&image_id) => Ok(Vec::new()),
            None => Err(Error::UnknownImage(image_id)),
        }
    }

    /// All image ids, sorted. Falls back to annotation image ids when the
    /// file lists no images.
    pub fn img_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = if self.imgs.is_empty() {
            self.img_to_anns.keys().copied().collect()
        } else {
            self.imgs.keys().copied().collect()
        };
        ids.sort_unstable();
        ids
    }
}

/// Load a predictions JSON file (a list of per-image records).
pub fn load_predictions(path: &Path) -> Result<Vec<ImagePrediction>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

impl ImagePrediction {
    /// Paint each instance's parts into a label mask, later parts on top.
    pub fn to_output(&self) -> Result<ImageOutput> {
        let instances = self
            .instances
            .iter()
            .map(|inst| {
                let (h, w) = (inst.size[0] as usize, inst.size[1] as usize);
                let mut labels = LabelMask::zeros(h, w);
                for part in &inst.parts {
                    let covered = mask::segmentation_to_mask(&part.segmentation, h, w)?;
                    for (px, hit) in labels.data.iter_mut().zip(covered) {
                        if hit != 0 {
                            *px = part.category_id;
                        }
                    }
                }
                Ok(labels)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ImageOutput { instances })
    }
}
