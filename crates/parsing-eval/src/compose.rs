//! Ground-truth compositing: per-part polygons into one label mask per instance.

use std::collections::BTreeSet;

use crate::mask;
use crate::types::{LabelMask, PartAnnotation};
use crate::{Error, Result};

/// Merge the part annotations of one image into a stack of instance label masks.
///
/// The stack holds one mask per distinct `parent_id`, and the parent id is used
/// directly as the stack index, so parent ids must be dense from 0. A parent id
/// outside the stack is rejected rather than remapped.
///
/// Every part adds its `category_id` onto the pixels it covers. Overlapping
/// parts of one instance therefore sum (saturating at 255); such values fall
/// outside the class taxonomy and are scored as background.
pub fn compose(
    annotations: &[&PartAnnotation],
    height: usize,
    width: usize,
) -> Result<Vec<LabelMask>> {
    let parents: BTreeSet<u64> = annotations.iter().map(|a| a.parent_id).collect();
    let n = parents.len();
    let mut stack = vec![LabelMask::zeros(height, width); n];

    for ann in annotations {
        let slot = stack
            .get_mut(ann.parent_id as usize)
            .ok_or(Error::SparseParentId {
                parent_id: ann.parent_id,
                instances: n,
            })?;
        let class = ann.category_id.min(u8::MAX as u64) as u8;
        let covered = mask::rasterize(&ann.segmentation, width, height);
        for (px, hit) in slot.data.iter_mut().zip(covered) {
            if hit != 0 {
                *px = px.saturating_add(class);
            }
        }
    }
    Ok(stack)
}
