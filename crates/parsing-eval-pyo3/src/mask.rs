use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyUntypedArrayMethods};
use parsing_core::LabelMask;
use pyo3::prelude::*;

fn to_label_mask(arr: &PyReadonlyArray2<u8>) -> PyResult<LabelMask> {
    let shape = arr.shape();
    let data: Vec<u8> = arr.as_array().iter().copied().collect();
    LabelMask::from_vec(shape[0], shape[1], data).map_err(crate::convert::to_py_err)
}

/// Fill polygon contours into a binary `(height, width)` uint8 mask.
#[pyfunction]
#[pyo3(signature = (contours, width, height))]
pub fn rasterize(
    py: Python<'_>,
    contours: Vec<Vec<f64>>,
    width: usize,
    height: usize,
) -> PyResult<Py<PyArray2<u8>>> {
    let data = parsing_core::mask::rasterize(&contours, width, height);
    let arr = Array2::from_shape_vec((height, width), data)
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;
    Ok(arr.into_pyarray(py).unbind())
}

#[pyfunction]
#[pyo3(signature = (pred, gt, num_classes = 7))]
pub fn mean_iou(
    pred: PyReadonlyArray2<u8>,
    gt: PyReadonlyArray2<u8>,
    num_classes: usize,
) -> PyResult<f64> {
    if num_classes == 0 {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "num_classes must be at least 1",
        ));
    }
    if pred.shape() != gt.shape() {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "pred and gt must have the same shape",
        ));
    }
    let pred = to_label_mask(&pred)?;
    let gt = to_label_mask(&gt)?;
    Ok(parsing_core::miou::mean_iou(&pred, &gt, num_classes))
}
