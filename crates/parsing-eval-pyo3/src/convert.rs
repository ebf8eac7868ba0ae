use numpy::ndarray::Axis;
use numpy::{PyReadonlyArray3, PyUntypedArrayMethods};
use parsing_core::{ImageInput, ImageOutput, LabelMask, ParsingReport};
use pyo3::prelude::*;
use pyo3::types::PyDict;

pub fn to_py_err(e: parsing_core::Error) -> PyErr {
    match &e {
        parsing_core::Error::Io(_) => pyo3::exceptions::PyIOError::new_err(e.to_string()),
        _ => pyo3::exceptions::PyValueError::new_err(e.to_string()),
    }
}

pub fn py_to_input(dict: &Bound<'_, PyDict>) -> PyResult<ImageInput> {
    let image_id: u64 = dict
        .get_item("image_id")?
        .ok_or_else(|| pyo3::exceptions::PyKeyError::new_err("image_id"))?
        .extract()?;
    Ok(ImageInput { image_id })
}

/// Convert one image's predictions to label masks.
///
/// Accepts `None` (no instances), a uint8 array shaped `(N, H, W)`, or a dict
/// holding such an array under `"parsing"`.
pub fn py_to_output(obj: &Bound<'_, PyAny>) -> PyResult<ImageOutput> {
    if obj.is_none() {
        return Ok(ImageOutput::default());
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        return match dict.get_item("parsing")? {
            Some(masks) => py_to_output(&masks),
            None => Ok(ImageOutput::default()),
        };
    }
    let masks: PyReadonlyArray3<u8> = obj.extract()?;
    let shape = masks.shape();
    let (n, h, w) = (shape[0], shape[1], shape[2]);
    let view = masks.as_array();
    let instances = (0..n)
        .map(|i| {
            let data: Vec<u8> = view.index_axis(Axis(0), i).iter().copied().collect();
            LabelMask::from_vec(h, w, data).map_err(to_py_err)
        })
        .collect::<PyResult<Vec<_>>>()?;
    Ok(ImageOutput { instances })
}

pub fn report_to_py(py: Python<'_>, report: &ParsingReport) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    for (name, value) in report.metrics() {
        dict.set_item(name, value)?;
    }
    dict.set_item("npos", report.npos)?;
    dict.set_item("num_images", report.num_images)?;
    Ok(dict.into_any().unbind())
}
