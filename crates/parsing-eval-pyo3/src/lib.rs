use std::path::{Path, PathBuf};
use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::PyDict;

mod convert;
mod mask;

use convert::{py_to_input, py_to_output, report_to_py, to_py_err};

// ---------------------------------------------------------------------------
// ParsingEval
// ---------------------------------------------------------------------------

#[pyclass(name = "ParsingEval")]
struct PyParsingEval {
    inner: parsing_core::ParsingEval,
}

#[pymethods]
impl PyParsingEval {
    #[new]
    #[pyo3(signature = (gt_file, iou_thrs=None, num_classes=7, use_11_point=false, output_dir=None))]
    fn new(
        gt_file: &str,
        iou_thrs: Option<Vec<f64>>,
        num_classes: usize,
        use_11_point: bool,
        output_dir: Option<PathBuf>,
    ) -> PyResult<Self> {
        let dataset = parsing_core::PartDataset::new(Path::new(gt_file))
            .map_err(|e| pyo3::exceptions::PyIOError::new_err(format!("{}", e)))?;
        let mut params = parsing_core::Params {
            num_classes,
            output_dir,
            ..parsing_core::Params::default()
        };
        if let Some(thrs) = iou_thrs {
            params.iou_thrs = thrs;
        }
        if use_11_point {
            params.ap_mode = parsing_core::ApMode::ElevenPoint;
        }
        let inner =
            parsing_core::ParsingEval::new(Arc::new(dataset), params).map_err(to_py_err)?;
        Ok(PyParsingEval { inner })
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn process(
        &mut self,
        inputs: Vec<Bound<'_, PyDict>>,
        outputs: Vec<Bound<'_, PyAny>>,
    ) -> PyResult<()> {
        let inputs = inputs
            .iter()
            .map(py_to_input)
            .collect::<PyResult<Vec<_>>>()?;
        let outputs = outputs
            .iter()
            .map(py_to_output)
            .collect::<PyResult<Vec<_>>>()?;
        self.inner.process(&inputs, &outputs).map_err(to_py_err)
    }

    /// Score everything processed since the last `reset()`.
    fn evaluate(&self, py: Python<'_>) -> PyResult<PyObject> {
        let report = self.inner.evaluate().map_err(to_py_err)?;
        report_to_py(py, &report)
    }

    /// Fold another evaluator's session into this one.
    fn merge(&mut self, other: PyRef<'_, PyParsingEval>) -> PyResult<()> {
        self.inner.merge(&other.inner).map_err(to_py_err)
    }

    fn summarize(&self) -> PyResult<()> {
        self.inner.evaluate().map_err(to_py_err)?.summarize();
        Ok(())
    }

    #[getter]
    fn npos(&self) -> usize {
        self.inner.npos()
    }

    #[getter]
    fn num_images(&self) -> usize {
        self.inner.num_images()
    }

    #[getter]
    fn total_time(&self) -> f64 {
        self.inner.total_time().as_secs_f64()
    }

    #[getter]
    fn iou_thrs(&self) -> Vec<f64> {
        self.inner.params.iou_thrs.clone()
    }

    #[getter]
    fn num_classes(&self) -> usize {
        self.inner.params.num_classes
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

#[pymodule]
fn parsing_eval(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyParsingEval>()?;
    m.add_function(wrap_pyfunction!(mask::rasterize, m)?)?;
    m.add_function(wrap_pyfunction!(mask::mean_iou, m)?)?;
    Ok(())
}
