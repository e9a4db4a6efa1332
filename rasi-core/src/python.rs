//! Python bindings for the `_core` extension module.
//!
//! Nodes are built by kind name through the catalog, so Python code wires
//! graphs the same way a JSON driver does:
//!
//! ```python
//! from rasi._core import Node
//!
//! rates = Node("TabulatedTimeConstants", values={"1->2'": 2.0, ...})
//! tdds = Node("StaticTdds4State", microscopic_rate_calculator=rates)
//! tdds.update()
//! tdds.get("tauc")
//! ```

use std::sync::Arc;

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyList};

use crate::catalog;
use crate::emf::EmfData;
use crate::error::NodeError;
use crate::node::{Config, Curve, Matrix, NodeRef, Table, Value};

fn to_py_err(e: NodeError) -> PyErr {
    match e {
        NodeError::UnknownVariable { .. } => PyKeyError::new_err(e.to_string()),
        NodeError::Configuration(_) => PyValueError::new_err(e.to_string()),
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn to_value(value: &Bound<'_, PyAny>) -> PyResult<Value> {
    if value.is_none() {
        return Ok(Value::Unset);
    }
    if let Ok(node) = value.extract::<PyRef<'_, PyNode>>() {
        return Ok(Value::Node(node.inner.clone()));
    }
    if let Ok(curve) = value.extract::<PyRef<'_, PyCurve>>() {
        return Ok(Value::Curve(curve.inner.clone()));
    }
    if let Ok(emf) = value.extract::<PyRef<'_, PyEmf>>() {
        return Ok(Value::Emf(Arc::clone(&emf.inner)));
    }
    // bool is a subclass of int, test it first.
    if value.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(value.extract()?));
    }
    if let Ok(x) = value.extract::<f64>() {
        return Ok(Value::Scalar(x));
    }
    if let Ok(dict) = value.downcast::<PyDict>() {
        let mut table = Table::new();
        for (k, v) in dict.iter() {
            table.insert(k.extract()?, v.extract()?);
        }
        return Ok(Value::from(table));
    }
    if let Ok(rows) = value.extract::<Vec<Vec<f64>>>() {
        return Matrix::from_rows(rows)
            .map(Value::from)
            .ok_or_else(|| PyValueError::new_err("ragged matrix"));
    }
    if let Ok(array) = value.extract::<Vec<f64>>() {
        return Ok(Value::from(array));
    }
    Err(PyTypeError::new_err(format!(
        "cannot store {} in a node variable",
        value.get_type().name()?
    )))
}

fn to_py(py: Python<'_>, value: Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Unset => py.None(),
        Value::Bool(b) => b.into_py(py),
        Value::Scalar(x) => x.into_py(py),
        Value::Array(a) => PyList::new_bound(py, a.iter()).into_py(py),
        Value::Matrix(m) => {
            let rows = (0..m.rows()).map(|r| (0..m.cols()).map(|c| m.get(r, c)).collect::<Vec<_>>());
            PyList::new_bound(py, rows.map(|row| PyList::new_bound(py, row))).into_py(py)
        }
        Value::Table(t) => {
            let dict = PyDict::new_bound(py);
            for (k, v) in t.iter() {
                dict.set_item(k, v)?;
            }
            dict.into_py(py)
        }
        Value::Node(inner) => Py::new(py, PyNode { inner })?.into_py(py),
        Value::Curve(inner) => Py::new(py, PyCurve { inner })?.into_py(py),
        Value::Reservoirs(set) => {
            let dict = PyDict::new_bound(py);
            for (name, reservoir) in set.iter() {
                dict.set_item(name, (reservoir.energies().to_vec(), reservoir.density().to_vec()))?;
            }
            dict.into_py(py)
        }
        Value::Emf(inner) => Py::new(py, PyEmf { inner })?.into_py(py),
    })
}

/// A calculator node.
#[pyclass(name = "Node")]
pub struct PyNode {
    inner: NodeRef,
}

#[pymethods]
impl PyNode {
    /// Build a node of kind `kind`; keyword arguments are initial inputs.
    #[new]
    #[pyo3(signature = (kind, **config))]
    fn new(kind: &str, config: Option<&Bound<'_, PyDict>>) -> PyResult<Self> {
        let mut cfg = Config::new();
        if let Some(config) = config {
            for (key, value) in config.iter() {
                cfg.insert(key.extract::<String>()?, to_value(&value)?);
            }
        }
        catalog::build(kind, cfg)
            .map(|inner| Self { inner })
            .map_err(to_py_err)
    }

    fn set(&self, name: &str, value: &Bound<'_, PyAny>) -> PyResult<()> {
        self.inner.set(name, to_value(value)?).map_err(to_py_err)
    }

    /// Attribute-style lookup, including `changed` and `changed_<input>`.
    fn get(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        to_py(py, self.inner.lookup(name).map_err(to_py_err)?)
    }

    fn update(&self) -> PyResult<bool> {
        self.inner.update().map_err(to_py_err)
    }

    /// Change flag of input `name`, or the aggregate flag.
    #[pyo3(signature = (name=None))]
    fn changed(&self, name: Option<&str>) -> PyResult<bool> {
        match name {
            Some(name) => self.inner.is_changed(name).map_err(to_py_err),
            None => Ok(self.inner.is_any_changed()),
        }
    }

    #[getter]
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    #[getter]
    fn revision(&self) -> u64 {
        self.inner.revision()
    }

    fn inputs(&self) -> Vec<String> {
        self.inner.input_names()
    }

    fn outputs(&self) -> Vec<String> {
        self.inner.output_names()
    }

    fn __repr__(&self) -> String {
        format!(
            "Node(kind={}, id={}, revision={})",
            self.inner.kind(),
            self.inner.id().raw(),
            self.inner.revision()
        )
    }
}

/// A lineshape curve; call it with an energy.
#[pyclass(name = "Curve")]
pub struct PyCurve {
    inner: Curve,
}

#[pymethods]
impl PyCurve {
    fn __call__(&self, energy: f64) -> f64 {
        self.inner.eval(energy)
    }
}

/// An EMF dataset.
#[pyclass(name = "Emf")]
pub struct PyEmf {
    inner: Arc<EmfData>,
}

#[pymethods]
impl PyEmf {
    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        EmfData::from_json_str(text)
            .map(|data| Self {
                inner: Arc::new(data),
            })
            .map_err(to_py_err)
    }

    fn to_json(&self) -> PyResult<String> {
        self.inner.to_json_string().map_err(to_py_err)
    }

    fn __len__(&self) -> usize {
        self.inner.defects().len()
    }
}

/// Names of the node kinds `Node(...)` accepts.
#[pyfunction]
fn kinds() -> Vec<&'static str> {
    catalog::KINDS.to_vec()
}

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyNode>()?;
    m.add_class::<PyCurve>()?;
    m.add_class::<PyEmf>()?;
    m.add_function(wrap_pyfunction!(kinds, m)?)?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
