//! Variable Values
//!
//! The values stored in a node's input and output slots. A slot can hold a
//! plain number, a grid, a table keyed by transition name, a reference to a
//! child node, or a curve published by a lineshape.
//!
//! Large payloads sit behind `Arc` so reading a slot is a cheap clone.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::emf::{EmfData, ReservoirSet};
use crate::error::{ConfigurationError, NodeError, Result};

use super::handle::NodeRef;

/// Table keyed by name, e.g. transition -> rate.
pub type Table = IndexMap<String, f64>;

/// A function of energy published by a lineshape node.
#[derive(Clone)]
pub struct Curve(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl Curve {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Evaluate the curve at energy `energy`.
    pub fn eval(&self, energy: f64) -> f64 {
        (self.0)(energy)
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Curve(..)")
    }
}

/// Dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Build a matrix from rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Self {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }
}

/// The content of a variable slot.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Initial state of a slot nobody has written yet.
    #[default]
    Unset,
    Bool(bool),
    Scalar(f64),
    Array(Arc<Vec<f64>>),
    Matrix(Arc<Matrix>),
    Table(Arc<Table>),
    Node(NodeRef),
    Curve(Curve),
    Reservoirs(Arc<ReservoirSet>),
    Emf(Arc<EmfData>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unset => "nothing",
            Value::Bool(_) => "a flag",
            Value::Scalar(_) => "a scalar",
            Value::Array(_) => "an array",
            Value::Matrix(_) => "a matrix",
            Value::Table(_) => "a table",
            Value::Node(_) => "a node",
            Value::Curve(_) => "a curve",
            Value::Reservoirs(_) => "a reservoir set",
            Value::Emf(_) => "an EMF dataset",
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<Vec<f64>>> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Arc<Table>> {
        match self {
            Value::Table(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_curve(&self) -> Option<&Curve> {
        match self {
            Value::Curve(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn mismatch(&self, name: &str, expected: &'static str) -> NodeError {
        ConfigurationError::TypeMismatch {
            name: name.to_string(),
            expected,
            found: self.kind(),
        }
        .into()
    }

    /// Scalar content of slot `name`, or a type mismatch error.
    pub fn expect_scalar(&self, name: &str) -> Result<f64> {
        self.as_scalar().ok_or_else(|| self.mismatch(name, "a scalar"))
    }

    pub fn expect_array(&self, name: &str) -> Result<Arc<Vec<f64>>> {
        self.as_array()
            .cloned()
            .ok_or_else(|| self.mismatch(name, "an array"))
    }

    pub fn expect_matrix(&self, name: &str) -> Result<Arc<Matrix>> {
        match self {
            Value::Matrix(m) => Ok(Arc::clone(m)),
            _ => Err(self.mismatch(name, "a matrix")),
        }
    }

    pub fn expect_table(&self, name: &str) -> Result<Arc<Table>> {
        self.as_table()
            .cloned()
            .ok_or_else(|| self.mismatch(name, "a table"))
    }

    pub fn expect_node(&self, name: &str) -> Result<NodeRef> {
        self.as_node()
            .cloned()
            .ok_or_else(|| self.mismatch(name, "a node"))
    }

    pub fn expect_curve(&self, name: &str) -> Result<Curve> {
        self.as_curve()
            .cloned()
            .ok_or_else(|| self.mismatch(name, "a curve"))
    }

    pub fn expect_reservoirs(&self, name: &str) -> Result<Arc<ReservoirSet>> {
        match self {
            Value::Reservoirs(r) => Ok(Arc::clone(r)),
            _ => Err(self.mismatch(name, "a reservoir set")),
        }
    }

    pub fn expect_emf(&self, name: &str) -> Result<Arc<EmfData>> {
        match self {
            Value::Emf(e) => Ok(Arc::clone(e)),
            _ => Err(self.mismatch(name, "an EMF dataset")),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Array(Arc::new(v))
    }
}

impl From<Matrix> for Value {
    fn from(v: Matrix) -> Self {
        Value::Matrix(Arc::new(v))
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Table(Arc::new(v))
    }
}

impl From<NodeRef> for Value {
    fn from(v: NodeRef) -> Self {
        Value::Node(v)
    }
}

impl From<&NodeRef> for Value {
    fn from(v: &NodeRef) -> Self {
        Value::Node(v.clone())
    }
}

impl From<Curve> for Value {
    fn from(v: Curve) -> Self {
        Value::Curve(v)
    }
}

impl From<ReservoirSet> for Value {
    fn from(v: ReservoirSet) -> Self {
        Value::Reservoirs(Arc::new(v))
    }
}

impl From<EmfData> for Value {
    fn from(v: EmfData) -> Self {
        Value::Emf(Arc::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_rejects_ragged_rows() {
        assert!(Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_none());

        let m = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!((m.rows(), m.cols()), (2, 3));
        assert_eq!(m.get(1, 2), 6.0);
    }

    #[test]
    fn typed_access_reports_mismatch() {
        let value = Value::from(vec![1.0, 2.0]);
        assert!(value.expect_array("grid").is_ok());

        let err = value.expect_scalar("grid").unwrap_err();
        assert_eq!(
            err,
            NodeError::Configuration(ConfigurationError::TypeMismatch {
                name: "grid".into(),
                expected: "a scalar",
                found: "an array",
            })
        );
    }

    #[test]
    fn curve_evaluates_closure() {
        let curve = Curve::new(|e| 2.0 * e);
        assert_eq!(curve.eval(1.5), 3.0);
        assert!(Value::from(curve).as_curve().is_some());
    }

    #[test]
    fn default_is_unset() {
        assert!(Value::default().is_unset());
    }
}
