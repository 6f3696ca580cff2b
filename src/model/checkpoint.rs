//! JSON weight checkpoints.
//!
//! A checkpoint maps parameter names to tensors:
//!
//! ```json
//! { "fc.weight": { "shape": [10, 3072], "data": [ ... ] },
//!   "fc.bias":   { "shape": [10], "data": [ ... ] } }
//! ```
//!
//! Training runs often save the mapping under a `"model"` key next to other
//! bookkeeping (`"epoch"`, `"optimizer"`, ...). Both forms load; which one a
//! file uses is decided by looking at the document.

use std::collections::BTreeMap;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Key holding the state mapping in a wrapped checkpoint.
pub const MODEL_KEY: &str = "model";

/// A dense row-major tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    /// Dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Values in row-major order.
    pub data: Vec<f32>,
}

impl Tensor {
    /// Create a tensor, checking that `data` fills `shape`.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if `data.len()` is not the product of `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let tensor = Self { shape, data };
        tensor.validate("tensor")?;
        Ok(tensor)
    }

    /// Number of elements implied by the shape.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    fn validate(&self, name: &str) -> Result<()> {
        let numel = self
            .shape
            .iter()
            .try_fold(1_usize, |acc, &dim| acc.checked_mul(dim));
        if numel != Some(self.data.len()) {
            return Err(Error::ShapeMismatch {
                what: format!("{name} data"),
                expected: numel.map_or_else(
                    || format!("shape {:?} overflows", self.shape),
                    |n| format!("{n} values for shape {:?}", self.shape),
                ),
                actual: self.data.len().to_string(),
            });
        }
        Ok(())
    }

    /// View as a 1-D array.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the tensor is not 1-D.
    pub fn to_array1(&self) -> Result<Array1<f32>> {
        match self.shape.as_slice() {
            [_] => Ok(Array1::from_vec(self.data.clone())),
            other => Err(rank_error(1, other)),
        }
    }

    /// View as a 2-D array.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] if the tensor is not 2-D.
    pub fn to_array2(&self) -> Result<Array2<f32>> {
        match *self.shape.as_slice() {
            [rows, cols] => Array2::from_shape_vec((rows, cols), self.data.clone())
                .map_err(|e| Error::Shape(e.to_string())),
            ref other => Err(rank_error(2, other)),
        }
    }
}

impl From<Array2<f32>> for Tensor {
    fn from(array: Array2<f32>) -> Self {
        let shape = array.shape().to_vec();
        Self {
            shape,
            data: array.iter().copied().collect(),
        }
    }
}

impl From<Array1<f32>> for Tensor {
    fn from(array: Array1<f32>) -> Self {
        Self {
            shape: vec![array.len()],
            data: array.to_vec(),
        }
    }
}

fn rank_error(expected: usize, shape: &[usize]) -> Error {
    Error::ShapeMismatch {
        what: "tensor rank".to_string(),
        expected: expected.to_string(),
        actual: format!("{shape:?}"),
    }
}

/// Parameter name to tensor, sorted by name.
pub type StateDict = BTreeMap<String, Tensor>;

/// A loaded checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Checkpoint {
    /// The document is the state mapping itself.
    Raw(StateDict),
    /// The state mapping sits under `"model"`; other keys are kept as-is.
    Wrapped {
        /// Model parameters.
        model: StateDict,
        /// Every other top-level key.
        extra: Map<String, Value>,
    },
}

impl Checkpoint {
    /// Load a checkpoint file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] / [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if it is not valid JSON
    /// - [`Error::Checkpoint`] if the JSON is neither checkpoint form
    /// - [`Error::ShapeMismatch`] if a tensor's data does not fill its shape
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| Error::from_io(path, e))?;
        let document: Value = serde_json::from_slice(&bytes)?;
        Self::from_value(document).map_err(|e| match e {
            Error::Checkpoint { reason, .. } => Error::Checkpoint {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Interpret an already-parsed JSON document.
    ///
    /// # Errors
    ///
    /// See [`Checkpoint::load`]; the error path is left empty.
    pub fn from_value(document: Value) -> Result<Self> {
        let Value::Object(mut top) = document else {
            return Err(invalid("top level is not an object"));
        };

        let wrapped = top.get(MODEL_KEY).is_some_and(is_state_dict);
        if wrapped {
            let model = top.remove(MODEL_KEY).unwrap_or(Value::Null);
            return Ok(Self::Wrapped {
                model: parse_state(model)?,
                extra: top,
            });
        }
        if top.values().all(is_tensor) {
            return Ok(Self::Raw(parse_state(Value::Object(top))?));
        }
        Err(invalid(
            "expected a mapping of tensors, or one under a \"model\" key",
        ))
    }

    /// Model parameters.
    #[must_use]
    pub fn state(&self) -> &StateDict {
        match self {
            Self::Raw(state) | Self::Wrapped { model: state, .. } => state,
        }
    }

    /// Take the model parameters.
    #[must_use]
    pub fn into_state(self) -> StateDict {
        match self {
            Self::Raw(state) | Self::Wrapped { model: state, .. } => state,
        }
    }

    /// Write the checkpoint as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let document = match self {
            Self::Raw(state) => serde_json::to_value(state)?,
            Self::Wrapped { model, extra } => {
                let mut top = extra.clone();
                top.insert(MODEL_KEY.to_string(), serde_json::to_value(model)?);
                Value::Object(top)
            }
        };
        std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
        Ok(())
    }
}

fn is_tensor(value: &Value) -> bool {
    value.as_object().is_some_and(|o| {
        o.len() == 2
            && o.get("shape").is_some_and(Value::is_array)
            && o.get("data").is_some_and(Value::is_array)
    })
}

fn is_state_dict(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.values().all(is_tensor))
}

fn parse_state(value: Value) -> Result<StateDict> {
    let state: StateDict =
        serde_json::from_value(value).map_err(|e| invalid(&format!("bad tensor: {e}")))?;
    for (name, tensor) in &state {
        tensor.validate(name)?;
    }
    Ok(state)
}

fn invalid(reason: &str) -> Error {
    Error::Checkpoint {
        path: Default::default(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tensor_json() -> Value {
        json!({ "shape": [2], "data": [0.5, -1.0] })
    }

    #[test]
    fn test_raw_checkpoint() {
        let ckpt = Checkpoint::from_value(json!({ "fc.bias": tensor_json() })).unwrap();
        assert!(matches!(ckpt, Checkpoint::Raw(_)));
        assert_eq!(ckpt.state()["fc.bias"].data, vec![0.5, -1.0]);
    }

    #[test]
    fn test_wrapped_checkpoint_keeps_extra() {
        let doc = json!({
            "epoch": 199,
            "model": { "fc.bias": tensor_json() },
        });
        let ckpt = Checkpoint::from_value(doc).unwrap();
        match &ckpt {
            Checkpoint::Wrapped { model, extra } => {
                assert!(model.contains_key("fc.bias"));
                assert_eq!(extra["epoch"], json!(199));
                assert!(!extra.contains_key("model"));
            }
            Checkpoint::Raw(_) => panic!("expected wrapped"),
        }
    }

    #[test]
    fn test_parameter_named_model_is_raw() {
        let ckpt = Checkpoint::from_value(json!({ "model": tensor_json() })).unwrap();
        assert!(matches!(ckpt, Checkpoint::Raw(_)));
    }

    #[test]
    fn test_neither_form() {
        for doc in [json!([1, 2]), json!({ "epoch": 3 }), json!({ "model": 5 })] {
            assert!(matches!(
                Checkpoint::from_value(doc),
                Err(Error::Checkpoint { .. })
            ));
        }
    }

    #[test]
    fn test_data_must_fill_shape() {
        let doc = json!({ "w": { "shape": [2, 2], "data": [1.0, 2.0, 3.0] } });
        assert!(matches!(
            Checkpoint::from_value(doc),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let doc = json!({ "w": { "shape": [4611686018427387904_u64, 8], "data": [1.0] } });
        let err = Checkpoint::from_value(doc).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(Checkpoint::load(&missing), Err(Error::NotFound { .. })));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "{not json").unwrap();
        assert!(matches!(Checkpoint::load(&garbage), Err(Error::Json(_))));

        let other = dir.path().join("other.json");
        std::fs::write(&other, r#"{"epoch": 1}"#).unwrap();
        match Checkpoint::load(&other) {
            Err(Error::Checkpoint { path, .. }) => assert_eq!(path, other),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ckpt.json");
        let mut model = StateDict::new();
        model.insert("b".to_string(), Tensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap());
        let mut extra = Map::new();
        extra.insert("epoch".to_string(), json!(7));
        let ckpt = Checkpoint::Wrapped { model, extra };
        ckpt.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap(), ckpt);
    }

    #[test]
    fn test_tensor_conversions() {
        let t = Tensor::new(vec![2, 3], (0..6).map(|v| v as f32).collect()).unwrap();
        let a = t.to_array2().unwrap();
        assert_eq!(a[[1, 0]], 3.0);
        assert!(t.to_array1().is_err());
        assert_eq!(Tensor::from(a), t);
        assert!(Tensor::new(vec![2], vec![1.0]).is_err());
    }
}
