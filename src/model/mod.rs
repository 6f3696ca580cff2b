//! Classifiers under evaluation.
//!
//! The harness only needs a [`Classifier`]: something that maps a
//! `(B, 3, 32, 32)` batch to `(B, classes)` logits. Two small reference
//! architectures are provided so checkpoints can be evaluated end to end:
//!
//! | Name     | Parameters                                                        |
//! |----------|-------------------------------------------------------------------|
//! | `linear` | `fc.weight [10, 3072]`, `fc.bias [10]`                            |
//! | `mlp`    | `fc1.weight [H, 3072]`, `fc1.bias [H]`, `fc2.weight [10, H]`, `fc2.bias [10]` |

pub mod checkpoint;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use checkpoint::{Checkpoint, StateDict, Tensor};

/// Flattened input size of one CIFAR image.
pub const INPUT_FEATURES: usize = 3 * 32 * 32;

/// Number of CIFAR-10 classes.
pub const NUM_CLASSES: usize = 10;

/// Batched inference.
///
/// `forward` takes `&self`: evaluation never changes model state.
pub trait Classifier: Send + Sync {
    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Logits for a `(B, C, H, W)` batch, shape `(B, classes)`.
    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>>;
}

/// Known architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Single fully connected layer.
    Linear,
    /// Two fully connected layers with a ReLU between them.
    Mlp,
}

impl Architecture {
    /// All architectures, in display order.
    pub const ALL: [Self; 2] = [Self::Linear, Self::Mlp];

    /// Look up an architecture by name.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "linear" => Ok(Self::Linear),
            "mlp" => Ok(Self::Mlp),
            other => Err(Error::Configuration(format!(
                "unknown architecture '{other}' (expected one of: {})",
                Self::ALL.map(Self::name).join(", ")
            ))),
        }
    }

    /// Architecture name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Mlp => "mlp",
        }
    }

    /// Instantiate the architecture from a state mapping.
    ///
    /// Every parameter must be present with the shape listed in the
    /// [module docs](self).
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] naming the first missing or misshapen
    /// parameter.
    pub fn build(self, state: &StateDict) -> Result<Box<dyn Classifier>> {
        match self {
            Self::Linear => {
                let fc = Dense::from_state(state, "fc", Some(NUM_CLASSES), INPUT_FEATURES)?;
                Ok(Box::new(Linear { fc }))
            }
            Self::Mlp => {
                let fc1 = Dense::from_state(state, "fc1", None, INPUT_FEATURES)?;
                let fc2 = Dense::from_state(state, "fc2", Some(NUM_CLASSES), fc1.outputs())?;
                Ok(Box::new(Mlp { fc1, fc2 }))
            }
        }
    }

    /// Load a checkpoint file and build the architecture from it.
    pub fn load(self, path: &Path) -> Result<Box<dyn Classifier>> {
        let checkpoint = Checkpoint::load(path)?;
        self.build(checkpoint.state())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully connected layer, `y = x W^T + b`.
#[derive(Debug, Clone)]
struct Dense {
    weight: Array2<f32>,
    bias: Array1<f32>,
}

impl Dense {
    /// Read `<prefix>.weight` and `<prefix>.bias`. `outputs = None` accepts
    /// any output width.
    fn from_state(
        state: &StateDict,
        prefix: &str,
        outputs: Option<usize>,
        inputs: usize,
    ) -> Result<Self> {
        let weight_name = format!("{prefix}.weight");
        let bias_name = format!("{prefix}.bias");

        let weight = param(state, &weight_name)?.to_array2()?;
        let out = outputs.unwrap_or(weight.nrows());
        expect_shape(&weight_name, &[out, inputs], weight.shape())?;

        let bias = param(state, &bias_name)?.to_array1()?;
        expect_shape(&bias_name, &[out], bias.shape())?;

        Ok(Self { weight, bias })
    }

    fn outputs(&self) -> usize {
        self.weight.nrows()
    }

    fn forward(&self, x: ArrayView2<'_, f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

fn param<'a>(state: &'a StateDict, name: &str) -> Result<&'a Tensor> {
    state.get(name).ok_or_else(|| Error::ShapeMismatch {
        what: format!("parameter {name}"),
        expected: "present".to_string(),
        actual: "missing".to_string(),
    })
}

fn expect_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            what: format!("parameter {name}"),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        });
    }
    Ok(())
}

/// Flatten `(B, C, H, W)` to `(B, C*H*W)` in row-major order.
fn flatten(batch: ArrayView4<'_, f32>, features: usize) -> Result<Array2<f32>> {
    let rows = batch.len_of(Axis(0));
    let per_image = batch.len() / rows.max(1);
    if per_image != features {
        return Err(Error::ShapeMismatch {
            what: "classifier input features".to_string(),
            expected: features.to_string(),
            actual: format!("{:?}", batch.shape()),
        });
    }
    Array2::from_shape_vec((rows, features), batch.iter().copied().collect())
        .map_err(|e| Error::Shape(e.to_string()))
}

struct Linear {
    fc: Dense,
}

impl Classifier for Linear {
    fn num_classes(&self) -> usize {
        self.fc.outputs()
    }

    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let x = flatten(batch, INPUT_FEATURES)?;
        Ok(self.fc.forward(x.view()))
    }
}

struct Mlp {
    fc1: Dense,
    fc2: Dense,
}

impl Classifier for Mlp {
    fn num_classes(&self) -> usize {
        self.fc2.outputs()
    }

    fn forward(&self, batch: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let x = flatten(batch, INPUT_FEATURES)?;
        let hidden = self.fc1.forward(x.view()).mapv_into(|v| v.max(0.0));
        Ok(self.fc2.forward(hidden.view()))
    }
}
