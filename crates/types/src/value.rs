//! Opaque values exchanged between the engine and operation kernels.

use indexmap::IndexMap;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// A value passed into or produced by an operation kernel.
///
/// The engine treats these as opaque: it moves them between steps and hands
/// them to kernels without inspecting image contents. Kernels agree among
/// themselves on the variants they exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpValue {
    /// Dense floating-point image buffer of arbitrary dimensionality.
    Image(ArrayD<f32>),
    /// Floating-point scalar, e.g. a rotation angle in radians.
    Scalar(f64),
    /// Integer scalar, e.g. a magnification factor or border width.
    Int(i64),
    /// Boolean flag, e.g. an intensity-weighting toggle.
    Bool(bool),
    /// Free-form text, e.g. an interpolation mode name.
    Text(String),
}

impl OpValue {
    /// Returns the image buffer if this value is an image.
    pub fn as_image(&self) -> Option<&ArrayD<f32>> {
        match self {
            OpValue::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Returns the scalar if this value is a float.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            OpValue::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    /// Returns the integer if this value is an int.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OpValue::Int(int) => Some(*int),
            _ => None,
        }
    }

    /// Returns the flag if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OpValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Returns the text if this value is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OpValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for OpValue {
    fn from(image: ArrayD<f32>) -> Self {
        OpValue::Image(image)
    }
}

impl From<f64> for OpValue {
    fn from(scalar: f64) -> Self {
        OpValue::Scalar(scalar)
    }
}

impl From<i64> for OpValue {
    fn from(int: i64) -> Self {
        OpValue::Int(int)
    }
}

impl From<bool> for OpValue {
    fn from(flag: bool) -> Self {
        OpValue::Bool(flag)
    }
}

impl From<&str> for OpValue {
    fn from(text: &str) -> Self {
        OpValue::Text(text.to_string())
    }
}

/// Keyword arguments for a kernel invocation, in authoring order.
pub type KwArgs = IndexMap<String, OpValue>;
