//! Error types reported by layers, losses and optimizers.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use ember_tensor::{IndexError, ShapeError};

use crate::ops::PaddingMode;

/// A layer was constructed with invalid hyper-parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A size that must be positive (kernel size, stride or dilation) is
    /// zero.
    ZeroSize(&'static str),

    /// The convolution output would have no rows or columns.
    NonPositiveOutput { height: isize, width: isize },

    /// A padding mode string was not recognized.
    UnknownPaddingMode(String),

    /// A padding mode is recognized but not implemented.
    UnsupportedPaddingMode(PaddingMode),

    /// A probability is outside of `[0, 1)`.
    InvalidProbability(f32),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSize(what) => write!(f, "{} must be > 0", what),
            ConfigError::NonPositiveOutput { height, width } => write!(
                f,
                "computed output size {}x{} is not positive",
                height, width
            ),
            ConfigError::UnknownPaddingMode(mode) => {
                write!(f, "unknown padding mode \"{}\"", mode)
            }
            ConfigError::UnsupportedPaddingMode(mode) => {
                write!(f, "padding mode \"{}\" is not supported", mode)
            }
            ConfigError::InvalidProbability(p) => {
                write!(f, "probability {} is outside of [0, 1)", p)
            }
        }
    }
}

impl Error for ConfigError {}

/// Reasons why a forward or backward pass, loss or optimizer step may fail.
#[derive(Clone, Debug, PartialEq)]
pub enum LayerError {
    /// An input has an unexpected shape.
    Shape(ShapeError),

    /// An index is invalid for a tensor.
    Index(IndexError),

    /// A hyper-parameter is invalid for the given input.
    Config(ConfigError),

    /// `backward` was called on a layer with no cached forward pass.
    NoForwardPass(&'static str),

    /// An input has a value that is incorrect.
    InvalidValue(&'static str),
}

impl Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerError::Shape(err) => write!(f, "shape error: {}", err),
            LayerError::Index(err) => write!(f, "index error: {}", err),
            LayerError::Config(err) => write!(f, "config error: {}", err),
            LayerError::NoForwardPass(layer) => {
                write!(f, "{}: backward called before forward", layer)
            }
            LayerError::InvalidValue(details) => write!(f, "invalid value: {}", details),
        }
    }
}

impl Error for LayerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LayerError::Shape(err) => Some(err),
            LayerError::Index(err) => Some(err),
            LayerError::Config(err) => Some(err),
            LayerError::NoForwardPass(_) | LayerError::InvalidValue(_) => None,
        }
    }
}

impl From<ShapeError> for LayerError {
    fn from(err: ShapeError) -> LayerError {
        LayerError::Shape(err)
    }
}

impl From<IndexError> for LayerError {
    fn from(err: IndexError) -> LayerError {
        LayerError::Index(err)
    }
}

impl From<ConfigError> for LayerError {
    fn from(err: ConfigError) -> LayerError {
        LayerError::Config(err)
    }
}
