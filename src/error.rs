//! Error type shared by the transform engine and the sweep harness.

use core::fmt;
use std::io;

use crate::plan::Strategy;

/// Failures raised while configuring or running a sweep.
#[derive(Debug)]
pub enum FlagsError {
    /// Bad command-line arguments or non-positive sizes. Fatal.
    InvalidConfiguration(String),
    /// A precomputation strategy could not build its tables. The sweep
    /// drops that strategy for the current configuration and carries on.
    VariantConstructionFailure { strategy: Strategy, reason: String },
    /// Two sample arrays (or an input and its geometry) disagree in length.
    LengthMismatch { expected: usize, actual: usize },
    /// Writing the report failed.
    Io(io::Error),
}

impl FlagsError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FlagsError::InvalidConfiguration(msg.into())
    }

    /// Whether the sweep may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FlagsError::VariantConstructionFailure { .. })
    }
}

impl fmt::Display for FlagsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagsError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {}", msg),
            FlagsError::VariantConstructionFailure { strategy, reason } => {
                write!(f, "precomputation for {} failed: {}", strategy, reason)
            }
            FlagsError::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {}, got {}", expected, actual)
            }
            FlagsError::Io(err) => write!(f, "i/o error: {}", err),
        }
    }
}

impl std::error::Error for FlagsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlagsError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for FlagsError {
    fn from(err: io::Error) -> Self {
        FlagsError::Io(err)
    }
}
