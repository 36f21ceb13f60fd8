//! Error types for the powertrain models.

use thiserror::Error;

/// Construction-time errors.
///
/// The per-tick update functions never fail: out-of-range control inputs are
/// clamped or rejected through a boolean return instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PowertrainError {
    /// The tire specification did not match `<width>/<aspect>R<rim>`.
    #[error("Invalid tire specification: {spec:?} (expected <width>/<aspect_ratio>R<rim_diameter>, e.g. 245/40R19)")]
    InvalidTireSpec { spec: String },
}

pub type PowertrainResult<T> = Result<T, PowertrainError>;
