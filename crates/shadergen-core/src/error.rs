//! Error taxonomy shared by every shader-generation crate.

use thiserror::Error;

use crate::{ConstantType, ShaderLanguage};

/// Fatal failures of generation, compilation, linking and model construction.
///
/// Non-fatal conditions (a semantic without a mapping string, a stale cached
/// binary) are reported as `tracing` warnings instead.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to compile '{program}':\n{log}")]
    Compile { program: String, log: String },

    #[error("failed to link '{program}':\n{log}")]
    Link { program: String, log: String },

    #[error("constant type {ty:?} has no {language} type name")]
    UnknownType {
        ty: ConstantType,
        language: ShaderLanguage,
    },

    #[error("resource '{name}' not found")]
    ResourceNotFound { name: String },

    #[error("parameter '{name}' already declared in {scope}")]
    DuplicateParameter { name: String, scope: String },

    #[error("invalid array dimensions {dims:?} for '{name}'")]
    InvalidArrayDimensions { name: String, dims: Vec<usize> },

    #[error("invalid program: {0}")]
    InvalidProgram(String),

    #[error("{0} stage is not supported by this backend")]
    UnsupportedStage(&'static str),
}

pub type Result<T, E = ShaderError> = std::result::Result<T, E>;
