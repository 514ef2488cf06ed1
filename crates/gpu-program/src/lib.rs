//! Binding and caching of compiled GPU programs.
//!
//! This crate defines the [`NativeBackend`] trait, the seam to the platform
//! shader compiler and linker. On top of it sit:
//!
//! - [`GpuNamedConstants`], the per-stage constant layout,
//! - the binding resolver ([`resolve_bindings`]), which matches reflected
//!   uniforms and blocks to those definitions,
//! - [`SharedBlockRegistry`], the binding-point allocator for named blocks,
//! - [`MicrocodeCache`], the content-addressed store of program binaries.

pub mod backend;
pub mod constants;
pub mod microcode;
pub mod resolver;
pub mod shared;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use backend::*;
pub use constants::{ConstantDefinition, GpuNamedConstants};
pub use microcode::{compute_key, MicrocodeCache};
pub use resolver::{
    extract_uniforms, resolve_bindings, resolve_blocks, BlockBinding, ProgramBindings,
    StageConstants, UniformReference, RESOLUTION_ORDER,
};
pub use shared::{SharedBlock, SharedBlockRegistry};
