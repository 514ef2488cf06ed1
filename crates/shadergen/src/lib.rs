//! Shader generation and GPU program management.
//!
//! This crate ties together [`shadergen_core`] (the program model) and
//! [`gpu_program`] (binding resolution and the microcode cache) into the
//! pieces an application drives:
//!
//! - [`ProgramWriter`] implementations turn a [`Program`] into GLSL or HLSL.
//! - [`ShaderContext`] compiles stages, links them, resolves their bindings
//!   and keeps linked binaries in the [`MicrocodeCache`].
//! - [`resolve_includes`] inlines `#include` directives through a
//!   [`ResourceProvider`].
//! - [`build_support`] writes generated sources from a `build.rs`.
//!
//! With the `gl` feature (on by default) the OpenGL backend is available as
//! [`gl::GlBackend`].

pub mod build_support;
pub mod context;
pub mod includes;
pub mod stage;
pub mod writer;

pub use context::{ContextConfig, ShaderContext};
pub use includes::{resolve_includes, DirectoryResources, MemoryResources, ResourceProvider};
pub use stage::{GpuProgram, LinkedProgram, StageId, StageSet};
pub use writer::{writer_for, GlslWriter, HlslWriter, ProgramWriter, WriterOptions};

pub use gpu_program::{MicrocodeCache, SharedBlockRegistry};
pub use shadergen_core::{Program, ShaderError, ShaderLanguage};

#[cfg(feature = "gl")]
pub use shadergen_glium as gl;

/// A context driving the OpenGL backend.
#[cfg(feature = "gl")]
pub type GlShaderContext = ShaderContext<shadergen_glium::GlBackend>;
