//! Language-independent model of generated shader programs.
//!
//! A [`Program`] is one pipeline stage: a set of [`Function`]s, the
//! [`UniformParameter`]s they read and the source files they depend on.
//! Writers in the `shadergen` crate turn it into GLSL or HLSL; the
//! `gpu-program` crate binds its constants after compilation.

mod capabilities;
mod constant_type;
mod error;
mod function;
mod language;
pub mod logging;
mod parameter;
mod program;

pub use capabilities::*;
pub use constant_type::*;
pub use error::*;
pub use function::*;
pub use language::*;
pub use parameter::*;
pub use program::*;
