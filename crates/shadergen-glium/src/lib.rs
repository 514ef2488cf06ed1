//! OpenGL backend for shader program management, built on the `gl` crate and
//! a `glium` context.
//!
//! Use [`GlBackend`] as the [`gpu_program::NativeBackend`] of a shader
//! context, and [`capabilities::render_capabilities`] to describe what the
//! context can do.
//!
//! ### Warning
//!
//! Every call goes straight to the driver. The OpenGL context must be
//! current on the calling thread.

pub mod capabilities;
mod gl_backend;
pub mod gl_state;

pub use capabilities::render_capabilities;
pub use gl_backend::{constant_type_from_gl, GlBackend};
