//! Inspect the error state of the OpenGL context.

use gl::types::GLenum;
use tracing::warn;

/// Symbolic name of a `glGetError` code.
pub fn gl_error_name(code: GLenum) -> &'static str {
    match code {
        gl::NO_ERROR => "GL_NO_ERROR",
        gl::INVALID_ENUM => "GL_INVALID_ENUM",
        gl::INVALID_VALUE => "GL_INVALID_VALUE",
        gl::INVALID_OPERATION => "GL_INVALID_OPERATION",
        gl::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        gl::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        gl::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        gl::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "unknown GL error",
    }
}

/// Pop every pending error flag.
///
/// # Safety
///
/// Must be called with a valid OpenGL context current on this thread.
pub unsafe fn drain_gl_errors() -> Vec<GLenum> {
    let mut errors = Vec::new();
    // Bounded: a lost context can report errors forever.
    for _ in 0..32 {
        let code = gl::GetError();
        if code == gl::NO_ERROR {
            break;
        }
        errors.push(code);
    }
    errors
}

/// Drain pending errors and log them against `operation`.
///
/// Returns `true` if the context was clean.
///
/// # Safety
///
/// Must be called with a valid OpenGL context current on this thread.
pub unsafe fn log_gl_errors(operation: &str) -> bool {
    let errors = drain_gl_errors();
    for &code in &errors {
        warn!(%operation, code, error = gl_error_name(code), "OpenGL error");
    }
    errors.is_empty()
}
