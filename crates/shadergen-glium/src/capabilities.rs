//! Capability detection from a live glium context.

use std::{collections::BTreeSet, ffi::CStr};

use gl::types::GLint;
use glium::{Api, CapabilitiesSource, Version};
use shadergen_core::{GpuVendor, RenderCapabilities};
use tracing::debug;

/// Syntax codes (`"glsl330"`, `"glsles300"`) for the GLSL versions a
/// context accepts.
pub fn glsl_syntaxes(versions: &[Version]) -> BTreeSet<String> {
    versions
        .iter()
        .map(|Version(api, major, minor)| match api {
            Api::Gl => format!("glsl{major}{minor}0"),
            Api::GlEs => format!("glsles{major}{minor}0"),
        })
        .collect()
}

/// Snapshot the capabilities of the context behind `ctx`.
///
/// # Safety
///
/// The OpenGL context of `ctx` must be current on this thread and GL
/// function pointers must be loaded.
pub unsafe fn render_capabilities(ctx: &impl CapabilitiesSource) -> RenderCapabilities {
    let Version(_, major, minor) = *ctx.get_version();
    let caps = ctx.get_capabilities();

    let mut result = RenderCapabilities::new(u32::from(major), u32::from(minor))
        .with_vendor(GpuVendor::from_vendor_string(&caps.vendor));
    result.syntaxes = glsl_syntaxes(&caps.supported_glsl_versions);
    result.extensions = query_extensions();

    debug!(
        version = ?result.version,
        vendor = ?result.vendor,
        syntaxes = ?result.syntaxes,
        extensions = result.extensions.len(),
        "detected render capabilities"
    );
    result
}

/// Names of every extension the current context exposes.
///
/// # Safety
///
/// Must be called with a valid OpenGL 3.0+ context current on this thread.
pub unsafe fn query_extensions() -> BTreeSet<String> {
    let mut count: GLint = 0;
    gl::GetIntegerv(gl::NUM_EXTENSIONS, &mut count);

    let mut extensions = BTreeSet::new();
    for i in 0..count.max(0) as u32 {
        let name = gl::GetStringi(gl::EXTENSIONS, i);
        if name.is_null() {
            continue;
        }
        extensions.insert(CStr::from_ptr(name.cast()).to_string_lossy().into_owned());
    }
    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_codes() {
        let syntaxes = glsl_syntaxes(&[
            Version(Api::Gl, 1, 4),
            Version(Api::Gl, 4, 3),
            Version(Api::GlEs, 3, 0),
        ]);
        let expected: BTreeSet<String> = ["glsl140", "glsl430", "glsles300"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(syntaxes, expected);
    }
}
