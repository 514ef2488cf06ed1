//! Shader generation helpers for consumer `build.rs` scripts.
//!
//! Programs built with the program model can be written out at build time
//! and embedded in the final binary:
//!
//! ```rust,ignore
//! // build.rs
//! fn main() -> anyhow::Result<()> {
//!     let mut programs = vec![my_shaders::blit_vs(), my_shaders::blit_ps()];
//!     let paths = shadergen::build_support::emit_program_sources(
//!         &mut programs,
//!         shadergen::WriterOptions { glsl_version: 450, ..Default::default() },
//!     )?;
//!     for path in &paths {
//!         shadergen::build_support::validate_glsl_file(path)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ```rust,ignore
//! // src/lib.rs
//! let vs = shadergen::include_generated_shader!("blit_vs.glsl");
//! ```

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use shadergen_core::{GpuProgramType, Program, ShaderError, ShaderLanguage};
use tracing::debug;

use crate::writer::{writer_for, WriterOptions};

// ---------------------------------------------------------------------------
// Source emission
// ---------------------------------------------------------------------------

/// Write every program to `OUT_DIR/<name>.<ext>`.
pub fn emit_program_sources(programs: &mut [Program], options: WriterOptions) -> Result<Vec<PathBuf>> {
    let out_dir = std::env::var_os("OUT_DIR")
        .ok_or_else(|| anyhow!("OUT_DIR is not set; call this from a build script"))?;
    emit_program_sources_to(Path::new(&out_dir), programs, options)
}

/// Write every program to `dir/<name>.<ext>`.
pub fn emit_program_sources_to(
    dir: &Path,
    programs: &mut [Program],
    options: WriterOptions,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(programs.len());
    for program in programs.iter_mut() {
        program.validate()?;
        let language = program.language();
        let source = writer_for(language, options)
            .write_program(program)
            .with_context(|| format!("failed to generate program '{}'", program.name()))?;

        let path = dir.join(format!("{}.{}", program.name(), language.extension()));
        fs::write(&path, &source)
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), bytes = source.len(), "wrote generated shader");
        paths.push(path);
    }
    Ok(paths)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn naga_stage(program_type: GpuProgramType) -> Result<naga::ShaderStage, ShaderError> {
    match program_type {
        GpuProgramType::Vertex => Ok(naga::ShaderStage::Vertex),
        GpuProgramType::Fragment => Ok(naga::ShaderStage::Fragment),
        GpuProgramType::Compute => Ok(naga::ShaderStage::Compute),
        other => Err(ShaderError::UnsupportedStage(other.name())),
    }
}

/// Binding numbers already written as `binding = N` anywhere in `source`.
fn explicit_bindings(source: &str) -> BTreeSet<u32> {
    let mut used = BTreeSet::new();
    let mut rest = source;
    while let Some(pos) = rest.find("binding") {
        rest = &rest[pos + "binding".len()..];
        let Some(value) = rest.trim_start().strip_prefix('=') else {
            continue;
        };
        let value = value.trim_start();
        let digits = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
        if let Ok(binding) = value[..digits].parse() {
            used.insert(binding);
        }
    }
    used
}

/// Give every top-level `uniform` declaration without a layout an explicit
/// binding, numbering from the lowest binding the source leaves free.
///
/// Drivers assign loose uniforms their own locations, but naga only accepts
/// resources with a binding. Lines are rewritten in place so diagnostics
/// keep their line numbers.
fn bind_loose_uniforms(source: &str) -> String {
    let used = explicit_bindings(source);
    let mut next = 0u32;
    let mut out = String::with_capacity(source.len());
    for line in source.lines() {
        let body = line.trim_start();
        if body.starts_with("uniform") && body["uniform".len()..].starts_with(char::is_whitespace) {
            while used.contains(&next) {
                next += 1;
            }
            out.push_str(&line[..line.len() - body.len()]);
            out.push_str(&format!("layout(binding = {next}) "));
            out.push_str(body);
            next += 1;
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Parse and validate generated GLSL (version 440 or later).
pub fn validate_glsl(name: &str, program_type: GpuProgramType, source: &str) -> Result<()> {
    let stage = naga_stage(program_type)?;
    let source = bind_loose_uniforms(source);
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(stage), &source)
        .map_err(|e| anyhow!("failed to parse GLSL '{name}':\n{}", e.emit_to_string(&source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| anyhow!("GLSL validation failed for '{name}': {e}"))?;
    Ok(())
}

/// [`validate_glsl`] on a file written by [`emit_program_sources`]. The
/// stage is taken from the conventional `_vs`/`_ps`/`_cs` name suffix.
pub fn validate_glsl_file(path: &Path) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some(ShaderLanguage::Glsl.extension()) {
        return Ok(());
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("bad shader file name {}", path.display()))?;
    let program_type = if stem.ends_with("_vs") {
        GpuProgramType::Vertex
    } else if stem.ends_with("_ps") || stem.ends_with("_fs") {
        GpuProgramType::Fragment
    } else if stem.ends_with("_cs") {
        GpuProgramType::Compute
    } else {
        return Err(anyhow!("cannot tell the stage of {}", path.display()));
    };

    println!("cargo:rerun-if-changed={}", path.display());
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    validate_glsl(stem, program_type, &source)
}

/// Embed a source written by [`emit_program_sources`].
///
/// ```rust,ignore
/// const BLIT_VS: &str = shadergen::include_generated_shader!("blit_vs.glsl");
/// ```
#[macro_export]
macro_rules! include_generated_shader {
    ($file:literal) => {
        include_str!(concat!(env!("OUT_DIR"), "/", $file))
    };
}
