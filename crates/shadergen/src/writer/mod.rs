//! Source generation from the program model.
//!
//! One [`ProgramWriter`] exists per target language. Writers are
//! deterministic: the same program always produces byte-identical text.

mod glsl;
mod hlsl;

use std::{collections::HashMap, ops::Deref};

use shadergen_core::{
    AtomKind, BinaryOperator, Capabilities, ConstantType, FunctionAtom, FunctionId, GpuVendor,
    Literal, Operand, OperandTarget, ParamId, ParamRef, Parameter, Program, ScalarKind,
    ShaderError, ShaderLanguage,
};

pub use glsl::GlslWriter;
pub use hlsl::HlslWriter;

/// Knobs that select between code-generation branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// GLSL `#version` number (`120`, `330`, `430`, ...).
    pub glsl_version: u32,
    /// Vertex attributes get `layout(location = N)` by semantic.
    pub explicit_attrib_locations: bool,
    /// Samplers get `layout(binding = N)` from their uniform index.
    pub explicit_sampler_bindings: bool,
    /// HLSL uses the v4 binding model: separate texture (`tN`) and sampler
    /// state (`sN`) registers and `SV_` semantics.
    pub hlsl4: bool,
    /// Geometry entry points take their output struct as `inout`.
    pub geometry_inout_outputs: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            glsl_version: 330,
            explicit_attrib_locations: true,
            explicit_sampler_bindings: false,
            hlsl4: true,
            geometry_inout_outputs: true,
        }
    }
}

const GLSL_VERSIONS: [u32; 12] = [460, 450, 440, 430, 420, 410, 400, 330, 150, 140, 130, 120];

impl WriterOptions {
    /// Options matching what a render system supports.
    pub fn from_capabilities(caps: &dyn Capabilities) -> Self {
        let glsl_version = GLSL_VERSIONS
            .into_iter()
            .find(|v| caps.is_syntax_supported(&format!("glsl{v}")))
            .unwrap_or(120);
        let hlsl4 = caps.is_syntax_supported("vs_4_0");
        // Intel drivers mis-assign explicit sampler bindings.
        let explicit_sampler_bindings = (glsl_version >= 420
            || caps.check_extension("GL_ARB_shading_language_420pack"))
            && caps.vendor() != GpuVendor::Intel;

        Self {
            glsl_version,
            explicit_attrib_locations: glsl_version >= 330
                || caps.check_extension("GL_ARB_explicit_attrib_location"),
            explicit_sampler_bindings,
            hlsl4,
            geometry_inout_outputs: hlsl4,
        }
    }
}

/// Turns a [`Program`] into source text for one language.
pub trait ProgramWriter {
    fn language(&self) -> ShaderLanguage;

    /// Generate the complete source of `program`.
    ///
    /// The program is borrowed mutably because parameter parent names are
    /// assigned while a function is written; they are restored before this
    /// returns.
    fn write_program(&self, program: &mut Program) -> Result<String, ShaderError>;
}

/// Writer for `language`.
pub fn writer_for(language: ShaderLanguage, options: WriterOptions) -> Box<dyn ProgramWriter> {
    match language {
        ShaderLanguage::Glsl => Box::new(GlslWriter::new(options)),
        ShaderLanguage::Hlsl => Box::new(HlslWriter::new(options)),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub(crate) fn type_name(language: ShaderLanguage, ty: ConstantType) -> Result<&'static str, ShaderError> {
    language
        .type_name(ty)
        .ok_or(ShaderError::UnknownType { ty, language })
}

pub(crate) fn check_language(program: &Program, language: ShaderLanguage) -> Result<(), ShaderError> {
    if program.language() == language {
        Ok(())
    } else {
        Err(ShaderError::InvalidProgram(format!(
            "'{}' targets {}, not {language}",
            program.name(),
            program.language()
        )))
    }
}

/// One `[n]` per leading non-zero dimension.
pub(crate) fn array_suffix(param: &Parameter) -> String {
    param.leading_array_dims().map(|d| format!("[{d}]")).collect()
}

/// Functions in emission order: internal functions first, each group in
/// creation order.
pub(crate) fn emission_order(program: &Program) -> Vec<FunctionId> {
    let (mut internal, main): (Vec<_>, Vec<_>) = program
        .functions()
        .partition(|(_, f)| !f.ty().is_main());
    internal.extend(main);
    internal.into_iter().map(|(id, _)| id).collect()
}

/// A declaration line split into columns for alignment.
pub(crate) struct Row {
    pub ty: String,
    pub name: String,
    /// Text after ` : `; empty for none.
    pub annotation: String,
}

/// Write rows with type and name columns padded to the widest entry.
pub(crate) fn write_aligned(out: &mut String, indent: &str, rows: &[Row]) {
    let type_width = rows.iter().map(|r| r.ty.len()).max().unwrap_or(0);
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in rows {
        if row.annotation.is_empty() {
            out.push_str(&format!("{indent}{:<type_width$} {};\n", row.ty, row.name));
        } else {
            out.push_str(&format!(
                "{indent}{:<type_width$} {:<name_width$} : {};\n",
                row.ty, row.name, row.annotation
            ));
        }
    }
}

/// Assigns struct parent names to parameters for as long as it lives.
pub(crate) struct ParentScope<'a> {
    program: &'a mut Program,
    ids: Vec<ParamId>,
}

impl<'a> ParentScope<'a> {
    pub fn new(program: &'a mut Program, groups: &[(&[ParamId], &str)]) -> Self {
        let mut ids = Vec::new();
        for (group, parent) in groups {
            program.set_parent_name(group, Some(parent));
            ids.extend_from_slice(group);
        }
        Self { program, ids }
    }
}

impl Deref for ParentScope<'_> {
    type Target = Program;

    fn deref(&self) -> &Program {
        self.program
    }
}

impl Drop for ParentScope<'_> {
    fn drop(&mut self) {
        self.program.set_parent_name(&self.ids, None);
    }
}

/// Texture sampling call style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SampleSyntax {
    /// `texture(s, uv)`
    Glsl,
    /// `texture2D(s, uv)`
    GlslLegacy,
    /// `tex2D(s, uv)`
    HlslLegacy,
    /// `s.Sample(sState, uv)`
    HlslV4,
}

/// Renders function atoms as statements.
pub(crate) struct AtomRenderer<'a> {
    pub program: &'a Program,
    pub sample: SampleSyntax,
    /// Parameters that map onto language built-ins (`gl_Position`).
    pub builtins: HashMap<ParamId, &'static str>,
}

/// Float literal text; shading languages have no NaN or infinity literal.
fn float_text(value: f32) -> Result<String, ShaderError> {
    if value.is_finite() {
        Ok(format!("{value:?}"))
    } else {
        Err(ShaderError::InvalidProgram(format!(
            "literal {value} has no shader representation"
        )))
    }
}

impl AtomRenderer<'_> {
    fn operand(&self, operand: &Operand) -> Result<String, ShaderError> {
        let base = match &operand.target {
            OperandTarget::Param(ParamRef::Function(id)) => match self.builtins.get(id) {
                Some(builtin) => (*builtin).to_owned(),
                None => self.program.param(*id).qualified_name(),
            },
            OperandTarget::Param(param) => self.program.resolve_ref(*param).qualified_name(),
            OperandTarget::Literal(literal) => return self.literal(literal),
        };
        Ok(format!("{base}{}", operand.mask.swizzle()))
    }

    fn literal(&self, literal: &Literal) -> Result<String, ShaderError> {
        Ok(match literal {
            Literal::Float(v) => float_text(*v)?,
            Literal::Int(v) => v.to_string(),
            Literal::Vec(values) => {
                let ty = u32::try_from(values.len())
                    .ok()
                    .and_then(|n| ConstantType::vector(ScalarKind::Float, n))
                    .ok_or_else(|| {
                        ShaderError::InvalidProgram(format!(
                            "vector literal with {} components",
                            values.len()
                        ))
                    })?;
                let args = values
                    .iter()
                    .map(|v| float_text(*v))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{}({})", type_name(self.program.language(), ty)?, args.join(", "))
            }
        })
    }

    fn sample_call(&self, sampler: &Operand, coords: &str) -> Result<String, ShaderError> {
        let name = self.operand(sampler)?;
        let ty = match &sampler.target {
            OperandTarget::Param(param) => self.program.resolve_ref(*param).ty(),
            OperandTarget::Literal(_) => {
                return Err(ShaderError::InvalidProgram(
                    "texture sample from a literal".to_owned(),
                ))
            }
        };
        let suffix = match ty {
            ConstantType::Sampler1D | ConstantType::Sampler1DShadow => "1D",
            ConstantType::Sampler2D | ConstantType::Sampler2DShadow => "2D",
            ConstantType::Sampler3D => "3D",
            ConstantType::SamplerCube => "Cube",
            ConstantType::Sampler1DArray => "1DArray",
            ConstantType::Sampler2DArray => "2DArray",
            _ => {
                return Err(ShaderError::InvalidProgram(format!(
                    "'{name}' of type {ty:?} cannot be sampled"
                )))
            }
        };
        Ok(match self.sample {
            SampleSyntax::Glsl => format!("texture({name}, {coords})"),
            SampleSyntax::GlslLegacy if ty.is_shadow_sampler() => {
                format!("shadow{suffix}({name}, {coords})")
            }
            SampleSyntax::GlslLegacy => format!("texture{suffix}({name}, {coords})"),
            SampleSyntax::HlslLegacy => {
                format!("tex{}({name}, {coords})", suffix.to_ascii_uppercase())
            }
            SampleSyntax::HlslV4 => format!("{name}.Sample({name}State, {coords})"),
        })
    }

    /// One statement, without indentation or newline.
    pub fn statement(&self, atom: &FunctionAtom) -> Result<String, ShaderError> {
        Ok(match &atom.kind {
            AtomKind::Invoke { function, operands } => {
                let args = operands
                    .iter()
                    .map(|o| self.operand(o))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("{function}({});", args.join(", "))
            }
            AtomKind::Assign { dst, src } => {
                format!("{} = {};", self.operand(dst)?, self.operand(src)?)
            }
            AtomKind::Binary { op, dst, lhs, rhs } => {
                let (dst, lhs, rhs) = (self.operand(dst)?, self.operand(lhs)?, self.operand(rhs)?);
                if *op == BinaryOperator::MatMul && self.program.language() == ShaderLanguage::Hlsl {
                    format!("{dst} = mul({lhs}, {rhs});")
                } else {
                    format!("{dst} = {lhs} {} {rhs};", op.symbol())
                }
            }
            AtomKind::Sample {
                dst,
                sampler,
                coords,
            } => {
                let coords = self.operand(coords)?;
                format!("{} = {};", self.operand(dst)?, self.sample_call(sampler, &coords)?)
            }
        })
    }

    /// Write the atoms of `function` in execution order.
    pub fn write_body(
        &self,
        out: &mut String,
        function: FunctionId,
        indent: &str,
    ) -> Result<(), ShaderError> {
        for atom in self.program.function(function).ordered_atoms() {
            out.push_str(indent);
            out.push_str(&self.statement(atom)?);
            out.push('\n');
        }
        Ok(())
    }
}
