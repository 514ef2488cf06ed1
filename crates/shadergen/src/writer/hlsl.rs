//! HLSL source writer.
//!
//! Entry-point I/O travels through a generated `Shader_In`/`Shader_Out`
//! struct pair; uniforms and struct fields are column aligned.

use shadergen_core::{
    ConstantType, FunctionId, FunctionType, ParamId, Parameter, Program, Semantic, ShaderError,
    ShaderLanguage,
};
use tracing::warn;

use super::{
    array_suffix, check_language, emission_order, type_name, write_aligned, AtomRenderer,
    ParentScope, ProgramWriter, Row, SampleSyntax, WriterOptions,
};

const INPUT_STRUCT: &str = "Shader_In";
const OUTPUT_STRUCT: &str = "Shader_Out";

/// v4 texture object type backing a sampler uniform.
fn texture_type(ty: ConstantType) -> Option<&'static str> {
    Some(match ty {
        ConstantType::Sampler1D | ConstantType::Sampler1DShadow => "Texture1D",
        ConstantType::Sampler2D | ConstantType::Sampler2DShadow => "Texture2D",
        ConstantType::Sampler3D => "Texture3D",
        ConstantType::SamplerCube => "TextureCube",
        ConstantType::Sampler1DArray => "Texture1DArray",
        ConstantType::Sampler2DArray => "Texture2DArray",
        _ => return None,
    })
}

fn register(class: char, index: i32) -> String {
    if index >= 0 {
        format!("register({class}{index})")
    } else {
        String::new()
    }
}

pub struct HlslWriter {
    options: WriterOptions,
}

impl HlslWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    fn write_uniforms(&self, out: &mut String, program: &Program) -> Result<(), ShaderError> {
        let mut rows = Vec::new();
        for uniform in program.uniforms() {
            let name = format!("{}{}", uniform.name(), array_suffix(uniform));
            let ty = uniform.ty();

            if uniform.is_sampler() && self.options.hlsl4 {
                let texture = texture_type(ty).ok_or(ShaderError::UnknownType {
                    ty,
                    language: ShaderLanguage::Hlsl,
                })?;
                rows.push(Row {
                    ty: texture.to_owned(),
                    name,
                    annotation: register('t', uniform.index()),
                });
                rows.push(Row {
                    ty: "SamplerState".to_owned(),
                    name: format!("{}State{}", uniform.name(), array_suffix(uniform)),
                    annotation: register('s', uniform.index()),
                });
                continue;
            }

            let annotation = if uniform.is_sampler() {
                register('s', uniform.index())
            } else if ty.is_image() {
                register('u', uniform.index())
            } else {
                String::new()
            };
            rows.push(Row {
                ty: type_name(ShaderLanguage::Hlsl, ty)?.to_owned(),
                name,
                annotation,
            });
        }

        if !rows.is_empty() {
            write_aligned(out, "", &rows);
            out.push('\n');
        }
        Ok(())
    }

    /// Annotation text for one entry-point struct field.
    fn semantic(
        &self,
        stage: FunctionType,
        output: bool,
        param: &Parameter,
        render_targets: &mut u32,
    ) -> String {
        let semantic = param.semantic();
        let index = param.semantic_index();

        if output {
            if self.options.hlsl4
                && semantic == Semantic::Position
                && matches!(
                    stage,
                    FunctionType::VertexMain | FunctionType::GeometryMain | FunctionType::DomainMain
                )
            {
                return "SV_Position".to_owned();
            }
            if stage == FunctionType::PixelMain && semantic == Semantic::Unknown {
                let target = *render_targets;
                *render_targets += 1;
                let base = if self.options.hlsl4 { "SV_Target" } else { "COLOR" };
                return if target == 0 {
                    base.to_owned()
                } else {
                    format!("{base}{target}")
                };
            }
        } else if self.options.hlsl4
            && semantic == Semantic::Position
            && matches!(stage, FunctionType::PixelMain | FunctionType::GeometryMain)
        {
            return "SV_Position".to_owned();
        }

        match ShaderLanguage::Hlsl.semantic_name(semantic) {
            Some(name) if semantic.writes_index(index) => format!("{name}{index}"),
            Some(name) => name.to_owned(),
            None => {
                warn!(parameter = param.name(), ?semantic, "no HLSL semantic for parameter");
                String::new()
            }
        }
    }

    /// Fields of one I/O struct, or `None` when there are none.
    fn io_struct(
        &self,
        program: &Program,
        stage: FunctionType,
        ids: &[ParamId],
        output: bool,
    ) -> Result<Option<Vec<Row>>, ShaderError> {
        let mut render_targets = 0;
        let mut rows = Vec::new();
        for &id in ids {
            let param = program.param(id);
            if param.content().is_struct_marker() || param.ty().is_struct_marker() {
                continue;
            }
            rows.push(Row {
                ty: type_name(ShaderLanguage::Hlsl, param.ty())?.to_owned(),
                name: format!("{}{}", param.name(), array_suffix(param)),
                annotation: self.semantic(stage, output, param, &mut render_targets),
            });
        }
        Ok((!rows.is_empty()).then_some(rows))
    }

    fn write_function(
        &self,
        out: &mut String,
        renderer: &AtomRenderer<'_>,
        id: FunctionId,
        has_input: bool,
        has_output: bool,
    ) -> Result<(), ShaderError> {
        let program = renderer.program;
        let function = program.function(id);

        let params = if function.ty().is_main() {
            let mut params = Vec::new();
            if has_input {
                params.push(format!("in {INPUT_STRUCT} IN"));
            }
            if has_output {
                let qualifier = if function.ty() == FunctionType::GeometryMain
                    && self.options.geometry_inout_outputs
                {
                    "inout"
                } else {
                    "out"
                };
                params.push(format!("{qualifier} {OUTPUT_STRUCT} OUT"));
            }
            params
        } else {
            let declare = |qualifier: &str, id: ParamId| -> Result<String, ShaderError> {
                let param = program.param(id);
                Ok(format!(
                    "{qualifier} {} {}{}",
                    type_name(ShaderLanguage::Hlsl, param.ty())?,
                    param.name(),
                    array_suffix(param)
                ))
            };
            let mut params = Vec::new();
            for &input in function.inputs() {
                params.push(declare("in", input)?);
            }
            for &output in function.outputs() {
                params.push(declare("out", output)?);
            }
            params
        };
        out.push_str(&format!("void {}({})\n{{\n", function.name(), params.join(", ")));

        let locals = function
            .locals()
            .iter()
            .map(|&local| -> Result<Row, ShaderError> {
                let param = program.param(local);
                Ok(Row {
                    ty: type_name(ShaderLanguage::Hlsl, param.ty())?.to_owned(),
                    name: format!("{}{}", param.name(), array_suffix(param)),
                    annotation: String::new(),
                })
            })
            .collect::<Result<Vec<_>, ShaderError>>()?;
        write_aligned(out, "\t", &locals);
        if !locals.is_empty() && !function.atoms().is_empty() {
            out.push('\n');
        }

        renderer.write_body(out, id, "\t")?;
        out.push_str("}\n");
        Ok(())
    }
}

impl ProgramWriter for HlslWriter {
    fn language(&self) -> ShaderLanguage {
        ShaderLanguage::Hlsl
    }

    fn write_program(&self, program: &mut Program) -> Result<String, ShaderError> {
        check_language(program, ShaderLanguage::Hlsl)?;
        let mut out = String::new();

        for dependency in program.dependencies() {
            out.push_str(&format!("#include \"{dependency}.hlsl\"\n"));
        }
        if !program.dependencies().is_empty() {
            out.push('\n');
        }

        self.write_uniforms(&mut out, program)?;

        let entry = program.entry_function();
        let (inputs, outputs) = match entry {
            Some(id) => {
                let f = program.function(id);
                (f.inputs().to_vec(), f.outputs().to_vec())
            }
            None => (Vec::new(), Vec::new()),
        };

        let mut has_input = false;
        let mut has_output = false;
        if let Some(id) = entry {
            let stage = program.function(id).ty();
            for (name, ids, output, present) in [
                (INPUT_STRUCT, &inputs, false, &mut has_input),
                (OUTPUT_STRUCT, &outputs, true, &mut has_output),
            ] {
                if let Some(rows) = self.io_struct(program, stage, ids, output)? {
                    out.push_str(&format!("struct {name}\n{{\n"));
                    write_aligned(&mut out, "\t", &rows);
                    out.push_str("};\n\n");
                    *present = true;
                }
            }
        }

        let scope = ParentScope::new(program, &[(inputs.as_slice(), "IN"), (outputs.as_slice(), "OUT")]);
        let renderer = AtomRenderer {
            program: &scope,
            sample: if self.options.hlsl4 {
                SampleSyntax::HlslV4
            } else {
                SampleSyntax::HlslLegacy
            },
            builtins: Default::default(),
        };
        let order = emission_order(&scope);
        for (i, &id) in order.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let is_entry = Some(id) == entry;
            self.write_function(&mut out, &renderer, id, is_entry && has_input, is_entry && has_output)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadergen_core::GpuProgramType;

    fn pixel_program() -> (Program, FunctionId) {
        let mut program = Program::new("ps", ShaderLanguage::Hlsl, GpuProgramType::Fragment);
        let main = program.create_function("main", FunctionType::PixelMain).unwrap();
        (program, main)
    }

    #[test]
    fn pixel_output_gets_render_target() {
        let (mut program, main) = pixel_program();
        program
            .add_output(main, Parameter::new("colour", ConstantType::Float4))
            .unwrap();

        let v4 = HlslWriter::new(WriterOptions::default())
            .write_program(&mut program)
            .unwrap();
        assert!(v4.contains("float4 colour : SV_Target;"));

        let legacy = HlslWriter::new(WriterOptions {
            hlsl4: false,
            ..WriterOptions::default()
        })
        .write_program(&mut program)
        .unwrap();
        assert!(legacy.contains("float4 colour : COLOR;"));
    }

    #[test]
    fn pixel_position_input_is_system_value() {
        let (mut program, main) = pixel_program();
        program
            .add_input(
                main,
                Parameter::new("fragCoord", ConstantType::Float4).with_semantic(Semantic::Position, 0),
            )
            .unwrap();
        let source = HlslWriter::new(WriterOptions::default())
            .write_program(&mut program)
            .unwrap();
        assert!(source.contains("float4 fragCoord : SV_Position;"));
    }

    #[test]
    fn legacy_sampler_register() {
        let (mut program, _) = pixel_program();
        program
            .add_uniform(Parameter::new("diffuse", ConstantType::Sampler2D), 3)
            .unwrap();
        let source = HlslWriter::new(WriterOptions {
            hlsl4: false,
            ..WriterOptions::default()
        })
        .write_program(&mut program)
        .unwrap();
        assert!(source.contains("sampler2D diffuse : register(s3);"));
        assert!(!source.contains("register(t3)"));
    }

    #[test]
    fn geometry_output_is_inout() {
        let mut program = Program::new("gs", ShaderLanguage::Hlsl, GpuProgramType::Geometry);
        let main = program.create_function("main", FunctionType::GeometryMain).unwrap();
        program
            .add_output(
                main,
                Parameter::new("position", ConstantType::Float4).with_semantic(Semantic::Position, 0),
            )
            .unwrap();
        let source = HlslWriter::new(WriterOptions::default())
            .write_program(&mut program)
            .unwrap();
        assert!(source.contains("void main(inout Shader_Out OUT)"));
    }

    #[test]
    fn struct_marker_params_are_not_fields() {
        let (mut program, main) = pixel_program();
        program
            .add_input(
                main,
                Parameter::new("uv", ConstantType::Float2)
                    .with_semantic(Semantic::TextureCoordinates, 1),
            )
            .unwrap();
        program
            .add_input(main, Parameter::new("IN", ConstantType::ShaderIn))
            .unwrap();
        let source = HlslWriter::new(WriterOptions::default())
            .write_program(&mut program)
            .unwrap();
        assert!(source.contains("struct Shader_In\n{\n\tfloat2 uv : TEXCOORD1;\n};\n"));
    }
}
