//! GLSL source writer.

use std::collections::HashMap;

use shadergen_core::{
    FunctionId, FunctionType, ParamId, Parameter, Program, Semantic, ShaderError, ShaderLanguage,
};

use super::{
    array_suffix, check_language, emission_order, type_name, AtomRenderer, ProgramWriter,
    SampleSyntax, WriterOptions,
};

/// Fixed vertex attribute slot for a semantic.
fn attribute_location(semantic: Semantic, index: u32) -> Option<u32> {
    match semantic {
        Semantic::Position => Some(0),
        Semantic::BlendWeights => Some(1),
        Semantic::Normal => Some(2),
        Semantic::Colour => Some(3 + index.min(1)),
        Semantic::BlendIndices => Some(7),
        Semantic::TextureCoordinates => Some(8 + index),
        Semantic::Tangent => Some(14),
        Semantic::Binormal => Some(15),
        Semantic::Unknown | Semantic::Custom => None,
    }
}

pub struct GlslWriter {
    options: WriterOptions,
}

impl GlslWriter {
    pub fn new(options: WriterOptions) -> Self {
        Self { options }
    }

    fn modern(&self) -> bool {
        self.options.glsl_version >= 130
    }

    fn declaration(param: &Parameter) -> Result<String, ShaderError> {
        Ok(format!(
            "{} {}{}",
            type_name(ShaderLanguage::Glsl, param.ty())?,
            param.name(),
            array_suffix(param)
        ))
    }

    fn write_uniforms(&self, out: &mut String, program: &Program) -> Result<(), ShaderError> {
        for uniform in program.uniforms() {
            let layout = if uniform.is_sampler()
                && self.options.explicit_sampler_bindings
                && uniform.index() >= 0
            {
                format!("layout(binding = {}) ", uniform.index())
            } else {
                String::new()
            };
            out.push_str(&format!("{layout}uniform {};\n", Self::declaration(uniform)?));
        }
        if !program.uniforms().is_empty() {
            out.push('\n');
        }
        Ok(())
    }

    /// Global in/out declarations of the entry point. Parameters that map
    /// onto built-in variables are returned instead of declared.
    fn write_interface(
        &self,
        out: &mut String,
        program: &Program,
        entry: FunctionId,
    ) -> Result<HashMap<ParamId, &'static str>, ShaderError> {
        let function = program.function(entry);
        let stage = function.ty();
        let mut builtins = HashMap::new();
        let start = out.len();

        for &id in function.inputs() {
            let param = program.param(id);
            if param.content().is_struct_marker() {
                continue;
            }
            if stage == FunctionType::PixelMain && param.semantic() == Semantic::Position {
                builtins.insert(id, "gl_FragCoord");
                continue;
            }

            let qualifier = match (stage, self.modern()) {
                (_, true) => "in",
                (FunctionType::VertexMain, false) => "attribute",
                (_, false) => "varying",
            };
            let location = (stage == FunctionType::VertexMain && self.options.explicit_attrib_locations)
                .then(|| attribute_location(param.semantic(), param.semantic_index()))
                .flatten();
            match location {
                Some(location) => out.push_str(&format!(
                    "layout(location = {location}) {qualifier} {};\n",
                    Self::declaration(param)?
                )),
                None => out.push_str(&format!("{qualifier} {};\n", Self::declaration(param)?)),
            }
        }

        let declared_outputs = function
            .outputs()
            .iter()
            .filter(|&&id| !program.param(id).content().is_struct_marker())
            .count();
        let mut fragment_outputs = 0u32;
        for &id in function.outputs() {
            let param = program.param(id);
            if param.content().is_struct_marker() {
                continue;
            }
            if stage != FunctionType::PixelMain && param.semantic() == Semantic::Position {
                builtins.insert(id, "gl_Position");
                continue;
            }

            if stage == FunctionType::PixelMain {
                let slot = fragment_outputs;
                fragment_outputs += 1;
                if !self.modern() {
                    let builtin = if declared_outputs == 1 {
                        "gl_FragColor"
                    } else {
                        FRAG_DATA.get(slot as usize).copied().ok_or_else(|| {
                            ShaderError::InvalidProgram(format!(
                                "'{}' writes more than {} colour outputs",
                                program.name(),
                                FRAG_DATA.len()
                            ))
                        })?
                    };
                    builtins.insert(id, builtin);
                    continue;
                }
                if self.options.explicit_attrib_locations {
                    out.push_str(&format!(
                        "layout(location = {slot}) out {};\n",
                        Self::declaration(param)?
                    ));
                    continue;
                }
            }

            let qualifier = if self.modern() { "out" } else { "varying" };
            out.push_str(&format!("{qualifier} {};\n", Self::declaration(param)?));
        }

        if out.len() > start {
            out.push('\n');
        }
        Ok(builtins)
    }

    fn write_function(
        &self,
        out: &mut String,
        renderer: &AtomRenderer<'_>,
        id: FunctionId,
    ) -> Result<(), ShaderError> {
        let program = renderer.program;
        let function = program.function(id);

        if function.ty().is_main() {
            out.push_str("void main()\n{\n");
        } else {
            let params = function
                .inputs()
                .iter()
                .map(|&p| Self::declaration(program.param(p)).map(|d| format!("in {d}")))
                .chain(
                    function
                        .outputs()
                        .iter()
                        .map(|&p| Self::declaration(program.param(p)).map(|d| format!("out {d}"))),
                )
                .collect::<Result<Vec<_>, ShaderError>>()?;
            out.push_str(&format!("void {}({})\n{{\n", function.name(), params.join(", ")));
        }

        for &local in function.locals() {
            out.push_str(&format!("\t{};\n", Self::declaration(program.param(local))?));
        }
        if !function.locals().is_empty() && !function.atoms().is_empty() {
            out.push('\n');
        }
        renderer.write_body(out, id, "\t")?;
        out.push_str("}\n");
        Ok(())
    }
}

const FRAG_DATA: [&str; 4] = ["gl_FragData[0]", "gl_FragData[1]", "gl_FragData[2]", "gl_FragData[3]"];

impl ProgramWriter for GlslWriter {
    fn language(&self) -> ShaderLanguage {
        ShaderLanguage::Glsl
    }

    fn write_program(&self, program: &mut Program) -> Result<String, ShaderError> {
        let program = &*program;
        check_language(program, ShaderLanguage::Glsl)?;
        let mut out = format!("#version {}\n\n", self.options.glsl_version);

        for dependency in program.dependencies() {
            out.push_str(&format!("#include \"{dependency}.glsl\"\n"));
        }
        if !program.dependencies().is_empty() {
            out.push('\n');
        }

        self.write_uniforms(&mut out, program)?;

        let builtins = match program.entry_function() {
            Some(entry) => self.write_interface(&mut out, program, entry)?,
            None => HashMap::new(),
        };

        let renderer = AtomRenderer {
            program,
            sample: if self.modern() {
                SampleSyntax::Glsl
            } else {
                SampleSyntax::GlslLegacy
            },
            builtins,
        };
        let order = emission_order(program);
        for (i, &id) in order.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            self.write_function(&mut out, &renderer, id)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadergen_core::{
        AtomKind, ConstantType, Content, FunctionAtom, GpuProgramType, Literal, Operand,
    };

    #[test]
    fn fixed_attribute_slots() {
        assert_eq!(attribute_location(Semantic::Position, 0), Some(0));
        assert_eq!(attribute_location(Semantic::Colour, 1), Some(4));
        assert_eq!(attribute_location(Semantic::TextureCoordinates, 3), Some(11));
        assert_eq!(attribute_location(Semantic::Custom, 0), None);
    }

    #[test]
    fn legacy_fragment_output_uses_frag_color() {
        let mut program = Program::new("ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
        let main = program.create_function("main", FunctionType::PixelMain).unwrap();
        program
            .add_output(main, Parameter::new("colour", ConstantType::Float4))
            .unwrap();
        let writer = GlslWriter::new(WriterOptions {
            glsl_version: 120,
            ..WriterOptions::default()
        });
        let source = writer.write_program(&mut program).unwrap();
        assert!(source.starts_with("#version 120\n"));
        assert!(!source.contains("out vec4"));
    }

    #[test]
    fn legacy_frag_color_ignores_struct_markers() {
        let mut program = Program::new("ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
        let main = program.create_function("main", FunctionType::PixelMain).unwrap();
        program
            .add_output(
                main,
                Parameter::new("OUT", ConstantType::ShaderOut).with_content(Content::ShaderStructOut),
            )
            .unwrap();
        let colour = program
            .add_output(main, Parameter::new("colour", ConstantType::Float4))
            .unwrap();
        program.add_atom(
            main,
            FunctionAtom::new(
                0,
                AtomKind::Assign {
                    dst: Operand::output(colour),
                    src: Operand::literal(Literal::Vec(vec![1.0, 0.0, 0.0, 1.0])),
                },
            ),
        );
        let writer = GlslWriter::new(WriterOptions {
            glsl_version: 120,
            ..WriterOptions::default()
        });
        let source = writer.write_program(&mut program).unwrap();
        assert!(source.contains("\tgl_FragColor = vec4(1.0, 0.0, 0.0, 1.0);\n"), "{source}");
        assert!(!source.contains("gl_FragData"), "{source}");
    }

    #[test]
    fn sampler_binding_layout() {
        let mut program = Program::new("ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
        program.create_function("main", FunctionType::PixelMain).unwrap();
        program
            .add_uniform(Parameter::new("diffuse", ConstantType::Sampler2D), 2)
            .unwrap();

        let plain = GlslWriter::new(WriterOptions::default())
            .write_program(&mut program)
            .unwrap();
        assert!(plain.contains("uniform sampler2D diffuse;\n"));

        let bound = GlslWriter::new(WriterOptions {
            explicit_sampler_bindings: true,
            ..WriterOptions::default()
        })
        .write_program(&mut program)
        .unwrap();
        assert!(bound.contains("layout(binding = 2) uniform sampler2D diffuse;\n"));
    }
}
