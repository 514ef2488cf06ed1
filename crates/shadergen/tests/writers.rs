use shadergen::{writer_for, GlslWriter, HlslWriter, ProgramWriter, WriterOptions};
use shadergen_core::{
    AtomKind, BinaryOperator, ConstantType, FunctionAtom, FunctionType, GpuProgramType, Literal,
    Operand, OperandMask, Parameter, Program, Semantic, ShaderError, ShaderLanguage,
};

fn hlsl(options: WriterOptions) -> HlslWriter {
    HlslWriter::new(options)
}

fn legacy() -> WriterOptions {
    WriterOptions {
        hlsl4: false,
        ..WriterOptions::default()
    }
}

/// Text between `struct <name>\n{\n` and the closing `};`.
fn struct_body<'a>(source: &'a str, name: &str) -> &'a str {
    let open = format!("struct {name}\n{{\n");
    let start = source.find(&open).expect("struct present") + open.len();
    let end = source[start..].find("};").expect("struct closed") + start;
    &source[start..end]
}

#[test]
fn vertex_io_structs() {
    let mut program = Program::new("basic_vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
    let main = program.create_function("main", FunctionType::VertexMain).unwrap();
    let position_in = program
        .add_input(
            main,
            Parameter::new("position", ConstantType::Float3).with_semantic(Semantic::Position, 0),
        )
        .unwrap();
    program
        .add_input(
            main,
            Parameter::new("uv0", ConstantType::Float2)
                .with_semantic(Semantic::TextureCoordinates, 0),
        )
        .unwrap();
    let position_out = program
        .add_output(
            main,
            Parameter::new("position", ConstantType::Float4).with_semantic(Semantic::Position, 0),
        )
        .unwrap();
    program.add_atom(
        main,
        FunctionAtom::new(
            0,
            AtomKind::Assign {
                dst: Operand::output(position_out).with_mask(OperandMask::XYZ),
                src: Operand::input(position_in),
            },
        ),
    );

    let source = hlsl(WriterOptions::default()).write_program(&mut program).unwrap();

    let input = struct_body(&source, "Shader_In");
    assert_eq!(input.lines().count(), 2);
    assert_eq!(
        input,
        "\tfloat3 position : POSITION;\n\tfloat2 uv0      : TEXCOORD0;\n"
    );
    let output = struct_body(&source, "Shader_Out");
    assert_eq!(output, "\tfloat4 position : SV_Position;\n");

    assert!(source.contains("void main(in Shader_In IN, out Shader_Out OUT)\n"));
    assert!(source.contains("\tOUT.position.xyz = IN.position;\n"));
    assert_eq!(program.param(position_in).parent_name(), None);
    assert_eq!(program.param(position_out).parent_name(), None);

    let legacy_source = hlsl(legacy()).write_program(&mut program).unwrap();
    assert_eq!(
        struct_body(&legacy_source, "Shader_Out"),
        "\tfloat4 position : POSITION;\n"
    );
}

#[test]
fn v4_sampler_uses_texture_register() {
    let mut program = Program::new("textured_ps", ShaderLanguage::Hlsl, GpuProgramType::Fragment);
    program.create_function("main", FunctionType::PixelMain).unwrap();
    program
        .add_uniform(Parameter::new("diffuseMap", ConstantType::Sampler2D), 3)
        .unwrap();

    let source = hlsl(WriterOptions::default()).write_program(&mut program).unwrap();
    assert!(source.contains("Texture2D    diffuseMap      : register(t3);\n"));
    assert!(source.contains("SamplerState diffuseMapState : register(s3);\n"));
    assert!(!source.contains("sampler2D"));
}

#[test]
fn index_suffix_is_suppressed_for_fixed_semantics() {
    let mut program = Program::new("skinned_vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
    let main = program.create_function("main", FunctionType::VertexMain).unwrap();
    let inputs = [
        ("position", ConstantType::Float4, Semantic::Position, 0),
        ("normal", ConstantType::Float3, Semantic::Normal, 0),
        ("weights", ConstantType::Float4, Semantic::BlendWeights, 0),
        ("indices", ConstantType::Float4, Semantic::BlendIndices, 0),
        ("diffuse", ConstantType::Float4, Semantic::Colour, 0),
        ("specular", ConstantType::Float4, Semantic::Colour, 1),
        ("uv2", ConstantType::Float2, Semantic::TextureCoordinates, 2),
        ("tangent", ConstantType::Float3, Semantic::Tangent, 0),
    ];
    for (name, ty, semantic, index) in inputs {
        program
            .add_input(main, Parameter::new(name, ty).with_semantic(semantic, index))
            .unwrap();
    }

    let source = hlsl(legacy()).write_program(&mut program).unwrap();
    let body = struct_body(&source, "Shader_In");
    let annotations: Vec<&str> = body
        .lines()
        .map(|line| line.rsplit(": ").next().unwrap().trim_end_matches(';'))
        .collect();
    assert_eq!(
        annotations,
        [
            "POSITION",
            "NORMAL",
            "BLENDWEIGHT",
            "BLENDINDICES",
            "COLOR",
            "COLOR1",
            "TEXCOORD2",
            "TANGENT0"
        ]
    );
}

#[test]
fn unmapped_semantic_leaves_field_bare() {
    let mut program = Program::new("custom_vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
    let main = program.create_function("main", FunctionType::VertexMain).unwrap();
    program
        .add_input(
            main,
            Parameter::new("extra", ConstantType::Float4).with_semantic(Semantic::Custom, 0),
        )
        .unwrap();

    let source = hlsl(WriterOptions::default()).write_program(&mut program).unwrap();
    assert_eq!(struct_body(&source, "Shader_In"), "\tfloat4 extra;\n");
}

#[test]
fn array_brackets_stop_at_first_zero_dimension() {
    let mut program = Program::new("arrays_vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
    program.create_function("main", FunctionType::VertexMain).unwrap();

    let grid = Parameter::new("grid", ConstantType::Float4)
        .with_array_dims(&[4, 2])
        .unwrap();
    let mut partial = Parameter::new("partial", ConstantType::Float4)
        .with_array_dims(&[3])
        .unwrap();
    partial.set_array_dim(2, 5);
    program.add_uniform(grid, -1).unwrap();
    program.add_uniform(partial, -1).unwrap();

    let source = hlsl(WriterOptions::default()).write_program(&mut program).unwrap();
    assert!(source.contains("float4 grid[4][2];\n"));
    assert!(source.contains("float4 partial[3];\n"));
    assert!(!source.contains("[5]"));

    assert!(Parameter::new("bad", ConstantType::Float4)
        .with_array_dims(&[2, 0])
        .is_err());
}

#[test]
fn internal_functions_come_first_in_creation_order() {
    let mut program = Program::new("ordered_ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
    program.create_function("main", FunctionType::PixelMain).unwrap();
    program.create_function("zeta", FunctionType::Internal).unwrap();
    program.create_function("alpha", FunctionType::Internal).unwrap();

    let source = GlslWriter::new(WriterOptions::default())
        .write_program(&mut program)
        .unwrap();
    let zeta = source.find("void zeta()").unwrap();
    let alpha = source.find("void alpha()").unwrap();
    let main = source.find("void main()").unwrap();
    assert!(zeta < alpha && alpha < main);
}

#[test]
fn output_is_deterministic() {
    let build = || {
        let mut program = Program::new("det_vs", ShaderLanguage::Hlsl, GpuProgramType::Vertex);
        let main = program.create_function("main", FunctionType::VertexMain).unwrap();
        program.add_dependency("Common");
        let wvp = program
            .add_uniform(Parameter::new("worldViewProj", ConstantType::Matrix4x4), -1)
            .unwrap();
        let pos = program
            .add_input(
                main,
                Parameter::new("position", ConstantType::Float4)
                    .with_semantic(Semantic::Position, 0),
            )
            .unwrap();
        let out = program
            .add_output(
                main,
                Parameter::new("position", ConstantType::Float4)
                    .with_semantic(Semantic::Position, 0),
            )
            .unwrap();
        program.add_atom(
            main,
            FunctionAtom::new(
                0,
                AtomKind::Binary {
                    op: BinaryOperator::MatMul,
                    dst: Operand::output(out),
                    lhs: Operand::input(wvp),
                    rhs: Operand::input(pos),
                },
            ),
        );
        program
    };

    let writer = writer_for(ShaderLanguage::Hlsl, WriterOptions::default());
    let mut program = build();
    let first = writer.write_program(&mut program).unwrap();
    let second = writer.write_program(&mut program).unwrap();
    let fresh = writer.write_program(&mut build()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, fresh);
    assert!(first.starts_with("#include \"Common.hlsl\"\n"));
    assert!(first.contains("\tOUT.position = mul(worldViewProj, IN.position);\n"));
}

#[test]
fn unmappable_type_is_an_error() {
    let mut program = Program::new("atomic_ps", ShaderLanguage::Hlsl, GpuProgramType::Fragment);
    program.create_function("main", FunctionType::PixelMain).unwrap();
    program
        .add_uniform(Parameter::new("counter", ConstantType::AtomicCounter), 0)
        .unwrap();

    let err = hlsl(WriterOptions::default()).write_program(&mut program).unwrap_err();
    assert!(matches!(
        err,
        ShaderError::UnknownType {
            ty: ConstantType::AtomicCounter,
            language: ShaderLanguage::Hlsl
        }
    ));
}

#[test]
fn glsl_vertex_program() {
    let mut program = Program::new("basic_vs", ShaderLanguage::Glsl, GpuProgramType::Vertex);
    let main = program.create_function("main", FunctionType::VertexMain).unwrap();
    program.add_dependency("Common");
    let wvp = program
        .add_uniform(Parameter::new("worldViewProj", ConstantType::Matrix4x4), -1)
        .unwrap();
    let pos = program
        .add_input(
            main,
            Parameter::new("position", ConstantType::Float4).with_semantic(Semantic::Position, 0),
        )
        .unwrap();
    let uv_in = program
        .add_input(
            main,
            Parameter::new("uv0", ConstantType::Float2)
                .with_semantic(Semantic::TextureCoordinates, 0),
        )
        .unwrap();
    let out = program
        .add_output(
            main,
            Parameter::new("oPosition", ConstantType::Float4).with_semantic(Semantic::Position, 0),
        )
        .unwrap();
    let uv_out = program
        .add_output(
            main,
            Parameter::new("oUv0", ConstantType::Float2)
                .with_semantic(Semantic::TextureCoordinates, 0),
        )
        .unwrap();
    program.add_atom(
        main,
        FunctionAtom::new(
            0,
            AtomKind::Binary {
                op: BinaryOperator::MatMul,
                dst: Operand::output(out),
                lhs: Operand::input(wvp),
                rhs: Operand::input(pos),
            },
        ),
    );
    program.add_atom(
        main,
        FunctionAtom::new(
            1,
            AtomKind::Assign {
                dst: Operand::output(uv_out),
                src: Operand::input(uv_in),
            },
        ),
    );

    let source = GlslWriter::new(WriterOptions::default())
        .write_program(&mut program)
        .unwrap();
    assert_eq!(
        source,
        "#version 330\n\
         \n\
         #include \"Common.glsl\"\n\
         \n\
         uniform mat4 worldViewProj;\n\
         \n\
         layout(location = 0) in vec4 position;\n\
         layout(location = 8) in vec2 uv0;\n\
         out vec2 oUv0;\n\
         \n\
         void main()\n\
         {\n\
         \tgl_Position = worldViewProj * position;\n\
         \toUv0 = uv0;\n\
         }\n"
    );
}

#[test]
fn glsl_literals_and_sampling() {
    let mut program = Program::new("tint_ps", ShaderLanguage::Glsl, GpuProgramType::Fragment);
    let main = program.create_function("main", FunctionType::PixelMain).unwrap();
    let tex = program
        .add_uniform(Parameter::new("diffuseMap", ConstantType::Sampler2D), 0)
        .unwrap();
    let uv = program
        .add_input(
            main,
            Parameter::new("oUv0", ConstantType::Float2)
                .with_semantic(Semantic::TextureCoordinates, 0),
        )
        .unwrap();
    let colour = program
        .add_output(main, Parameter::new("fragColour", ConstantType::Float4))
        .unwrap();
    program.add_atom(
        main,
        FunctionAtom::new(
            0,
            AtomKind::Sample {
                dst: Operand::output(colour),
                sampler: Operand::input(tex),
                coords: Operand::input(uv),
            },
        ),
    );
    program.add_atom(
        main,
        FunctionAtom::new(
            1,
            AtomKind::Binary {
                op: BinaryOperator::Mul,
                dst: Operand::output(colour).with_mask(OperandMask::XYZ),
                lhs: Operand::input(colour).with_mask(OperandMask::XYZ),
                rhs: Operand::literal(Literal::Vec(vec![1.0, 0.5, 0.25])),
            },
        ),
    );

    let source = GlslWriter::new(WriterOptions::default())
        .write_program(&mut program)
        .unwrap();
    assert!(source.contains("in vec2 oUv0;\n"));
    assert!(source.contains("layout(location = 0) out vec4 fragColour;\n"));
    assert!(source.contains("\tfragColour = texture(diffuseMap, oUv0);\n"));
    assert!(source.contains("\tfragColour.xyz = fragColour.xyz * vec3(1.0, 0.5, 0.25);\n"));
}

#[test]
fn language_mismatch_is_rejected() {
    let mut program = Program::new("vs", ShaderLanguage::Glsl, GpuProgramType::Vertex);
    program.create_function("main", FunctionType::VertexMain).unwrap();
    assert!(matches!(
        hlsl(WriterOptions::default()).write_program(&mut program),
        Err(ShaderError::InvalidProgram(_))
    ));
}
