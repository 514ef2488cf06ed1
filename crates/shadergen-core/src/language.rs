//! Target shading languages and their fixed type and semantic tables.

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;

use crate::{ConstantType, Semantic};

/// Shading language a program is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    Glsl,
    Hlsl,
}

impl fmt::Display for ShaderLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderLanguage::Glsl => "GLSL",
            ShaderLanguage::Hlsl => "HLSL",
        })
    }
}

impl ShaderLanguage {
    /// Lowercase tag used in logs and file names.
    pub fn name(self) -> &'static str {
        match self {
            ShaderLanguage::Glsl => "glsl",
            ShaderLanguage::Hlsl => "hlsl",
        }
    }

    /// Extension appended to dependency names in include directives.
    pub fn extension(self) -> &'static str {
        self.name()
    }

    /// Whether entry points exchange data through `Shader_In`/`Shader_Out`
    /// structs rather than loose globals.
    pub fn uses_io_structs(self) -> bool {
        matches!(self, ShaderLanguage::Hlsl)
    }

    /// Type name of `ty` in this language, `None` if the language has none.
    pub fn type_name(self, ty: ConstantType) -> Option<&'static str> {
        match self {
            ShaderLanguage::Glsl => glsl_type_name(ty),
            ShaderLanguage::Hlsl => hlsl_type_name(ty),
        }
    }

    /// Reverse lookup of [`ShaderLanguage::type_name`].
    pub fn parse_type(self, name: &str) -> Option<ConstantType> {
        let table = match self {
            ShaderLanguage::Glsl => &*GLSL_TYPES,
            ShaderLanguage::Hlsl => &*HLSL_TYPES,
        };
        table.get(name).copied()
    }

    /// Semantic annotation string, `None` when the language has no mapping.
    pub fn semantic_name(self, semantic: Semantic) -> Option<&'static str> {
        match self {
            // GLSL binds by location or builtin instead of semantics.
            ShaderLanguage::Glsl => None,
            ShaderLanguage::Hlsl => match semantic {
                Semantic::Position => Some("POSITION"),
                Semantic::BlendWeights => Some("BLENDWEIGHT"),
                Semantic::BlendIndices => Some("BLENDINDICES"),
                Semantic::Normal => Some("NORMAL"),
                Semantic::Colour => Some("COLOR"),
                Semantic::TextureCoordinates => Some("TEXCOORD"),
                Semantic::Binormal => Some("BINORMAL"),
                Semantic::Tangent => Some("TANGENT"),
                Semantic::Unknown | Semantic::Custom => None,
            },
        }
    }
}

fn glsl_type_name(ty: ConstantType) -> Option<&'static str> {
    use ConstantType::*;
    Some(match ty {
        Float1 => "float",
        Float2 => "vec2",
        Float3 => "vec3",
        Float4 => "vec4",
        Int1 => "int",
        Int2 => "ivec2",
        Int3 => "ivec3",
        Int4 => "ivec4",
        UInt1 => "uint",
        UInt2 => "uvec2",
        UInt3 => "uvec3",
        UInt4 => "uvec4",
        Double1 => "double",
        Double2 => "dvec2",
        Double3 => "dvec3",
        Double4 => "dvec4",
        Matrix2x2 => "mat2",
        Matrix2x3 => "mat2x3",
        Matrix2x4 => "mat2x4",
        Matrix3x2 => "mat3x2",
        Matrix3x3 => "mat3",
        Matrix3x4 => "mat3x4",
        Matrix4x2 => "mat4x2",
        Matrix4x3 => "mat4x3",
        Matrix4x4 => "mat4",
        MatrixDouble2x2 => "dmat2",
        MatrixDouble2x3 => "dmat2x3",
        MatrixDouble2x4 => "dmat2x4",
        MatrixDouble3x2 => "dmat3x2",
        MatrixDouble3x3 => "dmat3",
        MatrixDouble3x4 => "dmat3x4",
        MatrixDouble4x2 => "dmat4x2",
        MatrixDouble4x3 => "dmat4x3",
        MatrixDouble4x4 => "dmat4",
        Sampler1D => "sampler1D",
        Sampler2D => "sampler2D",
        Sampler3D => "sampler3D",
        SamplerCube => "samplerCube",
        Sampler1DArray => "sampler1DArray",
        Sampler2DArray => "sampler2DArray",
        Sampler1DShadow => "sampler1DShadow",
        Sampler2DShadow => "sampler2DShadow",
        Image1D => "image1D",
        Image2D => "image2D",
        Image3D => "image3D",
        ImageCube => "imageCube",
        Image2DArray => "image2DArray",
        AtomicCounter => "atomic_uint",
        ShaderIn | ShaderOut | Unknown => return None,
    })
}

fn hlsl_type_name(ty: ConstantType) -> Option<&'static str> {
    use ConstantType::*;
    Some(match ty {
        Float1 => "float",
        Float2 => "float2",
        Float3 => "float3",
        Float4 => "float4",
        Int1 => "int",
        Int2 => "int2",
        Int3 => "int3",
        Int4 => "int4",
        UInt1 => "uint",
        UInt2 => "uint2",
        UInt3 => "uint3",
        UInt4 => "uint4",
        Double1 => "double",
        Double2 => "double2",
        Double3 => "double3",
        Double4 => "double4",
        Matrix2x2 => "float2x2",
        Matrix2x3 => "float2x3",
        Matrix2x4 => "float2x4",
        Matrix3x2 => "float3x2",
        Matrix3x3 => "float3x3",
        Matrix3x4 => "float3x4",
        Matrix4x2 => "float4x2",
        Matrix4x3 => "float4x3",
        Matrix4x4 => "float4x4",
        MatrixDouble2x2 => "double2x2",
        MatrixDouble2x3 => "double2x3",
        MatrixDouble2x4 => "double2x4",
        MatrixDouble3x2 => "double3x2",
        MatrixDouble3x3 => "double3x3",
        MatrixDouble3x4 => "double3x4",
        MatrixDouble4x2 => "double4x2",
        MatrixDouble4x3 => "double4x3",
        MatrixDouble4x4 => "double4x4",
        Sampler1D | Sampler1DShadow => "sampler1D",
        Sampler2D | Sampler2DShadow => "sampler2D",
        Sampler3D => "sampler3D",
        SamplerCube => "samplerCUBE",
        Image1D => "RWTexture1D<float4>",
        Image2D => "RWTexture2D<float4>",
        Image3D => "RWTexture3D<float4>",
        Image2DArray => "RWTexture2DArray<float4>",
        ShaderIn => "Shader_In",
        ShaderOut => "Shader_Out",
        // Array samplers only exist in the v4 texture/sampler-state model.
        Sampler1DArray | Sampler2DArray | ImageCube | AtomicCounter | Unknown => return None,
    })
}

fn build_reverse_table(language: ShaderLanguage) -> HashMap<&'static str, ConstantType> {
    let mut table: HashMap<_, _> = ConstantType::ALL
        .iter()
        .filter_map(|&ty| language.type_name(ty).map(|name| (name, ty)))
        .collect();
    if language == ShaderLanguage::Glsl {
        table.insert("mat2x2", ConstantType::Matrix2x2);
        table.insert("mat3x3", ConstantType::Matrix3x3);
        table.insert("mat4x4", ConstantType::Matrix4x4);
        table.insert("dmat2x2", ConstantType::MatrixDouble2x2);
        table.insert("dmat3x3", ConstantType::MatrixDouble3x3);
        table.insert("dmat4x4", ConstantType::MatrixDouble4x4);
    }
    // Shadow samplers share names with their plain counterparts in HLSL;
    // the plain type wins.
    if language == ShaderLanguage::Hlsl {
        table.insert("sampler1D", ConstantType::Sampler1D);
        table.insert("sampler2D", ConstantType::Sampler2D);
    }
    table
}

static GLSL_TYPES: Lazy<HashMap<&'static str, ConstantType>> =
    Lazy::new(|| build_reverse_table(ShaderLanguage::Glsl));

static HLSL_TYPES: Lazy<HashMap<&'static str, ConstantType>> =
    Lazy::new(|| build_reverse_table(ShaderLanguage::Hlsl));
