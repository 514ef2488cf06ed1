//! Parameters: named, typed, semantically tagged shader values.

use std::ops::{Deref, DerefMut};

use crate::{error::Result, ConstantType, ShaderError};

/// Maximum number of array dimensions a parameter can carry.
pub const MAX_ARRAY_DIMS: usize = 4;

/// Fixed vocabulary describing what an I/O parameter means to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Semantic {
    #[default]
    Unknown,
    Position,
    BlendWeights,
    BlendIndices,
    Normal,
    Colour,
    TextureCoordinates,
    Binormal,
    Tangent,
    Custom,
}

impl Semantic {
    /// Whether an annotation for this semantic carries its numeric index.
    ///
    /// Position, normal, blend indices, blend weights and the first colour
    /// are written bare; shader compilers reject `POSITION0`-style forms on
    /// some targets.
    pub fn writes_index(self, index: u32) -> bool {
        match self {
            Semantic::Position
            | Semantic::Normal
            | Semantic::BlendIndices
            | Semantic::BlendWeights => false,
            Semantic::Colour => index != 0,
            _ => true,
        }
    }
}

/// Classification of a parameter used to match values across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Content {
    #[default]
    Unknown,
    PositionObjectSpace,
    PositionWorldSpace,
    PositionViewSpace,
    PositionProjectiveSpace,
    NormalObjectSpace,
    NormalWorldSpace,
    NormalViewSpace,
    TangentObjectSpace,
    TangentWorldSpace,
    TangentViewSpace,
    BinormalObjectSpace,
    BinormalWorldSpace,
    BinormalViewSpace,
    ColourDiffuse,
    ColourSpecular,
    BlendWeights,
    BlendIndices,
    /// Texture coordinate set 0..7.
    TextureCoordinate(u8),
    PointSize,
    FrontFacing,
    ShaderStructIn,
    ShaderStructOut,
}

impl Content {
    /// Semantic a parameter with this content gets when created implicitly.
    ///
    /// Contents without a fixed semantic travel through the next free
    /// texture-coordinate slot.
    pub fn default_semantic(self) -> Option<(Semantic, u32)> {
        Some(match self {
            Content::PositionObjectSpace | Content::PositionProjectiveSpace => {
                (Semantic::Position, 0)
            }
            Content::NormalObjectSpace => (Semantic::Normal, 0),
            Content::TangentObjectSpace => (Semantic::Tangent, 0),
            Content::BinormalObjectSpace => (Semantic::Binormal, 0),
            Content::ColourDiffuse => (Semantic::Colour, 0),
            Content::ColourSpecular => (Semantic::Colour, 1),
            Content::BlendWeights => (Semantic::BlendWeights, 0),
            Content::BlendIndices => (Semantic::BlendIndices, 0),
            Content::TextureCoordinate(set) => (Semantic::TextureCoordinates, u32::from(set)),
            _ => return None,
        })
    }

    /// Short stem used to name implicitly created parameters.
    pub fn stem(self) -> &'static str {
        match self {
            Content::Unknown => "Param",
            Content::PositionObjectSpace => "Pos_Obj",
            Content::PositionWorldSpace => "Pos_World",
            Content::PositionViewSpace => "Pos_View",
            Content::PositionProjectiveSpace => "Pos_Proj",
            Content::NormalObjectSpace => "Normal_Obj",
            Content::NormalWorldSpace => "Normal_World",
            Content::NormalViewSpace => "Normal_View",
            Content::TangentObjectSpace => "Tangent_Obj",
            Content::TangentWorldSpace => "Tangent_World",
            Content::TangentViewSpace => "Tangent_View",
            Content::BinormalObjectSpace => "Binormal_Obj",
            Content::BinormalWorldSpace => "Binormal_World",
            Content::BinormalViewSpace => "Binormal_View",
            Content::ColourDiffuse => "Color_Diffuse",
            Content::ColourSpecular => "Color_Specular",
            Content::BlendWeights => "BlendWeights",
            Content::BlendIndices => "BlendIndices",
            Content::TextureCoordinate(_) => "TexCoord",
            Content::PointSize => "PointSize",
            Content::FrontFacing => "FrontFacing",
            Content::ShaderStructIn => "IN",
            Content::ShaderStructOut => "OUT",
        }
    }

    /// Parameters tagged as a generated I/O struct are not struct fields
    /// themselves.
    pub fn is_struct_marker(self) -> bool {
        matches!(self, Content::ShaderStructIn | Content::ShaderStructOut)
    }
}

/// A named, typed shader value.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    ty: ConstantType,
    semantic: Semantic,
    semantic_index: u32,
    content: Content,
    array_dims: [usize; MAX_ARRAY_DIMS],
    parent: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: ConstantType) -> Self {
        Self {
            name: name.into(),
            ty,
            semantic: Semantic::Unknown,
            semantic_index: 0,
            content: Content::Unknown,
            array_dims: [0; MAX_ARRAY_DIMS],
            parent: None,
        }
    }

    pub fn with_semantic(mut self, semantic: Semantic, index: u32) -> Self {
        self.semantic = semantic;
        self.semantic_index = index;
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    /// Set all array extents at once. Every extent must be positive and at
    /// most [`MAX_ARRAY_DIMS`] may be given.
    pub fn with_array_dims(mut self, dims: &[usize]) -> Result<Self> {
        if dims.len() > MAX_ARRAY_DIMS || dims.contains(&0) {
            return Err(ShaderError::InvalidArrayDimensions {
                name: self.name,
                dims: dims.to_vec(),
            });
        }
        self.array_dims = [0; MAX_ARRAY_DIMS];
        self.array_dims[..dims.len()].copy_from_slice(dims);
        Ok(self)
    }

    /// Set a single extent without validation.
    ///
    /// This can produce gaps (`[0, 3, ..]`); writers stop at the first zero.
    pub fn set_array_dim(&mut self, dim: usize, extent: usize) {
        if let Some(slot) = self.array_dims.get_mut(dim) {
            *slot = extent;
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ConstantType {
        self.ty
    }

    pub fn semantic(&self) -> Semantic {
        self.semantic
    }

    pub fn semantic_index(&self) -> u32 {
        self.semantic_index
    }

    pub fn content(&self) -> Content {
        self.content
    }

    pub fn array_dims(&self) -> &[usize; MAX_ARRAY_DIMS] {
        &self.array_dims
    }

    /// Extents up to, not including, the first zero.
    pub fn leading_array_dims(&self) -> impl Iterator<Item = usize> + '_ {
        self.array_dims.iter().copied().take_while(|&d| d != 0)
    }

    pub fn is_array(&self) -> bool {
        self.array_dims.iter().any(|&d| d != 0)
    }

    /// Total element count across the leading dimensions; 1 for non-arrays.
    pub fn array_size(&self) -> usize {
        self.leading_array_dims().product()
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn set_parent_name(&mut self, parent: Option<&str>) {
        self.parent = parent.map(str::to_owned);
    }

    /// Name as referenced from code: `PARENT.name` inside a struct.
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A global parameter bound to a register or binding slot.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformParameter {
    parameter: Parameter,
    index: i32,
}

impl UniformParameter {
    pub fn new(parameter: Parameter, index: i32) -> Self {
        Self { parameter, index }
    }

    /// Binding slot or register index; negative when unassigned.
    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn is_sampler(&self) -> bool {
        self.parameter.ty().is_sampler()
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }
}

impl Deref for UniformParameter {
    type Target = Parameter;

    fn deref(&self) -> &Parameter {
        &self.parameter
    }
}

impl DerefMut for UniformParameter {
    fn deref_mut(&mut self) -> &mut Parameter {
        &mut self.parameter
    }
}

/// Constant value used directly as an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Float(f32),
    Int(i32),
    Vec(Vec<f32>),
}
