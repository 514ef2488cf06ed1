//! The closed set of constant types a shader parameter can have.
//!
//! Every type knows its element size in 4-byte units. The generic size carries
//! no padding; [`ConstantType::element_size`] can also produce the padded size
//! register-based targets use, where every vector or matrix row occupies a
//! full 4-component register.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// Scalar component kind of a vector or matrix type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Double,
    Int,
    UInt,
}

/// Flat per-type buffer a constant's value is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferClass {
    Float,
    Double,
    Int,
    UInt,
    /// Struct markers and unknown types occupy no buffer storage.
    None,
}

/// Constant type of a shader parameter.
///
/// Matrix types are named `MatrixRxC` (rows x columns, HLSL order). Vector
/// families are laid out contiguously so that [`ConstantType::vector`] can
/// derive them from a component count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ConstantType {
    Float1 = 1,
    Float2 = 2,
    Float3 = 3,
    Float4 = 4,
    Sampler1D = 5,
    Sampler2D = 6,
    Sampler3D = 7,
    SamplerCube = 8,
    Sampler1DArray = 9,
    Sampler2DArray = 10,
    Sampler1DShadow = 11,
    Sampler2DShadow = 12,
    Matrix2x2 = 14,
    Matrix2x3 = 15,
    Matrix2x4 = 16,
    Matrix3x2 = 17,
    Matrix3x3 = 18,
    Matrix3x4 = 19,
    Matrix4x2 = 20,
    Matrix4x3 = 21,
    Matrix4x4 = 22,
    Int1 = 23,
    Int2 = 24,
    Int3 = 25,
    Int4 = 26,
    Double1 = 28,
    Double2 = 29,
    Double3 = 30,
    Double4 = 31,
    MatrixDouble2x2 = 32,
    MatrixDouble2x3 = 33,
    MatrixDouble2x4 = 34,
    MatrixDouble3x2 = 35,
    MatrixDouble3x3 = 36,
    MatrixDouble3x4 = 37,
    MatrixDouble4x2 = 38,
    MatrixDouble4x3 = 39,
    MatrixDouble4x4 = 40,
    UInt1 = 41,
    UInt2 = 42,
    UInt3 = 43,
    UInt4 = 44,
    Image1D = 50,
    Image2D = 51,
    Image3D = 52,
    ImageCube = 53,
    Image2DArray = 54,
    AtomicCounter = 60,
    /// Marker type of the generated stage input struct.
    ShaderIn = 70,
    /// Marker type of the generated stage output struct.
    ShaderOut = 71,
    Unknown = 99,
}

impl ConstantType {
    /// Every constant type, in discriminant order.
    pub const ALL: [ConstantType; 51] = [
        Self::Float1,
        Self::Float2,
        Self::Float3,
        Self::Float4,
        Self::Sampler1D,
        Self::Sampler2D,
        Self::Sampler3D,
        Self::SamplerCube,
        Self::Sampler1DArray,
        Self::Sampler2DArray,
        Self::Sampler1DShadow,
        Self::Sampler2DShadow,
        Self::Matrix2x2,
        Self::Matrix2x3,
        Self::Matrix2x4,
        Self::Matrix3x2,
        Self::Matrix3x3,
        Self::Matrix3x4,
        Self::Matrix4x2,
        Self::Matrix4x3,
        Self::Matrix4x4,
        Self::Int1,
        Self::Int2,
        Self::Int3,
        Self::Int4,
        Self::Double1,
        Self::Double2,
        Self::Double3,
        Self::Double4,
        Self::MatrixDouble2x2,
        Self::MatrixDouble2x3,
        Self::MatrixDouble2x4,
        Self::MatrixDouble3x2,
        Self::MatrixDouble3x3,
        Self::MatrixDouble3x4,
        Self::MatrixDouble4x2,
        Self::MatrixDouble4x3,
        Self::MatrixDouble4x4,
        Self::UInt1,
        Self::UInt2,
        Self::UInt3,
        Self::UInt4,
        Self::Image1D,
        Self::Image2D,
        Self::Image3D,
        Self::ImageCube,
        Self::Image2DArray,
        Self::AtomicCounter,
        Self::ShaderIn,
        Self::ShaderOut,
        Self::Unknown,
    ];

    /// Vector (or scalar, for `components == 1`) type of the given kind.
    pub fn vector(kind: ScalarKind, components: u32) -> Option<Self> {
        if !(1..=4).contains(&components) {
            return None;
        }
        let base = match kind {
            ScalarKind::Float => Self::Float1,
            ScalarKind::Double => Self::Double1,
            ScalarKind::Int => Self::Int1,
            ScalarKind::UInt => Self::UInt1,
        };
        Self::from_u32(base.raw() + components - 1)
    }

    /// Matrix type with `rows` x `columns` components of the given kind.
    ///
    /// Only float and double matrices exist.
    pub fn matrix(kind: ScalarKind, rows: u32, columns: u32) -> Option<Self> {
        if !(2..=4).contains(&rows) || !(2..=4).contains(&columns) {
            return None;
        }
        let base = match kind {
            ScalarKind::Float => Self::Matrix2x2,
            ScalarKind::Double => Self::MatrixDouble2x2,
            ScalarKind::Int | ScalarKind::UInt => return None,
        };
        Self::from_u32(base.raw() + (rows - 2) * 3 + (columns - 2))
    }

    /// Numeric identity of the type, stable across releases.
    pub fn raw(self) -> u32 {
        self.to_u32().unwrap_or(Self::Unknown as u32)
    }

    /// Look a type up by its numeric identity.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }

    /// Scalar kind of vector, scalar and matrix types.
    pub fn scalar_kind(self) -> Option<ScalarKind> {
        use ConstantType::*;
        match self {
            Float1 | Float2 | Float3 | Float4 => Some(ScalarKind::Float),
            Matrix2x2 | Matrix2x3 | Matrix2x4 | Matrix3x2 | Matrix3x3 | Matrix3x4 | Matrix4x2
            | Matrix4x3 | Matrix4x4 => Some(ScalarKind::Float),
            Double1 | Double2 | Double3 | Double4 => Some(ScalarKind::Double),
            MatrixDouble2x2 | MatrixDouble2x3 | MatrixDouble2x4 | MatrixDouble3x2
            | MatrixDouble3x3 | MatrixDouble3x4 | MatrixDouble4x2 | MatrixDouble4x3
            | MatrixDouble4x4 => Some(ScalarKind::Double),
            Int1 | Int2 | Int3 | Int4 => Some(ScalarKind::Int),
            UInt1 | UInt2 | UInt3 | UInt4 => Some(ScalarKind::UInt),
            _ => None,
        }
    }

    /// `(rows, columns)` of matrix types.
    pub fn matrix_dims(self) -> Option<(usize, usize)> {
        let offset = match self {
            t if (Self::Matrix2x2..=Self::Matrix4x4).contains(&t) => {
                t.raw() - Self::Matrix2x2.raw()
            }
            t if (Self::MatrixDouble2x2..=Self::MatrixDouble4x4).contains(&t) => {
                t.raw() - Self::MatrixDouble2x2.raw()
            }
            _ => return None,
        };
        Some((offset as usize / 3 + 2, offset as usize % 3 + 2))
    }

    /// Number of components of scalar and vector types.
    pub fn vector_components(self) -> Option<usize> {
        let base = match self.scalar_kind()? {
            _ if self.is_matrix() => return None,
            ScalarKind::Float => Self::Float1,
            ScalarKind::Double => Self::Double1,
            ScalarKind::Int => Self::Int1,
            ScalarKind::UInt => Self::UInt1,
        };
        Some((self.raw() - base.raw()) as usize + 1)
    }

    pub fn is_matrix(self) -> bool {
        self.matrix_dims().is_some()
    }

    pub fn is_sampler(self) -> bool {
        (Self::Sampler1D..=Self::Sampler2DShadow).contains(&self)
    }

    pub fn is_shadow_sampler(self) -> bool {
        matches!(self, Self::Sampler1DShadow | Self::Sampler2DShadow)
    }

    pub fn is_image(self) -> bool {
        (Self::Image1D..=Self::Image2DArray).contains(&self)
    }

    /// Stage input/output struct markers.
    pub fn is_struct_marker(self) -> bool {
        matches!(self, Self::ShaderIn | Self::ShaderOut)
    }

    /// Opaque handle types that are bound to a slot rather than stored by value.
    pub fn is_opaque(self) -> bool {
        self.is_sampler() || self.is_image() || self == Self::AtomicCounter
    }

    /// Buffer the value of a constant of this type lives in.
    pub fn buffer_class(self) -> BufferClass {
        match self.scalar_kind() {
            Some(ScalarKind::Float) => BufferClass::Float,
            Some(ScalarKind::Double) => BufferClass::Double,
            Some(ScalarKind::Int) => BufferClass::Int,
            Some(ScalarKind::UInt) => BufferClass::UInt,
            None if self.is_sampler() || self.is_image() => BufferClass::Int,
            None if self == Self::AtomicCounter => BufferClass::UInt,
            None => BufferClass::None,
        }
    }

    /// Size of one element in 4-byte units.
    ///
    /// With `pad_to_4` set, every vector and every matrix row is rounded up
    /// to four components, and opaque types take a full register.
    pub fn element_size(self, pad_to_4: bool) -> usize {
        let units_per_component = match self.scalar_kind() {
            Some(ScalarKind::Double) => 2,
            _ => 1,
        };
        if let Some((rows, columns)) = self.matrix_dims() {
            let per_row = if pad_to_4 { 4 } else { columns };
            return rows * per_row * units_per_component;
        }
        if let Some(components) = self.vector_components() {
            let components = if pad_to_4 { 4 } else { components };
            return components * units_per_component;
        }
        if self.is_opaque() {
            return if pad_to_4 { 4 } else { 1 };
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_and_matrix_constructors() {
        assert_eq!(ConstantType::vector(ScalarKind::Float, 3), Some(ConstantType::Float3));
        assert_eq!(ConstantType::vector(ScalarKind::UInt, 1), Some(ConstantType::UInt1));
        assert_eq!(ConstantType::vector(ScalarKind::Int, 5), None);
        assert_eq!(
            ConstantType::matrix(ScalarKind::Float, 3, 4),
            Some(ConstantType::Matrix3x4)
        );
        assert_eq!(
            ConstantType::matrix(ScalarKind::Double, 4, 2),
            Some(ConstantType::MatrixDouble4x2)
        );
        assert_eq!(ConstantType::matrix(ScalarKind::Int, 2, 2), None);
    }

    #[test]
    fn matrix_dims_follow_naming() {
        assert_eq!(ConstantType::Matrix2x3.matrix_dims(), Some((2, 3)));
        assert_eq!(ConstantType::Matrix4x2.matrix_dims(), Some((4, 2)));
        assert_eq!(ConstantType::MatrixDouble3x3.matrix_dims(), Some((3, 3)));
        assert_eq!(ConstantType::Float4.matrix_dims(), None);
    }

    #[test]
    fn unpadded_element_sizes() {
        assert_eq!(ConstantType::Float1.element_size(false), 1);
        assert_eq!(ConstantType::Float3.element_size(false), 3);
        assert_eq!(ConstantType::Int4.element_size(false), 4);
        assert_eq!(ConstantType::Double3.element_size(false), 6);
        assert_eq!(ConstantType::Matrix2x3.element_size(false), 6);
        assert_eq!(ConstantType::Matrix4x4.element_size(false), 16);
        assert_eq!(ConstantType::MatrixDouble2x2.element_size(false), 8);
        assert_eq!(ConstantType::Sampler2D.element_size(false), 1);
        assert_eq!(ConstantType::AtomicCounter.element_size(false), 1);
        assert_eq!(ConstantType::ShaderIn.element_size(false), 0);
        assert_eq!(ConstantType::Unknown.element_size(false), 0);
    }

    #[test]
    fn padded_element_sizes() {
        assert_eq!(ConstantType::Float1.element_size(true), 4);
        assert_eq!(ConstantType::Matrix2x3.element_size(true), 8);
        assert_eq!(ConstantType::Matrix3x2.element_size(true), 12);
        assert_eq!(ConstantType::Double2.element_size(true), 8);
        assert_eq!(ConstantType::SamplerCube.element_size(true), 4);
    }

    #[test]
    fn every_type_round_trips_its_raw_value() {
        for ty in ConstantType::ALL {
            assert_eq!(ConstantType::from_raw(ty.raw()), Some(ty));
        }
    }

    #[test]
    fn buffer_classes() {
        assert_eq!(ConstantType::Matrix4x4.buffer_class(), BufferClass::Float);
        assert_eq!(ConstantType::Double1.buffer_class(), BufferClass::Double);
        assert_eq!(ConstantType::Sampler2D.buffer_class(), BufferClass::Int);
        assert_eq!(ConstantType::AtomicCounter.buffer_class(), BufferClass::UInt);
        assert_eq!(ConstantType::ShaderOut.buffer_class(), BufferClass::None);
    }
}
