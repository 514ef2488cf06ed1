//! Functions and the statement units ("atoms") that make up their bodies.

use bitflags::bitflags;

use crate::{GpuProgramType, Literal};

/// Role of a function inside its program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionType {
    Internal,
    VertexMain,
    GeometryMain,
    PixelMain,
    HullMain,
    DomainMain,
    ComputeMain,
}

impl FunctionType {
    pub fn is_main(self) -> bool {
        self != FunctionType::Internal
    }

    /// Program type this function is the entry point of.
    pub fn program_type(self) -> Option<GpuProgramType> {
        Some(match self {
            FunctionType::Internal => return None,
            FunctionType::VertexMain => GpuProgramType::Vertex,
            FunctionType::GeometryMain => GpuProgramType::Geometry,
            FunctionType::PixelMain => GpuProgramType::Fragment,
            FunctionType::HullMain => GpuProgramType::Hull,
            FunctionType::DomainMain => GpuProgramType::Domain,
            FunctionType::ComputeMain => GpuProgramType::Compute,
        })
    }

    pub fn main_for(program_type: GpuProgramType) -> Self {
        match program_type {
            GpuProgramType::Vertex => FunctionType::VertexMain,
            GpuProgramType::Fragment => FunctionType::PixelMain,
            GpuProgramType::Geometry => FunctionType::GeometryMain,
            GpuProgramType::Hull => FunctionType::HullMain,
            GpuProgramType::Domain => FunctionType::DomainMain,
            GpuProgramType::Compute => FunctionType::ComputeMain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub(crate) usize);

/// Handle to a function-scoped parameter (input, output or local).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformId(pub(crate) usize);

/// Any parameter an operand can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamRef {
    Uniform(UniformId),
    Function(ParamId),
}

impl From<UniformId> for ParamRef {
    fn from(id: UniformId) -> Self {
        ParamRef::Uniform(id)
    }
}

impl From<ParamId> for ParamRef {
    fn from(id: ParamId) -> Self {
        ParamRef::Function(id)
    }
}

bitflags! {
    /// Components of an operand that take part in an operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperandMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const W = 1 << 3;
    }
}

impl OperandMask {
    pub const XY: Self = Self::X.union(Self::Y);
    pub const XYZ: Self = Self::XY.union(Self::Z);

    /// Swizzle suffix; empty when the whole value is used.
    pub fn swizzle(self) -> String {
        if self.is_empty() || self == Self::all() {
            return String::new();
        }
        let mut out = String::from(".");
        for (flag, c) in [(Self::X, 'x'), (Self::Y, 'y'), (Self::Z, 'z'), (Self::W, 'w')] {
            if self.contains(flag) {
                out.push(c);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandDirection {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperandTarget {
    Param(ParamRef),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub target: OperandTarget,
    pub direction: OperandDirection,
    pub mask: OperandMask,
}

impl Operand {
    pub fn input(param: impl Into<ParamRef>) -> Self {
        Self::new(param, OperandDirection::In)
    }

    pub fn output(param: impl Into<ParamRef>) -> Self {
        Self::new(param, OperandDirection::Out)
    }

    pub fn inout(param: impl Into<ParamRef>) -> Self {
        Self::new(param, OperandDirection::InOut)
    }

    pub fn literal(value: Literal) -> Self {
        Self {
            target: OperandTarget::Literal(value),
            direction: OperandDirection::In,
            mask: OperandMask::all(),
        }
    }

    pub fn with_mask(mut self, mask: OperandMask) -> Self {
        self.mask = mask;
        self
    }

    fn new(param: impl Into<ParamRef>, direction: OperandDirection) -> Self {
        Self {
            target: OperandTarget::Param(param.into()),
            direction,
            mask: OperandMask::all(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    /// Matrix product; `mul(a, b)` in HLSL and `a * b` in GLSL.
    MatMul,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul | BinaryOperator::MatMul => "*",
            BinaryOperator::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomKind {
    /// Call of an internal or library function.
    Invoke {
        function: String,
        operands: Vec<Operand>,
    },
    Assign {
        dst: Operand,
        src: Operand,
    },
    Binary {
        op: BinaryOperator,
        dst: Operand,
        lhs: Operand,
        rhs: Operand,
    },
    Sample {
        dst: Operand,
        sampler: Operand,
        coords: Operand,
    },
}

/// One statement of a function body.
///
/// Atoms are emitted by ascending `group_order`; atoms sharing a group keep
/// their registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAtom {
    pub group_order: i32,
    pub kind: AtomKind,
}

impl FunctionAtom {
    pub fn new(group_order: i32, kind: AtomKind) -> Self {
        Self { group_order, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) ty: FunctionType,
    pub(crate) inputs: Vec<ParamId>,
    pub(crate) outputs: Vec<ParamId>,
    pub(crate) locals: Vec<ParamId>,
    pub(crate) atoms: Vec<FunctionAtom>,
}

impl Function {
    pub(crate) fn new(name: String, ty: FunctionType) -> Self {
        Self {
            name,
            ty,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locals: Vec::new(),
            atoms: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> FunctionType {
        self.ty
    }

    pub fn inputs(&self) -> &[ParamId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ParamId] {
        &self.outputs
    }

    pub fn locals(&self) -> &[ParamId] {
        &self.locals
    }

    /// Atoms in registration order.
    pub fn atoms(&self) -> &[FunctionAtom] {
        &self.atoms
    }

    /// Atoms in execution order.
    pub fn ordered_atoms(&self) -> Vec<&FunctionAtom> {
        let mut atoms: Vec<_> = self.atoms.iter().collect();
        // `sort_by_key` is stable, equal groups keep registration order.
        atoms.sort_by_key(|atom| atom.group_order);
        atoms
    }
}
