//! Seam between program management and the native shader compiler/linker.

use shadergen_core::{ConstantType, GpuProgramType};
use thiserror::Error;

/// Compiled single-stage shader object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(pub u32);

/// Linked program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Buffer object backing a uniform or shader-storage block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Diagnostic text returned by the driver when compiling, linking or
/// installing a binary fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DriverLog(pub String);

/// Location of an atomic counter: buffer binding plus byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomicSlot {
    pub binding: u32,
    pub offset: u32,
}

/// A uniform of the default block as reported by program reflection.
///
/// Names are reported verbatim, including array subscripts (`"lights[0]"`).
/// Members of uniform/storage blocks are not reported here.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveUniform {
    pub name: String,
    pub location: i32,
    pub ty: ConstantType,
    pub array_size: usize,
    /// Set for atomic counters, which have no location.
    pub atomic: Option<AtomicSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Uniform,
    ShaderStorage,
}

/// A named uniform or shader-storage block of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveBlock {
    pub name: String,
    /// Block index within the program.
    pub index: u32,
    pub data_size: usize,
}

/// Opaque driver-specific program binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBinary {
    pub format: u32,
    pub data: Vec<u8>,
}

/// Operations the native compiler/linker must provide.
///
/// Every call is synchronous and must run on the thread that owns the
/// native context.
pub trait NativeBackend {
    /// Compile one stage from source.
    fn compile(&mut self, stage: GpuProgramType, source: &str) -> Result<StageHandle, DriverLog>;

    fn delete_stage(&mut self, stage: StageHandle);

    /// Link compiled stages into a program with binary retrieval enabled.
    fn link(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, DriverLog>;

    fn delete_program(&mut self, program: ProgramHandle);

    /// Default-block uniforms in the order the driver enumerates them.
    fn active_uniforms(&self, program: ProgramHandle) -> Vec<ActiveUniform>;

    /// Named blocks of `kind` in the order the driver enumerates them.
    fn active_blocks(&self, program: ProgramHandle, kind: BlockKind) -> Vec<ActiveBlock>;

    /// Point block `block_index` of `program` at buffer binding `binding`.
    fn bind_block(&mut self, program: ProgramHandle, kind: BlockKind, block_index: u32, binding: u32);

    /// Create a buffer of `size` bytes and attach it to binding `binding`.
    fn create_block_buffer(&mut self, kind: BlockKind, binding: u32, size: usize) -> BufferHandle;

    /// Retrieve the binary of a linked program, if the driver supports it.
    fn program_binary(&self, program: ProgramHandle) -> Option<ProgramBinary>;

    /// Create a program from a previously retrieved binary.
    fn load_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramHandle, DriverLog>;
}
