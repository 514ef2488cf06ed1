//! Recording in-memory [`NativeBackend`] for tests without a GL context.

use std::collections::HashMap;

use shadergen_core::GpuProgramType;

use crate::{
    ActiveBlock, ActiveUniform, BlockKind, BufferHandle, DriverLog, NativeBackend,
    ProgramBinary, ProgramHandle, StageHandle,
};

/// Binary format the mock driver produces and accepts.
pub const MOCK_BINARY_FORMAT: u32 = 0x5347_0001;

#[derive(Debug)]
pub struct MockBackend {
    next_id: u32,
    /// Every source passed to `compile`, in call order.
    pub compiled: Vec<(GpuProgramType, String)>,
    /// Sources containing this marker fail to compile.
    pub compile_error_marker: Option<String>,
    /// Number of upcoming `link` calls that fail.
    pub pending_link_failures: usize,
    pub link_calls: usize,
    pub linked: HashMap<ProgramHandle, Vec<StageHandle>>,
    pub deleted_programs: Vec<ProgramHandle>,
    pub deleted_stages: Vec<StageHandle>,
    /// Reflection data reported for every program.
    pub uniforms: Vec<ActiveUniform>,
    pub uniform_blocks: Vec<ActiveBlock>,
    pub storage_blocks: Vec<ActiveBlock>,
    pub block_bindings: Vec<(ProgramHandle, BlockKind, u32, u32)>,
    pub buffers: Vec<(BlockKind, u32, usize)>,
    /// Format `program_binary` reports and `load_binary` accepts.
    pub binary_format: u32,
    pub binaries_supported: bool,
    pub loaded_binaries: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            next_id: 0,
            compiled: Vec::new(),
            compile_error_marker: None,
            pending_link_failures: 0,
            link_calls: 0,
            linked: HashMap::new(),
            deleted_programs: Vec::new(),
            deleted_stages: Vec::new(),
            uniforms: Vec::new(),
            uniform_blocks: Vec::new(),
            storage_blocks: Vec::new(),
            block_bindings: Vec::new(),
            buffers: Vec::new(),
            binary_format: MOCK_BINARY_FORMAT,
            binaries_supported: true,
            loaded_binaries: 0,
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl NativeBackend for MockBackend {
    fn compile(&mut self, stage: GpuProgramType, source: &str) -> Result<StageHandle, DriverLog> {
        self.compiled.push((stage, source.to_owned()));
        if let Some(marker) = &self.compile_error_marker {
            if source.contains(marker.as_str()) {
                return Err(DriverLog(format!("0(1) : error C0000: unexpected '{marker}'")));
            }
        }
        Ok(StageHandle(self.next()))
    }

    fn delete_stage(&mut self, stage: StageHandle) {
        self.deleted_stages.push(stage);
    }

    fn link(&mut self, stages: &[StageHandle]) -> Result<ProgramHandle, DriverLog> {
        self.link_calls += 1;
        if self.pending_link_failures > 0 {
            self.pending_link_failures -= 1;
            return Err(DriverLog("error: varying 'oUv' not written".to_owned()));
        }
        let program = ProgramHandle(self.next());
        self.linked.insert(program, stages.to_vec());
        Ok(program)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.linked.remove(&program);
        self.deleted_programs.push(program);
    }

    fn active_uniforms(&self, _program: ProgramHandle) -> Vec<ActiveUniform> {
        self.uniforms.clone()
    }

    fn active_blocks(&self, _program: ProgramHandle, kind: BlockKind) -> Vec<ActiveBlock> {
        match kind {
            BlockKind::Uniform => self.uniform_blocks.clone(),
            BlockKind::ShaderStorage => self.storage_blocks.clone(),
        }
    }

    fn bind_block(&mut self, program: ProgramHandle, kind: BlockKind, block_index: u32, binding: u32) {
        self.block_bindings.push((program, kind, block_index, binding));
    }

    fn create_block_buffer(&mut self, kind: BlockKind, binding: u32, size: usize) -> BufferHandle {
        self.buffers.push((kind, binding, size));
        BufferHandle(self.next())
    }

    fn program_binary(&self, program: ProgramHandle) -> Option<ProgramBinary> {
        if !self.binaries_supported {
            return None;
        }
        Some(ProgramBinary {
            format: self.binary_format,
            data: program.0.to_le_bytes().to_vec(),
        })
    }

    fn load_binary(&mut self, binary: &ProgramBinary) -> Result<ProgramHandle, DriverLog> {
        if binary.format != self.binary_format {
            return Err(DriverLog(format!(
                "binary format {:#x} not supported",
                binary.format
            )));
        }
        self.loaded_binaries += 1;
        let program = ProgramHandle(self.next());
        self.linked.insert(program, Vec::new());
        Ok(program)
    }
}
