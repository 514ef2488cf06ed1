//! Compiled stages and linked programs owned by a [`ShaderContext`].
//!
//! [`ShaderContext`]: crate::ShaderContext

use gpu_program::{compute_key, GpuNamedConstants, ProgramBindings, ProgramHandle, StageHandle};
use shadergen_core::{GpuProgramType, ShaderLanguage};

/// Context-assigned identity of a compiled stage. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) u32);

impl StageId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// One compiled shader stage.
#[derive(Debug)]
pub struct GpuProgram {
    pub(crate) id: StageId,
    pub(crate) name: String,
    pub(crate) program_type: GpuProgramType,
    pub(crate) language: ShaderLanguage,
    /// Source as handed to the compiler, includes already inlined.
    pub(crate) source: String,
    pub(crate) handle: StageHandle,
    pub(crate) constants: GpuNamedConstants,
}

impl GpuProgram {
    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program_type(&self) -> GpuProgramType {
        self.program_type
    }

    pub fn language(&self) -> ShaderLanguage {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn handle(&self) -> StageHandle {
        self.handle
    }

    pub fn constants(&self) -> &GpuNamedConstants {
        &self.constants
    }
}

/// The stages attached to one program, at most one per stage type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSet {
    slots: [Option<StageId>; GpuProgramType::COUNT],
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `stage`, replacing any stage of the same type.
    pub fn with(mut self, stage: &GpuProgram) -> Self {
        self.attach(stage.program_type, stage.id);
        self
    }

    pub fn attach(&mut self, program_type: GpuProgramType, id: StageId) {
        self.slots[program_type.index()] = Some(id);
    }

    pub fn get(&self, program_type: GpuProgramType) -> Option<StageId> {
        self.slots[program_type.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Attached stages in stage-type order.
    pub fn iter(&self) -> impl Iterator<Item = (GpuProgramType, StageId)> + '_ {
        GpuProgramType::ALL
            .into_iter()
            .filter_map(|ty| self.get(ty).map(|id| (ty, id)))
    }

    /// Microcode cache key of this combination; zero only when empty.
    pub fn key(&self) -> u32 {
        let ids: Vec<Option<u32>> = GpuProgramType::ALL
            .into_iter()
            .map(|ty| self.get(ty).map(StageId::get))
            .collect();
        compute_key(&ids)
    }
}

/// A linked program and its resolved bindings.
#[derive(Debug)]
pub struct LinkedProgram {
    pub(crate) key: u32,
    pub(crate) name: String,
    pub(crate) handle: ProgramHandle,
    pub(crate) bindings: ProgramBindings,
    pub(crate) from_cache: bool,
}

impl LinkedProgram {
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Stage names joined with `+`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }

    /// Whether the program was installed from the microcode cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }
}
