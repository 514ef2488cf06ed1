//! The shader context: generation, compilation, linking and caching.
//!
//! A [`ShaderContext`] owns a [`NativeBackend`] and every stage and program
//! created through it. The microcode cache and the shared block registry sit
//! behind `Arc`s so several contexts (one per GL context, say) can share
//! them.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use gpu_program::{
    resolve_bindings, GpuNamedConstants, MicrocodeCache, NativeBackend, ProgramHandle,
    SharedBlockRegistry, StageConstants, StageHandle,
};
use shadergen_core::{
    GpuProgramType, Program, RenderCapabilities, ShaderError, ShaderLanguage,
};
use tracing::{debug, error, warn};

use crate::{
    stage::{GpuProgram, LinkedProgram, StageId, StageSet},
    includes::{resolve_includes, ResourceProvider},
    writer::{writer_for, WriterOptions},
};

/// How a [`ShaderContext`] generates and caches programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Language every generated program must target.
    pub language: ShaderLanguage,
    /// Install linked programs from, and store them into, the microcode cache.
    pub cache_enabled: bool,
    /// File the microcode cache is saved to and loaded from.
    pub cache_path: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            language: ShaderLanguage::Glsl,
            cache_enabled: true,
            cache_path: None,
        }
    }
}

pub struct ShaderContext<B: NativeBackend> {
    backend: B,
    caps: RenderCapabilities,
    options: WriterOptions,
    config: ContextConfig,
    cache: Arc<MicrocodeCache>,
    blocks: Arc<SharedBlockRegistry>,
    resources: Option<Box<dyn ResourceProvider>>,
    stages: BTreeMap<StageId, GpuProgram>,
    linked: HashMap<u32, LinkedProgram>,
    next_stage_id: u32,
}

impl<B: NativeBackend> ShaderContext<B> {
    /// Context with writer options derived from `caps` and its own cache and
    /// block registry.
    pub fn new(backend: B, caps: RenderCapabilities, config: ContextConfig) -> Self {
        let options = WriterOptions::from_capabilities(&caps);
        debug!(?options, language = %config.language, "created shader context");
        Self {
            backend,
            caps,
            options,
            config,
            cache: Arc::new(MicrocodeCache::new()),
            blocks: Arc::new(SharedBlockRegistry::new()),
            resources: None,
            stages: BTreeMap::new(),
            linked: HashMap::new(),
            next_stage_id: 1,
        }
    }

    /// Share a microcode cache and block registry with other contexts.
    pub fn with_shared(
        mut self,
        cache: Arc<MicrocodeCache>,
        blocks: Arc<SharedBlockRegistry>,
    ) -> Self {
        self.cache = cache;
        self.blocks = blocks;
        self
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `#include` directives in GLSL through `resources`.
    pub fn with_resources(mut self, resources: impl ResourceProvider + 'static) -> Self {
        self.resources = Some(Box::new(resources));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn capabilities(&self) -> &RenderCapabilities {
        &self.caps
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn microcode_cache(&self) -> &Arc<MicrocodeCache> {
        &self.cache
    }

    pub fn block_registry(&self) -> &Arc<SharedBlockRegistry> {
        &self.blocks
    }

    pub fn stage(&self, id: StageId) -> Option<&GpuProgram> {
        self.stages.get(&id)
    }

    pub fn linked_program(&self, key: u32) -> Option<&LinkedProgram> {
        self.linked.get(&key)
    }

    // ------------------------------------------------------------------
    // Generation and compilation
    // ------------------------------------------------------------------

    /// Validate `program` and write it in the configured language.
    pub fn generate_source(&self, program: &mut Program) -> Result<String, ShaderError> {
        program.validate()?;
        let source = writer_for(self.config.language, self.options).write_program(program)?;
        debug!(
            program = program.name(),
            language = %self.config.language,
            bytes = source.len(),
            "generated program source"
        );
        Ok(source)
    }

    /// Generate and compile one stage from a program model.
    pub fn create_stage(&mut self, program: &mut Program) -> Result<StageId> {
        let source = self
            .generate_source(program)
            .with_context(|| format!("failed to generate program '{}'", program.name()))?;
        let constants = GpuNamedConstants::from_program(program);
        self.compile_stage(
            program.name().to_owned(),
            program.program_type(),
            source,
            Some(constants),
        )
    }

    /// Compile one stage from hand-written GLSL.
    ///
    /// Uniform definitions are scanned from the source text, which is only
    /// supported for GLSL; HLSL stages must come from a program model.
    pub fn create_stage_from_source(
        &mut self,
        name: &str,
        program_type: GpuProgramType,
        source: &str,
    ) -> Result<StageId> {
        if self.config.language != ShaderLanguage::Glsl {
            return Err(ShaderError::InvalidProgram(format!(
                "'{name}': uniforms cannot be read from {} source; build it from a program instead",
                self.config.language
            ))
            .into());
        }
        self.compile_stage(name.to_owned(), program_type, source.to_owned(), None)
    }

    fn compile_stage(
        &mut self,
        name: String,
        program_type: GpuProgramType,
        source: String,
        constants: Option<GpuNamedConstants>,
    ) -> Result<StageId> {
        let source = match (&self.resources, self.config.language) {
            (Some(resources), ShaderLanguage::Glsl) => resolve_includes(&source, &**resources)
                .with_context(|| format!("failed to resolve includes of '{name}'"))?,
            _ => source,
        };
        let constants =
            constants.unwrap_or_else(|| GpuNamedConstants::from_glsl_source(&source));

        let handle = match self.backend.compile(program_type, &source) {
            Ok(handle) => handle,
            Err(log) => {
                error!(program = %name, stage = program_type.name(), %log, "compile failed");
                return Err(ShaderError::Compile {
                    program: name,
                    log: log.0,
                }
                .into());
            }
        };

        let id = StageId(self.next_stage_id);
        self.next_stage_id += 1;
        debug!(
            program = %name,
            stage = program_type.name(),
            id = id.get(),
            constants = constants.len(),
            "compiled stage"
        );
        self.stages.insert(
            id,
            GpuProgram {
                id,
                name,
                program_type,
                language: self.config.language,
                source,
                handle,
                constants,
            },
        );
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------

    /// Link `stages` into a program, reusing an earlier link or a cached
    /// binary when possible.
    pub fn link(&mut self, stages: &StageSet) -> Result<&LinkedProgram> {
        let key = stages.key();
        if key == 0 {
            bail!("cannot link an empty stage set");
        }
        if !self.linked.contains_key(&key) {
            let name = self.program_name(stages)?;
            let linked = self
                .link_new(stages, key, &name)
                .with_context(|| format!("failed to link program '{name}'"))?;
            self.linked.insert(key, linked);
        }
        self.linked
            .get(&key)
            .ok_or_else(|| anyhow!("linked program {key:#010x} vanished"))
    }

    fn program_name(&self, stages: &StageSet) -> Result<String> {
        let names = stages
            .iter()
            .map(|(_, id)| {
                self.stages
                    .get(&id)
                    .map(GpuProgram::name)
                    .ok_or_else(|| anyhow!("unknown stage id {}", id.get()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(names.join("+"))
    }

    fn stage_handles(&self, stages: &StageSet) -> Vec<StageHandle> {
        stages
            .iter()
            .filter_map(|(_, id)| self.stages.get(&id).map(GpuProgram::handle))
            .collect()
    }

    fn link_new(
        &mut self,
        stages: &StageSet,
        key: u32,
        name: &str,
    ) -> Result<LinkedProgram, ShaderError> {
        if self.config.cache_enabled {
            if let Some(handle) = self.cache.try_load(key, &mut self.backend) {
                return Ok(self.finish(stages, key, name, handle, true));
            }
        }

        let handles = self.stage_handles(stages);
        let handle = match self.backend.link(&handles) {
            Ok(handle) => handle,
            Err(log) => {
                warn!(program = name, %log, "link failed, recompiling attached stages");
                self.recompile(stages)?;
                let handles = self.stage_handles(stages);
                self.backend
                    .link(&handles)
                    .map_err(|log| {
                        error!(program = name, %log, "relink failed");
                        ShaderError::Link {
                            program: name.to_owned(),
                            log: log.0,
                        }
                    })?
            }
        };

        if self.config.cache_enabled {
            self.cache.store(key, handle, &self.backend);
        }
        Ok(self.finish(stages, key, name, handle, false))
    }

    /// Compile every attached stage again from its stored source.
    fn recompile(&mut self, stages: &StageSet) -> Result<(), ShaderError> {
        for (_, id) in stages.iter() {
            let Some(stage) = self.stages.get_mut(&id) else {
                continue;
            };
            let handle = self
                .backend
                .compile(stage.program_type, &stage.source)
                .map_err(|log| ShaderError::Compile {
                    program: stage.name.clone(),
                    log: log.0,
                })?;
            self.backend.delete_stage(stage.handle);
            stage.handle = handle;
        }
        Ok(())
    }

    fn finish(
        &mut self,
        stages: &StageSet,
        key: u32,
        name: &str,
        handle: ProgramHandle,
        from_cache: bool,
    ) -> LinkedProgram {
        let mut constants: StageConstants<'_> = [None; GpuProgramType::COUNT];
        for (ty, id) in stages.iter() {
            constants[ty.index()] = self.stages.get(&id).map(GpuProgram::constants);
        }
        let bindings = resolve_bindings(&mut self.backend, &self.caps, handle, &constants, &self.blocks);
        debug!(program = name, key, from_cache, "linked program");

        LinkedProgram {
            key,
            name: name.to_owned(),
            handle,
            bindings,
            from_cache,
        }
    }

    // ------------------------------------------------------------------
    // Microcode persistence
    // ------------------------------------------------------------------

    /// Write the microcode cache to the configured path if it changed.
    ///
    /// Returns whether a file was written.
    pub fn save_microcode_cache(&self) -> Result<bool> {
        let Some(path) = self.config.cache_path.as_deref() else {
            return Ok(false);
        };
        if !self.config.cache_enabled || !self.cache.is_dirty() {
            return Ok(false);
        }
        self.cache
            .save_to_file(path)
            .with_context(|| format!("failed to write microcode cache '{}'", path.display()))?;
        debug!(path = %path.display(), entries = self.cache.len(), "saved microcode cache");
        Ok(true)
    }

    /// Merge the microcode cache file at the configured path.
    ///
    /// A missing or foreign file merges nothing.
    pub fn load_microcode_cache(&self) -> Result<usize> {
        let Some(path) = self.config.cache_path.as_deref() else {
            return Ok(0);
        };
        if !self.config.cache_enabled {
            return Ok(0);
        }
        self.cache
            .load_from_file(path)
            .with_context(|| format!("failed to read microcode cache '{}'", path.display()))
    }
}

impl<B: NativeBackend> Drop for ShaderContext<B> {
    fn drop(&mut self) {
        for linked in self.linked.values() {
            self.backend.delete_program(linked.handle);
        }
        for stage in self.stages.values() {
            self.backend.delete_stage(stage.handle);
        }
    }
}
