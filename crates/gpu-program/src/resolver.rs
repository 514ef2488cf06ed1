//! Connects the constants a linked program actually uses to their
//! definitions and binding points.

use std::collections::BTreeMap;

use shadergen_core::{Capabilities, GpuProgramType};
use tracing::{debug, trace};

use crate::{
    ActiveUniform, AtomicSlot, BlockKind, BufferHandle, ConstantDefinition, GpuNamedConstants,
    NativeBackend, ProgramHandle, SharedBlockRegistry,
};

/// Stage priority when a uniform name is defined by more than one stage.
pub const RESOLUTION_ORDER: [GpuProgramType; GpuProgramType::COUNT] = [
    GpuProgramType::Vertex,
    GpuProgramType::Geometry,
    GpuProgramType::Fragment,
    GpuProgramType::Hull,
    GpuProgramType::Domain,
    GpuProgramType::Compute,
];

/// Constant definitions of each attached stage, indexed by
/// [`GpuProgramType::index`].
pub type StageConstants<'a> = [Option<&'a GpuNamedConstants>; GpuProgramType::COUNT];

/// A uniform of a linked program bound to its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformReference {
    /// Root name, without array subscript.
    pub name: String,
    pub location: i32,
    /// Stage whose definition was used.
    pub stage: GpuProgramType,
    pub definition: ConstantDefinition,
    pub atomic: Option<AtomicSlot>,
}

/// A named block of a linked program and the shared buffer behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBinding {
    pub name: String,
    pub kind: BlockKind,
    pub block_index: u32,
    pub binding: u32,
    pub buffer: BufferHandle,
}

/// Everything the resolver learned about a linked program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramBindings {
    pub uniforms: Vec<UniformReference>,
    pub uniform_blocks: BTreeMap<String, BlockBinding>,
    pub storage_blocks: BTreeMap<String, BlockBinding>,
}

impl ProgramBindings {
    pub fn uniform(&self, name: &str) -> Option<&UniformReference> {
        self.uniforms.iter().find(|u| u.name == name)
    }
}

pub fn supports_uniform_blocks(caps: &dyn Capabilities) -> bool {
    caps.has_min_version(3, 1) || caps.check_extension("GL_ARB_uniform_buffer_object")
}

pub fn supports_storage_blocks(caps: &dyn Capabilities) -> bool {
    caps.has_min_version(4, 3) || caps.check_extension("GL_ARB_shader_storage_buffer_object")
}

pub fn supports_atomic_counters(caps: &dyn Capabilities) -> bool {
    caps.has_min_version(4, 2) || caps.check_extension("GL_ARB_shader_atomic_counters")
}

/// Root name of a reflected uniform, `None` for non-first array elements.
///
/// Every trailing `[n]` group is stripped; the name stands for the array
/// only when all subscripts are zero (`grid[0][0]`).
fn root_name(name: &str) -> Option<&str> {
    let mut root = name;
    while let Some(inner) = root.strip_suffix(']') {
        let open = inner.rfind('[')?;
        if &inner[open + 1..] != "0" {
            return None;
        }
        root = &inner[..open];
    }
    (!root.is_empty() && !root.contains(['[', ']'])).then_some(root)
}

/// Bind reflected uniforms to the first stage (in [`RESOLUTION_ORDER`])
/// that defines them.
///
/// Only the `[0]` entry of an array is kept; it stands for the whole array.
/// Names no stage defines, such as driver built-ins, are skipped.
pub fn extract_uniforms(
    active: &[ActiveUniform],
    constants: &StageConstants<'_>,
) -> Vec<UniformReference> {
    let mut references = Vec::new();
    for uniform in active {
        let Some(name) = root_name(&uniform.name) else {
            continue;
        };
        let found = RESOLUTION_ORDER.iter().find_map(|&stage| {
            constants[stage.index()]
                .and_then(|c| c.get(name))
                .map(|definition| (stage, *definition))
        });
        let Some((stage, definition)) = found else {
            trace!(%name, "uniform has no definition");
            continue;
        };
        trace!(%name, stage = stage.name(), location = uniform.location, "resolved uniform");
        references.push(UniformReference {
            name: name.to_owned(),
            location: uniform.location,
            stage,
            definition,
            atomic: uniform.atomic,
        });
    }
    references
}

/// Attach every active block of `kind` to its shared buffer.
///
/// Blocks are processed in driver order; a later block with the same name
/// replaces an earlier one.
pub fn resolve_blocks<B: NativeBackend + ?Sized>(
    backend: &mut B,
    program: ProgramHandle,
    kind: BlockKind,
    registry: &SharedBlockRegistry,
) -> BTreeMap<String, BlockBinding> {
    let mut bindings = BTreeMap::new();
    for block in backend.active_blocks(program, kind) {
        let shared = registry.get_or_create(backend, kind, &block.name, block.data_size);
        backend.bind_block(program, kind, block.index, shared.binding);
        bindings.insert(
            block.name.clone(),
            BlockBinding {
                name: block.name,
                kind,
                block_index: block.index,
                binding: shared.binding,
                buffer: shared.buffer,
            },
        );
    }
    bindings
}

/// Run all resolution passes the capabilities allow.
pub fn resolve_bindings<B: NativeBackend + ?Sized>(
    backend: &mut B,
    caps: &dyn Capabilities,
    program: ProgramHandle,
    constants: &StageConstants<'_>,
    registry: &SharedBlockRegistry,
) -> ProgramBindings {
    let mut active = backend.active_uniforms(program);
    if !supports_atomic_counters(caps) {
        active.retain(|u| u.atomic.is_none());
    }

    let mut bindings = ProgramBindings {
        uniforms: extract_uniforms(&active, constants),
        ..Default::default()
    };
    if supports_uniform_blocks(caps) {
        bindings.uniform_blocks = resolve_blocks(backend, program, BlockKind::Uniform, registry);
    }
    if supports_storage_blocks(caps) {
        bindings.storage_blocks =
            resolve_blocks(backend, program, BlockKind::ShaderStorage, registry);
    }

    debug!(
        ?program,
        uniforms = bindings.uniforms.len(),
        uniform_blocks = bindings.uniform_blocks.len(),
        storage_blocks = bindings.storage_blocks.len(),
        "resolved program bindings"
    );
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use shadergen_core::{ConstantType, RenderCapabilities};

    fn active(name: &str, location: i32) -> ActiveUniform {
        ActiveUniform {
            name: name.to_owned(),
            location,
            ty: ConstantType::Float4,
            array_size: 1,
            atomic: None,
        }
    }

    #[test]
    fn array_elements_collapse_to_root() {
        let mut vs = GpuNamedConstants::new(false);
        vs.define("lightColor", ConstantType::Float4, 3);
        let mut constants: StageConstants<'_> = Default::default();
        constants[GpuProgramType::Vertex.index()] = Some(&vs);

        let reflected = [
            active("lightColor[0]", 4),
            active("lightColor[1]", 5),
            active("lightColor[2]", 6),
        ];
        let refs = extract_uniforms(&reflected, &constants);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "lightColor");
        assert_eq!(refs[0].location, 4);
        assert_eq!(refs[0].definition.array_size, 3);
    }

    #[test]
    fn nested_array_elements_collapse_to_root() {
        let mut fs = GpuNamedConstants::new(false);
        fs.define("grid", ConstantType::Float4, 8);
        let mut constants: StageConstants<'_> = Default::default();
        constants[GpuProgramType::Fragment.index()] = Some(&fs);

        let reflected = [
            active("grid[0][0]", 2),
            active("grid[0][1]", 3),
            active("grid[1][0]", 6),
        ];
        let refs = extract_uniforms(&reflected, &constants);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "grid");
        assert_eq!(refs[0].location, 2);
        assert_eq!(refs[0].stage, GpuProgramType::Fragment);
        assert_eq!(refs[0].definition.array_size, 8);
    }

    #[test]
    fn first_stage_in_priority_order_wins() {
        let mut fs = GpuNamedConstants::new(false);
        fs.define("shared", ConstantType::Float1, 1);
        let mut gs = GpuNamedConstants::new(false);
        gs.define("pad", ConstantType::Float4, 1);
        gs.define("shared", ConstantType::Float1, 1);
        let mut constants: StageConstants<'_> = Default::default();
        constants[GpuProgramType::Fragment.index()] = Some(&fs);
        constants[GpuProgramType::Geometry.index()] = Some(&gs);

        let refs = extract_uniforms(&[active("shared", 0)], &constants);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].stage, GpuProgramType::Geometry);
        assert_eq!(refs[0].definition.physical_index, 16);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let constants: StageConstants<'_> = Default::default();
        let refs = extract_uniforms(&[active("gl_ModelViewMatrix", 0)], &constants);
        assert!(refs.is_empty());
    }

    fn block(name: &str, index: u32, data_size: usize) -> crate::ActiveBlock {
        crate::ActiveBlock {
            name: name.to_owned(),
            index,
            data_size,
        }
    }

    #[test]
    fn blocks_share_buffers_and_bind_sequentially() {
        let mut backend = MockBackend::new();
        backend.uniform_blocks = vec![block("Camera", 0, 128), block("Lights", 1, 256)];
        backend.storage_blocks = vec![block("Particles", 0, 4096)];
        let registry = SharedBlockRegistry::new();
        let caps = RenderCapabilities::new(4, 3);
        let constants: StageConstants<'_> = Default::default();

        let first = resolve_bindings(&mut backend, &caps, ProgramHandle(100), &constants, &registry);
        assert_eq!(first.uniform_blocks["Camera"].binding, 0);
        assert_eq!(first.uniform_blocks["Lights"].binding, 1);
        assert_eq!(first.storage_blocks["Particles"].binding, 0);
        assert_eq!(backend.buffers.len(), 3);

        backend.uniform_blocks = vec![block("Lights", 0, 256), block("Skin", 1, 64)];
        let second = resolve_bindings(&mut backend, &caps, ProgramHandle(101), &constants, &registry);
        assert_eq!(second.uniform_blocks["Lights"].binding, 1);
        assert_eq!(
            second.uniform_blocks["Lights"].buffer,
            first.uniform_blocks["Lights"].buffer
        );
        assert_eq!(second.uniform_blocks["Skin"].binding, 2);
        assert_eq!(backend.buffers.len(), 4);
        assert!(backend
            .block_bindings
            .contains(&(ProgramHandle(101), BlockKind::Uniform, 0, 1)));
    }

    #[test]
    fn later_duplicate_block_wins() {
        let mut backend = MockBackend::new();
        backend.uniform_blocks = vec![block("Dup", 0, 16), block("Dup", 3, 16)];
        let registry = SharedBlockRegistry::new();
        let blocks = resolve_blocks(&mut backend, ProgramHandle(1), BlockKind::Uniform, &registry);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks["Dup"].block_index, 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn old_capability_levels_skip_block_passes() {
        let mut backend = MockBackend::new();
        backend.uniform_blocks = vec![block("Camera", 0, 128)];
        backend.storage_blocks = vec![block("Particles", 0, 64)];
        backend.uniforms = vec![ActiveUniform {
            name: "hits".to_owned(),
            location: -1,
            ty: ConstantType::AtomicCounter,
            array_size: 1,
            atomic: Some(AtomicSlot { binding: 2, offset: 4 }),
        }];
        let mut fs = GpuNamedConstants::new(false);
        fs.define("hits", ConstantType::AtomicCounter, 1);
        let mut constants: StageConstants<'_> = Default::default();
        constants[GpuProgramType::Fragment.index()] = Some(&fs);
        let registry = SharedBlockRegistry::new();

        let caps = RenderCapabilities::new(3, 0);
        let bindings = resolve_bindings(&mut backend, &caps, ProgramHandle(1), &constants, &registry);
        assert!(bindings.uniform_blocks.is_empty());
        assert!(bindings.storage_blocks.is_empty());
        assert!(bindings.uniforms.is_empty());
        assert!(registry.is_empty());

        let caps = RenderCapabilities::new(3, 3)
            .with_extension("GL_ARB_uniform_buffer_object")
            .with_extension("GL_ARB_shader_atomic_counters");
        let bindings = resolve_bindings(&mut backend, &caps, ProgramHandle(1), &constants, &registry);
        assert_eq!(bindings.uniform_blocks.len(), 1);
        assert!(bindings.storage_blocks.is_empty());
        let hits = bindings.uniform("hits").unwrap();
        assert_eq!(hits.atomic, Some(AtomicSlot { binding: 2, offset: 4 }));
        assert_eq!(hits.definition.buffer_class(), shadergen_core::BufferClass::UInt);
    }

    #[test]
    fn root_names() {
        assert_eq!(root_name("a"), Some("a"));
        assert_eq!(root_name("a[0]"), Some("a"));
        assert_eq!(root_name("a[1]"), None);
        assert_eq!(root_name("s[0].x"), None);
        assert_eq!(root_name("a[0][0]"), Some("a"));
        assert_eq!(root_name("a[0][1]"), None);
        assert_eq!(root_name("a[1][0]"), None);
    }
}
