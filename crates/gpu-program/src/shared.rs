//! Process-wide registry of named uniform and shader-storage blocks.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{BlockKind, BufferHandle, NativeBackend};

/// Buffer and binding point shared by every program that declares a block
/// with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedBlock {
    pub name: String,
    pub kind: BlockKind,
    pub binding: u32,
    pub buffer: BufferHandle,
    pub size: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    blocks: HashMap<(BlockKind, String), SharedBlock>,
    next_uniform_binding: u32,
    next_storage_binding: u32,
}

/// Allocates binding points and backing buffers for named blocks.
///
/// Uniform blocks and storage blocks draw bindings from separate sequences
/// starting at zero. A block's buffer is created the first time any program
/// declares it and reused afterwards.
#[derive(Debug, Default)]
pub struct SharedBlockRegistry {
    state: Mutex<RegistryState>,
}

impl SharedBlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared block `name`, creating its buffer on first sight.
    pub fn get_or_create<B: NativeBackend + ?Sized>(
        &self,
        backend: &mut B,
        kind: BlockKind,
        name: &str,
        size: usize,
    ) -> SharedBlock {
        let mut state = self.state.lock();
        if let Some(block) = state.blocks.get(&(kind, name.to_owned())) {
            if size > block.size {
                warn!(%name, existing = block.size, requested = size, "shared block grew");
            }
            return block.clone();
        }

        let counter = match kind {
            BlockKind::Uniform => &mut state.next_uniform_binding,
            BlockKind::ShaderStorage => &mut state.next_storage_binding,
        };
        let binding = *counter;
        *counter += 1;

        let buffer = backend.create_block_buffer(kind, binding, size);
        debug!(%name, ?kind, binding, size, "created shared block");
        let block = SharedBlock {
            name: name.to_owned(),
            kind,
            binding,
            buffer,
            size,
        };
        state.blocks.insert((kind, name.to_owned()), block.clone());
        block
    }

    pub fn get(&self, kind: BlockKind, name: &str) -> Option<SharedBlock> {
        self.state.lock().blocks.get(&(kind, name.to_owned())).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
