//! `#include` resolution for generated and hand-written sources.

use std::{
    collections::{BTreeMap, HashSet},
    fs, io,
    path::PathBuf,
};

use shadergen_core::ShaderError;
use tracing::{debug, trace};

/// Source of named shader resources (include files, library functions).
pub trait ResourceProvider {
    /// Raw bytes of the resource called `name`.
    fn open_resource(&self, name: &str) -> Result<Vec<u8>, ShaderError>;
}

/// Resources loaded from files under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceProvider for DirectoryResources {
    fn open_resource(&self, name: &str) -> Result<Vec<u8>, ShaderError> {
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ShaderError::ResourceNotFound {
                name: name.to_owned(),
            }),
            Err(err) => {
                debug!(path = %path.display(), %err, "failed to read resource");
                Err(ShaderError::ResourceNotFound {
                    name: name.to_owned(),
                })
            }
        }
    }
}

/// Resources held in memory, mostly for tests and embedded libraries.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }
}

impl ResourceProvider for MemoryResources {
    fn open_resource(&self, name: &str) -> Result<Vec<u8>, ShaderError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderError::ResourceNotFound {
                name: name.to_owned(),
            })
    }
}

/// File named by an `#include "name"` line.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let rest = rest.strip_prefix("include")?.trim();
    let rest = rest.strip_prefix('"')?;
    rest.split_once('"').map(|(name, _)| name)
}

/// Inline every `#include "name"` in `source`, recursively.
///
/// Each file is inlined at most once; later includes of the same name are
/// dropped.
pub fn resolve_includes(
    source: &str,
    resources: &dyn ResourceProvider,
) -> Result<String, ShaderError> {
    let mut seen = HashSet::new();
    let mut out = String::with_capacity(source.len());
    expand(source, resources, &mut seen, &mut out)?;
    Ok(out)
}

fn expand(
    source: &str,
    resources: &dyn ResourceProvider,
    seen: &mut HashSet<String>,
    out: &mut String,
) -> Result<(), ShaderError> {
    for line in source.lines() {
        let Some(name) = include_target(line) else {
            out.push_str(line);
            out.push('\n');
            continue;
        };
        if !seen.insert(name.to_owned()) {
            trace!(name, "include already inlined");
            continue;
        }
        let bytes = resources.open_resource(name)?;
        let text = String::from_utf8_lossy(&bytes);
        debug!(name, bytes = bytes.len(), "inlining include");
        expand(&text, resources, seen, out)?;
    }
    Ok(())
}
