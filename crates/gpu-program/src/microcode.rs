//! Content-addressed cache of linked program binaries.
//!
//! Entries are keyed by [`compute_key`] over the ids of the attached stages
//! and hold the driver's opaque binary plus its format tag. Entries are soft:
//! a binary the driver refuses is reported as a miss so the caller relinks
//! from source and overwrites it.
//!
//! On disk the cache is a little-endian stream:
//!
//! ```text
//! magic "SGMC" | version u32 | count u32 | count * { key u32 | format u32 | len u32 | bytes }
//! ```

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use crc::{Crc, CRC_32_ISO_HDLC};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{NativeBackend, ProgramBinary, ProgramHandle};

static HASHER: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub const CACHE_MAGIC: [u8; 4] = *b"SGMC";
pub const CACHE_VERSION: u32 = 1;

/// Fold the ids of the present stages into a cache key.
///
/// The fold is order-dependent. An empty set yields 0, which means "no
/// program"; a non-empty set never does.
pub fn compute_key(stages: &[Option<u32>]) -> u32 {
    let mut key = 0u32;
    let mut any = false;
    for id in stages.iter().flatten() {
        let mut digest = HASHER.digest();
        digest.update(&key.to_le_bytes());
        digest.update(&id.to_le_bytes());
        key = digest.finalize();
        any = true;
    }
    match (any, key) {
        (false, _) => 0,
        (true, 0) => 1,
        (true, key) => key,
    }
}

#[derive(Debug, Error)]
enum CacheFileError {
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
    #[error("truncated entry table")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<u32, ProgramBinary>,
    dirty: bool,
}

/// In-memory binary table with an explicit flush to disk.
///
/// The dirty flag is set by every mutation and cleared only by a save.
#[derive(Debug, Default)]
pub struct MicrocodeCache {
    state: Mutex<CacheState>,
}

impl MicrocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u32) -> Option<ProgramBinary> {
        self.state.lock().entries.get(&key).cloned()
    }

    pub fn contains(&self, key: u32) -> bool {
        self.state.lock().entries.contains_key(&key)
    }

    /// Insert or replace the entry for `key`.
    pub fn insert(&self, key: u32, binary: ProgramBinary) {
        let mut state = self.state.lock();
        state.entries.insert(key, binary);
        state.dirty = true;
    }

    pub fn remove(&self, key: u32) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(&key).is_some();
        state.dirty |= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Install the cached binary for `key` into a new native program.
    ///
    /// Returns `None` on a miss and when the driver rejects the binary.
    pub fn try_load<B: NativeBackend + ?Sized>(
        &self,
        key: u32,
        backend: &mut B,
    ) -> Option<ProgramHandle> {
        if key == 0 {
            return None;
        }
        let binary = self.get(key)?;
        match backend.load_binary(&binary) {
            Ok(program) => {
                debug!(key, format = binary.format, "loaded program from microcode cache");
                Some(program)
            }
            Err(log) => {
                warn!(key, format = binary.format, %log, "stale microcode, relinking from source");
                None
            }
        }
    }

    /// Store the binary of a freshly linked program under `key`.
    pub fn store<B: NativeBackend + ?Sized>(
        &self,
        key: u32,
        program: ProgramHandle,
        backend: &B,
    ) -> bool {
        if key == 0 {
            return false;
        }
        match backend.program_binary(program) {
            Some(binary) => {
                debug!(key, format = binary.format, len = binary.data.len(), "stored microcode");
                self.insert(key, binary);
                true
            }
            None => {
                debug!(key, "driver returned no program binary");
                false
            }
        }
    }

    // ----------------------------------------------------------------------
    // Persistence
    // ----------------------------------------------------------------------

    /// Write every entry, ordered by key, and clear the dirty flag.
    pub fn save<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut state = self.state.lock();
        let mut keys: Vec<_> = state.entries.keys().copied().collect();
        keys.sort_unstable();

        writer.write_all(&CACHE_MAGIC)?;
        writer.write_all(&CACHE_VERSION.to_le_bytes())?;
        writer.write_all(&len_u32(keys.len())?.to_le_bytes())?;
        for key in keys {
            let binary = &state.entries[&key];
            writer.write_all(&key.to_le_bytes())?;
            writer.write_all(&binary.format.to_le_bytes())?;
            writer.write_all(&len_u32(binary.data.len())?.to_le_bytes())?;
            writer.write_all(&binary.data)?;
        }
        writer.flush()?;
        state.dirty = false;
        Ok(())
    }

    /// Merge entries from a stream written by [`MicrocodeCache::save`].
    ///
    /// A stream with a foreign header or a truncated table is ignored with a
    /// warning. Returns the number of entries merged.
    pub fn load<R: Read>(&self, reader: R) -> io::Result<usize> {
        let entries = match read_entries(reader) {
            Ok(entries) => entries,
            Err(CacheFileError::Io(e)) => return Err(e),
            Err(e) => {
                warn!(error = %e, "ignoring microcode cache");
                return Ok(0);
            }
        };
        let count = entries.len();
        self.state.lock().entries.extend(entries);
        debug!(count, "loaded microcode cache");
        Ok(count)
    }

    pub fn save_to_file(&self, path: &Path) -> io::Result<()> {
        self.save(BufWriter::new(File::create(path)?))
    }

    /// Like [`MicrocodeCache::load`]; a missing file merges nothing.
    pub fn load_from_file(&self, path: &Path) -> io::Result<usize> {
        match File::open(path) {
            Ok(file) => self.load(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no microcode cache file");
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry too large"))
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, CacheFileError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(eof_as_truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn eof_as_truncated(e: io::Error) -> CacheFileError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CacheFileError::Truncated
    } else {
        CacheFileError::Io(e)
    }
}

fn read_entries<R: Read>(mut reader: R) -> Result<Vec<(u32, ProgramBinary)>, CacheFileError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(eof_as_truncated)?;
    if magic != CACHE_MAGIC {
        return Err(CacheFileError::BadMagic(magic));
    }
    let version = read_u32(&mut reader)?;
    if version != CACHE_VERSION {
        return Err(CacheFileError::UnsupportedVersion(version));
    }

    let count = read_u32(&mut reader)?;
    let mut entries = Vec::new();
    for _ in 0..count {
        let key = read_u32(&mut reader)?;
        let format = read_u32(&mut reader)?;
        let len = read_u32(&mut reader)? as usize;
        let mut data = Vec::new();
        reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut data)
            .map_err(eof_as_truncated)?;
        if data.len() != len {
            return Err(CacheFileError::Truncated);
        }
        entries.push((key, ProgramBinary { format, data }));
    }
    Ok(entries)
}
