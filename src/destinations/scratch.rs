//! Memory-mapped scratch file backing the ring when `-t`/`-T` select an
//! mmap-backed arena instead of a heap allocation (spec §1 Non-goals:
//! "no persistence beyond an optional memory-mapped scratch file used as
//! RAM extension").

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::{MmapMut, MmapOptions};

use crate::error::Result;

/// Create (or truncate) `path` to `size` bytes and map it writable.
pub fn map_scratch_file(path: &Path, size: usize) -> Result<MmapMut> {
    let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
    file.set_len(size as u64)?;
    let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
    Ok(mmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.bin");
        let mmap = map_scratch_file(&path, 4096).unwrap();
        assert_eq!(mmap.len(), 4096);
    }
}
