//! Persistent state arena: a fixed-size byte image mapped at a fixed
//! virtual base address.
//!
//! Layout from offset 0: allocator header `{length: u64, next_free: u64}`,
//! then the root record. `length` is the capacity available past the header;
//! `next_free` is how much of it the current root record occupies. The root
//! is the exchange's canonical flat encoding, so re-mapping the image after a
//! restart and decoding at the known offset reproduces the state bit for bit.
//!
//! The mapping address is an invariant, not a preference: the image must land
//! exactly at the requested base or opening fails. Deallocation does not
//! exist; a commit that would cross the region end fails without touching the
//! stored record, and the enclosing request is rejected.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::errors::StateError;
use crate::exchange::Exchange;

/// Virtual base the original deployment maps at; hosts may override it but
/// must then use the same value on every run against the same image.
pub const DEFAULT_VIRTUAL_START: u64 = 0x10_0000_0000;

/// Bytes taken by the `{length, next_free}` allocator header.
pub const HEADER_LENGTH: usize = 16;

/// Where committed state lives between inputs.
///
/// The dispatcher talks to this seam so the kernel can run against the real
/// mapped arena or an in-memory image interchangeably.
pub trait StateStore {
    /// Decode the stored root record.
    fn load(&self) -> Result<Exchange, StateError>;

    /// Re-encode the root and make it durable. Must leave the stored record
    /// untouched on failure.
    fn commit(&mut self, state: &Exchange) -> Result<(), StateError>;
}

/// The mmap-backed arena.
#[derive(Debug)]
pub struct Arena {
    base: *mut u8,
    length: usize,
}

impl Arena {
    /// Map `path` read-write at exactly `virtual_start`.
    pub fn map(path: &Path, virtual_start: u64) -> Result<Self, StateError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| StateError::ImageOpen {
                path: path.display().to_string(),
                source,
            })?;
        let length = file
            .metadata()
            .map_err(|source| StateError::ImageOpen {
                path: path.display().to_string(),
                source,
            })?
            .len();
        if (length as usize) < HEADER_LENGTH {
            return Err(StateError::ImageTooSmall { length });
        }
        let length = length as usize;

        // SAFETY: mapping a regular file we own for the lifetime of the
        // returned Arena; the fd may close right after, the mapping persists.
        let base = unsafe {
            libc::mmap(
                virtual_start as usize as *mut libc::c_void,
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_FIXED_NOREPLACE,
                file.as_raw_fd(),
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(StateError::MapFailed {
                source: io::Error::last_os_error(),
            });
        }
        if base as u64 != virtual_start {
            // SAFETY: base is the address mmap just returned for `length`.
            unsafe { libc::munmap(base, length) };
            return Err(StateError::WrongAddress {
                expected: virtual_start,
                got: base as u64,
            });
        }
        info!(length, "state image mapped at 0x{:x}", virtual_start);
        Ok(Self {
            base: base as *mut u8,
            length,
        })
    }

    fn data(&self) -> &[u8] {
        // SAFETY: base..base+length is our live mapping.
        unsafe { std::slice::from_raw_parts(self.base, self.length) }
    }

    fn data_mut(&mut self) -> &mut [u8] {
        // SAFETY: base..base+length is our live mapping, held exclusively.
        unsafe { std::slice::from_raw_parts_mut(self.base, self.length) }
    }

    fn read_header(&self) -> (u64, u64) {
        let data = self.data();
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[0..8]);
        let length = u64::from_le_bytes(word);
        word.copy_from_slice(&data[8..16]);
        let next_free = u64::from_le_bytes(word);
        (length, next_free)
    }

    fn write_header(&mut self, length: u64, next_free: u64) {
        let data = self.data_mut();
        data[0..8].copy_from_slice(&length.to_le_bytes());
        data[8..16].copy_from_slice(&next_free.to_le_bytes());
    }

    /// Capacity available to the root record.
    pub fn capacity(&self) -> u64 {
        (self.length - HEADER_LENGTH) as u64
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Zero the region and write a fresh allocator header. Genesis only.
    pub fn initialize(&mut self) {
        let capacity = self.capacity();
        self.data_mut().fill(0);
        self.write_header(capacity, 0);
        debug!(capacity, "state image initialized");
    }

    /// The stored root record.
    pub fn root(&self) -> Result<&[u8], StateError> {
        let (length, next_free) = self.read_header();
        if length != self.capacity() || next_free > length {
            return Err(StateError::CorruptImage {
                reason: format!(
                    "allocator header inconsistent: length={length} next_free={next_free} capacity={}",
                    self.capacity()
                ),
            });
        }
        let start = HEADER_LENGTH;
        Ok(&self.data()[start..start + next_free as usize])
    }

    /// Replace the root record. Fails without side effects when the record
    /// would cross the region end.
    pub fn store_root(&mut self, record: &[u8]) -> Result<(), StateError> {
        let needed = record.len() as u64;
        let available = self.capacity();
        if needed > available {
            return Err(StateError::ArenaExhausted { needed, available });
        }
        let start = HEADER_LENGTH;
        self.data_mut()[start..start + record.len()].copy_from_slice(record);
        self.write_header(available, needed);
        Ok(())
    }

    /// Flush the mapping to its backing file. The advance commit barrier.
    pub fn sync(&self) -> Result<(), StateError> {
        // SAFETY: base..base+length is our live mapping.
        let rc = unsafe { libc::msync(self.base as *mut libc::c_void, self.length, libc::MS_SYNC) };
        if rc != 0 {
            return Err(StateError::SyncFailed {
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // SAFETY: unmapping the exact mapping we created.
        unsafe { libc::munmap(self.base as *mut libc::c_void, self.length) };
    }
}

impl StateStore for Arena {
    fn load(&self) -> Result<Exchange, StateError> {
        Exchange::from_image(self.root()?)
    }

    fn commit(&mut self, state: &Exchange) -> Result<(), StateError> {
        self.store_root(&state.to_image())?;
        // the record is in the mapping either way; a failed flush must not
        // turn into a rejection after the fact
        if let Err(err) = self.sync() {
            warn!(error = %err, "unable to flush state image to disk");
        }
        Ok(())
    }
}

/// In-memory store with the same capacity discipline as the arena. Used by
/// tests and embedders that do not need a durable image.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    image: Vec<u8>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            image: Vec::new(),
            capacity,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Exchange, StateError> {
        Exchange::from_image(&self.image)
    }

    fn commit(&mut self, state: &Exchange) -> Result<(), StateError> {
        let record = state.to_image();
        if record.len() > self.capacity {
            return Err(StateError::ArenaExhausted {
                needed: record.len() as u64,
                available: self.capacity as u64,
            });
        }
        self.image = record;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{EthAddress, USDT_ADDRESS};
    use std::fs::File;
    use tempfile::TempDir;

    // distinct bases so parallel tests never contend for the same range
    const BASE_A: u64 = 0x20_0000_0000;
    const BASE_B: u64 = 0x21_0000_0000;
    const BASE_C: u64 = 0x22_0000_0000;
    const BASE_D: u64 = 0x23_0000_0000;

    fn image_file(dir: &TempDir, length: u64) -> std::path::PathBuf {
        let path = dir.path().join("lambda.bin");
        let file = File::create(&path).unwrap();
        file.set_len(length).unwrap();
        path
    }

    #[test]
    fn test_map_initialize_commit_reload() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, 1 << 20);

        let mut state = Exchange::genesis();
        state.deposit(EthAddress([7; 20]), USDT_ADDRESS, 500);
        {
            let mut arena = Arena::map(&path, BASE_A).unwrap();
            arena.initialize();
            arena.commit(&state).unwrap();
        }
        // remap after "restart" and find the identical state
        let arena = Arena::map(&path, BASE_A).unwrap();
        assert_eq!(arena.load().unwrap(), state);
    }

    #[test]
    fn test_restart_idempotence_at_byte_level() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, 1 << 20);
        let state = Exchange::genesis();
        {
            let mut arena = Arena::map(&path, BASE_B).unwrap();
            arena.initialize();
            arena.commit(&state).unwrap();
        }
        let before = std::fs::read(&path).unwrap();
        {
            // restart, process zero inputs, commit again
            let mut arena = Arena::map(&path, BASE_B).unwrap();
            let reloaded = arena.load().unwrap();
            arena.commit(&reloaded).unwrap();
        }
        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_exhaustion_leaves_stored_record_intact() {
        let dir = TempDir::new().unwrap();
        // room for the header and barely anything else
        let path = image_file(&dir, (HEADER_LENGTH + 64) as u64);
        let mut arena = Arena::map(&path, BASE_C).unwrap();
        arena.initialize();

        let state = Exchange::genesis();
        let err = arena.commit(&state).unwrap_err();
        assert!(matches!(err, StateError::ArenaExhausted { .. }));
        // the empty root is still what is stored
        assert_eq!(arena.root().unwrap().len(), 0);
    }

    #[test]
    fn test_wrong_address_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, 1 << 16);
        let _first = Arena::map(&path, BASE_D).unwrap();
        // the range is taken now; MAP_FIXED_NOREPLACE must refuse it
        let err = Arena::map(&path, BASE_D).unwrap_err();
        assert!(matches!(
            err,
            StateError::MapFailed { .. } | StateError::WrongAddress { .. }
        ));
    }

    #[test]
    fn test_too_small_image() {
        let dir = TempDir::new().unwrap();
        let path = image_file(&dir, 8);
        assert!(matches!(
            Arena::map(&path, BASE_A + 0x1000_0000),
            Err(StateError::ImageTooSmall { length: 8 })
        ));
    }

    #[test]
    fn test_memory_store_capacity_discipline() {
        let mut store = MemoryStore::new(32);
        let state = Exchange::genesis();
        assert!(matches!(
            store.commit(&state),
            Err(StateError::ArenaExhausted { .. })
        ));
        let mut store = MemoryStore::new(1 << 20);
        store.commit(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }
}
