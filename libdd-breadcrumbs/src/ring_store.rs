// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Default cap on the backing file's physical size.
pub const DEFAULT_RING_CAPACITY: u64 = 64 * 1024;

/// Hard cap on a single record, independent of the ring capacity.
pub const MAX_RECORD_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record of {0} bytes exceeds the {MAX_RECORD_SIZE} byte record cap")]
    RecordTooLarge(usize),
    #[error("record of {size} bytes cannot fit a ring of {capacity} bytes")]
    RecordExceedsCapacity { size: usize, capacity: u64 },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
struct RingState {
    file: Option<File>,
    cursor: u64,
}

/// A fixed-capacity append log backed by a single file.
///
/// Appends past the capacity wrap to offset 0 and keep writing, overwriting
/// the oldest bytes in place: the file's physical size is capped, only its
/// logical content rotates. The store has no notion of record boundaries;
/// a record straddling the wrap point ends up split between the end and the
/// start of the file and is left for the reader to skip.
///
/// All operations are serialized on one internal lock and collapse failures
/// to `false`/empty so storage trouble never takes down the host process.
#[derive(Debug)]
pub struct RingStore {
    path: PathBuf,
    capacity: u64,
    state: Mutex<RingState>,
}

impl RingStore {
    /// Opens a ring store over `path`. A zero `capacity` falls back to
    /// [`DEFAULT_RING_CAPACITY`]. The file itself is created lazily on the
    /// first append; a pre-existing file longer than `capacity` (from a run
    /// with a larger cap) is truncated down to `capacity` right away.
    pub fn new(path: impl Into<PathBuf>, capacity: u64) -> Self {
        let path = path.into();
        let capacity = if capacity == 0 {
            DEFAULT_RING_CAPACITY
        } else {
            capacity
        };
        let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        let cursor = if len >= capacity {
            if len > capacity {
                if let Err(err) = shrink_to(&path, capacity) {
                    warn!("failed to shrink {} to {capacity} bytes: {err}", path.display());
                }
            }
            0
        } else {
            len
        };
        Self {
            path,
            capacity,
            state: Mutex::new(RingState { file: None, cursor }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Appends `bytes` at the current write cursor, wrapping to offset 0 when
    /// the capacity is reached. Oversized payloads are rejected outright and
    /// never partially written.
    pub fn append(&self, bytes: &[u8]) -> bool {
        let mut state = self.lock();
        match self.append_inner(&mut state, bytes) {
            Ok(()) => true,
            Err(err) => {
                warn!("dropping {} byte record: {err}", bytes.len());
                false
            }
        }
    }

    fn append_inner(&self, state: &mut RingState, bytes: &[u8]) -> Result<(), StorageError> {
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(StorageError::RecordTooLarge(bytes.len()));
        }
        if bytes.len() as u64 > self.capacity {
            return Err(StorageError::RecordExceedsCapacity {
                size: bytes.len(),
                capacity: self.capacity,
            });
        }

        let file = Self::open_file(&mut state.file, &self.path)?;
        let mut cursor = state.cursor % self.capacity;
        let remaining = (self.capacity - cursor) as usize;
        let io = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        if bytes.len() <= remaining {
            file.seek(SeekFrom::Start(cursor)).map_err(io)?;
            file.write_all(bytes).map_err(io)?;
            cursor += bytes.len() as u64;
        } else {
            // The record does not fit in the tail: fill the file to capacity
            // and continue at offset 0, over the oldest bytes.
            let (head, tail) = bytes.split_at(remaining);
            file.seek(SeekFrom::Start(cursor)).map_err(io)?;
            file.write_all(head).map_err(io)?;
            file.seek(SeekFrom::Start(0)).map_err(io)?;
            file.write_all(tail).map_err(io)?;
            cursor = tail.len() as u64;
        }
        file.flush().map_err(io)?;
        state.cursor = cursor % self.capacity;
        Ok(())
    }

    /// Truncates the backing file to zero length and rewinds the cursor.
    pub fn clear(&self) -> bool {
        let mut state = self.lock();
        match self.clear_inner(&mut state) {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to clear {}: {err}", self.path.display());
                false
            }
        }
    }

    fn clear_inner(&self, state: &mut RingState) -> Result<(), StorageError> {
        if state.file.is_none() && !self.path.exists() {
            state.cursor = 0;
            return Ok(());
        }
        let file = Self::open_file(&mut state.file, &self.path)?;
        file.set_len(0).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        state.cursor = 0;
        Ok(())
    }

    /// Returns the raw physical content of the file, in on-disk order (never
    /// logically unrotated). Readers are expected to tolerate a malformed
    /// fragment where the wrap point landed inside a record. Unreadable
    /// storage yields an empty buffer.
    pub fn read_all(&self) -> Vec<u8> {
        let mut state = self.lock();
        if state.file.is_none() && !self.path.exists() {
            return Vec::new();
        }
        match self.read_inner(&mut state) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("failed to read {}: {err}", self.path.display());
                Vec::new()
            }
        }
    }

    fn read_inner(&self, state: &mut RingState) -> Result<Vec<u8>, StorageError> {
        let file = Self::open_file(&mut state.file, &self.path)?;
        let io = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };
        file.seek(SeekFrom::Start(0)).map_err(io)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(io)?;
        Ok(bytes)
    }

    fn open_file<'a>(
        slot: &'a mut Option<File>,
        path: &Path,
    ) -> Result<&'a mut File, StorageError> {
        if slot.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|source| StorageError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            *slot = Some(file);
        }
        #[allow(clippy::unwrap_used)]
        Ok(slot.as_mut().unwrap())
    }

    // A panicked writer leaves the file in a consistent-enough state for a
    // diagnostics log; recover the lock rather than poisoning the host.
    fn lock(&self) -> std::sync::MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn shrink_to(path: &Path, capacity: u64) -> std::io::Result<()> {
    OpenOptions::new().write(true).open(path)?.set_len(capacity)
}
