//! Pending uploads: records staged locally but not yet written to storage.
//!
//! Entries live in a slot arena addressed by [`PendingKey`] tokens. A slot's generation is
//! bumped whenever its entry leaves, so a key outlives neither a commit nor a clear.

use std::sync::Arc;

use depot_core::FileRecord;

use crate::error::{FileError, FileResult};
use crate::source::StagedFile;

/// Opaque token for one pending upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey {
    index: u32,
    generation: u32,
}

impl std::fmt::Display for PendingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A staged record and the local file holding its bytes.
#[derive(Debug)]
pub struct PendingUpload {
    pub record: Arc<dyn FileRecord>,
    pub staged: StagedFile,
    sequence: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<PendingUpload>,
}

/// Arena of pending uploads owned by one file manager.
#[derive(Debug, Default)]
pub struct PendingUploads {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_sequence: u64,
    len: usize,
}

impl PendingUploads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, record: Arc<dyn FileRecord>, staged: StagedFile) -> PendingKey {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let entry = PendingUpload {
            record,
            staged,
            sequence,
        };

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        self.len += 1;

        PendingKey {
            index,
            generation: slot.generation,
        }
    }

    fn slot(&self, key: PendingKey) -> Option<&PendingUpload> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn has(&self, key: PendingKey) -> bool {
        self.slot(key).is_some()
    }

    pub fn get(&self, key: PendingKey) -> FileResult<&PendingUpload> {
        self.slot(key)
            .ok_or_else(|| FileError::NotFound(key.to_string()))
    }

    pub fn remove(&mut self, key: PendingKey) -> Option<PendingUpload> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(entry)
    }

    /// Linear scan over pending records for a matching deduplication key.
    pub fn find_by_hash_and_size(
        &self,
        content_hash: &str,
        size_bytes: u64,
    ) -> Option<(PendingKey, Arc<dyn FileRecord>)> {
        self.iter()
            .find(|(_, entry)| entry.record.metadata().matches_content(content_hash, size_bytes))
            .map(|(key, entry)| (key, Arc::clone(&entry.record)))
    }

    /// Key of a record instance, by reference equality.
    pub fn find_record(&self, record: &Arc<dyn FileRecord>) -> Option<PendingKey> {
        self.iter()
            .find(|(_, entry)| Arc::ptr_eq(&entry.record, record))
            .map(|(key, _)| key)
    }

    /// Drop every pending entry, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.len;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        discarded
    }

    /// Keys of all pending entries, oldest upload first.
    pub fn keys(&self) -> Vec<PendingKey> {
        let mut entries: Vec<(u64, PendingKey)> = self
            .iter()
            .map(|(key, entry)| (entry.sequence, key))
            .collect();
        entries.sort_unstable_by_key(|(sequence, _)| *sequence);
        entries.into_iter().map(|(_, key)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn iter(&self) -> impl Iterator<Item = (PendingKey, &PendingUpload)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry.as_ref().map(|entry| {
                (
                    PendingKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entry,
                )
            })
        })
    }
}
