//! Back-reference table shared in lockstep by an encoder and its decoder.
//!
//! The table has a fixed number of slots filled in ring order. When every slot
//! is taken, the next insert evicts the oldest entry. Both sides insert the same
//! values at the same points of the walk, so slot numbers written by the
//! encoder always name the same value on the decoding side.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::types::Value;

/// Number of slots; a back-reference token is a single byte.
pub const CACHE_SLOTS: usize = 256;

/// Bounded FIFO table of previously seen values.
#[derive(Debug, Clone)]
pub struct ReferenceCache {
    slots: Vec<Option<Value>>,
    // Value -> the most recent slot holding an equal value.
    index: FxHashMap<Value, u8>,
    cursor: usize,
    len: usize,
    // Undo records since `checkpoint`, newest last.
    journal: Option<Vec<Undo>>,
}

/// How to reverse one change to the table.
#[derive(Debug, Clone)]
enum Undo {
    Insert {
        slot: u8,
        evicted: Option<Value>,
        evicted_indexed: bool,
        replaced: Option<u8>,
    },
    Clear {
        slots: Vec<Option<Value>>,
        index: FxHashMap<Value, u8>,
        cursor: usize,
        len: usize,
    },
}

impl Default for ReferenceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self {
            slots: vec![None; CACHE_SLOTS],
            index: FxHashMap::default(),
            cursor: 0,
            len: 0,
            journal: None,
        }
    }

    /// Whether `value` is large enough to be worth a back-reference.
    pub fn is_cacheable(value: &Value) -> bool {
        match value {
            Value::String(s) => s.len() > 1,
            Value::Blob(b) => b.len() > 1,
            Value::Array(items) => items.len() >= 2,
            Value::Object(map) => !map.is_empty(),
            _ => false,
        }
    }

    /// Slot of a structurally equal cached value, if any.
    pub fn lookup(&self, value: &Value) -> Option<u8> {
        self.index.get(value).copied()
    }

    pub fn get(&self, slot: u8) -> Option<&Value> {
        self.slots[slot as usize].as_ref()
    }

    /// Store `value` in the next ring slot and return that slot.
    pub fn insert(&mut self, value: Value) -> u8 {
        let slot = self.cursor as u8;
        let evicted = self.slots[self.cursor].take();
        let mut evicted_indexed = false;
        match &evicted {
            Some(evicted) => {
                if self.index.get(evicted) == Some(&slot) {
                    self.index.remove(evicted);
                    evicted_indexed = true;
                }
                trace!(slot, kind = %evicted.kind(), "evicting cache slot");
            }
            None => self.len += 1,
        }
        let replaced = self.index.insert(value.clone(), slot);
        self.slots[self.cursor] = Some(value);
        self.cursor = (self.cursor + 1) % CACHE_SLOTS;
        if let Some(journal) = &mut self.journal {
            journal.push(Undo::Insert {
                slot,
                evicted,
                evicted_indexed,
                replaced,
            });
        }
        slot
    }

    pub fn clear(&mut self) {
        if let Some(journal) = &mut self.journal {
            journal.push(Undo::Clear {
                slots: std::mem::replace(&mut self.slots, vec![None; CACHE_SLOTS]),
                index: std::mem::take(&mut self.index),
                cursor: self.cursor,
                len: self.len,
            });
        } else {
            self.slots.iter_mut().for_each(|slot| *slot = None);
            self.index.clear();
        }
        self.cursor = 0;
        self.len = 0;
    }

    /// Start recording changes so that [`ReferenceCache::rollback`] can
    /// restore the current contents. Replaces any earlier checkpoint.
    pub(crate) fn checkpoint(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep every change made since the checkpoint and stop recording.
    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every change made since the checkpoint and stop recording.
    pub(crate) fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::Insert {
                    slot,
                    evicted,
                    evicted_indexed,
                    replaced,
                } => {
                    let index = usize::from(slot);
                    if let Some(inserted) = self.slots[index].take() {
                        match replaced {
                            Some(previous) => self.index.insert(inserted, previous),
                            None => self.index.remove(&inserted),
                        };
                    }
                    match evicted {
                        Some(evicted) => {
                            if evicted_indexed {
                                self.index.insert(evicted.clone(), slot);
                            }
                            self.slots[index] = Some(evicted);
                        }
                        None => self.len -= 1,
                    }
                    self.cursor = index;
                }
                Undo::Clear {
                    slots,
                    index,
                    cursor,
                    len,
                } => {
                    self.slots = slots;
                    self.index = index;
                    self.cursor = cursor;
                    self.len = len;
                }
            }
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, value)| value.as_ref().map(|v| (slot as u8, v)))
    }
}
