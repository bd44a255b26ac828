//! Heap page: a used-slot bitmap header plus packed fixed-width tuples.
//!
//! A page is `PAGE_SIZE` bytes laid out as:
//!
//! ```text
//! +----------------------------+ offset 0
//! | Header: used-slot bitmap   |  ceil(N/8) bytes, bit k set = slot k used
//! +----------------------------+
//! | Slot 0                     |  tuple_size bytes each
//! | Slot 1                     |
//! | ...                        |
//! | Slot N-1                   |
//! +----------------------------+
//! | Zero padding               |
//! +----------------------------+ offset PAGE_SIZE
//! ```
//!
//! where `N = (PAGE_SIZE * 8) / (tuple_size * 8 + 1)`: each slot costs its
//! tuple bytes plus one header bit. Unused slots and the trailing padding
//! are zero, so serialization is bit-exact and deterministic.

use bytes::BufMut;

use super::error::HeapError;
use crate::storage::{PageId, PAGE_SIZE};
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::tx::TransactionId;

/// One slotted heap page held in memory.
///
/// Not thread safe on its own; concurrent access is serialized by the
/// per-page lock acquired through the buffer pool.
#[derive(Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    /// Used-slot bitmap, `ceil(slot_count/8)` bytes.
    header: Vec<u8>,
    /// Slot contents, `None` for empty slots.
    tuples: Vec<Option<Tuple>>,
    /// Transaction that dirtied the page, if any.
    dirty: Option<TransactionId>,
    /// Page image at the time it entered the buffer pool, for abort.
    before_image: Vec<u8>,
}

impl HeapPage {
    /// Returns the number of tuple slots a page holds under `desc`.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.tuple_size() * 8 + 1)
    }

    fn header_size(slot_count: usize) -> usize {
        slot_count.div_ceil(8)
    }

    /// Creates an empty page whose before-image is all zeroes.
    pub fn empty(pid: PageId, desc: TupleDesc) -> HeapPage {
        let slots = Self::slots_per_page(&desc);
        HeapPage {
            pid,
            desc,
            header: vec![0u8; Self::header_size(slots)],
            tuples: (0..slots).map(|_| None).collect(),
            dirty: None,
            before_image: vec![0u8; PAGE_SIZE],
        }
    }

    /// Parses a page from its on-disk image and snapshots the image as the
    /// page's before-image.
    ///
    /// # Errors
    ///
    /// Returns `HeapError::WrongPageSize` unless `data` is exactly
    /// `PAGE_SIZE` bytes, or `HeapError::Codec` if an occupied slot fails
    /// to decode.
    pub fn from_bytes(pid: PageId, desc: TupleDesc, data: &[u8]) -> Result<HeapPage, HeapError> {
        if data.len() != PAGE_SIZE {
            return Err(HeapError::WrongPageSize {
                expected: PAGE_SIZE,
                actual: data.len(),
            });
        }

        let slots = Self::slots_per_page(&desc);
        let header_size = Self::header_size(slots);
        let header = data[..header_size].to_vec();
        let tuple_size = desc.tuple_size();

        let mut tuples = Vec::with_capacity(slots);
        for slot in 0..slots {
            if header[slot / 8] & (1 << (slot % 8)) != 0 {
                let start = header_size + slot * tuple_size;
                let mut slice = &data[start..start + tuple_size];
                let mut tuple = Tuple::read_from(&mut slice, &desc)?;
                tuple.set_record_id(Some(RecordId::new(pid, slot as u16)));
                tuples.push(Some(tuple));
            } else {
                tuples.push(None);
            }
        }

        Ok(HeapPage {
            pid,
            desc,
            header,
            tuples,
            dirty: None,
            before_image: data.to_vec(),
        })
    }

    /// Serializes the page to exactly `PAGE_SIZE` bytes.
    ///
    /// Empty slots and trailing padding are written as zeroes, making this
    /// the bit-exact inverse of [`from_bytes`](Self::from_bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        let tuple_size = self.desc.tuple_size();
        let mut data = Vec::with_capacity(PAGE_SIZE);
        data.put_slice(&self.header);
        for slot in &self.tuples {
            match slot {
                Some(tuple) => tuple.write_to(&mut data),
                None => data.put_bytes(0, tuple_size),
            }
        }
        data.put_bytes(0, PAGE_SIZE - data.len());
        data
    }

    /// Returns this page's id.
    pub fn id(&self) -> PageId {
        self.pid
    }

    /// Returns the schema of tuples on this page.
    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the total number of slots.
    pub fn slot_count(&self) -> usize {
        self.tuples.len()
    }

    /// Returns true if slot `slot` is occupied.
    pub fn is_slot_used(&self, slot: u16) -> bool {
        self.tuples
            .get(slot as usize)
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    /// Returns the number of empty slots.
    pub fn empty_slot_count(&self) -> usize {
        self.tuples.iter().filter(|s| s.is_none()).count()
    }

    /// Inserts a tuple into the first empty slot.
    ///
    /// Stamps the tuple's record id with its new slot and returns it.
    ///
    /// # Errors
    ///
    /// - `HeapError::SchemaMismatch` if the tuple's schema differs
    /// - `HeapError::PageFull` if every slot is occupied
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId, HeapError> {
        if tuple.desc() != &self.desc {
            return Err(HeapError::SchemaMismatch);
        }
        let slot = self
            .tuples
            .iter()
            .position(|s| s.is_none())
            .ok_or(HeapError::PageFull(self.pid))?;

        let rid = RecordId::new(self.pid, slot as u16);
        tuple.set_record_id(Some(rid));
        self.header[slot / 8] |= 1 << (slot % 8);
        self.tuples[slot] = Some(tuple);
        Ok(rid)
    }

    /// Deletes the given tuple from its slot.
    ///
    /// The tuple must name a slot on this page, the slot must be occupied,
    /// and the slot's contents must equal the tuple's fields.
    ///
    /// # Errors
    ///
    /// Returns `HeapError` variants for each failed precondition.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), HeapError> {
        let rid = tuple.record_id().ok_or(HeapError::MissingRecordId)?;
        if rid.page != self.pid {
            return Err(HeapError::WrongPage {
                page: self.pid,
                record: rid.page,
            });
        }

        let slot = rid.slot as usize;
        let occupant = self
            .tuples
            .get(slot)
            .and_then(|s| s.as_ref())
            .ok_or(HeapError::SlotEmpty {
                page: self.pid,
                slot: rid.slot,
            })?;
        if occupant.fields() != tuple.fields() {
            return Err(HeapError::TupleMismatch {
                page: self.pid,
                slot: rid.slot,
            });
        }

        self.header[slot / 8] &= !(1 << (slot % 8));
        self.tuples[slot] = None;
        Ok(())
    }

    /// Records which transaction dirtied the page, or clears the mark.
    pub fn mark_dirty(&mut self, txn: Option<TransactionId>) {
        self.dirty = txn;
    }

    /// Returns the transaction that dirtied the page, if any.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Reconstructs the page as it looked when it entered the buffer pool.
    pub fn before_image(&self) -> HeapPage {
        HeapPage::from_bytes(self.pid, self.desc.clone(), &self.before_image)
            .expect("before image is a well-formed page")
    }

    /// Re-snapshots the before-image from the current contents.
    ///
    /// Called after a successful flush: the flushed bytes are the new
    /// committed state a later abort must restore.
    pub fn set_before_image(&mut self) {
        self.before_image = self.to_bytes();
    }

    /// Iterates over occupied slots in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().filter_map(|s| s.as_ref())
    }
}
