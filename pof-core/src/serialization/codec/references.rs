//! Per-call identity tables for shared and cyclic object graphs.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::{PofError, Result};
use crate::serialization::value::{PofObject, PofValue};

/// Result of looking up an instance on the write side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Assignment {
    /// The instance was already written under this id.
    Existing(i32),
    /// The instance is new and was assigned this id.
    New(i32),
}

/// Write-side table keyed by instance identity.
///
/// The arena keeps every tracked instance alive for the whole call, so an
/// address can never be reused by a different instance while it is a key.
#[derive(Debug, Default)]
pub(crate) struct WriteReferences {
    ids: HashMap<usize, i32>,
    arena: Vec<PofObject>,
    next: i32,
}

impl WriteReferences {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `object`, assigning the next one on first sight.
    pub(crate) fn assign(&mut self, object: &PofObject) -> Result<Assignment> {
        match self.ids.entry(object.addr()) {
            Entry::Occupied(e) => Ok(Assignment::Existing(*e.get())),
            Entry::Vacant(e) => {
                let id = self.next;
                self.next = id.checked_add(1).ok_or_else(|| {
                    PofError::UnsupportedShape("too many tracked instances in one call".to_string())
                })?;
                e.insert(id);
                self.arena.push(object.clone());
                Ok(Assignment::New(id))
            }
        }
    }

    /// Number of distinct instances tracked so far.
    pub(crate) fn len(&self) -> usize {
        self.arena.len()
    }

    /// Id the next new instance will receive.
    pub(crate) fn next_id(&self) -> i32 {
        self.next
    }

    /// Marks every id up to `id` as used by replayed bytes.
    pub(crate) fn reserve_through(&mut self, id: i32) {
        self.next = self.next.max(id.saturating_add(1));
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Vacant,
    /// Decoding has started but the instance is not available yet.
    Reserved,
    /// The defining value was skipped; it starts at this stream offset.
    Skipped(usize),
    Value(PofValue),
}

/// What to do with an identity definition met on the wire.
#[derive(Debug)]
pub(crate) enum Definition {
    /// Decode the value and complete the slot.
    Decode,
    /// The value was already materialized; skip its bytes and reuse it.
    Existing(PofValue),
}

/// What a back-reference points at.
#[derive(Debug)]
pub(crate) enum Target {
    /// A materialized value.
    Value(PofValue),
    /// A value that was skipped and must be decoded from this offset.
    Skipped(usize),
}

/// Read-side table: an append-only vector of slots indexed by id.
#[derive(Debug)]
pub(crate) struct ReadReferences {
    slots: Vec<Slot>,
    max_id: usize,
}

impl ReadReferences {
    /// Creates a table for a stream of `stream_len` bytes.
    ///
    /// Each definition occupies at least two bytes, which bounds the ids a
    /// well-formed stream can use.
    pub(crate) fn new(stream_len: usize) -> Self {
        Self {
            slots: Vec::new(),
            max_id: stream_len,
        }
    }

    fn slot_mut(&mut self, id: i32) -> Result<&mut Slot> {
        let index = usize::try_from(id)
            .ok()
            .filter(|&index| index <= self.max_id)
            .ok_or_else(|| PofError::Malformed(format!("invalid reference id {id}")))?;
        if index >= self.slots.len() {
            self.slots.resize(index + 1, Slot::Vacant);
        }
        Ok(&mut self.slots[index])
    }

    /// Starts decoding the definition of `id`.
    pub(crate) fn begin(&mut self, id: i32) -> Result<Definition> {
        let slot = self.slot_mut(id)?;
        match *slot {
            Slot::Vacant | Slot::Skipped(_) => {
                *slot = Slot::Reserved;
                Ok(Definition::Decode)
            }
            Slot::Value(ref value) => Ok(Definition::Existing(value.clone())),
            Slot::Reserved => Err(PofError::Malformed(format!(
                "reference id {id} is defined twice"
            ))),
        }
    }

    /// Makes the instance for `id` available before its fields are decoded.
    pub(crate) fn fill(&mut self, id: i32, value: PofValue) -> Result<()> {
        *self.slot_mut(id)? = Slot::Value(value);
        Ok(())
    }

    /// Completes `id` with its decoded value unless it was filled already.
    pub(crate) fn complete(&mut self, id: i32, value: &PofValue) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if matches!(slot, Slot::Reserved) {
            *slot = Slot::Value(value.clone());
        }
        Ok(())
    }

    /// Remembers where a skipped definition starts.
    pub(crate) fn record_skipped(&mut self, id: i32, offset: usize) -> Result<()> {
        let slot = self.slot_mut(id)?;
        if matches!(slot, Slot::Vacant) {
            *slot = Slot::Skipped(offset);
        }
        Ok(())
    }

    /// Resolves a back-reference.
    pub(crate) fn resolve(&self, id: i32) -> Result<Target> {
        let slot = usize::try_from(id).ok().and_then(|index| self.slots.get(index));
        match slot {
            Some(Slot::Value(value)) => Ok(Target::Value(value.clone())),
            Some(Slot::Skipped(offset)) => Ok(Target::Skipped(*offset)),
            Some(Slot::Reserved) => Err(PofError::InvalidState(format!(
                "reference {id} points at an instance whose serializer did not register it"
            ))),
            Some(Slot::Vacant) | None => {
                Err(PofError::Malformed(format!("unknown reference id {id}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_ids_follow_first_occurrence() {
        let a = PofObject::new(1i32);
        let b = PofObject::new(2i32);
        let mut refs = WriteReferences::new();
        assert_eq!(refs.assign(&a).unwrap(), Assignment::New(0));
        assert_eq!(refs.assign(&b).unwrap(), Assignment::New(1));
        assert_eq!(refs.assign(&a).unwrap(), Assignment::Existing(0));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_reserved_ids_are_not_reassigned() {
        let mut refs = WriteReferences::new();
        assert_eq!(refs.assign(&PofObject::new(1i32)).unwrap(), Assignment::New(0));
        refs.reserve_through(3);
        assert_eq!(refs.next_id(), 4);
        assert_eq!(refs.assign(&PofObject::new(2i32)).unwrap(), Assignment::New(4));
        refs.reserve_through(1);
        assert_eq!(refs.next_id(), 5);
    }

    #[test]
    fn test_identity_not_equality() {
        let a = PofObject::new(String::from("same"));
        let b = PofObject::new(String::from("same"));
        let mut refs = WriteReferences::new();
        assert_eq!(refs.assign(&a).unwrap(), Assignment::New(0));
        assert_eq!(refs.assign(&b).unwrap(), Assignment::New(1));
    }

    #[test]
    fn test_reserved_then_filled() {
        let mut refs = ReadReferences::new(64);
        assert!(matches!(refs.begin(0).unwrap(), Definition::Decode));
        assert!(matches!(refs.resolve(0), Err(PofError::InvalidState(_))));
        refs.fill(0, PofValue::Int32(5)).unwrap();
        assert!(matches!(refs.resolve(0).unwrap(), Target::Value(PofValue::Int32(5))));
        refs.complete(0, &PofValue::Int32(6)).unwrap();
        assert!(matches!(refs.resolve(0).unwrap(), Target::Value(PofValue::Int32(5))));
    }

    #[test]
    fn test_skipped_slot_resolves_to_offset() {
        let mut refs = ReadReferences::new(64);
        refs.record_skipped(2, 17).unwrap();
        assert!(matches!(refs.resolve(2).unwrap(), Target::Skipped(17)));
        assert!(matches!(refs.resolve(1), Err(PofError::Malformed(_))));
        assert!(matches!(refs.begin(2).unwrap(), Definition::Decode));
    }

    #[test]
    fn test_duplicate_definition_is_malformed() {
        let mut refs = ReadReferences::new(64);
        refs.begin(0).unwrap();
        assert!(matches!(refs.begin(0), Err(PofError::Malformed(_))));
    }

    #[test]
    fn test_ids_beyond_stream_are_rejected() {
        let mut refs = ReadReferences::new(4);
        assert!(refs.begin(5).is_err());
        assert!(refs.begin(-1).is_err());
    }
}
