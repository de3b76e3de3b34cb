//! Forward and backward compatible user types.
//!
//! An evolvable type keeps the properties it does not understand, written by
//! a newer version of itself, and writes them back out unchanged.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tracing::trace;

use super::pof::{expect_instance, PofReader, PofSerializer, PofWriter, PortableObject};
use super::value::{PofObject, Shared};
use crate::error::Result;

/// Properties from a newer version, kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FutureData {
    /// Version id of the writer that produced the bytes.
    pub version: i32,
    /// Encoded index/value pairs, without the end marker.
    pub bytes: Bytes,
    /// Reference markers found in `bytes`.
    pub references: TailReferences,
}

/// Identity and reference markers found in captured future data.
///
/// Ids inside the bytes are those of the call that captured them. A tail
/// holding markers can only be replayed into a call that tracks references
/// and has not handed out those ids yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TailReferences {
    /// Lowest id defined by an identity marker.
    pub first_identity: Option<i32>,
    /// Highest id named by any marker.
    pub last_id: Option<i32>,
    /// Whether a reference names an instance defined before the tail.
    pub external: bool,
}

impl TailReferences {
    /// Returns true if the tail holds no reference markers.
    pub fn is_empty(&self) -> bool {
        self.last_id.is_none()
    }

    pub(crate) fn record_identity(&mut self, id: i32) {
        self.first_identity = Some(self.first_identity.map_or(id, |first| first.min(id)));
        self.note_id(id);
    }

    pub(crate) fn record_reference(&mut self, id: i32) {
        if self.first_identity.map_or(true, |first| id < first) {
            self.external = true;
        }
        self.note_id(id);
    }

    fn note_id(&mut self, id: i32) {
        self.last_id = Some(self.last_id.map_or(id, |last| last.max(id)));
    }
}

/// A type that carries data from versions newer than its own.
pub trait Evolvable {
    /// Version this implementation writes.
    fn implementation_version(&self) -> i32;

    /// Future data captured on the last read, if any.
    fn future_data(&self) -> Option<&FutureData>;

    /// Replaces the captured future data.
    fn set_future_data(&mut self, data: Option<FutureData>);

    /// Version of the data held by this instance.
    fn data_version(&self) -> i32 {
        self.future_data()
            .map_or(self.implementation_version(), |data| data.version)
    }
}

/// Serializer for portable types that preserve future data.
///
/// On write the version is the larger of the implementation version and the
/// captured data version, and captured properties follow the known ones.
pub struct EvolvableSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: PortableObject + Evolvable> EvolvableSerializer<T> {
    /// Creates a serializer for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: PortableObject + Evolvable> Default for EvolvableSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EvolvableSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolvableSerializer")
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T: PortableObject + Evolvable> PofSerializer for EvolvableSerializer<T> {
    fn serialize(&self, writer: &mut PofWriter<'_>, object: &PofObject) -> Result<()> {
        let handle = expect_instance::<T>(object)?;
        let instance = handle.read().unwrap_or_else(PoisonError::into_inner);
        let version = instance
            .implementation_version()
            .max(instance.data_version());
        writer.set_version_id(version)?;
        instance.write_external(writer)?;
        writer.write_future_data(instance.future_data())
    }

    fn deserialize(&self, reader: &mut PofReader<'_>) -> Result<PofObject> {
        let handle: Shared<T> = Arc::new(RwLock::new(T::default()));
        let object = PofObject::from_shared(Arc::clone(&handle));
        reader.register_identity(object.clone())?;

        let mut instance = handle.write().unwrap_or_else(PoisonError::into_inner);
        instance.read_external(reader)?;
        let bytes = reader.read_remainder()?;
        let references = reader.remainder_references();
        let version = reader.version_id();
        if !bytes.is_empty() || version > instance.implementation_version() {
            trace!(
                type_id = reader.user_type_id(),
                version,
                future_bytes = bytes.len(),
                reference_markers = !references.is_empty(),
                "captured future data"
            );
            instance.set_future_data(Some(FutureData {
                version,
                bytes,
                references,
            }));
        } else {
            instance.set_future_data(None);
        }
        drop(instance);
        Ok(object)
    }
}
