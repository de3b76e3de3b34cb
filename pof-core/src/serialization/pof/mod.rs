//! Indexed-property streams for user types and the serializer contract.

mod reader;
mod writer;

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock};

pub use reader::PofReader;
pub use writer::PofWriter;

use crate::error::{PofError, Result};
use crate::serialization::value::{PofObject, Shared};

/// Encodes and decodes the properties of one user type.
///
/// Implementations are registered in a
/// [`PofContext`](crate::serialization::PofContext) under a type id and
/// looked up for every instance of that type.
pub trait PofSerializer: Send + Sync {
    /// Writes the properties of `object`.
    fn serialize(&self, writer: &mut PofWriter<'_>, object: &PofObject) -> Result<()>;

    /// Reads properties and returns the new instance.
    ///
    /// Implementations that build instances which may be referred to from
    /// their own properties call
    /// [`PofReader::register_identity`] before reading those properties.
    fn deserialize(&self, reader: &mut PofReader<'_>) -> Result<PofObject>;
}

/// A user type that reads and writes its own properties.
///
/// Instances are held as [`Shared`] handles so object graphs can share and
/// cycle through them.
pub trait PortableObject: Default + Send + Sync + 'static {
    /// Reads the properties of `self` from `reader`.
    fn read_external(&mut self, reader: &mut PofReader<'_>) -> Result<()>;

    /// Writes the properties of `self` to `writer`.
    fn write_external(&self, writer: &mut PofWriter<'_>) -> Result<()>;
}

/// Wraps a portable value in a new shared handle.
pub fn pof_object<T: PortableObject>(value: T) -> PofObject {
    PofObject::new(value)
}

/// Returns the shared handle behind `object` if it holds a `T`.
pub fn downcast_object<T: PortableObject>(object: &PofObject) -> Option<Shared<T>> {
    object.downcast::<T>()
}

pub(crate) fn expect_instance<T: Send + Sync + 'static>(object: &PofObject) -> Result<Shared<T>> {
    object.downcast::<T>().ok_or_else(|| {
        PofError::InvalidState(format!(
            "serializer for {} received an instance of another type",
            type_name::<T>()
        ))
    })
}

/// Serializer for any [`PortableObject`].
pub struct PortableObjectSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: PortableObject> PortableObjectSerializer<T> {
    /// Creates a serializer for `T`.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: PortableObject> Default for PortableObjectSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PortableObjectSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortableObjectSerializer")
            .field("type", &type_name::<T>())
            .finish()
    }
}

impl<T: PortableObject> PofSerializer for PortableObjectSerializer<T> {
    fn serialize(&self, writer: &mut PofWriter<'_>, object: &PofObject) -> Result<()> {
        let handle = expect_instance::<T>(object)?;
        let instance = handle.read().unwrap_or_else(PoisonError::into_inner);
        instance.write_external(writer)
    }

    fn deserialize(&self, reader: &mut PofReader<'_>) -> Result<PofObject> {
        let handle: Shared<T> = Arc::new(RwLock::new(T::default()));
        let object = PofObject::from_shared(Arc::clone(&handle));
        reader.register_identity(object.clone())?;
        handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .read_external(reader)?;
        Ok(object)
    }
}
