//! Type registry consulted by the codec for user types.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::evolvable::{Evolvable, EvolvableSerializer};
use super::pof::{PofSerializer, PortableObject, PortableObjectSerializer};
use crate::error::TypeLookupError;

/// Resolves user types in both directions.
///
/// Lookups may run concurrently from many calls. Each failure is reported
/// as one of the distinct [`TypeLookupError`] outcomes.
pub trait PofContext: Send + Sync {
    /// Returns the type id registered for a native type.
    fn user_type_id(&self, native: TypeId) -> Result<i32, TypeLookupError>;

    /// Returns the serializer registered for a type id.
    fn serializer(&self, type_id: i32) -> Result<Arc<dyn PofSerializer>, TypeLookupError>;

    /// Returns true if the native type has a registration.
    fn is_user_type(&self, native: TypeId) -> bool {
        self.user_type_id(native).is_ok()
    }
}

struct Registration {
    name: &'static str,
    native: TypeId,
    serializer: Arc<dyn PofSerializer>,
    stale: bool,
}

#[derive(Default)]
struct Registrations {
    by_id: HashMap<i32, Registration>,
    by_type: HashMap<TypeId, i32>,
}

/// A registry populated in code.
///
/// Registrations may be added, marked stale or removed while the context is
/// shared between threads.
#[derive(Default)]
pub struct SimplePofContext {
    registrations: RwLock<Registrations>,
}

impl SimplePofContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `serializer` for instances held as [`Shared<T>`](crate::serialization::Shared).
    ///
    /// Replaces any earlier registration under the same id or type.
    pub fn register_serializer<T: Send + Sync + 'static>(
        &self,
        type_id: i32,
        serializer: Arc<dyn PofSerializer>,
    ) -> Result<(), TypeLookupError> {
        self.register_native(
            type_id,
            TypeId::of::<RwLock<T>>(),
            type_name::<T>(),
            serializer,
        )
    }

    /// Registers a [`PortableObject`] type.
    pub fn register_portable<T: PortableObject>(&self, type_id: i32) -> Result<(), TypeLookupError> {
        self.register_serializer::<T>(type_id, Arc::new(PortableObjectSerializer::<T>::new()))
    }

    /// Registers a portable type that keeps properties from newer versions.
    pub fn register_evolvable<T: PortableObject + Evolvable>(
        &self,
        type_id: i32,
    ) -> Result<(), TypeLookupError> {
        self.register_serializer::<T>(type_id, Arc::new(EvolvableSerializer::<T>::new()))
    }

    /// Registers a serializer for an arbitrary native type descriptor.
    ///
    /// Use this for instances wrapped with
    /// [`PofObject::from_arc`](crate::serialization::PofObject::from_arc).
    pub fn register_native(
        &self,
        type_id: i32,
        native: TypeId,
        name: &'static str,
        serializer: Arc<dyn PofSerializer>,
    ) -> Result<(), TypeLookupError> {
        if type_id < 0 {
            return Err(TypeLookupError::InvalidTypeId(type_id));
        }
        let mut regs = self.write();
        if let Some(previous) = regs.by_id.remove(&type_id) {
            regs.by_type.remove(&previous.native);
        }
        if let Some(previous_id) = regs.by_type.insert(native, type_id) {
            regs.by_id.remove(&previous_id);
        }
        regs.by_id.insert(
            type_id,
            Registration {
                name,
                native,
                serializer,
                stale: false,
            },
        );
        debug!(type_id, type_name = name, "registered user type");
        Ok(())
    }

    /// Marks a registration as outdated. Lookups then report
    /// [`TypeLookupError::Stale`] until the type is registered again.
    pub fn mark_stale(&self, type_id: i32) -> bool {
        match self.write().by_id.get_mut(&type_id) {
            Some(registration) => {
                registration.stale = true;
                true
            }
            None => false,
        }
    }

    /// Removes a registration.
    pub fn unregister(&self, type_id: i32) -> bool {
        let mut regs = self.write();
        match regs.by_id.remove(&type_id) {
            Some(registration) => {
                regs.by_type.remove(&registration.native);
                true
            }
            None => false,
        }
    }

    /// Returns true if `type_id` is registered, stale or not.
    pub fn contains(&self, type_id: i32) -> bool {
        self.read().by_id.contains_key(&type_id)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registrations> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registrations> {
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl PofContext for SimplePofContext {
    fn user_type_id(&self, native: TypeId) -> Result<i32, TypeLookupError> {
        let regs = self.read();
        let type_id = *regs
            .by_type
            .get(&native)
            .ok_or_else(|| TypeLookupError::NotRegistered(format!("{native:?}")))?;
        match regs.by_id.get(&type_id) {
            Some(registration) if registration.stale => {
                Err(TypeLookupError::Stale(registration.name.to_string()))
            }
            Some(_) => Ok(type_id),
            None => Err(TypeLookupError::NotRegistered(format!("{native:?}"))),
        }
    }

    fn serializer(&self, type_id: i32) -> Result<Arc<dyn PofSerializer>, TypeLookupError> {
        if type_id < 0 {
            return Err(TypeLookupError::InvalidTypeId(type_id));
        }
        match self.read().by_id.get(&type_id) {
            Some(registration) if registration.stale => {
                Err(TypeLookupError::Stale(registration.name.to_string()))
            }
            Some(registration) => Ok(Arc::clone(&registration.serializer)),
            None => Err(TypeLookupError::NotRegistered(format!("type id {type_id}"))),
        }
    }
}

impl fmt::Debug for SimplePofContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = self.read();
        let mut ids: Vec<_> = regs
            .by_id
            .iter()
            .map(|(id, registration)| (*id, registration.name))
            .collect();
        ids.sort_unstable();
        f.debug_struct("SimplePofContext")
            .field("registrations", &ids)
            .finish()
    }
}
