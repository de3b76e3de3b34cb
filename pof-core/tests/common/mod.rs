//! Shared fixtures for pof-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pof_core::serialization::{FutureData, PofObject, PofReader, PofWriter, Shared};
use pof_core::{
    CallOptions, Evolvable, PofConfig, PofSerializer, PofService, Result, SimplePofContext,
};
use pof_derive::PortableObject;

pub const FRIEND_TYPE: i32 = 1001;
pub const HOLDER_TYPE: i32 = 1002;
pub const RECORD_TYPE: i32 = 2000;
pub const PAIR_TYPE: i32 = 2001;
pub const PROBE_TYPE: i32 = 3000;

/// A node that may point at another node, possibly forming a cycle.
#[derive(Debug, Default, PortableObject)]
pub struct Friend {
    pub name: String,
    pub friend: Option<Shared<Friend>>,
}

/// Two slots that may point at the same instance.
#[derive(Debug, Default, PortableObject)]
pub struct Holder {
    pub first: Option<Shared<Friend>>,
    pub second: Option<Shared<Friend>>,
}

/// Version 1 of an evolving record: knows `a` and `b`.
#[derive(Debug, Default, PortableObject)]
pub struct RecordV1 {
    pub a: i32,
    pub b: String,
    #[pof(skip)]
    pub future: Option<FutureData>,
}

impl Evolvable for RecordV1 {
    fn implementation_version(&self) -> i32 {
        1
    }

    fn future_data(&self) -> Option<&FutureData> {
        self.future.as_ref()
    }

    fn set_future_data(&mut self, data: Option<FutureData>) {
        self.future = data;
    }
}

/// Version 2 of the same record: adds `c` at index 2.
#[derive(Debug, Default, PortableObject)]
pub struct RecordV2 {
    pub a: i32,
    pub b: String,
    pub c: i64,
    #[pof(skip)]
    pub future: Option<FutureData>,
}

impl Evolvable for RecordV2 {
    fn implementation_version(&self) -> i32 {
        2
    }

    fn future_data(&self) -> Option<&FutureData> {
        self.future.as_ref()
    }

    fn set_future_data(&mut self, data: Option<FutureData>) {
        self.future = data;
    }
}

/// Version 1 of a record holding shared nodes: knows `a`.
#[derive(Debug, Default, PortableObject)]
pub struct PairV1 {
    pub a: Option<Shared<Friend>>,
    #[pof(skip)]
    pub future: Option<FutureData>,
}

impl Evolvable for PairV1 {
    fn implementation_version(&self) -> i32 {
        1
    }

    fn future_data(&self) -> Option<&FutureData> {
        self.future.as_ref()
    }

    fn set_future_data(&mut self, data: Option<FutureData>) {
        self.future = data;
    }
}

/// Version 2 adds `c` at index 1.
#[derive(Debug, Default, PortableObject)]
pub struct PairV2 {
    pub a: Option<Shared<Friend>>,
    pub c: Option<Shared<Friend>>,
    #[pof(skip)]
    pub future: Option<FutureData>,
}

impl Evolvable for PairV2 {
    fn implementation_version(&self) -> i32 {
        2
    }

    fn future_data(&self) -> Option<&FutureData> {
        self.future.as_ref()
    }

    fn set_future_data(&mut self, data: Option<FutureData>) {
        self.future = data;
    }
}

/// Marker payload for probe serializers.
#[derive(Debug, Default)]
pub struct Probe;

type WriteFn = dyn Fn(&mut PofWriter<'_>, &PofObject) -> Result<()> + Send + Sync;
type ReadFn = dyn Fn(&mut PofReader<'_>) -> Result<PofObject> + Send + Sync;

/// Serializer assembled from closures, for exercising stream rules directly.
pub struct FnSerializer {
    write: Box<WriteFn>,
    read: Box<ReadFn>,
}

impl FnSerializer {
    pub fn new(
        write: impl Fn(&mut PofWriter<'_>, &PofObject) -> Result<()> + Send + Sync + 'static,
        read: impl Fn(&mut PofReader<'_>) -> Result<PofObject> + Send + Sync + 'static,
    ) -> Self {
        Self {
            write: Box::new(write),
            read: Box::new(read),
        }
    }

    pub fn write_only(
        write: impl Fn(&mut PofWriter<'_>, &PofObject) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self::new(write, |_| Ok(PofObject::new(Probe)))
    }

    pub fn read_only(
        read: impl Fn(&mut PofReader<'_>) -> Result<PofObject> + Send + Sync + 'static,
    ) -> Self {
        Self::new(|_, _| Ok(()), read)
    }
}

impl PofSerializer for FnSerializer {
    fn serialize(&self, writer: &mut PofWriter<'_>, object: &PofObject) -> Result<()> {
        (self.write)(writer, object)
    }

    fn deserialize(&self, reader: &mut PofReader<'_>) -> Result<PofObject> {
        (self.read)(reader)
    }
}

/// A context with the friend graph types registered.
pub fn graph_context() -> Arc<SimplePofContext> {
    let ctx = Arc::new(SimplePofContext::new());
    ctx.register_portable::<Friend>(FRIEND_TYPE).unwrap();
    ctx.register_portable::<Holder>(HOLDER_TYPE).unwrap();
    ctx
}

/// A context with a probe serializer registered for [`Probe`].
pub fn probe_context(serializer: FnSerializer) -> Arc<SimplePofContext> {
    let ctx = Arc::new(SimplePofContext::new());
    ctx.register_serializer::<Probe>(PROBE_TYPE, Arc::new(serializer))
        .unwrap();
    ctx
}

pub fn service(ctx: Arc<SimplePofContext>) -> PofService {
    PofService::new(ctx)
}

pub fn tracking_service(ctx: Arc<SimplePofContext>) -> PofService {
    let config = PofConfig::builder().reference_enabled(true).build().unwrap();
    PofService::with_config(ctx, config)
}

pub fn tracked() -> CallOptions {
    CallOptions::new().reference_enabled(true)
}

pub fn friend(name: &str) -> Shared<Friend> {
    Arc::new(std::sync::RwLock::new(Friend {
        name: name.to_string(),
        friend: None,
    }))
}

pub fn probe() -> PofObject {
    PofObject::new(Probe)
}
