//! Portable Object Format encoding and decoding.
//!
//! Values are written as a packed type code followed by a payload. User
//! types are written as a version id followed by indexed properties and an
//! end marker, through serializers registered in a [`PofContext`].

mod codec;
pub mod constants;
mod context;
mod data_input;
mod data_output;
mod evolvable;
pub mod mutf8;
mod pof;
mod service;
mod temporal;
mod traits;
mod value;

pub use context::{PofContext, SimplePofContext};
pub use data_input::{decimal_from_parts, BufferInput, DataInput};
pub use data_output::{
    decimal_width, encode_packed, packed_len, BufferOutput, CloseHandle, DataOutput,
    MAX_PACKED_LEN,
};
pub use evolvable::{Evolvable, EvolvableSerializer, FutureData, TailReferences};
pub use pof::{
    downcast_object, pof_object, PofReader, PofSerializer, PofWriter, PortableObject,
    PortableObjectSerializer,
};
pub use service::{CallOptions, PofService};
pub use temporal::{
    DayTimeInterval, PofDateTime, PofTime, TimeInterval, YearMonthInterval, ZoneState,
};
pub use traits::{PofField, UniformElement};
pub use value::{PofObject, PofValue, Shared, SparseArray, TypeCode, UniformHint};
