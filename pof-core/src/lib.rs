//! Portable Object Format serialization core.
//!
//! Encodes values and user types to a compact, version-tolerant binary
//! format, preserving object identity and data written by newer versions of
//! a type.

#![warn(missing_docs)]

pub mod config;
pub mod config_file;
pub mod error;
pub mod serialization;

pub use config::{ConfigError, PofConfig, PofConfigBuilder};
pub use error::{ErrorCategory, PofError, Result, TypeLookupError};
pub use serialization::{
    CallOptions, Evolvable, FutureData, PofContext, PofField, PofObject, PofReader,
    PofSerializer, PofService, PofValue, PofWriter, PortableObject, Shared, SimplePofContext,
};
