//! Entry points for serializing and deserializing complete values.

use std::any::{type_name, Any};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::codec::{decode_value, encode_value, ReadState, WriteState};
use super::context::PofContext;
use super::data_input::BufferInput;
use super::data_output::BufferOutput;
use super::value::{PofObject, PofValue, Shared};
use crate::config::PofConfig;
use crate::error::{PofError, Result};

/// Per-call options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    reference_enabled: Option<bool>,
}

impl CallOptions {
    /// Options that follow the service configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables reference tracking for this call.
    pub fn reference_enabled(mut self, enabled: bool) -> Self {
        self.reference_enabled = Some(enabled);
        self
    }
}

/// Serializes and deserializes values against one type registry.
///
/// Every call is independent: the reference table and cursor state live
/// only for the duration of the call, so a service can be shared between
/// threads and re-entered from inside a serializer.
#[derive(Clone)]
pub struct PofService {
    context: Arc<dyn PofContext>,
    config: PofConfig,
}

impl PofService {
    /// Creates a service with the default configuration.
    pub fn new(context: Arc<dyn PofContext>) -> Self {
        Self::with_config(context, PofConfig::default())
    }

    /// Creates a service with an explicit configuration.
    pub fn with_config(context: Arc<dyn PofContext>, config: PofConfig) -> Self {
        Self { context, config }
    }

    /// Returns the type registry.
    pub fn context(&self) -> &Arc<dyn PofContext> {
        &self.context
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PofConfig {
        &self.config
    }

    /// Serializes `value` into a new buffer.
    pub fn serialize(&self, value: &PofValue) -> Result<Bytes> {
        self.serialize_with(value, CallOptions::default())
    }

    /// Serializes `value` into a new buffer with per-call options.
    pub fn serialize_with(&self, value: &PofValue, options: CallOptions) -> Result<Bytes> {
        let mut out = BufferOutput::with_capacity(self.config.buffer_capacity());
        self.serialize_into(value, &mut out, options)?;
        Ok(out.into_bytes())
    }

    /// Appends the encoding of `value` to a caller-supplied buffer.
    ///
    /// On failure the buffer is truncated back to its length on entry.
    pub fn serialize_into(
        &self,
        value: &PofValue,
        out: &mut BufferOutput,
        options: CallOptions,
    ) -> Result<()> {
        let start = out.len();
        let tracking = options
            .reference_enabled
            .unwrap_or(self.config.reference_enabled());
        let mut state = WriteState::new(
            std::mem::take(out),
            Arc::clone(&self.context),
            tracking,
            &self.config,
        );
        let result = encode_value(&mut state, value, None);
        let tracked = state.tracked();
        *out = state.into_output();

        match result {
            Ok(()) => {
                debug!(
                    bytes = out.len() - start,
                    tracking,
                    tracked,
                    "serialized value"
                );
                Ok(())
            }
            Err(e) => {
                out.truncate(start);
                debug!(error = %e, tracking, "serialization failed");
                Err(e)
            }
        }
    }

    /// Deserializes one value from `bytes`.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<PofValue> {
        self.deserialize_bytes(Bytes::copy_from_slice(bytes))
    }

    /// Deserializes one value from shared bytes without copying them.
    pub fn deserialize_bytes(&self, bytes: Bytes) -> Result<PofValue> {
        let mut input = BufferInput::new(bytes);
        self.deserialize_from(&mut input)
    }

    /// Deserializes the next value from a caller-supplied stream, leaving
    /// the stream positioned after it.
    ///
    /// Identity markers in the stream are always honored.
    pub fn deserialize_from(&self, input: &mut BufferInput) -> Result<PofValue> {
        let start = input.position();
        let taken = std::mem::replace(input, BufferInput::new(Bytes::new()));
        let mut state = ReadState::new(taken, Arc::clone(&self.context), &self.config);
        let result = decode_value(&mut state);
        *input = state.into_input();

        match result {
            Ok(value) => {
                debug!(
                    bytes = input.position() - start,
                    kind = value.kind(),
                    "deserialized value"
                );
                Ok(value)
            }
            Err(e) => {
                debug!(error = %e, position = input.position(), "deserialization failed");
                Err(e)
            }
        }
    }

    /// Serializes a shared user type instance.
    pub fn serialize_object<T: Any + Send + Sync>(&self, handle: &Shared<T>) -> Result<Bytes> {
        self.serialize(&PofValue::Object(PofObject::from_shared(Arc::clone(handle))))
    }

    /// Deserializes a user type instance of a known type.
    pub fn deserialize_object<T: Any + Send + Sync>(&self, bytes: &[u8]) -> Result<Shared<T>> {
        let value = self.deserialize(bytes)?;
        let object = value.as_object()?.ok_or(PofError::Conversion {
            expected: type_name::<T>(),
            found: "null",
        })?;
        object.downcast::<T>().ok_or(PofError::Conversion {
            expected: type_name::<T>(),
            found: "object",
        })
    }
}

impl std::fmt::Debug for PofService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PofService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
