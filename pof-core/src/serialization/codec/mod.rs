//! Encoding and decoding of complete values, including user types.
//!
//! A call owns one [`WriteState`] or [`ReadState`] for its whole duration.
//! The state carries the stream, the type registry, the reference table and
//! the cursor bookkeeping that keeps nested structures stack-disciplined.

mod decode;
mod encode;
pub(crate) mod references;

use std::sync::Arc;

pub(crate) use decode::{decode_value, skip_value};
pub(crate) use encode::encode_value;

use tracing::warn;

use crate::config::PofConfig;
use crate::error::{PofError, Result, TypeLookupError};
use crate::serialization::context::PofContext;
use crate::serialization::data_input::{BufferInput, DataInput};
use crate::serialization::data_output::BufferOutput;
use crate::serialization::evolvable::TailReferences;

use references::{ReadReferences, WriteReferences};

/// Per-call encoding state.
pub(crate) struct WriteState {
    pub(crate) out: BufferOutput,
    pub(crate) context: Arc<dyn PofContext>,
    pub(crate) references: Option<WriteReferences>,
    pub(crate) compact: bool,
    max_depth: usize,
    depth: usize,
    /// Number of user type writers currently open.
    pub(crate) open_level: usize,
}

impl WriteState {
    pub(crate) fn new(
        out: BufferOutput,
        context: Arc<dyn PofContext>,
        tracking: bool,
        config: &PofConfig,
    ) -> Self {
        Self {
            out,
            context,
            references: tracking.then(WriteReferences::new),
            compact: config.compact_values(),
            max_depth: config.max_depth(),
            depth: 0,
            open_level: 0,
        }
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        enter(&mut self.depth, self.max_depth)
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn tracking(&self) -> bool {
        self.references.is_some()
    }

    /// Number of distinct instances given an identity in this call.
    pub(crate) fn tracked(&self) -> usize {
        self.references.as_ref().map_or(0, WriteReferences::len)
    }

    /// Checks that captured bytes carrying `tail` markers can be copied
    /// into this call's stream unchanged.
    pub(crate) fn check_replay(&self, tail: &TailReferences) -> Result<()> {
        if tail.is_empty() {
            return Ok(());
        }
        let Some(references) = self.references.as_ref() else {
            return Err(PofError::InvalidState(
                "future data holds reference markers but this call does not track references"
                    .to_string(),
            ));
        };
        if tail.external {
            return Err(PofError::InvalidState(
                "future data refers to an instance defined outside it".to_string(),
            ));
        }
        match tail.first_identity {
            Some(first) if first < references.next_id() => Err(PofError::InvalidState(format!(
                "future data identity {first} collides with ids already used by this call"
            ))),
            _ => Ok(()),
        }
    }

    /// Keeps ids named by replayed bytes from being handed out again.
    pub(crate) fn reserve_replayed(&mut self, tail: &TailReferences) {
        if let (Some(references), Some(last)) = (self.references.as_mut(), tail.last_id) {
            references.reserve_through(last);
        }
    }

    pub(crate) fn into_output(self) -> BufferOutput {
        self.out
    }
}

/// Per-call decoding state.
pub(crate) struct ReadState {
    pub(crate) input: BufferInput,
    pub(crate) context: Arc<dyn PofContext>,
    pub(crate) references: ReadReferences,
    /// Collects markers while a remainder is being skipped.
    pub(crate) tail_references: Option<TailReferences>,
    max_depth: usize,
    depth: usize,
    /// Number of user type readers currently open.
    pub(crate) open_level: usize,
}

impl ReadState {
    pub(crate) fn new(input: BufferInput, context: Arc<dyn PofContext>, config: &PofConfig) -> Self {
        let stream_len = input.position() + input.remaining();
        Self {
            input,
            context,
            references: ReadReferences::new(stream_len),
            tail_references: None,
            max_depth: config.max_depth(),
            depth: 0,
            open_level: 0,
        }
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        enter(&mut self.depth, self.max_depth)
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn into_input(self) -> BufferInput {
        self.input
    }
}

fn enter(depth: &mut usize, limit: usize) -> Result<()> {
    if *depth >= limit {
        return Err(PofError::DepthExceeded { limit });
    }
    *depth += 1;
    Ok(())
}

/// Converts a registry outcome into a codec error, logging stale entries.
pub(crate) fn lookup_failed(error: TypeLookupError) -> PofError {
    if let TypeLookupError::Stale(ref type_name) = error {
        warn!(type_name = %type_name, "type registration is stale");
    }
    PofError::UnknownType(error)
}
