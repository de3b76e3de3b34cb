//! Serialization configuration types and builders.

/// Default for reference tracking when a call does not choose.
const DEFAULT_REFERENCE_ENABLED: bool = false;
/// Default maximum nesting of containers and user types.
const DEFAULT_MAX_DEPTH: usize = 512;
/// Largest accepted nesting limit. The codec recurses once per level, so
/// the limit must stay within what a default thread stack holds.
const MAX_DEPTH_LIMIT: usize = 512;
/// Default initial capacity of output buffers.
const DEFAULT_BUFFER_CAPACITY: usize = 256;
/// Largest accepted initial buffer capacity.
const MAX_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the validation message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Settings shared by every call made through a
/// [`PofService`](crate::serialization::PofService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PofConfig {
    reference_enabled: bool,
    max_depth: usize,
    buffer_capacity: usize,
    compact_values: bool,
}

impl PofConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PofConfigBuilder {
        PofConfigBuilder::new()
    }

    /// Returns whether calls track references unless they choose otherwise.
    pub fn reference_enabled(&self) -> bool {
        self.reference_enabled
    }

    /// Returns the maximum nesting of containers and user types.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the initial capacity of buffers allocated by the service.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Returns whether single-code encodings are emitted for small values.
    pub fn compact_values(&self) -> bool {
        self.compact_values
    }
}

impl Default for PofConfig {
    fn default() -> Self {
        Self {
            reference_enabled: DEFAULT_REFERENCE_ENABLED,
            max_depth: DEFAULT_MAX_DEPTH,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            compact_values: true,
        }
    }
}

impl From<PofConfig> for PofConfigBuilder {
    fn from(config: PofConfig) -> Self {
        Self {
            reference_enabled: Some(config.reference_enabled),
            max_depth: Some(config.max_depth),
            buffer_capacity: Some(config.buffer_capacity),
            compact_values: Some(config.compact_values),
        }
    }
}

/// Builder for `PofConfig`.
#[derive(Debug, Clone, Default)]
pub struct PofConfigBuilder {
    reference_enabled: Option<bool>,
    max_depth: Option<usize>,
    buffer_capacity: Option<usize>,
    compact_values: Option<bool>,
}

impl PofConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether calls track references by default.
    pub fn reference_enabled(mut self, enabled: bool) -> Self {
        self.reference_enabled = Some(enabled);
        self
    }

    /// Sets the maximum nesting of containers and user types.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sets the initial capacity of output buffers.
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }

    /// Sets whether single-code encodings are emitted for small values.
    pub fn compact_values(mut self, compact: bool) -> Self {
        self.compact_values = Some(compact);
        self
    }

    /// Builds the configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `max_depth` is zero or above 512
    /// - `buffer_capacity` exceeds 64 MiB
    pub fn build(self) -> Result<PofConfig, ConfigError> {
        let max_depth = self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH);
        let buffer_capacity = self.buffer_capacity.unwrap_or(DEFAULT_BUFFER_CAPACITY);

        if max_depth == 0 {
            return Err(ConfigError::new("max_depth must be at least 1"));
        }

        if max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::new(format!(
                "max_depth must not exceed {MAX_DEPTH_LIMIT}"
            )));
        }

        if buffer_capacity > MAX_BUFFER_CAPACITY {
            return Err(ConfigError::new(format!(
                "buffer_capacity must not exceed {MAX_BUFFER_CAPACITY} bytes"
            )));
        }

        Ok(PofConfig {
            reference_enabled: self.reference_enabled.unwrap_or(DEFAULT_REFERENCE_ENABLED),
            max_depth,
            buffer_capacity,
            compact_values: self.compact_values.unwrap_or(true),
        })
    }
}
