//! Driver error types and the shared result alias

use std::error::Error as StdError;
use std::fmt;

/// Result type used throughout the driver.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Failures surfaced by the driver, split by the phase they occur in.
///
/// Initialization failures never escape [`crate::engine::initialize`]; they
/// are logged and folded into an absent handle. Generation failures travel in
/// [`crate::driver::BatchReport::failure`] next to whatever results completed
/// before the halt.
#[derive(Debug)]
pub enum DriverError {
    /// The engine could not be constructed for the requested model.
    InitializationError {
        /// Model identifier the engine was asked to load.
        engine: String,
        /// Human-readable cause.
        message: String,
        /// Underlying error, when one exists.
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// A submitted chunk failed inside the engine.
    GenerationError {
        /// Human-readable cause.
        message: String,
        /// Whether the failure looks like accelerator memory pressure.
        resource_exhausted: bool,
        /// Underlying error, when one exists.
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// A configuration value was rejected before any work started.
    ConfigurationError {
        /// Human-readable cause.
        message: String,
        /// Name of the offending parameter.
        parameter: String,
    },
}

impl DriverError {
    /// Build a generation failure, classifying memory pressure from the
    /// message text when the source does not carry a typed signal.
    pub fn generation(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        let message = message.into();
        let resource_exhausted = message.to_ascii_lowercase().contains("out of memory");
        DriverError::GenerationError {
            message,
            resource_exhausted,
            source,
        }
    }

    /// True when retrying with a smaller `batch_size` or `max_tokens` is the
    /// likely remedy.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            DriverError::GenerationError {
                resource_exhausted: true,
                ..
            }
        )
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::InitializationError { engine, message, .. } => {
                write!(f, "Initialization error for {}: {}", engine, message)
            }
            DriverError::GenerationError { message, .. } => {
                write!(f, "Generation error: {}", message)
            }
            DriverError::ConfigurationError { message, parameter } => {
                write!(f, "Configuration error for {}: {}", parameter, message)
            }
        }
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DriverError::InitializationError { source, .. } => {
                source.as_ref().map(|s| s.as_ref() as &(dyn StdError + 'static))
            }
            DriverError::GenerationError { source, .. } => {
                source.as_ref().map(|s| s.as_ref() as &(dyn StdError + 'static))
            }
            DriverError::ConfigurationError { .. } => None,
        }
    }
}
