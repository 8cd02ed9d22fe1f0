//! Error types for numkern operations.
//!
//! Configuration errors are fatal for a run (a second live scheduler, a
//! precision that was not compiled in). Parameter errors describe a bad call
//! (mismatched dimensions, out-of-range selectors) and may be reported and
//! skipped by the caller. Numerical warnings are not errors: they are logged
//! and the algorithm continues with its documented fallback.

use std::fmt;

/// Errors that can occur during numkern operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// Memory allocation failed.
    AllocationError {
        /// The size that was requested to be allocated.
        requested_size: usize,
        /// The alignment that was requested.
        requested_alignment: usize,
        /// Human-readable error message.
        message: String,
    },
    /// Invalid layout parameters were provided.
    LayoutError {
        /// The size parameter that caused the error.
        size: usize,
        /// The alignment parameter that caused the error.
        alignment: usize,
        /// Human-readable error message.
        message: String,
    },
    /// The run is configured in a way the engine cannot honour.
    ConfigurationError {
        /// Human-readable error message.
        message: String,
    },
    /// An algorithm was called with arguments it cannot accept.
    ParameterError {
        /// Human-readable error message.
        message: String,
    },
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::AllocationError {
                requested_size,
                requested_alignment,
                message,
            } => write!(
                f,
                "Memory allocation failed: {} (requested {} bytes with {} byte alignment)",
                message, requested_size, requested_alignment
            ),
            KernelError::LayoutError {
                size,
                alignment,
                message,
            } => write!(
                f,
                "Invalid memory layout: {} (size: {}, alignment: {})",
                message, size, alignment
            ),
            KernelError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            KernelError::ParameterError { message } => {
                write!(f, "Parameter error: {}", message)
            }
        }
    }
}

impl std::error::Error for KernelError {}

impl KernelError {
    /// Returns `true` for errors that must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KernelError::ConfigurationError { .. } | KernelError::AllocationError { .. }
        )
    }
}

/// Result type alias for numkern operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Creates an allocation error.
pub fn allocation_error(size: usize, alignment: usize, message: impl Into<String>) -> KernelError {
    KernelError::AllocationError {
        requested_size: size,
        requested_alignment: alignment,
        message: message.into(),
    }
}

/// Creates a layout error.
pub fn layout_error(size: usize, alignment: usize, message: impl Into<String>) -> KernelError {
    KernelError::LayoutError {
        size,
        alignment,
        message: message.into(),
    }
}

/// Creates a configuration error.
pub fn configuration_error(message: impl Into<String>) -> KernelError {
    KernelError::ConfigurationError {
        message: message.into(),
    }
}

/// Creates a parameter error.
pub fn parameter_error(message: impl Into<String>) -> KernelError {
    KernelError::ParameterError {
        message: message.into(),
    }
}
