//! Errors in the library.
use thiserror::Error;

/// Errors raised by the experience buffers.
///
/// Every variant is a violation of the caller's contract; none of them is
/// recoverable by retrying the same call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    /// The buffer was configured with zero capacity.
    #[error("Capacity must be positive")]
    ZeroCapacity,

    /// The multi-step horizon was zero.
    #[error("Multi-step horizon must be positive")]
    ZeroHorizon,

    /// A batch of zero transitions was requested.
    #[error("Batch size must be positive")]
    ZeroBatchSize,

    /// More transitions were requested than the buffer holds.
    #[error("Requested {requested} transitions, but only {available} are stored")]
    InsufficientTransitions {
        /// Requested batch size.
        requested: usize,
        /// Number of stored transitions.
        available: usize,
    },

    /// The operation does not belong to the buffer's mode.
    #[error("`{operation}` is not supported by a buffer in {mode} mode")]
    ModeMismatch {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Mode of the buffer.
        mode: &'static str,
    },

    /// A transition carried a next action when the buffer does not store one,
    /// or lacked one when the buffer requires it.
    #[error("Next action presence does not match the buffer (expects next action: {expected})")]
    NextActionMismatch {
        /// Whether the buffer stores next actions.
        expected: bool,
    },

    /// A slot index does not refer to a stored transition.
    #[error("Slot index {index} is out of range for {size} stored transitions")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of stored transitions.
        size: usize,
    },

    /// Indices and TD errors given to a priority update differ in length.
    #[error("Got {ixs} indices but {td_errs} TD errors")]
    LengthMismatch {
        /// Number of indices.
        ixs: usize,
        /// Number of TD errors.
        td_errs: usize,
    },

    /// A priority computed from a TD error is NaN, infinite or underflows to
    /// zero.
    #[error("Priority {0} is not positive and finite")]
    InvalidPriority(f32),

    /// A prioritization parameter is out of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A step was processed before the step processor was reset.
    #[error("Step processor is not reset. Forgot to call reset()?")]
    NotReset,
}
