use thiserror::Error;

/// Failure modes of the channel.
///
/// End-of-stream is not listed here: a read that finds no producers and an
/// empty buffer returns an empty result instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FifoError {
    /// A blocking wait was cancelled through its token. Every counter the
    /// call incremented has been rolled back.
    #[error("operation interrupted before completion")]
    Interrupted,

    /// A write found no consumers on the channel, either on entry or after
    /// the last one departed mid-wait.
    #[error("no consumers are attached to the channel")]
    BrokenPipe,

    /// The request exceeds the per-call transfer limit. Checked before any
    /// locking; no state is touched.
    #[error("request of {requested} bytes exceeds the transfer limit of {limit} bytes")]
    TooLarge { requested: usize, limit: usize },

    /// Channel construction was given a zero capacity.
    #[error("channel capacity must be at least 1 byte")]
    ZeroCapacity,

    /// Channel construction was given a transfer limit of zero, or one
    /// larger than the capacity, which a full transfer could never satisfy.
    #[error("transfer limit of {limit} bytes is invalid for a capacity of {capacity} bytes")]
    InvalidTransferLimit { limit: usize, capacity: usize },
}
