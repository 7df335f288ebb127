use thiserror::Error;

/// Errors produced when decoding a compressed block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LzoError {
    /// The input ran out before the end marker was seen.
    #[error("compressed input truncated at byte {offset}: end marker not found")]
    InputOverrun { offset: usize },

    /// A match referenced bytes before the start of the output.
    #[error("match at byte {offset} reaches {distance} bytes back but only {produced} were produced")]
    LookbehindOverrun {
        offset: usize,
        distance: usize,
        produced: usize,
    },

    /// The decoded block would exceed the caller's output limit.
    #[error("decoded output exceeds limit of {limit} bytes")]
    OutputOverrun { limit: usize },

    /// Bytes followed the end marker.
    #[error("{remaining} bytes of input remain after the end marker")]
    TrailingInput { remaining: usize },
}

/// Result alias for codec operations.
pub type LzoResult<T> = Result<T, LzoError>;
