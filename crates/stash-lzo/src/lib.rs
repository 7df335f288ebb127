//! LZO1X-derived block codec.
//!
//! Pure functions over whole buffers with no streaming state. The framing
//! filters in `stash-filter` split streams into blocks and call into this
//! crate once per block.
//!
//! # Stream grammar
//!
//! A compressed block is a sequence of literal runs and matches terminated by
//! the end marker `0x11 0x00 0x00`. Matches come in four encodings
//! (M1 through M4) selected by distance and length; long lengths use a zero
//! byte followed by a base-255 continuation. See [`compress`] and
//! [`decompress`] for the details of each side.

pub mod compress;
pub mod decompress;
pub mod error;

pub use compress::{compress, worst_case_compressed_len};
pub use decompress::{decompress, decompress_with_limit};
pub use error::{LzoError, LzoResult};

/// Longest match encodable as M2.
pub(crate) const M2_MAX_LEN: usize = 8;
/// Longest match encodable inline as M3.
pub(crate) const M3_MAX_LEN: usize = 33;
/// Longest match encodable inline as M4.
pub(crate) const M4_MAX_LEN: usize = 9;

pub(crate) const M1_MAX_OFFSET: usize = 0x0400;
pub(crate) const M2_MAX_OFFSET: usize = 0x0800;
pub(crate) const M3_MAX_OFFSET: usize = 0x4000;
pub(crate) const M4_MAX_OFFSET: usize = 0xbfff;

pub(crate) const M3_MARKER: u8 = 32;
pub(crate) const M4_MARKER: u8 = 16;

/// Bytes that terminate every compressed block.
pub const END_MARKER: [u8; 3] = [M4_MARKER | 1, 0, 0];

/// Inputs up to this length are stored as a single literal run.
pub const MIN_MATCH_INPUT: usize = M2_MAX_LEN + 5;
