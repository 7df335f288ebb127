//! Byte-stream filter chains for stash.
//!
//! Filters are arranged either as **pull chains**, where a consumer calls
//! [`PullChain::get`] on the head node and every node requests bytes from its
//! upstream neighbour, or as **push chains**, where a producer calls
//! [`PushChain::put`] on the head node and every node forwards transformed
//! bytes to its downstream neighbour.
//!
//! # Architecture
//!
//! - **Chains** own their nodes in an arena and hand out stable [`NodeId`]
//!   handles. Linking, re-linking and whole-chain teardown are implemented
//!   once, in the chain, not per filter.
//! - **Filters** implement [`PullFilter`] or [`PushFilter`] and only see a
//!   borrowed view of their neighbour ([`Upstream`] / [`Downstream`]).
//! - **Concrete filters**: in-memory buffers, storage-backed sources and
//!   sinks, a read-ahead cache, a checksum tap, base64 and LZO block framing.

pub mod config;
pub mod error;
pub mod filters;
mod links;
pub mod pull;
pub mod push;

pub use config::FilterConfig;
pub use error::{FilterError, FilterResult};
pub use filters::base64::{
    Base64DecodeSink, Base64DecodeSource, Base64EncodeSink, Base64EncodeSource,
};
pub use filters::buffer::{BufferSink, BufferSource};
pub use filters::cache::CacheFilter;
pub use filters::checksum::{ChecksumAccumulator, ChecksumFilter};
pub use filters::lzo::{
    BlockHeader, LzoCompressSink, LzoCompressSource, LzoDecompressSink, LzoDecompressSource,
};
pub use filters::storage::{StorageSink, StorageSource};
pub use links::NodeId;
pub use pull::{PullChain, PullFilter, Upstream};
pub use push::{Downstream, PushChain, PushFilter};

use std::any::Any;

/// Downcasting support for filters stored as trait objects.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A node that adds no transformation of its own.
///
/// As a pull filter it delegates to its upstream (returning 0 at the tail);
/// as a push filter it forwards to its downstream (consuming everything at
/// the tail).
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl PullFilter for PassThrough {}

impl PushFilter for PassThrough {}
