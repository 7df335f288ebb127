use bytes::{Bytes, BytesMut};

use crate::error::FilterResult;
use crate::pull::{PullFilter, Upstream};
use crate::push::{Downstream, PushFilter};

/// Pull source serving a fixed in-memory region.
#[derive(Clone, Debug)]
pub struct BufferSource {
    data: Bytes,
    pos: usize,
}

impl BufferSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Bytes not yet served.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Bytes served so far.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl PullFilter for BufferSource {
    fn get(&mut self, _upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Push sink collecting into a fixed-capacity buffer.
///
/// A `put` beyond the remaining capacity stores what fits and drops the
/// rest; the returned count says how much was kept. The buffer never grows.
#[derive(Clone, Debug)]
pub struct BufferSink {
    data: BytesMut,
    capacity: usize,
}

impl BufferSink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Bytes {
        self.data.freeze()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Room left before data starts being dropped.
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }
}

impl PushFilter for BufferSink {
    fn put(&mut self, _downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        let n = data.len().min(self.remaining());
        self.data.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self, _downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        Ok(0)
    }
}
