//! LZO block framing.
//!
//! A framed stream is a sequence of blocks, each
//! `[u16 LE compressed len][u16 LE uncompressed len][payload]`. Compressors
//! emit a block per `block_size` input bytes and a short final block at
//! flush (push) or upstream exhaustion (pull).

use tracing::{debug, warn};

use crate::config::{validate_block_size, FilterConfig, DEFAULT_LZO_BLOCK_SIZE};
use crate::error::{FilterError, FilterResult};
use crate::pull::{PullFilter, Upstream};
use crate::push::{Downstream, PushFilter};

/// Header preceding every compressed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub compressed_len: u16,
    pub uncompressed_len: u16,
}

impl BlockHeader {
    /// Encoded header size in bytes.
    pub const LEN: usize = 4;

    pub fn to_bytes(self) -> [u8; Self::LEN] {
        let c = self.compressed_len.to_le_bytes();
        let u = self.uncompressed_len.to_le_bytes();
        [c[0], c[1], u[0], u[1]]
    }

    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self {
            compressed_len: u16::from_le_bytes([bytes[0], bytes[1]]),
            uncompressed_len: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }

    fn validate(self) -> FilterResult<Self> {
        if self.compressed_len == 0 {
            warn!(uncompressed = self.uncompressed_len, "lzo block with zero compressed length");
            return Err(FilterError::MalformedBlock(
                "zero compressed length".into(),
            ));
        }
        Ok(self)
    }
}

/// Compress `block` into a complete frame (header plus payload).
fn encode_frame(block: &[u8], frame: &mut Vec<u8>) -> FilterResult<()> {
    let payload = stash_lzo::compress(block);
    let header = BlockHeader {
        compressed_len: u16::try_from(payload.len())
            .map_err(|_| FilterError::BlockTooLarge { len: payload.len() })?,
        uncompressed_len: u16::try_from(block.len())
            .map_err(|_| FilterError::BlockTooLarge { len: block.len() })?,
    };
    frame.clear();
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(&payload);
    debug!(
        uncompressed = block.len(),
        compressed = payload.len(),
        "lzo block compressed"
    );
    Ok(())
}

/// Decompress one payload and check it against its header.
fn decode_payload(header: BlockHeader, payload: &[u8]) -> FilterResult<Vec<u8>> {
    let expected = usize::from(header.uncompressed_len);
    let block = stash_lzo::decompress_with_limit(payload, expected)?;
    if block.len() != expected {
        warn!(expected, actual = block.len(), "lzo block length mismatch");
        return Err(FilterError::BlockLengthMismatch {
            expected,
            actual: block.len(),
        });
    }
    debug!(
        compressed = payload.len(),
        uncompressed = expected,
        "lzo block decompressed"
    );
    Ok(block)
}

fn checked_block_size(block_size: usize) -> FilterResult<usize> {
    validate_block_size(block_size)?;
    Ok(block_size)
}

/// Push filter compressing its input into framed blocks.
#[derive(Debug)]
pub struct LzoCompressSink {
    block_size: usize,
    block: Vec<u8>,
    frame: Vec<u8>,
}

impl LzoCompressSink {
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_LZO_BLOCK_SIZE,
            block: Vec::with_capacity(DEFAULT_LZO_BLOCK_SIZE),
            frame: Vec::new(),
        }
    }

    pub fn with_block_size(block_size: usize) -> FilterResult<Self> {
        let block_size = checked_block_size(block_size)?;
        Ok(Self {
            block_size,
            block: Vec::with_capacity(block_size),
            frame: Vec::new(),
        })
    }

    pub fn from_config(config: &FilterConfig) -> FilterResult<Self> {
        Self::with_block_size(config.lzo_block_size)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn emit(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<()> {
        encode_frame(&self.block, &mut self.frame)?;
        self.block.clear();
        downstream.put(&self.frame)?;
        Ok(())
    }
}

impl Default for LzoCompressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PushFilter for LzoCompressSink {
    fn put(&mut self, downstream: &mut Downstream<'_>, mut data: &[u8]) -> FilterResult<usize> {
        let total = data.len();
        while !data.is_empty() {
            let take = (self.block_size - self.block.len()).min(data.len());
            self.block.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.block.len() == self.block_size {
                self.emit(downstream)?;
            }
        }
        Ok(total)
    }

    fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        if !self.block.is_empty() {
            self.emit(downstream)?;
        }
        downstream.flush()
    }
}

/// Push filter decoding framed blocks, tolerating any split of its input.
#[derive(Debug, Default)]
pub struct LzoDecompressSink {
    header: Option<BlockHeader>,
    staged: Vec<u8>,
    /// Set once a frame fails to decode; the stream position is lost.
    failed: bool,
}

impl LzoDecompressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a frame has been started but not completed.
    pub fn is_mid_frame(&self) -> bool {
        self.header.is_some() || !self.staged.is_empty()
    }

    /// Whether an earlier frame failed to decode.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Consume the staged frame part once it is complete.
    fn advance(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<()> {
        let staged = std::mem::take(&mut self.staged);
        match self.header.take() {
            None => {
                let bytes = [staged[0], staged[1], staged[2], staged[3]];
                self.header = Some(BlockHeader::from_bytes(bytes).validate()?);
            }
            Some(h) => {
                let block = decode_payload(h, &staged)?;
                downstream.put(&block)?;
            }
        }
        // Reuse the allocation for the next frame part.
        self.staged = staged;
        self.staged.clear();
        Ok(())
    }
}

impl PushFilter for LzoDecompressSink {
    fn put(&mut self, downstream: &mut Downstream<'_>, mut data: &[u8]) -> FilterResult<usize> {
        if self.failed {
            return Err(FilterError::StreamFailed);
        }
        let total = data.len();
        while !data.is_empty() {
            let want = match self.header {
                None => BlockHeader::LEN,
                Some(h) => usize::from(h.compressed_len),
            };
            let take = (want - self.staged.len()).min(data.len());
            self.staged.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.staged.len() < want {
                break;
            }
            if let Err(err) = self.advance(downstream) {
                self.failed = true;
                return Err(err);
            }
        }
        Ok(total)
    }

    fn end(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        if self.failed {
            return Err(FilterError::StreamFailed);
        }
        if self.is_mid_frame() {
            let expected = self
                .header
                .map_or(BlockHeader::LEN, |h| usize::from(h.compressed_len));
            warn!(expected, actual = self.staged.len(), "lzo stream ended mid-frame");
            return Err(FilterError::TruncatedBlock {
                expected,
                actual: self.staged.len(),
            });
        }
        self.flush(downstream)
    }
}

/// Pull filter compressing its upstream into framed blocks.
#[derive(Debug)]
pub struct LzoCompressSource {
    block_size: usize,
    block: Vec<u8>,
    frame: Vec<u8>,
    pos: usize,
    done: bool,
}

impl LzoCompressSource {
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_LZO_BLOCK_SIZE,
            block: Vec::new(),
            frame: Vec::new(),
            pos: 0,
            done: false,
        }
    }

    pub fn with_block_size(block_size: usize) -> FilterResult<Self> {
        Ok(Self {
            block_size: checked_block_size(block_size)?,
            ..Self::new()
        })
    }

    pub fn from_config(config: &FilterConfig) -> FilterResult<Self> {
        Self::with_block_size(config.lzo_block_size)
    }
}

impl Default for LzoCompressSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PullFilter for LzoCompressSource {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        if self.pos == self.frame.len() {
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            self.block.resize(self.block_size, 0);
            let n = upstream.read_full(&mut self.block)?;
            // A short read means the upstream is exhausted.
            self.done = n < self.block_size;
            self.frame.clear();
            self.pos = 0;
            if n == 0 {
                return Ok(0);
            }
            encode_frame(&self.block[..n], &mut self.frame)?;
        }
        let n = buf.len().min(self.frame.len() - self.pos);
        buf[..n].copy_from_slice(&self.frame[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Pull filter decoding framed blocks from its upstream.
#[derive(Debug, Default)]
pub struct LzoDecompressSource {
    payload: Vec<u8>,
    block: Vec<u8>,
    pos: usize,
    done: bool,
}

impl LzoDecompressSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and decode the next frame; `false` at a clean end of stream.
    fn next_block(&mut self, upstream: &mut Upstream<'_>) -> FilterResult<bool> {
        let mut bytes = [0u8; BlockHeader::LEN];
        let n = upstream.read_full(&mut bytes)?;
        if n == 0 {
            return Ok(false);
        }
        if n < BlockHeader::LEN {
            warn!(actual = n, "truncated lzo block header");
            return Err(FilterError::TruncatedBlock {
                expected: BlockHeader::LEN,
                actual: n,
            });
        }
        let header = BlockHeader::from_bytes(bytes).validate()?;

        let expected = usize::from(header.compressed_len);
        self.payload.resize(expected, 0);
        let n = upstream.read_full(&mut self.payload)?;
        if n < expected {
            warn!(expected, actual = n, "truncated lzo block payload");
            return Err(FilterError::TruncatedBlock {
                expected,
                actual: n,
            });
        }
        self.block = decode_payload(header, &self.payload)?;
        self.pos = 0;
        Ok(true)
    }
}

impl PullFilter for LzoDecompressSource {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.block.len() {
            if self.done {
                return Ok(0);
            }
            if !self.next_block(upstream)? {
                self.done = true;
            }
        }
        let n = buf.len().min(self.block.len() - self.pos);
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferSink, BufferSource, PullChain, PushChain};

    fn compress_stream(data: &[u8], block_size: usize) -> Vec<u8> {
        let mut chain = PullChain::new();
        let ids = [
            chain.add(LzoCompressSource::with_block_size(block_size).unwrap()),
            chain.add(BufferSource::new(data.to_vec())),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        let mut out = Vec::new();
        chain.read_to_end(head, &mut out).unwrap();
        out
    }

    fn decompress_stream(framed: &[u8]) -> FilterResult<Vec<u8>> {
        let mut chain = PullChain::new();
        let ids = [
            chain.add(LzoDecompressSource::new()),
            chain.add(BufferSource::new(framed.to_vec())),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        let mut out = Vec::new();
        chain.read_to_end(head, &mut out)?;
        Ok(out)
    }

    #[test]
    fn header_layout() {
        let header = BlockHeader {
            compressed_len: 0x0102,
            uncompressed_len: 0x4000,
        };
        assert_eq!(header.to_bytes(), [0x02, 0x01, 0x00, 0x40]);
        assert_eq!(BlockHeader::from_bytes(header.to_bytes()), header);
    }

    #[test]
    fn empty_stream_has_no_blocks() {
        assert!(compress_stream(b"", 64).is_empty());
        assert!(decompress_stream(b"").unwrap().is_empty());
    }

    #[test]
    fn single_byte_stream() {
        let framed = compress_stream(b"x", 64);
        let header = BlockHeader::from_bytes([framed[0], framed[1], framed[2], framed[3]]);
        assert_eq!(header.uncompressed_len, 1);
        assert_eq!(usize::from(header.compressed_len), framed.len() - 4);
        assert_eq!(decompress_stream(&framed).unwrap(), b"x");
    }

    #[test]
    fn multi_block_stream() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 7) as u8).collect();
        let framed = compress_stream(&data, 256);
        // 1000 bytes at 256 per block: three full blocks and a short one.
        let mut blocks = 0;
        let mut rest = &framed[..];
        while !rest.is_empty() {
            let h = BlockHeader::from_bytes([rest[0], rest[1], rest[2], rest[3]]);
            rest = &rest[4 + usize::from(h.compressed_len)..];
            blocks += 1;
        }
        assert_eq!(blocks, 4);
        assert_eq!(decompress_stream(&framed).unwrap(), data);
    }

    #[test]
    fn zero_compressed_length_rejected() {
        let err = decompress_stream(&[0, 0, 5, 0]).unwrap_err();
        assert!(matches!(err, FilterError::MalformedBlock(_)));
    }

    #[test]
    fn truncated_header_rejected() {
        let err = decompress_stream(&[3, 0]).unwrap_err();
        assert!(matches!(
            err,
            FilterError::TruncatedBlock {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let framed = compress_stream(b"some bytes worth keeping", 64);
        let err = decompress_stream(&framed[..framed.len() - 1]).unwrap_err();
        assert!(matches!(err, FilterError::TruncatedBlock { .. }));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut framed = compress_stream(b"abcdefgh", 64);
        // Claim one byte more than the payload decodes to.
        framed[2] += 1;
        let err = decompress_stream(&framed).unwrap_err();
        assert!(matches!(
            err,
            FilterError::BlockLengthMismatch {
                expected: 9,
                actual: 8
            }
        ));
    }

    #[test]
    fn corrupt_payload_rejected() {
        let mut framed = compress_stream(b"abcdefgh", 64);
        let last = framed.len() - 3;
        framed[last] = 0x20;
        assert!(matches!(
            decompress_stream(&framed).unwrap_err(),
            FilterError::Lzo(_)
        ));
    }

    #[test]
    fn oversized_block_size_rejected() {
        assert!(LzoCompressSink::with_block_size(57 * 1024).is_err());
        assert!(LzoCompressSource::with_block_size(0).is_err());
        assert_eq!(
            LzoCompressSink::with_block_size(56 * 1024)
                .unwrap()
                .block_size(),
            57344
        );
    }

    #[test]
    fn push_sink_flush_emits_partial_block() {
        let mut chain = PushChain::new();
        let ids = [
            chain.add(LzoCompressSink::with_block_size(16).unwrap()),
            chain.add(BufferSink::with_capacity(1024)),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        chain.put(head, b"0123456789").unwrap();
        assert!(chain.filter::<BufferSink>(ids[1]).unwrap().is_empty());
        chain.flush(head).unwrap();

        let framed = chain.filter::<BufferSink>(ids[1]).unwrap().as_bytes().to_vec();
        assert_eq!(decompress_stream(&framed).unwrap(), b"0123456789");
    }

    #[test]
    fn push_decoder_byte_at_a_time() {
        let data = b"a block split across many single-byte puts".repeat(5);
        let framed = compress_stream(&data, 32);

        let mut chain = PushChain::new();
        let ids = [
            chain.add(LzoDecompressSink::new()),
            chain.add(BufferSink::with_capacity(4096)),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        for byte in &framed {
            chain.put(head, std::slice::from_ref(byte)).unwrap();
        }
        chain.end(head).unwrap();
        assert_eq!(chain.filter::<BufferSink>(ids[1]).unwrap().as_bytes(), &data[..]);
    }

    #[test]
    fn push_decoder_stays_failed_after_bad_frame() {
        let mut chain = PushChain::new();
        let ids = [
            chain.add(LzoDecompressSink::new()),
            chain.add(BufferSink::with_capacity(64)),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        let mut bad = vec![6, 0, 2, 0];
        bad.extend_from_slice(&[0xff; 6]);
        assert!(matches!(chain.put(head, &bad), Err(FilterError::Lzo(_))));

        let sink = chain.filter::<LzoDecompressSink>(head).unwrap();
        assert!(sink.has_failed());
        assert!(!sink.is_mid_frame());
        assert!(matches!(chain.put(head, &[1]), Err(FilterError::StreamFailed)));
        assert!(matches!(chain.put(head, &[0; 16]), Err(FilterError::StreamFailed)));
        assert!(matches!(chain.end(head), Err(FilterError::StreamFailed)));
        assert!(chain.filter::<BufferSink>(ids[1]).unwrap().is_empty());
    }

    #[test]
    fn push_decoder_fails_on_length_mismatch() {
        let mut framed = compress_stream(b"abcdefgh", 64);
        framed[2] += 1;
        let mut chain = PushChain::new();
        let node = chain.add(LzoDecompressSink::new());
        assert!(matches!(
            chain.put(node, &framed),
            Err(FilterError::BlockLengthMismatch { .. })
        ));
        assert!(matches!(chain.put(node, &framed), Err(FilterError::StreamFailed)));
    }

    #[test]
    fn push_decoder_end_mid_frame_is_error() {
        let framed = compress_stream(b"payload", 64);
        let mut chain = PushChain::new();
        let node = chain.add(LzoDecompressSink::new());
        chain.put(node, &framed[..framed.len() - 2]).unwrap();
        assert!(chain.filter::<LzoDecompressSink>(node).unwrap().is_mid_frame());
        assert!(matches!(
            chain.end(node),
            Err(FilterError::TruncatedBlock { .. })
        ));
    }
}
