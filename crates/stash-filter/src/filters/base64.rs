//! Base64 (`A–Z a–z 0–9 + /`, `=` padding) encode and decode filters.
//!
//! Decoding skips every byte outside the alphabet, whitespace included. The
//! first `=` terminates decoding for good: the partial group is decoded and
//! everything after it is ignored.

use crate::error::FilterResult;
use crate::pull::{PullFilter, Upstream};
use crate::push::{Downstream, PushFilter};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';

const SKIP: u8 = 0xff;
const TERMINATE: u8 = 0xfe;

static DECODE: [u8; 256] = decode_table();

const fn decode_table() -> [u8; 256] {
    let mut table = [SKIP; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table[PAD as usize] = TERMINATE;
    table
}

/// Encode `data` in one shot.
pub fn encode(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len().div_ceil(3) * 4);
    let mut state = EncodeState::default();
    state.push(data, &mut out);
    state.finish(&mut out);
    // The alphabet and padding are ASCII.
    out.into_iter().map(char::from).collect()
}

/// Decode `text` in one shot, skipping non-alphabet bytes.
pub fn decode(text: impl AsRef<[u8]>) -> Vec<u8> {
    let text = text.as_ref();
    let mut out = Vec::with_capacity(text.len() / 4 * 3 + 2);
    let mut state = DecodeState::default();
    state.push(text, &mut out);
    state.finish(&mut out);
    out
}

#[derive(Clone, Debug, Default)]
struct EncodeState {
    held: [u8; 3],
    len: usize,
}

impl EncodeState {
    fn push(&mut self, data: &[u8], out: &mut Vec<u8>) {
        for &byte in data {
            self.held[self.len] = byte;
            self.len += 1;
            if self.len == 3 {
                encode_group(&self.held, out);
                self.len = 0;
            }
        }
    }

    /// Emit the partial group, padded.
    fn finish(&mut self, out: &mut Vec<u8>) {
        if self.len > 0 {
            encode_group(&self.held[..self.len], out);
            self.len = 0;
        }
    }
}

fn encode_group(group: &[u8], out: &mut Vec<u8>) {
    let b0 = group[0];
    let b1 = group.get(1).copied().unwrap_or(0);
    let b2 = group.get(2).copied().unwrap_or(0);
    out.push(ALPHABET[(b0 >> 2) as usize]);
    out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize]);
    out.push(if group.len() > 1 {
        ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize]
    } else {
        PAD
    });
    out.push(if group.len() > 2 {
        ALPHABET[(b2 & 0x3f) as usize]
    } else {
        PAD
    });
}

#[derive(Clone, Debug, Default)]
struct DecodeState {
    held: [u8; 4],
    len: usize,
    terminated: bool,
}

impl DecodeState {
    fn push(&mut self, text: &[u8], out: &mut Vec<u8>) {
        for &c in text {
            if self.terminated {
                return;
            }
            match DECODE[c as usize] {
                SKIP => {}
                TERMINATE => {
                    self.finish(out);
                    self.terminated = true;
                }
                value => {
                    self.held[self.len] = value;
                    self.len += 1;
                    if self.len == 4 {
                        decode_group(&self.held, out);
                        self.len = 0;
                    }
                }
            }
        }
    }

    /// Emit whatever the partial group decodes to.
    fn finish(&mut self, out: &mut Vec<u8>) {
        decode_group(&self.held[..self.len], out);
        self.len = 0;
    }
}

fn decode_group(values: &[u8], out: &mut Vec<u8>) {
    if values.len() >= 2 {
        out.push((values[0] << 2) | (values[1] >> 4));
    }
    if values.len() >= 3 {
        out.push((values[1] << 4) | (values[2] >> 2));
    }
    if values.len() == 4 {
        out.push((values[2] << 6) | values[3]);
    }
}

/// Serve `pending[*pos..]` into `buf`.
fn serve(pending: &[u8], pos: &mut usize, buf: &mut [u8]) -> usize {
    let n = buf.len().min(pending.len() - *pos);
    buf[..n].copy_from_slice(&pending[*pos..*pos + n]);
    *pos += n;
    n
}

/// Push filter encoding raw bytes to base64.
///
/// `flush` pads and emits the partial group, so flush only at the end of a
/// logical stream.
#[derive(Clone, Debug, Default)]
pub struct Base64EncodeSink {
    state: EncodeState,
    out: Vec<u8>,
}

impl Base64EncodeSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PushFilter for Base64EncodeSink {
    fn put(&mut self, downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        self.out.clear();
        self.state.push(data, &mut self.out);
        downstream.put(&self.out)?;
        Ok(data.len())
    }

    fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        self.out.clear();
        self.state.finish(&mut self.out);
        downstream.put(&self.out)?;
        downstream.flush()
    }
}

/// Push filter decoding base64 to raw bytes.
#[derive(Clone, Debug, Default)]
pub struct Base64DecodeSink {
    state: DecodeState,
    out: Vec<u8>,
}

impl Base64DecodeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `=` has ended decoding.
    pub fn is_terminated(&self) -> bool {
        self.state.terminated
    }
}

impl PushFilter for Base64DecodeSink {
    fn put(&mut self, downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        self.out.clear();
        self.state.push(data, &mut self.out);
        downstream.put(&self.out)?;
        Ok(data.len())
    }

    fn flush(&mut self, downstream: &mut Downstream<'_>) -> FilterResult<usize> {
        self.out.clear();
        self.state.finish(&mut self.out);
        downstream.put(&self.out)?;
        downstream.flush()
    }
}

/// Pull filter encoding its upstream to base64.
#[derive(Clone, Debug, Default)]
pub struct Base64EncodeSource {
    state: EncodeState,
    scratch: Vec<u8>,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl Base64EncodeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PullFilter for Base64EncodeSource {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.pending.len() {
                return Ok(serve(&self.pending, &mut self.pos, buf));
            }
            if self.done {
                return Ok(0);
            }
            self.pending.clear();
            self.pos = 0;

            // Enough raw bytes to fill `buf` once encoded.
            self.scratch.resize((buf.len() / 4 + 1) * 3, 0);
            let n = upstream.get(&mut self.scratch)?;
            if n == 0 {
                self.state.finish(&mut self.pending);
                self.done = true;
            } else {
                self.state.push(&self.scratch[..n], &mut self.pending);
            }
        }
    }
}

/// Pull filter decoding base64 from its upstream.
///
/// Once a `=` has been seen the upstream is no longer read.
#[derive(Clone, Debug, Default)]
pub struct Base64DecodeSource {
    state: DecodeState,
    scratch: Vec<u8>,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl Base64DecodeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PullFilter for Base64DecodeSource {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pos < self.pending.len() {
                return Ok(serve(&self.pending, &mut self.pos, buf));
            }
            if self.done || self.state.terminated {
                return Ok(0);
            }
            self.pending.clear();
            self.pos = 0;

            // Enough characters to fill `buf` once decoded.
            self.scratch.resize(buf.len().div_ceil(3) * 4, 0);
            let n = upstream.get(&mut self.scratch)?;
            if n == 0 {
                self.state.finish(&mut self.pending);
                self.done = true;
            } else {
                self.state.push(&self.scratch[..n], &mut self.pending);
            }
        }
    }
}
