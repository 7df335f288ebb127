use tracing::{trace, warn};

use crate::error::{LzoError, LzoResult};
use crate::{M1_MAX_OFFSET, M2_MAX_OFFSET};

/// Decompress one block with no limit on the output size.
pub fn decompress(input: &[u8]) -> LzoResult<Vec<u8>> {
    decompress_with_limit(input, usize::MAX)
}

/// Decompress one block, failing if the output would exceed `limit` bytes.
///
/// Decoding stops at the end marker. Running out of input before the marker,
/// a match reaching before the start of the output, or bytes left over after
/// the marker are all errors.
pub fn decompress_with_limit(input: &[u8], limit: usize) -> LzoResult<Vec<u8>> {
    let mut dec = Decoder {
        input,
        pos: 0,
        out: Vec::with_capacity(limit.min(input.len().saturating_mul(4))),
        limit,
    };

    let result = dec.run();
    if let Err(ref e) = result {
        warn!(error = %e, input = input.len(), "lzo block rejected");
    }
    result?;

    if dec.pos != input.len() {
        return Err(LzoError::TrailingInput {
            remaining: input.len() - dec.pos,
        });
    }
    trace!(input = input.len(), output = dec.out.len(), "lzo block decompressed");
    Ok(dec.out)
}

/// What the decoder expects the next instruction byte to mean.
#[derive(Clone, Copy, Debug)]
enum State {
    /// A value below 16 starts a literal run.
    Instruction,
    /// A literal run of four or more bytes was just copied; a value below 16
    /// is a three-byte M1 match.
    AfterLiteralRun,
    /// The given control byte starts a match.
    Match(u8),
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
    out: Vec<u8>,
    limit: usize,
}

impl Decoder<'_> {
    fn run(&mut self) -> LzoResult<()> {
        let mut state = match self.input.first() {
            Some(&first) if first > 17 => {
                self.pos = 1;
                let run = (first - 17) as usize;
                self.copy_literals(run)?;
                if run < 4 {
                    State::Match(self.byte()?)
                } else {
                    State::AfterLiteralRun
                }
            }
            _ => State::Instruction,
        };

        loop {
            state = match state {
                State::Instruction => {
                    let t = self.byte()?;
                    if t >= 16 {
                        State::Match(t)
                    } else {
                        let run = if t == 0 {
                            self.extended_length(15)?
                        } else {
                            t as usize
                        };
                        self.copy_literals(run + 3)?;
                        State::AfterLiteralRun
                    }
                }
                State::AfterLiteralRun => {
                    let t = self.byte()?;
                    if t >= 16 {
                        State::Match(t)
                    } else {
                        let b = self.byte()? as usize;
                        let distance = 1 + M2_MAX_OFFSET + (t >> 2) as usize + (b << 2);
                        self.copy_match(distance, 3)?;
                        self.literal_tail(t)?
                    }
                }
                State::Match(t) => match self.match_instruction(t)? {
                    Some(next) => next,
                    None => return Ok(()),
                },
            };
        }
    }

    /// Decode one match. Returns `None` at the end marker.
    fn match_instruction(&mut self, t: u8) -> LzoResult<Option<State>> {
        let tail_byte;
        if t >= 64 {
            let b = self.byte()? as usize;
            let distance = 1 + ((t >> 2) & 7) as usize + (b << 3);
            self.copy_match(distance, (t >> 5) as usize + 1)?;
            tail_byte = t;
        } else if t >= 32 {
            let len = match (t & 31) as usize {
                0 => self.extended_length(31)?,
                n => n,
            };
            let (b0, distance) = self.distance()?;
            self.copy_match(distance + 1, len + 2)?;
            tail_byte = b0;
        } else if t >= 16 {
            let high = ((t & 8) as usize) << 11;
            let len = match (t & 7) as usize {
                0 => self.extended_length(7)?,
                n => n,
            };
            let (b0, low) = self.distance()?;
            let distance = high + low;
            if distance == 0 {
                return Ok(None);
            }
            self.copy_match(distance + 0x4000, len + 2)?;
            tail_byte = b0;
        } else {
            let b = self.byte()? as usize;
            let distance = 1 + (t >> 2) as usize + (b << 2);
            debug_assert!(distance <= M1_MAX_OFFSET);
            self.copy_match(distance, 2)?;
            tail_byte = t;
        }
        self.literal_tail(tail_byte).map(Some)
    }

    /// Copy the zero to three literals carried in the low bits of `control`.
    fn literal_tail(&mut self, control: u8) -> LzoResult<State> {
        let run = (control & 3) as usize;
        if run == 0 {
            return Ok(State::Instruction);
        }
        self.copy_literals(run)?;
        Ok(State::Match(self.byte()?))
    }

    /// Two little-endian distance bytes; returns the first byte and the
    /// 14-bit distance they encode.
    fn distance(&mut self) -> LzoResult<(u8, usize)> {
        let b0 = self.byte()?;
        let b1 = self.byte()? as usize;
        Ok((b0, (b0 >> 2) as usize + (b1 << 6)))
    }

    /// Zero bytes worth 255 each, then a non-zero remainder, plus `base`.
    fn extended_length(&mut self, base: usize) -> LzoResult<usize> {
        let mut len = base;
        loop {
            match self.byte()? {
                0 => len += 255,
                b => return Ok(len + b as usize),
            }
        }
    }

    fn byte(&mut self) -> LzoResult<u8> {
        let b = *self
            .input
            .get(self.pos)
            .ok_or(LzoError::InputOverrun { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn copy_literals(&mut self, len: usize) -> LzoResult<()> {
        let end = self.pos + len;
        if end > self.input.len() {
            return Err(LzoError::InputOverrun {
                offset: self.input.len(),
            });
        }
        self.reserve(len)?;
        self.out.extend_from_slice(&self.input[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    /// Copy byte by byte so that overlapping matches repeat their pattern.
    fn copy_match(&mut self, distance: usize, len: usize) -> LzoResult<()> {
        if distance > self.out.len() {
            return Err(LzoError::LookbehindOverrun {
                offset: self.pos,
                distance,
                produced: self.out.len(),
            });
        }
        self.reserve(len)?;
        let mut from = self.out.len() - distance;
        for _ in 0..len {
            let b = self.out[from];
            self.out.push(b);
            from += 1;
        }
        Ok(())
    }

    fn reserve(&self, len: usize) -> LzoResult<()> {
        if self.out.len().saturating_add(len) > self.limit {
            return Err(LzoError::OutputOverrun { limit: self.limit });
        }
        Ok(())
    }
}
