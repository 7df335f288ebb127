use tracing::trace;

use crate::{
    END_MARKER, M2_MAX_LEN, M2_MAX_OFFSET, M3_MARKER, M3_MAX_LEN, M3_MAX_OFFSET, M4_MARKER,
    M4_MAX_LEN, M4_MAX_OFFSET, MIN_MATCH_INPUT,
};

const DICT_BITS: u32 = 14;
const DICT_SIZE: usize = 1 << DICT_BITS;
const DICT_MASK: usize = DICT_SIZE - 1;

/// Marks a dictionary slot that has never been filled.
const EMPTY: usize = usize::MAX;

/// Longest literal run that can open a stream with a single length byte.
const MAX_OPENING_RUN: usize = 238;

/// Upper bound on the compressed size of `input_len` bytes.
pub fn worst_case_compressed_len(input_len: usize) -> usize {
    input_len + input_len / 16 + 64 + END_MARKER.len()
}

/// Compress a whole buffer into one block.
///
/// The output always ends with [`END_MARKER`]. Inputs of
/// [`MIN_MATCH_INPUT`] bytes or fewer are emitted as one literal run.
pub fn compress(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(worst_case_compressed_len(input.len()));

    let tail = if input.len() <= MIN_MATCH_INPUT {
        0
    } else {
        compress_matches(input, &mut out)
    };

    let run = &input[tail..];
    if !run.is_empty() {
        if out.is_empty() && run.len() <= MAX_OPENING_RUN {
            out.push(17 + run.len() as u8);
        } else {
            push_run_length(&mut out, run.len());
        }
        out.extend_from_slice(run);
    }
    out.extend_from_slice(&END_MARKER);

    trace!(input = input.len(), output = out.len(), "lzo block compressed");
    out
}

/// Scan for matches and emit everything up to the final literal run.
///
/// Returns the offset where the unemitted tail begins.
fn compress_matches(input: &[u8], out: &mut Vec<u8>) -> usize {
    let mut dict = vec![EMPTY; DICT_SIZE];
    let scan_end = input.len() - MIN_MATCH_INPUT;
    let mut lit_start = 0;
    // The first four bytes are always literals, so a match never follows a
    // run shorter than four bytes at the start of the stream.
    let mut ip = 4;

    while ip < scan_end {
        let candidate = std::mem::replace(&mut dict[dict_index(&input[ip..])], ip);
        let found = candidate < ip
            && ip - candidate <= M4_MAX_OFFSET
            && input[candidate..candidate + 3] == input[ip..ip + 3];
        if !found {
            ip += 1;
            continue;
        }

        push_literals(out, &input[lit_start..ip]);

        let mut len = 3;
        while ip + len < input.len() && input[candidate + len] == input[ip + len] {
            len += 1;
        }
        push_match(out, ip - candidate, len);

        // Index the positions the match covered so later data can refer
        // back into it.
        let end = (ip + len).min(scan_end);
        for p in ip + 1..end {
            dict[dict_index(&input[p..])] = p;
        }

        ip += len;
        lit_start = ip;
    }

    lit_start
}

fn dict_index(p: &[u8]) -> usize {
    let key = ((p[2] as u32) << 10) ^ ((p[1] as u32) << 5) ^ p[0] as u32;
    (key.wrapping_mul(0x21) >> 5) as usize & DICT_MASK
}

fn push_literals(out: &mut Vec<u8>, run: &[u8]) {
    if run.is_empty() {
        return;
    }
    push_run_length(out, run.len());
    out.extend_from_slice(run);
}

fn push_run_length(out: &mut Vec<u8>, len: usize) {
    if len <= 3 {
        // Folded into the low bits of the previous match's distance byte.
        debug_assert!(out.len() >= 2, "short literal run without a preceding match");
        let at = out.len() - 2;
        out[at] |= len as u8;
    } else if len <= 18 {
        out.push((len - 3) as u8);
    } else {
        out.push(0);
        push_continuation(out, len - 18);
    }
}

/// Zero bytes worth 255 each, then a non-zero remainder.
fn push_continuation(out: &mut Vec<u8>, mut rest: usize) {
    while rest > 255 {
        rest -= 255;
        out.push(0);
    }
    out.push(rest as u8);
}

fn push_match(out: &mut Vec<u8>, distance: usize, len: usize) {
    debug_assert!(len >= 3);
    debug_assert!((1..=M4_MAX_OFFSET).contains(&distance));

    if len <= M2_MAX_LEN && distance <= M2_MAX_OFFSET {
        let d = distance - 1;
        out.push((((len - 1) << 5) | ((d & 7) << 2)) as u8);
        out.push((d >> 3) as u8);
    } else if distance <= M3_MAX_OFFSET {
        let d = distance - 1;
        if len <= M3_MAX_LEN {
            out.push(M3_MARKER | (len - 2) as u8);
        } else {
            out.push(M3_MARKER);
            push_continuation(out, len - M3_MAX_LEN);
        }
        push_distance(out, d);
    } else {
        let d = distance - 0x4000;
        let high = ((d & 0x4000) >> 11) as u8;
        if len <= M4_MAX_LEN {
            out.push(M4_MARKER | high | (len - 2) as u8);
        } else {
            out.push(M4_MARKER | high);
            push_continuation(out, len - M4_MAX_LEN);
        }
        push_distance(out, d & 0x3fff);
    }
}

fn push_distance(out: &mut Vec<u8>, d: usize) {
    out.push(((d & 63) << 2) as u8);
    out.push((d >> 6) as u8);
}
