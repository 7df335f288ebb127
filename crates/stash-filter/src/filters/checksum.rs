use crate::error::FilterResult;
use crate::pull::{PullFilter, Upstream};
use crate::push::{Downstream, PushFilter};

/// Rolling 64-bit checksum over 8-byte little-endian groups.
///
/// Each complete group is folded as `value.rotate_left(1) + group`
/// (wrapping). The result does not depend on how the input is split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChecksumAccumulator {
    value: u64,
    staged: [u8; 8],
    staged_len: usize,
}

impl ChecksumAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, mut data: &[u8]) {
        if self.staged_len > 0 {
            let take = (8 - self.staged_len).min(data.len());
            self.staged[self.staged_len..self.staged_len + take].copy_from_slice(&data[..take]);
            self.staged_len += take;
            data = &data[take..];
            if self.staged_len < 8 {
                return;
            }
            self.value = fold(self.value, self.staged);
            self.staged_len = 0;
        }

        let mut groups = data.chunks_exact(8);
        for group in &mut groups {
            let mut word = [0u8; 8];
            word.copy_from_slice(group);
            self.value = fold(self.value, word);
        }
        let rest = groups.remainder();
        self.staged[..rest.len()].copy_from_slice(rest);
        self.staged_len = rest.len();
    }

    /// Current checksum, with any staged tail folded in zero-padded.
    pub fn digest(&self) -> u64 {
        if self.staged_len == 0 {
            return self.value;
        }
        let mut word = [0u8; 8];
        word[..self.staged_len].copy_from_slice(&self.staged[..self.staged_len]);
        fold(self.value, word)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn fold(value: u64, group: [u8; 8]) -> u64 {
    value.rotate_left(1).wrapping_add(u64::from_le_bytes(group))
}

/// Checksums the bytes flowing through it without altering them.
///
/// As a pull filter it folds exactly the bytes returned to the caller; as a
/// push filter it folds every byte put into it.
#[derive(Clone, Debug, Default)]
pub struct ChecksumFilter {
    acc: ChecksumAccumulator,
}

impl ChecksumFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn digest(&self) -> u64 {
        self.acc.digest()
    }

    pub fn accumulator(&self) -> &ChecksumAccumulator {
        &self.acc
    }
}

impl PullFilter for ChecksumFilter {
    fn get(&mut self, upstream: &mut Upstream<'_>, buf: &mut [u8]) -> FilterResult<usize> {
        let n = upstream.get(buf)?;
        self.acc.update(&buf[..n]);
        Ok(n)
    }
}

impl PushFilter for ChecksumFilter {
    fn put(&mut self, downstream: &mut Downstream<'_>, data: &[u8]) -> FilterResult<usize> {
        self.acc.update(data);
        downstream.put(data)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{BufferSource, PullChain, PushChain};

    const ONE_TO_EIGHT: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

    #[test]
    fn single_group() {
        let mut acc = ChecksumAccumulator::new();
        acc.update(&ONE_TO_EIGHT);
        assert_eq!(acc.digest(), u64::from_le_bytes(ONE_TO_EIGHT));
    }

    #[test]
    fn split_in_halves_matches_single_call() {
        let mut halves = ChecksumAccumulator::new();
        halves.update(&ONE_TO_EIGHT[..4]);
        halves.update(&ONE_TO_EIGHT[4..]);

        let mut whole = ChecksumAccumulator::new();
        whole.update(&ONE_TO_EIGHT);
        assert_eq!(halves.digest(), whole.digest());
    }

    #[test]
    fn partial_group_is_zero_padded() {
        let mut acc = ChecksumAccumulator::new();
        acc.update(&[0xff, 0x01]);
        assert_eq!(acc.digest(), 0x01ff);
        // Reading the digest does not consume the staged bytes.
        acc.update(&[0, 0, 0, 0, 0, 0]);
        assert_eq!(acc.digest(), 0x01ff);
        acc.update(&[1]);
        assert_eq!(acc.digest(), (0x01ffu64).rotate_left(1) + 1);
    }

    #[test]
    fn rotation_wraps() {
        let mut acc = ChecksumAccumulator::new();
        acc.update(&u64::MAX.to_le_bytes());
        acc.update(&1u64.to_le_bytes());
        assert_eq!(acc.digest(), 0);
        acc.reset();
        assert_eq!(acc.digest(), 0);
    }

    #[test]
    fn pull_filter_taps_stream() {
        let mut chain = PullChain::new();
        let ids = [
            chain.add(ChecksumFilter::new()),
            chain.add(BufferSource::new(&ONE_TO_EIGHT[..])),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        let mut buf = [0u8; 4];
        chain.get(head, &mut buf).unwrap();
        chain.get(head, &mut buf).unwrap();
        assert_eq!(
            chain.filter::<ChecksumFilter>(head).unwrap().digest(),
            u64::from_le_bytes(ONE_TO_EIGHT)
        );
    }

    #[test]
    fn push_filter_taps_stream() {
        let mut chain = PushChain::new();
        let node = chain.add(ChecksumFilter::new());
        chain.put(node, &ONE_TO_EIGHT[..3]).unwrap();
        chain.put(node, &ONE_TO_EIGHT[3..]).unwrap();
        assert_eq!(
            chain.filter::<ChecksumFilter>(node).unwrap().digest(),
            u64::from_le_bytes(ONE_TO_EIGHT)
        );
    }

    proptest! {
        #[test]
        fn digest_independent_of_splits(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            cuts in proptest::collection::vec(0usize..256, 0..8),
        ) {
            let mut whole = ChecksumAccumulator::new();
            whole.update(&data);

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(data.len())).collect();
            cuts.sort_unstable();
            let mut pieces = ChecksumAccumulator::new();
            let mut last = 0;
            for cut in cuts {
                pieces.update(&data[last..cut]);
                last = cut;
            }
            pieces.update(&data[last..]);

            prop_assert_eq!(whole.digest(), pieces.digest());
        }
    }
}
