use proptest::prelude::*;
use stash_lzo::{compress, decompress, decompress_with_limit, worst_case_compressed_len, LzoError};

fn roundtrip(input: &[u8]) {
    let packed = compress(input);
    assert!(packed.len() <= worst_case_compressed_len(input.len()));
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn tiny_inputs() {
    roundtrip(&[]);
    roundtrip(&[0]);
    roundtrip(&[1, 2]);
    roundtrip(b"abc");
    roundtrip(b"abcdefghijklm");
    roundtrip(b"abcdefghijklmn");
}

#[test]
fn twenty_identical_bytes() {
    let input = b"AAAAAAAAAAAAAAAAAAAA";
    let packed = compress(input);
    assert_eq!(decompress(&packed).unwrap(), input.to_vec());
}

#[test]
fn long_runs_use_continuations() {
    roundtrip(&vec![0u8; 70_000]);
    let mut input = vec![0xAAu8; 5000];
    input.extend((0..5000u32).map(|i| (i % 251) as u8));
    input.extend(vec![0x55u8; 600]);
    roundtrip(&input);
}

#[test]
fn far_matches_use_m4() {
    // A 20 KiB block of noise repeated: the second copy matches from more
    // than 0x4000 bytes back.
    let mut state = 0x1234_5678u32;
    let noise: Vec<u8> = (0..20_000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    let mut input = noise.clone();
    input.extend_from_slice(&noise);

    let packed = compress(&input);
    assert!(packed.len() < input.len());
    assert_eq!(decompress(&packed).unwrap(), input);
}

#[test]
fn medium_distance_matches() {
    let mut input = Vec::new();
    for i in 0..3000u32 {
        input.extend_from_slice(format!("record-{:05};", i % 700).as_bytes());
    }
    roundtrip(&input);
}

#[test]
fn text_compresses() {
    let text = "the quick brown fox jumps over the lazy dog. ".repeat(200);
    let packed = compress(text.as_bytes());
    assert!(packed.len() < text.len() / 4);
    assert_eq!(decompress(&packed).unwrap(), text.as_bytes());
}

#[test]
fn every_truncation_fails_explicitly() {
    let input = "chunked save data, chunked save data, chunked save data".as_bytes();
    let packed = compress(input);
    for cut in 0..packed.len() {
        let err = decompress(&packed[..cut]).unwrap_err();
        assert!(
            matches!(err, LzoError::InputOverrun { .. }),
            "cut at {cut} gave {err:?}"
        );
    }
}

#[test]
fn exact_limit_accepted() {
    let input = vec![3u8; 4096];
    let packed = compress(&input);
    assert_eq!(decompress_with_limit(&packed, 4096).unwrap(), input);
}

proptest! {
    #[test]
    fn arbitrary_bytes_roundtrip(input in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let packed = compress(&input);
        prop_assert!(packed.len() <= worst_case_compressed_len(input.len()));
        prop_assert_eq!(decompress(&packed).unwrap(), input);
    }

    #[test]
    fn low_entropy_roundtrip(input in proptest::collection::vec(0u8..4, 0..8192)) {
        let packed = compress(&input);
        prop_assert_eq!(decompress(&packed).unwrap(), input);
    }
}
