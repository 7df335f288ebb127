use std::io::{Seek, SeekFrom};

use proptest::prelude::*;
use stash_filter::filters::base64;
use stash_filter::{
    Base64DecodeSink, Base64EncodeSink, BufferSink, BufferSource, CacheFilter,
    ChecksumAccumulator, ChecksumFilter, FilterConfig, LzoCompressSink, LzoCompressSource,
    LzoDecompressSink, LzoDecompressSource, PullChain, PushChain, StorageSink, StorageSource,
};

/// Split `data` at the given cut points.
fn pieces(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    cuts.sort_unstable();
    let mut out = Vec::new();
    let mut last = 0;
    for cut in cuts {
        out.push(data[last..cut].to_vec());
        last = cut;
    }
    out.push(data[last..].to_vec());
    out
}

#[test]
fn compress_to_file_and_read_back() {
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 31 % 251) as u8).collect();
    let file = tempfile::tempfile().unwrap();

    let mut push = PushChain::new();
    let ids = [
        push.add(LzoCompressSink::with_block_size(4096).unwrap()),
        push.add(StorageSink::new(file)),
    ];
    let head = push.link_all(&ids).unwrap().unwrap();
    for piece in data.chunks(1000) {
        push.put(head, piece).unwrap();
    }
    push.end(head).unwrap();

    let mut file = push
        .filter::<StorageSink<std::fs::File>>(ids[1])
        .unwrap()
        .get_ref()
        .try_clone()
        .unwrap();
    assert_eq!(push.dispose(head).unwrap(), 2);
    Seek::seek(&mut file, SeekFrom::Start(0)).unwrap();

    let mut pull = PullChain::new();
    let ids = [
        pull.add(ChecksumFilter::new()),
        pull.add(LzoDecompressSource::new()),
        pull.add(CacheFilter::new()),
        pull.add(StorageSource::new(file)),
    ];
    let head = pull.link_all(&ids).unwrap().unwrap();
    let mut out = Vec::new();
    pull.read_to_end(head, &mut out).unwrap();
    assert_eq!(out, data);

    let mut expected = ChecksumAccumulator::new();
    expected.update(&data);
    assert_eq!(
        pull.filter::<ChecksumFilter>(head).unwrap().digest(),
        expected.digest()
    );
}

#[test]
fn pull_and_push_framing_agree() {
    let data = b"framing is framing whichever way the bytes flow ".repeat(40);
    let config = FilterConfig {
        lzo_block_size: 100,
        ..FilterConfig::default()
    };

    let mut pull = PullChain::new();
    let ids = [
        pull.add(LzoCompressSource::from_config(&config).unwrap()),
        pull.add(BufferSource::new(data.clone())),
    ];
    let head = pull.link_all(&ids).unwrap().unwrap();
    let mut pulled = Vec::new();
    pull.read_to_end(head, &mut pulled).unwrap();

    let mut push = PushChain::new();
    let ids = [
        push.add(LzoCompressSink::from_config(&config).unwrap()),
        push.add(BufferSink::with_capacity(pulled.len() * 2)),
    ];
    let head = push.link_all(&ids).unwrap().unwrap();
    push.put(head, &data).unwrap();
    push.end(head).unwrap();

    assert_eq!(push.filter::<BufferSink>(ids[1]).unwrap().as_bytes(), &pulled[..]);
}

proptest! {
    #[test]
    fn lzo_push_round_trip_with_flushes(
        data in proptest::collection::vec(0u8..4, 0..2048),
        cuts in proptest::collection::vec(0usize..2048, 0..10),
        flushes in proptest::collection::vec(any::<bool>(), 11),
        block in 1usize..300,
    ) {
        let mut chain = PushChain::new();
        let ids = [
            chain.add(LzoCompressSink::with_block_size(block).unwrap()),
            chain.add(LzoDecompressSink::new()),
            chain.add(BufferSink::with_capacity(data.len())),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        for (piece, flush) in pieces(&data, &cuts).iter().zip(&flushes) {
            chain.put(head, piece).unwrap();
            if *flush {
                chain.flush(head).unwrap();
            }
        }
        chain.end(head).unwrap();
        prop_assert_eq!(chain.filter::<BufferSink>(ids[2]).unwrap().as_bytes(), &data[..]);
    }

    #[test]
    fn base64_push_round_trip(
        data in proptest::collection::vec(any::<u8>(), 0..1024),
        cuts in proptest::collection::vec(0usize..1024, 0..10),
    ) {
        let mut chain = PushChain::new();
        let ids = [
            chain.add(Base64EncodeSink::new()),
            chain.add(Base64DecodeSink::new()),
            chain.add(BufferSink::with_capacity(data.len())),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        for piece in pieces(&data, &cuts) {
            chain.put(head, &piece).unwrap();
        }
        chain.end(head).unwrap();
        prop_assert_eq!(chain.filter::<BufferSink>(ids[2]).unwrap().as_bytes(), &data[..]);
    }

    #[test]
    fn base64_decode_is_split_independent(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        cuts in proptest::collection::vec(0usize..1024, 0..10),
    ) {
        let text = base64::encode(&data);
        let mut chain = PushChain::new();
        let ids = [
            chain.add(Base64DecodeSink::new()),
            chain.add(BufferSink::with_capacity(data.len())),
        ];
        let head = chain.link_all(&ids).unwrap().unwrap();
        for piece in pieces(text.as_bytes(), &cuts) {
            chain.put(head, &piece).unwrap();
        }
        chain.end(head).unwrap();
        prop_assert_eq!(chain.filter::<BufferSink>(ids[1]).unwrap().as_bytes(), &data[..]);
    }
}
