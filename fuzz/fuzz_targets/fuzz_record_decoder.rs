#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_ndjson::{RawChunk, RecordDecoder};

#[derive(Debug, Arbitrary)]
struct Input {
    data: Vec<u8>,
    split_every: u8,
    as_text: bool,
}

fuzz_target!(|input: Input| {
    // まるごと 1 チャンクでデコード
    let mut decoder = RecordDecoder::new();
    let _ = decoder.decode(&RawChunk::final_binary(input.data.clone()));

    // 分割して配信 (ストリーミングシナリオ)
    let mut decoder = RecordDecoder::new();
    let mut whole = Vec::new();
    let split = (input.split_every as usize).max(1);
    for part in input.data.chunks(split) {
        let chunk = if input.as_text {
            match std::str::from_utf8(part) {
                Ok(s) => RawChunk::text(s),
                Err(_) => RawChunk::binary(part),
            }
        } else {
            RawChunk::binary(part)
        };
        match decoder.decode(&chunk) {
            Ok(batch) => {
                for result in batch {
                    if let Ok(record) = result {
                        whole.push(record.ordinal());
                    }
                }
            }
            Err(_) => return,
        }
    }
    let _ = decoder.decode(&RawChunk::end());

    // 序数は単調増加
    for pair in whole.windows(2) {
        assert!(pair[0] < pair[1]);
    }
});
