//! レスポンスフレーミングのプロパティテスト
//!
//! chunked / Content-Length でエンコードしたボディを任意のバイト位置で
//! 分割して feed しても、フレーミングを取り除いた正味のボディが過不足なく
//! 復元されることを確認する。

use pbt::{cut_points, partition};
use proptest::prelude::*;
use shiguredo_ndjson::ResponseDecoder;

fn body_chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    proptest::collection::vec(
        proptest::collection::vec(any::<u8>(), 1..64),
        0..6,
    )
}

/// chunked エンコーディングのレスポンスを構築
fn encode_chunked_response(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut wire =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for chunk in chunks {
        wire.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        wire.extend_from_slice(chunk);
        wire.extend_from_slice(b"\r\n");
    }
    wire.extend_from_slice(b"0\r\n\r\n");
    wire
}

/// 分割 feed しながらボディを収集する
fn decode_body(wire: &[u8], cuts: &[usize]) -> Vec<u8> {
    let parts = partition(wire, cuts);
    let mut decoder = ResponseDecoder::new();
    let mut body = Vec::new();
    let mut head_done = false;

    for part in &parts {
        decoder.feed(part).unwrap();
        if !head_done {
            if decoder.decode_head().unwrap().is_none() {
                continue;
            }
            head_done = true;
        }
        while let Some(data) = decoder.next_body().unwrap() {
            body.extend_from_slice(&data);
        }
    }
    assert!(decoder.is_complete());
    body
}

proptest! {
    /// chunked ボディは feed の分割位置に関係なく復元される
    #[test]
    fn prop_chunked_body_roundtrip(chunks in body_chunks(), cuts in cut_points(512)) {
        let wire = encode_chunked_response(&chunks);
        let expected: Vec<u8> = chunks.concat();
        prop_assert_eq!(decode_body(&wire, &cuts), expected);
    }

    /// Content-Length ボディも同様
    #[test]
    fn prop_content_length_body_roundtrip(
        body in proptest::collection::vec(any::<u8>(), 0..256),
        cuts in cut_points(512),
    ) {
        let mut wire = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        wire.extend_from_slice(&body);
        prop_assert_eq!(decode_body(&wire, &cuts), body);
    }
}
