//! レコードデコードセッションの統合テスト
//!
//! 実際の配信で起きるチャンク分断パターンを、デコーダーの公開 API だけを
//! 使って検証する。個々の分割・UTF-8 処理の単体テストは各モジュール内に
//! あり、ここではチャンク列全体を通したセッションの振る舞いを確認する。

use shiguredo_ndjson::{Error, RawChunk, RecordDecoder};

/// チャンク列を投入し、成功したレコードのテキストだけを集める
fn collect_texts(chunks: &[RawChunk]) -> Vec<String> {
    let mut decoder = RecordDecoder::new();
    let mut texts = Vec::new();
    for chunk in chunks {
        for result in decoder.decode(chunk).unwrap() {
            texts.push(result.unwrap().as_str().to_string());
        }
    }
    texts
}

#[test]
fn record_split_across_three_chunks() {
    let texts = collect_texts(&[
        RawChunk::text("{\"chunk\":0,\"ent"),
        RawChunk::text("ry\":0}\n{\"chunk\":1,"),
        RawChunk::final_text("\"entry\":0}\n"),
    ]);
    assert_eq!(
        texts,
        vec!["{\"chunk\":0,\"entry\":0}", "{\"chunk\":1,\"entry\":0}"]
    );
}

#[test]
fn multibyte_character_split_across_binary_chunks() {
    // "日" (E6 97 A5) の途中でチャンクが切れる
    let mut bytes = "{\"text\":\"日本\"}\n".as_bytes().to_vec();
    let tail = bytes.split_off(10);

    let texts = collect_texts(&[
        RawChunk::binary(bytes),
        RawChunk::final_binary(tail),
    ]);
    assert_eq!(texts, vec!["{\"text\":\"日本\"}"]);
}

#[test]
fn malformed_record_does_not_poison_session() {
    let mut decoder = RecordDecoder::new();
    let results = decoder
        .decode(&RawChunk::final_text("{\"ok\":1}\nnot json\n{\"ok\":2}\n"))
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());

    let failure = results[1].as_ref().unwrap_err();
    assert_eq!(failure.ordinal(), 1);
    assert_eq!(failure.line(), "not json");
}

#[test]
fn ordinals_are_continuous_across_chunks() {
    let mut decoder = RecordDecoder::new();
    let mut ordinals = Vec::new();
    for chunk in [
        RawChunk::text("{\"a\":1}\n\n{\"b\":2}\n"),
        RawChunk::final_text("{\"c\":3}\n"),
    ] {
        for result in decoder.decode(&chunk).unwrap() {
            ordinals.push(result.unwrap().ordinal());
        }
    }
    // 空行はスキップされ、序数は詰めて振られる
    assert_eq!(ordinals, vec![0, 1, 2]);
}

#[test]
fn final_chunk_flushes_unterminated_record() {
    let texts = collect_texts(&[
        RawChunk::text("{\"a\":1}\n{\"b\":"),
        RawChunk::final_text("2}"),
    ]);
    assert_eq!(texts, vec!["{\"a\":1}", "{\"b\":2}"]);
}

#[test]
fn empty_final_flush_completes_pending_record() {
    let texts = collect_texts(&[RawChunk::text("{\"a\":1}"), RawChunk::end()]);
    assert_eq!(texts, vec!["{\"a\":1}"]);
}

#[test]
fn decode_after_close_is_rejected() {
    let mut decoder = RecordDecoder::new();
    decoder.decode(&RawChunk::final_text("{}\n")).unwrap();
    assert!(decoder.is_closed());
    assert!(matches!(
        decoder.decode(&RawChunk::text("{}\n")),
        Err(Error::SessionClosed)
    ));
}

#[test]
fn abort_discards_pending_state() {
    let mut decoder = RecordDecoder::new();
    decoder.decode(&RawChunk::text("{\"partial\":")).unwrap();
    decoder.abort();
    assert!(decoder.is_closed());
    assert!(matches!(
        decoder.decode(&RawChunk::end()),
        Err(Error::SessionClosed)
    ));
}

#[test]
fn crlf_delimited_stream_yields_no_spurious_records() {
    let texts = collect_texts(&[
        RawChunk::text("{\"a\":1}\r\n{\"b\":2}\r"),
        RawChunk::final_text("\n{\"c\":3}\r\n"),
    ]);
    assert_eq!(texts, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
}

#[test]
fn byte_at_a_time_delivery() {
    let document = "{\"id\":0}\n{\"text\":\"テスト\"}\n{\"id\":2}\n";
    let bytes = document.as_bytes();

    let mut decoder = RecordDecoder::new();
    let mut texts = Vec::new();
    for (i, byte) in bytes.iter().enumerate() {
        let chunk = if i + 1 == bytes.len() {
            RawChunk::final_binary(vec![*byte])
        } else {
            RawChunk::binary(vec![*byte])
        };
        for result in decoder.decode(&chunk).unwrap() {
            texts.push(result.unwrap().as_str().to_string());
        }
    }
    assert_eq!(
        texts,
        vec!["{\"id\":0}", "{\"text\":\"テスト\"}", "{\"id\":2}"]
    );
}
