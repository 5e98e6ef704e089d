#![no_main]

use libfuzzer_sys::fuzz_target;
use shiguredo_ndjson::ResponseDecoder;

fuzz_target!(|data: &[u8]| {
    // まるごと feed してデコード
    let mut decoder = ResponseDecoder::new();
    if decoder.feed(data).is_ok() {
        if let Ok(Some(_)) = decoder.decode_head() {
            while let Ok(Some(_)) = decoder.next_body() {}
            decoder.mark_eof();
            let _ = decoder.next_body();
        }
    }

    // データを分割して feed (ストリーミングシナリオ)
    let mut decoder = ResponseDecoder::new();
    let mut head_done = false;
    for chunk in data.chunks(23) {
        if decoder.feed(chunk).is_err() {
            return;
        }
        if !head_done {
            match decoder.decode_head() {
                Ok(Some(_)) => head_done = true,
                Ok(None) => continue,
                Err(_) => return,
            }
        }
        loop {
            match decoder.next_body() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => return,
            }
        }
        if decoder.is_complete() {
            break;
        }
    }
});
