#![no_main]

use libfuzzer_sys::fuzz_target;
use shiguredo_ndjson::uri::{Uri, percent_encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(uri) = Uri::parse(s) {
            let _ = uri.scheme();
            let _ = uri.host();
            let _ = uri.port();
            let _ = uri.query();
            let origin_form = uri.origin_form();
            assert!(origin_form.starts_with('/'));
        }

        // エンコード結果は unreserved と '%' のみで構成される
        let encoded = percent_encode(s);
        assert!(encoded.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || b == b'-'
                || b == b'.'
                || b == b'_'
                || b == b'~'
                || b == b'%'
                || b.is_ascii_hexdigit()
        }));
    }
});
