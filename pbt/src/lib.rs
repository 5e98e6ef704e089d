//! PBT テスト共通ユーティリティ

use proptest::prelude::*;

// ========================================
// NDJSON レコード生成
// ========================================

/// 1 行に収まる有効な JSON 値
pub fn record_text() -> impl Strategy<Value = String> {
    prop_oneof![
        // 数値 (先頭ゼロは JSON として無効なため除外)
        "0|[1-9][0-9]{0,5}",
        // 文字列
        "[a-zA-Z0-9 ]{0,12}".prop_map(|s| format!("\"{}\"", s)),
        // 数値フィールドを持つオブジェクト
        ("[a-z]{1,8}", any::<u32>()).prop_map(|(k, v)| format!("{{\"{}\":{}}}", k, v)),
        // 文字列フィールドを持つオブジェクト
        ("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,12}")
            .prop_map(|(k, v)| format!("{{\"{}\":\"{}\"}}", k, v)),
        // マルチバイト文字列フィールドを持つオブジェクト
        ("[a-z]{1,8}", "[ぁ-ん一-十]{0,6}")
            .prop_map(|(k, v)| format!("{{\"{}\":\"{}\"}}", k, v)),
    ]
}

/// レコードデリミタ
pub fn delimiter() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("\n"), Just("\r\n")]
}

/// レコード列と、各レコードをデリミタで終端した NDJSON ドキュメント
pub fn ndjson_document() -> impl Strategy<Value = (Vec<String>, String)> {
    (
        proptest::collection::vec(record_text(), 0..8),
        delimiter(),
    )
        .prop_map(|(records, delimiter)| {
            let mut document = String::new();
            for record in &records {
                document.push_str(record);
                document.push_str(delimiter);
            }
            (records, document)
        })
}

/// バイト列を指定された位置で分割する
///
/// 切断位置はソートと重複排除をしてから適用する。UTF-8 の文字境界とは
/// 無関係の任意のバイト位置で切れる。
pub fn partition(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c.min(data.len())).collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut parts = Vec::new();
    let mut start = 0;
    for cut in cuts {
        if cut > start {
            parts.push(data[start..cut].to_vec());
            start = cut;
        }
    }
    if start < data.len() {
        parts.push(data[start..].to_vec());
    }
    parts
}

/// ドキュメントのバイト長に応じた切断位置の列
pub fn cut_points(max_len: usize) -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..=max_len.max(1), 0..8)
}
