//! レコード分割
//!
//! トレーラーを連結済みのテキストをレコードデリミタで分割する。
//! デリミタは `"\r\n"` と `"\n"` で、最長一致が優先される
//! (末尾の `"\r\n"` が余分な空エントリと `"\n"` に誤分割されることはない)。

/// テキストをレコードデリミタで分割する
///
/// 戻り値は `(セグメント列, 新しいトレーラー)`。
///
/// - セグメントは `"\r\n"` / `"\n"` を取り除いた形で返す。空セグメントや
///   空白のみのセグメントの除去は呼び出し側で行う。
/// - `done=false` でテキストがデリミタで終わっていない場合、最後の
///   セグメントは不完全とみなし、生のまま (末尾の `'\r'` 候補も含めて)
///   トレーラーとして返す。
/// - `done=true` の場合は最後のセグメントもそのまま出力し、トレーラーは
///   常に空になる。
pub(crate) fn split_records(text: &str, done: bool) -> (Vec<String>, String) {
    // '\n' で分割し、各セグメント末尾の '\r' を 1 つ取り除くことが
    // "\r\n" | "\n" の最長一致分割と等価になる
    let mut raw: Vec<&str> = text.split('\n').collect();

    let trailer = if !done && !text.ends_with('\n') {
        // split() は必ず 1 要素以上返す
        raw.pop().unwrap_or("").to_string()
    } else {
        String::new()
    };

    let segments = raw
        .into_iter()
        .map(|s| s.strip_suffix('\r').unwrap_or(s).to_string())
        .collect();

    (segments, trailer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lf_delimiter() {
        let (segments, trailer) = split_records("a\nb\n", false);
        assert_eq!(segments, vec!["a", "b", ""]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_crlf_delimiter_no_spurious_entry() {
        // 末尾の "\r\n" が空エントリ + "\n" に誤分割されないこと
        let (segments, trailer) = split_records("a\r\nb\r\n", false);
        assert_eq!(segments, vec!["a", "b", ""]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_incomplete_tail_becomes_trailer() {
        let (segments, trailer) = split_records("a\npartial", false);
        assert_eq!(segments, vec!["a"]);
        assert_eq!(trailer, "partial");
    }

    #[test]
    fn test_trailing_cr_kept_in_trailer() {
        // '\r' は次のチャンクの '\n' と合わさってデリミタになり得るため
        // 生のままトレーラーに残す
        let (segments, trailer) = split_records("a\nb\r", false);
        assert_eq!(segments, vec!["a"]);
        assert_eq!(trailer, "b\r");

        // 続きが '\n' だけだった場合、連結して分割すれば "b" が得られる
        let combined = format!("{}{}", trailer, "\n");
        let (segments, trailer) = split_records(&combined, false);
        assert_eq!(segments, vec!["b"]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_done_emits_unterminated_tail() {
        let (segments, trailer) = split_records("a\ntail", true);
        assert_eq!(segments, vec!["a", "tail"]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_lone_cr_not_a_delimiter() {
        let (segments, trailer) = split_records("a\rb\n", false);
        assert_eq!(segments, vec!["a\rb", ""]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_empty_input() {
        let (segments, trailer) = split_records("", false);
        assert_eq!(segments, Vec::<String>::new());
        assert_eq!(trailer, "");

        let (segments, trailer) = split_records("", true);
        assert_eq!(segments, vec![""]);
        assert_eq!(trailer, "");
    }

    #[test]
    fn test_mixed_delimiters() {
        let (segments, trailer) = split_records("a\r\nb\nc\r\n", false);
        assert_eq!(segments, vec!["a", "b", "c", ""]);
        assert_eq!(trailer, "");
    }
}
