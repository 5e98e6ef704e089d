//! レコードデコードセッション

use crate::chunk::{ChunkPayload, RawChunk};
use crate::error::Error;
use crate::limits::DecoderLimits;

use super::record::split_records;
use super::utf8::Utf8StreamDecoder;

/// 1 レコードのデコード結果
///
/// パース失敗はそのレコードだけに閉じ、同じ呼び出し内の前後のレコードや
/// ストリーム自体には影響しない。
pub type RecordResult = Result<ParsedRecord, RecordParseFailure>;

/// パース済み NDJSON レコード
///
/// `ordinal` は到着順に割り当てられる通し番号 (JSON の中身とは無関係)。
/// レコードはワイヤ上に現れた順序そのままで出力される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    ordinal: u64,
    text: String,
}

impl ParsedRecord {
    /// 到着順の通し番号 (0 始まり)
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// レコードの生テキスト (デリミタを含まない 1 行)
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// レコードを JSON としてパースして型 T に変換
    pub fn json<T>(&self) -> Result<T, nojson::JsonParseError>
    where
        for<'text, 'raw> T:
            TryFrom<nojson::RawJsonValue<'text, 'raw>, Error = nojson::JsonParseError>,
    {
        let raw = nojson::RawJson::parse(&self.text)?;
        let value: T = raw.value().try_into()?;
        Ok(value)
    }
}

/// 1 レコードの JSON パース失敗
///
/// ストリームを閉じない回復可能なエラー。同じ呼び出しで得られた
/// 正常なレコードと並んで報告される。
#[derive(Debug)]
pub struct RecordParseFailure {
    ordinal: u64,
    line: String,
    error: nojson::JsonParseError,
}

impl RecordParseFailure {
    /// 到着順の通し番号 (0 始まり)
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    /// パースに失敗した行
    pub fn line(&self) -> &str {
        &self.line
    }

    /// パースエラーの詳細
    pub fn parse_error(&self) -> &nojson::JsonParseError {
        &self.error
    }
}

impl std::fmt::Display for RecordParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record #{} is not valid JSON: {}",
            self.ordinal, self.error
        )
    }
}

impl std::error::Error for RecordParseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionPhase {
    /// まだチャンクを受け取っていない
    Idle,
    /// チャンクを処理中 (トレーラーを持ち越している可能性がある)
    Streaming,
    /// 終了 (done=true の処理後、またはアボート後)
    Closed,
}

/// インクリメンタル NDJSON レコードデコーダー (Sans I/O)
///
/// チャンク境界で分断されたレコードを再組み立てし、到着順にパース済み
/// レコードを出力する。レコードを失うことも重複させることもない。
///
/// 1 リクエストのデコードセッションごとに 1 つ作成し、リクエストをまたいで
/// 共有しない。`done=true` のチャンクを処理するとセッションは閉じ、以降の
/// `decode()` は [`Error::SessionClosed`] で即座に失敗する。
///
/// ```rust
/// use shiguredo_ndjson::{RawChunk, RecordDecoder};
///
/// let mut decoder = RecordDecoder::new();
/// let batch = decoder
///     .decode(&RawChunk::text("{\"chunk\":\"#1\"}\n{\"chunk\":"))
///     .unwrap();
/// assert_eq!(batch.len(), 1);
///
/// let batch = decoder.decode(&RawChunk::text("\"#2\"}\n")).unwrap();
/// assert_eq!(batch.len(), 1);
///
/// // 空の最終フラッシュ
/// let batch = decoder.decode(&RawChunk::end()).unwrap();
/// assert!(batch.is_empty());
/// ```
#[derive(Debug)]
pub struct RecordDecoder {
    phase: SessionPhase,
    /// デリミタ未達の不完全なレコード断片 (次の decode 呼び出しへ持ち越し)
    trailer: String,
    utf8: Utf8StreamDecoder,
    next_ordinal: u64,
    limits: DecoderLimits,
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordDecoder {
    /// 新しいデコードセッションを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコードセッションを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            phase: SessionPhase::Idle,
            trailer: String::new(),
            utf8: Utf8StreamDecoder::new(),
            next_ordinal: 0,
            limits,
        }
    }

    /// チャンクをデコードし、完結したレコードの列を返す
    ///
    /// バイナリペイロードはストリーミング UTF-8 デコードされ、チャンク末尾の
    /// 不完全なマルチバイトシーケンスは次の呼び出しまで保留される。
    /// デリミタ未達の末尾セグメントはトレーラーとして持ち越される。
    ///
    /// 通常のトランスポートはストリーム内でペイロード種別を混在させないが、
    /// バイナリの後にテキストが来た場合も保留バイトは後続テキストより前に
    /// (不完全なら置換文字として) 確定され、到着順は崩れない。
    ///
    /// `done=true` のチャンク (最終フラッシュ) では保留分をすべて確定させ、
    /// デリミタで終わっていない末尾セグメントもそのまま出力する。その行は
    /// 有効な JSON であればレコード、そうでなければパース失敗として報告する。
    ///
    /// 空または空白のみのセグメントはレコードにもエラーにもならない。
    pub fn decode(&mut self, chunk: &RawChunk) -> Result<Vec<RecordResult>, Error> {
        if self.phase == SessionPhase::Closed {
            return Err(Error::SessionClosed);
        }
        self.phase = SessionPhase::Streaming;

        let mut text = match &chunk.payload {
            ChunkPayload::Binary(data) => self.utf8.feed(data),
            ChunkPayload::Text(t) => {
                // バイナリチャンクから持ち越した保留バイトを先に確定させる。
                // テキストに切り替わった時点で続きのバイトは来ないため、
                // 到着順を保ったまま置換文字として出力する
                let mut flushed = self.utf8.finish();
                flushed.push_str(t);
                flushed
            }
        };
        if chunk.done {
            // 保留中のマルチバイトシーケンスを確定させる
            text.push_str(&self.utf8.finish());
        }

        let combined = if self.trailer.is_empty() {
            text
        } else {
            let mut combined = std::mem::take(&mut self.trailer);
            combined.push_str(&text);
            combined
        };

        let (segments, trailer) = split_records(&combined, chunk.done);

        if trailer.len() > self.limits.max_record_size {
            self.close();
            return Err(Error::RecordTooLong {
                size: trailer.len(),
                limit: self.limits.max_record_size,
            });
        }
        self.trailer = trailer;

        let mut results = Vec::new();
        for segment in &segments {
            if segment.trim().is_empty() {
                // デリミタの残骸や空行はレコードにもエラーにもしない
                continue;
            }
            let ordinal = self.next_ordinal;
            self.next_ordinal += 1;
            match nojson::RawJson::parse(segment) {
                Ok(_) => results.push(Ok(ParsedRecord {
                    ordinal,
                    text: segment.clone(),
                })),
                Err(error) => results.push(Err(RecordParseFailure {
                    ordinal,
                    line: segment.clone(),
                    error,
                })),
            }
        }

        if chunk.done {
            self.close();
        }

        Ok(results)
    }

    /// セッションを直ちに閉じ、持ち越し中のデータを破棄する
    ///
    /// トランスポートエラーやキャンセルによる異常終了用。バッファ済みの
    /// トレーラーは推測でパースせずに捨てる。
    pub fn abort(&mut self) {
        self.close();
    }

    /// セッションが閉じているかどうか
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }

    /// 持ち越し中の不完全なレコード断片 (あれば)
    pub fn pending_partial(&self) -> Option<&str> {
        if self.trailer.is_empty() {
            None
        } else {
            Some(&self.trailer)
        }
    }

    fn close(&mut self) {
        self.phase = SessionPhase::Closed;
        self.trailer.clear();
        self.utf8.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(results: &[RecordResult]) -> Vec<String> {
        results
            .iter()
            .map(|r| r.as_ref().unwrap().as_str().to_string())
            .collect()
    }

    #[test]
    fn test_single_chunk() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::text("{\"a\":1}\n{\"b\":2}\n"))
            .unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(decoder.pending_partial(), None);
    }

    #[test]
    fn test_record_split_across_chunks() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::text("{\"chunk\":\"#1\",\"data\":\"a\"}\n{\"chunk\":\"#2\""))
            .unwrap();
        assert_eq!(texts(&batch), vec!["{\"chunk\":\"#1\",\"data\":\"a\"}"]);
        assert_eq!(decoder.pending_partial(), Some("{\"chunk\":\"#2\""));

        let batch = decoder
            .decode(&RawChunk::text(",\"data\":\"b\"}\n"))
            .unwrap();
        assert_eq!(texts(&batch), vec!["{\"chunk\":\"#2\",\"data\":\"b\"}"]);
        assert_eq!(decoder.pending_partial(), None);

        let batch = decoder.decode(&RawChunk::end()).unwrap();
        assert!(batch.is_empty());
        assert!(decoder.is_closed());
    }

    #[test]
    fn test_ordinals_follow_arrival_order() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::final_text("{\"a\":1}\nnot json\n{\"b\":2}\n"))
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].as_ref().unwrap().ordinal(), 0);
        assert_eq!(batch[1].as_ref().unwrap_err().ordinal(), 1);
        assert_eq!(batch[2].as_ref().unwrap().ordinal(), 2);
    }

    #[test]
    fn test_malformed_line_does_not_abort_siblings() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::text("{\"a\":1}\n{oops\n{\"b\":2}\n"))
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch[0].is_ok());
        assert!(batch[1].is_err());
        assert!(batch[2].is_ok());
        assert_eq!(batch[1].as_ref().unwrap_err().line(), "{oops");
        // 後続のチャンクも引き続き処理できる
        let batch = decoder.decode(&RawChunk::text("{\"c\":3}\n")).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::text("\n  \n{\"a\":1}\n\n"))
            .unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_done_with_unterminated_valid_tail() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder.decode(&RawChunk::final_text("{\"a\":1}")).unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}"]);
        assert!(decoder.is_closed());
    }

    #[test]
    fn test_done_with_unterminated_invalid_tail_reports_failure() {
        // 接続がレコードの途中で終端した場合、断片は黙って捨てずに
        // パース失敗として報告する
        let mut decoder = RecordDecoder::new();
        decoder.decode(&RawChunk::text("{\"chunk\":\"#3\"")).unwrap();
        let batch = decoder.decode(&RawChunk::end()).unwrap();
        assert_eq!(batch.len(), 1);
        let failure = batch[0].as_ref().unwrap_err();
        assert_eq!(failure.line(), "{\"chunk\":\"#3\"");
    }

    #[test]
    fn test_decode_after_close_fails_fast() {
        let mut decoder = RecordDecoder::new();
        decoder.decode(&RawChunk::end()).unwrap();
        assert!(matches!(
            decoder.decode(&RawChunk::text("{}\n")),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_abort_discards_trailer() {
        let mut decoder = RecordDecoder::new();
        decoder.decode(&RawChunk::text("{\"partial\":")).unwrap();
        assert!(decoder.pending_partial().is_some());
        decoder.abort();
        assert!(decoder.is_closed());
        assert_eq!(decoder.pending_partial(), None);
        assert!(matches!(
            decoder.decode(&RawChunk::end()),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_multibyte_record_split_mid_character() {
        let line = "{\"data\":\"日本語\"}\n";
        let bytes = line.as_bytes();
        // マルチバイト文字の途中 ("日" の 2 バイト目) で分割
        let split = line.find('日').unwrap() + 1;
        let mut decoder = RecordDecoder::new();
        let batch = decoder.decode(&RawChunk::binary(&bytes[..split])).unwrap();
        assert!(batch.is_empty());
        let batch = decoder.decode(&RawChunk::binary(&bytes[split..])).unwrap();
        assert_eq!(texts(&batch), vec!["{\"data\":\"日本語\"}"]);
    }

    #[test]
    fn test_payload_kind_switch_keeps_arrival_order() {
        // バイナリチャンクが "日" の先頭 2 バイトで途切れた後にテキスト
        // チャンクが来ると、保留バイトは置換文字として後続テキストの
        // 「前」に確定される。最終フラッシュまで遅延して末尾に紛れ込む
        // ことはない
        let mut decoder = RecordDecoder::new();
        let batch = decoder
            .decode(&RawChunk::binary(b"{\"a\":1}\n\xe6\x97".as_slice()))
            .unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}"]);

        let batch = decoder.decode(&RawChunk::final_text("x\n")).unwrap();
        assert_eq!(batch.len(), 1);
        let failure = batch[0].as_ref().unwrap_err();
        assert_eq!(failure.line(), "\u{FFFD}x");
    }

    #[test]
    fn test_crlf_terminal_no_trailer() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder.decode(&RawChunk::text("{\"a\":1}\r\n")).unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}"]);
        assert_eq!(decoder.pending_partial(), None);
    }

    #[test]
    fn test_cr_split_before_lf() {
        // "\r\n" デリミタ自体がチャンク境界で分断されるケース
        let mut decoder = RecordDecoder::new();
        let batch = decoder.decode(&RawChunk::text("{\"a\":1}\r")).unwrap();
        assert!(batch.is_empty());
        assert_eq!(decoder.pending_partial(), Some("{\"a\":1}\r"));
        let batch = decoder.decode(&RawChunk::text("\n{\"b\":2}\n")).unwrap();
        assert_eq!(texts(&batch), vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn test_record_too_long() {
        let mut decoder = RecordDecoder::with_limits(DecoderLimits {
            max_record_size: 8,
            ..DecoderLimits::default()
        });
        let err = decoder
            .decode(&RawChunk::text("{\"long\":\"unterminated"))
            .unwrap_err();
        assert!(matches!(err, Error::RecordTooLong { .. }));
        assert!(decoder.is_closed());
    }

    #[test]
    fn test_typed_extraction() {
        let mut decoder = RecordDecoder::new();
        let batch = decoder.decode(&RawChunk::text("123\n")).unwrap();
        let value: u32 = batch[0].as_ref().unwrap().json().unwrap();
        assert_eq!(value, 123);
    }
}
