//! HTTP レスポンスフレーミング (Sans I/O)
//!
//! ネイティブストリーミングトランスポートがレスポンスボディを到着順に
//! 取り出すためのストリーミング専用デコーダー。ヘッダーをデコードした後、
//! ボディ全体を待たずに利用可能になったバイト列を逐次取り出せる。

use crate::error::Error;
use crate::limits::DecoderLimits;

/// レスポンスヘッダー (ボディなし)
///
/// 完了通知の診断用ハンドルとしても使われる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP バージョン (HTTP/1.1 等)
    pub version: String,
    /// ステータスコード (200, 404, etc.)
    pub status_code: u16,
    /// ステータスフレーズ (OK, Not Found, etc.)
    pub reason_phrase: String,
    /// ヘッダー
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// ヘッダーを取得 (大文字小文字を区別しない)
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// ステータスコードが成功 (2xx) か確認
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// ボディの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Content-Length で指定された固定長
    ContentLength(usize),
    /// Transfer-Encoding: chunked
    Chunked,
    /// 接続が閉じるまでがボディ (close-delimited)
    CloseDelimited,
    /// ボディなし
    None,
}

/// デコード状態
#[derive(Debug, Clone, PartialEq, Eq)]
enum FramePhase {
    /// ステータスライン待ち
    StartLine,
    /// ヘッダー待ち
    Headers,
    /// ボディ読み取り中 (Content-Length)
    BodyContentLength { remaining: usize },
    /// ボディ読み取り中 (Chunked) - チャンクサイズ待ち
    BodyChunkedSize,
    /// ボディ読み取り中 (Chunked) - チャンクデータ待ち
    BodyChunkedData { remaining: usize },
    /// ボディ読み取り中 (Chunked) - チャンクデータ後の CRLF 待ち
    BodyChunkedDataCrlf,
    /// トレーラーヘッダー読み飛ばし中
    ChunkedTrailer,
    /// ボディ読み取り中 (close-delimited)
    BodyCloseDelimited,
    /// 完了
    Complete,
}

/// HTTP レスポンスデコーダー (Sans I/O、ストリーミング専用)
///
/// `feed()` で受信データを投入し、`decode_head()` でヘッダーを、
/// `next_body()` で利用可能になったボディバイト列を逐次取り出す。
#[derive(Debug)]
pub struct ResponseDecoder {
    buf: Vec<u8>,
    phase: FramePhase,
    start_line: Option<String>,
    headers: Vec<(String, String)>,
    limits: DecoderLimits,
    eof: bool,
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            buf: Vec::new(),
            phase: FramePhase::StartLine,
            start_line: None,
            headers: Vec::new(),
            limits,
            eof: false,
        }
    }

    /// バッファにデータを追加
    pub fn feed(&mut self, data: &[u8]) -> Result<(), Error> {
        let new_size = self.buf.len() + data.len();
        if new_size > self.limits.max_buffer_size {
            return Err(Error::BufferOverflow {
                size: new_size,
                limit: self.limits.max_buffer_size,
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// 接続終了を通知
    ///
    /// close-delimited ボディは接続終了で完結する。バッファに残っている
    /// データは `next_body()` で取り出した時点で Complete へ遷移する。
    /// それ以外のボディ種別では完結扱いにしない (途中切断の検出は
    /// `is_complete()` が false のままであることで分かる)。
    pub fn mark_eof(&mut self) {
        self.eof = true;
        if matches!(self.phase, FramePhase::BodyCloseDelimited) && self.buf.is_empty() {
            self.phase = FramePhase::Complete;
        }
    }

    /// close-delimited ボディを読み取り中かどうかを判定
    pub fn is_close_delimited(&self) -> bool {
        matches!(self.phase, FramePhase::BodyCloseDelimited)
    }

    /// レスポンス全体の受信が完了したかどうか
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, FramePhase::Complete)
    }

    /// ヘッダーをデコード
    ///
    /// ヘッダーが完了したら `Some((ResponseHead, BodyKind))` を返す。
    /// データ不足の場合は `None` を返す。
    pub fn decode_head(&mut self) -> Result<Option<(ResponseHead, BodyKind)>, Error> {
        loop {
            match &self.phase {
                FramePhase::StartLine => {
                    let Some(pos) = find_line(&self.buf) else {
                        return Ok(None);
                    };
                    let line = String::from_utf8(self.buf[..pos].to_vec())
                        .map_err(|e| Error::InvalidData(format!("invalid UTF-8: {e}")))?;
                    self.buf.drain(..pos + 2);

                    // Parse: VERSION SP STATUS-CODE SP REASON-PHRASE CRLF
                    let parts: Vec<&str> = line.splitn(3, ' ').collect();
                    if parts.len() < 2 {
                        return Err(Error::InvalidData(format!("invalid status line: {}", line)));
                    }

                    self.start_line = Some(line);
                    self.phase = FramePhase::Headers;
                }
                FramePhase::Headers => {
                    let Some(pos) = find_line(&self.buf) else {
                        return Ok(None);
                    };
                    if pos == 0 {
                        // Empty line - end of headers
                        self.buf.drain(..2);
                        return self.finish_head().map(Some);
                    }

                    if pos > self.limits.max_header_line_size {
                        return Err(Error::HeaderLineTooLong {
                            size: pos,
                            limit: self.limits.max_header_line_size,
                        });
                    }
                    if self.headers.len() >= self.limits.max_headers_count {
                        return Err(Error::TooManyHeaders {
                            count: self.headers.len() + 1,
                            limit: self.limits.max_headers_count,
                        });
                    }

                    let line = String::from_utf8(self.buf[..pos].to_vec())
                        .map_err(|e| Error::InvalidData(format!("invalid UTF-8: {e}")))?;
                    self.buf.drain(..pos + 2);

                    let (name, value) = parse_header_line(&line)?;
                    self.headers.push((name, value));
                }
                _ => {
                    return Err(Error::InvalidData(
                        "decode_head called during body decoding".to_string(),
                    ));
                }
            }
        }
    }

    /// ヘッダー完了時の処理: ResponseHead の構築とボディフェーズへの遷移
    fn finish_head(&mut self) -> Result<(ResponseHead, BodyKind), Error> {
        let start_line = self
            .start_line
            .take()
            .ok_or_else(|| Error::InvalidData("missing status line".to_string()))?;
        let parts: Vec<&str> = start_line.splitn(3, ' ').collect();
        let status_code: u16 = parts[1]
            .parse()
            .map_err(|_| Error::InvalidData(format!("invalid status code: {}", parts[1])))?;

        let body_kind = determine_body_kind(status_code, &self.headers)?;

        self.phase = match body_kind {
            BodyKind::ContentLength(len) if len > 0 => {
                FramePhase::BodyContentLength { remaining: len }
            }
            BodyKind::ContentLength(_) => FramePhase::Complete,
            BodyKind::Chunked => FramePhase::BodyChunkedSize,
            BodyKind::CloseDelimited => FramePhase::BodyCloseDelimited,
            BodyKind::None => FramePhase::Complete,
        };

        let head = ResponseHead {
            version: parts[0].to_string(),
            status_code,
            reason_phrase: parts.get(2).unwrap_or(&"").to_string(),
            headers: std::mem::take(&mut self.headers),
        };
        Ok((head, body_kind))
    }

    /// 利用可能になったボディバイト列を取り出す
    ///
    /// `decode_head()` 成功後に呼ぶ。今すぐ取り出せるデータがない場合は
    /// `None` を返す (追加の `feed()` が必要)。chunked のフレーミングは
    /// 取り除かれ、正味のボディバイト列だけが返る。
    pub fn next_body(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if matches!(self.phase, FramePhase::StartLine | FramePhase::Headers) {
            return Err(Error::InvalidData(
                "next_body called before decode_head".to_string(),
            ));
        }

        let mut out = Vec::new();
        loop {
            match &mut self.phase {
                FramePhase::BodyContentLength { remaining } => {
                    let take = self.buf.len().min(*remaining);
                    if take > 0 {
                        out.extend(self.buf.drain(..take));
                        *remaining -= take;
                    }
                    if *remaining == 0 {
                        self.phase = FramePhase::Complete;
                    }
                    break;
                }
                FramePhase::BodyChunkedSize => {
                    let Some(pos) = find_line(&self.buf) else {
                        break;
                    };
                    if pos > self.limits.max_chunk_line_size {
                        return Err(Error::ChunkLineTooLong {
                            size: pos,
                            limit: self.limits.max_chunk_line_size,
                        });
                    }
                    let line = String::from_utf8(self.buf[..pos].to_vec())
                        .map_err(|e| Error::InvalidData(format!("invalid UTF-8: {e}")))?;
                    self.buf.drain(..pos + 2);

                    // チャンクサイズをパース (拡張は無視)
                    let size_str = line.split(';').next().unwrap_or(&line).trim();
                    let chunk_size = usize::from_str_radix(size_str, 16).map_err(|_| {
                        Error::InvalidData(format!("invalid chunk size: {}", size_str))
                    })?;

                    if chunk_size == 0 {
                        self.phase = FramePhase::ChunkedTrailer;
                    } else {
                        self.phase = FramePhase::BodyChunkedData {
                            remaining: chunk_size,
                        };
                    }
                }
                FramePhase::BodyChunkedData { remaining } => {
                    let take = self.buf.len().min(*remaining);
                    if take > 0 {
                        out.extend(self.buf.drain(..take));
                        *remaining -= take;
                    }
                    if *remaining == 0 {
                        self.phase = FramePhase::BodyChunkedDataCrlf;
                    } else {
                        break;
                    }
                }
                FramePhase::BodyChunkedDataCrlf => {
                    if self.buf.len() < 2 {
                        break;
                    }
                    if self.buf[..2] != *b"\r\n" {
                        return Err(Error::InvalidData(
                            "invalid chunked encoding: expected CRLF after chunk data".to_string(),
                        ));
                    }
                    self.buf.drain(..2);
                    self.phase = FramePhase::BodyChunkedSize;
                }
                FramePhase::ChunkedTrailer => {
                    // トレーラーヘッダーは空行まで読み飛ばす
                    let Some(pos) = find_line(&self.buf) else {
                        break;
                    };
                    self.buf.drain(..pos + 2);
                    if pos == 0 {
                        self.phase = FramePhase::Complete;
                    }
                }
                FramePhase::BodyCloseDelimited => {
                    if !self.buf.is_empty() {
                        out.append(&mut self.buf);
                    }
                    if self.eof {
                        self.phase = FramePhase::Complete;
                    }
                    break;
                }
                FramePhase::Complete => break,
                FramePhase::StartLine | FramePhase::Headers => unreachable!(),
            }
        }

        if out.is_empty() { Ok(None) } else { Ok(Some(out)) }
    }
}

/// ボディモードを決定
///
/// RFC 9112 Section 6.3 の優先順位に従う:
/// 1. 1xx/204/304 はボディなし
/// 2. Transfer-Encoding がある場合は chunked
/// 3. Content-Length がある場合は固定長
/// 4. それ以外は close-delimited (接続が閉じるまでがボディ)
fn determine_body_kind(
    status_code: u16,
    headers: &[(String, String)],
) -> Result<BodyKind, Error> {
    let transfer_encoding_chunked = parse_transfer_encoding_chunked(headers)?;
    let content_length = parse_content_length(headers)?;

    if transfer_encoding_chunked && content_length.is_some() {
        return Err(Error::InvalidData(
            "invalid message: both Transfer-Encoding and Content-Length".to_string(),
        ));
    }

    if (100..200).contains(&status_code) || status_code == 204 || status_code == 304 {
        return Ok(BodyKind::None);
    }

    if transfer_encoding_chunked {
        return Ok(BodyKind::Chunked);
    }

    if let Some(len) = content_length {
        return Ok(BodyKind::ContentLength(len));
    }

    Ok(BodyKind::CloseDelimited)
}

/// CRLF の位置を探す
fn find_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// ヘッダー行をパース
fn parse_header_line(line: &str) -> Result<(String, String), Error> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::InvalidData(format!("invalid header line: {}", line)))?;
    if name.is_empty() || name.contains(' ') || name.contains('\t') {
        return Err(Error::InvalidData(format!("invalid header name: {}", name)));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Transfer-Encoding ヘッダーを解析
///
/// RFC 9112: chunked は最後のエンコーディングでなければならない。
/// chunked 以外のエンコーディングはサポートしない。
fn parse_transfer_encoding_chunked(headers: &[(String, String)]) -> Result<bool, Error> {
    let mut chunked = false;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Transfer-Encoding") {
            for token in value.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    return Err(Error::InvalidData(
                        "invalid Transfer-Encoding: empty token".to_string(),
                    ));
                }
                if token.eq_ignore_ascii_case("chunked") {
                    chunked = true;
                } else {
                    return Err(Error::InvalidData(
                        "invalid Transfer-Encoding: unsupported coding".to_string(),
                    ));
                }
            }
        }
    }
    Ok(chunked)
}

/// Content-Length ヘッダーを解析
fn parse_content_length(headers: &[(String, String)]) -> Result<Option<usize>, Error> {
    let mut value: Option<usize> = None;
    for (name, raw_value) in headers {
        if name.eq_ignore_ascii_case("Content-Length") {
            let raw_value = raw_value.trim();
            if raw_value.is_empty() || !raw_value.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::InvalidData(
                    "invalid Content-Length: not a number".to_string(),
                ));
            }
            let parsed: usize = raw_value
                .parse()
                .map_err(|_| Error::InvalidData("invalid Content-Length: overflow".to_string()))?;
            if let Some(prev) = value {
                if prev != parsed {
                    return Err(Error::InvalidData(
                        "invalid Content-Length: mismatched values".to_string(),
                    ));
                }
            } else {
                value = Some(parsed);
            }
        }
    }
    Ok(value)
}
