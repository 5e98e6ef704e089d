/// デコーダーの制限設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderLimits {
    /// 最大バッファサイズ (デフォルト: 64KB)
    ///
    /// レスポンスヘッダーおよびボディの未消費分を保持するバッファの上限。
    pub max_buffer_size: usize,
    /// 最大ヘッダー数 (デフォルト: 100)
    pub max_headers_count: usize,
    /// 最大ヘッダー行長 (デフォルト: 8KB)
    pub max_header_line_size: usize,
    /// 最大チャンクサイズ行長 (デフォルト: 64バイト)
    ///
    /// chunked 転送エンコーディングのチャンクサイズ行の最大長。
    /// チャンクサイズは 16 進数で表現されるため、通常は非常に短い。
    pub max_chunk_line_size: usize,
    /// 最大レコード長 (デフォルト: 1MB)
    ///
    /// 1 つの NDJSON レコードの最大バイト数。デリミタが現れないまま
    /// トレーラーがこのサイズを超えると `Error::RecordTooLong` になる。
    pub max_record_size: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 64 * 1024, // 64KB
            max_headers_count: 100,
            max_header_line_size: 8 * 1024, // 8KB
            max_chunk_line_size: 64,        // 64 bytes
            max_record_size: 1024 * 1024,   // 1MB
        }
    }
}

impl DecoderLimits {
    /// 制限なしの設定を作成
    pub fn unlimited() -> Self {
        Self {
            max_buffer_size: usize::MAX,
            max_headers_count: usize::MAX,
            max_header_line_size: usize::MAX,
            max_chunk_line_size: usize::MAX,
            max_record_size: usize::MAX,
        }
    }
}
