use std::fmt;

/// NDJSON ストリームデコードエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 不正なデータ
    InvalidData(String),
    /// バッファサイズ超過
    BufferOverflow { size: usize, limit: usize },
    /// ヘッダー数超過
    TooManyHeaders { count: usize, limit: usize },
    /// ヘッダー行が長すぎる
    HeaderLineTooLong { size: usize, limit: usize },
    /// チャンクサイズ行が長すぎる
    ChunkLineTooLong { size: usize, limit: usize },
    /// レコードが長すぎる (デリミタが現れないままトレーラーが成長し続けた)
    RecordTooLong { size: usize, limit: usize },
    /// クローズ済みセッションへの decode 呼び出し
    ///
    /// `done=true` のチャンクを処理した後、または `abort()` の後に
    /// `decode()` を呼び出すとこのエラーになる。
    SessionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Error::BufferOverflow { size, limit } => {
                write!(f, "buffer overflow: {} > {}", size, limit)
            }
            Error::TooManyHeaders { count, limit } => {
                write!(f, "too many headers: {} > {}", count, limit)
            }
            Error::HeaderLineTooLong { size, limit } => {
                write!(f, "header line too long: {} > {}", size, limit)
            }
            Error::ChunkLineTooLong { size, limit } => {
                write!(f, "chunk line too long: {} > {}", size, limit)
            }
            Error::RecordTooLong { size, limit } => {
                write!(f, "record too long: {} > {}", size, limit)
            }
            Error::SessionClosed => {
                write!(f, "decode called on a closed record decoder session")
            }
        }
    }
}

impl std::error::Error for Error {}
