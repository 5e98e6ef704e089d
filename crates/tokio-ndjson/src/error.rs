//! tokio-ndjson エラー型

use std::fmt;

use shiguredo_ndjson::TransportCapability;

/// tokio-ndjson エラー
#[derive(Debug)]
pub enum Error {
    /// I/O エラー
    Io(std::io::Error),
    /// NDJSON デコードエラー
    Ndjson(shiguredo_ndjson::Error),
    /// TLS エラー
    Tls(String),
    /// 接続タイムアウト
    Timeout,
    /// 接続が閉じられた
    ConnectionClosed,
    /// 不正な URL
    InvalidUrl(String),
    /// 逐次配信できるトランスポートがない
    TransportUnavailable(TransportCapability),
    /// トランスポートの実行時障害
    TransportFailure(String),
    /// ストリームが中断された
    Aborted,
    /// 最終チャンク消費後の読み取り
    ///
    /// `done=true` のチャンクを返した後にさらに読み取ろうとするとこの
    /// エラーになる。沈黙のハングではなく即座に失敗する。
    StreamFinished,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Ndjson(e) => write!(f, "NDJSON decode error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::Timeout => write!(f, "connection timeout"),
            Error::ConnectionClosed => write!(f, "connection closed"),
            Error::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
            Error::TransportUnavailable(capability) => {
                write!(f, "no incremental transport available: {}", capability)
            }
            Error::TransportFailure(msg) => write!(f, "transport failure: {}", msg),
            Error::Aborted => write!(f, "stream aborted"),
            Error::StreamFinished => write!(f, "read after final chunk"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Ndjson(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<shiguredo_ndjson::Error> for Error {
    fn from(e: shiguredo_ndjson::Error) -> Self {
        Error::Ndjson(e)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

impl From<rustls::Error> for Error {
    fn from(e: rustls::Error) -> Self {
        Error::Tls(e.to_string())
    }
}

impl From<rustls_pki_types::InvalidDnsNameError> for Error {
    fn from(e: rustls_pki_types::InvalidDnsNameError) -> Self {
        Error::Tls(e.to_string())
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
