//! URL パースとパーセントエンコーディング (RFC 3986 のサブセット)
//!
//! トランスポート実装がエンドポイント URL から接続先とリクエストターゲットを
//! 導出するための最小限のパーサー。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_ndjson::uri::{Uri, percent_encode};
//!
//! let uri = Uri::parse("https://example.com:8080/stream?limit=10").unwrap();
//! assert_eq!(uri.scheme(), Some("https"));
//! assert_eq!(uri.host(), Some("example.com"));
//! assert_eq!(uri.port(), Some(8080));
//! assert_eq!(uri.path(), "/stream");
//! assert_eq!(uri.query(), Some("limit=10"));
//!
//! assert_eq!(percent_encode("hello world"), "hello%20world");
//! ```

use core::fmt;

/// URL パースエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// 空の URL
    Empty,
    /// 不正なポート番号
    InvalidPort,
    /// 不正なスキーム
    InvalidScheme,
    /// 不正なホスト
    InvalidHost,
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriError::Empty => write!(f, "empty URL"),
            UriError::InvalidPort => write!(f, "invalid port"),
            UriError::InvalidScheme => write!(f, "invalid scheme"),
            UriError::InvalidHost => write!(f, "invalid host"),
        }
    }
}

impl std::error::Error for UriError {}

/// パースされた URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl Uri {
    /// URL 文字列をパース
    pub fn parse(input: &str) -> Result<Self, UriError> {
        if input.is_empty() {
            return Err(UriError::Empty);
        }

        let (scheme, rest) = match input.split_once("://") {
            Some((scheme, rest)) => {
                if scheme.is_empty()
                    || !scheme
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
                {
                    return Err(UriError::InvalidScheme);
                }
                (Some(scheme.to_ascii_lowercase()), rest)
            }
            None => (None, input),
        };

        let (authority, path_and_query) = match rest.find('/') {
            Some(pos) => (&rest[..pos], &rest[pos..]),
            None => (rest, ""),
        };

        let (host, port) = if authority.is_empty() {
            (None, None)
        } else {
            match authority.rsplit_once(':') {
                Some((host, port_str)) => {
                    if host.is_empty() {
                        return Err(UriError::InvalidHost);
                    }
                    let port: u16 = port_str.parse().map_err(|_| UriError::InvalidPort)?;
                    (Some(host.to_string()), Some(port))
                }
                None => (Some(authority.to_string()), None),
            }
        };

        // フラグメントはリクエストターゲットに含めない
        let path_and_query = path_and_query
            .split_once('#')
            .map(|(before, _)| before)
            .unwrap_or(path_and_query);

        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (path_and_query.to_string(), None),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query,
        })
    }

    /// スキームを取得
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// ホストを取得
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// ポートを取得
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// パスを取得
    pub fn path(&self) -> &str {
        &self.path
    }

    /// クエリ文字列を取得
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// リクエストターゲット (origin-form) を構築
    pub fn origin_form(&self) -> String {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match &self.query {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        }
    }
}

/// パーセントエンコーディング対象外の文字 (unreserved characters)
/// RFC 3986 Section 2.3
fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'.' || c == b'_' || c == b'~'
}

/// パーセントエンコーディング
///
/// unreserved 文字以外をパーセントエンコードする。
pub fn percent_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if is_unreserved(byte) {
            result.push(byte as char);
        } else {
            result.push('%');
            result.push(to_hex_char(byte >> 4));
            result.push(to_hex_char(byte & 0x0F));
        }
    }
    result
}

fn to_hex_char(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'A' + nibble - 10) as char,
        _ => unreachable!(),
    }
}
