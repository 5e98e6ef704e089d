//! インクリメンタル NDJSON レコードデコーダー
//!
//! Sans I/O 設計に基づくストリーミングデコーダーを提供。
//! チャンク境界で分断されたレコードと、バイナリ配信でマルチバイト文字の
//! 途中で切れたチャンクを正しく再組み立てする。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_ndjson::{RawChunk, RecordDecoder};
//!
//! let mut decoder = RecordDecoder::new();
//!
//! // チャンクを到着順に投入する
//! for result in decoder.decode(&RawChunk::text("{\"a\":1}\n{\"b\":")).unwrap() {
//!     let record = result.unwrap();
//!     println!("#{}: {}", record.ordinal(), record.as_str());
//! }
//!
//! // 最終チャンク (空の最終フラッシュでもよい)
//! decoder.decode(&RawChunk::final_text("2}\n")).unwrap();
//! assert!(decoder.is_closed());
//! ```

mod record;
mod session;
mod utf8;

// 公開 API
pub use session::{ParsedRecord, RecordDecoder, RecordParseFailure, RecordResult};
