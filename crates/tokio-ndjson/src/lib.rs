//! tokio_ndjson - Tokio transport layer for shiguredo_ndjson
//!
//! tokio と tokio-rustls を使用した非同期ストリーミング NDJSON クライアント。
//!
//! ## 特徴
//!
//! - **shiguredo_ndjson ベース**: Sans I/O のレコードデコーダーとレスポンス
//!   フレーミングをベースにした設計
//! - **インクリメンタル配信**: ボディ全体を待たず、チャンクが到着する
//!   たびにレコードのバッチを取り出せる
//! - **トランスポート選択**: 能力検出に基づいてネイティブストリーミングと
//!   ポーリングを自動で切り替える
//! - **TLS 対応**: tokio-rustls による HTTPS 対応
//!
//! ## 使い方
//!
//! ```ignore
//! use tokio_ndjson::Client;
//!
//! let client = Client::new();
//! let mut stream = client
//!     .get("http://example.com/chunked-response")
//!     .query([("numChunks", "4"), ("entriesPerChunk", "3")])
//!     .await?;
//!
//! while let Some(batch) = stream.next_batch().await? {
//!     for result in batch {
//!         match result {
//!             Ok(record) => println!("{}", record.as_str()),
//!             Err(failure) => eprintln!("skipped: {}", failure),
//!         }
//!     }
//! }
//!
//! let completion = stream.completion().expect("finished");
//! assert_eq!(completion.status_code, 200);
//! ```

pub mod client;
pub mod error;
mod mailbox;
pub mod record_ext;
pub mod selector;
pub mod transport;

pub use client::{Client, RecordStream, RequestBuilder, parse_url};
pub use error::{Error, Result};
pub use record_ext::RecordBatchExt;
pub use selector::TransportSelector;
pub use transport::{PollingConnector, SnapshotListener, StreamHandle};

// shiguredo_ndjson の型を re-export
pub use shiguredo_ndjson::{
    Completion, EnvironmentProbe, ParsedRecord, RawChunk, RecordParseFailure, RecordResult,
    Request, TransportCapability,
};
