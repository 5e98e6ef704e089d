//! # shiguredo_ndjson
//!
//! ストリーミング NDJSON クライアントのコアライブラリ (Sans I/O)
//!
//! ## 特徴
//!
//! - **Sans I/O**: I/O を完全に分離した設計。トランスポート実装は
//!   `crates/tokio-ndjson` を参照
//! - **インクリメンタルデコード**: レスポンスボディ全体を待たずに、
//!   チャンクが到着するたびに完成したレコードを取り出せる
//! - **トランスポート能力モデル**: 実行環境の配信能力を正規化し、
//!   最適なトランスポート戦略を決定する
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_ndjson::{RawChunk, RecordDecoder};
//!
//! let mut decoder = RecordDecoder::new();
//!
//! // チャンクを到着順に投入する
//! let results = decoder.decode(&RawChunk::text("{\"id\":1}\n{\"id\":"))?;
//! assert_eq!(results.len(), 1);
//!
//! // 分断されたレコードは次のチャンクで完成する
//! let results = decoder.decode(&RawChunk::final_text("2}\n"))?;
//! assert_eq!(results.len(), 1);
//! # Ok::<(), shiguredo_ndjson::Error>(())
//! ```

mod capability;
mod chunk;
mod completion;
mod decoder;
mod error;
mod limits;
mod request;
mod response;
pub mod uri;

pub use capability::{EnvironmentProbe, TransportCapability};
pub use chunk::{ChunkPayload, RawChunk};
pub use completion::Completion;
pub use decoder::{ParsedRecord, RecordDecoder, RecordParseFailure, RecordResult};
pub use error::Error;
pub use limits::DecoderLimits;
pub use request::Request;
pub use response::{BodyKind, ResponseDecoder, ResponseHead};
