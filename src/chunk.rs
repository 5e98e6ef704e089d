//! 生チャンクの定義
//!
//! トランスポート戦略が生成し、レコードデコーダーが消費する配信単位。

/// チャンクのペイロード
///
/// ネイティブストリーミングとバイナリポーリングはバイト列を、
/// テキストポーリングはデコード済みテキストを届ける。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkPayload {
    /// バイト列 (UTF-8 の途中で切れている可能性がある)
    Binary(Vec<u8>),
    /// デコード済みテキスト
    Text(String),
}

/// トランスポートから届く生チャンク
///
/// `done` が true のチャンクが最終チャンクであり、以降のチャンクは
/// 存在しない。最終チャンクはペイロードが空のこともある (最終フラッシュ)。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// ペイロード
    pub payload: ChunkPayload,
    /// これが最終チャンクかどうか
    pub done: bool,
}

impl RawChunk {
    /// バイナリチャンクを作成 (継続)
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: ChunkPayload::Binary(data.into()),
            done: false,
        }
    }

    /// テキストチャンクを作成 (継続)
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: ChunkPayload::Text(text.into()),
            done: false,
        }
    }

    /// データを伴う最終バイナリチャンクを作成
    pub fn final_binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: ChunkPayload::Binary(data.into()),
            done: true,
        }
    }

    /// データを伴う最終テキストチャンクを作成
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            payload: ChunkPayload::Text(text.into()),
            done: true,
        }
    }

    /// 空の最終フラッシュチャンクを作成
    pub fn end() -> Self {
        Self {
            payload: ChunkPayload::Binary(Vec::new()),
            done: true,
        }
    }

    /// ペイロードのバイト数を取得
    pub fn len(&self) -> usize {
        match &self.payload {
            ChunkPayload::Binary(data) => data.len(),
            ChunkPayload::Text(text) => text.len(),
        }
    }

    /// ペイロードが空かどうか
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
