//! トランスポート戦略
//!
//! 配信の仕組みがどうであれ、リーダーには同じ pull 型インターフェース
//! ([`StreamHandle::read_next`]) を提供する。

mod native;
mod polling;

pub use native::NativeStreamTransport;
pub use polling::{PollingConnector, PollingHandle, SnapshotListener};

use shiguredo_ndjson::{Completion, RawChunk, TransportCapability};

use crate::error::Result;
use crate::mailbox::Terminal;

/// 選択されたトランスポートへの統一ハンドル
pub enum StreamHandle {
    /// ネイティブストリーミング (tokio ソケット)
    Native(NativeStreamTransport),
    /// ポーリング (累積スナップショットの差分)
    Polling(PollingHandle),
}

impl StreamHandle {
    /// トランスポート識別
    pub fn capability(&self) -> TransportCapability {
        match self {
            StreamHandle::Native(transport) => transport.capability(),
            StreamHandle::Polling(handle) => handle.capability(),
        }
    }

    /// 次のチャンクを読み取る
    ///
    /// 最終チャンクは `done=true` で返す。最終チャンクを返した後の
    /// 呼び出しは [`crate::Error::StreamFinished`] で即座に失敗する。
    pub async fn read_next(&mut self) -> Result<RawChunk> {
        match self {
            StreamHandle::Native(transport) => transport.read_next().await,
            StreamHandle::Polling(handle) => handle.read_next().await,
        }
    }

    /// ストリームを中断する
    pub async fn abort(&mut self) {
        match self {
            StreamHandle::Native(transport) => transport.abort().await,
            StreamHandle::Polling(handle) => handle.abort(),
        }
    }

    /// 正常終了時の完了通知を構築する
    ///
    /// まだ終了していない場合や異常終了の場合は中断扱いの通知になる。
    pub fn completion(&self) -> Completion {
        match self {
            StreamHandle::Native(transport) => match transport.response_head() {
                Some(head) => Completion::from_head(head.clone(), transport.capability()),
                None => Completion::terminated(transport.capability()),
            },
            StreamHandle::Polling(handle) => match handle.terminal() {
                Some(Terminal::Finished { status, head }) => Completion {
                    status_code: status,
                    transport: handle.capability(),
                    head,
                },
                _ => Completion::terminated(handle.capability()),
            },
        }
    }
}
