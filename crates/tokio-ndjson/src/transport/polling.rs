//! ポーリングトランスポート
//!
//! ネイティブな pull 読み取りができず、累積バッファのスナップショットしか
//! 取れないソース向けの戦略。リスナーが前回オフセットからの差分を計算して
//! チャンク化し、メールボックス経由で pull 型のリーダーへ届ける。
//!
//! 差分計算とエンキューはロック下で一体に行う。スナップショットイベントが
//! 並行に届いても、同じ範囲が二重にチャンク化されることはない。

use std::sync::{Arc, Mutex};

use shiguredo_ndjson::{RawChunk, Request, ResponseHead, TransportCapability};

use crate::error::{Error, Result};
use crate::mailbox::{Mailbox, Terminal};

/// ポーリングソースを起動するコネクタ
///
/// リクエストを開始し、累積スナップショットと終端イベントを
/// [`SnapshotListener`] へ届ける責務を持つ。実運用の HTTP では
/// ネイティブストリーミングが常に使えるため、これは主に累積バッファ
/// しか公開しない外部ソースの接続点になる。
pub trait PollingConnector: Send + Sync {
    /// リクエストを開始する
    ///
    /// 実装はイベントが届くたびに listener のメソッドを呼び出す。
    fn start(&self, request: Request, listener: SnapshotListener);
}

#[derive(Debug)]
struct ListenerState {
    /// チャンク化済みの累積バッファ先頭からのバイト数
    offset: usize,
}

/// スナップショットリスナー
///
/// push 型ソースからの累積スナップショットを差分チャンクへ変換して
/// メールボックスに積む。クローンはすべて同じストリームを指す。
#[derive(Debug, Clone)]
pub struct SnapshotListener {
    mailbox: Arc<Mailbox>,
    state: Arc<Mutex<ListenerState>>,
}

impl SnapshotListener {
    fn new(mailbox: Arc<Mailbox>) -> Self {
        Self {
            mailbox,
            state: Arc::new(Mutex::new(ListenerState { offset: 0 })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// バイナリの累積スナップショットを通知
    ///
    /// 前回からの差分だけがチャンクとして積まれる。スナップショットが
    /// 前回より短い場合は何もしない (累積バッファは縮まない前提)。
    pub fn binary_snapshot(&self, cumulative: &[u8]) {
        let chunk = {
            let mut state = self.lock();
            if cumulative.len() <= state.offset {
                return;
            }
            let chunk = RawChunk::binary(&cumulative[state.offset..]);
            state.offset = cumulative.len();
            chunk
        };
        self.mailbox.push(chunk);
    }

    /// テキストの累積スナップショットを通知
    ///
    /// オフセットは常に過去のスナップショット全体の長さなので、差分の
    /// 先頭は文字境界に一致する。
    pub fn text_snapshot(&self, cumulative: &str) {
        let chunk = {
            let mut state = self.lock();
            if cumulative.len() <= state.offset {
                return;
            }
            let chunk = RawChunk::text(&cumulative[state.offset..]);
            state.offset = cumulative.len();
            chunk
        };
        self.mailbox.push(chunk);
    }

    /// 正常終了を通知
    pub fn finished(&self, status: u16, head: Option<ResponseHead>) {
        self.mailbox.terminate(Terminal::Finished { status, head });
    }

    /// ソース側の障害を通知
    pub fn failed(&self, message: &str) {
        self.mailbox.terminate(Terminal::Failed(message.to_string()));
    }
}

/// ポーリングトランスポートの読み取り側ハンドル
pub struct PollingHandle {
    mailbox: Arc<Mailbox>,
    capability: TransportCapability,
    finished: bool,
}

impl PollingHandle {
    /// コネクタを起動してハンドルを作成
    pub fn start(
        connector: &dyn PollingConnector,
        request: Request,
        capability: TransportCapability,
    ) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        let listener = SnapshotListener::new(mailbox.clone());
        connector.start(request, listener);
        Self {
            mailbox,
            capability,
            finished: false,
        }
    }

    /// トランスポート識別
    pub fn capability(&self) -> TransportCapability {
        self.capability
    }

    /// 終端状態を取得 (終端前は `None`)
    pub(crate) fn terminal(&self) -> Option<Terminal> {
        self.mailbox.terminal()
    }

    /// 次のチャンクを読み取る
    pub async fn read_next(&mut self) -> Result<RawChunk> {
        if self.finished {
            return Err(Error::StreamFinished);
        }
        let result = self.mailbox.recv().await;
        match &result {
            Ok(chunk) if chunk.done => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        result
    }

    /// ストリームを中断する
    pub fn abort(&mut self) {
        self.mailbox.terminate(Terminal::Aborted);
    }
}
