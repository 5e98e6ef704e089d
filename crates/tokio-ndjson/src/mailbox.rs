//! チャンクメールボックス
//!
//! push 型のイベントソース (ポーリングリスナー) と pull 型のリーダーを
//! 橋渡しする。ソースはチャンクをキューへ積み、リーダーは 1 件ずつ
//! 取り出す。待機するリーダーは常に 1 つだけという前提。
//!
//! 終端は一度だけ設定できる。キューを飲み干した後のリーダーは、正常終了
//! なら空の最終チャンクを一度だけ受け取り、それ以降の読み取りは
//! [`Error::StreamFinished`] で即座に失敗する (沈黙のハングにしない)。

use std::collections::VecDeque;
use std::sync::Mutex;

use shiguredo_ndjson::{RawChunk, ResponseHead};
use tokio::sync::Notify;

use crate::error::{Error, Result};

/// ストリームの終端状態
#[derive(Debug, Clone)]
pub(crate) enum Terminal {
    /// 正常終了 (レスポンス全体を受信した)
    Finished {
        status: u16,
        head: Option<ResponseHead>,
    },
    /// トランスポート障害
    Failed(String),
    /// 利用側による中断
    Aborted,
}

#[derive(Debug)]
struct MailboxState {
    queue: VecDeque<RawChunk>,
    terminal: Option<Terminal>,
    /// 空の最終チャンクを配信済みかどうか
    final_delivered: bool,
}

/// チャンクメールボックス
#[derive(Debug)]
pub(crate) struct Mailbox {
    state: Mutex<MailboxState>,
    notify: Notify,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                terminal: None,
                final_delivered: false,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MailboxState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// チャンクを積む
    ///
    /// 終端設定後のチャンクは捨てる (遅れて届いたイベントの残骸)。
    pub(crate) fn push(&self, chunk: RawChunk) {
        {
            let mut state = self.lock();
            if state.terminal.is_some() {
                return;
            }
            state.queue.push_back(chunk);
        }
        self.notify.notify_one();
    }

    /// 終端を設定する (最初の 1 回だけ有効)
    pub(crate) fn terminate(&self, terminal: Terminal) {
        {
            let mut state = self.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(terminal);
        }
        self.notify.notify_one();
    }

    /// 設定済みの終端状態を取得
    pub(crate) fn terminal(&self) -> Option<Terminal> {
        self.lock().terminal.clone()
    }

    /// 次のチャンクを取り出す
    ///
    /// キューが空で終端も未設定なら、どちらかが現れるまで待つ。
    pub(crate) async fn recv(&self) -> Result<RawChunk> {
        loop {
            {
                let mut state = self.lock();
                if let Some(chunk) = state.queue.pop_front() {
                    return Ok(chunk);
                }
                if let Some(terminal) = &state.terminal {
                    match terminal {
                        Terminal::Finished { .. } => {
                            if state.final_delivered {
                                return Err(Error::StreamFinished);
                            }
                            state.final_delivered = true;
                            return Ok(RawChunk::end());
                        }
                        Terminal::Failed(msg) => {
                            return Err(Error::TransportFailure(msg.clone()));
                        }
                        Terminal::Aborted => return Err(Error::Aborted),
                    }
                }
            }
            self.notify.notified().await;
        }
    }
}
