//! ストリーム完了通知

use crate::capability::TransportCapability;
use crate::response::ResponseHead;

/// ストリーム完了通知
///
/// すべてのレコードが消費された後に一度だけ得られる。中断やトランスポート
/// 障害で終了した場合はステータスコードが 0 になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// HTTP ステータスコード (中断・障害時は 0)
    pub status_code: u16,
    /// ストリームを配信したトランスポート
    pub transport: TransportCapability,
    /// レスポンスヘッダー (受信できなかった場合は `None`)
    pub head: Option<ResponseHead>,
}

impl Completion {
    /// レスポンスヘッダーを受信して完了した通知を作成
    pub fn from_head(head: ResponseHead, transport: TransportCapability) -> Self {
        Self {
            status_code: head.status_code,
            transport,
            head: Some(head),
        }
    }

    /// 中断またはトランスポート障害による完了通知を作成
    pub fn terminated(transport: TransportCapability) -> Self {
        Self {
            status_code: 0,
            transport,
            head: None,
        }
    }

    /// ステータスコードが成功 (2xx) か確認
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
