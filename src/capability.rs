//! トランスポート能力の検出
//!
//! 実行環境がレスポンスボディをどのように逐次配信できるかを表す
//! [`TransportCapability`] と、その検出に使う能力テーブル
//! [`EnvironmentProbe`] を提供する。
//!
//! 検出は副作用のない純粋関数であり、プローブ中の失敗は例外ではなく
//! テーブル上の `false` として表現される。選択のメモ化はこのクレートでは
//! 行わない (呼び出し側のセレクタが一度だけ検出してキャッシュする)。

use std::fmt;

/// 実行環境がレスポンスボディを逐次配信する仕組み
///
/// 優先順位は `NativeStream > PollingBinary > PollingText > Unsupported`。
/// ネイティブストリーミングは真の逐次 pull 配信、バイナリポーリングは
/// バイト単位の忠実性を保ったスナップショット差分、テキストポーリングは
/// 累積テキストバッファの差分しか取れない最終手段 (ポーリング境界をまたぐ
/// マルチバイト文字が保証されない)。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportCapability {
    /// 真の逐次 pull 読み取り (readable stream)
    NativeStream,
    /// 到着ごとにイベントが発火し、累積バイナリバッファの差分を取る
    PollingBinary,
    /// 到着ごとにイベントが発火し、累積テキストバッファの差分を取る
    PollingText,
    /// 逐次配信不可 (開始/終了イベントのみ)
    Unsupported,
}

impl TransportCapability {
    /// 完了通知などで使う識別タグ
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportCapability::NativeStream => "native-stream",
            TransportCapability::PollingBinary => "polling-binary",
            TransportCapability::PollingText => "polling-text",
            TransportCapability::Unsupported => "unsupported",
        }
    }

    /// 逐次配信が可能かどうか
    pub fn is_incremental(&self) -> bool {
        !matches!(self, TransportCapability::Unsupported)
    }

    /// 能力テーブルから最適なトランスポートを決定
    ///
    /// 優先順位: `NativeStream > PollingBinary > PollingText > Unsupported`。
    /// user_agent ヒントが "firefox" を含む場合、プローブで確認できなくても
    /// バイナリポーリング対応とみなす (歴史的に responseType プローブが
    /// 当てにならない実装への対処)。
    pub fn detect(probe: &EnvironmentProbe) -> TransportCapability {
        if probe.native_stream {
            return TransportCapability::NativeStream;
        }
        if probe.polling_binary || probe.hints_binary_polling() {
            return TransportCapability::PollingBinary;
        }
        if probe.polling_text {
            return TransportCapability::PollingText;
        }
        TransportCapability::Unsupported
    }
}

impl fmt::Display for TransportCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 実行環境の能力テーブル
///
/// 各フィールドはプローブの結果であり、プローブ中に失敗した項目は
/// 単に `false` になる (例外による制御フローはない)。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentProbe {
    /// ネイティブな pull 型ストリームリーダーが使えるか
    pub native_stream: bool,
    /// バイナリの累積スナップショットを返すポーリングモードが使えるか
    pub polling_binary: bool,
    /// テキストの累積バッファを返すポーリングモードが使えるか
    pub polling_text: bool,
    /// user-agent ヒント (挙動が一貫しない実装の判別用)
    pub user_agent: Option<String>,
}

impl EnvironmentProbe {
    /// 何も使えない環境
    pub fn none() -> Self {
        Self::default()
    }

    /// ネイティブストリーミングが使える環境 (tokio ソケットなど)
    pub fn native() -> Self {
        Self {
            native_stream: true,
            ..Self::default()
        }
    }

    /// user_agent が歴史的にバイナリポーリング対応を示唆するか
    fn hints_binary_polling(&self) -> bool {
        self.user_agent
            .as_deref()
            .is_some_and(|ua| ua.to_ascii_lowercase().contains("firefox"))
    }
}
