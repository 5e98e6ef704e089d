//! トランスポートセレクタ
//!
//! 能力検出の結果を初回選択時にキャッシュする。検出自体は
//! [`TransportCapability::detect`] の純粋関数に委譲し、キャッシュの寿命は
//! セレクタインスタンスに閉じる (プロセスグローバルな状態は持たない)。
//! テストでは [`TransportSelector::reset_for_testing`] でキャッシュを破棄し、
//! プローブを差し替えて再検出させられる。

use std::sync::OnceLock;

use shiguredo_ndjson::{EnvironmentProbe, TransportCapability};

/// トランスポートセレクタ
///
/// 最初の `select()` 呼び出しで能力テーブルから最適なトランスポートを
/// 決定し、以降は同じ結果を返す。
#[derive(Debug)]
pub struct TransportSelector {
    probe: EnvironmentProbe,
    selected: OnceLock<TransportCapability>,
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self::native()
    }
}

impl TransportSelector {
    /// 能力テーブルを指定してセレクタを作成
    pub fn new(probe: EnvironmentProbe) -> Self {
        Self {
            probe,
            selected: OnceLock::new(),
        }
    }

    /// ネイティブストリーミング環境用のセレクタを作成
    ///
    /// tokio のソケットは真の逐次 pull 読み取りを提供するため、
    /// このクレートの通常運用では常にこれを使う。
    pub fn native() -> Self {
        Self::new(EnvironmentProbe::native())
    }

    /// トランスポートを選択 (初回のみ検出し、以降はキャッシュを返す)
    pub fn select(&self) -> TransportCapability {
        *self
            .selected
            .get_or_init(|| TransportCapability::detect(&self.probe))
    }

    /// キャッシュ済みの選択結果を破棄し、プローブを差し替える
    ///
    /// テスト専用。次の `select()` で再検出される。
    pub fn reset_for_testing(&mut self, probe: EnvironmentProbe) {
        self.probe = probe;
        self.selected = OnceLock::new();
    }
}
