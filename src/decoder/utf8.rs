//! ストリーミング UTF-8 デコーダー
//!
//! チャンク境界で分断されたマルチバイトシーケンスを次の呼び出しまで
//! 保留するデコーダー。不正なバイト列は U+FFFD (REPLACEMENT CHARACTER)
//! に置き換える。

/// ストリーミング UTF-8 デコーダー
///
/// `feed()` はチャンク末尾の不完全なマルチバイトシーケンスを内部に保留し、
/// 完結した部分だけをテキストとして返す。ストリーム終端では `finish()` で
/// 保留分を確定させる (不完全なまま終わった場合は U+FFFD になる)。
#[derive(Debug, Default)]
pub(crate) struct Utf8StreamDecoder {
    /// 前回のチャンク末尾から持ち越した不完全なシーケンス (最大 3 バイト)
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// バイト列をデコードし、完結した部分のテキストを返す
    pub fn feed(&mut self, data: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(data);

        let keep = incomplete_suffix_len(&buf);
        let split = buf.len() - keep;
        self.pending = buf[split..].to_vec();
        buf.truncate(split);

        String::from_utf8_lossy(&buf).into_owned()
    }

    /// 保留中のバイトを確定させる (ストリーム終端用)
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// 保留中のバイトがあるかどうか
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 保留中のバイトを破棄する (アボート用)
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// バッファ末尾の不完全な UTF-8 シーケンスの長さを求める
///
/// UTF-8 シーケンスは最大 4 バイトなので、末尾 3 バイト以内に先頭バイトが
/// あり、かつ期待長に満たない場合のみ保留する。不正なバイト列は保留せず、
/// そのまま置換文字に変換させる。
fn incomplete_suffix_len(buf: &[u8]) -> usize {
    let len = buf.len();
    let lower = len.saturating_sub(3);
    let mut i = len;
    while i > lower {
        i -= 1;
        let b = buf[i];
        if b & 0xC0 != 0x80 {
            // 非継続バイト: 先頭バイトなら期待長を確認
            let expected = match b {
                0xC2..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF4 => 4,
                // ASCII または不正な先頭バイトは保留しない
                _ => return 0,
            };
            let have = len - i;
            return if have < expected { have } else { 0 };
        }
    }
    0
}
