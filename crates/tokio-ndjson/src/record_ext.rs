//! レコードバッチ拡張トレイト
//!
//! [`RecordStream::next_batch`](crate::RecordStream::next_batch) が返す
//! バッチに便利なメソッドを追加する。

use shiguredo_ndjson::RecordResult;

/// レコードバッチ拡張トレイト
pub trait RecordBatchExt {
    /// 正常にパースされたレコードの生テキストを取得
    ///
    /// パース失敗として報告されたレコードは含めない。
    fn texts(&self) -> Vec<&str>;

    /// 正常にパースされたレコードを JSON として型 T に変換
    ///
    /// パース失敗として報告済みのレコードは飛ばす。正常なレコードの
    /// 変換 (型の不一致など) に失敗した場合はエラーを返す。
    fn typed<T>(&self) -> Result<Vec<T>, nojson::JsonParseError>
    where
        for<'text, 'raw> T:
            TryFrom<nojson::RawJsonValue<'text, 'raw>, Error = nojson::JsonParseError>;
}

impl RecordBatchExt for [RecordResult] {
    fn texts(&self) -> Vec<&str> {
        self.iter()
            .filter_map(|result| result.as_ref().ok())
            .map(|record| record.as_str())
            .collect()
    }

    fn typed<T>(&self) -> Result<Vec<T>, nojson::JsonParseError>
    where
        for<'text, 'raw> T:
            TryFrom<nojson::RawJsonValue<'text, 'raw>, Error = nojson::JsonParseError>,
    {
        let mut values = Vec::new();
        for result in self {
            if let Ok(record) = result {
                let raw = nojson::RawJson::parse(record.as_str())?;
                values.push(raw.value().try_into()?);
            }
        }
        Ok(values)
    }
}
