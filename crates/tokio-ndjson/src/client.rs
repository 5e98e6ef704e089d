//! ストリーミング NDJSON クライアント
//!
//! tokio と tokio-rustls を使用した非同期クライアント。レスポンスボディ
//! 全体を待たず、チャンクが到着するたびにパース済みレコードのバッチを
//! 取り出せる。
//!
//! ## 使い方
//!
//! ```ignore
//! use tokio_ndjson::Client;
//!
//! let client = Client::new();
//! let mut stream = client.get("http://example.com/live").await?;
//!
//! while let Some(batch) = stream.next_batch().await? {
//!     for result in batch {
//!         match result {
//!             Ok(record) => println!("#{}: {}", record.ordinal(), record.as_str()),
//!             Err(failure) => eprintln!("skip #{}: {}", failure.ordinal(), failure),
//!         }
//!     }
//! }
//!
//! let completion = stream.completion().expect("stream is finished");
//! println!("status={} transport={}", completion.status_code, completion.transport);
//! ```

use std::future::IntoFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use shiguredo_ndjson::uri::{Uri, percent_encode};
use shiguredo_ndjson::{Completion, RecordDecoder, RecordResult, Request, TransportCapability};

use crate::error::{Error, Result};
use crate::selector::TransportSelector;
use crate::transport::{NativeStreamTransport, PollingConnector, PollingHandle, StreamHandle};

/// ストリーミング NDJSON クライアント
///
/// HTTP と HTTPS の両方に対応。HTTPS を使用する場合は `tls_config()` で
/// TLS 設定を指定するか、OS のルート証明書ストアに任せる。
#[derive(Clone)]
pub struct Client {
    connect_timeout: Duration,
    read_timeout: Duration,
    tls_config: Option<Arc<ClientConfig>>,
    selector: Arc<TransportSelector>,
    polling_connector: Option<Arc<dyn PollingConnector>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// 新しいクライアントを作成
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            tls_config: None,
            selector: Arc::new(TransportSelector::native()),
            polling_connector: None,
        }
    }

    /// TLS 設定を指定 (HTTPS 用)
    pub fn tls_config(mut self, config: Arc<ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// 接続タイムアウトを設定
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 読み取りタイムアウトを設定
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// トランスポートセレクタを差し替える
    pub fn selector(mut self, selector: TransportSelector) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// ポーリングコネクタを設定
    ///
    /// セレクタがポーリング系トランスポートを選んだ場合に使われる。
    pub fn polling_connector(mut self, connector: Arc<dyn PollingConnector>) -> Self {
        self.polling_connector = Some(connector);
        self
    }

    /// GET リクエストを作成
    pub fn get(&self, url: &str) -> RequestBuilder<'_> {
        self.request("GET", url)
    }

    /// POST リクエストを作成
    pub fn post(&self, url: &str) -> RequestBuilder<'_> {
        self.request("POST", url)
    }

    /// 任意のメソッドでリクエストを作成
    pub fn request(&self, method: &str, url: &str) -> RequestBuilder<'_> {
        RequestBuilder {
            client: self,
            method: method.to_string(),
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            query_params: Vec::new(),
            credentials: None,
        }
    }

    async fn open_stream(&self, request: Request, url: &str) -> Result<RecordStream> {
        let capability = self.selector.select();

        let handle = match capability {
            TransportCapability::NativeStream => {
                let (scheme, host, port, _path) = parse_url(url)?;
                let transport = NativeStreamTransport::start(
                    &host,
                    port,
                    scheme == "https",
                    self.tls_config.clone(),
                    &request,
                    self.connect_timeout,
                    self.read_timeout,
                )
                .await?;
                StreamHandle::Native(transport)
            }
            TransportCapability::PollingBinary | TransportCapability::PollingText => {
                let connector = self
                    .polling_connector
                    .as_ref()
                    .ok_or(Error::TransportUnavailable(capability))?;
                StreamHandle::Polling(PollingHandle::start(
                    connector.as_ref(),
                    request,
                    capability,
                ))
            }
            TransportCapability::Unsupported => {
                return Err(Error::TransportUnavailable(capability));
            }
        };

        Ok(RecordStream {
            handle,
            decoder: RecordDecoder::new(),
            completion: None,
            finished: false,
        })
    }
}

/// 資格情報
enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

/// リクエストビルダー
///
/// Client のメソッド (get, post など) から取得し、ヘッダーやボディを
/// 追加してから `.await` でストリームを開始する。
pub struct RequestBuilder<'a> {
    client: &'a Client,
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    query_params: Vec<(String, String)>,
    credentials: Option<Credentials>,
}

impl<'a> RequestBuilder<'a> {
    /// ヘッダーを追加
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// クエリパラメータを追加
    ///
    /// 複数回呼び出すと追加される。URL に既存のクエリパラメータがある
    /// 場合はそれに追加される。
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in params {
            self.query_params
                .push((key.as_ref().to_string(), value.as_ref().to_string()));
        }
        self
    }

    /// ボディを設定
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Basic 認証の資格情報を設定
    pub fn basic_auth(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    /// Bearer トークンの資格情報を設定
    pub fn bearer_auth(mut self, token: &str) -> Self {
        self.credentials = Some(Credentials::Bearer(token.to_string()));
        self
    }

    /// ストリームを開始する
    async fn send(self) -> Result<RecordStream> {
        let (_, host, port, path) = parse_url(&self.url)?;
        let path_with_query = build_path_with_query(path, &self.query_params);

        let host_value = if port == 80 || port == 443 {
            host.clone()
        } else {
            format!("{}:{}", host, port)
        };

        let mut request = Request::new(&self.method, &path_with_query);

        // Host ヘッダーを最初に設定 (ユーザーが上書き可能)
        let has_host = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("Host"));
        if !has_host {
            request = request.header("Host", &host_value);
        }

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        match &self.credentials {
            Some(Credentials::Basic { username, password }) => {
                request = request.basic_auth(username, password);
            }
            Some(Credentials::Bearer(token)) => {
                request = request.bearer_auth(token);
            }
            None => {}
        }

        if let Some(body) = self.body {
            request = request.body(body);
        }

        self.client.open_stream(request, &self.url).await
    }
}

impl<'a> IntoFuture for RequestBuilder<'a> {
    type Output = Result<RecordStream>;
    type IntoFuture = Pin<Box<dyn std::future::Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.send())
    }
}

/// パース済みレコードのストリーム
///
/// `next_batch()` でチャンク到着ごとのバッチを取り出し、ストリームが
/// 終了したら `completion()` で完了通知を取得する。
pub struct RecordStream {
    handle: StreamHandle,
    decoder: RecordDecoder,
    completion: Option<Completion>,
    finished: bool,
}

impl RecordStream {
    /// ストリームを配信しているトランスポート
    pub fn transport(&self) -> TransportCapability {
        self.handle.capability()
    }

    /// 次のバッチを取り出す
    ///
    /// レコードが 1 件も完成しなかったチャンクは読み飛ばし、空でない
    /// バッチか終了まで待つ。ストリーム終了後は `None` を返す。
    /// パース失敗はバッチ内の `Err` 要素として報告され、ストリーム自体は
    /// 継続する。
    pub async fn next_batch(&mut self) -> Result<Option<Vec<RecordResult>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let chunk = match self.handle.read_next().await {
                Ok(chunk) => chunk,
                Err(Error::Aborted) => {
                    self.finish_terminated();
                    return Ok(None);
                }
                Err(e) => {
                    self.finish_terminated();
                    return Err(e);
                }
            };

            let done = chunk.done;
            let batch = match self.decoder.decode(&chunk) {
                Ok(batch) => batch,
                Err(e) => {
                    self.finish_terminated();
                    return Err(e.into());
                }
            };

            if done {
                self.finished = true;
                self.completion = Some(self.handle.completion());
                if batch.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(batch));
            }
            if !batch.is_empty() {
                return Ok(Some(batch));
            }
            // レコードが完成しなかったチャンクはバッチにしない
        }
    }

    /// 完了通知を取得 (ストリーム終了前は `None`)
    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// ストリームを中断する
    ///
    /// 持ち越し中の不完全なレコード断片は破棄され、完了通知は
    /// ステータスコード 0 の中断扱いになる。
    pub async fn abort(&mut self) {
        if self.finished {
            return;
        }
        self.handle.abort().await;
        self.finish_terminated();
    }

    fn finish_terminated(&mut self) {
        self.finished = true;
        self.decoder.abort();
        self.completion = Some(Completion::terminated(self.handle.capability()));
    }
}

/// クエリパラメータを含むパスを構築
fn build_path_with_query(path: String, query_params: &[(String, String)]) -> String {
    if query_params.is_empty() {
        return path;
    }

    let query_string = query_params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    if path.contains('?') {
        format!("{}&{}", path, query_string)
    } else {
        format!("{}?{}", path, query_string)
    }
}

/// URL をパース
///
/// shiguredo_ndjson::uri::Uri を使用して URL をパースし、
/// (scheme, host, port, path) のタプルを返す。
pub fn parse_url(url: &str) -> Result<(String, String, u16, String)> {
    let uri = Uri::parse(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let scheme = uri
        .scheme()
        .ok_or_else(|| Error::InvalidUrl("URL must have a scheme".to_string()))?;

    if scheme != "http" && scheme != "https" {
        return Err(Error::InvalidUrl(
            "URL must start with http:// or https://".to_string(),
        ));
    }

    let host = uri
        .host()
        .ok_or_else(|| Error::InvalidUrl("URL must have a host".to_string()))?;

    let port = uri
        .port()
        .unwrap_or(if scheme == "https" { 443 } else { 80 });

    let path = if uri.path().is_empty() {
        "/".to_string()
    } else {
        uri.origin_form()
    };

    Ok((scheme.to_string(), host.to_string(), port, path))
}
