//! ネイティブストリーミングトランスポート
//!
//! tokio の TCP/TLS ソケットから直接 pull 読み取りする最優先の戦略。
//! レスポンスヘッダーをデコードした後、ボディを到着順にチャンクとして
//! 取り出す。

use std::sync::Arc;
use std::time::Duration;

use rustls::ClientConfig;
use rustls_pki_types::ServerName;
use shiguredo_ndjson::{RawChunk, Request, ResponseDecoder, ResponseHead, TransportCapability};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};

/// OS のルート証明書ストアを使用するデフォルトの TLS 設定を作成
fn default_tls_config() -> Arc<ClientConfig> {
    Arc::new(
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(rustls_platform_verifier::Verifier::new()))
            .with_no_client_auth(),
    )
}

enum ConnectionStream {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl ConnectionStream {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            ConnectionStream::Plain(stream) => stream.read(buf).await,
            ConnectionStream::Tls(stream) => stream.read(buf).await,
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self {
            ConnectionStream::Plain(stream) => stream.write_all(data).await,
            ConnectionStream::Tls(stream) => stream.write_all(data).await,
        }
    }

    async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            ConnectionStream::Plain(stream) => AsyncWriteExt::shutdown(stream).await,
            ConnectionStream::Tls(stream) => AsyncWriteExt::shutdown(stream.as_mut()).await,
        }
    }
}

/// ネイティブストリーミングトランスポート
pub struct NativeStreamTransport {
    stream: ConnectionStream,
    decoder: ResponseDecoder,
    head: Option<ResponseHead>,
    read_timeout: Duration,
    finished: bool,
    aborted: bool,
}

impl NativeStreamTransport {
    /// 接続を確立してリクエストを送信し、レスポンスヘッダーまで読み進める
    pub async fn start(
        host: &str,
        port: u16,
        use_tls: bool,
        tls_config: Option<Arc<ClientConfig>>,
        request: &Request,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await??;

        let stream = if use_tls {
            let tls_config = tls_config.unwrap_or_else(default_tls_config);
            let connector = TlsConnector::from(tls_config);
            let server_name = ServerName::try_from(host.to_string())?;
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| Error::Tls(e.to_string()))?;
            ConnectionStream::Tls(Box::new(tls_stream))
        } else {
            ConnectionStream::Plain(stream)
        };

        let mut transport = Self {
            stream,
            decoder: ResponseDecoder::new(),
            head: None,
            read_timeout,
            finished: false,
            aborted: false,
        };

        transport.stream.write_all(&request.encode()).await?;
        transport.read_head().await?;
        Ok(transport)
    }

    /// レスポンスヘッダーが揃うまで読み取る
    async fn read_head(&mut self) -> Result<()> {
        let mut buf = [0u8; 8192];
        loop {
            if let Some((head, _body_kind)) = self.decoder.decode_head()? {
                self.head = Some(head);
                return Ok(());
            }

            let n = tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await??;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            self.decoder.feed(&buf[..n])?;
        }
    }

    /// レスポンスヘッダーを取得
    pub fn response_head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// トランスポート識別
    pub fn capability(&self) -> TransportCapability {
        TransportCapability::NativeStream
    }

    /// 次のチャンクを読み取る
    ///
    /// 最終チャンクは `done=true` で返し、以降の呼び出しは
    /// [`Error::StreamFinished`] で即座に失敗する。
    pub async fn read_next(&mut self) -> Result<RawChunk> {
        if self.aborted {
            return Err(Error::Aborted);
        }
        if self.finished {
            return Err(Error::StreamFinished);
        }

        let mut buf = [0u8; 8192];
        loop {
            if let Some(data) = self.decoder.next_body()? {
                if self.decoder.is_complete() {
                    self.finished = true;
                    return Ok(RawChunk::final_binary(data));
                }
                return Ok(RawChunk::binary(data));
            }
            if self.decoder.is_complete() {
                self.finished = true;
                return Ok(RawChunk::end());
            }

            let n = tokio::time::timeout(self.read_timeout, self.stream.read(&mut buf)).await??;
            if n == 0 {
                self.decoder.mark_eof();
                if let Some(data) = self.decoder.next_body()? {
                    self.finished = true;
                    if self.decoder.is_complete() {
                        return Ok(RawChunk::final_binary(data));
                    }
                    // フレーミング上は未完だが接続は閉じた
                    return Err(Error::ConnectionClosed);
                }
                self.finished = true;
                if self.decoder.is_complete() {
                    return Ok(RawChunk::end());
                }
                return Err(Error::ConnectionClosed);
            }
            self.decoder.feed(&buf[..n])?;
        }
    }

    /// ストリームを中断し、接続を閉じる
    pub async fn abort(&mut self) {
        if self.aborted || self.finished {
            return;
        }
        self.aborted = true;
        let _ = self.stream.shutdown().await;
    }
}
