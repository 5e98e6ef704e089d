//! ストリーミングクライアントの統合テスト
//!
//! ループバックの TCP サーバーから chunked エンコーディングで NDJSON を
//! 配信し、レコードがボディ完了を待たずに取り出せることを確認する。

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_ndjson::{
    Client, EnvironmentProbe, Error, PollingConnector, Request, SnapshotListener,
    TransportCapability, TransportSelector,
};

/// リクエストヘッダーを読み捨てる
async fn drain_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        if n == 0 {
            break;
        }
        buf.push(byte[0]);
    }
}

/// chunked エンコーディングで 1 チャンク書き込む
async fn write_chunk(stream: &mut TcpStream, data: &[u8]) {
    let framed = format!("{:x}\r\n", data.len());
    stream.write_all(framed.as_bytes()).await.unwrap();
    stream.write_all(data).await.unwrap();
    stream.write_all(b"\r\n").await.unwrap();
}

async fn write_terminal_chunk(stream: &mut TcpStream) {
    stream.write_all(b"0\r\n\r\n").await.unwrap();
}

#[tokio::test]
async fn records_arrive_before_body_completes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (first_batch_read_tx, first_batch_read_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        write_chunk(&mut stream, b"{\"chunk\":0,\"entry\":0}\n{\"chunk\":0,\"entry\":1}\n").await;

        // クライアントが最初のバッチを読み終えるまで後続を送らない
        first_batch_read_rx.await.unwrap();
        write_chunk(&mut stream, b"{\"chunk\":1,\"entry\":0}\n").await;
        write_terminal_chunk(&mut stream).await;
    });

    let client = Client::new();
    let mut stream = client
        .get(&format!("http://127.0.0.1:{}/chunked-response", addr.port()))
        .await
        .unwrap();

    assert_eq!(stream.transport(), TransportCapability::NativeStream);

    // ボディがまだ終わっていない時点で最初のチャンクのレコードが得られる
    let mut texts = Vec::new();
    while texts.len() < 2 {
        let batch = stream.next_batch().await.unwrap().unwrap();
        for result in batch {
            texts.push(result.unwrap().as_str().to_string());
        }
    }
    assert_eq!(
        texts,
        vec!["{\"chunk\":0,\"entry\":0}", "{\"chunk\":0,\"entry\":1}"]
    );
    first_batch_read_tx.send(()).unwrap();

    let batch = stream.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].as_ref().unwrap().as_str(), "{\"chunk\":1,\"entry\":0}");
    assert_eq!(batch[0].as_ref().unwrap().ordinal(), 2);

    assert!(stream.next_batch().await.unwrap().is_none());

    let completion = stream.completion().unwrap();
    assert_eq!(completion.status_code, 200);
    assert_eq!(completion.transport.as_str(), "native-stream");
    assert_eq!(
        completion.head.as_ref().unwrap().get_header("Content-Type"),
        Some("application/x-ndjson")
    );

    server.await.unwrap();
}

#[tokio::test]
async fn record_split_across_network_chunks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        // レコードをチャンク境界で分断して送る
        write_chunk(&mut stream, b"{\"chunk\":\"#1\",\"da").await;
        write_chunk(&mut stream, b"ta\":\"a\"}\n").await;
        write_terminal_chunk(&mut stream).await;
    });

    let client = Client::new();
    let mut stream = client
        .get(&format!("http://127.0.0.1:{}/split-chunked-response", addr.port()))
        .await
        .unwrap();

    let mut texts = Vec::new();
    while let Some(batch) = stream.next_batch().await.unwrap() {
        for result in batch {
            texts.push(result.unwrap().as_str().to_string());
        }
    }
    assert_eq!(texts, vec!["{\"chunk\":\"#1\",\"data\":\"a\"}"]);

    server.await.unwrap();
}

#[tokio::test]
async fn error_status_still_streams_records() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        write_chunk(&mut stream, b"{\"error\":\"boom\"}\n").await;
        write_terminal_chunk(&mut stream).await;
    });

    let client = Client::new();
    let mut stream = client
        .get(&format!("http://127.0.0.1:{}/error-response", addr.port()))
        .await
        .unwrap();

    let batch = stream.next_batch().await.unwrap().unwrap();
    assert_eq!(batch[0].as_ref().unwrap().as_str(), "{\"error\":\"boom\"}");
    assert!(stream.next_batch().await.unwrap().is_none());

    let completion = stream.completion().unwrap();
    assert_eq!(completion.status_code, 500);
    assert!(!completion.is_success());

    server.await.unwrap();
}

#[tokio::test]
async fn malformed_record_is_isolated_over_the_wire() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        write_chunk(&mut stream, b"{\"ok\":1}\nnot json\n{\"ok\":2}\n").await;
        write_terminal_chunk(&mut stream).await;
    });

    let client = Client::new();
    let mut stream = client
        .get(&format!("http://127.0.0.1:{}/mixed", addr.port()))
        .await
        .unwrap();

    let batch = stream.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.len(), 3);
    assert!(batch[0].is_ok());
    assert!(batch[1].is_err());
    assert!(batch[2].is_ok());

    assert!(stream.next_batch().await.unwrap().is_none());
    assert_eq!(stream.completion().unwrap().status_code, 200);

    server.await.unwrap();
}

#[tokio::test]
async fn abort_mid_stream_terminates_with_status_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drain_request(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
            .await
            .unwrap();
        write_chunk(&mut stream, b"{\"chunk\":0}\n{\"partial\":").await;
        // 終端チャンクは送らず、クライアント側の中断を待つ
        let mut buf = [0u8; 1];
        let _ = stream.read(&mut buf).await;
    });

    let client = Client::new();
    let mut stream = client
        .get(&format!("http://127.0.0.1:{}/live", addr.port()))
        .await
        .unwrap();

    let batch = stream.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);

    stream.abort().await;

    let completion = stream.completion().unwrap();
    assert_eq!(completion.status_code, 0);
    assert_eq!(completion.transport, TransportCapability::NativeStream);

    // 中断後の読み取りは終了扱い
    assert!(stream.next_batch().await.unwrap().is_none());
}

/// スクリプト化されたポーリングソース
///
/// 累積スナップショットを順に届けてから正常終了を通知する。
struct ScriptedSource;

impl PollingConnector for ScriptedSource {
    fn start(&self, _request: Request, listener: SnapshotListener) {
        tokio::spawn(async move {
            listener.binary_snapshot(b"{\"chunk\":0}\n");
            listener.binary_snapshot(b"{\"chunk\":0}\n{\"chunk\":1}\n{\"chu");
            listener.binary_snapshot(b"{\"chunk\":0}\n{\"chunk\":1}\n{\"chunk\":2}\n");
            listener.finished(200, None);
        });
    }
}

#[tokio::test]
async fn polling_transport_diffs_cumulative_snapshots() {
    let mut selector = TransportSelector::native();
    selector.reset_for_testing(EnvironmentProbe {
        polling_binary: true,
        ..EnvironmentProbe::none()
    });

    let client = Client::new()
        .selector(selector)
        .polling_connector(Arc::new(ScriptedSource));

    let mut stream = client.get("http://example.invalid/live").await.unwrap();
    assert_eq!(stream.transport(), TransportCapability::PollingBinary);

    let mut texts = Vec::new();
    while let Some(batch) = stream.next_batch().await.unwrap() {
        for result in batch {
            texts.push(result.unwrap().as_str().to_string());
        }
    }
    assert_eq!(
        texts,
        vec!["{\"chunk\":0}", "{\"chunk\":1}", "{\"chunk\":2}"]
    );

    let completion = stream.completion().unwrap();
    assert_eq!(completion.status_code, 200);
    assert_eq!(completion.transport.as_str(), "polling-binary");
}

#[tokio::test]
async fn unsupported_environment_is_rejected_upfront() {
    let mut selector = TransportSelector::native();
    selector.reset_for_testing(EnvironmentProbe::none());

    let client = Client::new().selector(selector);
    let result = client.get("http://example.invalid/live").await;
    assert!(matches!(
        result,
        Err(Error::TransportUnavailable(TransportCapability::Unsupported))
    ));
}

#[tokio::test]
async fn polling_without_connector_is_unavailable() {
    let mut selector = TransportSelector::native();
    selector.reset_for_testing(EnvironmentProbe {
        polling_text: true,
        ..EnvironmentProbe::none()
    });

    let client = Client::new().selector(selector);
    let result = client.get("http://example.invalid/live").await;
    assert!(matches!(
        result,
        Err(Error::TransportUnavailable(TransportCapability::PollingText))
    ));
}
