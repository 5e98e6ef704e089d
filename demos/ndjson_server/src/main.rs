//! ストリーミング NDJSON 配信サーバーの例
//!
//! tokio_ndjson クライアントの動作確認用に、chunked エンコーディングで
//! NDJSON を逐次配信する。
//!
//! 使い方:
//!   cargo run -p ndjson_server -- --port 2001
//!
//! ルート:
//!   /chunked-response?numChunks=N&entriesPerChunk=M&delayBetweenChunks=D
//!       N 個のチャンクを D ミリ秒間隔で送る。各チャンクは M レコード
//!   /split-chunked-response
//!       レコードをネットワークチャンク境界で分断して送る
//!   /echo-response
//!       リクエストボディをそのまま chunked で返す
//!   /error-response
//!       ステータス 500 で NDJSON ボディを返す

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = noargs::raw_args();
    args.metadata_mut().app_name = "ndjson_server";

    noargs::HELP_FLAG.take_help(&mut args);

    let port: u16 = noargs::opt("port")
        .short('p')
        .default("2001")
        .doc("Port to listen on")
        .take(&mut args)
        .then(|o| o.value().parse())
        .map_err(|e| format!("{:?}", e))?;

    if let Some(help) = args.finish().map_err(|e| format!("{:?}", e))? {
        print!("{}", help);
        return Ok(());
    }

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    println!("listening on 127.0.0.1:{}", port);

    loop {
        let (stream, addr) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream).await {
                eprintln!("{}: {}", addr, e);
            }
        });
    }
}

struct ParsedRequest {
    path: String,
    query: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ParsedRequest {
    fn query_usize(&self, name: &str, default: usize) -> usize {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(default)
    }
}

async fn handle_connection(mut stream: TcpStream) -> std::io::Result<()> {
    let request = read_request(&mut stream).await?;
    println!("{}", request.path);

    match request.path.as_str() {
        "/chunked-response" => chunked_response(&mut stream, &request).await,
        "/split-chunked-response" => split_chunked_response(&mut stream).await,
        "/echo-response" => echo_response(&mut stream, &request).await,
        "/error-response" => error_response(&mut stream).await,
        _ => not_found(&mut stream).await,
    }
}

/// リクエストヘッダー (と Content-Length 分のボディ) を読み取る
async fn read_request(stream: &mut TcpStream) -> std::io::Result<ParsedRequest> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        buf.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&buf);
    let target = head
        .lines()
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .unwrap_or("/")
        .to_string();

    let content_length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("Content-Length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        stream.read_exact(&mut body).await?;
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => {
            let query = query
                .split('&')
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    Some((k.to_string(), v.to_string()))
                })
                .collect();
            (path.to_string(), query)
        }
        None => (target, Vec::new()),
    };

    Ok(ParsedRequest { path, query, body })
}

async fn write_head(stream: &mut TcpStream, status_line: &str) -> std::io::Result<()> {
    stream
        .write_all(
            format!(
                "{}\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\n\r\n",
                status_line
            )
            .as_bytes(),
        )
        .await
}

async fn write_chunk(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    stream
        .write_all(format!("{:x}\r\n", data.len()).as_bytes())
        .await?;
    stream.write_all(data).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

async fn write_terminal_chunk(stream: &mut TcpStream) -> std::io::Result<()> {
    stream.write_all(b"0\r\n\r\n").await
}

async fn chunked_response(stream: &mut TcpStream, request: &ParsedRequest) -> std::io::Result<()> {
    let num_chunks = request.query_usize("numChunks", 4);
    let entries_per_chunk = request.query_usize("entriesPerChunk", 3);
    let delay = request.query_usize("delayBetweenChunks", 50);

    write_head(stream, "HTTP/1.1 200 OK").await?;
    for chunk in 0..num_chunks {
        let mut payload = String::new();
        for entry in 0..entries_per_chunk {
            payload.push_str(&format!("{{\"chunk\":{},\"entry\":{}}}\n", chunk, entry));
        }
        write_chunk(stream, payload.as_bytes()).await?;
        if delay > 0 && chunk + 1 < num_chunks {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
    }
    write_terminal_chunk(stream).await
}

/// レコードをチャンク境界で分断して送る
///
/// デコーダーのトレーラー再組み立てを通さないと正しく読めない形。
async fn split_chunked_response(stream: &mut TcpStream) -> std::io::Result<()> {
    write_head(stream, "HTTP/1.1 200 OK").await?;

    let records = "{\"chunk\":\"#1\",\"data\":\"a\"}\n{\"chunk\":\"#2\",\"data\":\"b\"}\n";
    let split = records.len() / 2;
    write_chunk(stream, &records.as_bytes()[..split]).await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    write_chunk(stream, &records.as_bytes()[split..]).await?;
    write_terminal_chunk(stream).await
}

async fn echo_response(stream: &mut TcpStream, request: &ParsedRequest) -> std::io::Result<()> {
    write_head(stream, "HTTP/1.1 200 OK").await?;
    if !request.body.is_empty() {
        write_chunk(stream, &request.body).await?;
    }
    write_terminal_chunk(stream).await
}

async fn error_response(stream: &mut TcpStream) -> std::io::Result<()> {
    write_head(stream, "HTTP/1.1 500 Internal Server Error").await?;
    write_chunk(stream, b"{\"error\":\"expected failure\"}\n").await?;
    write_terminal_chunk(stream).await
}

async fn not_found(stream: &mut TcpStream) -> std::io::Result<()> {
    stream
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
        .await
}
