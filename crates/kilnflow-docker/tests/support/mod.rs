//! テスト用モックデーモン
//!
//! Unixソケット上でスクリプト化したHTTP/1.1応答を返します。コネクション
//! プールによる再利用を考慮し、1接続で複数リクエストを処理します。

#![cfg(unix)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

/// テストログの初期化（`RUST_LOG` で制御、多重呼び出し可）
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct MockDaemon {
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<String>>>,
    _tempdir: TempDir,
}

impl MockDaemon {
    /// スクリプト化した応答列でモックデーモンを起動
    ///
    /// 応答はリクエスト到着順に1つずつ消費されます。
    pub async fn start(responses: Vec<Vec<u8>>) -> Self {
        let tempdir = tempfile::tempdir().unwrap();
        let socket_path = tempdir.path().join("mock-docker.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let accept_queue = queue.clone();
        let accept_requests = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let queue = accept_queue.clone();
                let requests = accept_requests.clone();
                tokio::spawn(async move {
                    handle_connection(stream, queue, requests).await;
                });
            }
        });

        Self {
            socket_path,
            requests,
            _tempdir: tempdir,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// 受信したリクエストヘッド（リクエストライン + ヘッダ）を到着順で返す
    pub fn request_heads(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle_connection(
    mut stream: UnixStream,
    queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    requests: Arc<Mutex<Vec<String>>>,
) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        // ヘッダ終端まで読む
        let head_end = loop {
            if let Some(pos) = find_header_end(&buffer) {
                break pos;
            }
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            }
        };

        let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
        let content_length = parse_content_length(&head);

        // ボディを読み切ってからでないと応答を書けないクライアントがある
        let total = head_end + 4 + content_length;
        while buffer.len() < total {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            }
        }
        buffer.drain(..total);

        requests.lock().unwrap().push(head);

        let response = queue.lock().unwrap().pop_front();
        match response {
            Some(bytes) => {
                if stream.write_all(&bytes).await.is_err() {
                    return;
                }
                stream.flush().await.ok();
            }
            None => return,
        }
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}

/// JSON Lines をチャンク転送エンコーディングで返す200応答
pub fn chunked_json_lines(lines: &[&str]) -> Vec<u8> {
    let mut response = Vec::new();
    response.extend_from_slice(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n",
    );
    for line in lines {
        let payload = format!("{}\n", line);
        response.extend_from_slice(format!("{:x}\r\n", payload.len()).as_bytes());
        response.extend_from_slice(payload.as_bytes());
        response.extend_from_slice(b"\r\n");
    }
    response.extend_from_slice(b"0\r\n\r\n");
    response
}

/// 終端チャンクを送らず、接続を開いたままにするチャンク応答
pub fn open_ended_chunked_json_lines(lines: &[&str]) -> Vec<u8> {
    let mut response = chunked_json_lines(lines);
    // 末尾の "0\r\n\r\n" を落とす
    response.truncate(response.len() - 5);
    response
}

/// Content-Length 付きの通常応答
pub fn response_with_body(status: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )
    .into_bytes()
}

/// ボディなしの応答（204等）
pub fn empty_response(status: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {} {}\r\n\r\n", status, reason).into_bytes()
}
