//! IPCトランスポート
//!
//! デーモンへのHTTP/1.1をTCPではなくローカルIPC（Unixソケット / 名前付き
//! パイプ）の上に乗せます。リクエストURIは合成ホスト `docker` に対する
//! `unix://` / `npipe://` 形式で、コネクタが認証局部分を無視して設定済みの
//! IPCパスへダイヤルします。
//!
//! クライアント構築時にはソケットへ触れません。パスが存在しない場合の失敗は
//! 最初のリクエストで初めて表面化します。複数回のデーモン探索が同じビルダー
//! を共有できるようにするためです。診断出力は `tracing` シンクに流れます。

use crate::error::{DockerError, Result};
use crate::host::DaemonAddress;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Uri;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// デーモンへのIPC接続（プラットフォーム別）
pub enum IpcStream {
    #[cfg(unix)]
    Unix(TokioIo<tokio::net::UnixStream>),
    #[cfg(windows)]
    Npipe(TokioIo<tokio::net::windows::named_pipe::NamedPipeClient>),
}

impl hyper::rt::Read for IpcStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            IpcStream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(windows)]
            IpcStream::Npipe(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl hyper::rt::Write for IpcStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            #[cfg(unix)]
            IpcStream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(windows)]
            IpcStream::Npipe(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            IpcStream::Unix(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(windows)]
            IpcStream::Npipe(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            #[cfg(unix)]
            IpcStream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(windows)]
            IpcStream::Npipe(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl Connection for IpcStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

/// ソケット戦略のインターフェース
///
/// 実装はちょうど2つ（Unixソケット / 名前付きパイプ）で、OS判定により
/// トランスポート構築時に一度だけ選択されます。
pub trait Dialer: Send + Sync {
    /// リクエストURIに使うスキーム（"unix" または "npipe"）
    fn scheme(&self) -> &'static str;

    fn dial(&self) -> Pin<Box<dyn Future<Output = io::Result<IpcStream>> + Send + '_>>;
}

/// ファイルシステム上のUnixドメインソケットへダイヤルする戦略
#[cfg(unix)]
pub struct UnixDialer {
    path: std::path::PathBuf,
}

#[cfg(unix)]
impl UnixDialer {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self { path }
    }
}

#[cfg(unix)]
impl Dialer for UnixDialer {
    fn scheme(&self) -> &'static str {
        "unix"
    }

    fn dial(&self) -> Pin<Box<dyn Future<Output = io::Result<IpcStream>> + Send + '_>> {
        Box::pin(async move {
            let stream = tokio::net::UnixStream::connect(&self.path).await?;
            Ok(IpcStream::Unix(TokioIo::new(stream)))
        })
    }
}

/// Windows名前付きパイプへダイヤルする戦略
#[cfg(windows)]
pub struct NpipeDialer {
    path: String,
}

#[cfg(windows)]
impl NpipeDialer {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

#[cfg(windows)]
impl Dialer for NpipeDialer {
    fn scheme(&self) -> &'static str {
        "npipe"
    }

    fn dial(&self) -> Pin<Box<dyn Future<Output = io::Result<IpcStream>> + Send + '_>> {
        Box::pin(async move {
            let client = tokio::net::windows::named_pipe::ClientOptions::new()
                .open(&self.path)?;
            Ok(IpcStream::Npipe(TokioIo::new(client)))
        })
    }
}

/// プールされたHTTPクライアントにIPCダイヤルを差し込むコネクタ
///
/// URIの合成ホスト部は無視し、常に設定済みのIPCパスへ接続します。
#[derive(Clone)]
pub struct IpcConnector {
    dialer: Arc<dyn Dialer>,
}

impl tower_service::Service<Uri> for IpcConnector {
    type Response = IpcStream;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = io::Result<IpcStream>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _dst: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        Box::pin(async move { dialer.dial().await })
    }
}

/// IPCトランスポートのビルダー
pub struct TransportBuilder {
    address: DaemonAddress,
    max_connections: usize,
}

impl TransportBuilder {
    pub fn new(address: DaemonAddress) -> Self {
        Self {
            address,
            max_connections: 10,
        }
    }

    /// `DOCKER_HOST`（またはプラットフォーム既定）から構築
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DaemonAddress::from_env()?))
    }

    /// 同時接続数の上限（バックプレッシャの唯一の制御点）
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn build(self) -> Result<Transport> {
        let dialer: Arc<dyn Dialer> = match &self.address {
            #[cfg(unix)]
            DaemonAddress::Unix(path) => Arc::new(UnixDialer::new(path.clone())),
            #[cfg(windows)]
            DaemonAddress::Npipe(path) => Arc::new(NpipeDialer::new(path.clone())),
            #[allow(unreachable_patterns)]
            other => {
                return Err(DockerError::UnsupportedAddress(format!(
                    "{:?} はこのプラットフォームでは使えません",
                    other
                )));
            }
        };

        let scheme = dialer.scheme();
        tracing::debug!(
            "IPCトランスポートを構築します (scheme={}, max_connections={})",
            scheme,
            self.max_connections
        );

        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(self.max_connections)
            .build(IpcConnector { dialer });

        Ok(Transport {
            client,
            scheme,
            permits: Arc::new(Semaphore::new(self.max_connections)),
        })
    }
}

/// プールされたデーモン向けHTTPクライアント
///
/// 接続プールが唯一の共有リソースです。全プール接続が使用中のとき、新しい
/// 操作は即時失敗せず、許可の取得でブロックします。
#[derive(Clone)]
pub struct Transport {
    client: Client<IpcConnector, Full<Bytes>>,
    scheme: &'static str,
    permits: Arc<Semaphore>,
}

impl Transport {
    /// このトランスポートのリクエストURIスキーム
    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// 合成ホストに対するリクエストURIを構築
    pub fn uri(&self, path_and_query: &str) -> Result<Uri> {
        format!("{}://docker{}", self.scheme, path_and_query)
            .parse()
            .map_err(|e| DockerError::Http(format!("不正なURI: {}", e)))
    }

    /// 接続許可を取得（プール飽和時はここでブロックする）
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DockerError::Connection("接続プールが閉じられています".to_string()))
    }

    pub(crate) fn client(&self) -> &Client<IpcConnector, Full<Bytes>> {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_does_not_touch_socket() {
        // 存在しないパスでも構築は成功する（失敗は初回リクエストまで遅延）
        let transport = TransportBuilder::new(DaemonAddress::Unix(PathBuf::from(
            "/nonexistent/kilnflow.sock",
        )))
        .build()
        .unwrap();
        assert_eq!(transport.scheme(), "unix");
    }

    #[test]
    fn test_uri_uses_synthetic_host() {
        let transport = TransportBuilder::new(DaemonAddress::Unix(PathBuf::from(
            "/var/run/docker.sock",
        )))
        .build()
        .unwrap();

        let uri = transport.uri("/_ping").unwrap();
        assert_eq!(uri.scheme_str(), Some("unix"));
        assert_eq!(uri.host(), Some("docker"));
        assert_eq!(uri.path(), "/_ping");
    }
}
