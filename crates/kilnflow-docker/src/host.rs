//! デーモンアドレスの解決
//!
//! `DOCKER_HOST` は `unix://` / `npipe://` 形式を受け付けます。未設定なら
//! プラットフォーム既定（`/var/run/docker.sock` / `\\.\pipe\docker_engine`）。

use crate::error::{DockerError, Result};
use std::path::PathBuf;

/// デーモンのローカルIPCエンドポイント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonAddress {
    /// Unixドメインソケットのファイルパス
    Unix(PathBuf),
    /// Windows名前付きパイプのパス
    Npipe(String),
}

impl DaemonAddress {
    /// `DOCKER_HOST` から解決。未設定ならプラットフォーム既定を返す
    pub fn from_env() -> Result<Self> {
        match std::env::var("DOCKER_HOST") {
            Ok(value) if !value.is_empty() => Self::parse(&value),
            _ => Ok(Self::platform_default()),
        }
    }

    pub fn platform_default() -> Self {
        #[cfg(windows)]
        {
            DaemonAddress::Npipe(r"\\.\pipe\docker_engine".to_string())
        }
        #[cfg(not(windows))]
        {
            DaemonAddress::Unix(PathBuf::from("/var/run/docker.sock"))
        }
    }

    /// `unix:///var/run/docker.sock` / `npipe:////./pipe/docker_engine` をパース
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockerError::UnsupportedAddress(url.to_string()));
            }
            return Ok(DaemonAddress::Unix(PathBuf::from(path)));
        }

        if let Some(path) = url.strip_prefix("npipe://") {
            if path.is_empty() {
                return Err(DockerError::UnsupportedAddress(url.to_string()));
            }
            // npipe:////./pipe/name → \\.\pipe\name
            let pipe = path.replace('/', "\\");
            return Ok(DaemonAddress::Npipe(pipe));
        }

        // TCP等はこのレイヤの対象外
        Err(DockerError::UnsupportedAddress(url.to_string()))
    }

    /// リクエストURIに使う合成スキーム
    pub fn scheme(&self) -> &'static str {
        match self {
            DaemonAddress::Unix(_) => "unix",
            DaemonAddress::Npipe(_) => "npipe",
        }
    }
}
