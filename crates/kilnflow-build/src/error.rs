use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Dockerfileが見つかりません: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("ビルドコンテキストが見つかりません: {0}")]
    ContextNotFound(PathBuf),

    #[error(
        "パスがビルドツリーの外を指しています: {path}\n許可されたルート: {root}"
    )]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("ビルドに失敗しました: {0}")]
    BuildFailed(String),

    #[error("プッシュに失敗しました: {0}")]
    PushFailed(String),

    #[error("無効なタグ: {0}")]
    InvalidTag(String),

    #[error("無効なビルド設定: {0}")]
    InvalidConfig(String),

    #[error("Docker接続エラー: {0}")]
    Docker(#[from] kilnflow_docker::DockerError),

    #[error("認証エラー: {0}")]
    Auth(#[from] kilnflow_registry::AuthError),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;
