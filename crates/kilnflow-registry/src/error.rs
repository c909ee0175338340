use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("認証情報の復号に失敗しました: {0}")]
    Decryption(String),

    #[error(
        "credential helper '{helper}' の実行に失敗しました: {message}\n\nヒント:\n  • docker-credential-{helper} が PATH にあるか確認してください"
    )]
    Helper { helper: String, message: String },

    #[error("credential helper の応答が不正です: {0}")]
    MalformedResponse(String),

    #[error("認証設定の読み込みに失敗しました: {path}\n理由: {message}")]
    ConfigRead { path: PathBuf, message: String },

    #[error("無効な認証情報: {0}")]
    InvalidCredential(String),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;
