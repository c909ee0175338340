use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error(
        "Dockerデーモンに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • DOCKER_HOST がソケットパスを指しているか確認してください"
    )]
    Connection(String),

    #[error("Docker APIエラー (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("ストリームエラー: {0}")]
    Stream(String),

    #[error("サポートされないデーモンアドレス: {0}")]
    UnsupportedAddress(String),

    #[error("認証エラー: {0}")]
    Auth(#[from] kilnflow_registry::AuthError),

    #[error("HTTPエラー: {0}")]
    Http(String),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl DockerError {
    /// デーモン到達不能（トランスポート層）のエラーか
    ///
    /// このレイヤはリトライしません。リトライ方針は呼び出し側の責務です。
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DockerError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, DockerError>;
