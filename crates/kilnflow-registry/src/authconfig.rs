//! レジストリ認証ヘッダのエンコード
//!
//! デーモンの `X-Registry-Auth` ヘッダは base64(JSON) です。JSON のキー順は
//! serde のフィールド宣言順で固定されるため、同じ入力からは常にバイト一致の
//! ヘッダ値が得られます（テストの再現性とデーモンAPI互換のための要件）。

use crate::error::{AuthError, Result};
use base64::Engine;
use serde::Serialize;

/// 1レジストリ分の認証情報（構築後イミュータブル）
///
/// username/password/email から構築した場合、ワイヤ上の JSON には
/// その3キーだけが現れます。`auth` 複合フィールドは決して含めません。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthConfig {
    username: String,
    password: String,
    email: String,
    #[serde(rename = "identitytoken", skip_serializing_if = "Option::is_none")]
    identity_token: Option<String>,
}

impl AuthConfig {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            identity_token: None,
        }
    }

    /// base64エンコード済みの "user:pass" 文字列から構築
    ///
    /// デコード後、最初の `:` で分割します。パスワードに `:` が含まれていても
    /// 壊れません。
    pub fn from_encoded_credential(auth_b64: &str, email: impl Into<String>) -> Result<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth_b64)
            .map_err(|e| AuthError::InvalidCredential(format!("base64デコード失敗: {}", e)))?;

        let credential = String::from_utf8(decoded)
            .map_err(|e| AuthError::InvalidCredential(format!("不正なUTF-8: {}", e)))?;

        let (username, password) = credential.split_once(':').ok_or_else(|| {
            AuthError::InvalidCredential("'user:pass' 形式ではありません".to_string())
        })?;

        Ok(Self::new(username, password, email))
    }

    /// credential helper が返した identity token を添付した新しい設定を返す
    pub fn with_identity_token(mut self, token: impl Into<String>) -> Self {
        self.identity_token = Some(token.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn identity_token(&self) -> Option<&str> {
        self.identity_token.as_deref()
    }

    /// `X-Registry-Auth` ヘッダ値を生成（純粋関数）
    pub fn to_header_value(&self) -> String {
        // Serialize 実装からの失敗経路はない
        let json = serde_json::to_string(self).expect("AuthConfig serialization is infallible");
        base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
    }
}
