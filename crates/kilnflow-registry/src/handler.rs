//! 認証ハンドラとエクステンダ
//!
//! ハンドラは安定した識別子を持ち、起動時に固定の順序で合成されます
//! （ディスクリプタ走査による動的発見は行いません）。

use crate::authconfig::AuthConfig;
use crate::error::Result;

/// push/pull どちらの認証情報を使うか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryAuthKind {
    Push,
    Pull,
}

/// 保存された秘密情報の復号関数
///
/// credential-store 側ツールが提供する外部コラボレータです。実装には一切の
/// 仮定を置きません。
pub trait SecretDecryptor {
    fn decrypt(&self, value: &str) -> Result<String>;
}

impl<F> SecretDecryptor for F
where
    F: Fn(&str) -> Result<String>,
{
    fn decrypt(&self, value: &str) -> Result<String> {
        self(value)
    }
}

/// レジストリ認証情報を解決するハンドラ
///
/// `create` が `Ok(None)` を返したら「このハンドラは該当情報を持たない」を
/// 意味し、次のハンドラが試されます。
pub trait AuthHandler: Send + Sync {
    /// ハンドラの安定識別子（合成順の選択・診断ログに使用）
    fn id(&self) -> &'static str;

    fn create(
        &self,
        kind: RegistryAuthKind,
        user: Option<&str>,
        registry: &str,
        decryptor: &dyn SecretDecryptor,
    ) -> Result<Option<AuthConfig>>;
}

/// 解決済みの認証情報を後処理で拡張するエクステンダ
///
/// 例: 外部 credential helper から identity token を取得して添付する。
/// helper に到達できない・応答が壊れている場合は IO系エラーで失敗します。
pub trait AuthExtender: Send + Sync {
    fn id(&self) -> &'static str;

    fn extend(&self, given: AuthConfig, registry: &str) -> Result<AuthConfig>;
}

/// 設定ファイル（ツール設定内のインライン記述）由来の認証情報
///
/// パスワードは暗号化済みで保持し、解決時に decryptor で復号します。
#[derive(Debug, Clone)]
pub struct InlineCredentials {
    pub username: String,
    /// 暗号化済みパスワード
    pub password: String,
    pub email: String,
}

/// インライン設定ベースのハンドラ
///
/// push/pull で別の認証情報を持てます。未設定の kind は `None` を返します。
pub struct InlineAuthHandler {
    push: Option<InlineCredentials>,
    pull: Option<InlineCredentials>,
}

impl InlineAuthHandler {
    pub fn new(push: Option<InlineCredentials>, pull: Option<InlineCredentials>) -> Self {
        Self { push, pull }
    }
}

impl AuthHandler for InlineAuthHandler {
    fn id(&self) -> &'static str {
        "inline"
    }

    fn create(
        &self,
        kind: RegistryAuthKind,
        user: Option<&str>,
        registry: &str,
        decryptor: &dyn SecretDecryptor,
    ) -> Result<Option<AuthConfig>> {
        let entry = match kind {
            RegistryAuthKind::Push => self.push.as_ref(),
            RegistryAuthKind::Pull => self.pull.as_ref(),
        };

        let Some(credentials) = entry else {
            return Ok(None);
        };

        let password = decryptor.decrypt(&credentials.password)?;
        let username = user.unwrap_or(&credentials.username);

        tracing::debug!("inline 認証情報を {} 用に解決しました", registry);
        Ok(Some(AuthConfig::new(
            username,
            password,
            credentials.email.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    fn plain_decryptor() -> impl SecretDecryptor {
        |value: &str| Ok(value.to_string())
    }

    fn handler() -> InlineAuthHandler {
        InlineAuthHandler::new(
            Some(InlineCredentials {
                username: "pusher".to_string(),
                password: "push-secret".to_string(),
                email: "push@example.com".to_string(),
            }),
            None,
        )
    }

    #[test]
    fn test_inline_handler_resolves_push_kind() {
        let config = handler()
            .create(
                RegistryAuthKind::Push,
                None,
                "ghcr.io",
                &plain_decryptor(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(config.username(), "pusher");
    }

    #[test]
    fn test_inline_handler_missing_kind_returns_none() {
        let result = handler()
            .create(
                RegistryAuthKind::Pull,
                None,
                "ghcr.io",
                &plain_decryptor(),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_inline_handler_user_override() {
        let config = handler()
            .create(
                RegistryAuthKind::Push,
                Some("override"),
                "ghcr.io",
                &plain_decryptor(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(config.username(), "override");
    }

    #[test]
    fn test_inline_handler_propagates_decryption_failure() {
        let failing = |_: &str| -> Result<String> {
            Err(AuthError::Decryption("master key unavailable".to_string()))
        };
        let result = handler().create(RegistryAuthKind::Push, None, "ghcr.io", &failing);
        assert!(matches!(result, Err(AuthError::Decryption(_))));
    }
}
