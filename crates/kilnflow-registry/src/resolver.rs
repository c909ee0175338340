//! 認証解決チェーン
//!
//! ハンドラは設定された固定順で試行され、最初の非 None が勝ちます。
//! エクステンダは解決結果が得られた後に、こちらも固定順で適用されます。

use crate::authconfig::AuthConfig;
use crate::error::Result;
use crate::handler::{AuthExtender, AuthHandler, RegistryAuthKind, SecretDecryptor};

/// 起動時に静的合成される認証レゾルバ
pub struct AuthResolver {
    handlers: Vec<Box<dyn AuthHandler>>,
    extenders: Vec<Box<dyn AuthExtender>>,
}

impl AuthResolver {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            extenders: Vec::new(),
        }
    }

    /// ハンドラを末尾に追加（追加順 = 試行順）
    pub fn with_handler(mut self, handler: Box<dyn AuthHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// エクステンダを末尾に追加（追加順 = 適用順）
    pub fn with_extender(mut self, extender: Box<dyn AuthExtender>) -> Self {
        self.extenders.push(extender);
        self
    }

    /// レジストリと kind に対する認証情報を解決
    ///
    /// どのハンドラも該当情報を持たなければ `Ok(None)`（匿名レジストリ）。
    pub fn resolve(
        &self,
        kind: RegistryAuthKind,
        user: Option<&str>,
        registry: &str,
        decryptor: &dyn SecretDecryptor,
    ) -> Result<Option<AuthConfig>> {
        let mut resolved = None;

        for handler in &self.handlers {
            if let Some(config) = handler.create(kind, user, registry, decryptor)? {
                tracing::debug!("ハンドラ '{}' が {} を解決しました", handler.id(), registry);
                resolved = Some(config);
                break;
            }
        }

        let Some(mut config) = resolved else {
            tracing::debug!("{} の認証情報はありません（匿名アクセス）", registry);
            return Ok(None);
        };

        for extender in &self.extenders {
            config = extender.extend(config, registry)?;
        }

        Ok(Some(config))
    }
}

impl Default for AuthResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_decryptor() -> impl SecretDecryptor {
        |value: &str| Ok(value.to_string())
    }

    struct FixedHandler {
        id: &'static str,
        result: Option<AuthConfig>,
    }

    impl AuthHandler for FixedHandler {
        fn id(&self) -> &'static str {
            self.id
        }

        fn create(
            &self,
            _kind: RegistryAuthKind,
            _user: Option<&str>,
            _registry: &str,
            _decryptor: &dyn SecretDecryptor,
        ) -> Result<Option<AuthConfig>> {
            Ok(self.result.clone())
        }
    }

    struct TokenExtender(&'static str);

    impl AuthExtender for TokenExtender {
        fn id(&self) -> &'static str {
            "token"
        }

        fn extend(&self, given: AuthConfig, _registry: &str) -> Result<AuthConfig> {
            Ok(given.with_identity_token(self.0))
        }
    }

    #[test]
    fn test_first_non_none_handler_wins() {
        let resolver = AuthResolver::new()
            .with_handler(Box::new(FixedHandler {
                id: "empty",
                result: None,
            }))
            .with_handler(Box::new(FixedHandler {
                id: "first",
                result: Some(AuthConfig::new("a", "pa", "a@example.com")),
            }))
            .with_handler(Box::new(FixedHandler {
                id: "second",
                result: Some(AuthConfig::new("b", "pb", "b@example.com")),
            }));

        let config = resolver
            .resolve(RegistryAuthKind::Pull, None, "ghcr.io", &plain_decryptor())
            .unwrap()
            .unwrap();
        assert_eq!(config.username(), "a");
    }

    #[test]
    fn test_no_handler_matches_yields_anonymous() {
        let resolver = AuthResolver::new().with_handler(Box::new(FixedHandler {
            id: "empty",
            result: None,
        }));

        let result = resolver
            .resolve(RegistryAuthKind::Pull, None, "ghcr.io", &plain_decryptor())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_extenders_run_after_resolution_in_order() {
        let resolver = AuthResolver::new()
            .with_handler(Box::new(FixedHandler {
                id: "fixed",
                result: Some(AuthConfig::new("a", "pa", "a@example.com")),
            }))
            .with_extender(Box::new(TokenExtender("first")))
            .with_extender(Box::new(TokenExtender("second")));

        let config = resolver
            .resolve(RegistryAuthKind::Push, None, "ghcr.io", &plain_decryptor())
            .unwrap()
            .unwrap();
        // 後段のエクステンダが最終値
        assert_eq!(config.identity_token(), Some("second"));
    }

    #[test]
    fn test_extenders_skipped_for_anonymous() {
        let resolver = AuthResolver::new()
            .with_extender(Box::new(TokenExtender("never")));

        let result = resolver
            .resolve(RegistryAuthKind::Pull, None, "ghcr.io", &plain_decryptor())
            .unwrap();
        assert!(result.is_none());
    }
}
