//! Docker config.json ベースの認証
//!
//! `~/.docker/config.json` の auths エントリから認証情報を取得し、
//! credential helper 経由の identity token 取得をエクステンダとして提供します。

use crate::authconfig::AuthConfig;
use crate::error::{AuthError, Result};
use crate::handler::{AuthExtender, AuthHandler, RegistryAuthKind, SecretDecryptor};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

/// 認証エントリ
#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// config.json の auths セクションを参照するハンドラ
///
/// デフォルトは `$DOCKER_CONFIG/config.json`、未設定なら `~/.docker/config.json`。
#[derive(Debug)]
pub struct ConfigFileAuthHandler {
    config_path: PathBuf,
}

impl Default for ConfigFileAuthHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigFileAuthHandler {
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    /// 指定したパスの config.json を使用
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    fn load(&self) -> Result<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| AuthError::ConfigRead {
                path: self.config_path.clone(),
                message: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| AuthError::ConfigRead {
            path: self.config_path.clone(),
            message: format!("JSONパース失敗: {}", e),
        })
    }
}

impl AuthHandler for ConfigFileAuthHandler {
    fn id(&self) -> &'static str {
        "dockerconfig"
    }

    fn create(
        &self,
        _kind: RegistryAuthKind,
        _user: Option<&str>,
        registry: &str,
        _decryptor: &dyn SecretDecryptor,
    ) -> Result<Option<AuthConfig>> {
        // config.json が無ければこのハンドラは該当なし
        if !self.config_path.exists() {
            tracing::debug!("config.json が見つかりません: {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load()?;

        let Some(entry) = config.auths.get(registry) else {
            tracing::debug!("{} の auths エントリはありません", registry);
            return Ok(None);
        };

        let Some(auth_b64) = &entry.auth else {
            return Ok(None);
        };

        let email = entry.email.clone().unwrap_or_default();
        let config = AuthConfig::from_encoded_credential(auth_b64, email)?;
        tracing::debug!("config.json から {} の認証情報を解決しました", registry);
        Ok(Some(config))
    }
}

/// `docker-credential-<helper>` を呼び出して identity token を添付するエクステンダ
///
/// helper は `get` サブコマンドの stdin でレジストリ名を受け取り、
/// `{"Username": ..., "Secret": ...}` を返します。Username が `<token>` の
/// 場合、Secret は identity token です。
pub struct CredentialHelperExtender {
    helper: String,
}

impl CredentialHelperExtender {
    pub fn new(helper: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    fn query(&self, registry: &str) -> Result<CredentialResponse> {
        let helper_cmd = format!("docker-credential-{}", self.helper);

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AuthError::Helper {
                helper: self.helper.clone(),
                message: format!("{} の起動に失敗: {}", helper_cmd, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes()).ok();
        }

        let output = child.wait_with_output().map_err(|e| AuthError::Helper {
            helper: self.helper.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(AuthError::Helper {
                helper: self.helper.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))
    }
}

impl AuthExtender for CredentialHelperExtender {
    fn id(&self) -> &'static str {
        "credential-helper"
    }

    fn extend(&self, given: AuthConfig, registry: &str) -> Result<AuthConfig> {
        let response = self.query(registry)?;

        // docker の規約: Username が "<token>" なら Secret は identity token
        if response.username == "<token>" {
            tracing::debug!("{} の identity token を取得しました", registry);
            return Ok(given.with_identity_token(response.secret));
        }

        tracing::debug!(
            "credential helper は {} の token を返しませんでした",
            registry
        );
        Ok(given)
    }
}
