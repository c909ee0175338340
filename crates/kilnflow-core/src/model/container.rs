//! コンテナスナップショット
//!
//! デーモンAPIレスポンスの時点スナップショットです。状態は外部（他のツールや
//! デーモン自身）から変化するため、このモデルは更新せず、毎回取得し直します。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ポートバインディング（ホスト側の割り当て）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
}

impl PortBinding {
    pub fn new(host_port: Option<u16>, host_ip: Option<String>) -> Self {
        Self { host_port, host_ip }
    }
}

/// デーモンから取得したコンテナの時点スナップショット
///
/// `exit_code` は「停止していて、かつデーモンが終了コードを報告した」場合のみ
/// `Some` になります。取得できないランタイムでは `None` のままです。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub image: String,
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    /// コンテナポート（"8080/tcp" 形式）→ ホスト側バインディング
    #[serde(default)]
    pub port_bindings: HashMap<String, PortBinding>,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// カスタムネットワーク名 → そのネットワーク内での IP アドレス
    #[serde(default)]
    pub custom_network_ip_addresses: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
}

impl Container {
    /// 終了コード（停止中のコンテナのみ）
    pub fn exit_code(&self) -> Option<i64> {
        if self.running { None } else { self.exit_code }
    }

    /// コンテナ名（デーモンが付ける先頭の `/` を除去済みであること）
    pub fn name(&self) -> &str {
        &self.name
    }
}
