//! デーモンAPIのワイヤ型
//!
//! 必要な操作に対応する最小限のリクエスト/レスポンス型だけを持ちます。
//! レスポンス型は `kilnflow_core::Container` スナップショットへ写像されます。

use kilnflow_core::{Container, PortBinding, RunVolumeConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// POST /containers/create のボディ
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateBody {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binds: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes_from: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_bindings: Option<HashMap<String, Vec<PortBindingWire>>>,
}

impl HostConfig {
    /// 実行時ボリューム設定をHostConfigへ反映（順序は保持される）
    pub fn with_volumes(mut self, volumes: &RunVolumeConfiguration) -> Self {
        if !volumes.bind.is_empty() {
            self.binds = Some(volumes.bind.clone());
        }
        if !volumes.from.is_empty() {
            self.volumes_from = Some(volumes.from.clone());
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortBindingWire {
    #[serde(rename = "HostIp", skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<String>,
    #[serde(rename = "HostPort", skip_serializing_if = "Option::is_none")]
    pub host_port: Option<String>,
}

/// create系エンドポイントの共通レスポンス
#[derive(Debug, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Warning", default)]
    pub warning: Option<String>,
}

/// GET /version のレスポンス（抜粋）
#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "ApiVersion")]
    pub api_version: String,
}

/// GET /containers/{id}/json のレスポンス（抜粋）
#[derive(Debug, Deserialize)]
pub struct ContainerInspect {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Config", default)]
    pub config: Option<InspectConfig>,
    #[serde(rename = "State", default)]
    pub state: Option<InspectState>,
    #[serde(rename = "HostConfig", default)]
    pub host_config: Option<InspectHostConfig>,
    #[serde(rename = "NetworkSettings", default)]
    pub network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectConfig {
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Labels", default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectState {
    #[serde(rename = "Running", default)]
    pub running: bool,
    #[serde(rename = "ExitCode", default)]
    pub exit_code: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectHostConfig {
    #[serde(rename = "NetworkMode", default)]
    pub network_mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectNetworkSettings {
    #[serde(rename = "IPAddress", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "Networks", default)]
    pub networks: HashMap<String, InspectEndpoint>,
    #[serde(rename = "Ports", default)]
    pub ports: Option<HashMap<String, Option<Vec<PortBindingWire>>>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InspectEndpoint {
    #[serde(rename = "IPAddress", default)]
    pub ip_address: Option<String>,
}

impl ContainerInspect {
    /// デーモンレスポンスをスナップショットへ写像
    ///
    /// `exit_code` は停止中かつデーモンが報告した場合のみ転記します。
    pub fn into_container(self) -> Container {
        let state = self.state.unwrap_or_default();
        let config = self.config.unwrap_or_default();
        let network_settings = self.network_settings.unwrap_or_default();

        let mut port_bindings = HashMap::new();
        if let Some(ports) = network_settings.ports {
            for (container_port, bindings) in ports {
                if let Some(first) = bindings.and_then(|mut b| {
                    if b.is_empty() { None } else { Some(b.remove(0)) }
                }) {
                    port_bindings.insert(
                        container_port,
                        PortBinding::new(
                            first.host_port.and_then(|p| p.parse().ok()),
                            first.host_ip,
                        ),
                    );
                }
            }
        }

        let custom_network_ip_addresses = network_settings
            .networks
            .into_iter()
            .filter_map(|(name, endpoint)| endpoint.ip_address.map(|ip| (name, ip)))
            .collect();

        Container {
            id: self.id,
            image: config.image,
            name: self.name.trim_start_matches('/').to_string(),
            labels: config.labels.unwrap_or_default(),
            network_mode: self.host_config.and_then(|h| h.network_mode),
            port_bindings,
            running: state.running,
            ip_address: network_settings.ip_address.filter(|ip| !ip.is_empty()),
            custom_network_ip_addresses,
            exit_code: if state.running { None } else { state.exit_code },
        }
    }
}

/// GET /containers/json の1要素（抜粋）
#[derive(Debug, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Labels", default)]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn into_container(self) -> Container {
        let name = self
            .names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();

        Container {
            id: self.id,
            image: self.image,
            name,
            labels: self.labels,
            network_mode: None,
            port_bindings: HashMap::new(),
            running: self.state == "running",
            ip_address: None,
            custom_network_ip_addresses: HashMap::new(),
            // 一覧応答には終了コードは含まれない
            exit_code: None,
        }
    }
}
