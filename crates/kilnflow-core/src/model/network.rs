//! ネットワーク作成設定

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// デーモンのネットワーク作成エンドポイントに送る JSON ボディ
///
/// `name` は構築時に固定。ドライバ固有のオプションは任意の JSON プロパティとして
/// フラットに展開されます。
#[derive(Debug, Clone, Serialize)]
pub struct NetworkCreateConfig {
    #[serde(rename = "Name")]
    name: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl NetworkCreateConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 任意のプロパティを追加（例: "Driver", "Internal", "Labels"）
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
