//! 実行時ボリューム設定
//!
//! ビルダーは加算的に動きます。`from()` / `bind()` を複数回呼ぶと置き換えでは
//! なく追記になり、呼び出し順がそのまま保持されます。

use serde::{Deserialize, Serialize};

/// コンテナ実行時のボリューム設定（イミュータブル）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunVolumeConfiguration {
    /// volumes-from で参照するコンテナ名
    #[serde(default)]
    pub from: Vec<String>,
    /// bind マウント指定（"host:container" 形式）
    #[serde(default)]
    pub bind: Vec<String>,
}

impl RunVolumeConfiguration {
    pub fn builder() -> RunVolumeConfigurationBuilder {
        RunVolumeConfigurationBuilder::default()
    }
}

/// `RunVolumeConfiguration` の加算的ビルダー
#[derive(Debug, Default)]
pub struct RunVolumeConfigurationBuilder {
    from: Vec<String>,
    bind: Vec<String>,
}

impl RunVolumeConfigurationBuilder {
    /// volumes-from エントリを追記
    pub fn from<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from.extend(entries.into_iter().map(Into::into));
        self
    }

    /// bind マウントを追記
    pub fn bind<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bind.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> RunVolumeConfiguration {
        RunVolumeConfiguration {
            from: self.from,
            bind: self.bind,
        }
    }
}
