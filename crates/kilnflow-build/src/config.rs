//! ビルド設定
//!
//! ビルド対象ごとの設定モデルと、ビルド引数の変数展開を提供します。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// ビルド設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildConfig {
    /// ビルド対象のイメージ名（タグ込み可）
    pub image: String,
    /// Dockerfileのパス（プロジェクトルートからの相対パス）
    pub dockerfile: Option<PathBuf>,
    /// ビルドコンテキストのパス（プロジェクトルートからの相対パス）
    /// 未指定の場合はプロジェクトルート
    pub context: Option<PathBuf>,
    /// ビルド引数
    #[serde(default)]
    pub args: HashMap<String, String>,
    /// マルチステージビルドのターゲット
    pub target: Option<String>,
    /// キャッシュ無効化フラグ
    #[serde(default)]
    pub no_cache: bool,
    /// ベースイメージを常にpullするか
    #[serde(default)]
    pub pull: bool,
    /// イメージタグの明示的指定
    pub image_tag: Option<String>,
    /// コンテキストから除外するglobパターン
    #[serde(default)]
    pub excludes: Vec<String>,
    /// このエントリのビルドをスキップする
    ///
    /// 歴史的に "ignoreBuild" と "ignoreBuilder" の2つの綴りで書かれてきた
    /// フラグ。どちらの綴りも受け付け、意味は同一とする。
    #[serde(default, alias = "ignoreBuild", alias = "ignoreBuilder")]
    pub skip_build: bool,
}

impl BuildConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// ビルド引数の変数展開
    ///
    /// テンプレート文字列内の {VAR_NAME} を実際の値に置換
    pub fn resolved_args(&self, variables: &HashMap<String, String>) -> HashMap<String, String> {
        self.args
            .iter()
            .map(|(key, value)| {
                validate_build_arg(key);
                (key.clone(), expand_variables(value, variables))
            })
            .collect()
    }
}

/// 変数展開処理
pub fn expand_variables(template: &str, variables: &HashMap<String, String>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

/// ビルド引数の検証（機密情報の警告）
fn validate_build_arg(key: &str) {
    let sensitive_patterns = ["password", "token", "secret", "api_key", "private_key"];

    let key_lower = key.to_lowercase();
    for pattern in &sensitive_patterns {
        if key_lower.contains(pattern) {
            tracing::warn!(
                "警告: ビルド引数 '{}' は機密情報を含む可能性があります。\n\
                 ビルド引数はイメージ履歴に記録されます。\n\
                 機密情報はビルド引数ではなく、環境変数やシークレットマウントを使用してください。",
                key
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_variables() {
        let mut variables = HashMap::new();
        variables.insert("NODE_VERSION".to_string(), "20".to_string());
        variables.insert("REGISTRY".to_string(), "ghcr.io/myorg".to_string());

        let template = "{REGISTRY}/app:node{NODE_VERSION}";
        let result = expand_variables(template, &variables);

        assert_eq!(result, "ghcr.io/myorg/app:node20");
    }

    #[test]
    fn test_resolved_args_expand_each_value() {
        let mut config = BuildConfig::new("ghcr.io/org/app");
        config
            .args
            .insert("BASE".to_string(), "alpine:{VERSION}".to_string());

        let mut variables = HashMap::new();
        variables.insert("VERSION".to_string(), "3.20".to_string());

        let resolved = config.resolved_args(&variables);
        assert_eq!(resolved.get("BASE"), Some(&"alpine:3.20".to_string()));
    }

    #[test]
    fn test_skip_build_accepts_both_historical_spellings() {
        // 2つの綴りが同じフラグとして扱われること
        let a: BuildConfig =
            serde_json::from_str(r#"{"image": "app", "ignoreBuild": true}"#).unwrap();
        let b: BuildConfig =
            serde_json::from_str(r#"{"image": "app", "ignoreBuilder": true}"#).unwrap();
        let c: BuildConfig =
            serde_json::from_str(r#"{"image": "app", "skip_build": true}"#).unwrap();

        assert!(a.skip_build);
        assert!(b.skip_build);
        assert!(c.skip_build);
    }

    #[test]
    fn test_skip_build_defaults_to_false() {
        let config: BuildConfig = serde_json::from_str(r#"{"image": "app"}"#).unwrap();
        assert!(!config.skip_build);
    }
}
