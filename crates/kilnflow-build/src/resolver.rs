use crate::config::BuildConfig;
use crate::error::{BuildError, Result};
use std::path::PathBuf;

pub struct BuildResolver {
    project_root: PathBuf,
}

impl BuildResolver {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    /// Dockerfileのパスを解決
    ///
    /// 検索順序:
    /// 1. 明示的な指定（dockerfileフィールド）
    /// 2. 規約ベース:
    ///    - ./services/{name}/Dockerfile
    ///    - ./{name}/Dockerfile
    ///    - ./Dockerfile.{name}
    pub fn resolve_dockerfile(&self, name: &str, config: &BuildConfig) -> Result<Option<PathBuf>> {
        // 明示的な指定がある場合
        if let Some(dockerfile) = &config.dockerfile {
            let path = self.project_root.join(dockerfile);
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(BuildError::DockerfileNotFound(path));
            }
        }

        // 規約ベースの検索
        let candidates = vec![
            format!("services/{}/Dockerfile", name),
            format!("{}/Dockerfile", name),
            format!("Dockerfile.{}", name),
        ];

        for candidate in candidates {
            let path = self.project_root.join(&candidate);
            if path.exists() {
                tracing::debug!("'{}' のDockerfileを発見: {}", name, path.display());
                return Ok(Some(path));
            }
        }

        // Dockerfileが見つからない場合はNone（pullで対応）
        Ok(None)
    }

    /// ビルドコンテキストのパスを解決
    ///
    /// デフォルトはプロジェクトルート
    pub fn resolve_context(&self, config: &BuildConfig) -> Result<PathBuf> {
        let context = match &config.context {
            Some(ctx) => self.project_root.join(ctx),
            None => self.project_root.clone(),
        };

        // コンテキストディレクトリの存在確認
        if !context.exists() {
            return Err(BuildError::ContextNotFound(context));
        }

        if !context.is_dir() {
            return Err(BuildError::InvalidConfig(format!(
                "ビルドコンテキストがディレクトリではありません: {}",
                context.display()
            )));
        }

        Ok(context)
    }

    /// イメージタグの解決
    ///
    /// 優先順位:
    /// 1. 明示的なタグ指定（image_tag）
    /// 2. image フィールドに含まれるタグ
    /// 3. デフォルト: "latest"
    pub fn resolve_image_tag(&self, config: &BuildConfig) -> (String, String) {
        crate::naming::resolve_tag(config.image_tag.as_deref(), &config.image)
    }
}
