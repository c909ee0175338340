//! ビルド・プッシュのオーケストレーション
//!
//! 設定の解決、コンテキストの組み立て、認証の解決、デーモン呼び出しを
//! 1つの流れにまとめます。

use crate::config::BuildConfig;
use crate::context::ContextBuilder;
use crate::dirs::BuildDirs;
use crate::error::{BuildError, Result};
use crate::naming::{extract_registry, validate_tag};
use crate::resolver::BuildResolver;
use bytes::Bytes;
use kilnflow_docker::{BuildImageOptions, DockerClient, DockerError};
use kilnflow_registry::{AuthResolver, RegistryAuthKind, SecretDecryptor};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// ビルド実行サービス
pub struct BuildService {
    client: DockerClient,
    auth: AuthResolver,
    resolver: BuildResolver,
    decryptor: Box<dyn SecretDecryptor + Send + Sync>,
    output_root: PathBuf,
}

impl BuildService {
    pub fn new(
        client: DockerClient,
        auth: AuthResolver,
        project_root: PathBuf,
        output_root: PathBuf,
    ) -> Self {
        Self {
            client,
            auth,
            resolver: BuildResolver::new(project_root),
            // 既定では平文パスワードをそのまま使う
            decryptor: Box::new(|value: &str| -> kilnflow_registry::Result<String> {
                Ok(value.to_string())
            }),
            output_root,
        }
    }

    /// パスワード復号処理を差し替え
    pub fn with_decryptor(mut self, decryptor: Box<dyn SecretDecryptor + Send + Sync>) -> Self {
        self.decryptor = decryptor;
        self
    }

    /// 1エントリ分のイメージをビルド
    ///
    /// # Returns
    /// * `Ok(Some(image))` - ビルド成功。完全なイメージ名を返す
    /// * `Ok(None)` - スキップ（skip_build 指定、または Dockerfile なし）
    pub async fn build(
        &self,
        name: &str,
        config: &BuildConfig,
        variables: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        if config.skip_build {
            tracing::info!("'{}' はビルドをスキップします", name);
            return Ok(None);
        }

        let Some(dockerfile) = self.resolver.resolve_dockerfile(name, config)? else {
            // Dockerfileがない場合はpullで対応するためビルドしない
            tracing::debug!("'{}' にDockerfileが見つからないためビルドしません", name);
            return Ok(None);
        };

        let context_dir = self.resolver.resolve_context(config)?;
        let (image, tag) = self.resolver.resolve_image_tag(config);
        validate_tag(&tag)?;
        let full_image = format!("{}:{}", image, tag);

        tracing::info!("イメージをビルドします: {}", full_image);

        let dirs = BuildDirs::new(&full_image, &self.output_root);
        dirs.create()?;

        let archive_path = dirs.tmp_dir().join("docker-build.tar");
        let context = self.assemble_context(&context_dir, &dockerfile, config, &archive_path)?;

        // ベースイメージのpullに備えてPull用の認証を付与
        let registry = extract_registry(&image);
        let auth = self
            .auth
            .resolve(RegistryAuthKind::Pull, None, &registry, &*self.decryptor)?;

        let mut options = BuildImageOptions::new(&full_image);
        options.no_cache = config.no_cache;
        options.pull = config.pull;
        options.target = config.target.clone();
        options.build_args = config.resolved_args(variables);

        let mut stream = self
            .client
            .build_image(&options, auth.as_ref(), context)
            .await?;
        let handle = stream.handle();

        while let Some(event) = stream.next().await {
            if let Some(line) = &event.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    tracing::info!("{}", line);
                }
            }
            if let Some(status) = &event.status {
                tracing::debug!("{}", status);
            }
        }

        handle.wait().await;
        if let Some(error) = handle.error() {
            return Err(stream_error_to_build(error));
        }

        tracing::info!("ビルドが完了しました: {}", full_image);
        Ok(Some(full_image))
    }

    /// イメージをレジストリへプッシュ
    ///
    /// # Returns
    /// プッシュ成功時は完全なイメージ名を返す
    pub async fn push(&self, image: &str, tag: &str) -> Result<String> {
        let full_image = format!("{}:{}", image, tag);

        validate_tag(tag)?;

        let registry = extract_registry(image);
        let auth = self
            .auth
            .resolve(RegistryAuthKind::Push, None, &registry, &*self.decryptor)?;

        tracing::info!("イメージをプッシュします: {}", full_image);

        let stream = self.client.push_image(image, tag, auth.as_ref()).await?;
        stream.collect().await.map_err(|e| match e {
            DockerError::Stream(message) => BuildError::PushFailed(message),
            other => BuildError::Docker(other),
        })?;

        Ok(full_image)
    }

    fn assemble_context(
        &self,
        context_dir: &Path,
        dockerfile: &Path,
        config: &BuildConfig,
        archive_path: &Path,
    ) -> Result<Bytes> {
        let mut builder = ContextBuilder::new(context_dir)?
            .load_dockerignore()?
            .dockerfile_path(dockerfile);

        for pattern in &config.excludes {
            builder = builder.exclude(pattern)?;
        }

        builder.write_to(archive_path)?;
        Ok(Bytes::from(fs::read(archive_path)?))
    }
}

fn stream_error_to_build(error: &DockerError) -> BuildError {
    match error {
        DockerError::Stream(message) => BuildError::BuildFailed(message.clone()),
        other => BuildError::BuildFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    #[ignore] // Docker接続が必要なため、通常のテストではスキップ
    async fn test_build_simple_image() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("Dockerfile"),
            "FROM alpine:latest\nCMD echo 'test'",
        )
        .unwrap();

        let output = tempdir().unwrap();
        let client = DockerClient::connect_with_defaults().unwrap();
        let service = BuildService::new(
            client,
            AuthResolver::new(),
            temp_dir.path().to_path_buf(),
            output.path().to_path_buf(),
        );

        let mut config = BuildConfig::new("kilnflow-test:latest");
        config.dockerfile = Some(PathBuf::from("Dockerfile"));

        let result = service.build("test", &config, &HashMap::new()).await;
        assert!(matches!(result, Ok(Some(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_skip_build_short_circuits() {
        // skip_build ならデーモンに一切触れずに None を返す
        let temp_dir = tempdir().unwrap();
        let output = tempdir().unwrap();

        let transport = kilnflow_docker::TransportBuilder::new(
            kilnflow_docker::DaemonAddress::Unix(temp_dir.path().join("nonexistent.sock")),
        )
        .build()
        .unwrap();
        let service = BuildService::new(
            DockerClient::new(transport),
            AuthResolver::new(),
            temp_dir.path().to_path_buf(),
            output.path().to_path_buf(),
        );

        let mut config = BuildConfig::new("app:latest");
        config.skip_build = true;

        let result = service.build("app", &config, &HashMap::new()).await.unwrap();
        assert_eq!(result, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_dockerfile_means_no_build() {
        let temp_dir = tempdir().unwrap();
        let output = tempdir().unwrap();

        let transport = kilnflow_docker::TransportBuilder::new(
            kilnflow_docker::DaemonAddress::Unix(temp_dir.path().join("nonexistent.sock")),
        )
        .build()
        .unwrap();
        let service = BuildService::new(
            DockerClient::new(transport),
            AuthResolver::new(),
            temp_dir.path().to_path_buf(),
            output.path().to_path_buf(),
        );

        let config = BuildConfig::new("app:latest");
        let result = service.build("app", &config, &HashMap::new()).await.unwrap();
        assert_eq!(result, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_tag_is_rejected_before_daemon_call() {
        let temp_dir = tempdir().unwrap();
        let output = tempdir().unwrap();

        let transport = kilnflow_docker::TransportBuilder::new(
            kilnflow_docker::DaemonAddress::Unix(temp_dir.path().join("nonexistent.sock")),
        )
        .build()
        .unwrap();
        let service = BuildService::new(
            DockerClient::new(transport),
            AuthResolver::new(),
            temp_dir.path().to_path_buf(),
            output.path().to_path_buf(),
        );

        let result = service.push("ghcr.io/org/app", ".bad").await;
        assert!(matches!(result, Err(BuildError::InvalidTag(_))));
    }
}
