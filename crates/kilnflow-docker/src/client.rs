//! Docker Access Facade
//!
//! イメージ/コンテナ/ネットワークのライフサイクル操作を束ねる合成ルートです。
//! 認証が必要なエンドポイントには `X-Registry-Auth` ヘッダを付け、ストリー
//! ミングエンドポイントには `LogStream` を割り当てます。デーモンの非2xx応答
//! は HTTPステータスと応答ボディ原文を持つ型付きエラーに変換します（ボディは
//! 「no such image」等の意味を持つため、決して言い換えません）。
//!
//! コンテナ状態（created → running → exited | removed）はこのプロセスの外
//! からも変化するため、ファサードは状態を一切キャッシュせず、観測のたびに
//! デーモンへ取得し直します。

use crate::error::{DockerError, Result};
use crate::models::{
    ContainerCreateBody, ContainerInspect, ContainerSummary, CreateResponse, VersionResponse,
};
use crate::stream::{LogStream, spawn_pump};
use crate::transport::{Transport, TransportBuilder};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use kilnflow_core::{Container, NetworkCreateConfig};
use kilnflow_registry::AuthConfig;
use std::collections::HashMap;
use tokio::sync::OwnedSemaphorePermit;

/// イメージビルドのオプション
#[derive(Debug, Clone)]
pub struct BuildImageOptions {
    pub tag: String,
    pub dockerfile: String,
    pub no_cache: bool,
    pub pull: bool,
    /// 中間コンテナを削除
    pub rm: bool,
    /// ビルド失敗時も中間コンテナを削除
    pub forcerm: bool,
    pub build_args: HashMap<String, String>,
    pub target: Option<String>,
}

impl BuildImageOptions {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            dockerfile: "Dockerfile".to_string(),
            no_cache: false,
            pull: false,
            rm: true,
            forcerm: true,
            build_args: HashMap::new(),
            target: None,
        }
    }

    fn to_query(&self) -> Result<String> {
        let mut pairs = vec![
            ("t", self.tag.clone()),
            ("dockerfile", self.dockerfile.clone()),
        ];
        if self.no_cache {
            pairs.push(("nocache", "true".to_string()));
        }
        if self.pull {
            pairs.push(("pull", "true".to_string()));
        }
        if self.rm {
            pairs.push(("rm", "true".to_string()));
        }
        if self.forcerm {
            pairs.push(("forcerm", "true".to_string()));
        }
        if let Some(target) = &self.target {
            pairs.push(("target", target.clone()));
        }
        if !self.build_args.is_empty() {
            pairs.push(("buildargs", serde_json::to_string(&self.build_args)?));
        }
        Ok(encode_query(&pairs))
    }
}

fn encode_query(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// デーモンREST APIのファサード
#[derive(Clone)]
pub struct DockerClient {
    transport: Transport,
}

impl DockerClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// `DOCKER_HOST`（またはプラットフォーム既定）へ接続するクライアント
    pub fn connect_with_defaults() -> Result<Self> {
        Ok(Self::new(TransportBuilder::from_env()?.build()?))
    }

    fn build_request(
        &self,
        method: Method,
        path_and_query: &str,
        auth: Option<&AuthConfig>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<Request<Full<Bytes>>> {
        let uri = self.transport.uri(path_and_query)?;
        let mut builder = Request::builder().method(method).uri(uri);

        // 匿名レジストリにはヘッダ自体を付けない
        if let Some(auth) = auth {
            builder = builder.header("X-Registry-Auth", auth.to_header_value());
        }
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }

        builder
            .body(Full::new(body))
            .map_err(|e| DockerError::Http(e.to_string()))
    }

    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<(Response<Incoming>, OwnedSemaphorePermit)> {
        let permit = self.transport.acquire().await?;
        let response = self
            .transport
            .client()
            .request(request)
            .await
            .map_err(|e| {
                if e.is_connect() {
                    DockerError::Connection(e.to_string())
                } else {
                    DockerError::Http(e.to_string())
                }
            })?;
        Ok((response, permit))
    }

    /// 応答ボディを読み切る単発リクエスト
    async fn execute(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        let (response, _permit) = self.send(request).await?;
        let status = response.status();
        let body = collect_body(response).await?;
        ensure_success(status, body)
    }

    /// チャンク応答を `LogStream` として返すリクエスト
    ///
    /// 接続許可はストリーム終端まで保持されます。
    async fn execute_streaming(&self, request: Request<Full<Bytes>>) -> Result<LogStream> {
        let (response, permit) = self.send(request).await?;
        let status = response.status();

        if !status.is_success() {
            let body = collect_body(response).await?;
            return Err(api_error(status, body));
        }

        Ok(spawn_pump(response.into_body(), permit))
    }

    // ------------------------------------------------------------------
    // システム
    // ------------------------------------------------------------------

    /// デーモンの疎通確認
    pub async fn ping(&self) -> Result<()> {
        let request =
            self.build_request(Method::GET, "/_ping", None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn version(&self) -> Result<VersionResponse> {
        let request =
            self.build_request(Method::GET, "/version", None, None, Bytes::new())?;
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    // ------------------------------------------------------------------
    // イメージ
    // ------------------------------------------------------------------

    /// ビルドコンテキストをデーモンへ送ってイメージをビルド
    ///
    /// ボディは `application/x-tar`。応答は JSON Lines の進捗ストリームです。
    pub async fn build_image(
        &self,
        options: &BuildImageOptions,
        auth: Option<&AuthConfig>,
        context: Bytes,
    ) -> Result<LogStream> {
        tracing::info!("イメージをビルドします: {}", options.tag);
        let path = format!("/build?{}", options.to_query()?);
        let request = self.build_request(
            Method::POST,
            &path,
            auth,
            Some("application/x-tar"),
            context,
        )?;
        self.execute_streaming(request).await
    }

    /// イメージをレジストリから取得
    pub async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        auth: Option<&AuthConfig>,
    ) -> Result<LogStream> {
        tracing::info!("イメージを取得します: {}:{}", image, tag);
        let query = encode_query(&[
            ("fromImage", image.to_string()),
            ("tag", tag.to_string()),
        ]);
        let path = format!("/images/create?{}", query);
        let request = self.build_request(Method::POST, &path, auth, None, Bytes::new())?;
        self.execute_streaming(request).await
    }

    /// イメージをレジストリへプッシュ
    pub async fn push_image(
        &self,
        image: &str,
        tag: &str,
        auth: Option<&AuthConfig>,
    ) -> Result<LogStream> {
        tracing::info!("イメージをプッシュします: {}:{}", image, tag);
        let query = encode_query(&[("tag", tag.to_string())]);
        let path = format!("/images/{}/push?{}", image, query);
        let request = self.build_request(Method::POST, &path, auth, None, Bytes::new())?;
        self.execute_streaming(request).await
    }

    pub async fn tag_image(&self, image: &str, repo: &str, tag: &str) -> Result<()> {
        let query = encode_query(&[("repo", repo.to_string()), ("tag", tag.to_string())]);
        let path = format!("/images/{}/tag?{}", image, query);
        let request = self.build_request(Method::POST, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    /// イメージの存在確認（404 は false、その他のエラーはそのまま）
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        let path = format!("/images/{}/json", image);
        let request = self.build_request(Method::GET, &path, None, None, Bytes::new())?;
        match self.execute(request).await {
            Ok(_) => Ok(true),
            Err(DockerError::Api { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn remove_image(&self, image: &str, force: bool) -> Result<()> {
        let query = encode_query(&[("force", force.to_string())]);
        let path = format!("/images/{}?{}", image, query);
        let request = self.build_request(Method::DELETE, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // コンテナ
    // ------------------------------------------------------------------

    pub async fn create_container(
        &self,
        name: &str,
        body: &ContainerCreateBody,
    ) -> Result<String> {
        let query = encode_query(&[("name", name.to_string())]);
        let path = format!("/containers/create?{}", query);
        let request = self.build_request(
            Method::POST,
            &path,
            None,
            Some("application/json"),
            Bytes::from(serde_json::to_vec(body)?),
        )?;
        let response_body = self.execute(request).await?;
        let created: CreateResponse = serde_json::from_slice(&response_body)?;
        if let Some(warning) = &created.warning {
            tracing::warn!("コンテナ作成時の警告: {}", warning);
        }
        Ok(created.id)
    }

    pub async fn start_container(&self, id: &str) -> Result<()> {
        let path = format!("/containers/{}/start", id);
        let request = self.build_request(Method::POST, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn stop_container(&self, id: &str, timeout_secs: Option<u32>) -> Result<()> {
        let path = match timeout_secs {
            Some(t) => format!("/containers/{}/stop?t={}", id, t),
            None => format!("/containers/{}/stop", id),
        };
        let request = self.build_request(Method::POST, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    pub async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        let query = encode_query(&[("force", force.to_string())]);
        let path = format!("/containers/{}?{}", id, query);
        let request = self.build_request(Method::DELETE, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }

    /// コンテナの時点スナップショットを取得（毎回デーモンへ問い合わせる）
    pub async fn inspect_container(&self, id: &str) -> Result<Container> {
        let path = format!("/containers/{}/json", id);
        let request = self.build_request(Method::GET, &path, None, None, Bytes::new())?;
        let body = self.execute(request).await?;
        let inspect: ContainerInspect = serde_json::from_slice(&body)?;
        Ok(inspect.into_container())
    }

    /// ラベルフィルタ付きのコンテナ一覧
    pub async fn list_containers(
        &self,
        all: bool,
        label_filters: &HashMap<String, String>,
    ) -> Result<Vec<Container>> {
        let mut pairs = vec![("all", all.to_string())];
        if !label_filters.is_empty() {
            let labels: Vec<String> = label_filters
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            let filters = serde_json::json!({ "label": labels });
            pairs.push(("filters", filters.to_string()));
        }
        let path = format!("/containers/json?{}", encode_query(&pairs));
        let request = self.build_request(Method::GET, &path, None, None, Bytes::new())?;
        let body = self.execute(request).await?;
        let summaries: Vec<ContainerSummary> = serde_json::from_slice(&body)?;
        Ok(summaries
            .into_iter()
            .map(ContainerSummary::into_container)
            .collect())
    }

    // ------------------------------------------------------------------
    // ネットワーク
    // ------------------------------------------------------------------

    pub async fn create_network(&self, config: &NetworkCreateConfig) -> Result<String> {
        let request = self.build_request(
            Method::POST,
            "/networks/create",
            None,
            Some("application/json"),
            Bytes::from(serde_json::to_vec(config)?),
        )?;
        let body = self.execute(request).await?;
        let created: CreateResponse = serde_json::from_slice(&body)?;
        Ok(created.id)
    }

    pub async fn remove_network(&self, id: &str) -> Result<()> {
        let path = format!("/networks/{}", id);
        let request = self.build_request(Method::DELETE, &path, None, None, Bytes::new())?;
        self.execute(request).await?;
        Ok(())
    }
}

async fn collect_body(response: Response<Incoming>) -> Result<Bytes> {
    Ok(response
        .into_body()
        .collect()
        .await
        .map_err(|e| DockerError::Http(e.to_string()))?
        .to_bytes())
}

fn api_error(status: StatusCode, body: Bytes) -> DockerError {
    DockerError::Api {
        status: status.as_u16(),
        // ボディは原文のまま保持する
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}

fn ensure_success(status: StatusCode, body: Bytes) -> Result<Bytes> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(api_error(status, body))
    }
}
