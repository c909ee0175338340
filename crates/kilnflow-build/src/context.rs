//! ビルドコンテキストの組み立て
//!
//! デーモンのビルドエンドポイントへ送る tar アーカイブを作成します。
//! コンテンツハッシュによるビルドキャッシュが効くよう、エントリ集合と
//! メタデータは入力が同じなら毎回同一になります:
//! - エントリ順はファイルシステムの列挙順ではなく辞書順
//! - パーミッションは実行可否だけを保存（0o755 / 0o644 に正規化）
//! - mtime は 0 に固定
//!
//! 読めないソースパスと、解決結果がソースツリーの外に出るパス（シンボリック
//! リンク経由の脱出）は、黙ってスキップせず致命的な設定エラーにします。

use crate::error::{BuildError, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use glob::Pattern;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::{Builder, Header};

/// 警告を出すコンテキストサイズの閾値
const MAX_CONTEXT_SIZE: u64 = 500 * 1024 * 1024; // 500MB

enum DockerfileSource {
    /// 既存ファイルを "Dockerfile" として注入
    Path(PathBuf),
    /// 生成済みの内容を "Dockerfile" として注入
    Content(String),
    /// コンテキスト内の Dockerfile をそのまま使う
    None,
}

pub struct ContextBuilder {
    source_dir: PathBuf,
    canonical_source: PathBuf,
    excludes: Vec<Pattern>,
    dockerfile: DockerfileSource,
}

impl ContextBuilder {
    pub fn new(source_dir: impl Into<PathBuf>) -> Result<Self> {
        let source_dir = source_dir.into();
        if !source_dir.is_dir() {
            return Err(BuildError::ContextNotFound(source_dir));
        }
        let canonical_source = fs::canonicalize(&source_dir)?;

        Ok(Self {
            source_dir,
            canonical_source,
            excludes: Vec::new(),
            dockerfile: DockerfileSource::None,
        })
    }

    /// 除外パターンを追加（`.dockerignore` 相当のglob）
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        let compiled = Pattern::new(pattern)
            .map_err(|e| BuildError::InvalidConfig(format!("不正な除外パターン '{}': {}", pattern, e)))?;
        self.excludes.push(compiled);
        Ok(self)
    }

    /// コンテキスト直下の `.dockerignore` を読み込む（無ければ何もしない）
    pub fn load_dockerignore(mut self) -> Result<Self> {
        let path = self.source_dir.join(".dockerignore");
        if !path.exists() {
            return Ok(self);
        }

        let content = fs::read_to_string(&path)?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self = self.exclude(line)?;
        }
        Ok(self)
    }

    /// 指定パスのファイルを "Dockerfile" として注入
    pub fn dockerfile_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile = DockerfileSource::Path(path.into());
        self
    }

    /// 生成済みのDockerfile内容を注入
    pub fn dockerfile_content(mut self, content: impl Into<String>) -> Self {
        self.dockerfile = DockerfileSource::Content(content.into());
        self
    }

    /// コンテキストを tar として書き出し、ファイルハンドルを返す
    pub fn write_to(&self, dest: &Path) -> Result<File> {
        tracing::debug!("ビルドコンテキストを作成します: {}", self.source_dir.display());

        let file = File::create(dest)?;
        let mut tar = Builder::new(file);
        self.append_entries(&mut tar)?;
        let mut inner = tar.into_inner().map_err(BuildError::Io)?;
        inner.flush()?;
        drop(inner);

        self.check_context_size(dest);
        File::open(dest).map_err(Into::into)
    }

    /// コンテキストを tar.gz として書き出し、ファイルハンドルを返す
    pub fn write_gzip_to(&self, dest: &Path) -> Result<File> {
        let file = File::create(dest)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut tar = Builder::new(encoder);
        self.append_entries(&mut tar)?;
        let encoder = tar.into_inner().map_err(BuildError::Io)?;
        let mut file = encoder.finish()?;
        file.flush()?;
        drop(file);

        self.check_context_size(dest);
        File::open(dest).map_err(Into::into)
    }

    fn append_entries<W: Write>(&self, tar: &mut Builder<W>) -> Result<()> {
        let mut entries = Vec::new();
        self.walk(&self.source_dir, &mut entries)?;
        // 辞書順で決定的に
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (rel, path) in entries {
            let metadata = fs::metadata(&path)?;
            let mut header = Header::new_gnu();
            header.set_mtime(0);

            // 空ディレクトリも保持する
            if metadata.is_dir() {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                tar.append_data(&mut header, format!("{}/", rel), std::io::empty())
                    .map_err(BuildError::Io)?;
                continue;
            }

            header.set_size(metadata.len());
            header.set_mode(normalized_mode(&metadata));

            let file = File::open(&path)?;
            tar.append_data(&mut header, &rel, file)
                .map_err(BuildError::Io)?;
        }

        self.append_dockerfile(tar)?;
        Ok(())
    }

    fn append_dockerfile<W: Write>(&self, tar: &mut Builder<W>) -> Result<()> {
        let content = match &self.dockerfile {
            DockerfileSource::None => return Ok(()),
            DockerfileSource::Path(path) => {
                fs::read(path).map_err(|_| BuildError::DockerfileNotFound(path.clone()))?
            }
            DockerfileSource::Content(content) => content.clone().into_bytes(),
        };

        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);

        tar.append_data(&mut header, "Dockerfile", content.as_slice())
            .map_err(BuildError::Io)
    }

    fn walk(&self, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            let rel = path
                .strip_prefix(&self.source_dir)
                .map_err(|_| BuildError::PathEscape {
                    path: path.clone(),
                    root: self.source_dir.clone(),
                })?;
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            if self.is_excluded(&rel_str) {
                continue;
            }

            // シンボリックリンク経由でツリー外へ出ていないか
            let resolved = fs::canonicalize(&path)?;
            if !resolved.starts_with(&self.canonical_source) {
                return Err(BuildError::PathEscape {
                    path: resolved,
                    root: self.canonical_source.clone(),
                });
            }

            if path.is_dir() {
                out.push((rel_str, path.clone()));
                self.walk(&path, out)?;
                continue;
            }

            // Dockerfileを注入する場合、既存の同名エントリは差し替え対象
            if !matches!(self.dockerfile, DockerfileSource::None) && rel_str == "Dockerfile" {
                continue;
            }

            out.push((rel_str, path));
        }
        Ok(())
    }

    fn is_excluded(&self, rel: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.matches(rel))
    }

    fn check_context_size(&self, dest: &Path) {
        if let Ok(metadata) = fs::metadata(dest)
            && metadata.len() > MAX_CONTEXT_SIZE
        {
            tracing::warn!(
                "ビルドコンテキストが大きすぎます（{}MB）。.dockerignore での除外を推奨します。",
                metadata.len() / 1024 / 1024
            );
        }
    }
}

fn normalized_mode(metadata: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 != 0 {
            return 0o755;
        }
    }
    let _ = metadata;
    0o644
}
