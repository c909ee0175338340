//! ビルドディレクトリの導出
//!
//! イメージ名からビルド作業用のディレクトリ構成を決定的に導出します。
//! イメージ名の `:` はパス区切りに置き換えられます（`foo:bar` → `foo/bar`）。

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// 1イメージ分のビルドディレクトリ構成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDirs {
    top_dir: PathBuf,
}

impl BuildDirs {
    /// イメージ名と出力ベースディレクトリから導出
    pub fn new(image: &str, base: &Path) -> Self {
        let top_dir = image
            .split(':')
            .fold(base.to_path_buf(), |path, segment| path.join(segment));
        Self { top_dir }
    }

    /// イメージ名由来のトップディレクトリ
    pub fn top_dir(&self) -> &Path {
        &self.top_dir
    }

    /// 成果物の出力先
    pub fn output_dir(&self) -> PathBuf {
        self.top_dir.join("build")
    }

    /// アセンブリ等の作業領域
    pub fn work_dir(&self) -> PathBuf {
        self.top_dir.join("work")
    }

    /// アーカイブ等の一時領域
    pub fn tmp_dir(&self) -> PathBuf {
        self.top_dir.join("tmp")
    }

    /// ディレクトリを冪等に作成
    ///
    /// 既存なら何もしません。同一イメージ名への並行呼び出しでも安全です
    /// （排他作成ではなく `create_dir_all`）。作成失敗は致命的エラーです。
    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(self.output_dir())?;
        fs::create_dir_all(self.work_dir())?;
        fs::create_dir_all(self.tmp_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_colon_becomes_path_separator() {
        let dirs = BuildDirs::new("foo:bar", Path::new("/out"));
        assert_eq!(dirs.top_dir(), Path::new("/out/foo/bar"));
    }

    #[test]
    fn test_registry_image_with_tag() {
        let dirs = BuildDirs::new("ghcr.io/org/app:v1.0", Path::new("/out"));
        assert_eq!(dirs.top_dir(), Path::new("/out/ghcr.io/org/app/v1.0"));
    }

    #[test]
    fn test_create_is_idempotent() {
        let base = tempdir().unwrap();
        let dirs = BuildDirs::new("foo:bar", base.path());

        dirs.create().unwrap();
        assert!(dirs.output_dir().is_dir());
        assert!(dirs.work_dir().is_dir());
        assert!(dirs.tmp_dir().is_dir());

        // 2回目も同じ状態のままエラーなし
        dirs.create().unwrap();
        assert!(dirs.output_dir().is_dir());
    }
}
