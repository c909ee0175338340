//! イメージ名の分解と検証
//!
//! レジストリ・リポジトリ・タグの取り扱いはすべてここに集約します。

use crate::error::{BuildError, Result};

/// イメージ名からレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `123456.dkr.ecr.region.amazonaws.com/app` -> `123456.dkr.ecr.region.amazonaws.com`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    let parts: Vec<&str> = image.split('/').collect();

    if parts.len() >= 2 {
        let first = parts[0];

        // レジストリの判定:
        // - `.` を含む（例: ghcr.io, gcr.io, *.amazonaws.com）
        // - `:` を含む（例: localhost:5000）
        if first.contains('.') || first.contains(':') {
            return first.to_string();
        }
    }

    // デフォルトは Docker Hub
    "docker.io".to_string()
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    // 最後の : を探す
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // タグか、ポート番号かを判定
        // ポート番号の場合: localhost:5000/app (タグなし)
        // タグの場合: ghcr.io/org/app:v1.0
        //
        // ポート番号は / を含まない純粋な数字
        if !potential_tag.contains('/') && !potential_tag.chars().all(|c| c.is_ascii_digit()) {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}

/// 明示指定と設定ファイルのイメージ名からタグを解決
///
/// # Priority
/// 1. 明示的なタグ指定（最優先）
/// 2. 設定の image フィールドに含まれるタグ
/// 3. デフォルト: "latest"
pub fn resolve_tag(explicit_tag: Option<&str>, image: &str) -> (String, String) {
    if let Some(tag) = explicit_tag {
        let (base_image, _) = split_image_tag(image);
        return (base_image, tag.to_string());
    }

    split_image_tag(image)
}

/// タグのバリデーション
///
/// Docker タグの制約:
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag("(empty)".to_string()));
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag(format!(
            "タグが長すぎます（{}文字、最大128文字）",
            tag.len()
        )));
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag(tag.to_string()));
    }

    for c in tag.chars() {
        if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
            return Err(BuildError::InvalidTag(format!(
                "タグに不正な文字 '{}' が含まれています: {}",
                c, tag
            )));
        }
    }

    Ok(())
}
