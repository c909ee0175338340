//! ビルド/プル/プッシュ進捗イベント
//!
//! デーモンのチャンク応答は JSON Lines 形式で届きます。1行が1イベントです。

use serde::{Deserialize, Serialize};

/// 進捗イベントのエラー詳細
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// デーモンのストリーミング応答1行分
///
/// build は主に `stream`、pull/push は `status` + `progress` を使います。
/// `error` / `errorDetail` が入っていたら、その操作はデーモン側で失敗しています。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "errorDetail", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ProgressErrorDetail>,
}

impl ProgressEvent {
    /// デーモン側エラーを含むイベントか
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.error_detail.is_some()
    }

    /// エラーメッセージ（errorDetail.message を優先）
    pub fn error_message(&self) -> Option<&str> {
        self.error_detail
            .as_ref()
            .and_then(|d| d.message.as_deref())
            .or(self.error.as_deref())
    }
}
