//! ログストリームハンドル
//!
//! build/pull/push のチャンク応答を、生成側のI/Oタスクを塞がず、エラー情報も
//! 失わずに消費するためのハンドルです。エラーは例外的にスレッド境界を越えて
//! 投げられることはなく、単一代入セルに捕捉されます（single-writer-then-
//! immutable-read）。`finish()` は高々一度しか発火しません。
//!
//! キャンセルの手段は下層接続を閉じる（= ストリームを drop する）ことだけ
//! です。デーモン側が途中まで進んだ状態（部分的に pull されたイメージ等）は
//! 許容される結果であり、エラーではありません。

use crate::error::DockerError;
use bytes::BytesMut;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use kilnflow_core::ProgressEvent;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;

struct LogHandleInner {
    finished: AtomicBool,
    error: OnceLock<DockerError>,
    notify: Notify,
}

/// 1操作分の完了・エラー状態を追跡するハンドル
///
/// `finish()` 後、`is_error()` / `error()` はどのスレッドからも安定して
/// 読めます。`finish()` 前の読み取り結果に依存してはいけません。
#[derive(Clone)]
pub struct LogHandle {
    inner: Arc<LogHandleInner>,
}

impl LogHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(LogHandleInner {
                finished: AtomicBool::new(false),
                error: OnceLock::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// ストリーム終端で呼ばれる（2回目以降は no-op）
    pub(crate) fn finish(&self) {
        if !self.inner.finished.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// エラーを捕捉してから finish する
    ///
    /// エラーセルは単一代入。既に設定済みなら最初の値が残ります。
    pub(crate) fn finish_with_error(&self, error: DockerError) {
        let _ = self.inner.error.set(error);
        self.finish();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// エラー終端だったか（`error()` が `Some` であることと同値）
    pub fn is_error(&self) -> bool {
        self.inner.error.get().is_some()
    }

    pub fn error(&self) -> Option<&DockerError> {
        self.inner.error.get()
    }

    /// `finish()` の発火を待つ
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }
}

/// チャンク応答の消費側
///
/// イベントは放出順で届き、終端の `finish()` はすべてのイベントの後に
/// 観測されます。drop すると下層接続が閉じ、操作はキャンセルされます。
pub struct LogStream {
    handle: LogHandle,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    pump: tokio::task::AbortHandle,
}

impl LogStream {
    /// 次の進捗イベント（ストリーム終端で `None`）
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// 完了・エラー状態を共有するハンドル
    pub fn handle(&self) -> LogHandle {
        self.handle.clone()
    }

    /// 終端まで読み切り、全イベントを返す
    ///
    /// デーモン側エラーまたはトランスポート失敗で終わっていた場合は
    /// `Err` を返します。
    pub async fn collect(mut self) -> crate::error::Result<Vec<ProgressEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        self.handle.wait().await;
        if let Some(error) = self.handle.error() {
            return Err(DockerError::Stream(error.to_string()));
        }
        Ok(events)
    }
}

impl Drop for LogStream {
    /// 消費側を手放した時点でポンプを止め、下層接続を閉じる
    ///
    /// ボディと接続許可はポンプタスクが所有しているため、abort で両方が
    /// 解放されます。完走後の abort は no-op です。
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// 応答ボディをJSON Linesとして汲み上げるポンプ
///
/// ハンドルを所有するI/Oタスクとして spawn され、終端で `finish()` を
/// ちょうど一度呼びます。接続許可（permit）はストリームが終わるまで保持
/// されます。
pub(crate) fn spawn_pump(
    body: Incoming,
    permit: OwnedSemaphorePermit,
) -> LogStream {
    let handle = LogHandle::new();
    let (tx, rx) = mpsc::unbounded_channel();

    let pump_handle = handle.clone();
    let task = tokio::spawn(async move {
        let _permit = permit;
        pump(body, &pump_handle, &tx).await;
    });

    LogStream {
        handle,
        events: rx,
        pump: task.abort_handle(),
    }
}

async fn pump(
    mut body: Incoming,
    handle: &LogHandle,
    tx: &mpsc::UnboundedSender<ProgressEvent>,
) {
    let mut buffer = BytesMut::new();

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(data) = frame.into_data() {
                    buffer.extend_from_slice(&data);
                    deliver_lines(&mut buffer, handle, tx);
                }
            }
            Some(Err(e)) => {
                // キャンセル（接続クローズ）もここに落ちる
                handle.finish_with_error(DockerError::Stream(e.to_string()));
                return;
            }
            None => break,
        }
    }

    // 最終行が改行で終わっていない場合の残り
    if !buffer.is_empty() {
        deliver_line(&buffer, handle, tx);
    }

    handle.finish();
}

fn deliver_lines(
    buffer: &mut BytesMut,
    handle: &LogHandle,
    tx: &mpsc::UnboundedSender<ProgressEvent>,
) {
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line = buffer.split_to(pos + 1);
        deliver_line(&line[..pos], handle, tx);
    }
}

fn deliver_line(line: &[u8], handle: &LogHandle, tx: &mpsc::UnboundedSender<ProgressEvent>) {
    let trimmed = line.strip_suffix(b"\r").unwrap_or(line);
    if trimmed.is_empty() {
        return;
    }

    match serde_json::from_slice::<ProgressEvent>(trimmed) {
        Ok(event) => {
            if event.is_error() {
                let message = event
                    .error_message()
                    .unwrap_or("デーモンがエラーを報告しました")
                    .to_string();
                let _ = handle.inner.error.set(DockerError::Stream(message));
            }
            // 受信側が先に drop していても汲み上げは続ける
            let _ = tx.send(event);
        }
        Err(e) => {
            tracing::warn!("進捗行のパースに失敗しました: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_is_idempotent() {
        let handle = LogHandle::new();
        assert!(!handle.is_finished());

        handle.finish();
        assert!(handle.is_finished());
        assert!(!handle.is_error());

        // 2回目は no-op
        handle.finish();
        assert!(handle.is_finished());
        assert!(!handle.is_error());
    }

    #[test]
    fn test_is_error_iff_error_present() {
        let ok = LogHandle::new();
        ok.finish();
        assert_eq!(ok.is_error(), ok.error().is_some());
        assert!(!ok.is_error());

        let failed = LogHandle::new();
        failed.finish_with_error(DockerError::Stream("boom".to_string()));
        assert_eq!(failed.is_error(), failed.error().is_some());
        assert!(failed.is_error());
    }

    #[test]
    fn test_error_cell_is_single_assignment() {
        let handle = LogHandle::new();
        handle.finish_with_error(DockerError::Stream("first".to_string()));
        handle.finish_with_error(DockerError::Stream("second".to_string()));

        let message = handle.error().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("first"));
    }

    #[tokio::test]
    async fn test_wait_returns_after_finish() {
        let handle = LogHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.wait().await;
            waiter.is_error()
        });

        // finish 前はまだ完了していない
        tokio::task::yield_now().await;
        assert!(!task.is_finished());

        handle.finish();
        assert!(!task.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_after_finish_returns_immediately() {
        let handle = LogHandle::new();
        handle.finish();
        handle.wait().await;
    }
}
