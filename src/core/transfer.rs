use actix::Addr;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::core::error::DownloadError;
use crate::core::item::CloudItem;
use crate::core::registry::{DownloadRegistryActor, TransferCompleted, TransferProgress};

/// 取消句柄：提供者持有一份克隆，在读流时监听
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            // notify_one 会保留许可，之后才开始等待的任务也能立即返回
            self.notify.notify_one();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// 取消后完成
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// 提供者回报进度与结果的通道
///
/// `complete` 消费 self，每个传输只能有一个终止回调。
pub struct TransferReporter {
    registry: Addr<DownloadRegistryActor>,
    file_id: String,
    transfer_id: Uuid,
}

impl TransferReporter {
    pub(crate) fn new(registry: Addr<DownloadRegistryActor>, file_id: String, transfer_id: Uuid) -> Self {
        Self { registry, file_id, transfer_id }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// `bytes_expected` 为 None 表示传输层无法预知总长度
    pub fn progress(&self, bytes_written: u64, bytes_expected: Option<u64>) {
        self.registry.do_send(TransferProgress {
            file_id: self.file_id.clone(),
            transfer_id: self.transfer_id,
            bytes_written,
            bytes_expected,
        });
    }

    pub fn complete(self, result: Result<PathBuf, DownloadError>) {
        self.registry.do_send(TransferCompleted {
            file_id: self.file_id,
            transfer_id: self.transfer_id,
            result,
        });
    }
}

/// 进行中的下载，只由注册表持有
#[derive(Debug)]
pub struct Transfer {
    pub transfer_id: Uuid,
    pub item: CloudItem,
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub bytes_expected: Option<u64>,
    pub last_progress: f32,
    pub started_at: DateTime<Local>,
    pub(crate) seq: u64,
    cancel: CancelHandle,
}

impl Transfer {
    pub fn new(transfer_id: Uuid, item: CloudItem, destination: PathBuf, cancel: CancelHandle, seq: u64) -> Self {
        Self {
            transfer_id,
            item,
            destination,
            bytes_written: 0,
            bytes_expected: None,
            last_progress: 0.0,
            started_at: Local::now(),
            seq,
            cancel,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.item.id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 记录一次进度回调，返回完成比例；总长度未知时返回 None
    pub fn record(&mut self, bytes_written: u64, bytes_expected: Option<u64>) -> Option<f32> {
        self.bytes_written = bytes_written;
        if let Some(expected) = bytes_expected.filter(|n| *n > 0) {
            self.bytes_expected = Some(expected);
        }
        let total = self.effective_expected_size()?;
        Some((bytes_written as f64 / total as f64) as f32)
    }

    /// 传输层报告的总长度优先，否则退回到列表查询得到的文件大小
    pub fn effective_expected_size(&self) -> Option<u64> {
        self.bytes_expected
            .filter(|n| *n > 0)
            .or(Some(self.item.size).filter(|n| *n > 0))
    }

    pub fn status(&self) -> TransferStatus {
        TransferStatus {
            item: self.item.clone(),
            destination: self.destination.clone(),
            bytes_written: self.bytes_written,
            bytes_expected: self.effective_expected_size(),
            progress: self.last_progress,
            started_at: self.started_at,
        }
    }
}

/// 下载列表页面使用的只读快照
#[derive(Debug, Clone, Serialize)]
pub struct TransferStatus {
    pub item: CloudItem,
    pub destination: PathBuf,
    pub bytes_written: u64,
    pub bytes_expected: Option<u64>,
    pub progress: f32,
    pub started_at: DateTime<Local>,
}
