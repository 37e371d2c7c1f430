//! Provider: 各云存储后端的下载能力
//!
//! - `google_drive`: Google Drive 媒体下载
//! - `listing`: 远程目录列表
//! - `auth`: 访问令牌
//! - `staging`: 下载中的临时文件

pub mod auth;
pub mod google_drive;
pub mod listing;
pub mod staging;

use std::path::PathBuf;

use crate::core::error::DownloadError;
use crate::core::item::{CloudItem, ProviderKind};
use crate::core::transfer::{CancelHandle, TransferReporter};

pub use auth::Credentials;
pub use google_drive::GoogleDriveProvider;
pub use listing::{GoogleDriveListing, RemoteEntry, RemoteListing};

/// 一次下载请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub item: CloudItem,
    /// 完成后文件在本地库中的最终位置
    pub destination: PathBuf,
}

/// 后端下载能力
///
/// `fetch` 必须立即返回：实际的网络与磁盘操作放到后台执行，
/// 通过 `reporter` 回报进度，并且恰好调用一次 `complete`。
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn fetch(&self, request: FetchRequest, reporter: TransferReporter) -> Result<CancelHandle, DownloadError>;
}
