use thiserror::Error;
use std::io;

use crate::core::item::ProviderKind;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),

    #[error("无效的文件条目: {0}")]
    InvalidItem(String),

    #[error("不支持的存储后端或未登录: {0}")]
    UnsupportedProvider(ProviderKind),

    #[error("尚未登录")]
    NotAuthenticated,

    #[error("服务器错误: {0}")]
    ServerError(String),

    #[error("下载被取消")]
    Cancelled,

    #[error("文件大小不匹配: 预期 {expected} 字节, 实际 {actual} 字节")]
    SizeMismatch {
        expected: u64,
        actual: u64,
    },

    #[error("配置错误: {0}")]
    Config(String),

    #[error("响应解析失败: {0}")]
    Json(#[from] serde_json::Error),

    #[error("下载中心不可用: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// 调用方的使用错误，而不是传输过程中的偶发失败
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DownloadError::InvalidItem(_)
                | DownloadError::UnsupportedProvider(_)
                | DownloadError::NotAuthenticated
                | DownloadError::Config(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

impl From<String> for DownloadError {
    fn from(error: String) -> Self {
        DownloadError::Unknown(error)
    }
}

impl From<&str> for DownloadError {
    fn from(error: &str) -> Self {
        DownloadError::Unknown(error.to_string())
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;
