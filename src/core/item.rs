use serde::{Deserialize, Serialize};
use std::fmt;

/// 云存储后端标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    GoogleDrive,
    Dropbox,
    OneDrive,
    /// 纯本地文件
    None,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "google_drive",
            ProviderKind::Dropbox => "dropbox",
            ProviderKind::OneDrive => "one_drive",
            ProviderKind::None => "none",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 远程或本地文件的标识与元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudItem {
    /// 远程文件ID，本地文件为空字符串
    pub id: String,
    /// 显示名称，下载完成后也作为本地文件名
    pub name: String,
    /// 字节数，0 表示未知
    pub size: u64,
    pub provider: ProviderKind,
}

impl CloudItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, size: u64, provider: ProviderKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            provider,
        }
    }

    /// 本地库中已完成的文件
    pub fn local(name: impl Into<String>, size: u64) -> Self {
        Self::new(String::new(), name, size, ProviderKind::None)
    }

    pub fn is_remote(&self) -> bool {
        !self.id.is_empty()
    }
}
