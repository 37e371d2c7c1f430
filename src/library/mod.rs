//! 本地库：已完成下载的目录扫描与管理

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::item::CloudItem;
use crate::utils::validator::{sanitize_file_name, validate_library_name};

#[derive(Debug, Clone)]
pub struct LocalLibrary {
    root: PathBuf,
    staging: PathBuf,
}

impl LocalLibrary {
    pub fn new(root: impl Into<PathBuf>, staging: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging: staging.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.library_path(), config.staging_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn ensure_dirs(&self) -> Result<(), DownloadError> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(&self.staging)?;
        Ok(())
    }

    /// 下载完成后文件在库中的位置
    pub fn destination_for(&self, item: &CloudItem) -> PathBuf {
        self.root.join(sanitize_file_name(&item.name, &item.id))
    }

    /// 列出已完成的下载，跳过隐藏条目与子目录，按名称排序
    pub fn list_completed(&self) -> Result<Vec<CloudItem>, DownloadError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("读取目录条目失败: {}", e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata();
            if matches!(&metadata, Ok(m) if m.is_dir()) {
                continue;
            }
            let size = match metadata {
                Ok(m) => m.len(),
                Err(e) => {
                    log::debug!("无法读取文件大小 {}: {}", name, e);
                    0
                }
            };
            items.push(CloudItem::local(name, size));
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    pub fn completed_path(&self, name: &str) -> Result<PathBuf, DownloadError> {
        validate_library_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn remove_completed(&self, name: &str) -> Result<(), DownloadError> {
        let path = self.completed_path(name)?;
        fs::remove_file(&path)?;
        log::info!("已删除本地文件: {}", path.display());
        Ok(())
    }
}
