use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::error::DownloadError;

/// 下载中的临时文件，带写缓冲
///
/// 完成后通过 `persist` 重命名到本地库；临时目录与本地库在同一文件系统上，
/// 重命名是原子的，扫描本地库时不会看到写了一半的文件。
pub struct StagingFile {
    path: PathBuf,
    buffer: Vec<u8>,
    buffer_size: usize,
    file_handle: Option<File>,
    total_written: u64,
}

impl StagingFile {
    pub fn create(path: impl Into<PathBuf>, buffer_size: usize) -> Result<Self, DownloadError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file_handle = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            buffer: Vec::with_capacity(buffer_size),
            buffer_size: buffer_size.max(1),
            file_handle: Some(file_handle),
            total_written: 0,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), DownloadError> {
        let mut offset = 0;
        while offset < data.len() {
            let to_copy = (self.buffer_size - self.buffer.len()).min(data.len() - offset);
            self.buffer.extend_from_slice(&data[offset..offset + to_copy]);
            offset += to_copy;
            if self.buffer.len() == self.buffer_size {
                self.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), DownloadError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let file = self
            .file_handle
            .as_mut()
            .ok_or_else(|| DownloadError::Unknown("临时文件已关闭".to_string()))?;
        file.write_all(&self.buffer)?;
        self.total_written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// 已写入（含缓冲区中）的字节数
    pub fn len(&self) -> u64 {
        self.total_written + self.buffer.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 刷盘并移动到目标位置，同名文件会被覆盖
    pub fn persist(mut self, destination: &Path) -> Result<PathBuf, DownloadError> {
        self.flush()?;
        if let Some(file) = self.file_handle.take() {
            file.sync_all()?;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.path, destination)?;
        Ok(destination.to_path_buf())
    }

    /// 放弃下载并删除临时文件
    pub fn discard(mut self) {
        self.buffer.clear();
        drop(self.file_handle.take());
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("删除临时文件失败 {}: {}", self.path.display(), e);
        }
    }
}
