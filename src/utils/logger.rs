use chrono::Local;
use env_logger::{Builder, Target};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::core::error::DownloadError;

/// 初始化日志
///
/// 级别取自配置，`RUST_LOG` 存在时优先；配置了日志文件时写入文件，
/// 启动时文件超过 `log_max_size` 会先轮转为 `.backup`。
pub fn init(config: &Config) -> Result<(), DownloadError> {
    let mut builder = Builder::new();
    builder.parse_filters(&config.log_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if !config.log_file.trim().is_empty() {
        let path = Path::new(&config.log_file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        rotate_if_needed(path, config.log_max_size)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| DownloadError::Config(format!("日志初始化失败: {}", e)))
}

/// 超过大小上限时把当前日志重命名为 `<file>.backup`
pub fn rotate_if_needed(path: &Path, max_size: u64) -> Result<bool, DownloadError> {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if max_size == 0 || size <= max_size {
        return Ok(false);
    }
    let backup = path.with_file_name(format!(
        "{}.backup",
        path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    ));
    if backup.exists() {
        fs::remove_file(&backup)?;
    }
    fs::rename(path, &backup)?;
    Ok(true)
}
