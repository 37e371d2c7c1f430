//! CLI: 命令行参数解析与配置加载
//!
//! ## 支持的命令
//!
//! - 浏览目录：`drivedown ls [FOLDER_ID]`
//! - 下载文件：`drivedown get <FILE_ID>...`
//! - 查看本地库：`drivedown status`
//! - 删除已下载文件：`drivedown rm <NAME>`
//! - 编辑配置：`drivedown -e`
//!
//! ## 配置文件位置
//!
//! - Windows: `%APPDATA%/drivedown/drivedown.conf`
//! - macOS: `~/Library/Application Support/drivedown/drivedown.conf`
//! - Linux: `~/.config/drivedown/drivedown.conf`

use clap::{Parser, Subcommand};
use std::env;

use crate::config::Config;
use crate::core::error::DownloadError;

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/drivedown/drivedown.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/drivedown/drivedown.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/drivedown/drivedown.conf", home)
    }
}

/// 打开配置文件编辑器
pub fn open_config_in_editor(config_path: &str) {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("notepad").arg(config_path).status().ok();
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg("-e").arg(config_path).status().ok();
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // 优先 xdg-open，否则 nano
        if std::process::Command::new("xdg-open").arg(config_path).status().is_err() {
            let _ = std::process::Command::new("nano").arg(config_path).status();
        }
    }
}

/// drivedown 命令行参数
#[derive(Parser, Debug, Clone)]
#[command(
    name = "drivedown",
    version = env!("CARGO_PKG_VERSION"),
    about = "浏览 Google Drive 目录并下载文件到本地库",
    long_about = "浏览 Google Drive 目录并下载文件到本地库。\n\n示例：\n  drivedown ls\n  drivedown get 1AbCdEf\n  drivedown status\n  drivedown -e\n"
)]
pub struct Args {
    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, global = true, default_value_t = default_config_path())]
    pub config: String,

    /// 用系统默认编辑器打开配置文件并退出
    #[arg(short = 'e', long = "edit")]
    pub edit_config: bool,

    /// 下载目录，覆盖配置文件中的设置
    #[arg(short = 'd', long, global = true)]
    pub download_dir: Option<String>,

    /// 日志级别，覆盖配置文件中的设置
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 列出远程目录，省略ID时为根目录
    Ls {
        folder_id: Option<String>,
    },
    /// 下载一个或多个文件，Ctrl-C 取消全部
    Get {
        #[arg(required = true)]
        file_ids: Vec<String>,
    },
    /// 查看下载中与已完成的文件
    Status,
    /// 删除本地库中已下载的文件
    Rm {
        name: String,
    },
}

impl Args {
    /// 解析命令行参数并加载配置
    pub fn parse_args() -> Result<(Self, Config), DownloadError> {
        let args = Args::parse();
        if args.edit_config {
            // 编辑前确保文件存在
            Config::load(&args.config)?;
            open_config_in_editor(&args.config);
            std::process::exit(0);
        }
        let config = args.load_config()?;
        Ok((args, config))
    }

    pub fn load_config(&self) -> Result<Config, DownloadError> {
        let mut config = Config::load(&self.config)?;
        config.merge_from_args(self);
        config.validate()?;
        Ok(config)
    }
}
