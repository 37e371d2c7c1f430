//! drivedown: 浏览云盘目录并下载文件到本地库
//!
//! 核心是 `core::DownloadCenter`：按文件ID去重的下载注册表，
//! 通过事件总线向任意数量的观察者发布进度、完成、取消与失败事件。

pub mod cli;
pub mod config;
pub mod core;
pub mod library;
pub mod provider;
pub mod ui;
pub mod utils;
