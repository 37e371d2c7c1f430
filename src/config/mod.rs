use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::DownloadError;

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 已完成下载的存放目录
    pub download_dir: String,
    /// 下载中临时文件目录，留空则使用 `<download_dir>/.staging`
    pub staging_dir: String,
    /// Google API 地址
    pub api_base: String,
    /// 访问令牌，环境变量 GDRIVE_ACCESS_TOKEN 优先
    pub access_token: String,
    /// 网络超时时间（秒）
    pub timeout: u64,
    /// User-Agent
    pub user_agent: String,
    /// 列表分页大小
    pub page_size: u32,
    /// 日志文件，留空只输出到终端
    pub log_file: String,
    /// 日志级别
    pub log_level: String,
    /// 日志文件轮转大小（字节）
    pub log_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: "./downloads".to_string(),
            staging_dir: String::new(),
            api_base: "https://www.googleapis.com".to_string(),
            access_token: String::new(),
            timeout: 30,
            user_agent: concat!("drivedown/", env!("CARGO_PKG_VERSION")).to_string(),
            page_size: 100,
            log_file: "logs/drivedown.log".to_string(),
            log_level: "info".to_string(),
            log_max_size: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 加载配置文件，不存在时写入默认配置
    pub fn load(path: &str) -> Result<Self, DownloadError> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| DownloadError::Config(format!("配置文件格式错误 {}: {}", path, e)))
        } else {
            let config = Config::default();
            config.save_with_tutorial(path)?;
            Ok(config)
        }
    }

    /// 保存带说明的配置文件
    pub fn save_with_tutorial(&self, path: &str) -> Result<(), DownloadError> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| DownloadError::Config(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(path, full_content)?;
        Ok(())
    }

    fn generate_tutorial_content() -> String {
        r#"# drivedown 配置文件
# ====================
#
# TOML 格式。命令行参数会覆盖配置文件中的设置，优先级：命令行 > 配置文件 > 默认值
#
# download_dir   已完成下载的存放目录
# staging_dir    下载中临时文件目录，留空则为 <download_dir>/.staging
#                建议与 download_dir 位于同一磁盘，完成时才能原子地移动文件
# api_base       Google API 地址
# access_token   OAuth 访问令牌，也可以通过环境变量 GDRIVE_ACCESS_TOKEN 提供
#                未设置时无法浏览或下载云端文件
# timeout        网络超时时间（秒）
# page_size      目录列表每页条目数（1-1000）
# log_file       日志文件，留空只输出到终端
# log_level      error / warn / info / debug / trace
# log_max_size   日志文件超过该大小（字节）时轮转为 .backup
#
# 使用示例：
#   drivedown ls                       # 列出根目录
#   drivedown ls <FOLDER_ID>           # 列出子目录
#   drivedown get <FILE_ID> ...        # 下载文件，Ctrl-C 取消
#   drivedown status                   # 查看本地库
#   drivedown rm report.pdf            # 删除已下载的文件
"#
        .to_string()
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.download_dir.trim().is_empty() {
            return Err(DownloadError::Config("下载目录不能为空".to_string()));
        }
        if self.timeout == 0 {
            return Err(DownloadError::Config("超时时间必须大于0".to_string()));
        }
        if self.page_size == 0 || self.page_size > 1000 {
            return Err(DownloadError::Config("分页大小必须在 1-1000 之间".to_string()));
        }
        url::Url::parse(&self.api_base)
            .map_err(|e| DownloadError::Config(format!("无效的 api_base {}: {}", self.api_base, e)))?;
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(DownloadError::Config(format!("无效的日志级别: {}", self.log_level)));
        }
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(dir) = &args.download_dir {
            self.download_dir = dir.clone();
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn library_path(&self) -> PathBuf {
        PathBuf::from(&self.download_dir)
    }

    pub fn staging_path(&self) -> PathBuf {
        if self.staging_dir.trim().is_empty() {
            self.library_path().join(".staging")
        } else {
            PathBuf::from(&self.staging_dir)
        }
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 下载目录: {}\n\
            - 临时目录: {}\n\
            - API 地址: {}\n\
            - 访问令牌: {}\n\
            - 超时时间: {} 秒\n\
            - 日志级别: {}",
            self.download_dir,
            self.staging_path().display(),
            self.api_base,
            if self.access_token.is_empty() { "未设置" } else { "已设置" },
            self.timeout,
            self.log_level,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.timeout, 30);
        assert_eq!(config.page_size, 100);
        assert!(config.validate().is_ok());
        assert_eq!(config.staging_path(), PathBuf::from("./downloads").join(".staging"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.timeout = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.page_size = 5000;
        assert!(config.validate().is_err());

        config = Config::default();
        config.api_base = "not a url".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("drivedown.conf");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.download_dir = "/data/drive".to_string();
        config.save_with_tutorial(path).expect("保存配置失败");

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("drivedown 配置文件"));

        let loaded = Config::load(path).expect("加载配置失败");
        assert_eq!(loaded.download_dir, "/data/drive");
        assert_eq!(loaded.page_size, config.page_size);
    }

    #[test]
    fn test_missing_config_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivedown.conf");
        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        assert_eq!(loaded.download_dir, Config::default().download_dir);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("download_dir = \"/srv/files\"\nstaging_dir = \"/srv/tmp\"").unwrap();
        assert_eq!(config.timeout, 30);
        assert_eq!(config.staging_path(), PathBuf::from("/srv/tmp"));
    }

    #[test]
    fn test_config_summary() {
        let summary = Config::default().get_summary();
        assert!(summary.contains("配置摘要"));
        assert!(summary.contains("未设置"));
    }
}
