use regex::Regex;
use std::sync::OnceLock;

use crate::core::error::DownloadError;
use crate::core::item::CloudItem;

fn reserved_chars() -> &'static Regex {
    static RESERVED: OnceLock<Regex> = OnceLock::new();
    RESERVED.get_or_init(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).expect("静态正则"))
}

/// 发起下载前的条目校验
pub fn validate_item(item: &CloudItem) -> Result<(), DownloadError> {
    if item.id.trim().is_empty() {
        return Err(DownloadError::InvalidItem(format!("文件 {} 缺少远程ID", item.name)));
    }
    Ok(())
}

/// 把远程显示名称转换成安全的本地文件名
///
/// 路径分隔符与保留字符替换为 `_`，开头的 `.` 也会替换，避免文件被当作隐藏文件而扫描不到。
pub fn sanitize_file_name(name: &str, fallback_id: &str) -> String {
    let mut cleaned = reserved_chars().replace_all(name.trim(), "_").into_owned();
    if cleaned.starts_with('.') {
        cleaned.replace_range(..1, "_");
    }
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        format!("download-{}", reserved_chars().replace_all(fallback_id, "_"))
    } else {
        cleaned
    }
}

/// 本地库中的文件名必须是单个路径组件
pub fn validate_library_name(name: &str) -> Result<(), DownloadError> {
    if name.is_empty() || name == "." || name == ".." || reserved_chars().is_match(name) {
        return Err(DownloadError::InvalidItem(format!("无效的文件名: {:?}", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ProviderKind;

    #[test]
    fn test_item_validation() {
        assert!(validate_item(&CloudItem::new("abc", "a.pdf", 0, ProviderKind::GoogleDrive)).is_ok());
        assert!(validate_item(&CloudItem::local("a.pdf", 0)).is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("report.pdf", "x"), "report.pdf");
        assert_eq!(sanitize_file_name("a/b\\c:d.txt", "x"), "a_b_c_d.txt");
        assert_eq!(sanitize_file_name(".bashrc", "x"), "_bashrc");
        assert_eq!(sanitize_file_name("..", "id9"), "download-id9");
        assert_eq!(sanitize_file_name("   ", "id9"), "download-id9");
    }

    #[test]
    fn test_library_name_validation() {
        assert!(validate_library_name("a.pdf").is_ok());
        assert!(validate_library_name("../etc/passwd").is_err());
        assert!(validate_library_name("..").is_err());
        assert!(validate_library_name("").is_err());
    }
}
