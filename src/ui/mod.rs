mod progress;

use std::fmt;
pub use progress::ProgressManager;

use crate::core::item::CloudItem;
use crate::core::transfer::TransferStatus;
use crate::provider::listing::FolderListing;

pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}

/// 本地库视图：进行中与已完成两部分
pub struct LibraryView<'a> {
    pub in_flight: &'a [TransferStatus],
    pub completed: &'a [CloudItem],
}

impl fmt::Display for LibraryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "下载中 ({}):", self.in_flight.len())?;
        for t in self.in_flight {
            let total = t.bytes_expected.map(format_size).unwrap_or_else(|| "?".to_string());
            writeln!(
                f,
                "  {:<40} {:>5.1}%  {} / {}",
                t.item.name,
                t.progress * 100.0,
                format_size(t.bytes_written),
                total
            )?;
        }
        writeln!(f, "已完成 ({}):", self.completed.len())?;
        for item in self.completed {
            writeln!(f, "  {:<40} {:>12}", item.name, format_size(item.size))?;
        }
        Ok(())
    }
}

/// 远程目录视图，文件夹在前
pub struct FolderView<'a>(pub &'a FolderListing);

impl fmt::Display for FolderView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for folder in &self.0.folders {
            writeln!(f, "[目录] {:<40} {}", folder.name, folder.id)?;
        }
        for file in &self.0.files {
            writeln!(f, "       {:<40} {}  {}", file.name, file.id, format_size(file.size_bytes()))?;
        }
        Ok(())
    }
}

pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
