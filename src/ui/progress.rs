use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::events::DownloadEvent;
use crate::core::item::CloudItem;

const BAR_SCALE: u64 = 1000;

/// 终端进度条，每个下载一条，由下载事件驱动
#[derive(Clone)]
pub struct ProgressManager {
    multi: MultiProgress,
    bars: Arc<Mutex<HashMap<String, ProgressBar>>>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressManager {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 隐藏输出，测试时使用
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden()),
            bars: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 为条目创建进度条；该条目已有进度条时保留原来的，返回 false
    pub fn add(&self, item: &CloudItem) -> bool {
        let Ok(mut bars) = self.bars.lock() else {
            return false;
        };
        if bars.contains_key(&item.id) {
            return false;
        }
        let pb = self.multi.add(ProgressBar::new(BAR_SCALE));
        if let Ok(style) = ProgressStyle::with_template("{prefix:30!} [{bar:40.cyan/blue}] {percent:>3}% {msg}") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_prefix(item.name.clone());
        pb.set_message(if item.size > 0 { super::format_size(item.size) } else { "大小未知".to_string() });
        bars.insert(item.id.clone(), pb);
        true
    }

    /// 移除未能开始的下载的进度条
    pub fn remove(&self, file_id: &str) {
        let removed = self.bars.lock().ok().and_then(|mut bars| bars.remove(file_id));
        if let Some(pb) = removed {
            self.multi.remove(&pb);
        }
    }

    pub fn handle_event(&self, event: &DownloadEvent) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        match event {
            DownloadEvent::Progress { file_id, value } => {
                if let Some(pb) = bars.get(file_id) {
                    pb.set_position((value.clamp(0.0, 1.0) * BAR_SCALE as f32) as u64);
                }
            }
            DownloadEvent::Finished { file_id, path } => {
                if let Some(pb) = bars.remove(file_id) {
                    pb.set_position(BAR_SCALE);
                    pb.finish_with_message(format!("✓ {}", path.display()));
                }
            }
            DownloadEvent::Canceled { file_id } => {
                if let Some(pb) = bars.remove(file_id) {
                    pb.abandon_with_message("已取消");
                }
            }
            DownloadEvent::Failed { file_id, reason } => {
                if let Some(pb) = bars.remove(file_id) {
                    pb.abandon_with_message(format!("✗ {}", reason));
                }
            }
        }
    }

    pub fn active(&self) -> usize {
        self.bars.lock().map(|bars| bars.len()).unwrap_or(0)
    }
}
