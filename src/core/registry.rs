//! 下载注册表 Actor
//!
//! 进程内唯一的下载中心。所有对传输表的修改和事件发布都在这个 Actor 的消息处理里完成，
//! 对观察者来说是原子的：取消时移除记录与发布 `Canceled` 在同一条消息内完成，
//! 之后到达的同一传输的回调会被忽略。

use actix::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::DownloadError;
use crate::core::events::{DownloadEvent, EventBus};
use crate::core::item::{CloudItem, ProviderKind};
use crate::core::transfer::{Transfer, TransferReporter, TransferStatus};
use crate::library::LocalLibrary;
use crate::provider::{FetchRequest, Provider};
use crate::utils::validator::validate_item;

/// 全局下载注册表 Actor
pub struct DownloadRegistryActor {
    bus: EventBus,
    library: LocalLibrary,
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    transfers: HashMap<String, Transfer>,
    next_seq: u64,
}

impl Actor for DownloadRegistryActor {
    type Context = Context<Self>;
}

impl DownloadRegistryActor {
    pub fn new(bus: EventBus, library: LocalLibrary) -> Self {
        Self {
            bus,
            library,
            providers: HashMap::new(),
            transfers: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// 取出与回调匹配的传输；已取消的旧传输的回调不会命中
    fn tracked_mut(&mut self, file_id: &str, transfer_id: Uuid) -> Option<&mut Transfer> {
        match self.transfers.get_mut(file_id) {
            Some(t) if t.transfer_id == transfer_id => Some(t),
            _ => {
                log::debug!("忽略已结束传输的回调: {} ({})", file_id, transfer_id);
                None
            }
        }
    }

    fn finish(&mut self, file_id: &str, path: PathBuf) {
        if self.transfers.remove(file_id).is_some() {
            log::info!("下载完成: {} -> {}", file_id, path.display());
            self.bus.publish(&DownloadEvent::Finished { file_id: file_id.to_string(), path });
        }
    }

    fn cancel(&mut self, file_id: &str) -> bool {
        match self.transfers.remove(file_id) {
            Some(transfer) => {
                transfer.cancel();
                log::info!("下载已取消: {} ({})", file_id, transfer.item.name);
                self.bus.publish(&DownloadEvent::Canceled { file_id: file_id.to_string() });
                true
            }
            None => false,
        }
    }

    fn fail(&mut self, file_id: &str, error: DownloadError) {
        if let Some(transfer) = self.transfers.remove(file_id) {
            transfer.cancel();
            log::error!("下载失败: {} ({}): {}", file_id, transfer.item.name, error);
            self.bus.publish(&DownloadEvent::Failed {
                file_id: file_id.to_string(),
                reason: error.to_string(),
            });
        }
    }

    fn sorted_transfers(&self) -> Vec<&Transfer> {
        let mut list: Vec<&Transfer> = self.transfers.values().collect();
        list.sort_by_key(|t| t.seq);
        list
    }
}

/// `start_download` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// 该文件已在下载中，没有发起新的传输
    AlreadyDownloading,
}

/// 查询文件是否在下载中
pub struct IsDownloading { pub file_id: String }
impl Message for IsDownloading { type Result = bool; }
impl Handler<IsDownloading> for DownloadRegistryActor {
    type Result = bool;
    fn handle(&mut self, msg: IsDownloading, _ctx: &mut Self::Context) -> bool {
        self.transfers.contains_key(&msg.file_id)
    }
}

/// 开始下载
pub struct StartDownload { pub item: CloudItem }
impl Message for StartDownload { type Result = Result<StartOutcome, DownloadError>; }
impl Handler<StartDownload> for DownloadRegistryActor {
    type Result = Result<StartOutcome, DownloadError>;
    fn handle(&mut self, msg: StartDownload, ctx: &mut Self::Context) -> Self::Result {
        let item = msg.item;
        validate_item(&item)?;
        if self.transfers.contains_key(&item.id) {
            log::debug!("重复的下载请求，忽略: {}", item.id);
            return Ok(StartOutcome::AlreadyDownloading);
        }
        let provider = match self.providers.get(&item.provider) {
            Some(p) => p.clone(),
            None => {
                log::warn!("没有可用的存储后端 {}，无法下载 {}", item.provider, item.name);
                return Err(DownloadError::UnsupportedProvider(item.provider));
            }
        };

        let transfer_id = Uuid::new_v4();
        let destination = self.library.destination_for(&item);
        let reporter = TransferReporter::new(ctx.address(), item.id.clone(), transfer_id);
        let request = FetchRequest { item: item.clone(), destination: destination.clone() };
        let cancel = provider.fetch(request, reporter)?;

        log::info!("开始下载: {} ({}) -> {}", item.name, item.id, destination.display());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.transfers.insert(item.id.clone(), Transfer::new(transfer_id, item, destination, cancel, seq));
        Ok(StartOutcome::Started)
    }
}

/// 取消下载，返回是否真的取消了一个传输
pub struct StopDownloading { pub item: CloudItem }
impl Message for StopDownloading { type Result = bool; }
impl Handler<StopDownloading> for DownloadRegistryActor {
    type Result = bool;
    fn handle(&mut self, msg: StopDownloading, _ctx: &mut Self::Context) -> bool {
        self.cancel(&msg.item.id)
    }
}

/// 取消所有下载
pub struct StopAll;
impl Message for StopAll { type Result = usize; }
impl Handler<StopAll> for DownloadRegistryActor {
    type Result = usize;
    fn handle(&mut self, _msg: StopAll, _ctx: &mut Self::Context) -> usize {
        let ids: Vec<String> = self.sorted_transfers().iter().map(|t| t.file_id().to_string()).collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }
}

/// 查询进行中的下载条目
pub struct ListInFlight;
impl Message for ListInFlight { type Result = Vec<CloudItem>; }
impl Handler<ListInFlight> for DownloadRegistryActor {
    type Result = MessageResult<ListInFlight>;
    fn handle(&mut self, _msg: ListInFlight, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.sorted_transfers().into_iter().map(|t| t.item.clone()).collect())
    }
}

/// 查询进行中下载的详细进度
pub struct ListTransfers;
impl Message for ListTransfers { type Result = Vec<TransferStatus>; }
impl Handler<ListTransfers> for DownloadRegistryActor {
    type Result = MessageResult<ListTransfers>;
    fn handle(&mut self, _msg: ListTransfers, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.sorted_transfers().into_iter().map(Transfer::status).collect())
    }
}

/// 注册（或替换）存储后端，登录成功时使用
pub struct RegisterProvider(pub Arc<dyn Provider>);
impl Message for RegisterProvider { type Result = (); }
impl Handler<RegisterProvider> for DownloadRegistryActor {
    type Result = ();
    fn handle(&mut self, msg: RegisterProvider, _ctx: &mut Self::Context) {
        log::info!("注册存储后端: {}", msg.0.kind());
        self.providers.insert(msg.0.kind(), msg.0);
    }
}

/// 注销存储后端，退出登录时使用；进行中的下载不受影响
pub struct UnregisterProvider(pub ProviderKind);
impl Message for UnregisterProvider { type Result = bool; }
impl Handler<UnregisterProvider> for DownloadRegistryActor {
    type Result = bool;
    fn handle(&mut self, msg: UnregisterProvider, _ctx: &mut Self::Context) -> bool {
        self.providers.remove(&msg.0).is_some()
    }
}

/// 提供者的进度回调
pub struct TransferProgress {
    pub file_id: String,
    pub transfer_id: Uuid,
    pub bytes_written: u64,
    pub bytes_expected: Option<u64>,
}
impl Message for TransferProgress { type Result = (); }
impl Handler<TransferProgress> for DownloadRegistryActor {
    type Result = ();
    fn handle(&mut self, msg: TransferProgress, _ctx: &mut Self::Context) {
        let Some(transfer) = self.tracked_mut(&msg.file_id, msg.transfer_id) else {
            return;
        };
        let value = match transfer.record(msg.bytes_written, msg.bytes_expected) {
            Some(v) => v,
            None => {
                log::debug!("{} 总大小未知，已写入 {} 字节", msg.file_id, msg.bytes_written);
                return;
            }
        };
        if value >= 1.0 {
            // 进度已满即视为完成，之后的完成回调会被忽略
            let destination = transfer.destination.clone();
            self.finish(&msg.file_id, destination);
            return;
        }
        if value < transfer.last_progress {
            return;
        }
        transfer.last_progress = value;
        self.bus.publish(&DownloadEvent::Progress { file_id: msg.file_id, value });
    }
}

/// 提供者的终止回调
pub struct TransferCompleted {
    pub file_id: String,
    pub transfer_id: Uuid,
    pub result: Result<PathBuf, DownloadError>,
}
impl Message for TransferCompleted { type Result = (); }
impl Handler<TransferCompleted> for DownloadRegistryActor {
    type Result = ();
    fn handle(&mut self, msg: TransferCompleted, _ctx: &mut Self::Context) {
        if self.tracked_mut(&msg.file_id, msg.transfer_id).is_none() {
            return;
        }
        match msg.result {
            Ok(path) => self.finish(&msg.file_id, path),
            Err(e) if e.is_cancelled() => {
                self.cancel(&msg.file_id);
            }
            Err(e) => self.fail(&msg.file_id, e),
        }
    }
}
