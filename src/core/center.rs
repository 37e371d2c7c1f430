use actix::prelude::*;
use std::sync::Arc;

use crate::core::error::DownloadError;
use crate::core::events::{DownloadEvent, EventBus, EventFilter, SubscriptionToken};
use crate::core::item::{CloudItem, ProviderKind};
use crate::core::observer::DownloadObserver;
use crate::core::registry::{
    DownloadRegistryActor, IsDownloading, ListInFlight, ListTransfers, RegisterProvider, StartDownload,
    StartOutcome, StopAll, StopDownloading, UnregisterProvider,
};
use crate::core::transfer::TransferStatus;
use crate::library::LocalLibrary;
use crate::provider::Provider;

/// 下载中心句柄
///
/// 由程序入口创建一次，克隆后交给各个使用方。
#[derive(Clone)]
pub struct DownloadCenter {
    registry: Addr<DownloadRegistryActor>,
    bus: EventBus,
    library: LocalLibrary,
}

impl DownloadCenter {
    /// 必须在 actix System 内调用
    pub fn start(library: LocalLibrary, providers: Vec<Arc<dyn Provider>>) -> Self {
        let bus = EventBus::new();
        let registry = providers
            .into_iter()
            .fold(DownloadRegistryActor::new(bus.clone(), library.clone()), |actor, p| actor.with_provider(p))
            .start();
        Self { registry, bus, library }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn library(&self) -> &LocalLibrary {
        &self.library
    }

    pub fn subscribe<F>(&self, filter: EventFilter, callback: F) -> SubscriptionToken
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(filter, callback)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.bus.unsubscribe(token)
    }

    pub fn observer(&self) -> DownloadObserver {
        DownloadObserver::new(self.bus.clone())
    }

    pub async fn is_downloading(&self, file_id: &str) -> Result<bool, DownloadError> {
        Ok(self.registry.send(IsDownloading { file_id: file_id.to_string() }).await?)
    }

    pub async fn start_download(&self, item: CloudItem) -> Result<StartOutcome, DownloadError> {
        self.registry.send(StartDownload { item }).await?
    }

    pub async fn stop_downloading(&self, item: CloudItem) -> Result<bool, DownloadError> {
        Ok(self.registry.send(StopDownloading { item }).await?)
    }

    pub async fn stop_all(&self) -> Result<usize, DownloadError> {
        Ok(self.registry.send(StopAll).await?)
    }

    pub async fn list_in_flight(&self) -> Result<Vec<CloudItem>, DownloadError> {
        Ok(self.registry.send(ListInFlight).await?)
    }

    pub async fn list_transfers(&self) -> Result<Vec<TransferStatus>, DownloadError> {
        Ok(self.registry.send(ListTransfers).await?)
    }

    pub fn list_completed(&self) -> Result<Vec<CloudItem>, DownloadError> {
        self.library.list_completed()
    }

    pub fn remove_completed(&self, name: &str) -> Result<(), DownloadError> {
        self.library.remove_completed(name)
    }

    pub async fn register_provider(&self, provider: Arc<dyn Provider>) -> Result<(), DownloadError> {
        Ok(self.registry.send(RegisterProvider(provider)).await?)
    }

    pub async fn unregister_provider(&self, kind: ProviderKind) -> Result<bool, DownloadError> {
        Ok(self.registry.send(UnregisterProvider(kind)).await?)
    }
}
