//! Core: 下载生命周期管理——注册表 Actor、事件总线、观察者与错误类型

pub mod center;
pub mod error;
pub mod events;
pub mod item;
pub mod observer;
pub mod registry;
pub mod transfer;

pub use center::DownloadCenter;
pub use error::{DownloadError, DownloadResult};
pub use events::{DownloadEvent, EventBus, EventFilter, EventKind, SubscriptionToken};
pub use item::{CloudItem, ProviderKind};
pub use observer::{DownloadObserver, ObserverState};
pub use registry::{DownloadRegistryActor, StartOutcome};
pub use transfer::{CancelHandle, TransferReporter, TransferStatus};
