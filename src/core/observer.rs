//! 列表行等 UI 元素使用的下载观察者
//!
//! 每次 `attach` 恰好对应一次取消订阅：收到终止事件、重新 `attach`、`detach` 或被丢弃，
//! 以先发生者为准，之后的操作都是空操作。

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::events::{DownloadEvent, EventBus, EventFilter, SubscriptionToken};
use crate::core::item::CloudItem;

/// 观察者最后看到的状态
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverState {
    Idle,
    Progress(f32),
    Finished(PathBuf),
    Canceled,
    Failed(String),
}

impl From<&DownloadEvent> for ObserverState {
    fn from(event: &DownloadEvent) -> Self {
        match event {
            DownloadEvent::Progress { value, .. } => ObserverState::Progress(*value),
            DownloadEvent::Finished { path, .. } => ObserverState::Finished(path.clone()),
            DownloadEvent::Canceled { .. } => ObserverState::Canceled,
            DownloadEvent::Failed { reason, .. } => ObserverState::Failed(reason.clone()),
        }
    }
}

type EventHook = Arc<dyn Fn(&DownloadEvent) + Send + Sync>;
type TokenSlot = Arc<Mutex<Option<SubscriptionToken>>>;

pub struct DownloadObserver {
    bus: EventBus,
    state: Arc<Mutex<ObserverState>>,
    hook: Option<EventHook>,
    file_id: Option<String>,
    token: TokenSlot,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DownloadObserver {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            state: Arc::new(Mutex::new(ObserverState::Idle)),
            hook: None,
            file_id: None,
            token: Arc::new(Mutex::new(None)),
        }
    }

    /// 每个匹配事件在状态更新后调用 `hook`
    pub fn with_hook<F>(bus: EventBus, hook: F) -> Self
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        let mut observer = Self::new(bus);
        observer.hook = Some(Arc::new(hook));
        observer
    }

    /// 绑定到一个条目；已绑定时先解绑旧条目（列表行复用）
    pub fn attach(&mut self, item: &CloudItem) {
        self.detach();
        // 每次绑定使用新的状态槽，旧订阅正在执行的回调只会写到旧槽里
        self.state = Arc::new(Mutex::new(ObserverState::Idle));

        let token_slot: TokenSlot = Arc::new(Mutex::new(None));
        let bus = self.bus.clone();
        let state = self.state.clone();
        let hook = self.hook.clone();
        let slot = token_slot.clone();

        // 订阅期间持有槽位锁，另一线程上的终止事件要等令牌写入后才能取走它
        let mut guard = lock(&token_slot);
        *guard = Some(self.bus.subscribe(EventFilter::file(item.id.clone()), move |event| {
            *lock(&state) = ObserverState::from(event);
            if let Some(hook) = &hook {
                hook(event);
            }
            if event.is_terminal() {
                if let Some(token) = lock(&slot).take() {
                    bus.unsubscribe(token);
                }
            }
        }));
        drop(guard);

        self.file_id = Some(item.id.clone());
        self.token = token_slot;
    }

    /// 解绑，返回是否真的释放了一个订阅
    pub fn detach(&mut self) -> bool {
        self.file_id = None;
        let token = lock(&self.token).take();
        match token {
            Some(token) => self.bus.unsubscribe(token),
            None => false,
        }
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    pub fn is_subscribed(&self) -> bool {
        lock(&self.token).is_some()
    }

    pub fn state(&self) -> ObserverState {
        lock(&self.state).clone()
    }
}

impl Drop for DownloadObserver {
    fn drop(&mut self) {
        self.detach();
    }
}
