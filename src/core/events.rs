//! 下载生命周期事件总线
//!
//! 同步发布：回调在调用 `publish` 的线程上按订阅顺序执行。回调执行时不持有订阅表的锁，
//! 因此回调内部可以安全地取消自己的订阅；本次发布已取出的回调仍会被调用。

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Finished,
    Canceled,
    Failed,
}

/// 单个文件的下载事件
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// 进度，取值 0.0..1.0
    Progress { file_id: String, value: f32 },
    Finished { file_id: String, path: PathBuf },
    Canceled { file_id: String },
    Failed { file_id: String, reason: String },
}

impl DownloadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DownloadEvent::Progress { .. } => EventKind::Progress,
            DownloadEvent::Finished { .. } => EventKind::Finished,
            DownloadEvent::Canceled { .. } => EventKind::Canceled,
            DownloadEvent::Failed { .. } => EventKind::Failed,
        }
    }

    pub fn file_id(&self) -> &str {
        match self {
            DownloadEvent::Progress { file_id, .. }
            | DownloadEvent::Finished { file_id, .. }
            | DownloadEvent::Canceled { file_id }
            | DownloadEvent::Failed { file_id, .. } => file_id,
        }
    }

    /// 终止事件之后该文件不会再有任何事件
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DownloadEvent::Progress { .. })
    }
}

/// 订阅过滤条件，`None` 表示不限
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub file_id: Option<String>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(kind: EventKind) -> Self {
        Self { kind: Some(kind), file_id: None }
    }

    pub fn file(file_id: impl Into<String>) -> Self {
        Self { kind: None, file_id: Some(file_id.into()) }
    }

    pub fn for_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    pub fn matches(&self, event: &DownloadEvent) -> bool {
        self.kind.map_or(true, |k| k == event.kind())
            && self.file_id.as_deref().map_or(true, |id| id == event.file_id())
    }
}

/// 订阅凭据，取消订阅时必须交回
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(Uuid);

type Callback = Arc<dyn Fn(&DownloadEvent) + Send + Sync>;

struct Subscriber {
    filter: EventFilter,
    callback: Callback,
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<(SubscriptionToken, Subscriber)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, filter: EventFilter, callback: F) -> SubscriptionToken
    where
        F: Fn(&DownloadEvent) + Send + Sync + 'static,
    {
        let token = SubscriptionToken(Uuid::new_v4());
        self.lock().push((token, Subscriber { filter, callback: Arc::new(callback) }));
        token
    }

    /// 返回该凭据此前是否有效，重复取消是无害的
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.lock();
        match subscribers.iter().position(|(t, _)| *t == token) {
            Some(index) => {
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn publish(&self, event: &DownloadEvent) {
        let targets: Vec<Callback> = self
            .lock()
            .iter()
            .filter(|(_, s)| s.filter.matches(event))
            .map(|(_, s)| s.callback.clone())
            .collect();
        log::trace!("发布事件 {:?} -> {} 个订阅者", event.kind(), targets.len());
        for callback in targets {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionToken, Subscriber)>> {
        // 回调在锁外执行，锁中毒只可能来自列表操作本身，数据仍然完整
        self.subscribers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn progress(id: &str, value: f32) -> DownloadEvent {
        DownloadEvent::Progress { file_id: id.to_string(), value }
    }

    #[test]
    fn test_filter_by_kind_and_file() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        bus.subscribe(EventFilter::kind(EventKind::Canceled).for_file("a"), move |e| {
            sink.lock().unwrap().push(e.clone());
        });

        bus.publish(&progress("a", 0.5));
        bus.publish(&DownloadEvent::Canceled { file_id: "b".to_string() });
        bus.publish(&DownloadEvent::Canceled { file_id: "a".to_string() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], DownloadEvent::Canceled { file_id: "a".to_string() });
    }

    #[test]
    fn test_unsubscribe_is_independent() {
        let bus = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let c1 = first.clone();
        let t1 = bus.subscribe(EventFilter::all(), move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = second.clone();
        bus.subscribe(EventFilter::all(), move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&progress("x", 0.1));
        assert!(bus.unsubscribe(t1));
        assert!(!bus.unsubscribe(t1));
        bus.publish(&progress("x", 0.2));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_callback_can_unsubscribe_itself() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let token_slot: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

        let inner_bus = bus.clone();
        let slot = token_slot.clone();
        let counter = hits.clone();
        let token = bus.subscribe(EventFilter::file("f"), move |event| {
            counter.fetch_add(1, Ordering::SeqCst);
            if event.is_terminal() {
                if let Some(token) = slot.lock().unwrap().take() {
                    inner_bus.unsubscribe(token);
                }
            }
        });
        *token_slot.lock().unwrap() = Some(token);

        bus.publish(&progress("f", 0.3));
        bus.publish(&DownloadEvent::Finished { file_id: "f".to_string(), path: PathBuf::from("/tmp/f") });
        bus.publish(&progress("f", 0.9));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_callbacks_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tokens = Vec::new();
        for n in 0..4 {
            let sink = order.clone();
            tokens.push(bus.subscribe(EventFilter::all(), move |_| sink.lock().unwrap().push(n)));
        }
        assert!(bus.unsubscribe(tokens[1]));

        bus.publish(&progress("x", 0.1));
        assert_eq!(*order.lock().unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(!progress("a", 0.0).is_terminal());
        assert!(DownloadEvent::Canceled { file_id: "a".into() }.is_terminal());
        assert!(DownloadEvent::Failed { file_id: "a".into(), reason: "io".into() }.is_terminal());
        assert_eq!(DownloadEvent::Canceled { file_id: "a".into() }.kind(), EventKind::Canceled);
    }
}
