// Progress Event Bus
// 进程内同步发布/订阅：按注册顺序同步回调，不缓冲、不重放

use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use anyhow::Result;

use crate::domain::ProgressEvent;

// ============ Listener Trait ============

pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent) -> Result<()>;
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) -> Result<()> + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) -> Result<()> {
        self(event)
    }
}

/// 订阅句柄，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// ============ Event Bus ============

pub struct ProgressEventBus {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ProgressListener>)>>,
    next_id: AtomicU64,
}

impl ProgressEventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 订阅事件
    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push((id, listener));
        id
    }

    /// 取消订阅；句柄未知时返回 false
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        match self.listeners.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// 发布事件，返回被调用的监听器数量
    ///
    /// 监听器返回错误或 panic 时只记录日志，不会传播，也不会被移除
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        // 回调期间不持锁，监听器内部可以订阅/取消订阅
        let snapshot: Vec<(ListenerId, Arc<dyn ProgressListener>)> = match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        for (id, listener) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_progress(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(
                        listener = id.0,
                        operation_id = %event.operation_id,
                        status = event.status.as_str(),
                        "Progress listener error: {:?}",
                        e
                    );
                }
                Err(_) => {
                    tracing::error!(
                        listener = id.0,
                        operation_id = %event.operation_id,
                        status = event.status.as_str(),
                        "Progress listener panicked"
                    );
                }
            }
        }

        snapshot.len()
    }
}

impl Default for ProgressEventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============ 有界历史（UI 侧） ============

/// 保留最近 N 条事件的监听器
pub struct ProgressHistory {
    events: Mutex<VecDeque<ProgressEvent>>,
    limit: usize,
}

impl ProgressHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    /// 按时间顺序返回（最早的在前）
    pub fn snapshot(&self) -> Vec<ProgressEvent> {
        match self.events.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl ProgressListener for ProgressHistory {
    fn on_progress(&self, event: &ProgressEvent) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("progress history lock poisoned"))?;
        while events.len() >= self.limit {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}
