//! 指标收集模块

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_delivered: u64,
    pub messages_committed: u64,
    pub commit_failures: u64,
    pub poll_errors: u64,
    pub recoverable_errors: u64,
    pub acknowledgments_ignored: u64,
}

#[derive(Debug, Default)]
struct Counters {
    messages_delivered: AtomicU64,
    messages_committed: AtomicU64,
    commit_failures: AtomicU64,
    poll_errors: AtomicU64,
    recoverable_errors: AtomicU64,
    acknowledgments_ignored: AtomicU64,
}

/// 消费者指标收集器
#[derive(Debug, Clone, Default)]
pub struct ConsumerMetrics {
    counters: Arc<Counters>,
}

impl ConsumerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 消息已交给处理器
    pub fn record_delivered(&self) {
        self.counters.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// 记录一次提交结果
    pub fn record_commit(&self, success: bool) {
        if success {
            self.counters.messages_committed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.commit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_poll_error(&self) {
        self.counters.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recoverable_error(&self) {
        self.counters.recoverable_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 确认的消息不在待提交队列中
    pub fn record_ignored_ack(&self) {
        self.counters
            .acknowledgments_ignored
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.counters;
        MetricsSnapshot {
            messages_delivered: c.messages_delivered.load(Ordering::Relaxed),
            messages_committed: c.messages_committed.load(Ordering::Relaxed),
            commit_failures: c.commit_failures.load(Ordering::Relaxed),
            poll_errors: c.poll_errors.load(Ordering::Relaxed),
            recoverable_errors: c.recoverable_errors.load(Ordering::Relaxed),
            acknowledgments_ignored: c.acknowledgments_ignored.load(Ordering::Relaxed),
        }
    }
}
