//! 可注入的日志能力
//!
//! 消费者内部的运行日志始终走 `tracing`；`ConsumerLogger` 只接收需要调用方感知的
//! 几类事件（可恢复的 broker 错误、拉取失败、提交失败以及连接生命周期节点）

use std::fmt;
use std::sync::Arc;

/// 调用方注入的日志接口
pub trait ConsumerLogger: Send + Sync {
    fn debug(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// 转发到 `tracing` 的默认实现
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    consumer: String,
}

impl TracingLogger {
    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
        }
    }
}

impl ConsumerLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(consumer = %self.consumer, "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(consumer = %self.consumer, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(consumer = %self.consumer, "{}", message);
    }
}

/// 可共享的日志句柄
#[derive(Clone)]
pub struct SharedLogger(Arc<dyn ConsumerLogger>);

impl SharedLogger {
    pub fn new(logger: impl ConsumerLogger + 'static) -> Self {
        Self(Arc::new(logger))
    }
}

impl From<Arc<dyn ConsumerLogger>> for SharedLogger {
    fn from(logger: Arc<dyn ConsumerLogger>) -> Self {
        Self(logger)
    }
}

impl std::ops::Deref for SharedLogger {
    type Target = dyn ConsumerLogger;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for SharedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedLogger")
    }
}
