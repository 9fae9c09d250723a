//! 任务定义模块
//!
//! 运行时管理的任务抽象：消息消费者任务，以及包装任意 Future 的 spawn 任务

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;

/// 任务执行结果
pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 任务 trait
///
/// 所有需要在运行时中管理的任务都必须实现此 trait
pub trait Task: Send {
    /// 获取任务名称
    fn name(&self) -> &str;

    /// 运行任务
    ///
    /// # 参数
    /// * `shutdown_rx` - 关闭信号接收器，当收到信号时任务应该优雅关闭
    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>;
}

// -------- Message Consumer Task --------

/// 消息消费者 trait
pub trait MessageConsumer: Send + Sync {
    /// 消费消息，直到 `shutdown_rx` 收到信号或者出错
    fn consume(
        &self,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>;
}

/// 消息消费者任务
///
/// 将实现了 `MessageConsumer` trait 的对象包装成 `Task`
pub struct MessageConsumerTask {
    name: String,
    consumer: Box<dyn MessageConsumer + Send + Sync>,
}

impl MessageConsumerTask {
    pub fn new(name: impl Into<String>, consumer: Box<dyn MessageConsumer + Send + Sync>) -> Self {
        Self {
            name: name.into(),
            consumer,
        }
    }
}

impl Task for MessageConsumerTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        Box::pin(async move { self.consumer.consume(shutdown_rx).await })
    }
}

// -------- Spawn Task --------

type TaskFn =
    Box<dyn FnOnce(oneshot::Receiver<()>) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> + Send>;

/// Spawn 任务
///
/// 用闭包延迟构建 Future，在 run 时传入 shutdown_rx
pub struct SpawnTask {
    name: String,
    future_fn: TaskFn,
}

impl SpawnTask {
    /// 创建不关心关闭信号的任务
    pub fn new<Fut>(name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future_fn: Box::new(move |_shutdown_rx| Box::pin(future)),
        }
    }

    /// 创建需要关闭信号的任务
    pub fn with_shutdown<F, Fut>(name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future_fn: Box::new(move |shutdown_rx| Box::pin(future_fn(shutdown_rx))),
        }
    }
}

impl Task for SpawnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        (self.future_fn)(shutdown_rx)
    }
}
