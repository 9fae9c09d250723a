//! 消费者运行时实现
//!
//! 统一管理一组消费者任务的生命周期：
//! - 启动所有任务
//! - 等待关闭信号（Ctrl+C 或自定义 Future）
//! - 任一任务失败时关闭其余任务
//! - 带超时的优雅停机

use std::future::Future;

use anyhow::{Result, anyhow};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::runtime::config::RuntimeConfig;
use crate::runtime::task::{MessageConsumer, MessageConsumerTask, SpawnTask, Task, TaskResult};

/// 消费者运行时
///
/// # 使用示例
/// ```rust,no_run
/// use std::sync::Arc;
/// use flare_kafka_consumer::kafka::{ConsumedMessage, Consumer, NativeConsumer};
/// use flare_kafka_consumer::runtime::ConsumerRuntime;
///
/// # async fn run<C: NativeConsumer>(consumer: Arc<Consumer<C>>) -> anyhow::Result<()> {
/// let task = consumer.into_task("orders", |message: ConsumedMessage| async move {
///     tracing::info!(offset = message.offset, "order received");
///     Ok::<_, anyhow::Error>(())
/// });
///
/// ConsumerRuntime::new("order-service")
///     .add_task(Box::new(task))
///     .run()
///     .await
/// # }
/// ```
pub struct ConsumerRuntime {
    service_name: String,
    tasks: Vec<Box<dyn Task>>,
    config: RuntimeConfig,
}

impl ConsumerRuntime {
    /// 创建新的运行时
    ///
    /// # 参数
    /// * `service_name` - 服务名称（用于日志）
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tasks: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// 设置运行时配置
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// 添加任务
    pub fn add_task(mut self, task: Box<dyn Task>) -> Self {
        info!(task_name = %task.name(), "Adding task to runtime");
        self.tasks.push(task);
        self
    }

    /// 添加消息消费者（使用 MessageConsumer trait）
    pub fn add_consumer(
        self,
        name: impl Into<String>,
        consumer: Box<dyn MessageConsumer + Send + Sync>,
    ) -> Self {
        self.add_task(Box::new(MessageConsumerTask::new(name, consumer)))
    }

    /// 添加需要关闭信号的自定义任务
    pub fn add_spawn_with_shutdown<F, Fut>(self, name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.add_task(Box::new(SpawnTask::with_shutdown(name, future_fn)))
    }

    /// 运行直到收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received (Ctrl+C)");
        })
        .await
    }

    /// 运行直到 `signal` 完成
    ///
    /// 任一任务返回错误时立即关闭所有任务，并返回该错误
    pub async fn run_until<S>(mut self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            service_name = %self.service_name,
            task_count = self.tasks.len(),
            "🚀 Starting consumer runtime"
        );

        let tasks = std::mem::take(&mut self.tasks);
        let (mut join_set, task_shutdowns) = Self::start_tasks(tasks);

        tokio::pin!(signal);
        let outcome = tokio::select! {
            _ = &mut signal => Ok(()),
            outcome = Self::wait_for_first_failure(&mut join_set) => outcome,
        };

        // 发送关闭信号给所有任务
        for tx in task_shutdowns {
            let _ = tx.send(());
        }

        Self::wait_for_tasks_shutdown(&self.config, &mut join_set).await;

        match &outcome {
            Ok(()) => info!(service_name = %self.service_name, "Consumer runtime stopped"),
            Err(e) => error!(
                service_name = %self.service_name,
                error = %e,
                "❌ Consumer runtime stopped after task failure"
            ),
        }
        outcome
    }

    /// 启动所有任务
    fn start_tasks(
        tasks: Vec<Box<dyn Task>>,
    ) -> (JoinSet<(String, TaskResult)>, Vec<oneshot::Sender<()>>) {
        let mut join_set = JoinSet::new();
        let mut task_shutdowns = Vec::with_capacity(tasks.len());

        for task in tasks {
            let task_name = task.name().to_string();
            let (task_shutdown_tx, task_shutdown_rx) = oneshot::channel();
            task_shutdowns.push(task_shutdown_tx);

            let task_future = task.run(task_shutdown_rx);

            join_set.spawn(async move {
                let result = task_future.await;
                match &result {
                    Ok(_) => {
                        info!(task_name = %task_name, "✅ Task completed");
                    }
                    Err(e) => {
                        error!(task_name = %task_name, error = %e, "❌ Task failed");
                    }
                }
                (task_name, result)
            });
        }

        (join_set, task_shutdowns)
    }

    /// 等待第一个失败的任务；全部正常结束时返回 Ok
    async fn wait_for_first_failure(join_set: &mut JoinSet<(String, TaskResult)>) -> Result<()> {
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((task_name, Err(e))) => {
                    return Err(anyhow!("Task '{}' failed: {}", task_name, e));
                }
                Err(e) => return Err(anyhow!("Task join error: {}", e)),
            }
        }
        info!("All tasks completed");
        Ok(())
    }

    /// 等待所有任务关闭
    async fn wait_for_tasks_shutdown(
        config: &RuntimeConfig,
        join_set: &mut JoinSet<(String, TaskResult)>,
    ) {
        match tokio::time::timeout(config.shutdown_timeout, async {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok((task_name, Ok(_))) => {
                        info!(task_name = %task_name, "Task completed gracefully");
                    }
                    Ok((task_name, Err(e))) => {
                        warn!(task_name = %task_name, "Task completed with error: {}", e);
                    }
                    Err(e) => {
                        warn!("Task join error: {}", e);
                    }
                }
            }
        })
        .await
        {
            Ok(_) => {
                info!("All tasks completed");
            }
            Err(_) => {
                warn!("Tasks shutdown timeout, forcing exit");
                join_set.abort_all();
            }
        }
    }
}
