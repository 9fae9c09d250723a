//! 消费者运行时框架
//!
//! 提供统一的消费者生命周期管理
//!
//! # 设计理念
//!
//! 1. **插件化任务系统**：通过 `Task` trait 支持不同类型的任务
//! 2. **并发任务管理**：使用 `JoinSet` 管理所有后台任务
//! 3. **优雅停机**：关闭信号通过 oneshot 通道发给每个任务，超时后强制终止
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use flare_kafka_consumer::runtime::ConsumerRuntime;
//!
//! # async fn run(task: flare_kafka_consumer::runtime::MessageConsumerTask) -> anyhow::Result<()> {
//! ConsumerRuntime::new("my-consumer-service")
//!     .add_task(Box::new(task))
//!     .run()
//!     .await
//! # }
//! ```

pub mod config;
pub mod runtime;
pub mod task;

pub use config::RuntimeConfig;
pub use runtime::ConsumerRuntime;
pub use task::{MessageConsumer, MessageConsumerTask, SpawnTask, Task, TaskResult};
