//! Flare Kafka Consumer Library
//!
//! Kafka 消费抽象：配置校验、连接生命周期管理、拉模式（non-flowing）定时拉取，
//! 以及推模式（flowing）下按分区连续确认的有序提交。

pub mod error;
pub mod kafka;
pub mod metrics;

// 消费者运行时框架
pub mod runtime;

// Re-exports
pub use error::{
    BrokerError, BrokerErrorKind, ConsumerError, ErrorCategory, ErrorCode, Result, ValidationError,
};
pub use kafka::{
    ClientEvent, ConsumeMode, ConsumedMessage, Consumer, ConsumerLogger, ConsumerOptions,
    FlowingCommitQueue, FlowingCommitter, MessageHandler, NativeConsumer, NonFlowingPoller,
    RawConsumerOptions,
};
pub use metrics::{ConsumerMetrics, MetricsSnapshot};

// 运行时框架 re-exports
pub use runtime::ConsumerRuntime;
pub use runtime::task::{MessageConsumer, MessageConsumerTask, SpawnTask, Task};
