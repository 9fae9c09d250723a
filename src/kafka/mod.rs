//! Kafka 消费模块
//!
//! 提供配置校验、连接管理、拉模式轮询和推模式有序提交
//!
//! 基于 rdkafka 的原生客户端需要启用 `kafka` feature；消费引擎本身只依赖 `NativeConsumer` trait

pub mod client;
pub mod commit_queue;
pub mod connection;
pub mod consumer;
#[cfg(feature = "kafka")]
pub mod consumer_builder;
pub mod consumer_config;
pub mod events;
pub mod handler;
pub mod logger;
pub mod message;
pub mod options;
pub mod poller;

pub use client::{ClientFactory, NativeConsumer};
pub use commit_queue::{CommitEntry, FlowingCommitQueue, PartitionQueue};
pub use connection::ErrorSeverity;
pub use consumer::{Consumer, FlowingCommitter};
#[cfg(feature = "kafka")]
pub use consumer_builder::{BrokerEventContext, RdKafkaConsumer, RdKafkaFactory, build_kafka_consumer};
pub use consumer_config::{KafkaConsumerConfig, NativeClientConfig};
pub use events::{ClientEvent, EventBus, EventListener, EventSender, RebalanceKind, TopicPartitionOffset};
pub use handler::MessageHandler;
pub use logger::{ConsumerLogger, SharedLogger, TracingLogger};
pub use message::ConsumedMessage;
pub use options::{ConsumeMode, ConsumerOptions, RawConsumerOptions};
pub use poller::{NonFlowingPoller, PollOutcome, PollerState};
