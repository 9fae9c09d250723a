//! 消费者统一错误类型

use super::broker::BrokerError;
use super::code::ErrorCode;
use super::validation::ValidationError;
use thiserror::Error;

/// 消费者统一错误类型
///
/// 只有配置、初始连接、订阅和业务处理器的错误会向上传播；
/// 拉取失败、提交失败和可恢复的 broker 错误在消费循环内部消化
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// 配置校验失败（构造阶段）
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// 原生客户端创建失败
    #[error("Failed to create Kafka consumer: {0}")]
    Configuration(#[source] BrokerError),

    /// 初始连接失败或超时，`trace` 为原始错误的诊断信息
    #[error("Cannot connect to Kafka.\n{trace}")]
    Connection { trace: String },

    /// 传输层故障，消费循环终止
    #[error(transparent)]
    FatalBroker(BrokerError),

    /// 订阅 topic 失败
    #[error("Failed to subscribe to Kafka topic: {0}")]
    Subscribe(#[source] BrokerError),

    /// 业务处理器返回错误
    #[error("Message handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 同一个消费者重复调用 listen
    #[error("Consumer is already listening")]
    AlreadyListening,

    /// 消费循环已经结束
    #[error("Consumer is closed")]
    Closed,
}

impl ConsumerError {
    /// 创建连接错误
    pub fn connection(trace: impl Into<String>) -> Self {
        ConsumerError::Connection {
            trace: trace.into(),
        }
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ConsumerError::Validation(_) => ErrorCode::InvalidParameter,
            ConsumerError::Configuration(_) => ErrorCode::ConfigurationError,
            ConsumerError::Connection { .. } => ErrorCode::ConnectionFailed,
            ConsumerError::FatalBroker(_) => ErrorCode::NetworkConnectionLost,
            ConsumerError::Subscribe(_) => ErrorCode::SubscriptionFailed,
            ConsumerError::Handler(_) => ErrorCode::MessageDeliveryFailed,
            ConsumerError::AlreadyListening => ErrorCode::OperationFailed,
            ConsumerError::Closed => ErrorCode::ConnectionClosed,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ConsumerError>;
