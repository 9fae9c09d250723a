//! Broker 侧错误
//!
//! 原生客户端上报的所有错误都归一为 `BrokerError`，并在构造时完成致命/可恢复分类

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 判定为传输层故障的消息特征（大小写不敏感）
const TRANSPORT_FAILURE_MARKER: &str = "broker transport failure";

/// Broker 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerErrorKind {
    /// 传输层故障，连接已不可用
    Transport,
    /// 其他错误，消费可以继续
    Other,
}

/// 原生客户端上报的错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BrokerError {
    kind: BrokerErrorKind,
    message: String,
    trace: Option<String>,
}

impl BrokerError {
    /// 根据错误消息创建错误，并按消息内容分类
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.to_lowercase().contains(TRANSPORT_FAILURE_MARKER) {
            BrokerErrorKind::Transport
        } else {
            BrokerErrorKind::Other
        };
        Self {
            kind,
            message,
            trace: None,
        }
    }

    /// 创建传输层故障错误
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: BrokerErrorKind::Transport,
            message: message.into(),
            trace: None,
        }
    }

    /// 附加诊断信息（例如原生客户端的调试输出）
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn kind(&self) -> BrokerErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    /// 是否为传输层故障
    pub fn is_transport_failure(&self) -> bool {
        self.kind == BrokerErrorKind::Transport
    }

    /// 完整诊断文本：错误消息加上原始调用栈/调试信息
    pub fn diagnostic(&self) -> String {
        match &self.trace {
            Some(trace) => format!("Error: {}\n{}", self.message, trace),
            None => format!("Error: {}", self.message),
        }
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for BrokerError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        use rdkafka::types::RDKafkaErrorCode;

        let transport = matches!(
            err.rdkafka_error_code(),
            Some(RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::AllBrokersDown)
        );
        let base = if transport {
            BrokerError::transport(err.to_string())
        } else {
            BrokerError::new(err.to_string())
        };
        base.with_trace(format!("{:?}", err))
    }
}
