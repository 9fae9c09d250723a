//! 错误代码和错误类别定义
//!
//! 沿用 flare 的分段编号，只保留消费链路会用到的代码

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 每个类别占用 1000 个编号：连接 1xxx、消息 4xxx、系统 6xxx、网络 7xxx、通用 9xxx
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    /// 初始连接失败或超时
    ConnectionFailed = 1000,
    /// 消费循环已结束
    ConnectionClosed = 1002,
    /// 业务处理器返回错误
    MessageDeliveryFailed = 4001,
    SubscriptionFailed = 4007,
    /// 原生客户端创建失败
    ConfigurationError = 6003,
    /// 传输层故障
    NetworkConnectionLost = 7003,
    /// 配置校验失败
    InvalidParameter = 9001,
    OperationFailed = 9003,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionFailed => "CONNECTION_FAILED",
            ErrorCode::ConnectionClosed => "CONNECTION_CLOSED",
            ErrorCode::MessageDeliveryFailed => "MESSAGE_DELIVERY_FAILED",
            ErrorCode::SubscriptionFailed => "SUBSCRIPTION_FAILED",
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::NetworkConnectionLost => "NETWORK_CONNECTION_LOST",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Connection,
            4000..=4999 => ErrorCategory::Message,
            6000..=6999 => ErrorCategory::System,
            7000..=7999 => ErrorCategory::Network,
            _ => ErrorCategory::General,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 消费者内部从不重试，这里只给调用方（例如进程级重启策略）参考
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::ConnectionFailed | ErrorCode::NetworkConnectionLost
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Connection,
    Message,
    System,
    Network,
    General,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Connection => write!(f, "CONNECTION"),
            ErrorCategory::Message => write!(f, "MESSAGE"),
            ErrorCategory::System => write!(f, "SYSTEM"),
            ErrorCategory::Network => write!(f, "NETWORK"),
            ErrorCategory::General => write!(f, "GENERAL"),
        }
    }
}
