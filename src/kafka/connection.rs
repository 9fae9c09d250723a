//! 连接管理
//!
//! 负责单次建连（带超时）以及 broker 错误的致命/可恢复分类

use std::time::Duration;

use tracing::{error, info};

use crate::error::{BrokerError, ConsumerError};
use crate::kafka::client::NativeConsumer;
use crate::kafka::options::ConsumerOptions;

/// broker 错误的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 传输层故障，终止消费循环并交给调用方处理
    Fatal,
    /// 记录告警后继续消费
    Recoverable,
}

/// 对 broker 错误分类
pub fn classify(error: &BrokerError) -> ErrorSeverity {
    if error.is_transport_failure() {
        ErrorSeverity::Fatal
    } else {
        ErrorSeverity::Recoverable
    }
}

/// 建立连接
///
/// 只尝试一次，失败或超时都返回 `ConsumerError::Connection`，其中带有原始错误的诊断信息
pub async fn open<C>(client: &C, options: &ConsumerOptions) -> Result<(), ConsumerError>
where
    C: NativeConsumer + ?Sized,
{
    let timeout = options.connect_timeout();

    match tokio::time::timeout(timeout, client.connect(timeout)).await {
        Ok(Ok(())) => {
            info!(
                consumer = %options.name(),
                host = %options.host(),
                group_id = %options.group_id(),
                "Connected to Kafka"
            );
            if let Some(logger) = options.logger() {
                logger.debug(&format!("Consumer '{}' connected to Kafka", options.name()));
            }
            Ok(())
        }
        Ok(Err(err)) => {
            error!(
                consumer = %options.name(),
                host = %options.host(),
                error = %err,
                "Failed to connect to Kafka"
            );
            Err(ConsumerError::connection(err.diagnostic()))
        }
        Err(_) => {
            error!(
                consumer = %options.name(),
                host = %options.host(),
                timeout_ms = options.connect_timeout_ms(),
                "Kafka connect timed out"
            );
            Err(ConsumerError::connection(timeout_trace(timeout)))
        }
    }
}

fn timeout_trace(timeout: Duration) -> String {
    format!(
        "Error: Connect timed out after {}ms",
        timeout.as_millis()
    )
}
