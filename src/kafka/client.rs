//! 原生客户端接口
//!
//! 消费引擎只依赖这里定义的接口；基于 rdkafka 的实现见 `consumer_builder`（需要 `kafka` feature）

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::BrokerError;
use crate::kafka::consumer_config::NativeClientConfig;
use crate::kafka::events::EventSender;
use crate::kafka::logger::SharedLogger;
use crate::kafka::message::ConsumedMessage;
use crate::metrics::ConsumerMetrics;

/// 原生消费者客户端
#[async_trait]
pub trait NativeConsumer: Send + Sync + 'static {
    /// 建立连接（单次尝试）
    ///
    /// 返回时连接已建立；就绪信号通过 `ready` 事件异步发出
    async fn connect(&self, timeout: Duration) -> Result<(), BrokerError>;

    /// 订阅 topic
    async fn subscribe(&self, topics: &[String]) -> Result<(), BrokerError>;

    /// 拉取最多 `max_messages` 条消息
    ///
    /// `Ok(None)` 表示本次没有返回批次
    async fn fetch(&self, max_messages: usize)
        -> Result<Option<Vec<ConsumedMessage>>, BrokerError>;

    /// 开始连续投递，消息通过 `data` 事件送达
    async fn start_flowing(&self) -> Result<(), BrokerError>;

    /// 提交单条消息的 offset
    async fn commit(&self, message: &ConsumedMessage) -> Result<(), BrokerError>;

    /// 取消订阅
    async fn unsubscribe(&self) -> Result<(), BrokerError>;

    /// 断开连接
    async fn disconnect(&self) -> Result<(), BrokerError>;
}

/// 原生客户端工厂
pub trait ClientFactory {
    type Client: NativeConsumer;

    /// 用合并后的配置创建客户端，客户端通过 `events` 上报所有事件
    fn create(
        &self,
        config: &NativeClientConfig,
        events: EventSender,
    ) -> Result<Self::Client, BrokerError>;
}

impl<F, C> ClientFactory for F
where
    F: Fn(&NativeClientConfig, EventSender) -> Result<C, BrokerError>,
    C: NativeConsumer,
{
    type Client = C;

    fn create(
        &self,
        config: &NativeClientConfig,
        events: EventSender,
    ) -> Result<Self::Client, BrokerError> {
        self(config, events)
    }
}

/// 一次拉取预分配的最大批次容量，批次更大时按需增长
const MAX_BATCH_PREALLOCATION: usize = 1024;

/// 连续调用 `poll` 收集一批消息
///
/// 收满 `max_messages` 条或 `poll` 返回 `None` 时结束。第一次就失败时返回错误；
/// 已经拿到消息后再失败，返回已收集的部分
pub(crate) fn collect_batch<T, E, P>(max_messages: usize, mut poll: P) -> Result<Vec<T>, E>
where
    P: FnMut() -> Option<Result<T, E>>,
    E: fmt::Display,
{
    let mut batch = Vec::with_capacity(max_messages.min(MAX_BATCH_PREALLOCATION));
    while batch.len() < max_messages {
        match poll() {
            Some(Ok(message)) => batch.push(message),
            Some(Err(err)) if batch.is_empty() => return Err(err),
            Some(Err(err)) => {
                warn!(error = %err, fetched = batch.len(), "Poll failed, returning partial batch");
                break;
            }
            None => break,
        }
    }
    Ok(batch)
}

/// 提交一条消息并记录结果
///
/// 提交失败只记录日志和指标，不中断消费
pub(crate) async fn commit_message<C>(
    client: &C,
    message: &ConsumedMessage,
    logger: Option<&SharedLogger>,
    metrics: &ConsumerMetrics,
) -> bool
where
    C: NativeConsumer + ?Sized,
{
    match client.commit(message).await {
        Ok(()) => {
            debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Offset committed"
            );
            metrics.record_commit(true);
            true
        }
        Err(err) => {
            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %err,
                "Failed to commit offset"
            );
            metrics.record_commit(false);
            if let Some(logger) = logger {
                logger.error(&format!(
                    "Failed to commit offset {} on partition {}: {}",
                    message.offset, message.partition, err
                ));
            }
            false
        }
    }
}
