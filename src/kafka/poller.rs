//! 拉模式轮询器
//!
//! 订阅成功后按固定间隔拉取一批消息，逐条交给处理器，每条处理完立即提交。
//! 拉取和处理都在消费循环内 await 完成，相邻两次拉取不会重叠。

use std::future;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::ConsumerError;
use crate::kafka::client::{NativeConsumer, commit_message};
use crate::kafka::handler::MessageHandler;
use crate::kafka::logger::SharedLogger;
use crate::kafka::options::ConsumerOptions;
use crate::metrics::ConsumerMetrics;

/// 轮询器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// 等待连接就绪
    Idle,
    /// 已订阅，尚未开始定时拉取
    Subscribed,
    /// 定时拉取中
    Polling,
    /// 已停止，不再拉取
    Stopped,
}

/// 单次拉取的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// 拉取失败，已记录错误
    Failed,
    /// 没有拿到消息
    Empty,
    /// 处理并提交了 n 条消息
    Delivered(usize),
}

/// 拉模式轮询器
#[derive(Debug)]
pub struct NonFlowingPoller {
    topic: String,
    period: Duration,
    batch_size: usize,
    interval: Option<Interval>,
    state: PollerState,
}

impl NonFlowingPoller {
    pub fn new(topic: impl Into<String>, period: Duration, batch_size: usize) -> Self {
        Self {
            topic: topic.into(),
            period,
            batch_size,
            interval: None,
            state: PollerState::Idle,
        }
    }

    pub fn from_options(options: &ConsumerOptions) -> Self {
        Self::new(
            options.topic(),
            options.interval_fetch_message(),
            options.num_msg_fetch_per_time(),
        )
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// 订阅完成
    pub fn mark_subscribed(&mut self) {
        if self.state == PollerState::Idle {
            self.state = PollerState::Subscribed;
        }
    }

    /// 开始定时拉取，第一次 tick 立即触发
    pub fn start(&mut self) {
        if self.state != PollerState::Subscribed {
            return;
        }
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.state = PollerState::Polling;
        info!(
            topic = %self.topic,
            interval_ms = self.period.as_millis() as u64,
            batch_size = self.batch_size,
            "Non-flowing poller started"
        );
    }

    /// 等待下一次 tick
    ///
    /// 未处于拉取状态时永远不会完成
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => future::pending::<()>().await,
        }
    }

    /// 停止拉取并释放定时器
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            debug!(topic = %self.topic, "Non-flowing poller stopped");
        }
        self.state = PollerState::Stopped;
    }

    /// 执行一次拉取
    ///
    /// 拉取失败和提交失败只记录日志；处理器返回错误时立即返回，该消息不提交
    pub async fn poll_once<C>(
        &self,
        client: &C,
        handler: &dyn MessageHandler,
        logger: Option<&SharedLogger>,
        metrics: &ConsumerMetrics,
    ) -> Result<PollOutcome, ConsumerError>
    where
        C: NativeConsumer + ?Sized,
    {
        let batch = match client.fetch(self.batch_size).await {
            Ok(Some(batch)) => batch,
            Ok(None) => return Ok(PollOutcome::Empty),
            Err(err) => {
                error!(topic = %self.topic, error = %err, "Failed to fetch messages");
                metrics.record_poll_error();
                if let Some(logger) = logger {
                    logger.error(&format!("Failed to fetch messages: {}", err));
                }
                return Ok(PollOutcome::Failed);
            }
        };

        if batch.is_empty() {
            return Ok(PollOutcome::Empty);
        }

        let count = batch.len();
        for message in batch {
            debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "Delivering message"
            );
            metrics.record_delivered();
            handler
                .handle(message.clone())
                .await
                .map_err(|err| ConsumerError::Handler(err.into()))?;

            commit_message(client, &message, logger, metrics).await;
        }

        Ok(PollOutcome::Delivered(count))
    }
}
