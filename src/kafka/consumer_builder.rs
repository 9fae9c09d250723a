//! Kafka 消费者构建器
//!
//! 基于 rdkafka `BaseConsumer` 的原生客户端实现。rdkafka 的回调通过 `BrokerEventContext`
//! 转换成 `ClientEvent`，阻塞调用全部放到 `spawn_blocking` 中执行。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer as _, ConsumerContext, Rebalance};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, info};

use crate::error::{BrokerError, Result};
use crate::kafka::client::{ClientFactory, NativeConsumer, collect_batch};
use crate::kafka::consumer::Consumer;
use crate::kafka::consumer_config::NativeClientConfig;
use crate::kafka::events::{ClientEvent, EventSender, RebalanceKind, TopicPartitionOffset};
use crate::kafka::message::ConsumedMessage;
use crate::kafka::options::RawConsumerOptions;

/// 拉模式下单次 poll 的等待时间
const FETCH_POLL_TIMEOUT: Duration = Duration::from_millis(100);
/// 推模式后台 poll 的等待时间，也是停止推送的最大延迟
const FLOWING_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// 只在本库内部使用、不传给 librdkafka 的配置项
const LOCAL_ONLY_KEYS: &[&str] = &["event_cb"];

/// 将 rdkafka 回调转换为客户端事件
pub struct BrokerEventContext {
    events: EventSender,
}

impl BrokerEventContext {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl ClientContext for BrokerEventContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        self.events.emit(ClientEvent::Log {
            level: level as i32,
            facility: fac.to_string(),
            message: log_message.to_string(),
        });
    }

    fn stats_raw(&self, statistics: &[u8]) {
        self.events.emit(ClientEvent::Stats(
            String::from_utf8_lossy(statistics).into_owned(),
        ));
    }

    fn error(&self, error: KafkaError, reason: &str) {
        let mut err = BrokerError::from(error);
        if !reason.is_empty() {
            err = err.with_trace(reason);
        }
        self.events.emit(ClientEvent::Error(err));
    }
}

impl ConsumerContext for BrokerEventContext {
    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        let (kind, partitions) = match rebalance {
            Rebalance::Assign(tpl) => (RebalanceKind::Assign, partition_offsets(tpl)),
            Rebalance::Revoke(tpl) => (RebalanceKind::Revoke, partition_offsets(tpl)),
            Rebalance::Error(_) => (RebalanceKind::Error, Vec::new()),
        };
        self.events.emit(ClientEvent::Rebalance { kind, partitions });
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        self.events.emit(ClientEvent::OffsetCommit {
            error: result.err().map(BrokerError::from),
            offsets: partition_offsets(offsets),
        });
    }
}

fn partition_offsets(tpl: &TopicPartitionList) -> Vec<TopicPartitionOffset> {
    tpl.elements()
        .iter()
        .map(|elem| TopicPartitionOffset {
            topic: elem.topic().to_string(),
            partition: elem.partition(),
            offset: elem.offset().to_raw(),
        })
        .collect()
}

/// 构建 Kafka 消费者
///
/// # 参数
/// * `config` - 合并后的原生配置，客户端配置和 topic 配置写入同一个 `ClientConfig`
/// * `context` - 事件回调上下文
pub fn build_kafka_consumer(
    config: &NativeClientConfig,
    context: BrokerEventContext,
) -> KafkaResult<BaseConsumer<BrokerEventContext>> {
    let mut client_config = ClientConfig::new();
    for (key, value) in config
        .client
        .iter()
        .filter(|(key, _)| !LOCAL_ONLY_KEYS.contains(&key.as_str()))
    {
        client_config.set(key, value);
    }
    for (key, value) in &config.topic {
        client_config.set(key, value);
    }
    client_config.create_with_context(context)
}

fn join_error(err: tokio::task::JoinError) -> BrokerError {
    BrokerError::new(format!("Kafka blocking task failed: {}", err))
}

/// 基于 rdkafka 的原生客户端
pub struct RdKafkaConsumer {
    consumer: Arc<BaseConsumer<BrokerEventContext>>,
    events: EventSender,
    flowing: Arc<AtomicBool>,
}

impl RdKafkaConsumer {
    pub fn new(config: &NativeClientConfig, events: EventSender) -> KafkaResult<Self> {
        let consumer = build_kafka_consumer(config, BrokerEventContext::new(events.clone()))?;
        Ok(Self {
            consumer: Arc::new(consumer),
            events,
            flowing: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl NativeConsumer for RdKafkaConsumer {
    async fn connect(&self, timeout: Duration) -> std::result::Result<(), BrokerError> {
        let consumer = self.consumer.clone();
        tokio::task::spawn_blocking(move || consumer.fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(join_error)??;

        info!("Kafka metadata fetched, consumer ready");
        self.events.emit(ClientEvent::Ready);
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> std::result::Result<(), BrokerError> {
        let topics: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer.subscribe(&topics)?;
        Ok(())
    }

    async fn fetch(
        &self,
        max_messages: usize,
    ) -> std::result::Result<Option<Vec<ConsumedMessage>>, BrokerError> {
        let consumer = self.consumer.clone();
        tokio::task::spawn_blocking(move || {
            collect_batch(max_messages, || {
                consumer
                    .poll(FETCH_POLL_TIMEOUT)
                    .map(|polled| polled.map(|message| ConsumedMessage::from(&message)))
            })
            .map(Some)
            .map_err(BrokerError::from)
        })
        .await
        .map_err(join_error)?
    }

    async fn start_flowing(&self) -> std::result::Result<(), BrokerError> {
        if self.flowing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let consumer = self.consumer.clone();
        let events = self.events.clone();
        let flowing = self.flowing.clone();
        tokio::task::spawn_blocking(move || {
            while flowing.load(Ordering::Acquire) {
                match consumer.poll(FLOWING_POLL_TIMEOUT) {
                    Some(Ok(message)) => events.emit(ClientEvent::Data(ConsumedMessage::from(&message))),
                    Some(Err(err)) => events.emit(ClientEvent::Error(BrokerError::from(err))),
                    None => {}
                }
            }
            debug!("Flowing poll loop stopped");
        });
        Ok(())
    }

    async fn commit(&self, message: &ConsumedMessage) -> std::result::Result<(), BrokerError> {
        // Kafka 提交的是下一条要读取的 offset
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    async fn unsubscribe(&self) -> std::result::Result<(), BrokerError> {
        self.consumer.unsubscribe();
        Ok(())
    }

    async fn disconnect(&self) -> std::result::Result<(), BrokerError> {
        self.flowing.store(false, Ordering::Release);
        self.events.emit(ClientEvent::Disconnected);
        Ok(())
    }
}

impl Drop for RdKafkaConsumer {
    fn drop(&mut self) {
        // 后台推送线程持有自己的 consumer 句柄，必须显式让它退出
        if self.flowing.swap(false, Ordering::AcqRel) {
            debug!("RdKafkaConsumer dropped, stopping flowing poll loop");
        }
    }
}

/// rdkafka 客户端工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct RdKafkaFactory;

impl ClientFactory for RdKafkaFactory {
    type Client = RdKafkaConsumer;

    fn create(
        &self,
        config: &NativeClientConfig,
        events: EventSender,
    ) -> std::result::Result<Self::Client, BrokerError> {
        RdKafkaConsumer::new(config, events).map_err(BrokerError::from)
    }
}

impl Consumer<RdKafkaConsumer> {
    /// 使用 rdkafka 客户端创建消费者
    pub fn new(raw: &RawConsumerOptions) -> Result<Self> {
        Self::with_factory(raw, RdKafkaFactory)
    }
}
