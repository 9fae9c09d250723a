//! 集成测试公共工具
//!
//! 提供可编排的原生客户端、客户端工厂和记录日志的 logger

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flare_kafka_consumer::kafka::{
    ClientEvent, ConsumedMessage, Consumer, ConsumerLogger, EventSender, MessageHandler,
    NativeClientConfig, NativeConsumer, RawConsumerOptions,
};
use flare_kafka_consumer::BrokerError;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// 初始化测试日志（重复调用无副作用）
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 原生客户端上发生的调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Subscribe(Vec<String>),
    Fetch(usize),
    StartFlowing,
    Commit(i32, i64),
    Unsubscribe,
    Disconnect,
    /// 业务处理器收到消息
    Handled(i32, i64),
}

type FetchResult = Result<Option<Vec<ConsumedMessage>>, BrokerError>;

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    fetches: VecDeque<FetchResult>,
    connect_error: Option<BrokerError>,
    connect_delay: Option<Duration>,
    subscribe_error: Option<BrokerError>,
    commit_error: Option<BrokerError>,
    events: Option<EventSender>,
    config: Option<NativeClientConfig>,
}

/// 模拟客户端的共享状态
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<Mutex<Inner>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub fn record(&self, call: Call) {
        self.with(|inner| inner.calls.push(call));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|inner| inner.calls.clone())
    }

    /// 只保留处理和提交两类调用
    pub fn deliveries(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Handled(..) | Call::Commit(..)))
            .collect()
    }

    pub fn commits(&self) -> Vec<(i32, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Commit(partition, offset) => Some((partition, offset)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    pub fn fetch_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Fetch(_)))
    }

    /// 追加一次拉取结果；脚本用完后返回空批次
    pub fn push_fetch(&self, result: FetchResult) {
        self.with(|inner| inner.fetches.push_back(result));
    }

    pub fn fail_connect(&self, error: BrokerError) {
        self.with(|inner| inner.connect_error = Some(error));
    }

    pub fn delay_connect(&self, delay: Duration) {
        self.with(|inner| inner.connect_delay = Some(delay));
    }

    pub fn fail_subscribe(&self, error: BrokerError) {
        self.with(|inner| inner.subscribe_error = Some(error));
    }

    pub fn fail_commits(&self, error: BrokerError) {
        self.with(|inner| inner.commit_error = Some(error));
    }

    /// 工厂收到的原生配置
    pub fn config(&self) -> Option<NativeClientConfig> {
        self.with(|inner| inner.config.clone())
    }

    /// 模拟原生客户端发出事件
    pub fn emit(&self, event: ClientEvent) {
        let events = self.with(|inner| inner.events.clone());
        events.expect("client not created").emit(event);
    }
}

/// 模拟的原生客户端
pub struct MockClient {
    state: MockState,
}

#[async_trait]
impl NativeConsumer for MockClient {
    async fn connect(&self, _timeout: Duration) -> Result<(), BrokerError> {
        self.state.record(Call::Connect);
        let (delay, error) = self
            .state
            .with(|inner| (inner.connect_delay, inner.connect_error.clone()));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = error {
            return Err(error);
        }
        self.state.emit(ClientEvent::Ready);
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<(), BrokerError> {
        self.state.record(Call::Subscribe(topics.to_vec()));
        match self.state.with(|inner| inner.subscribe_error.clone()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn fetch(&self, max_messages: usize) -> FetchResult {
        self.state.record(Call::Fetch(max_messages));
        self.state
            .with(|inner| inner.fetches.pop_front())
            .unwrap_or_else(|| Ok(Some(Vec::new())))
    }

    async fn start_flowing(&self) -> Result<(), BrokerError> {
        self.state.record(Call::StartFlowing);
        Ok(())
    }

    async fn commit(&self, message: &ConsumedMessage) -> Result<(), BrokerError> {
        self.state
            .record(Call::Commit(message.partition, message.offset));
        match self.state.with(|inner| inner.commit_error.clone()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn unsubscribe(&self) -> Result<(), BrokerError> {
        self.state.record(Call::Unsubscribe);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.state.record(Call::Disconnect);
        Ok(())
    }
}

/// 创建绑定到 `state` 的客户端工厂
pub fn mock_factory(
    state: &MockState,
) -> impl Fn(&NativeClientConfig, EventSender) -> Result<MockClient, BrokerError> {
    let state = state.clone();
    move |config, events| {
        state.with(|inner| {
            inner.config = Some(config.clone());
            inner.events = Some(events);
        });
        Ok(MockClient {
            state: state.clone(),
        })
    }
}

/// 记录收到的消息并返回成功的处理器
pub fn recording_handler(state: &MockState) -> impl MessageHandler + 'static {
    let state = state.clone();
    move |message: ConsumedMessage| {
        let state = state.clone();
        async move {
            state.record(Call::Handled(message.partition, message.offset));
            Ok::<_, anyhow::Error>(())
        }
    }
}

/// 创建使用模拟客户端的消费者
pub fn mock_consumer(state: &MockState, raw: &RawConsumerOptions) -> Arc<Consumer<MockClient>> {
    Arc::new(Consumer::with_factory(raw, mock_factory(state)).expect("Failed to create consumer"))
}

/// 在后台运行 listen
pub fn spawn_listen<H>(
    consumer: &Arc<Consumer<MockClient>>,
    handler: H,
) -> JoinHandle<flare_kafka_consumer::Result<()>>
where
    H: MessageHandler + 'static,
{
    let consumer = consumer.clone();
    tokio::spawn(async move { consumer.listen(handler).await })
}

pub fn message(partition: i32, offset: i64) -> ConsumedMessage {
    ConsumedMessage::new("orders", partition, offset).with_payload(format!("payload-{}", offset))
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
}

/// 记录所有日志调用的 logger
#[derive(Clone, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<(LogLevel, String)>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, level: LogLevel) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn warns(&self) -> Vec<String> {
        self.entries(LogLevel::Warn)
    }

    pub fn errors(&self) -> Vec<String> {
        self.entries(LogLevel::Error)
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

impl ConsumerLogger for RecordingLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
