//! Kafka 消费者
//!
//! 组合配置校验、原生客户端、连接管理和两种消费引擎：
//! - 拉模式（non-flowing）：定时拉取，逐条提交
//! - 推模式（flowing）：连续投递，业务确认后按分区连续段提交
//!
//! 所有事件、确认和定时拉取都在同一个消费循环中串行处理。

use std::future::{self, Future};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{BrokerError, ConsumerError, Result};
use crate::kafka::client::{ClientFactory, NativeConsumer, commit_message};
use crate::kafka::commit_queue::FlowingCommitQueue;
use crate::kafka::connection::{self, ErrorSeverity};
use crate::kafka::consumer_config::NativeClientConfig;
use crate::kafka::events::{ClientEvent, EventBus, EventSender};
use crate::kafka::handler::MessageHandler;
use crate::kafka::message::ConsumedMessage;
use crate::kafka::options::{ConsumeMode, ConsumerOptions, RawConsumerOptions};
use crate::kafka::poller::NonFlowingPoller;
use crate::metrics::ConsumerMetrics;
use crate::runtime::task::{MessageConsumer, MessageConsumerTask, TaskResult};

type Receivers = (
    mpsc::UnboundedReceiver<ClientEvent>,
    mpsc::UnboundedReceiver<ConsumedMessage>,
);

/// Kafka 消费者
///
/// 每个消费者只能 `listen` 一次
pub struct Consumer<C: NativeConsumer> {
    options: Arc<ConsumerOptions>,
    native_config: NativeClientConfig,
    client: Arc<C>,
    bus: Arc<EventBus>,
    receivers: Mutex<Option<Receivers>>,
    ack_tx: mpsc::UnboundedSender<ConsumedMessage>,
    shutdown: CancellationToken,
    metrics: ConsumerMetrics,
}

impl<C: NativeConsumer> Consumer<C> {
    /// 使用指定的客户端工厂创建消费者
    ///
    /// 校验配置、合并原生配置，然后由工厂创建原生客户端
    pub fn with_factory<F>(raw: &RawConsumerOptions, factory: F) -> Result<Self>
    where
        F: ClientFactory<Client = C>,
    {
        let options = ConsumerOptions::validate(raw)?;
        let native_config = NativeClientConfig::from(&options);

        let bus = Arc::new(EventBus::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        let client = factory
            .create(&native_config, EventSender::new(bus.clone(), event_tx))
            .map_err(|err| {
                error!(
                    consumer = %options.name(),
                    error = %err,
                    "Failed to create Kafka consumer"
                );
                ConsumerError::Configuration(err)
            })?;

        info!(
            consumer = %options.name(),
            host = %options.host(),
            group_id = %options.group_id(),
            topic = %options.topic(),
            mode = %options.mode(),
            "Kafka consumer created successfully"
        );

        Ok(Self {
            options: Arc::new(options),
            native_config,
            client: Arc::new(client),
            bus,
            receivers: Mutex::new(Some((event_rx, ack_rx))),
            ack_tx,
            shutdown: CancellationToken::new(),
            metrics: ConsumerMetrics::new(),
        })
    }

    pub fn options(&self) -> &ConsumerOptions {
        &self.options
    }

    /// 传给原生客户端的合并后配置
    pub fn native_config(&self) -> &NativeClientConfig {
        &self.native_config
    }

    pub fn metrics(&self) -> &ConsumerMetrics {
        &self.metrics
    }

    /// 原生客户端
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// 注册具名事件监听器
    ///
    /// 监听器在发出事件的线程上同步调用，按注册顺序执行
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.on(event, Arc::new(listener));
    }

    /// 注册接收全部事件的监听器
    pub fn on_any<F>(&self, listener: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.on_any(Arc::new(listener));
    }

    /// 订阅事件流，读取过慢时丢弃最旧的事件
    pub fn subscribe_events(&self) -> async_broadcast::Receiver<ClientEvent> {
        self.bus.subscribe()
    }

    /// 推模式下用于确认消息的句柄
    pub fn flowing_committer(&self) -> FlowingCommitter {
        FlowingCommitter {
            tx: self.ack_tx.clone(),
        }
    }

    /// 确认一条消息（推模式）
    pub fn commit(&self, message: &ConsumedMessage) -> Result<()> {
        self.flowing_committer().commit(message)
    }

    /// 请求停止消费循环
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 连接并开始消费，直到停止、致命错误或处理器出错
    pub async fn listen<H>(&self, handler: H) -> Result<()>
    where
        H: MessageHandler,
    {
        self.run(&handler, future::pending()).await
    }

    /// 与 `listen` 相同，`signal` 完成时停止
    pub async fn listen_until<H, S>(&self, handler: H, signal: S) -> Result<()>
    where
        H: MessageHandler,
        S: Future<Output = ()> + Send,
    {
        self.run(&handler, signal).await
    }

    /// 包装成运行时任务，收到关闭信号时停止消费
    pub fn into_task<H>(self: Arc<Self>, name: impl Into<String>, handler: H) -> MessageConsumerTask
    where
        H: MessageHandler + 'static,
    {
        MessageConsumerTask::new(
            name,
            Box::new(ListeningConsumer {
                consumer: self,
                handler: Arc::new(handler),
            }),
        )
    }

    async fn run<S>(&self, handler: &dyn MessageHandler, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let (mut event_rx, mut ack_rx) = self
            .receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ConsumerError::AlreadyListening)?;

        connection::open(self.client.as_ref(), &self.options).await?;
        let guard = CloseGuard::new(self.client.clone(), self.options.name());

        let mut session = Session::new(self, handler);
        let result = session.run(&mut event_rx, &mut ack_rx, signal).await;
        session.close().await;
        guard.disarm();

        if let Err(err) = &result {
            error!(
                consumer = %self.options.name(),
                error = %err,
                "Kafka consumer stopped with error"
            );
        }
        result
    }
}

/// 推模式确认句柄
///
/// 可以克隆到业务处理器中，确认请求送回消费循环处理
#[derive(Debug, Clone)]
pub struct FlowingCommitter {
    tx: mpsc::UnboundedSender<ConsumedMessage>,
}

impl FlowingCommitter {
    /// 确认消息已处理完成
    ///
    /// 消费循环结束后返回 `ConsumerError::Closed`
    pub fn commit(&self, message: &ConsumedMessage) -> Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| ConsumerError::Closed)
    }
}

enum Engine {
    NonFlowing(NonFlowingPoller),
    Flowing(FlowingCommitQueue),
}

impl Engine {
    fn for_options(options: &ConsumerOptions) -> Self {
        match options.mode() {
            ConsumeMode::NonFlowing => Engine::NonFlowing(NonFlowingPoller::from_options(options)),
            ConsumeMode::Flowing => Engine::Flowing(FlowingCommitQueue::new()),
        }
    }

    async fn tick(&mut self) {
        match self {
            Engine::NonFlowing(poller) => poller.tick().await,
            Engine::Flowing(_) => future::pending::<()>().await,
        }
    }
}

/// 一次 listen 的运行状态
struct Session<'a, C: NativeConsumer> {
    consumer: &'a Consumer<C>,
    handler: &'a dyn MessageHandler,
    engine: Engine,
    subscribed: bool,
}

impl<'a, C: NativeConsumer> Session<'a, C> {
    fn new(consumer: &'a Consumer<C>, handler: &'a dyn MessageHandler) -> Self {
        Self {
            consumer,
            handler,
            engine: Engine::for_options(&consumer.options),
            subscribed: false,
        }
    }

    async fn run<S>(
        &mut self,
        event_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
        ack_rx: &mut mpsc::UnboundedReceiver<ConsumedMessage>,
        signal: S,
    ) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        tokio::pin!(signal);
        let shutdown = self.consumer.shutdown.clone();
        let name = self.consumer.options.name().to_string();

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(consumer = %name, "Shutdown requested, stopping consumer");
                    return Ok(());
                }
                _ = &mut signal => {
                    info!(consumer = %name, "Shutdown signal received, stopping consumer");
                    return Ok(());
                }
                event = event_rx.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => {
                        warn!(consumer = %name, "Native client event channel closed");
                        return Ok(());
                    }
                },
                Some(message) = ack_rx.recv() => self.acknowledge(message).await,
                _ = self.engine.tick() => self.poll().await?,
            }
        }
    }

    async fn handle_event(&mut self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Ready => self.on_ready().await,
            ClientEvent::Data(message) => self.on_data(message).await,
            ClientEvent::Error(err) => self.on_error(err),
            ClientEvent::Rebalance { kind, partitions } => {
                info!(
                    consumer = %self.consumer.options.name(),
                    kind = ?kind,
                    partitions = partitions.len(),
                    "Partition rebalance"
                );
                Ok(())
            }
            ClientEvent::Disconnected => {
                info!(consumer = %self.consumer.options.name(), "Disconnected from Kafka");
                Ok(())
            }
            other => {
                trace!(event = %other.name(), "Event forwarded to listeners");
                Ok(())
            }
        }
    }

    async fn on_ready(&mut self) -> Result<()> {
        let consumer = self.consumer;
        let options = &consumer.options;

        if self.subscribed {
            debug!(consumer = %options.name(), "Already subscribed, ready event ignored");
            return Ok(());
        }

        consumer
            .client
            .subscribe(&[options.topic().to_string()])
            .await
            .map_err(ConsumerError::Subscribe)?;
        self.subscribed = true;

        info!(
            consumer = %options.name(),
            topic = %options.topic(),
            mode = %options.mode(),
            "Successfully subscribed to Kafka topic"
        );
        if let Some(logger) = options.logger() {
            logger.debug(&format!(
                "Consumer '{}' subscribed to topic '{}'",
                options.name(),
                options.topic()
            ));
        }

        match &mut self.engine {
            Engine::NonFlowing(poller) => {
                poller.mark_subscribed();
                poller.start();
            }
            Engine::Flowing(_) => {
                consumer
                    .client
                    .start_flowing()
                    .await
                    .map_err(ConsumerError::Subscribe)?;
                info!(consumer = %options.name(), "Flowing consumption started");
            }
        }
        Ok(())
    }

    async fn on_data(&mut self, message: ConsumedMessage) -> Result<()> {
        let Engine::Flowing(queue) = &mut self.engine else {
            debug!(
                partition = message.partition,
                offset = message.offset,
                "Data event ignored in non-flowing mode"
            );
            return Ok(());
        };

        queue.on_message(message.clone());
        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "Delivering message"
        );
        self.consumer.metrics.record_delivered();

        self.handler
            .handle(message)
            .await
            .map_err(|err| ConsumerError::Handler(err.into()))
    }

    fn on_error(&self, err: BrokerError) -> Result<()> {
        let options = &self.consumer.options;
        match connection::classify(&err) {
            ErrorSeverity::Fatal => {
                error!(
                    consumer = %options.name(),
                    error = %err,
                    "Kafka transport failure, stopping consumer"
                );
                Err(ConsumerError::FatalBroker(err))
            }
            ErrorSeverity::Recoverable => {
                warn!(consumer = %options.name(), error = %err, "Kafka client error");
                self.consumer.metrics.record_recoverable_error();
                if let Some(logger) = options.logger() {
                    logger.warn(err.message());
                }
                Ok(())
            }
        }
    }

    async fn acknowledge(&mut self, message: ConsumedMessage) {
        let consumer = self.consumer;

        let Engine::Flowing(queue) = &mut self.engine else {
            debug!(
                partition = message.partition,
                offset = message.offset,
                "Acknowledgment ignored in non-flowing mode"
            );
            consumer.metrics.record_ignored_ack();
            return;
        };

        if !queue.contains(message.partition, message.offset) {
            debug!(
                partition = message.partition,
                offset = message.offset,
                "Acknowledged message is not pending"
            );
            consumer.metrics.record_ignored_ack();
            return;
        }

        let Some(target) = queue.acknowledge_message(&message) else {
            trace!(
                partition = message.partition,
                offset = message.offset,
                "Waiting for earlier offsets"
            );
            return;
        };

        commit_message(
            consumer.client.as_ref(),
            &target,
            consumer.options.logger(),
            &consumer.metrics,
        )
        .await;
    }

    async fn poll(&mut self) -> Result<()> {
        let consumer = self.consumer;
        if let Engine::NonFlowing(poller) = &self.engine {
            poller
                .poll_once(
                    consumer.client.as_ref(),
                    self.handler,
                    consumer.options.logger(),
                    &consumer.metrics,
                )
                .await?;
        }
        Ok(())
    }

    /// 停止定时器，然后取消订阅并断开连接
    async fn close(&mut self) {
        let consumer = self.consumer;
        let options = &consumer.options;

        match &mut self.engine {
            Engine::NonFlowing(poller) => poller.stop(),
            Engine::Flowing(queue) => {
                if queue.pending() > 0 {
                    debug!(
                        consumer = %options.name(),
                        pending = queue.pending(),
                        "Closing with unacknowledged messages"
                    );
                }
            }
        }

        if let Err(err) = consumer.client.unsubscribe().await {
            warn!(consumer = %options.name(), error = %err, "Failed to unsubscribe");
        }
        if let Err(err) = consumer.client.disconnect().await {
            warn!(consumer = %options.name(), error = %err, "Failed to disconnect from Kafka");
        }

        info!(consumer = %options.name(), "Kafka consumer stopped");
        if let Some(logger) = options.logger() {
            logger.debug(&format!("Consumer '{}' disconnected", options.name()));
        }
    }
}

/// listen 在关闭流程完成前被丢弃时（任务被 abort，或者调用方放弃了 future），
/// 在后台补做取消订阅和断开连接
struct CloseGuard<C: NativeConsumer> {
    client: Option<Arc<C>>,
    consumer: String,
}

impl<C: NativeConsumer> CloseGuard<C> {
    fn new(client: Arc<C>, consumer: &str) -> Self {
        Self {
            client: Some(client),
            consumer: consumer.to_string(),
        }
    }

    fn disarm(mut self) {
        self.client = None;
    }
}

impl<C: NativeConsumer> Drop for CloseGuard<C> {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        let consumer = std::mem::take(&mut self.consumer);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(consumer = %consumer, "Listen dropped outside a runtime, Kafka connection not closed");
            return;
        };

        warn!(consumer = %consumer, "Listen dropped before shutdown, closing Kafka connection");
        runtime.spawn(async move {
            if let Err(err) = client.unsubscribe().await {
                warn!(consumer = %consumer, error = %err, "Failed to unsubscribe");
            }
            if let Err(err) = client.disconnect().await {
                warn!(consumer = %consumer, error = %err, "Failed to disconnect from Kafka");
            }
        });
    }
}

/// 运行时任务适配
struct ListeningConsumer<C: NativeConsumer> {
    consumer: Arc<Consumer<C>>,
    handler: Arc<dyn MessageHandler>,
}

impl<C: NativeConsumer> MessageConsumer for ListeningConsumer<C> {
    fn consume(
        &self,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
        Box::pin(async move {
            let signal = async move {
                let _ = shutdown_rx.await;
            };
            self.consumer
                .run(self.handler.as_ref(), signal)
                .await
                .map_err(Into::into)
        })
    }
}
