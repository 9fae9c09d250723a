//! 原生客户端事件
//!
//! 原生客户端的所有回调都转换为 `ClientEvent`，经 `EventSender` 同步通知已注册的监听器、
//! 广播给事件流订阅者，并投递到消费循环的事件通道。消费循环是唯一修改提交队列的地方，
//! 回调线程中不做任何队列操作。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::BrokerError;
use crate::kafka::message::ConsumedMessage;

/// 事件流的广播缓冲区大小，满了之后丢弃最旧的事件
const EVENT_STREAM_CAPACITY: usize = 1024;

/// 事件监听器
pub type EventListener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// 分区重平衡类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceKind {
    Assign,
    Revoke,
    Error,
}

/// topic / 分区 / offset 三元组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicPartitionOffset {
    pub topic: String,
    pub partition: i32,
    pub offset: Option<i64>,
}

/// 原生客户端事件
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// 连接就绪，可以订阅
    Ready,
    /// 推模式下投递的消息
    Data(ConsumedMessage),
    /// 原生客户端上报的错误
    Error(BrokerError),
    /// 原生客户端日志
    Log {
        level: i32,
        facility: String,
        message: String,
    },
    /// 原生客户端统计信息（JSON 文本）
    Stats(String),
    /// offset 提交结果
    OffsetCommit {
        error: Option<BrokerError>,
        offsets: Vec<TopicPartitionOffset>,
    },
    /// 分区重平衡
    Rebalance {
        kind: RebalanceKind,
        partitions: Vec<TopicPartitionOffset>,
    },
    /// 连接断开
    Disconnected,
    /// 其他具名事件
    Custom { name: String, payload: Value },
}

impl ClientEvent {
    pub const READY: &'static str = "ready";
    pub const DATA: &'static str = "data";
    pub const ERROR: &'static str = "event.error";
    pub const LOG: &'static str = "event.log";
    pub const STATS: &'static str = "event.stats";
    pub const OFFSET_COMMIT: &'static str = "offset.commit";
    pub const REBALANCE: &'static str = "rebalance";
    pub const DISCONNECTED: &'static str = "disconnected";

    /// 创建自定义事件
    pub fn custom(name: impl Into<String>, payload: impl Into<Value>) -> Self {
        ClientEvent::Custom {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// 事件名称
    pub fn name(&self) -> &str {
        match self {
            ClientEvent::Ready => Self::READY,
            ClientEvent::Data(_) => Self::DATA,
            ClientEvent::Error(_) => Self::ERROR,
            ClientEvent::Log { .. } => Self::LOG,
            ClientEvent::Stats(_) => Self::STATS,
            ClientEvent::OffsetCommit { .. } => Self::OFFSET_COMMIT,
            ClientEvent::Rebalance { .. } => Self::REBALANCE,
            ClientEvent::Disconnected => Self::DISCONNECTED,
            ClientEvent::Custom { name, .. } => name,
        }
    }
}

/// 事件监听器注册表
///
/// 只做转发，不对事件做任何修改
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<EventListener>>>,
    wildcard: RwLock<Vec<EventListener>>,
    stream: async_broadcast::Sender<ClientEvent>,
    // 保持广播通道存活，没有活跃订阅者时直接丢弃事件
    _inactive: async_broadcast::InactiveReceiver<ClientEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (mut stream, receiver) = async_broadcast::broadcast(EVENT_STREAM_CAPACITY);
        stream.set_overflow(true);
        Self {
            listeners: RwLock::new(HashMap::new()),
            wildcard: RwLock::new(Vec::new()),
            stream,
            _inactive: receiver.deactivate(),
        }
    }

    /// 注册具名事件监听器
    pub fn on(&self, event: impl Into<String>, listener: EventListener) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.entry(event.into()).or_default().push(listener);
    }

    /// 注册接收全部事件的监听器
    pub fn on_any(&self, listener: EventListener) {
        self.wildcard
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> async_broadcast::Receiver<ClientEvent> {
        self.stream.new_receiver()
    }

    /// 通知监听器并广播事件
    pub fn publish(&self, event: &ClientEvent) {
        // 先复制监听器列表再调用，允许监听器内部继续注册
        let named: Vec<EventListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event.name())
            .cloned()
            .unwrap_or_default();
        let wildcard: Vec<EventListener> = self
            .wildcard
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in named.iter().chain(wildcard.iter()) {
            listener(event);
        }

        if let Err(err) = self.stream.try_broadcast(event.clone()) {
            trace!(event = %event.name(), error = %err, "No active event stream subscriber");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 原生客户端使用的事件发送端
#[derive(Clone)]
pub struct EventSender {
    bus: Arc<EventBus>,
    loop_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl EventSender {
    pub(crate) fn new(bus: Arc<EventBus>, loop_tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { bus, loop_tx }
    }

    /// 发出事件
    ///
    /// 在调用线程上同步通知监听器，然后投递给消费循环
    pub fn emit(&self, event: ClientEvent) {
        self.bus.publish(&event);
        if let Err(err) = self.loop_tx.send(event) {
            debug!(event = %err.0.name(), "Consumer loop is closed, event dropped");
        }
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.loop_tx.is_closed())
            .finish()
    }
}
