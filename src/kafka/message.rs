//! 消费到的消息

use chrono::{DateTime, Utc};

/// 消费到的消息（从原生客户端复制出的自有副本）
///
/// 消息只按 `(partition, offset)` 判等，key、payload 等内容不参与比较
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ConsumedMessage {
    /// 创建不带内容的消息
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: None,
            timestamp: None,
        }
    }

    /// 设置消息 key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 设置消息体
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// 设置消息时间戳
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// 以 UTF-8 解析消息体
    pub fn payload_str(&self) -> Option<&str> {
        self.payload
            .as_deref()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

impl PartialEq for ConsumedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.partition == other.partition && self.offset == other.offset
    }
}

impl Eq for ConsumedMessage {}

#[cfg(feature = "kafka")]
impl<'a> From<&rdkafka::message::BorrowedMessage<'a>> for ConsumedMessage {
    fn from(message: &rdkafka::message::BorrowedMessage<'a>) -> Self {
        use rdkafka::Message;

        Self {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(<[u8]>::to_vec),
            payload: message.payload().map(<[u8]>::to_vec),
            timestamp: message
                .timestamp()
                .to_millis()
                .and_then(DateTime::from_timestamp_millis),
        }
    }
}
