//! Kafka 消费者原生配置
//!
//! 定义消费者配置接口，并把调用方透传配置与系统强制配置合并为原生客户端配置

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::kafka::options::ConsumerOptions;

/// Kafka 消费者配置 Trait
///
/// 任何需要构建原生消费者的配置都应该实现此 trait
pub trait KafkaConsumerConfig: Send + Sync {
    /// Broker 地址列表
    fn kafka_bootstrap(&self) -> &str;

    /// Consumer Group ID
    fn consumer_group(&self) -> &str;

    /// Kafka Topic 名称
    fn kafka_topic(&self) -> &str;

    /// 调用方透传的客户端配置
    fn client_overrides(&self) -> Option<&Map<String, Value>> {
        None
    }

    /// 调用方透传的 topic 配置
    fn topic_overrides(&self) -> Option<&Map<String, Value>> {
        None
    }

    /// Offset 重置策略，默认 "earliest"（可被 topic 透传配置覆盖）
    fn auto_offset_reset(&self) -> &str {
        "earliest"
    }
}

impl KafkaConsumerConfig for ConsumerOptions {
    fn kafka_bootstrap(&self) -> &str {
        self.host()
    }

    fn consumer_group(&self) -> &str {
        self.group_id()
    }

    fn kafka_topic(&self) -> &str {
        self.topic()
    }

    fn client_overrides(&self) -> Option<&Map<String, Value>> {
        self.native_client_config()
    }

    fn topic_overrides(&self) -> Option<&Map<String, Value>> {
        self.native_topic_config()
    }
}

/// 合并后的原生客户端配置
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeClientConfig {
    /// 客户端级配置
    pub client: BTreeMap<String, String>,
    /// topic 级配置
    pub topic: BTreeMap<String, String>,
}

impl NativeClientConfig {
    /// 从消费者配置构建
    ///
    /// 客户端配置：系统值（group.id、broker 列表、关闭自动提交、开启 keepalive 与事件回调）
    /// 始终覆盖调用方同名配置，其余键原样透传。
    /// topic 配置：默认 `auto.offset.reset`，调用方配置全部生效。
    ///
    /// 原生客户端只接受字符串配置：字符串、数字和布尔值转成字符串，
    /// null、数组和对象跳过并记录告警。
    pub fn from_config(config: &dyn KafkaConsumerConfig) -> Self {
        let mut client = BTreeMap::new();
        if let Some(overrides) = config.client_overrides() {
            extend_stringified(&mut client, overrides);
        }
        client.insert("group.id".to_string(), config.consumer_group().to_string());
        client.insert(
            "metadata.broker.list".to_string(),
            config.kafka_bootstrap().to_string(),
        );
        client.insert("enable.auto.commit".to_string(), "false".to_string());
        client.insert("socket.keepalive.enable".to_string(), "true".to_string());
        client.insert("event_cb".to_string(), "true".to_string());

        let mut topic = BTreeMap::new();
        topic.insert(
            "auto.offset.reset".to_string(),
            config.auto_offset_reset().to_string(),
        );
        if let Some(overrides) = config.topic_overrides() {
            extend_stringified(&mut topic, overrides);
        }

        Self { client, topic }
    }

    /// 读取客户端配置项
    pub fn client_value(&self, key: &str) -> Option<&str> {
        self.client.get(key).map(String::as_str)
    }

    /// 读取 topic 配置项
    pub fn topic_value(&self, key: &str) -> Option<&str> {
        self.topic.get(key).map(String::as_str)
    }
}

impl From<&ConsumerOptions> for NativeClientConfig {
    fn from(options: &ConsumerOptions) -> Self {
        Self::from_config(options)
    }
}

fn extend_stringified(target: &mut BTreeMap<String, String>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        let text = match value {
            Value::String(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => {
                warn!(key = %key, value = %value, "Native config value is not a scalar, skipped");
                continue;
            }
        };
        target.insert(key.clone(), text);
    }
}
