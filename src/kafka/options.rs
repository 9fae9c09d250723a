//! 消费者配置
//!
//! `RawConsumerOptions` 是调用方提供的原始配置（可从 JSON / TOML 反序列化，也可以链式构建），
//! `ConsumerOptions` 是校验并补齐默认值之后的规范配置，构造完成后不可修改。

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::kafka::logger::{ConsumerLogger, SharedLogger};

/// 默认连接超时（毫秒）
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
/// 默认每次拉取的消息数
pub const DEFAULT_NUM_MSG_FETCH_PER_TIME: u64 = 1;
/// 默认拉取间隔（毫秒）
pub const DEFAULT_INTERVAL_FETCH_MESSAGE_MS: u64 = 10;

/// 消费模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsumeMode {
    /// 推模式：连续投递，按分区连续确认后再提交
    Flowing,
    /// 拉模式：定时批量拉取，逐条提交
    #[default]
    NonFlowing,
}

impl ConsumeMode {
    /// 从配置字符串解析
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "flowing" => Some(ConsumeMode::Flowing),
            "non-flowing" => Some(ConsumeMode::NonFlowing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumeMode::Flowing => "flowing",
            ConsumeMode::NonFlowing => "non-flowing",
        }
    }
}

impl fmt::Display for ConsumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 原始消费者配置
///
/// 数值类配置以 `serde_json::Value` 保存，类型错误留到校验阶段统一报告
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConsumerOptions {
    pub name: Option<String>,
    pub host: Option<String>,
    pub group_id: Option<String>,
    pub topic: Option<String>,
    pub mode: Option<Value>,
    pub connect_timeout: Option<Value>,
    pub num_msg_fetch_per_time: Option<Value>,
    pub interval_fetch_message: Option<Value>,
    pub native_client_config: Option<Map<String, Value>>,
    pub native_topic_config: Option<Map<String, Value>>,
    #[serde(skip)]
    pub logger: Option<SharedLogger>,
}

impl RawConsumerOptions {
    /// 使用四个必填项创建配置
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            host: Some(host.into()),
            group_id: Some(group_id.into()),
            topic: Some(topic.into()),
            ..Self::default()
        }
    }

    /// 从 JSON 值解析
    pub fn from_json(value: Value) -> anyhow::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 从 TOML 文件加载
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 设置消费模式（"flowing" 或 "non-flowing"）
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(Value::String(mode.into()));
        self
    }

    /// 设置连接超时（毫秒）
    pub fn with_connect_timeout(mut self, timeout_ms: i64) -> Self {
        self.connect_timeout = Some(Value::from(timeout_ms));
        self
    }

    /// 设置每次拉取的消息数
    pub fn with_num_msg_fetch_per_time(mut self, count: i64) -> Self {
        self.num_msg_fetch_per_time = Some(Value::from(count));
        self
    }

    /// 设置拉取间隔（毫秒）
    pub fn with_interval_fetch_message(mut self, interval_ms: i64) -> Self {
        self.interval_fetch_message = Some(Value::from(interval_ms));
        self
    }

    /// 追加一项原生客户端配置
    pub fn with_native_client_config(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.native_client_config
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// 追加一项原生 topic 配置
    pub fn with_native_topic_config(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.native_topic_config
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// 注入日志实现
    pub fn with_logger(mut self, logger: impl ConsumerLogger + 'static) -> Self {
        self.logger = Some(SharedLogger::new(logger));
        self
    }

    /// 注入已共享的日志实现
    pub fn with_shared_logger(mut self, logger: Arc<dyn ConsumerLogger>) -> Self {
        self.logger = Some(SharedLogger::from(logger));
        self
    }
}

/// 规范化后的消费者配置
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    name: String,
    host: String,
    group_id: String,
    topic: String,
    mode: ConsumeMode,
    connect_timeout_ms: u64,
    num_msg_fetch_per_time: u64,
    interval_fetch_message_ms: u64,
    native_client_config: Option<Map<String, Value>>,
    native_topic_config: Option<Map<String, Value>>,
    logger: Option<SharedLogger>,
}

impl ConsumerOptions {
    /// 校验原始配置并补齐默认值
    ///
    /// 按固定顺序检查，遇到第一个错误立即返回
    pub fn validate(raw: &RawConsumerOptions) -> Result<Self, ValidationError> {
        let name = required(raw.name.as_deref(), "name")?;
        let host = required(raw.host.as_deref(), "host")?;
        let group_id = required(raw.group_id.as_deref(), "groupId")?;
        let topic = required(raw.topic.as_deref(), "topic")?;

        let mode = match &raw.mode {
            None => ConsumeMode::default(),
            Some(value) => value
                .as_str()
                .and_then(ConsumeMode::parse)
                .ok_or(ValidationError::InvalidOption("mode"))?,
        };

        let connect_timeout_ms = positive_integer(
            raw.connect_timeout.as_ref(),
            "connectTimeout",
            DEFAULT_CONNECT_TIMEOUT_MS,
        )?;
        let interval_fetch_message_ms = positive_integer(
            raw.interval_fetch_message.as_ref(),
            "intervalFetchMessage",
            DEFAULT_INTERVAL_FETCH_MESSAGE_MS,
        )?;
        let num_msg_fetch_per_time = positive_integer(
            raw.num_msg_fetch_per_time.as_ref(),
            "numMsgFetchPerTime",
            DEFAULT_NUM_MSG_FETCH_PER_TIME,
        )?;

        Ok(Self {
            name,
            host,
            group_id,
            topic,
            mode,
            connect_timeout_ms,
            num_msg_fetch_per_time,
            interval_fetch_message_ms,
            native_client_config: raw.native_client_config.clone(),
            native_topic_config: raw.native_topic_config.clone(),
            logger: raw.logger.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Broker 地址列表
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn mode(&self) -> ConsumeMode {
        self.mode
    }

    pub fn connect_timeout_ms(&self) -> u64 {
        self.connect_timeout_ms
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn num_msg_fetch_per_time(&self) -> usize {
        usize::try_from(self.num_msg_fetch_per_time).unwrap_or(usize::MAX)
    }

    pub fn interval_fetch_message_ms(&self) -> u64 {
        self.interval_fetch_message_ms
    }

    pub fn interval_fetch_message(&self) -> Duration {
        Duration::from_millis(self.interval_fetch_message_ms)
    }

    /// 调用方透传的客户端配置，原样保存
    pub fn native_client_config(&self) -> Option<&Map<String, Value>> {
        self.native_client_config.as_ref()
    }

    pub fn native_topic_config(&self) -> Option<&Map<String, Value>> {
        self.native_topic_config.as_ref()
    }

    pub fn logger(&self) -> Option<&SharedLogger> {
        self.logger.as_ref()
    }
}

impl TryFrom<&RawConsumerOptions> for ConsumerOptions {
    type Error = ValidationError;

    fn try_from(raw: &RawConsumerOptions) -> Result<Self, Self::Error> {
        Self::validate(raw)
    }
}

fn required(value: Option<&str>, option: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(ValidationError::MissingOption(option)),
    }
}

fn positive_integer(
    value: Option<&Value>,
    option: &'static str,
    default: u64,
) -> Result<u64, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let number = integer_value(value).ok_or(ValidationError::InvalidType(option))?;
    if number <= 0 {
        return Err(ValidationError::OutOfRange(option));
    }
    Ok(number.unsigned_abs())
}

/// 整数判定：JSON 整数，或小数部分为 0 的浮点数；数字字符串不算
fn integer_value(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(integer) = number.as_i64() {
        return Some(integer);
    }
    if number.as_u64().is_some() {
        return Some(i64::MAX);
    }
    number
        .as_f64()
        .filter(|float| float.is_finite() && float.fract() == 0.0)
        .map(|float| float as i64)
}
