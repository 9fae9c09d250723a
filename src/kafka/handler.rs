//! 业务消息处理器

use std::future::Future;

use async_trait::async_trait;

use crate::kafka::message::ConsumedMessage;

/// 消息处理器
///
/// 每条消息调用一次。返回错误会终止消费循环，且该消息不会被提交
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: ConsumedMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(ConsumedMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, message: ConsumedMessage) -> anyhow::Result<()> {
        self(message).await
    }
}
