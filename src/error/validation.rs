//! 配置校验错误

use thiserror::Error;

/// 消费者配置校验错误
///
/// 每个变体都携带出错的配置项名称（使用原始的 camelCase 键名）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 必填项缺失或为空
    #[error("Option '{0}' is required")]
    MissingOption(&'static str),

    /// 取值不在允许范围内（目前只有 `mode`）
    #[error("Option '{0}' should be set 'flowing' or 'non-flowing'")]
    InvalidOption(&'static str),

    /// 类型错误
    #[error("Option '{0}' should be integer")]
    InvalidType(&'static str),

    /// 数值必须大于 0
    #[error("Option '{0}' should greater than 0")]
    OutOfRange(&'static str),
}

impl ValidationError {
    /// 出错的配置项名称
    pub fn option(&self) -> &'static str {
        match self {
            ValidationError::MissingOption(name)
            | ValidationError::InvalidOption(name)
            | ValidationError::InvalidType(name)
            | ValidationError::OutOfRange(name) => name,
        }
    }
}
