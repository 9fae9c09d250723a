//! 错误处理模块
//!
//! 提供消费者的统一错误类型、配置校验错误、broker 错误以及错误代码分类

pub mod broker;
pub mod code;
pub mod consumer_error;
pub mod validation;

// 重新导出公共类型
pub use broker::{BrokerError, BrokerErrorKind};
pub use code::{ErrorCategory, ErrorCode};
pub use consumer_error::{ConsumerError, Result};
pub use validation::ValidationError;
