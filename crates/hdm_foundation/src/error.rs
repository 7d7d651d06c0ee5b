// crates/hdm_foundation/src/error.rs

//! 基础错误类型
//!
//! 框架将错误分为两类：
//!
//! - **可恢复错误**: 以 `Result` 返回，各层定义自己的错误类型
//!   （网格层 `GridError`、引擎层 `EngineError`）；
//! - **致命错误**: 调用方破坏了不变量，直接 `panic!` 并注明组件与
//!   被破坏的不变量。
//!
//! 本层只保留高层错误向下聚合时的承接类型 [`HdmError`]。

use thiserror::Error;

/// Foundation 层基础错误
///
/// 高层错误（网格层、引擎层）脱离原始上下文向下传播时聚合为
/// 本类型。
#[derive(Debug, Error)]
pub enum HdmError {
    /// 内部实现错误
    ///
    /// 程序进入不应到达的状态时使用，通常表示不变量被破坏。
    #[error("internal error: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

impl HdmError {
    /// 创建内部错误
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
