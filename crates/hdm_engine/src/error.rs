// crates/hdm_engine/src/error.rs

//! 引擎层错误类型
//!
//! 覆盖输入文件解析、IO 与并发资源构建等可恢复错误。不变量
//! 违例（见 crate 文档）不经过本类型，直接 panic。

use hdm_grid::GridError;
use std::path::PathBuf;
use thiserror::Error;

/// 引擎层结果类型
pub type EngineResult<T> = Result<T, EngineError>;

/// 引擎层错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// IO 操作失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 项目输入文件格式错误
    #[error("project file {}: {message}", path.display())]
    InputFormat {
        /// 输入文件路径
        path: PathBuf,
        /// 错误描述
        message: String,
    },

    /// 域定义行的列数无效
    #[error("invalid number of parameters for domain {domain_id}: got {columns} columns, expected 3 or 4")]
    DomainRow {
        /// 出错行的域标识符
        domain_id: String,
        /// 实际列数
        columns: usize,
    },

    /// 网格层错误
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// 域内并行计算池构建失败
    #[error("failed to build compute pool: {0}")]
    Compute(#[from] rayon::ThreadPoolBuildError),

    /// 模型侧错误
    #[error("model error: {0}")]
    Model(String),
}

impl EngineError {
    /// 创建模型侧错误
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_row_display() {
        let err = EngineError::DomainRow {
            domain_id: "estuary".into(),
            columns: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("estuary"));
        assert!(msg.contains("5"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
