// crates/hdm_grid/src/error.rs

//! 网格层错误类型
//!
//! 仅包含可恢复错误。不变量被调用方破坏的情形（删除位置不符、
//! 查询不存在的补丁、在非子网格上执行父网格拷贝等）属于致命错误，
//! 直接 panic 并注明组件与不变量。

use hdm_foundation::{HdmError, UnitId};
use thiserror::Error;

/// 网格层结果类型
pub type GridResult<T> = Result<T, GridError>;

/// 网格层错误
#[derive(Debug, Error)]
pub enum GridError {
    /// 对已失效句柄的解引用
    ///
    /// 句柄处于复位状态，或其指向的单元已被删除（代际不匹配）。
    #[error("a dereferencing is attempted for an invalidated ref (slot {slot}@{generation})")]
    InvalidatedRef {
        /// 句柄的槽位下标
        slot: u32,
        /// 句柄的代际号
        generation: u32,
    },

    /// 按标识符查询的单元不存在
    #[error("unit {id} does not exist in this grid")]
    UnknownUnit {
        /// 查询的单元标识符
        id: UnitId,
    },
}

impl From<GridError> for HdmError {
    fn from(err: GridError) -> Self {
        HdmError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalidated_ref_display() {
        let err = GridError::InvalidatedRef {
            slot: 3,
            generation: 2,
        };
        assert!(err.to_string().contains("invalidated ref"));
        assert!(err.to_string().contains("3@2"));
    }

    #[test]
    fn test_conversion_to_foundation() {
        let err: HdmError = GridError::UnknownUnit { id: UnitId::new(9) }.into();
        assert!(matches!(err, HdmError::Internal { .. }));
    }
}
