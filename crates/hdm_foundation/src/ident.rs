// crates/hdm_foundation/src/ident.rs

//! 稳定标识符
//!
//! 网格单元与计算补丁的外部标识符。与存储位置不同，标识符由用户
//! 提供（或由网格分配）且在对象生命周期内保持不变，可用于输入输出。
//!
//! # 设计目标
//!
//! 1. **newtype 封装**: 编译期防止单元 id 与补丁 id 混用
//! 2. **零开销**: `#[repr(transparent)]`，与底层整数布局完全一致
//! 3. **可序列化**: 直接 derive serde，便于写入诊断与输出文件

use serde::{Deserialize, Serialize};
use std::fmt;

/// 网格单元的稳定标识符
///
/// 由用户在建模时提供，在同一单元类型桶内唯一。与 `pos`（当前存储
/// 位置）不同，`UnitId` 在单元的整个生命周期内不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UnitId(i32);

impl UnitId {
    /// 创建新标识符
    #[inline]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    /// 获取原始值
    #[inline]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for UnitId {
    #[inline]
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// 计算补丁的标识符
///
/// 由所属网格从空闲列表分配，在该网格内唯一。哨兵值 [`PatchId::NONE`]
/// 表示单元当前不属于任何补丁。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PatchId(u32);

impl PatchId {
    /// 哨兵值：不属于任何补丁
    pub const NONE: Self = Self(u32::MAX);

    /// 创建新标识符
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// 获取原始值
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// 是否为哨兵值
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    /// 是否指向某个补丁
    #[inline]
    pub const fn is_some(self) -> bool {
        !self.is_none()
    }
}

impl Default for PatchId {
    #[inline]
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
