// crates/hdm_grid/src/handle.rs

//! 可迁移单元句柄
//!
//! [`URef`] 是指向网格单元的外部句柄。句柄不缓存地址或位置，而是
//! 持有（槽位, 代际）对，经所属桶的槽位表解析到单元的当前位置。
//! 桶内的存储重排因此对句柄是无操作的；单元被删除后，句柄因代际
//! 不匹配而失效。
//!
//! # 状态机
//!
//! ```text
//! Bound(slot@gen) ── 单元被删除 ──> （代际过期，解引用失败）
//! Reset           ── 任何解引用 ──> GridError::InvalidatedRef
//! ```
//!
//! 句柄相等性按身份比较：槽位与代际都相同的两个句柄指向同一个
//! 单元实例。

use hdm_foundation::RawSlot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// 指向类型 `T` 单元的代际句柄
///
/// 任意多个 `URef` 可以并存并自由复制；它们不需要向网格注册，
/// 网格的存储重排也不需要回写它们。
#[derive(Serialize, Deserialize)]
#[repr(C)]
pub struct URef<T> {
    /// 槽位引用
    raw: RawSlot,
    /// 单元类型标记（函数指针形式确保自动 Copy）
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Copy for URef<T> {}

impl<T> Clone for URef<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> URef<T> {
    /// 复位状态的句柄常量
    ///
    /// 解引用复位句柄返回 [`crate::GridError::InvalidatedRef`]。
    pub const RESET: Self = Self {
        raw: RawSlot::INVALID,
        _marker: PhantomData,
    };

    /// 由槽位引用构造句柄
    #[inline]
    pub(crate) const fn from_raw(raw: RawSlot) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// 底层槽位引用
    #[inline]
    pub(crate) const fn raw(self) -> RawSlot {
        self.raw
    }

    /// 槽位下标
    #[inline]
    pub fn slot(self) -> u32 {
        self.raw.index()
    }

    /// 代际号
    #[inline]
    pub fn generation(self) -> u32 {
        self.raw.generation()
    }

    /// 是否处于复位状态
    #[inline]
    pub fn is_reset(self) -> bool {
        self.raw.is_invalid()
    }
}

impl<T> Default for URef<T> {
    #[inline]
    fn default() -> Self {
        Self::RESET
    }
}

impl<T> PartialEq for URef<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for URef<T> {}

impl<T> Hash for URef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for URef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reset() {
            write!(f, "URef(RESET)")
        } else {
            write!(f, "URef({})", self.raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cell;

    #[test]
    fn test_reset_state() {
        let r: URef<Cell> = URef::RESET;
        assert!(r.is_reset());
        assert_eq!(r, URef::default());
    }

    #[test]
    fn test_identity_equality() {
        let a: URef<Cell> = URef::from_raw(RawSlot::new(1, 1));
        let b: URef<Cell> = URef::from_raw(RawSlot::new(1, 1));
        let c: URef<Cell> = URef::from_raw(RawSlot::new(1, 2));

        assert_eq!(a, b);
        // 同一槽位、不同代际：不同的单元实例
        assert_ne!(a, c);
    }

    #[test]
    fn test_copies_are_independent() {
        let a: URef<Cell> = URef::from_raw(RawSlot::new(4, 1));
        let b = a;
        assert_eq!(a, b);
        assert_eq!(b.slot(), 4);
        assert_eq!(b.generation(), 1);
    }

    #[test]
    fn test_debug_format() {
        let a: URef<Cell> = URef::from_raw(RawSlot::new(2, 3));
        assert_eq!(format!("{:?}", a), "URef(2@3)");
        assert_eq!(format!("{:?}", URef::<Cell>::RESET), "URef(RESET)");
    }
}
