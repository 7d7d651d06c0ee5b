// crates/hdm_grid/src/lib.rs

//! OpenHDM Grid Layer (Layer 2)
//!
//! 离散网格数据的容器层。每个模拟域（Domain）拥有一个网格
//! （[`Grid`]），网格按单元类型分桶存储网格单元（节点、单元、
//! 界面等），并拥有若干计算补丁（[`Patch`]）标记网格中的活跃
//! 计算区域。
//!
//! # 模块概览
//!
//! - [`unit`]: 单元基础属性 [`UnitCore`] 与 [`Unit`] trait
//! - [`handle`]: 可迁移单元句柄 [`URef`]（代际验证）
//! - [`store`]: 单类型桶 [`UnitStore`]，稠密存储 + 槽位表
//! - [`family`]: 多类型桶族 [`UnitFamily`] / [`StoreOf`]
//! - [`patch`]: 计算补丁 [`Patch`]
//! - [`grid`]: 网格容器 [`Grid`]
//! - [`error`]: 网格层错误类型
//!
//! # 句柄失效模型
//!
//! 存储重排（桶增长、删除压缩）对句柄是无操作的：句柄通过稳定
//! 槽位间接寻址，网格在移动单元时更新槽位表。只有单元被删除后，
//! 其句柄才会因代际不匹配而失效，解引用返回
//! [`GridError::InvalidatedRef`]。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod family;
pub mod grid;
pub mod handle;
pub mod patch;
pub mod store;
pub mod unit;

pub use error::{GridError, GridResult};
pub use family::{StoreOf, UnitFamily};
pub use grid::{Grid, GridRole};
pub use handle::URef;
pub use patch::Patch;
pub use store::UnitStore;
pub use unit::{Unit, UnitCore};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{GridError, GridResult};
    pub use crate::family::{StoreOf, UnitFamily};
    pub use crate::grid::{Grid, GridRole};
    pub use crate::handle::URef;
    pub use crate::patch::Patch;
    pub use crate::store::UnitStore;
    pub use crate::unit::{Unit, UnitCore};
    pub use hdm_foundation::{PatchId, UnitId};
}
