// crates/hdm_foundation/src/lib.rs

//! OpenHDM Foundation Layer (Layer 1)
//!
//! 零业务依赖的基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 高层错误向下聚合的承接类型 [`HdmError`]
//! - [`ident`]: 稳定标识符（[`UnitId`]、[`PatchId`]）
//! - [`slot`]: 代际槽位表 [`SlotTable`]，悬垂句柄检测的核心机制
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: hdm_cli        ─> 宿主程序（clap 命令行）
//! Layer 3: hdm_engine     ─> Domain, Project, 相位同步协议
//! Layer 2: hdm_grid       ─> Grid, Patch, UnitStore, URef
//! Layer 1: hdm_foundation ─> HdmError, UnitId, SlotTable (本层)
//! ```
//!
//! # 设计原则
//!
//! 1. **低依赖**: 仅依赖 serde 和 thiserror
//! 2. **类型安全**: 标识符均为 newtype，编译期防止混用
//! 3. **代际验证**: 槽位重用时递增代际号，过期句柄可被检测

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ident;
pub mod slot;

pub use error::HdmError;
pub use ident::{PatchId, UnitId};
pub use slot::{RawSlot, SlotTable, INVALID_GENERATION, INVALID_INDEX};
