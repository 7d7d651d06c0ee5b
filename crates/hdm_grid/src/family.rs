// crates/hdm_grid/src/family.rs

//! 多类型桶族
//!
//! 一个网格可以包含任意多种单元类型（节点、单元、界面等），取决于
//! 空间离散方式。具体模型定义一个桶族结构体，为其中每种单元类型
//! 实现 [`StoreOf`]，即可在编译期完成类型到桶的静态分发。
//!
//! # 示例
//!
//! ```
//! use hdm_grid::prelude::*;
//!
//! struct Node { core: UnitCore }
//! struct Cell { core: UnitCore }
//!
//! impl Unit for Node {
//!     fn core(&self) -> &UnitCore { &self.core }
//!     fn core_mut(&mut self) -> &mut UnitCore { &mut self.core }
//! }
//! impl Unit for Cell {
//!     fn core(&self) -> &UnitCore { &self.core }
//!     fn core_mut(&mut self) -> &mut UnitCore { &mut self.core }
//! }
//!
//! #[derive(Default)]
//! struct CoastalUnits {
//!     nodes: UnitStore<Node>,
//!     cells: UnitStore<Cell>,
//! }
//!
//! #[derive(Default)]
//! struct CoastalRefs {
//!     nodes: Vec<URef<Node>>,
//!     cells: Vec<URef<Cell>>,
//! }
//!
//! impl UnitFamily for CoastalUnits {
//!     type Refs = CoastalRefs;
//! }
//!
//! impl StoreOf<Node> for CoastalUnits {
//!     fn store(&self) -> &UnitStore<Node> { &self.nodes }
//!     fn store_mut(&mut self) -> &mut UnitStore<Node> { &mut self.nodes }
//!     fn refs(refs: &Self::Refs) -> &Vec<URef<Node>> { &refs.nodes }
//!     fn refs_mut(refs: &mut Self::Refs) -> &mut Vec<URef<Node>> { &mut refs.nodes }
//! }
//!
//! impl StoreOf<Cell> for CoastalUnits {
//!     fn store(&self) -> &UnitStore<Cell> { &self.cells }
//!     fn store_mut(&mut self) -> &mut UnitStore<Cell> { &mut self.cells }
//!     fn refs(refs: &Self::Refs) -> &Vec<URef<Cell>> { &refs.cells }
//!     fn refs_mut(refs: &mut Self::Refs) -> &mut Vec<URef<Cell>> { &mut refs.cells }
//! }
//! ```

use crate::handle::URef;
use crate::store::UnitStore;
use crate::unit::Unit;

/// 网格的单元类型桶族
///
/// 实现者是一个聚合了若干 [`UnitStore`] 的结构体；关联类型
/// [`UnitFamily::Refs`] 是与之平行的句柄序列族，由补丁持有。
pub trait UnitFamily: Default + Send + 'static {
    /// 与桶族平行的句柄序列族（补丁的按类型引用序列）
    type Refs: Default + Send;
}

/// 桶族对单元类型 `T` 的静态分发
///
/// 为桶族中每种单元类型实现一次；网格与补丁的泛型操作经由本
/// trait 找到对应的桶和引用序列。
pub trait StoreOf<T: Unit>: UnitFamily {
    /// 类型 `T` 的桶
    fn store(&self) -> &UnitStore<T>;

    /// 类型 `T` 的桶（可变）
    fn store_mut(&mut self) -> &mut UnitStore<T>;

    /// 引用序列族中类型 `T` 的序列
    fn refs(refs: &Self::Refs) -> &Vec<URef<T>>;

    /// 引用序列族中类型 `T` 的序列（可变）
    fn refs_mut(refs: &mut Self::Refs) -> &mut Vec<URef<T>>;
}
