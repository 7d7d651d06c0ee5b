// crates/hdm_grid/src/grid.rs

//! 网格容器
//!
//! [`Grid`] 是单个模拟域的离散数据容器与管理者：按单元类型分桶
//! 存储网格单元，并拥有若干计算补丁。嵌套（子）网格还维护与父
//! 网格单元的对应关系，供跨分辨率层级传递边界数据。
//!
//! # 失效规则
//!
//! 任何可能移动既有单元的变更（插入、删除）都会把当前有效的
//! 补丁全部置为失效。失效的补丁在求解器重新表达并调用
//! [`Patch::validate`] 之前不得读取。

use crate::error::GridResult;
use crate::family::{StoreOf, UnitFamily};
use crate::handle::URef;
use crate::patch::Patch;
use crate::store::UnitStore;
use crate::unit::Unit;
use hdm_foundation::{PatchId, UnitId};
use std::collections::VecDeque;

/// 网格在域层级中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridRole {
    /// 根（父）域的网格
    Root,
    /// 嵌套（子）域的网格，维护父子单元对应关系
    Nested,
}

/// 模拟域的单元容器
pub struct Grid<F: UnitFamily> {
    /// 按类型分桶的单元存储
    buckets: F,
    /// 计算补丁
    patches: Vec<Patch<F>>,
    /// 回收的补丁标识符（FIFO 重用）
    vacant_patch_ids: VecDeque<PatchId>,
    /// 层级角色
    role: GridRole,
}

impl<F: UnitFamily> Grid<F> {
    /// 创建网格
    pub fn new(role: GridRole) -> Self {
        Self {
            buckets: F::default(),
            patches: Vec::new(),
            vacant_patch_ids: VecDeque::new(),
            role,
        }
    }

    /// 层级角色
    #[inline]
    pub fn role(&self) -> GridRole {
        self.role
    }

    /// 是否为嵌套网格
    #[inline]
    pub fn is_nested(&self) -> bool {
        self.role == GridRole::Nested
    }

    // ------------------------------------------------------------------
    // 单元管理
    // ------------------------------------------------------------------

    /// 插入单元
    ///
    /// 插入可能移动既有单元（见桶的位置分配规则），因此所有当前
    /// 有效的补丁会被置为失效。
    pub fn insert_unit<T: Unit>(&mut self, unit: T) -> URef<T>
    where
        F: StoreOf<T>,
    {
        let r = self.buckets.store_mut().insert(unit);
        self.invalidate_patches();
        r
    }

    /// 从父网格深拷贝单元并记录父子对应关系
    ///
    /// 拷贝重置簿记属性（位置由本网格分配，激活与补丁归属清空），
    /// 只保留单元的标识符、边界标志与数值数据。
    ///
    /// # Panics
    ///
    /// 在非嵌套网格上调用为致命错误。
    pub fn copy_from_parent<T: Unit + Clone>(
        &mut self,
        parent: &Grid<F>,
        pref: URef<T>,
    ) -> GridResult<URef<T>>
    where
        F: StoreOf<T>,
    {
        if !self.is_nested() {
            panic!("Grid::copy_from_parent: only a nested grid may copy units from a parent");
        }

        let mut unit = parent.buckets.store().get(pref)?.clone();
        unit.core_mut().reset_membership();

        let cref = self.insert_unit(unit);
        self.buckets.store_mut().record_parent_link(cref, pref);
        Ok(cref)
    }

    /// 删除单元
    ///
    /// 最后手段：优先停用单元而不是删除。删除会压缩其后单元的
    /// 位置并使所有当前有效的补丁失效。
    ///
    /// # Panics
    ///
    /// 句柄过期或记录位置与实际存储不符时为致命错误。
    pub fn remove_unit<T: Unit>(&mut self, r: URef<T>) -> T
    where
        F: StoreOf<T>,
    {
        tracing::warn!(handle = ?r, "removing a unit from the grid; prefer deactivation");
        let unit = self.buckets.store_mut().remove(r);
        self.invalidate_patches();
        unit
    }

    /// 桶内是否存在该标识符的单元
    pub fn unit_exists<T: Unit>(&self, id: UnitId) -> bool
    where
        F: StoreOf<T>,
    {
        self.buckets.store().exists(id)
    }

    /// 按标识符查找句柄
    pub fn by_id<T: Unit>(&self, id: UnitId) -> Option<URef<T>>
    where
        F: StoreOf<T>,
    {
        self.buckets.store().by_id(id)
    }

    /// 解引用句柄
    pub fn unit<T: Unit>(&self, r: URef<T>) -> GridResult<&T>
    where
        F: StoreOf<T>,
    {
        self.buckets.store().get(r)
    }

    /// 解引用句柄（可变）
    ///
    /// 仅修改单元携带的数据，不移动存储，因此不触发补丁失效。
    pub fn unit_mut<T: Unit>(&mut self, r: URef<T>) -> GridResult<&mut T>
    where
        F: StoreOf<T>,
    {
        self.buckets.store_mut().get_mut(r)
    }

    /// 类型 `T` 的桶（只读）
    pub fn store<T: Unit>(&self) -> &UnitStore<T>
    where
        F: StoreOf<T>,
    {
        self.buckets.store()
    }

    /// 查询子单元对应的父网格单元
    pub fn parent_of<T: Unit>(&self, child: URef<T>) -> Option<URef<T>>
    where
        F: StoreOf<T>,
    {
        self.buckets.store().parent_of(child)
    }

    /// 查询父网格单元对应的子单元
    pub fn child_of<T: Unit>(&self, parent: URef<T>) -> Option<URef<T>>
    where
        F: StoreOf<T>,
    {
        self.buckets.store().child_of(parent)
    }

    // ------------------------------------------------------------------
    // 补丁管理
    // ------------------------------------------------------------------

    /// 新建补丁，返回其标识符
    ///
    /// 标识符优先重用已删除补丁腾出的编号（FIFO），否则顺延。
    pub fn add_patch(&mut self) -> PatchId {
        let id = match self.vacant_patch_ids.pop_front() {
            Some(id) => id,
            None => PatchId::new(self.patches.len() as u32),
        };
        self.patches.push(Patch::new(id));
        id
    }

    /// 删除补丁，其标识符进入回收队列
    ///
    /// # Panics
    ///
    /// 标识符不存在时为致命错误。
    pub fn remove_patch(&mut self, id: PatchId) {
        let idx = self
            .patches
            .iter()
            .position(|p| p.id() == id)
            .unwrap_or_else(|| panic!("Grid::remove_patch: no patch with the given id exists: {}", id));
        self.patches.remove(idx);
        self.vacant_patch_ids.push_back(id);
    }

    /// 按标识符访问补丁
    ///
    /// # Panics
    ///
    /// 标识符不存在时为致命错误。
    pub fn patch(&self, id: PatchId) -> &Patch<F> {
        self.patches
            .iter()
            .find(|p| p.id() == id)
            .unwrap_or_else(|| panic!("Grid::patch: no patch with the given id exists: {}", id))
    }

    /// 按标识符访问补丁（可变）
    ///
    /// # Panics
    ///
    /// 标识符不存在时为致命错误。
    pub fn patch_mut(&mut self, id: PatchId) -> &mut Patch<F> {
        self.patches
            .iter_mut()
            .find(|p| p.id() == id)
            .unwrap_or_else(|| panic!("Grid::patch: no patch with the given id exists: {}", id))
    }

    /// 补丁数量
    #[inline]
    pub fn n_patches(&self) -> usize {
        self.patches.len()
    }

    /// 将单元纳入指定补丁（见 [`Patch::include_unit`]）
    pub fn include_unit<T: Unit>(&mut self, pid: PatchId, r: URef<T>, ts: u32) -> GridResult<()>
    where
        F: StoreOf<T>,
    {
        let Self {
            buckets, patches, ..
        } = self;
        let patch = patches
            .iter_mut()
            .find(|p| p.id() == pid)
            .unwrap_or_else(|| panic!("Grid::patch: no patch with the given id exists: {}", pid));
        patch.include_unit(buckets.store_mut(), r, ts)
    }

    /// 将单元移出指定补丁（见 [`Patch::exclude_unit`]）
    pub fn exclude_unit<T: Unit>(&mut self, pid: PatchId, r: URef<T>) -> GridResult<()>
    where
        F: StoreOf<T>,
    {
        let Self {
            buckets, patches, ..
        } = self;
        let patch = patches
            .iter_mut()
            .find(|p| p.id() == pid)
            .unwrap_or_else(|| panic!("Grid::patch: no patch with the given id exists: {}", pid));
        patch.exclude_unit(buckets.store_mut(), r)
    }

    /// 使所有当前有效的补丁失效
    fn invalidate_patches(&mut self) {
        for patch in &mut self.patches {
            if patch.is_up_to_date() {
                patch.invalidate();
            }
        }
    }
}
