// crates/hdm_grid/src/patch.rs

//! 计算补丁
//!
//! 补丁（[`Patch`]）标记网格中的活跃计算区域：数值计算只在补丁
//! 纳入的单元上进行。补丁按单元类型持有句柄序列，句柄指向所属
//! 网格桶中的单元。
//!
//! # 有效性协议
//!
//! 网格上任何可能移动单元的变更都会使补丁失效
//! （`up_to_date = false, locked = true`）。失效期间不得读取补丁
//! 的引用序列；求解器在重新表达补丁内容后调用 [`Patch::validate`]，
//! 解锁策略（[`Patch::unlock`]）由求解器自行决定。

use crate::error::GridResult;
use crate::family::{StoreOf, UnitFamily};
use crate::handle::URef;
use crate::store::UnitStore;
use crate::unit::Unit;
use hdm_foundation::{PatchId, INVALID_INDEX};

/// 网格活跃区域的视图
///
/// 纳入是尾部追加；移出按下标压缩（绝不交换删除），因此引用
/// 序列保持单元的激活顺序。
pub struct Patch<F: UnitFamily> {
    /// 按单元类型的句柄序列
    refs: F::Refs,
    /// 引用序列是否与网格存储一致
    up_to_date: bool,
    /// 是否锁定（失效时置位，解除由求解器决定）
    locked: bool,
    /// 网格分配的补丁标识符
    id: PatchId,
}

impl<F: UnitFamily> Patch<F> {
    /// 创建补丁（由网格在分配标识符后调用）
    pub(crate) fn new(id: PatchId) -> Self {
        Self {
            refs: F::Refs::default(),
            up_to_date: false,
            locked: false,
            id,
        }
    }

    /// 补丁标识符
    #[inline]
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// 是否锁定
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// 引用序列是否与网格存储一致
    #[inline]
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// 纳入单元：追加句柄、回写补丁位置并激活单元
    ///
    /// 单元在时间步 `ts` 被激活；已激活的单元不能重复纳入
    /// （致命错误）。句柄过期时返回
    /// [`crate::GridError::InvalidatedRef`]。
    pub fn include_unit<T: Unit>(
        &mut self,
        store: &mut UnitStore<T>,
        r: URef<T>,
        ts: u32,
    ) -> GridResult<()>
    where
        F: StoreOf<T>,
    {
        let seq = F::refs_mut(&mut self.refs);
        let unit = store.get_mut(r)?;

        unit.core_mut().patch_pos = seq.len() as u32;
        unit.core_mut().activate(ts);
        unit.core_mut().patch_id = self.id;

        seq.push(r);
        Ok(())
    }

    /// 移出单元：停用单元、移除句柄并压缩其后单元的补丁位置
    ///
    /// 未激活的单元不能移出（致命错误）。句柄过期时返回
    /// [`crate::GridError::InvalidatedRef`]。
    pub fn exclude_unit<T: Unit>(&mut self, store: &mut UnitStore<T>, r: URef<T>) -> GridResult<()>
    where
        F: StoreOf<T>,
    {
        let unit = store.get_mut(r)?;
        let patch_pos = unit.core().patch_pos() as usize;

        unit.core_mut().deactivate();
        unit.core_mut().patch_id = PatchId::NONE;
        unit.core_mut().patch_pos = INVALID_INDEX;

        let seq = F::refs_mut(&mut self.refs);
        debug_assert_eq!(seq.get(patch_pos), Some(&r));
        seq.remove(patch_pos);

        // 压缩其后单元的补丁位置（保持激活顺序）
        for k in patch_pos..seq.len() {
            let follower = seq[k];
            store.get_mut(follower)?.core_mut().patch_pos -= 1;
        }
        Ok(())
    }

    /// 使补丁失效
    ///
    /// 网格在任何可能移动单元的变更后调用。幂等。
    pub fn invalidate(&mut self) {
        self.up_to_date = false;
        self.locked = true;
    }

    /// 标记引用序列已与网格存储一致
    ///
    /// 仅清除失效标志；锁定状态不变，解锁策略归求解器所有。
    pub fn validate(&mut self) {
        self.up_to_date = true;
    }

    /// 解锁补丁（求解器在重新表达补丁内容后调用）
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// 类型 `T` 的引用序列（只读视图）
    ///
    /// # Panics
    ///
    /// 补丁失效期间读取引用序列为致命错误。
    pub fn units<T: Unit>(&self) -> &[URef<T>]
    where
        F: StoreOf<T>,
    {
        if !self.up_to_date {
            panic!(
                "Patch {}: refs may not be dereferenced while the patch is out of date",
                self.id
            );
        }
        F::refs(&self.refs)
    }

    /// 类型 `T` 的引用序列长度（失效期间也可查询）
    pub fn n_units<T: Unit>(&self) -> usize
    where
        F: StoreOf<T>,
    {
        F::refs(&self.refs).len()
    }
}
