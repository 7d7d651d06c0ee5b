// crates/hdm_grid/src/unit.rs

//! 单元基础属性
//!
//! [`UnitCore`] 封装每个网格单元共有的簿记属性：稳定标识符、当前
//! 存储位置、激活状态与所属补丁。具体的单元类型（节点、单元、
//! 界面等）内嵌一个 `UnitCore` 并实现 [`Unit`] trait。
//!
//! # 激活语义
//!
//! 单元被纳入补丁时激活，移出补丁时停用。`active` 与
//! `patch_id` 始终同步：单元处于激活状态当且仅当其 `patch_id`
//! 指向某个补丁。激活时间步为 0 的单元视为初始激活。

use hdm_foundation::{PatchId, UnitId, INVALID_INDEX};
use serde::{Deserialize, Serialize};

/// 网格单元的公共簿记属性
///
/// 位置类字段（`pos`、`patch_pos`）由网格与补丁维护，单元自身
/// 不修改；`active`/`patch_id` 由补丁的纳入/移出操作维护。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCore {
    /// 稳定标识符，输入输出用，桶内唯一
    id: UnitId,
    /// 在所属桶中的当前位置（可变动）
    pub(crate) pos: u32,
    /// 在所属补丁引用序列中的位置（可变动）
    pub(crate) patch_pos: u32,
    /// 所属补丁标识符，哨兵值表示不属于任何补丁
    pub(crate) patch_id: PatchId,
    /// 是否处于激活状态
    pub(crate) active: bool,
    /// 激活时间步
    pub(crate) activation_ts: u32,
    /// 是否为初始激活单元（激活时间步为 0）
    pub(crate) initially_active: bool,
    /// 是否为边界单元
    boundary: bool,
}

impl UnitCore {
    /// 创建新单元核心
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            pos: INVALID_INDEX,
            patch_pos: INVALID_INDEX,
            patch_id: PatchId::NONE,
            active: false,
            activation_ts: 0,
            initially_active: false,
            boundary: false,
        }
    }

    /// 创建边界单元核心
    pub fn new_boundary(id: UnitId) -> Self {
        let mut core = Self::new(id);
        core.boundary = true;
        core
    }

    /// 稳定标识符
    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// 在所属桶中的当前位置
    #[inline]
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// 在所属补丁引用序列中的位置
    #[inline]
    pub fn patch_pos(&self) -> u32 {
        self.patch_pos
    }

    /// 所属补丁标识符
    #[inline]
    pub fn patch_id(&self) -> PatchId {
        self.patch_id
    }

    /// 是否处于激活状态
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 是否为边界单元
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    /// 设置边界标志
    #[inline]
    pub fn set_boundary(&mut self, boundary: bool) {
        self.boundary = boundary;
    }

    /// 激活时间步
    #[inline]
    pub fn activation_timestep(&self) -> u32 {
        self.activation_ts
    }

    /// 是否为初始激活单元
    #[inline]
    pub fn is_initially_active(&self) -> bool {
        self.initially_active
    }

    /// 激活单元，将其纳入计算
    ///
    /// # Panics
    ///
    /// 单元已处于激活状态时为致命错误。
    pub(crate) fn activate(&mut self, ts: u32) {
        if self.active {
            panic!(
                "Unit activation: unit {} is already active (activation timestep: {})",
                self.id, self.activation_ts
            );
        }
        self.active = true;
        self.activation_ts = ts;
        if ts == 0 {
            self.initially_active = true;
        }
    }

    /// 重置簿记状态，保留标识符与边界标志
    ///
    /// 用于跨网格深拷贝：位置由目标网格重新分配，激活与补丁
    /// 归属在目标网格中重新建立。
    pub(crate) fn reset_membership(&mut self) {
        self.pos = INVALID_INDEX;
        self.patch_pos = INVALID_INDEX;
        self.patch_id = PatchId::NONE;
        self.active = false;
        self.activation_ts = 0;
        self.initially_active = false;
    }

    /// 停用单元，将其移出计算
    ///
    /// # Panics
    ///
    /// 单元未处于激活状态时为致命错误。
    pub(crate) fn deactivate(&mut self) {
        if !self.active {
            panic!(
                "Unit deactivation: unit {} is already deactivated",
                self.id
            );
        }
        self.active = false;
    }
}

/// 网格单元 trait
///
/// 具体的网格单元类型（节点、单元、界面等）内嵌 [`UnitCore`]
/// 并通过本 trait 暴露它。框架只通过 `core`/`core_mut` 访问
/// 簿记属性，单元携带的数值数据对框架不可见。
pub trait Unit: Send + 'static {
    /// 公共簿记属性
    fn core(&self) -> &UnitCore;

    /// 公共簿记属性（可变）
    fn core_mut(&mut self) -> &mut UnitCore;
}
