// crates/hdm_foundation/src/slot.rs

//! 代际槽位表（Generation-Checked Slot Table）
//!
//! 本模块是可迁移句柄机制的核心。网格单元存储在按位置排列的稠密
//! 向量中，插入与删除会使后续单元整体移动；外部句柄若直接缓存
//! 位置（或地址），移动后便会悬垂。
//!
//! 槽位表在稳定槽位与当前稠密位置之间建立间接层：
//!
//! - **槽位（slot）**: 单元插入时绑定，生命周期内不变；
//! - **位置（pos）**: 单元在稠密向量中的当前下标，移动时由容器
//!   调用 [`SlotTable::relocate`] 更新；
//! - **代际（generation）**: 槽位被重用时递增的版本号，用于检测
//!   已删除单元的过期句柄。
//!
//! 如此一来，存储重排对外部句柄是无操作的；只有单元真正被删除时
//! 句柄才会失效（代际不匹配）。
//!
//! # 内存布局
//!
//! ```text
//! SlotTable {
//!     entries: [
//!         Occupied { pos: 0, generation: 1 },     // 槽位 0 → 位置 0
//!         Vacant { next_free: None, generation: 2 }, // 空闲链表尾部
//!         Occupied { pos: 1, generation: 1 },     // 槽位 2 → 位置 1
//!     ],
//!     free_head: Some(1),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// 无效位置/槽位标记
pub const INVALID_INDEX: u32 = u32::MAX;

/// 无效代际标记
pub const INVALID_GENERATION: u32 = 0;

// ============================================================================
// RawSlot - 未分型的代际槽位引用
// ============================================================================

/// 未分型的代际槽位引用（8 字节）
///
/// 由槽位下标与代际号组成。上层（`hdm_grid::URef`）为其附加单元
/// 类型标记；本层只负责代际算术。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct RawSlot {
    /// 槽位下标
    index: u32,
    /// 代际号（1 起始，0 表示无效）
    generation: u32,
}

impl RawSlot {
    /// 无效槽位常量
    pub const INVALID: Self = Self {
        index: INVALID_INDEX,
        generation: INVALID_GENERATION,
    };

    /// 创建新槽位引用
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// 获取槽位下标
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// 获取代际号
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// 判断引用是否有效
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_INDEX && self.generation != INVALID_GENERATION
    }

    /// 判断引用是否无效
    #[inline]
    pub const fn is_invalid(self) -> bool {
        !self.is_valid()
    }
}

impl Default for RawSlot {
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for RawSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "RawSlot({}@{})", self.index, self.generation)
        } else {
            write!(f, "RawSlot(INVALID)")
        }
    }
}

impl fmt::Display for RawSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}@{}", self.index, self.generation)
        } else {
            write!(f, "INVALID")
        }
    }
}

// ============================================================================
// SlotTable - 槽位到位置的代际映射
// ============================================================================

/// 表中槽位
#[derive(Debug, Clone)]
enum Entry {
    /// 已占用：记录当前稠密位置
    Occupied { pos: u32, generation: u32 },
    /// 空闲：指向下一个空闲槽位，保留最后使用的代际
    Vacant {
        next_free: Option<u32>,
        generation: u32,
    },
}

/// 代际槽位表
///
/// 维护稳定槽位到当前稠密位置的映射。空闲槽位构成链表以 O(1)
/// 重用；重用时代际递增，使指向旧对象的引用失效。
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    /// 槽位数组
    entries: Vec<Entry>,
    /// 空闲链表头
    free_head: Option<u32>,
    /// 已占用槽位数量
    len: usize,
}

impl SlotTable {
    /// 创建空表
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// 创建指定容量的表
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// 已占用槽位数量
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 为位置 `pos` 绑定一个槽位，返回代际引用
    ///
    /// 优先重用空闲链表中的槽位（代际递增），否则追加新槽位。
    pub fn bind(&mut self, pos: u32) -> RawSlot {
        match self.free_head {
            Some(free_idx) => {
                let idx = free_idx as usize;
                match &self.entries[idx] {
                    Entry::Vacant {
                        next_free,
                        generation,
                    } => {
                        self.free_head = *next_free;
                        let next_gen = generation.wrapping_add(1);
                        let next_gen = if next_gen == INVALID_GENERATION {
                            1
                        } else {
                            next_gen
                        };
                        self.entries[idx] = Entry::Occupied {
                            pos,
                            generation: next_gen,
                        };
                        self.len += 1;
                        RawSlot::new(free_idx, next_gen)
                    }
                    Entry::Occupied { .. } => {
                        panic!("SlotTable corruption: free list points to occupied slot");
                    }
                }
            }
            None => {
                let idx = self.entries.len() as u32;
                let generation = 1;
                self.entries.push(Entry::Occupied { pos, generation });
                self.len += 1;
                RawSlot::new(idx, generation)
            }
        }
    }

    /// 解析槽位引用，返回当前稠密位置
    ///
    /// 引用无效、槽位空闲或代际不匹配时返回 `None`。
    #[inline]
    pub fn resolve(&self, slot: RawSlot) -> Option<u32> {
        if slot.is_invalid() {
            return None;
        }
        match self.entries.get(slot.index() as usize)? {
            Entry::Occupied { pos, generation } if *generation == slot.generation() => Some(*pos),
            _ => None,
        }
    }

    /// 判断槽位引用是否仍然有效
    #[inline]
    pub fn contains(&self, slot: RawSlot) -> bool {
        self.resolve(slot).is_some()
    }

    /// 更新槽位映射的稠密位置
    ///
    /// 容器中单元移动后由容器调用。槽位必须处于占用状态。
    #[inline]
    pub fn relocate(&mut self, slot_index: u32, new_pos: u32) {
        match self.entries.get_mut(slot_index as usize) {
            Some(Entry::Occupied { pos, .. }) => *pos = new_pos,
            _ => panic!("SlotTable corruption: relocate on a vacant slot {}", slot_index),
        }
    }

    /// 释放槽位，返回其最后记录的位置
    ///
    /// 槽位进入空闲链表，保留代际供下次重用时递增。
    /// 引用无效或代际不匹配时返回 `None`。
    pub fn release(&mut self, slot: RawSlot) -> Option<u32> {
        let pos = self.resolve(slot)?;
        let idx = slot.index() as usize;
        self.entries[idx] = Entry::Vacant {
            next_free: self.free_head,
            generation: slot.generation(),
        };
        self.free_head = Some(slot.index());
        self.len -= 1;
        Some(pos)
    }

    /// 清空所有槽位
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free_head = None;
        self.len = 0;
    }
}
