// crates/hdm_grid/src/store.rs

//! 单类型桶
//!
//! [`UnitStore`] 按插入顺序稠密存储一种类型的网格单元，并维护：
//!
//! - 槽位表：稳定槽位 → 当前位置，句柄经它解析（见 [`crate::handle`]）；
//! - `id2pos`：稳定标识符 → 当前位置，在活跃标识符上是双射；
//! - 空位队列：删除腾出的位置，插入时按先进先出重用。
//!
//! 删除会将后续单元整体前移一位（保持顺序，绝不交换删除）；
//! 所有位置变动都会同步回写单元的 `pos`、`id2pos` 与槽位表。
//!
//! 子网格的桶还记录父子单元对应关系，供跨分辨率层级的边界数据
//! 传递使用。

use crate::error::{GridError, GridResult};
use crate::handle::URef;
use crate::unit::Unit;
use hdm_foundation::{SlotTable, UnitId};
use std::collections::{HashMap, VecDeque};

/// 一种单元类型的存储桶
pub struct UnitStore<T: Unit> {
    /// 稠密单元数组，下标即单元的 `pos`
    units: Vec<T>,
    /// 位置 → 槽位引用（与 `units` 平行）
    slot_of: Vec<hdm_foundation::RawSlot>,
    /// 槽位 → 位置的代际映射
    table: SlotTable,
    /// 删除腾出的可重用位置（FIFO）
    vacant: VecDeque<u32>,
    /// 稳定标识符 → 当前位置
    id2pos: HashMap<UnitId, u32>,
    /// 子单元槽位 → 父网格单元引用（仅子网格使用）
    child_to_parent: HashMap<u32, hdm_foundation::RawSlot>,
    /// 父网格单元槽位 → 子单元引用（仅子网格使用）
    parent_to_child: HashMap<u32, hdm_foundation::RawSlot>,
}

impl<T: Unit> Default for UnitStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Unit> UnitStore<T> {
    /// 创建空桶
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            slot_of: Vec::new(),
            table: SlotTable::new(),
            vacant: VecDeque::new(),
            id2pos: HashMap::new(),
            child_to_parent: HashMap::new(),
            parent_to_child: HashMap::new(),
        }
    }

    /// 创建指定容量的桶
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            units: Vec::with_capacity(capacity),
            slot_of: Vec::with_capacity(capacity),
            table: SlotTable::with_capacity(capacity),
            vacant: VecDeque::new(),
            id2pos: HashMap::with_capacity(capacity),
            child_to_parent: HashMap::new(),
            parent_to_child: HashMap::new(),
        }
    }

    /// 活跃单元数量
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 可重用空位数量
    #[inline]
    pub fn n_vacant(&self) -> usize {
        self.vacant.len()
    }

    /// 插入单元，返回其句柄
    ///
    /// 位置分配：空位队列非空时重用队首位置（单元插入到该下标，
    /// 其后的单元整体后移一位），否则追加到末尾。多次删除后队首
    /// 位置可能超出当前长度，此时折算为追加。
    ///
    /// # Panics
    ///
    /// 标识符在桶内重复时为致命错误。
    pub fn insert(&mut self, mut unit: T) -> URef<T> {
        let id = unit.core().id();
        if self.id2pos.contains_key(&id) {
            panic!("UnitStore: unit id {} is used multiple times in this bucket", id);
        }

        let pos = match self.vacant.pop_front() {
            Some(p) => (p as usize).min(self.units.len()) as u32,
            None => self.units.len() as u32,
        };

        unit.core_mut().pos = pos;
        let raw = self.table.bind(pos);
        self.units.insert(pos as usize, unit);
        self.slot_of.insert(pos as usize, raw);
        self.id2pos.insert(id, pos);
        self.reindex_from(pos as usize + 1);

        URef::from_raw(raw)
    }

    /// 删除单元并返回它，后续单元位置前移一位
    ///
    /// 最后手段：优先通过补丁停用单元，而不是删除它。
    ///
    /// # Panics
    ///
    /// 句柄复位、过期，或记录位置与实际存储不符时为致命错误。
    pub fn remove(&mut self, r: URef<T>) -> T {
        let pos = match self.table.resolve(r.raw()) {
            Some(p) => p,
            None => panic!(
                "UnitStore::remove: unit position to be removed is incorrect ({:?})",
                r
            ),
        };

        let unit = self.units.remove(pos as usize);
        debug_assert_eq!(unit.core().pos(), pos);
        let raw = self.slot_of.remove(pos as usize);
        debug_assert_eq!(raw, r.raw());

        self.table.release(raw);
        self.id2pos.remove(&unit.core().id());
        self.vacant.push_back(pos);
        self.reindex_from(pos as usize);

        unit
    }

    /// 校验句柄的记录位置与实际存储一致
    pub fn confirm_position(&self, r: URef<T>) -> bool {
        match self.table.resolve(r.raw()) {
            Some(pos) => self
                .units
                .get(pos as usize)
                .is_some_and(|u| u.core().pos() == pos),
            None => false,
        }
    }

    /// 解引用句柄
    #[inline]
    pub fn get(&self, r: URef<T>) -> GridResult<&T> {
        match self.table.resolve(r.raw()) {
            Some(pos) => Ok(&self.units[pos as usize]),
            None => Err(GridError::InvalidatedRef {
                slot: r.slot(),
                generation: r.generation(),
            }),
        }
    }

    /// 解引用句柄（可变）
    #[inline]
    pub fn get_mut(&mut self, r: URef<T>) -> GridResult<&mut T> {
        match self.table.resolve(r.raw()) {
            Some(pos) => Ok(&mut self.units[pos as usize]),
            None => Err(GridError::InvalidatedRef {
                slot: r.slot(),
                generation: r.generation(),
            }),
        }
    }

    /// 按稳定标识符查找句柄
    pub fn by_id(&self, id: UnitId) -> Option<URef<T>> {
        let pos = *self.id2pos.get(&id)?;
        Some(URef::from_raw(self.slot_of[pos as usize]))
    }

    /// 按稳定标识符查找句柄，不存在时返回错误
    pub fn require_by_id(&self, id: UnitId) -> GridResult<URef<T>> {
        self.by_id(id).ok_or(GridError::UnknownUnit { id })
    }

    /// 桶内是否存在该标识符的单元
    #[inline]
    pub fn exists(&self, id: UnitId) -> bool {
        self.id2pos.contains_key(&id)
    }

    /// 指定位置单元的句柄
    ///
    /// # Panics
    ///
    /// 位置越界时为致命错误。
    pub fn ref_at(&self, pos: u32) -> URef<T> {
        match self.slot_of.get(pos as usize) {
            Some(&raw) => URef::from_raw(raw),
            None => panic!(
                "UnitStore: position {} is out of range 0..{}",
                pos,
                self.units.len()
            ),
        }
    }

    /// 按位置访问单元
    #[inline]
    pub fn at(&self, pos: u32) -> Option<&T> {
        self.units.get(pos as usize)
    }

    /// 遍历所有单元
    pub fn iter(&self) -> impl Iterator<Item = (URef<T>, &T)> {
        self.units
            .iter()
            .zip(self.slot_of.iter())
            .map(|(u, &raw)| (URef::from_raw(raw), u))
    }

    /// 遍历所有单元（可变）
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (URef<T>, &mut T)> {
        self.units
            .iter_mut()
            .zip(self.slot_of.iter())
            .map(|(u, &raw)| (URef::from_raw(raw), u))
    }

    /// 记录父子单元对应关系（仅子网格的桶调用）
    pub fn record_parent_link(&mut self, child: URef<T>, parent: URef<T>) {
        self.child_to_parent.insert(child.slot(), parent.raw());
        self.parent_to_child.insert(parent.slot(), child.raw());
    }

    /// 查询子单元对应的父网格单元
    pub fn parent_of(&self, child: URef<T>) -> Option<URef<T>> {
        self.child_to_parent
            .get(&child.slot())
            .copied()
            .map(URef::from_raw)
    }

    /// 查询父网格单元对应的子单元
    pub fn child_of(&self, parent: URef<T>) -> Option<URef<T>> {
        self.parent_to_child
            .get(&parent.slot())
            .copied()
            .map(URef::from_raw)
    }

    /// 位置变动后的重建：回写 `pos`、`id2pos` 与槽位表
    fn reindex_from(&mut self, start: usize) {
        for p in start..self.units.len() {
            self.units[p].core_mut().pos = p as u32;
            let id = self.units[p].core().id();
            self.id2pos.insert(id, p as u32);
            self.table.relocate(self.slot_of[p].index(), p as u32);
        }
    }

    /// 校验桶内不变量（测试与诊断用）
    ///
    /// 对每个活跃单元 `u`：`units[u.pos] == u` 且 `id2pos[u.id] == u.pos`。
    pub fn check_invariants(&self) -> bool {
        if self.units.len() != self.slot_of.len() {
            return false;
        }
        for (p, unit) in self.units.iter().enumerate() {
            if unit.core().pos() != p as u32 {
                return false;
            }
            if self.id2pos.get(&unit.core().id()) != Some(&(p as u32)) {
                return false;
            }
            if self.table.resolve(self.slot_of[p]) != Some(p as u32) {
                return false;
            }
        }
        self.id2pos.len() == self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitCore;

    struct Cell {
        core: UnitCore,
        depth: f64,
    }

    impl Cell {
        fn new(id: i32, depth: f64) -> Self {
            Self {
                core: UnitCore::new(UnitId::new(id)),
                depth,
            }
        }
    }

    impl Unit for Cell {
        fn core(&self) -> &UnitCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut UnitCore {
            &mut self.core
        }
    }

    #[test]
    fn test_insert_assigns_positions() {
        let mut store = UnitStore::new();
        let a = store.insert(Cell::new(10, 1.0));
        let b = store.insert(Cell::new(11, 2.0));

        assert_eq!(store.get(a).unwrap().core().pos(), 0);
        assert_eq!(store.get(b).unwrap().core().pos(), 1);
        assert!(store.check_invariants());
    }

    #[test]
    fn test_handle_survives_bucket_growth() {
        // 插入 3 个单元，在位置 1 的单元上建句柄，再插入第 4 个
        // 触发底层向量扩容：句柄保持有效且解析到同一单元。
        let mut store = UnitStore::with_capacity(3);
        store.insert(Cell::new(0, 0.0));
        let h = store.insert(Cell::new(1, 1.0));
        store.insert(Cell::new(2, 2.0));

        store.insert(Cell::new(3, 3.0));

        assert!(!h.is_reset());
        let unit = store.get(h).unwrap();
        assert_eq!(unit.core().id(), UnitId::new(1));
        assert!((unit.depth - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remove_compacts_and_keeps_handles() {
        let mut store = UnitStore::new();
        let a = store.insert(Cell::new(0, 0.0));
        let b = store.insert(Cell::new(1, 1.0));
        let c = store.insert(Cell::new(2, 2.0));

        store.remove(b);

        // 后续单元前移一位，句柄仍指向同一单元
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a).unwrap().core().pos(), 0);
        assert_eq!(store.get(c).unwrap().core().pos(), 1);
        assert_eq!(store.get(c).unwrap().core().id(), UnitId::new(2));
        assert!(store.check_invariants());

        // 被删单元的句柄失效
        assert!(matches!(
            store.get(b),
            Err(GridError::InvalidatedRef { .. })
        ));
    }

    #[test]
    fn test_insert_remove_roundtrip() {
        let mut store = UnitStore::new();
        store.insert(Cell::new(0, 0.0));
        let len_before = store.len();

        let r = store.insert(Cell::new(1, 1.0));
        store.remove(r);

        assert_eq!(store.len(), len_before);
        assert_eq!(store.n_vacant(), 1);
    }

    #[test]
    fn test_vacant_reused_fifo() {
        let mut store = UnitStore::new();
        let a = store.insert(Cell::new(0, 0.0));
        store.insert(Cell::new(1, 1.0));
        store.insert(Cell::new(2, 2.0));

        store.remove(a); // 腾出位置 0

        let d = store.insert(Cell::new(3, 3.0));
        // 先进先出：新单元占据位置 0
        assert_eq!(store.get(d).unwrap().core().pos(), 0);
        assert_eq!(store.n_vacant(), 0);
        assert!(store.check_invariants());
    }

    #[test]
    fn test_by_id_lookup() {
        let mut store = UnitStore::new();
        let a = store.insert(Cell::new(42, 0.0));

        assert!(store.exists(UnitId::new(42)));
        assert_eq!(store.by_id(UnitId::new(42)), Some(a));
        assert!(store.by_id(UnitId::new(43)).is_none());
        assert!(matches!(
            store.require_by_id(UnitId::new(43)),
            Err(GridError::UnknownUnit { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "used multiple times")]
    fn test_duplicate_id_panics() {
        let mut store = UnitStore::new();
        store.insert(Cell::new(7, 0.0));
        store.insert(Cell::new(7, 1.0));
    }

    #[test]
    #[should_panic(expected = "position to be removed is incorrect")]
    fn test_remove_stale_handle_panics() {
        let mut store = UnitStore::new();
        let a = store.insert(Cell::new(0, 0.0));
        store.remove(a);
        store.remove(a);
    }

    #[test]
    fn test_parent_links() {
        let mut parent = UnitStore::new();
        let p = parent.insert(Cell::new(0, 0.0));

        let mut child = UnitStore::new();
        let c = child.insert(Cell::new(0, 0.0));
        child.record_parent_link(c, p);

        assert_eq!(child.parent_of(c), Some(p));
        assert_eq!(child.child_of(p), Some(c));
        assert_eq!(child.parent_of(URef::RESET), None);
    }

    #[test]
    fn test_iter_order() {
        let mut store = UnitStore::new();
        store.insert(Cell::new(0, 0.0));
        store.insert(Cell::new(1, 1.0));
        store.insert(Cell::new(2, 2.0));

        let ids: Vec<i32> = store.iter().map(|(_, u)| u.core().id().get()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
