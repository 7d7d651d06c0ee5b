// crates/hdm_engine/src/threading.rs

//! 相位同步原语
//!
//! 并发时间步进的两件底层构件：
//!
//! - [`ControlPoint`]: 域的进度计数器，`(相位下标, 完成标志)` 对。
//!   同一层级中所有域的控制点放在一张表里，由一把共享互斥锁守护，
//!   等待谓词因此能原子地读取多个控制点。
//! - [`Pool`]: 有界许可池，限制跨域同时执行的相位数。
//!
//! # 进度窗口
//!
//! 父子域之间的执行门禁由进度窗口谓词表达：
//! `(ncp + parent.val − child.val) mod ncp`。窗口为 0 时父子处于
//! 同一控制点；窗口为 1 且父域已完成当前相位时，子域可以读取父域
//! 的边界输出。协议保证任何可观察时刻窗口 ∈ {0, 1}。

use parking_lot::{Condvar, Mutex};

// ============================================================================
// ControlPoint
// ============================================================================

/// 域的进度计数器
///
/// `val` 是当前相位下标（模 `ncp`），`done` 表示当前相位是否执行
/// 完毕。初始 `val` 为回绕哨兵，第一次 [`ControlPoint::increment`]
/// 落在相位 0。
///
/// 本类型自身不带锁：所属层级的共享互斥锁是唯一的同步者。
#[derive(Debug, Clone)]
pub struct ControlPoint {
    /// 相位数（控制点模数）
    ncp: u32,
    /// 当前相位下标（模 ncp）
    val: u32,
    /// 当前相位是否执行完毕
    done: bool,
}

impl Default for ControlPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPoint {
    /// 创建控制点
    pub fn new() -> Self {
        Self {
            ncp: 0,
            val: u32::MAX,
            done: true,
        }
    }

    /// 相位数
    #[inline]
    pub fn ncp(&self) -> u32 {
        self.ncp
    }

    /// 当前相位下标
    #[inline]
    pub fn val(&self) -> u32 {
        self.val
    }

    /// 当前相位是否执行完毕
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// 注册一个相位（模数加一）
    #[inline]
    pub fn register_phase(&mut self) {
        self.ncp += 1;
    }

    /// 设置相位数
    #[inline]
    pub(crate) fn set_ncp(&mut self, ncp: u32) {
        self.ncp = ncp;
    }

    /// 进入下一相位
    ///
    /// `val ← (val + 1) mod ncp`，完成标志清零。
    #[inline]
    pub fn increment(&mut self) {
        debug_assert!(self.ncp > 0, "ControlPoint: increment with no phases registered");
        self.val = self.val.wrapping_add(1) % self.ncp;
        self.done = false;
    }

    /// 标记当前相位执行完毕
    #[inline]
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// 进度窗口：`self`（领先方）相对 `trailing` 的相位差，模 `ncp`
    #[inline]
    pub fn progress_window(&self, trailing: &ControlPoint) -> u32 {
        debug_assert!(self.ncp > 0);
        self.val
            .wrapping_sub(trailing.val)
            .wrapping_add(self.ncp)
            % self.ncp
    }
}

// ============================================================================
// Pool
// ============================================================================

/// 跨域并发的有界许可池
///
/// 池中许可数对应允许同时执行相位的处理器数。[`Pool::acquire`]
/// 在无许可时阻塞；[`Pool::release`] 归还许可并唤醒等待者。
pub struct Pool {
    /// 剩余许可数
    available: Mutex<u32>,
    /// 许可等待队列
    cond: Condvar,
}

impl Pool {
    /// 创建持有 `permits` 个许可的池
    pub fn new(permits: u32) -> Self {
        Self {
            available: Mutex::new(permits),
            cond: Condvar::new(),
        }
    }

    /// 获取一个许可，无许可时阻塞
    pub fn acquire(&self) {
        let mut remaining = self.available.lock();
        while *remaining == 0 {
            self.cond.wait(&mut remaining);
        }
        *remaining -= 1;
    }

    /// 归还一个许可并唤醒等待者
    pub fn release(&self) {
        let mut remaining = self.available.lock();
        *remaining += 1;
        self.cond.notify_all();
    }
}

// ============================================================================
// PhaseSync - 层级共享的同步构件
// ============================================================================

/// 一个域层级共享的同步构件
///
/// 控制点表的下标 0 是父域，其后依次为各子域。表由一把互斥锁
/// 守护；父域在 `parent_cv` 上等待子域的进度通知，子域在
/// `children_cv` 上等待父域的进度通知。
pub(crate) struct PhaseSync {
    /// 控制点表（下标 0 为父域）
    pub(crate) table: Mutex<Vec<ControlPoint>>,
    /// 父域的等待队列（子域 notify_one）
    pub(crate) parent_cv: Condvar,
    /// 子域的等待队列（父域 notify_all）
    pub(crate) children_cv: Condvar,
}

impl PhaseSync {
    /// 创建只含父域槽位的同步构件
    pub(crate) fn new() -> Self {
        Self {
            table: Mutex::new(vec![ControlPoint::new()]),
            parent_cv: Condvar::new(),
            children_cv: Condvar::new(),
        }
    }

    /// 追加一个子域槽位，返回其下标
    pub(crate) fn attach_child(&self, ncp: u32) -> usize {
        let mut table = self.table.lock();
        let mut cp = ControlPoint::new();
        cp.set_ncp(ncp);
        table.push(cp);
        table.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_control_point_first_increment_lands_on_zero() {
        let mut cp = ControlPoint::new();
        cp.set_ncp(3);
        assert!(cp.is_done());

        cp.increment();
        assert_eq!(cp.val(), 0);
        assert!(!cp.is_done());
    }

    #[test]
    fn test_control_point_wraps() {
        let mut cp = ControlPoint::new();
        cp.set_ncp(2);
        cp.increment(); // 0
        cp.increment(); // 1
        cp.increment(); // 回绕
        assert_eq!(cp.val(), 0);
    }

    #[test]
    fn test_register_phase_counts() {
        let mut cp = ControlPoint::new();
        cp.register_phase();
        cp.register_phase();
        assert_eq!(cp.ncp(), 2);
    }

    #[test]
    fn test_progress_window_initial_state() {
        let mut parent = ControlPoint::new();
        let mut child = ControlPoint::new();
        parent.set_ncp(2);
        child.set_ncp(2);

        // 双方都在起始哨兵：窗口为 0
        assert_eq!(parent.progress_window(&child), 0);

        // 父域进入相位 0：窗口为 1
        parent.increment();
        assert_eq!(parent.progress_window(&child), 1);

        // 子域跟进到相位 0：窗口回到 0
        child.increment();
        assert_eq!(parent.progress_window(&child), 0);
    }

    #[test]
    fn test_progress_window_stays_in_unit_range_during_protocol() {
        // 模拟协议推进的窗口轨迹：父子交替推进时窗口始终 ∈ {0,1}
        let mut parent = ControlPoint::new();
        let mut child = ControlPoint::new();
        parent.set_ncp(2);
        child.set_ncp(2);

        for _ in 0..6 {
            parent.increment();
            assert!(parent.progress_window(&child) <= 1);
            parent.mark_done();
            child.increment();
            assert!(parent.progress_window(&child) <= 1);
            child.mark_done();
        }
    }

    #[test]
    fn test_pool_bounds_concurrency() {
        let pool = Arc::new(Pool::new(2));
        let running = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(std::thread::spawn(move || {
                pool.acquire();
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                pool.release();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_phase_sync_slots() {
        let sync = PhaseSync::new();
        let a = sync.attach_child(2);
        let b = sync.attach_child(2);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(sync.table.lock().len(), 3);
    }
}
