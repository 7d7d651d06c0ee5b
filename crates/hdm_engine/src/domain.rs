// crates/hdm_engine/src/domain.rs

//! 模拟域
//!
//! 一个域封装一次独立的模型模拟：独有的输入、求解器（及其网格）
//! 与输出。层级、相位注册与多线程推进等通用任务在本模块实现；
//! 读取输入、构建成员、数值初始化等完全依赖模型细节的任务经由
//! [`DomainModel`] 留给具体模型。
//!
//! # 生命周期
//!
//! 构造（空壳）→ 层级接线 → 并发接线 → 成员实例化 → 读取输入 →
//! 初始化（注册相位）→ 时间步进 → 后处理。
//!
//! # 所有权
//!
//! 项目是所有域的唯一属主。父子边仅作导航用：子→父为强引用，
//! 父→子为弱引用，避免所有权环。

use crate::error::EngineResult;
use crate::phase::Phase;
use crate::solver::Solver;
use crate::threading::{PhaseSync, Pool};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// 项目输入文件中一行域定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSpec {
    /// 域标识符，项目内唯一
    pub id: String,
    /// 域输入路径
    pub path: PathBuf,
    /// 输出目录，项目内唯一
    pub output_dir: PathBuf,
    /// 父域标识符（子域才有）
    pub parent_id: Option<String>,
}

impl DomainSpec {
    /// 创建根域定义
    pub fn root(id: impl Into<String>, path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            output_dir: output_dir.into(),
            parent_id: None,
        }
    }

    /// 创建子域定义
    pub fn child(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            output_dir: output_dir.into(),
            parent_id: Some(parent_id.into()),
        }
    }
}

/// 成员实例化时传给模型的域上下文
pub struct DomainContext {
    /// 域标识符
    pub id: String,
    /// 域输入路径
    pub path: PathBuf,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 域内并行计算池（并发接线后可用）
    pub compute: Option<Arc<rayon::ThreadPool>>,
    /// 域内处理器预算
    pub n_proc_intra: usize,
}

/// 域模型接口
///
/// 具体模型实现本 trait 提供模型相关的全部内容；引擎按生命周期
/// 顺序调用各入口。`parent` 在成员实例化时指向父域模型（若有），
/// 子模型通常在此克隆父网格的共享句柄，供边界相位读取。
pub trait DomainModel: Send + Sized + 'static {
    /// 求解器类型
    type Solver: Solver;

    /// 由域定义构造空壳模型
    fn create(spec: &DomainSpec) -> EngineResult<Self>;

    /// 惰性实例化成员（求解器、网格、输出等）
    fn instantiate_members(
        &mut self,
        ctx: &DomainContext,
        parent: Option<&Self>,
    ) -> EngineResult<()>;

    /// 读取域输入
    fn read_inputs(&mut self) -> EngineResult<()>;

    /// 完成数值初始化（时间步进开始前）
    fn do_initialize(&mut self) -> EngineResult<()>;

    /// 构造相位序列（初始化尾声由引擎拉取并注册）
    fn build_phases(&mut self) -> Vec<Box<dyn Phase<Self>>>;

    /// 模拟结束后的后处理
    fn post_process(&mut self) -> EngineResult<()>;

    /// 本域的时间步总数
    fn nts(&self) -> u32;

    /// 求解器
    fn solver(&self) -> &Self::Solver;

    /// 求解器（可变）
    fn solver_mut(&mut self) -> &mut Self::Solver;
}

/// 域单元：项目持有、线程间共享的域句柄
pub type DomainCell<M> = Arc<Mutex<Domain<M>>>;

/// 一次独立的模型模拟
pub struct Domain<M: DomainModel> {
    spec: DomainSpec,
    model: M,
    phases: Vec<Box<dyn Phase<M>>>,

    // 层级（导航用；项目是唯一属主）
    parent: Option<DomainCell<M>>,
    children: Vec<Weak<Mutex<Domain<M>>>>,

    // 并发
    sync: Arc<PhaseSync>,
    cp_slot: usize,
    pool: Option<Arc<Pool>>,
    compute: Option<Arc<rayon::ThreadPool>>,
    n_proc_intra: usize,

    initialized: bool,
    hierarchy_set: bool,
}

impl<M: DomainModel> Domain<M> {
    /// 创建域
    pub fn new(spec: DomainSpec, model: M) -> Self {
        tracing::debug!(domain = %spec.id, "domain is constructed");
        Self {
            spec,
            model,
            phases: Vec::new(),
            parent: None,
            children: Vec::new(),
            sync: Arc::new(PhaseSync::new()),
            cp_slot: 0,
            pool: None,
            compute: None,
            n_proc_intra: 1,
            initialized: false,
            hierarchy_set: false,
        }
    }

    // ------------------------------------------------------------------
    // 属性访问
    // ------------------------------------------------------------------

    /// 域标识符
    pub fn id(&self) -> &str {
        &self.spec.id
    }

    /// 域输入路径
    pub fn path(&self) -> &Path {
        &self.spec.path
    }

    /// 输出目录
    pub fn output_dir(&self) -> &Path {
        &self.spec.output_dir
    }

    /// 域定义
    pub fn spec(&self) -> &DomainSpec {
        &self.spec
    }

    /// 模型
    pub fn model(&self) -> &M {
        &self.model
    }

    /// 模型（可变）
    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 层级是否已接线
    pub fn hierarchy_is_set(&self) -> bool {
        self.hierarchy_set
    }

    /// 是否为父域（无父域的域）
    ///
    /// # Panics
    ///
    /// 层级尚未接线时为致命错误。
    pub fn is_parent(&self) -> bool {
        if !self.hierarchy_set {
            panic!("Domain {}: hierarchy is not set yet", self.spec.id);
        }
        self.parent.is_none()
    }

    /// 是否为子域
    ///
    /// # Panics
    ///
    /// 层级尚未接线时为致命错误。
    pub fn is_child(&self) -> bool {
        !self.is_parent()
    }

    /// 子域数量
    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    /// 第 `i` 个子域
    ///
    /// # Panics
    ///
    /// 下标越界或子域已被销毁时为致命错误。
    pub fn child(&self, i: usize) -> DomainCell<M> {
        let weak = self.children.get(i).unwrap_or_else(|| {
            panic!(
                "Domain {}: child domain index {} is invalid",
                self.spec.id, i
            )
        });
        weak.upgrade().unwrap_or_else(|| {
            panic!(
                "Domain {}: child domain {} is no longer alive",
                self.spec.id, i
            )
        })
    }

    /// 父域
    pub fn parent(&self) -> Option<DomainCell<M>> {
        self.parent.clone()
    }

    /// 已注册相位数
    pub fn n_phases(&self) -> usize {
        self.phases.len()
    }

    /// 域内并行计算池
    pub fn compute_pool(&self) -> Option<Arc<rayon::ThreadPool>> {
        self.compute.clone()
    }

    // ------------------------------------------------------------------
    // 层级接线
    // ------------------------------------------------------------------

    /// 配置域的层级关系
    ///
    /// `parent` 为 `None` 时将 `cell` 标记为根域；否则把 `cell`
    /// 挂为 `parent` 的子域：父域登记弱引用，子域记录强引用并共享
    /// 父域的同步构件。
    ///
    /// # Panics
    ///
    /// 子域的父域已设置过时为致命错误。
    pub fn set_hierarchy(cell: &DomainCell<M>, parent: Option<&DomainCell<M>>) {
        match parent {
            None => {
                cell.lock().hierarchy_set = true;
            }
            Some(parent_cell) => {
                let child_nphases = cell.lock().phases.len() as u32;

                let (sync, slot) = {
                    let mut p = parent_cell.lock();
                    p.children.push(Arc::downgrade(cell));
                    p.hierarchy_set = true;
                    let slot = p.sync.attach_child(child_nphases);
                    (p.sync.clone(), slot)
                };

                let mut child = cell.lock();
                if child.parent.is_some() {
                    panic!(
                        "Domain::set_hierarchy: parent domain of {} is already set",
                        child.spec.id
                    );
                }
                tracing::debug!(child = %child.spec.id, "hierarchy wired");
                child.parent = Some(parent_cell.clone());
                child.sync = sync;
                child.cp_slot = slot;
                child.hierarchy_set = true;
            }
        }
    }

    /// 配置域的并发构件（由项目在层级接线后调用）
    ///
    /// # Panics
    ///
    /// 层级尚未接线时为致命错误。
    pub(crate) fn set_concurrency(
        &mut self,
        pool: Option<Arc<Pool>>,
        compute: Option<Arc<rayon::ThreadPool>>,
        n_proc_intra: usize,
    ) {
        if !self.hierarchy_set {
            panic!(
                "Domain concurrency configuration: hierarchy of {} is not set yet",
                self.spec.id
            );
        }
        self.pool = pool;
        self.compute = compute;
        self.n_proc_intra = n_proc_intra;
    }

    // ------------------------------------------------------------------
    // 相位注册
    // ------------------------------------------------------------------

    /// 注册一个相位
    ///
    /// 相位追加到序列尾部，控制点模数同步加一。
    ///
    /// # Panics
    ///
    /// 相位数与控制点模数不一致时为致命错误。
    pub fn insert_phase(&mut self, phase: Box<dyn Phase<M>>) {
        tracing::debug!(domain = %self.spec.id, phase = phase.name(), "phase registered");
        self.phases.push(phase);

        let mut table = self.sync.table.lock();
        let cp = &mut table[self.cp_slot];
        cp.register_phase();
        if cp.ncp() as usize != self.phases.len() {
            panic!("Phasing: the number of phases and the number of control points are inconsistent");
        }
    }

    // ------------------------------------------------------------------
    // 生命周期（由项目驱动）
    // ------------------------------------------------------------------

    /// 惰性实例化模型成员
    pub(crate) fn instantiate(&mut self, parent_model: Option<&M>) -> EngineResult<()> {
        let ctx = DomainContext {
            id: self.spec.id.clone(),
            path: self.spec.path.clone(),
            output_dir: self.spec.output_dir.clone(),
            compute: self.compute.clone(),
            n_proc_intra: self.n_proc_intra,
        };
        self.model.instantiate_members(&ctx, parent_model)
    }

    /// 读取域输入
    pub(crate) fn read_inputs(&mut self) -> EngineResult<()> {
        self.model.read_inputs()
    }

    /// 完成域初始化
    ///
    /// 依次：确保输出目录存在、模型数值初始化、求解器初始化、
    /// 注册模型相位。
    pub fn initialize(&mut self) -> EngineResult<()> {
        self.ensure_output_dir()?;
        self.model.do_initialize()?;
        self.model.solver_mut().initialize()?;
        for phase in self.model.build_phases() {
            self.insert_phase(phase);
        }
        self.initialized = true;
        Ok(())
    }

    /// 后处理
    pub(crate) fn post_process(&mut self) -> EngineResult<()> {
        self.model.post_process()
    }

    /// 确保输出目录存在（POSIX 权限 0744）
    fn ensure_output_dir(&self) -> EngineResult<()> {
        let dir = &self.spec.output_dir;
        if !dir.exists() {
            let mut builder = std::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o744);
            }
            builder.create(dir)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 时间步进
    // ------------------------------------------------------------------

    /// 推进 `nts` 个时间步
    ///
    /// 无子域的父域走顺序模式；其余域走并发模式，每个相位的执行
    /// 由相位同步协议把关。两种模式都按插入顺序、时间步递增地
    /// 恰好执行每个相位一次。
    pub fn timestepping(&mut self, nts: u32) {
        tracing::info!(domain = %self.spec.id, nts, "initiating timestepping");

        if self.is_parent() && self.children.is_empty() {
            for ts in 1..=nts {
                for p in 0..self.phases.len() {
                    self.phases[p].run(&mut self.model, ts);
                }
            }
        } else {
            let pool = self.pool.clone().unwrap_or_else(|| {
                panic!(
                    "Domain {}: concurrency is not configured for concurrent timestepping",
                    self.spec.id
                )
            });
            for ts in 1..=nts {
                for p in 0..self.phases.len() {
                    self.phase_check(&pool);
                    self.phases[p].run(&mut self.model, ts);
                    self.complete_phase(&pool);
                }
            }
        }
    }

    /// 等待进度窗口允许执行下一相位，然后推进控制点并取许可
    ///
    /// 父域：等到每个子域与自己处于同一控制点
    /// （`(ncp + val − child.val) mod ncp == 0`）。
    ///
    /// 子域：等到父域领先两个以上相位，或恰好领先一个且已完成
    /// （此时父域当前边界输出可读）。
    fn phase_check(&self, pool: &Pool) {
        let sync = &self.sync;
        if self.is_parent() {
            let mut table = sync.table.lock();
            loop {
                let cp = &table[0];
                let ready = table[1..].iter().all(|child| cp.progress_window(child) == 0);
                if ready {
                    break;
                }
                sync.parent_cv.wait(&mut table);
            }
            table[0].increment();
            sync.children_cv.notify_all();
            pool.acquire();
        } else {
            let mut table = sync.table.lock();
            loop {
                let parent_cp = &table[0];
                let window = parent_cp.progress_window(&table[self.cp_slot]);
                if window > 1 || (window == 1 && parent_cp.is_done()) {
                    break;
                }
                sync.children_cv.wait(&mut table);
            }
            table[self.cp_slot].increment();
            sync.parent_cv.notify_one();
            pool.acquire();
        }
    }

    /// 归还许可、标记相位完成并通知对侧
    fn complete_phase(&self, pool: &Pool) {
        pool.release();
        let mut table = self.sync.table.lock();
        table[self.cp_slot].mark_done();
        if self.is_parent() {
            self.sync.children_cv.notify_all();
        } else {
            self.sync.parent_cv.notify_one();
        }
    }
}
