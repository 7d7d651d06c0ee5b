// crates/hdm_engine/src/project.rs

//! 顶层驱动
//!
//! [`Project`] 管理一次并发模拟的全部域：实例化、层级与并发接线、
//! 时间步进线程的派生与汇合、输入输出流程的调度。每次并发执行
//! 对应一个 `Project` 实例。
//!
//! # 运行序列
//!
//! `run(n_proc_total, n_proc_child)`：
//!
//! 1. 解析层级（父域必须先于子域声明）；
//! 2. 并发接线（处理器预算分配与钳位，见下）；
//! 3. 按声明顺序逐域实例化成员、读取输入、初始化；
//! 4. 校验各域 `nts` 与相位数一致；
//! 5. 每个域派生一个时间步进线程并汇合；
//! 6. 逐域后处理。
//!
//! # 处理器预算
//!
//! `n_proc_total` 超过硬件并行度时钳位到其减一；`n_proc_child`
//! 钳位到小于 `n_proc_total`。无子域时根域独享全部预算且不建
//! 跨域许可池；有子域时跨域许可数取 `max(1, total/2)`，若显式
//! 给出 `n_proc_child` 则取 `n_proc_child + 1`，根域的域内预算为
//! `max(1, total − inter + 1)`。

use crate::domain::{Domain, DomainCell, DomainModel};
use crate::error::EngineResult;
use crate::input::ProjectInput;
use crate::threading::Pool;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// 一次并发模拟的顶层协调者
pub struct Project<M: DomainModel> {
    /// 项目标识符
    project_id: String,
    /// 时间步总数（各域一致，初始化后确定）
    nts: u32,
    /// 每时间步相位数（各域一致，初始化后确定）
    n_phases: usize,
    /// 全部域，按声明顺序
    domains: Vec<DomainCell<M>>,
    /// 子域标识符 → 父域标识符
    hierarchy: HashMap<String, String>,
}

impl<M: DomainModel> Project<M> {
    /// 创建空项目
    pub fn new(project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        tracing::info!(project = %project_id, "project is initializing");
        Self {
            project_id,
            nts: 0,
            n_phases: 0,
            domains: Vec::new(),
            hierarchy: HashMap::new(),
        }
    }

    /// 由解析的输入文件构造项目，按声明顺序实例化各域
    pub fn from_input(input: &ProjectInput) -> EngineResult<Self> {
        let mut project = Self::new(&input.project_id);
        tracing::info!(
            header = %input.header,
            nd = input.nd,
            "constructing domains listed in the project file"
        );
        for spec in &input.domains {
            let model = M::create(spec)?;
            project.add_domain(Domain::new(spec.clone(), model));
        }
        Ok(project)
    }

    /// 将域加入项目
    ///
    /// # Panics
    ///
    /// 域标识符或输出目录与已有域重复、或子域的父域尚未声明时
    /// 为致命错误。
    pub fn add_domain(&mut self, domain: Domain<M>) {
        let id = domain.id().to_string();
        if self.domain(&id).is_some() {
            panic!("Domain ID: domain id {} is used multiple times", id);
        }
        if self
            .domains
            .iter()
            .any(|cell| cell.lock().output_dir() == domain.output_dir())
        {
            panic!(
                "Output directory: output directory {} is used multiple times",
                domain.output_dir().display()
            );
        }
        if let Some(parent_id) = domain.spec().parent_id.clone() {
            if self.domain(&parent_id).is_none() {
                panic!(
                    "Parent domain: parent domain {} of child domain {} is not instantiated yet; \
                     ensure that {} is declared before {}",
                    parent_id, id, parent_id, id
                );
            }
            self.hierarchy.insert(id, parent_id);
        }
        self.domains.push(Arc::new(Mutex::new(domain)));
    }

    /// 将域移出项目
    ///
    /// # Panics
    ///
    /// 域不存在时为致命错误。
    pub fn remove_domain(&mut self, domain_id: &str) {
        let pos = self
            .domains
            .iter()
            .position(|cell| cell.lock().id() == domain_id)
            .unwrap_or_else(|| panic!("Project: no domain with id {} exists", domain_id));
        self.domains.remove(pos);
        self.hierarchy.remove(domain_id);
    }

    /// 按标识符查找域
    pub fn domain(&self, domain_id: &str) -> Option<DomainCell<M>> {
        self.domains
            .iter()
            .find(|cell| cell.lock().id() == domain_id)
            .cloned()
    }

    /// 域数量
    pub fn nd(&self) -> usize {
        self.domains.len()
    }

    /// 项目标识符
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// 时间步总数（初始化后有效）
    pub fn nts(&self) -> u32 {
        self.nts
    }

    /// 执行全部域的模拟
    ///
    /// `n_proc_total` 是本次运行的处理器总预算，`n_proc_child`
    /// 为子域保留的处理器数（0 表示按半数划分）。
    pub fn run(&mut self, n_proc_total: usize, n_proc_child: usize) -> EngineResult<()> {
        let started = chrono::Utc::now();
        tracing::info!(project = %self.project_id, "run is initializing");

        // 1-2. 层级与并发接线
        self.set_domain_hierarchy();
        self.set_domain_concurrency(n_proc_total, n_proc_child)?;

        // 3. 按声明顺序实例化、读取输入、初始化
        tracing::info!("setting up the simulation");
        for cell in &self.domains {
            let parent = cell.lock().parent();
            match parent {
                Some(parent_cell) => {
                    let parent_guard = parent_cell.lock();
                    cell.lock().instantiate(Some(parent_guard.model()))?;
                }
                None => cell.lock().instantiate(None)?,
            }
        }
        tracing::info!("reading domain inputs");
        for cell in &self.domains {
            cell.lock().read_inputs()?;
        }
        tracing::info!("completing domain initializations");
        for cell in &self.domains {
            cell.lock().initialize()?;
        }

        // 4. 时间步进参数校验
        self.process_timestepping_params();

        // 5. 时间步进
        tracing::info!(nts = self.nts, n_phases = self.n_phases, "timestepping is starting");
        self.initiate_timestepping();

        // 6. 后处理
        tracing::info!("post-processing domains");
        for cell in &self.domains {
            cell.lock().post_process()?;
        }

        let elapsed = chrono::Utc::now() - started;
        tracing::info!(
            elapsed_ms = elapsed.num_milliseconds(),
            "run has finished"
        );
        Ok(())
    }

    /// 解析父域标识符，完成层级接线
    fn set_domain_hierarchy(&mut self) {
        tracing::debug!("constructing domain hierarchy");
        for cell in &self.domains {
            let id = cell.lock().id().to_string();
            match self.hierarchy.get(&id) {
                Some(parent_id) => {
                    let parent = self.domain(parent_id).unwrap_or_else(|| {
                        panic!(
                            "Parent domain: parent domain {} of child domain {} does not exist",
                            parent_id, id
                        )
                    });
                    Domain::set_hierarchy(cell, Some(&parent));
                }
                None => Domain::set_hierarchy(cell, None),
            }
        }
    }

    /// 分配处理器预算并配置各域的并发构件
    fn set_domain_concurrency(
        &mut self,
        n_proc_total: usize,
        n_proc_child: usize,
    ) -> EngineResult<()> {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let mut total = n_proc_total.max(1);
        if total > hw {
            total = (hw - 1).max(1);
            tracing::warn!(
                requested = n_proc_total,
                available = hw,
                using = total,
                "requested processor count exceeds available threads; clamping"
            );
        }
        let mut child_budget = n_proc_child;
        if child_budget >= total {
            child_budget = total - 1;
            tracing::warn!(
                requested = n_proc_child,
                using = child_budget,
                "child processor budget must stay below the total; clamping"
            );
        }

        self.check_multiple_parents();

        for cell in &self.domains {
            let (is_parent, n_children) = {
                let d = cell.lock();
                (d.is_parent(), d.n_children())
            };
            if !is_parent {
                continue; // 子域由其父域接线
            }

            if n_children == 0 {
                if child_budget > 0 {
                    tracing::warn!(
                        domain = %cell.lock().id(),
                        "n_proc_child > 0 but the domain has no children"
                    );
                }
                // 根域独享全部预算，无需跨域许可池
                let compute = build_compute_pool(total)?;
                cell.lock().set_concurrency(None, Some(compute), total);
            } else {
                let mut inter = (total / 2).max(1);
                if child_budget > 0 {
                    inter = child_budget + 1;
                }
                let intra_root = total.saturating_sub(inter).saturating_add(1).max(1);

                let pool = Arc::new(Pool::new(inter as u32));
                let compute = build_compute_pool(intra_root)?;
                cell.lock()
                    .set_concurrency(Some(pool.clone()), Some(compute), intra_root);

                let n = cell.lock().n_children();
                for i in 0..n {
                    let child_cell = cell.lock().child(i);
                    let child_compute = build_compute_pool(1)?;
                    child_cell
                        .lock()
                        .set_concurrency(Some(pool.clone()), Some(child_compute), 1);
                }
                tracing::debug!(
                    inter_domain = inter,
                    intra_root,
                    "concurrency budgets assigned"
                );
            }
        }
        Ok(())
    }

    /// 并发执行只允许一个根域
    fn check_multiple_parents(&self) {
        let n_parents = self
            .domains
            .iter()
            .filter(|cell| cell.lock().is_parent())
            .count();
        if n_parents > 1 {
            panic!("Concurrency: only one parent domain can be executed during parallel runs");
        }
    }

    /// 读取并校验各域的时间步进参数
    ///
    /// # Panics
    ///
    /// 项目没有域，或任一域的 `nts`/相位数与首个域不一致时为
    /// 致命错误。
    fn process_timestepping_params(&mut self) {
        if self.domains.is_empty() {
            panic!("Timestepping parameters: the project has no domains instantiated");
        }

        {
            let first = self.domains[0].lock();
            self.nts = first.model().nts();
            self.n_phases = first.n_phases();
        }

        for cell in &self.domains {
            let d = cell.lock();
            if d.model().nts() != self.nts {
                panic!(
                    "Timestepping parameters: nts of {} is not the same as the previous domain(s)",
                    d.id()
                );
            }
            if d.n_phases() != self.n_phases {
                panic!(
                    "Timestepping parameters: nPhases of {} is not the same as the previous domain(s)",
                    d.id()
                );
            }
        }
    }

    /// 每个域一个时间步进线程，全部汇合后返回
    fn initiate_timestepping(&mut self) {
        let nts = self.nts;
        std::thread::scope(|scope| {
            for cell in &self.domains {
                let cell = Arc::clone(cell);
                scope.spawn(move || {
                    let mut domain = cell.lock();
                    tracing::info!(domain = %domain.id(), "executing domain");
                    domain.timestepping(nts);
                });
            }
        });
    }
}

/// 构建域内并行计算池
fn build_compute_pool(n_threads: usize) -> EngineResult<Arc<rayon::ThreadPool>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()?;
    Ok(Arc::new(pool))
}
