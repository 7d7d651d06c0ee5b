// apps/hdm_cli/src/model.rs

//! 演示模型
//!
//! 一个最小但完整的域模型：每个域一条由单元（Cell）组成的一维
//! 水深剖面，两个相位——
//!
//! - `exchange`: 重新表达补丁，并把父网格对应单元的水深拷贝到
//!   子网格（跨分辨率层级的边界数据传递）；
//! - `update`: 在补丁的活跃单元上做一步松弛，使用域内并行计算池。
//!
//! 数值内容刻意平凡：本模型的意义在于完整走通框架的生命周期与
//! 并发协议，而不在于物理。

use hdm_engine::{DomainContext, DomainModel, DomainSpec, EngineResult, FnPhase, Phase, Solver};
use hdm_grid::prelude::*;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;

/// 水深松弛的目标值
const EQUILIBRIUM_DEPTH: f64 = 1.0;

/// 松弛系数
const RELAXATION: f64 = 0.25;

/// 子网格从父网格拷贝的边界单元数
const N_BOUNDARY_CELLS: usize = 4;

/// 子网格本地单元的标识符偏移，与拷贝来的父单元标识符错开
const LOCAL_ID_OFFSET: i32 = 1000;

// ============================================================================
// 单元类型与桶族
// ============================================================================

/// 演示单元：一段水柱
#[derive(Clone)]
pub struct Cell {
    core: UnitCore,
    /// 水深
    pub depth: f64,
}

impl Cell {
    fn new(id: i32, depth: f64) -> Self {
        Self {
            core: UnitCore::new(UnitId::new(id)),
            depth,
        }
    }

    fn new_boundary(id: i32, depth: f64) -> Self {
        Self {
            core: UnitCore::new_boundary(UnitId::new(id)),
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

/// 演示模型的桶族（单一单元类型）
#[derive(Default)]
pub struct DemoUnits {
    cells: UnitStore<Cell>,
}

/// 与桶族平行的句柄序列族
#[derive(Default)]
pub struct DemoRefs {
    cells: Vec<URef<Cell>>,
}

impl UnitFamily for DemoUnits {
    type Refs = DemoRefs;
}

impl StoreOf<Cell> for DemoUnits {
    fn store(&self) -> &UnitStore<Cell> {
        &self.cells
    }
    fn store_mut(&mut self) -> &mut UnitStore<Cell> {
        &mut self.cells
    }
    fn refs(refs: &DemoRefs) -> &Vec<URef<Cell>> {
        &refs.cells
    }
    fn refs_mut(refs: &mut DemoRefs) -> &mut Vec<URef<Cell>> {
        &mut refs.cells
    }
}

/// 演示网格
pub type DemoGrid = Grid<DemoUnits>;

/// 跨域共享的网格句柄
///
/// 读写锁保证父域写、子域读的互斥；相位同步协议保证二者在时间
/// 上错开，锁在无竞争路径上近乎免费。
pub type SharedGrid = Arc<RwLock<DemoGrid>>;

// ============================================================================
// 求解器
// ============================================================================

/// 演示求解器
pub struct DemoSolver {
    grid: SharedGrid,
    parent_grid: Option<SharedGrid>,
    patch: Option<PatchId>,
    compute: Option<Arc<rayon::ThreadPool>>,
    n_cells: usize,
}

impl DemoSolver {
    fn new(
        grid: SharedGrid,
        parent_grid: Option<SharedGrid>,
        compute: Option<Arc<rayon::ThreadPool>>,
        n_cells: usize,
    ) -> Self {
        Self {
            grid,
            parent_grid,
            patch: None,
            compute,
            n_cells,
        }
    }

    fn patch_id(&self) -> PatchId {
        self.patch
            .unwrap_or_else(|| panic!("DemoSolver: patch is not created yet"))
    }

    /// 补丁活跃单元上的一步松弛
    fn relax_active_cells(&mut self) {
        let pid = self.patch_id();
        let mut grid = self.grid.write();
        let refs: Vec<URef<Cell>> = grid.patch(pid).units::<Cell>().to_vec();

        let relaxed: Vec<f64> = {
            let grid_view = &*grid;
            let step = |r: &URef<Cell>| {
                let cell = grid_view
                    .unit(*r)
                    .unwrap_or_else(|e| panic!("DemoSolver: stale patch ref: {e}"));
                cell.depth + RELAXATION * (EQUILIBRIUM_DEPTH - cell.depth)
            };
            match &self.compute {
                Some(pool) => pool.install(|| refs.par_iter().map(step).collect()),
                None => refs.iter().map(step).collect(),
            }
        };

        for (r, depth) in refs.iter().zip(relaxed) {
            grid.unit_mut(*r)
                .unwrap_or_else(|e| panic!("DemoSolver: stale patch ref: {e}"))
                .depth = depth;
        }
    }

    /// 补丁活跃单元的平均水深
    fn mean_depth(&self) -> f64 {
        let pid = self.patch_id();
        let grid = self.grid.read();
        let refs = grid.patch(pid).units::<Cell>();
        if refs.is_empty() {
            return 0.0;
        }
        let total: f64 = refs
            .iter()
            .map(|&r| {
                grid.unit(r)
                    .unwrap_or_else(|e| panic!("DemoSolver: stale patch ref: {e}"))
                    .depth
            })
            .sum();
        total / refs.len() as f64
    }
}

impl Solver for DemoSolver {
    fn initialize(&mut self) -> EngineResult<()> {
        let mut grid = self.grid.write();
        let pid = grid.add_patch();
        self.patch = Some(pid);

        // 子网格：先从父网格拷贝边界单元并登记对应关系
        if let Some(parent) = &self.parent_grid {
            let parent = parent.read();
            let n = N_BOUNDARY_CELLS.min(parent.store::<Cell>().len());
            for i in 0..n {
                let pref = parent.store::<Cell>().ref_at(i as u32);
                grid.copy_from_parent(&parent, pref)?;
            }
        }

        // 本地单元
        let id_offset = if self.parent_grid.is_some() {
            LOCAL_ID_OFFSET
        } else {
            0
        };
        for i in 0..self.n_cells {
            let id = id_offset + i as i32;
            let cell = if i == 0 || i + 1 == self.n_cells {
                Cell::new_boundary(id, 0.0)
            } else {
                Cell::new(id, 0.0)
            };
            grid.insert_unit(cell);
        }

        // 全部纳入补丁（初始激活），随后补丁即可读取
        for pos in 0..grid.store::<Cell>().len() {
            let r = grid.store::<Cell>().ref_at(pos as u32);
            grid.include_unit(pid, r, 0)?;
        }
        grid.patch_mut(pid).validate();
        grid.patch_mut(pid).unlock();
        Ok(())
    }

    fn adjust_patches(&mut self, _ts: u32) {
        let pid = self.patch_id();
        let mut grid = self.grid.write();
        let patch = grid.patch_mut(pid);
        if !patch.is_up_to_date() {
            // 演示模型不在时间步进中改动存储；失效只可能来自
            // 初始化期间的插入，引用序列本身仍与存储一致
            patch.validate();
            patch.unlock();
        }
    }

    fn impose_patch_bcs(&mut self, _phase: u32) {
        let Some(parent) = &self.parent_grid else {
            return;
        };
        let parent = parent.read();
        let mut grid = self.grid.write();

        let linked: Vec<(URef<Cell>, URef<Cell>)> = grid
            .store::<Cell>()
            .iter()
            .filter_map(|(r, _)| grid.parent_of(r).map(|p| (r, p)))
            .collect();

        for (child_ref, parent_ref) in linked {
            let depth = parent
                .unit(parent_ref)
                .unwrap_or_else(|e| panic!("DemoSolver: stale parent link: {e}"))
                .depth;
            grid.unit_mut(child_ref)
                .unwrap_or_else(|e| panic!("DemoSolver: stale child link: {e}"))
                .depth = depth;
        }
    }
}

// ============================================================================
// 域模型
// ============================================================================

/// 演示域模型
pub struct DemoModel {
    id: String,
    output_dir: std::path::PathBuf,
    nts: u32,
    n_cells: usize,
    grid: SharedGrid,
    solver: Option<DemoSolver>,
}

impl DemoModel {
    /// 用宿主参数构造模型
    pub fn with_params(spec: &DomainSpec, nts: u32, n_cells: usize) -> Self {
        let role = if spec.parent_id.is_some() {
            GridRole::Nested
        } else {
            GridRole::Root
        };
        Self {
            id: spec.id.clone(),
            output_dir: spec.output_dir.clone(),
            nts,
            n_cells,
            grid: Arc::new(RwLock::new(Grid::new(role))),
            solver: None,
        }
    }

    /// 跨域共享的网格句柄（子域实例化时克隆）
    pub fn shared_grid(&self) -> SharedGrid {
        self.grid.clone()
    }
}

impl DomainModel for DemoModel {
    type Solver = DemoSolver;

    fn create(spec: &DomainSpec) -> EngineResult<Self> {
        Ok(Self::with_params(spec, 24, 64))
    }

    fn instantiate_members(
        &mut self,
        ctx: &DomainContext,
        parent: Option<&Self>,
    ) -> EngineResult<()> {
        let parent_grid = parent.map(DemoModel::shared_grid);
        self.solver = Some(DemoSolver::new(
            self.grid.clone(),
            parent_grid,
            ctx.compute.clone(),
            self.n_cells,
        ));
        tracing::debug!(
            domain = %self.id,
            n_proc_intra = ctx.n_proc_intra,
            "demo members instantiated"
        );
        Ok(())
    }

    fn read_inputs(&mut self) -> EngineResult<()> {
        // 演示模型没有域输入文件
        Ok(())
    }

    fn do_initialize(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn build_phases(&mut self) -> Vec<Box<dyn Phase<Self>>> {
        vec![
            FnPhase::new("exchange", |model: &mut DemoModel, ts| {
                let solver = model.solver_mut();
                solver.adjust_patches(ts);
                solver.impose_patch_bcs(0);
            }) as Box<dyn Phase<Self>>,
            FnPhase::new("update", |model: &mut DemoModel, _ts| {
                model.solver_mut().relax_active_cells();
            }) as Box<dyn Phase<Self>>,
        ]
    }

    fn post_process(&mut self) -> EngineResult<()> {
        let mean = self.solver().mean_depth();
        let summary = format!(
            "domain {}\nnts {}\ncells {}\nmean_depth {:.6}\n",
            self.id, self.nts, self.n_cells, mean
        );
        std::fs::write(self.output_dir.join("summary.txt"), summary)?;
        tracing::info!(domain = %self.id, mean_depth = mean, "post-processing complete");
        Ok(())
    }

    fn nts(&self) -> u32 {
        self.nts
    }

    fn solver(&self) -> &DemoSolver {
        self.solver
            .as_ref()
            .unwrap_or_else(|| panic!("Domain {}: solver is not instantiated yet", self.id))
    }

    fn solver_mut(&mut self) -> &mut DemoSolver {
        self.solver
            .as_mut()
            .unwrap_or_else(|| panic!("Domain {}: solver is not instantiated yet", self.id))
    }
}
