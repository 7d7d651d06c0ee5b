// crates/hdm_engine/src/solver.rs

//! 求解器接口
//!
//! 求解器是框架的协作者：持有一个或多个网格并实现模型相关的
//! 数值计算。框架只消费下面三个入口，数值内容完全由模型决定。

use crate::error::EngineResult;

/// 域求解器接口
///
/// 框架约定：
///
/// - [`Solver::initialize`] 在域初始化尾声由引擎调用一次；
/// - [`Solver::adjust_patches`] 在每个时间步开始时由相位体调用，
///   在网格变更后重新表达补丁内容；补丁重新表达完毕后求解器
///   必须调用 `Patch::validate`，否则补丁引用不可读取；
/// - [`Solver::impose_patch_bcs`] 由相位体调用，在父子网格之间
///   传递边界数据。
pub trait Solver: Send {
    /// 初始化求解器（网格构建、初值设定等）
    fn initialize(&mut self) -> EngineResult<()>;

    /// 时间步开始时重新表达补丁
    fn adjust_patches(&mut self, ts: u32);

    /// 在父子网格之间施加补丁边界条件
    fn impose_patch_bcs(&mut self, phase: u32);
}
