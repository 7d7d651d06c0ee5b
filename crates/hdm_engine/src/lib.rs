// crates/hdm_engine/src/lib.rs

//! OpenHDM Engine Layer (Layer 3)
//!
//! 并发时间步进引擎。一个项目（[`Project`]）拥有若干模拟域
//! （[`Domain`]），父域与嵌套子域在进度窗口规则的约束下并发推进：
//! 子域最多落后父域一个相位，且只在父域发布了当前相位的输出后
//! 才读取边界数据。
//!
//! # 模块概览
//!
//! - [`threading`]: 控制点 [`ControlPoint`] 与有界许可池 [`Pool`]
//! - [`phase`]: 相位对象 [`Phase`]，时间步内的命名计算步骤
//! - [`solver`]: 求解器接口 [`Solver`]（数值内容由模型提供）
//! - [`domain`]: 模拟域 [`Domain`] 与模型接口 [`DomainModel`]
//! - [`input`]: 项目输入文件解析 [`ProjectInput`]
//! - [`project`]: 顶层驱动 [`Project`]
//! - [`error`]: 引擎层错误类型
//!
//! # 错误分级
//!
//! 不变量被破坏（域标识符重复、输出目录重复、父域重复指定、
//! `nts`/相位数跨域不一致等）是致命错误，直接 panic；输入文件
//! 格式错误与 IO 失败以 [`EngineError`] 返回。相位体内的致命
//! 错误会终止整个进程（时间步进线程的 panic 在汇合时传播）。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod domain;
pub mod error;
pub mod input;
pub mod phase;
pub mod project;
pub mod solver;
pub mod threading;

pub use domain::{Domain, DomainCell, DomainContext, DomainModel, DomainSpec};
pub use error::{EngineError, EngineResult};
pub use input::ProjectInput;
pub use phase::{FnPhase, Phase};
pub use project::Project;
pub use solver::Solver;
pub use threading::{ControlPoint, Pool};
