// crates/hdm_engine/src/phase.rs

//! 相位对象
//!
//! 相位是时间步内的一个命名计算步骤。域按插入顺序在每个时间步
//! 执行全部相位；并发模式下每次执行前后由相位同步协议把关。
//!
//! 相位以对象而非裸闭包的形式注册，使相位序列可以列名诊断。

/// 时间步内的命名计算步骤
///
/// `M` 是域模型类型：相位体通过它访问求解器、网格与补丁。
/// 相位体内的致命错误直接 panic，进而终止整个进程——框架不提供
/// 相位级的取消或恢复。
pub trait Phase<M>: Send {
    /// 相位名称（诊断用）
    fn name(&self) -> &str;

    /// 执行时间步 `ts` 的本相位
    fn run(&mut self, model: &mut M, ts: u32);
}

/// 由闭包构造的相位
///
/// 便捷包装：为闭包附加名称后即可注册为相位。
pub struct FnPhase<M> {
    name: String,
    body: Box<dyn FnMut(&mut M, u32) + Send>,
}

impl<M> FnPhase<M> {
    /// 创建命名闭包相位
    pub fn new(name: impl Into<String>, body: impl FnMut(&mut M, u32) + Send + 'static) -> Box<Self> {
        Box::new(Self {
            name: name.into(),
            body: Box::new(body),
        })
    }
}

impl<M> Phase<M> for FnPhase<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, model: &mut M, ts: u32) {
        (self.body)(model, ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_phase_runs_body() {
        let mut counter = 0u32;
        let mut phase = FnPhase::new("momentum", |count: &mut u32, ts| {
            *count += ts;
        });
        assert_eq!(phase.name(), "momentum");

        phase.run(&mut counter, 3);
        phase.run(&mut counter, 4);
        assert_eq!(counter, 7);
    }
}
