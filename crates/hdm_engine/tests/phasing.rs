// crates/hdm_engine/tests/phasing.rs

//! 并发时间步进的端到端测试
//!
//! 用一个只记录执行轨迹的测试模型驱动完整的项目生命周期，
//! 检查进度窗口协议的可观察保证与项目级不变量。

use hdm_engine::{
    Domain, DomainModel, DomainSpec, EngineResult, FnPhase, Phase, Project, ProjectInput, Solver,
};
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventKind {
    Start,
    End,
}

#[derive(Clone, Debug)]
struct Event {
    domain: String,
    ts: u32,
    phase: usize,
    kind: EventKind,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

struct NullSolver;

impl Solver for NullSolver {
    fn initialize(&mut self) -> EngineResult<()> {
        Ok(())
    }
    fn adjust_patches(&mut self, _ts: u32) {}
    fn impose_patch_bcs(&mut self, _phase: u32) {}
}

struct TraceModel {
    id: String,
    nts: u32,
    n_phases: usize,
    log: EventLog,
    solver: NullSolver,
}

impl TraceModel {
    fn with_log(spec: &DomainSpec, nts: u32, n_phases: usize, log: EventLog) -> Self {
        Self {
            id: spec.id.clone(),
            nts,
            n_phases,
            log,
            solver: NullSolver,
        }
    }
}

impl DomainModel for TraceModel {
    type Solver = NullSolver;

    fn create(spec: &DomainSpec) -> EngineResult<Self> {
        Ok(Self::with_log(spec, 3, 2, EventLog::default()))
    }

    fn instantiate_members(
        &mut self,
        _ctx: &hdm_engine::DomainContext,
        _parent: Option<&Self>,
    ) -> EngineResult<()> {
        Ok(())
    }

    fn read_inputs(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn do_initialize(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn build_phases(&mut self) -> Vec<Box<dyn Phase<Self>>> {
        (0..self.n_phases)
            .map(|p| {
                FnPhase::new(format!("trace-{p}"), move |model: &mut TraceModel, ts| {
                    model.log.lock().unwrap().push(Event {
                        domain: model.id.clone(),
                        ts,
                        phase: p,
                        kind: EventKind::Start,
                    });
                    std::thread::sleep(Duration::from_micros(200));
                    model.log.lock().unwrap().push(Event {
                        domain: model.id.clone(),
                        ts,
                        phase: p,
                        kind: EventKind::End,
                    });
                }) as Box<dyn Phase<Self>>
            })
            .collect()
    }

    fn post_process(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn nts(&self) -> u32 {
        self.nts
    }

    fn solver(&self) -> &NullSolver {
        &self.solver
    }

    fn solver_mut(&mut self) -> &mut NullSolver {
        &mut self.solver
    }
}

fn trace_domain(
    dir: &Path,
    id: &str,
    parent: Option<&str>,
    nts: u32,
    n_phases: usize,
    log: &EventLog,
) -> Domain<TraceModel> {
    let spec = match parent {
        None => DomainSpec::root(id, dir.join(id), dir.join(format!("out_{id}"))),
        Some(p) => DomainSpec::child(id, dir.join(id), dir.join(format!("out_{id}")), p),
    };
    let model = TraceModel::with_log(&spec, nts, n_phases, log.clone());
    Domain::new(spec, model)
}

/// 域的事件轨迹按 (ts, phase) 严格递增
fn assert_strictly_ascending(events: &[Event]) {
    let mut last: Option<(u32, usize)> = None;
    for ev in events.iter().filter(|e| e.kind == EventKind::Start) {
        let key = (ev.ts, ev.phase);
        if let Some(prev) = last {
            assert!(key > prev, "phase order regressed: {:?} after {:?}", key, prev);
        }
        last = Some(key);
    }
}

#[test]
fn test_parent_child_progress_window() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let mut project = Project::new("window");
    project.add_domain(trace_domain(dir.path(), "A", None, 3, 2, &log));
    project.add_domain(trace_domain(dir.path(), "B", Some("A"), 3, 2, &log));

    project.run(2, 0).unwrap();

    let events = log.lock().unwrap().clone();

    // 每个域 3 个时间步 × 2 个相位
    let parent_starts = events
        .iter()
        .filter(|e| e.domain == "A" && e.kind == EventKind::Start)
        .count();
    let child_starts = events
        .iter()
        .filter(|e| e.domain == "B" && e.kind == EventKind::Start)
        .count();
    assert_eq!(parent_starts, 6);
    assert_eq!(child_starts, 6);

    // 各域内部轨迹严格递增
    let parent_events: Vec<Event> = events.iter().filter(|e| e.domain == "A").cloned().collect();
    let child_events: Vec<Event> = events.iter().filter(|e| e.domain == "B").cloned().collect();
    assert_strictly_ascending(&parent_events);
    assert_strictly_ascending(&child_events);

    // 子域对 (ts, p) 的执行只能在父域完成同一 (ts, p) 之后开始：
    // 进度窗口规则保证子域读取的父域边界数据不陈旧
    for ev in events.iter().enumerate() {
        let (idx, ev) = ev;
        if ev.domain == "B" && ev.kind == EventKind::Start {
            let parent_end = events[..idx].iter().any(|e| {
                e.domain == "A" && e.kind == EventKind::End && e.ts == ev.ts && e.phase == ev.phase
            });
            assert!(
                parent_end,
                "child started ({}, {}) before the parent finished it",
                ev.ts, ev.phase
            );
        }
    }
}

#[test]
fn test_single_permit_pool_still_progresses() {
    // 跨域许可池只有一个许可时协议退化为单线程推进，但可观察
    // 输出不变
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let mut project = Project::new("single-permit");
    project.add_domain(trace_domain(dir.path(), "A", None, 2, 2, &log));
    project.add_domain(trace_domain(dir.path(), "B", Some("A"), 2, 2, &log));

    project.run(1, 0).unwrap();

    let events = log.lock().unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.kind == EventKind::Start)
            .count(),
        8
    );
}

#[test]
fn test_sequential_root_without_children() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let mut project = Project::new("solo");
    project.add_domain(trace_domain(dir.path(), "A", None, 3, 2, &log));

    project.run(1, 0).unwrap();

    let events = log.lock().unwrap();
    let starts: Vec<(u32, usize)> = events
        .iter()
        .filter(|e| e.kind == EventKind::Start)
        .map(|e| (e.ts, e.phase))
        .collect();
    assert_eq!(
        starts,
        vec![(1, 0), (1, 1), (2, 0), (2, 1), (3, 0), (3, 1)]
    );

    // 输出目录按需创建
    assert!(dir.path().join("out_A").is_dir());
}

#[test]
#[should_panic(expected = "not the same as the previous domain")]
fn test_nts_mismatch_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let mut project = Project::new("mismatch");
    project.add_domain(trace_domain(dir.path(), "A", None, 10, 2, &log));
    project.add_domain(trace_domain(dir.path(), "B", Some("A"), 11, 2, &log));

    let _ = project.run(2, 0);
}

#[test]
#[should_panic(expected = "used multiple times")]
fn test_duplicate_output_dir_aborts() {
    let log = EventLog::default();
    let mut project = Project::new("dup-out");

    let spec_a = DomainSpec::root("A", "/a", "/same_out");
    let model_a = TraceModel::with_log(&spec_a, 1, 1, log.clone());
    project.add_domain(Domain::new(spec_a, model_a));

    let spec_b = DomainSpec::root("B", "/b", "/same_out");
    let model_b = TraceModel::with_log(&spec_b, 1, 1, log);
    project.add_domain(Domain::new(spec_b, model_b));
}

#[test]
#[should_panic(expected = "domain id A is used multiple times")]
fn test_duplicate_domain_id_aborts() {
    let log = EventLog::default();
    let mut project = Project::new("dup-id");

    let spec_a = DomainSpec::root("A", "/a", "/out_a");
    let model_a = TraceModel::with_log(&spec_a, 1, 1, log.clone());
    project.add_domain(Domain::new(spec_a, model_a));

    let spec_b = DomainSpec::root("A", "/b", "/out_b");
    let model_b = TraceModel::with_log(&spec_b, 1, 1, log);
    project.add_domain(Domain::new(spec_b, model_b));
}

#[test]
#[should_panic(expected = "declared before")]
fn test_child_declared_before_parent_aborts() {
    let log = EventLog::default();
    let mut project = Project::new("orphan");

    let spec = DomainSpec::child("B", "/b", "/out_b", "A");
    let model = TraceModel::with_log(&spec, 1, 1, log);
    project.add_domain(Domain::new(spec, model));
}

#[test]
#[should_panic(expected = "only one parent domain")]
fn test_multiple_roots_abort_in_concurrent_config() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let mut project = Project::new("two-roots");
    project.add_domain(trace_domain(dir.path(), "A", None, 1, 1, &log));
    project.add_domain(trace_domain(dir.path(), "B", None, 1, 1, &log));

    let _ = project.run(2, 0);
}

#[test]
fn test_hierarchy_navigation() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let a = Arc::new(parking_lot_mutex(trace_domain(dir.path(), "A", None, 1, 1, &log)));
    let b = Arc::new(parking_lot_mutex(trace_domain(
        dir.path(),
        "B",
        Some("A"),
        1,
        1,
        &log,
    )));

    Domain::set_hierarchy(&a, None);
    Domain::set_hierarchy(&b, Some(&a));

    assert!(a.lock().is_parent());
    assert!(b.lock().is_child());
    assert_eq!(a.lock().n_children(), 1);

    // 父→子为弱引用，可升级回 B
    let child = a.lock().child(0);
    assert_eq!(child.lock().id(), "B");

    // 子→父为强引用
    let parent = b.lock().parent().unwrap();
    assert_eq!(parent.lock().id(), "A");
}

#[test]
#[should_panic(expected = "already set")]
fn test_reassigning_parent_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();

    let a = Arc::new(parking_lot_mutex(trace_domain(dir.path(), "A", None, 1, 1, &log)));
    let c = Arc::new(parking_lot_mutex(trace_domain(dir.path(), "C", None, 1, 1, &log)));
    let b = Arc::new(parking_lot_mutex(trace_domain(
        dir.path(),
        "B",
        Some("A"),
        1,
        1,
        &log,
    )));

    Domain::set_hierarchy(&b, Some(&a));
    Domain::set_hierarchy(&b, Some(&c));
}

#[test]
#[should_panic(expected = "hierarchy is not set yet")]
fn test_hierarchy_query_before_wiring_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let log = EventLog::default();
    let domain = trace_domain(dir.path(), "A", None, 1, 1, &log);
    let _ = domain.is_parent();
}

#[test]
fn test_project_from_input_file() {
    // 输入文件解析 → 项目构造 → 层级接线的端到端路径
    let dir = tempfile::tempdir().unwrap();
    let out_a = dir.path().join("outA");
    let out_b = dir.path().join("outB");
    let text = format!(
        "demo\nP\n2\nA {} {}\nB {} {} A\n",
        dir.path().join("a").display(),
        out_a.display(),
        dir.path().join("b").display(),
        out_b.display(),
    );

    let input = ProjectInput::parse(Cursor::new(text), Path::new("demo.prj")).unwrap();
    assert_eq!(input.nd, 2);

    let mut project: Project<TraceModel> = Project::from_input(&input).unwrap();
    assert_eq!(project.nd(), 2);
    assert_eq!(project.project_id(), "P");

    project.run(2, 1).unwrap();

    // B 的父域是 A；A 的子域弱引用可升级回 B
    let a = project.domain("A").unwrap();
    let b = project.domain("B").unwrap();
    assert_eq!(b.lock().parent().unwrap().lock().id(), "A");
    assert_eq!(a.lock().child(0).lock().id(), "B");
    assert!(out_a.is_dir());
    assert!(out_b.is_dir());
}

fn parking_lot_mutex<T>(value: T) -> parking_lot::Mutex<T> {
    parking_lot::Mutex::new(value)
}
