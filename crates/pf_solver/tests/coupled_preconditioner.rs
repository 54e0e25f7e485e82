// crates/pf_solver/tests/coupled_preconditioner.rs

//! 耦合预条件器端到端测试
//!
//! 用线性组合评估器搭建最小的双核耦合图：
//! `water_content = pressure + 0.1·temperature`，
//! `energy = temperature + 0.2·pressure`，
//! 验证导数经状态层流入非对角块、1/h 缩放律与耦合效果。

use std::cell::RefCell;
use std::rc::Rc;

use pf_foundation::{Key, PfResult};
use pf_solver::coupled::SubBlockHandle;
use pf_solver::{
    BlockVector, CoupledConfig, CoupledPreconditioner, DiagonalBlockPreconditioner,
    SubBlockPreconditioner,
};
use pf_state::{Field, FieldEvaluator, FieldShape, State};

// ============================================================
// 线性组合评估器
// ============================================================

/// `out = main + factor·other`，带常数偏导
struct LinearCombo {
    key: Key,
    deps: Vec<Key>,
    factor: f64,
}

impl LinearCombo {
    fn boxed(key: &str, main: &str, other: &str, factor: f64) -> Box<Self> {
        Box::new(Self {
            key: key.to_string(),
            deps: vec![main.to_string(), other.to_string()],
            factor,
        })
    }
}

impl FieldEvaluator for LinearCombo {
    fn key(&self) -> &Key {
        &self.key
    }
    fn dependencies(&self) -> &[Key] {
        &self.deps
    }
    fn derivative_dependencies(&self) -> &[Key] {
        &self.deps
    }
    fn evaluate(&self, state: &State, output: &mut Field) -> PfResult<()> {
        let main = state.get_data(&self.deps[0])?;
        let main = main.borrow();
        let other = state.get_data(&self.deps[1])?;
        let other = other.borrow();
        let lhs = main.component("cell")?.to_vec();
        let rhs = other.component("cell")?.to_vec();
        let dst = output.component_mut("cell")?;
        for i in 0..lhs.len() {
            dst[i] = lhs[i] + self.factor * rhs[i];
        }
        Ok(())
    }
    fn evaluate_derivative(&self, _state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        let value = if wrt == self.deps[0] {
            1.0
        } else {
            self.factor
        };
        output.component_mut("cell")?.fill(value);
        Ok(())
    }
}

// ============================================================
// 搭建
// ============================================================

const N_CELLS: usize = 3;

fn coupled_state() -> State {
    let mut state = State::new();
    state
        .register_primary("pressure", FieldShape::cell(N_CELLS))
        .unwrap();
    state
        .register_primary("temperature", FieldShape::cell(N_CELLS))
        .unwrap();
    state
        .register_evaluator(LinearCombo::boxed(
            "water_content",
            "pressure",
            "temperature",
            0.1,
        ))
        .unwrap();
    state
        .register_evaluator(LinearCombo::boxed("energy", "temperature", "pressure", 0.2))
        .unwrap();
    state
        .require_field("water_content", "test", &FieldShape::cell(N_CELLS))
        .unwrap();
    state
        .require_field("energy", "test", &FieldShape::cell(N_CELLS))
        .unwrap();
    state.ensure_compatibility("water_content").unwrap();
    state.ensure_compatibility("energy").unwrap();

    state
        .set_primary("pressure", "cell", &[1.0e5; N_CELLS])
        .unwrap();
    state
        .set_primary("temperature", "cell", &[280.0; N_CELLS])
        .unwrap();
    state
}

fn blocks() -> (SubBlockHandle, SubBlockHandle) {
    let mut a = DiagonalBlockPreconditioner::new("flow", N_CELLS, 0);
    a.set_cell_diagonal(&[1.0; N_CELLS]).unwrap();
    let mut b = DiagonalBlockPreconditioner::new("energy", N_CELLS, 0);
    b.set_cell_diagonal(&[1.0; N_CELLS]).unwrap();
    (
        Rc::new(RefCell::new(a)) as SubBlockHandle,
        Rc::new(RefCell::new(b)) as SubBlockHandle,
    )
}

fn config(decoupled: bool) -> CoupledConfig {
    serde_json::from_str(&format!(
        r#"{{
            "conserved_quantity_a": "water_content",
            "conserved_quantity_b": "energy",
            "primary_variable_a": "pressure",
            "primary_variable_b": "temperature",
            "decoupled": {decoupled}
        }}"#
    ))
    .unwrap()
}

// ============================================================
// 测试
// ============================================================

#[test]
fn test_derivatives_flow_into_off_diagonals_with_timestep_scaling() {
    let state = coupled_state();
    let (a, b) = blocks();
    let mut pc = CoupledPreconditioner::new(config(false), &state, a, b).unwrap();

    // h = 10: dA/dy2 = 0.1 → 0.01, dB/dy1 = 0.2 → 0.02
    pc.update(&state, 10.0).unwrap();
    let (ccc, dcc) = pc.operator().off_diagonals();
    for i in 0..N_CELLS {
        assert!((ccc[i] - 0.01).abs() < 1.0e-15);
        assert!((dcc[i] - 0.02).abs() < 1.0e-15);
    }

    // h = 1: 缩放律
    pc.update(&state, 1.0).unwrap();
    let (ccc, dcc) = pc.operator().off_diagonals();
    for i in 0..N_CELLS {
        assert!((ccc[i] - 0.1).abs() < 1.0e-15);
        assert!((dcc[i] - 0.2).abs() < 1.0e-15);
    }
}

#[test]
fn test_coupling_changes_the_correction() {
    let state = coupled_state();

    let (a, b) = blocks();
    let mut coupled = CoupledPreconditioner::new(config(false), &state, a, b).unwrap();
    coupled.update(&state, 1.0).unwrap();

    let (a, b) = blocks();
    let mut decoupled = CoupledPreconditioner::new(config(true), &state, a, b).unwrap();
    decoupled.update(&state, 1.0).unwrap();

    let r_a = BlockVector {
        cell: vec![1.0, 0.0, 0.0],
        face: vec![],
    };
    let r_b = BlockVector {
        cell: vec![1.0, 0.0, 0.0],
        face: vec![],
    };

    let mut xc_a = BlockVector::zeros(N_CELLS, 0);
    let mut xc_b = BlockVector::zeros(N_CELLS, 0);
    coupled.apply(&r_a, &r_b, &mut xc_a, &mut xc_b).unwrap();

    let mut xd_a = BlockVector::zeros(N_CELLS, 0);
    let mut xd_b = BlockVector::zeros(N_CELLS, 0);
    decoupled.apply(&r_a, &r_b, &mut xd_a, &mut xd_b).unwrap();

    // 受扰单元上耦合路径与退化路径必须不同
    assert!((xc_a.cell[0] - xd_a.cell[0]).abs() > 1.0e-12);
    assert!((xc_b.cell[0] - xd_b.cell[0]).abs() > 1.0e-12);
    // 未受扰单元两边都为零
    assert_eq!(xc_a.cell[1], 0.0);
    assert_eq!(xd_a.cell[1], 0.0);

    // 耦合解满足 2x2 方程: [1 0.1; 0.2 1]·x = (1, 1)
    let det: f64 = 1.0 - 0.1 * 0.2;
    assert!((xc_a.cell[0] - (1.0 - 0.1) / det).abs() < 1.0e-14);
    assert!((xc_b.cell[0] - (1.0 - 0.2) / det).abs() < 1.0e-14);
}

#[test]
fn test_refinement_sweeps_preserve_exact_solution() {
    // 逐单元对角块上 M⁻¹ 精确，精化不应破坏解
    let state = coupled_state();
    let (a, b) = blocks();
    let mut config = config(false);
    config.refinement_sweeps = 2;
    let mut pc = CoupledPreconditioner::new(config, &state, a, b).unwrap();
    pc.update(&state, 1.0).unwrap();

    let r_a = BlockVector {
        cell: vec![3.0, -1.0, 0.5],
        face: vec![],
    };
    let r_b = BlockVector {
        cell: vec![2.0, 4.0, -0.5],
        face: vec![],
    };
    let mut x_a = BlockVector::zeros(N_CELLS, 0);
    let mut x_b = BlockVector::zeros(N_CELLS, 0);
    pc.apply(&r_a, &r_b, &mut x_a, &mut x_b).unwrap();

    // 前向乘还原右端
    let mut y_a = BlockVector::zeros(N_CELLS, 0);
    let mut y_b = BlockVector::zeros(N_CELLS, 0);
    pc.operator().apply(&x_a, &x_b, &mut y_a, &mut y_b).unwrap();
    for i in 0..N_CELLS {
        assert!((y_a.cell[i] - r_a.cell[i]).abs() < 1.0e-12);
        assert!((y_b.cell[i] - r_b.cell[i]).abs() < 1.0e-12);
    }
}

#[test]
fn test_update_memoizes_derivative_requests() {
    // 连续两次 update 之间主变量未变：导数协议不报变化，
    // 但装入的非对角块仍按新的 h 重新缩放
    let state = coupled_state();
    let (a, b) = blocks();
    let mut pc = CoupledPreconditioner::new(config(false), &state, a, b).unwrap();

    pc.update(&state, 2.0).unwrap();
    let (ccc, _) = pc.operator().off_diagonals();
    assert!((ccc[0] - 0.05).abs() < 1.0e-15);

    pc.update(&state, 4.0).unwrap();
    let (ccc, _) = pc.operator().off_diagonals();
    assert!((ccc[0] - 0.025).abs() < 1.0e-15);
}
