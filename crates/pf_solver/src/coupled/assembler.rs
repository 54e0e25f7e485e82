// crates/pf_solver/src/coupled/assembler.rs

//! 耦合预条件器装配器
//!
//! 把两个子块与状态层的导数场连成一个 2x2 耦合预条件器：
//!
//! 1. `new`: 校验配置、登记消费者令牌、推导非对角导数键；
//! 2. `update(h)`: 刷新子块的逆，经导数协议拉取
//!    `d<守恒量>_d<对方主变量>`，按 1/h 缩放后装入非对角块，
//!    消去计算 Schur 补；
//! 3. `apply`: Schur 回代，可选迭代精化。
//!
//! 装配相位单向推进（Assembled → Updated → Applied），
//! 在未更新时作用直接报错而不是默默用旧矩阵。

use pf_foundation::{derivative_key, Key, PfError, PfResult};
use pf_state::{ConsumerToken, State};

use crate::block::BlockVector;
use crate::coupled::config::CoupledConfig;
use crate::coupled::operator::{CoupledOperator, SubBlockHandle};

/// 装配相位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyPhase {
    /// 已装配（new 之后），尚无有效矩阵
    Assembled,
    /// 本时间步的矩阵已更新，可以作用
    Updated,
    /// 已作用过至少一次
    Applied,
}

/// 2x2 耦合预条件器
pub struct CoupledPreconditioner {
    config: CoupledConfig,
    /// `d<conserved_a>_d<primary_b>`
    deriv_a_key: Key,
    /// `d<conserved_b>_d<primary_a>`
    deriv_b_key: Key,
    token: ConsumerToken,
    block_a: SubBlockHandle,
    block_b: SubBlockHandle,
    operator: CoupledOperator,
    phase: AssemblyPhase,
}

impl CoupledPreconditioner {
    /// 校验配置并组合子块
    pub fn new(
        config: CoupledConfig,
        state: &State,
        block_a: SubBlockHandle,
        block_b: SubBlockHandle,
    ) -> PfResult<Self> {
        config.validate()?;
        if !config.decoupled {
            // 守恒量必须挂有评估器，否则导数协议无从谈起
            state.get_evaluator(&config.conserved_quantity_a)?;
            state.get_evaluator(&config.conserved_quantity_b)?;
        }

        let n_cells = block_a.borrow().n_cells();
        let deriv_a_key = derivative_key(&config.conserved_quantity_a, &config.primary_variable_b);
        let deriv_b_key = derivative_key(&config.conserved_quantity_b, &config.primary_variable_a);
        let token = state.register_consumer("coupled_preconditioner");
        let operator =
            CoupledOperator::new(block_a.clone(), block_b.clone(), config.decoupled)?;

        for &cell in &config.debug_cells {
            if cell >= n_cells {
                return Err(PfError::invalid_config(
                    "debug_cells",
                    cell.to_string(),
                    format!("超出单元范围 (共 {n_cells} 单元)"),
                ));
            }
        }

        log::debug!(
            "耦合预条件器: {} / {} (decoupled={})",
            deriv_a_key,
            deriv_b_key,
            config.decoupled
        );
        Ok(Self {
            config,
            deriv_a_key,
            deriv_b_key,
            token,
            block_a,
            block_b,
            operator,
            phase: AssemblyPhase::Assembled,
        })
    }

    /// 当前装配相位
    pub fn phase(&self) -> AssemblyPhase {
        self.phase
    }

    /// 内部算子（测试与诊断用）
    pub fn operator(&self) -> &CoupledOperator {
        &self.operator
    }

    /// 按时间步长 `h` 更新预条件器
    ///
    /// 子块的对角必须已由各自物理核写入。
    pub fn update(&mut self, state: &State, h: f64) -> PfResult<()> {
        if h <= 0.0 {
            return Err(PfError::invalid_config(
                "timestep",
                h.to_string(),
                "必须为正",
            ));
        }

        self.block_a.borrow_mut().update_inverse()?;
        self.block_b.borrow_mut().update_inverse()?;

        if !self.config.decoupled {
            // 经导数协议拉取非对角块，按 1/h 缩放
            state.has_field_derivative_changed(
                &self.config.conserved_quantity_a,
                self.token,
                &self.config.primary_variable_b,
            )?;
            state.has_field_derivative_changed(
                &self.config.conserved_quantity_b,
                self.token,
                &self.config.primary_variable_a,
            )?;

            let n = self.operator.n_cells();
            let da = state.get_data(&self.deriv_a_key)?;
            let da = da.borrow();
            let da_cells = da.component("cell")?;
            PfError::check_size("dA/dy2", n, da_cells.len())?;
            let db = state.get_data(&self.deriv_b_key)?;
            let db = db.borrow();
            let db_cells = db.component("cell")?;
            PfError::check_size("dB/dy1", n, db_cells.len())?;

            let mut ccc = vec![0.0; n];
            let mut dcc = vec![0.0; n];
            for i in 0..n {
                ccc[i] = da_cells[i] / h;
                dcc[i] = db_cells[i] / h;
            }
            for (slot, &cell) in self.config.debug_cells.iter().enumerate() {
                let rank = self.config.debug_ranks.get(slot).copied().unwrap_or(0);
                log::debug!(
                    "单元 {cell} (分区 {rank}): {}={}, {}={}",
                    self.deriv_a_key,
                    ccc[cell],
                    self.deriv_b_key,
                    dcc[cell]
                );
            }
            self.operator.set_off_diagonals(&ccc, &dcc)?;
        }

        self.operator
            .compute_schur_complement(self.config.dump_schur)?;
        self.phase = AssemblyPhase::Updated;
        Ok(())
    }

    /// 作用预条件器: `x = M⁻¹ · r`
    pub fn apply(
        &mut self,
        r_a: &BlockVector,
        r_b: &BlockVector,
        x_a: &mut BlockVector,
        x_b: &mut BlockVector,
    ) -> PfResult<()> {
        if self.phase == AssemblyPhase::Assembled {
            return Err(PfError::config("预条件器尚未更新，先调用 update"));
        }
        self.operator.apply_inverse(r_a, r_b, x_a, x_b)?;

        // 可选迭代精化: x += M⁻¹·(r − M·x)
        for sweep in 0..self.config.refinement_sweeps {
            let mut y_a = BlockVector::zeros_like(r_a);
            let mut y_b = BlockVector::zeros_like(r_b);
            self.operator.apply(x_a, x_b, &mut y_a, &mut y_b)?;

            let mut res_a = r_a.clone();
            let mut res_b = r_b.clone();
            res_a.axpy(-1.0, &y_a)?;
            res_b.axpy(-1.0, &y_b)?;

            let mut dx_a = BlockVector::zeros_like(r_a);
            let mut dx_b = BlockVector::zeros_like(r_b);
            self.operator
                .apply_inverse(&res_a, &res_b, &mut dx_a, &mut dx_b)?;
            x_a.axpy(1.0, &dx_a)?;
            x_b.axpy(1.0, &dx_b)?;
            log::trace!("迭代精化第 {} 遍完成", sweep + 1);
        }

        self.phase = AssemblyPhase::Applied;
        Ok(())
    }
}

// ============================================================
// 单元测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{DiagonalBlockPreconditioner, SubBlockPreconditioner};
    use pf_state::FieldShape;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn decoupled_config() -> CoupledConfig {
        serde_json::from_str(
            r#"{
                "conserved_quantity_a": "water_content",
                "conserved_quantity_b": "energy",
                "primary_variable_a": "pressure",
                "primary_variable_b": "temperature",
                "decoupled": true
            }"#,
        )
        .unwrap()
    }

    fn blocks(n: usize) -> (SubBlockHandle, SubBlockHandle) {
        let mut a = DiagonalBlockPreconditioner::new("flow", n, 0);
        a.set_cell_diagonal(&vec![2.0; n]).unwrap();
        let mut b = DiagonalBlockPreconditioner::new("energy", n, 0);
        b.set_cell_diagonal(&vec![4.0; n]).unwrap();
        (
            Rc::new(RefCell::new(a)) as SubBlockHandle,
            Rc::new(RefCell::new(b)) as SubBlockHandle,
        )
    }

    #[test]
    fn test_phase_progression() {
        let state = State::new();
        let (a, b) = blocks(2);
        let mut pc = CoupledPreconditioner::new(decoupled_config(), &state, a, b).unwrap();
        assert_eq!(pc.phase(), AssemblyPhase::Assembled);

        // 未更新即作用：拒绝
        let r = BlockVector::zeros(2, 0);
        let mut x_a = BlockVector::zeros(2, 0);
        let mut x_b = BlockVector::zeros(2, 0);
        assert!(pc.apply(&r, &r, &mut x_a, &mut x_b).is_err());

        pc.update(&state, 1.0).unwrap();
        assert_eq!(pc.phase(), AssemblyPhase::Updated);
        pc.apply(&r, &r, &mut x_a, &mut x_b).unwrap();
        assert_eq!(pc.phase(), AssemblyPhase::Applied);
    }

    #[test]
    fn test_nonpositive_timestep_rejected() {
        let state = State::new();
        let (a, b) = blocks(2);
        let mut pc = CoupledPreconditioner::new(decoupled_config(), &state, a, b).unwrap();
        assert!(pc.update(&state, 0.0).is_err());
        assert!(pc.update(&state, -1.0).is_err());
    }

    #[test]
    fn test_debug_cell_out_of_range_rejected() {
        let state = State::new();
        let (a, b) = blocks(2);
        let mut config = decoupled_config();
        config.debug_cells = vec![5];
        assert!(CoupledPreconditioner::new(config, &state, a, b).is_err());
    }

    #[test]
    fn test_coupled_requires_evaluators() {
        // 非退化模式下守恒量必须挂有评估器
        let mut state = State::new();
        state
            .register_primary("pressure", FieldShape::cell(2))
            .unwrap();
        let (a, b) = blocks(2);
        let mut config = decoupled_config();
        config.decoupled = false;
        assert!(CoupledPreconditioner::new(config, &state, a, b).is_err());
    }
}
