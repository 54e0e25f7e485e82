// crates/pf_solver/src/coupled/operator.rs

//! 2x2 块耦合算子
//!
//! 单元自由度上的块结构（面自由度完全委托子块）：
//!
//! ```text
//! | A_cc  C_cc | |x1|   |r1|
//! | D_cc  B_cc | |x2| = |r2|
//! ```
//!
//! 非对角块 C、D 为逐单元对角（守恒量对另一核主变量的导数，
//! 已按 1/h 缩放）。消去得逐单元 Schur 补
//! `S_i = B_i − D_i·A_i⁻¹·C_i`，回代：
//!
//! ```text
//! x2 = S⁻¹·(r2 − D·A⁻¹·r1)
//! x1 = A⁻¹·(r1 − C·x2)
//! ```
//!
//! 非对角块为零时该回代与块对角路径逐位一致：减去的修正项
//! 是精确的 0.0，S_i 退化为 B_i 本身。

use std::cell::RefCell;
use std::rc::Rc;

use pf_foundation::{PfError, PfResult};

use crate::block::{BlockVector, SubBlockPreconditioner};

/// 共享的子块句柄
pub type SubBlockHandle = Rc<RefCell<dyn SubBlockPreconditioner>>;

/// 2x2 块耦合算子
pub struct CoupledOperator {
    block_a: SubBlockHandle,
    block_b: SubBlockHandle,
    /// 右上非对角 C_cc（逐单元对角）
    ccc: Vec<f64>,
    /// 左下非对角 D_cc（逐单元对角）
    dcc: Vec<f64>,
    /// Schur 补对角的逆
    inv_schur: Vec<f64>,
    decoupled: bool,
    schur_fresh: bool,
}

impl CoupledOperator {
    /// 组合两个子块为耦合算子
    ///
    /// 两个子块的单元自由度数必须一致。
    pub fn new(block_a: SubBlockHandle, block_b: SubBlockHandle, decoupled: bool) -> PfResult<Self> {
        let n = block_a.borrow().n_cells();
        PfError::check_size("coupled cells", n, block_b.borrow().n_cells())?;
        Ok(Self {
            block_a,
            block_b,
            ccc: vec![0.0; n],
            dcc: vec![0.0; n],
            inv_schur: vec![0.0; n],
            decoupled,
            schur_fresh: false,
        })
    }

    /// 单元自由度数
    pub fn n_cells(&self) -> usize {
        self.ccc.len()
    }

    /// 是否处于块对角退化模式
    pub fn is_decoupled(&self) -> bool {
        self.decoupled
    }

    /// 当前非对角块 `(C_cc, D_cc)`（诊断用）
    pub fn off_diagonals(&self) -> (&[f64], &[f64]) {
        (&self.ccc, &self.dcc)
    }

    /// 写入两个非对角块（已按 1/h 缩放的导数值）
    pub fn set_off_diagonals(&mut self, ccc: &[f64], dcc: &[f64]) -> PfResult<()> {
        PfError::check_size("C_cc", self.ccc.len(), ccc.len())?;
        PfError::check_size("D_cc", self.dcc.len(), dcc.len())?;
        self.ccc.copy_from_slice(ccc);
        self.dcc.copy_from_slice(dcc);
        self.schur_fresh = false;
        Ok(())
    }

    /// 消去计算逐单元 Schur 补并求逆
    ///
    /// 要求两个子块的逆已由 [`SubBlockPreconditioner::update_inverse`]
    /// 预计算。近零 Schur 主元报 [`PfError::PreconditionerAssembly`]。
    pub fn compute_schur_complement(&mut self, dump: bool) -> PfResult<()> {
        let block_a = self.block_a.borrow();
        let block_b = self.block_b.borrow();
        let inv_a = block_a.inv_cell_diagonal();
        let b_diag = block_b.cell_diagonal();
        PfError::check_size("Schur", self.ccc.len(), inv_a.len())?;
        PfError::check_size("Schur", self.ccc.len(), b_diag.len())?;

        for i in 0..self.ccc.len() {
            let s = b_diag[i] - self.dcc[i] * inv_a[i] * self.ccc[i];
            if s.abs() < f64::EPSILON {
                return Err(PfError::precon_assembly("Schur 补主元近零", i));
            }
            self.inv_schur[i] = 1.0 / s;
        }
        self.schur_fresh = true;

        if dump {
            let schur: Vec<f64> = self.inv_schur.iter().map(|&v| 1.0 / v).collect();
            log::info!("Schur 补对角 ({} 单元): {:?}", schur.len(), schur);
        }
        Ok(())
    }

    /// 前向乘: `y = M · x`（迭代精化的残差计算用）
    pub fn apply(
        &self,
        x_a: &BlockVector,
        x_b: &BlockVector,
        y_a: &mut BlockVector,
        y_b: &mut BlockVector,
    ) -> PfResult<()> {
        let block_a = self.block_a.borrow();
        let block_b = self.block_b.borrow();
        block_a.apply_cell(&x_a.cell, &mut y_a.cell)?;
        block_b.apply_cell(&x_b.cell, &mut y_b.cell)?;
        if !self.decoupled {
            for i in 0..self.ccc.len() {
                y_a.cell[i] += self.ccc[i] * x_b.cell[i];
                y_b.cell[i] += self.dcc[i] * x_a.cell[i];
            }
        }
        block_a.apply_face(&x_a.face, &mut y_a.face)?;
        block_b.apply_face(&x_b.face, &mut y_b.face)?;
        Ok(())
    }

    /// 逆作用: `x = M⁻¹ · r`（Schur 消去回代）
    pub fn apply_inverse(
        &self,
        r_a: &BlockVector,
        r_b: &BlockVector,
        x_a: &mut BlockVector,
        x_b: &mut BlockVector,
    ) -> PfResult<()> {
        let block_a = self.block_a.borrow();
        let block_b = self.block_b.borrow();

        if self.decoupled {
            block_a.apply_cell_inverse(&r_a.cell, &mut x_a.cell)?;
            block_b.apply_cell_inverse(&r_b.cell, &mut x_b.cell)?;
        } else {
            if !self.schur_fresh {
                return Err(PfError::config(
                    "Schur 补尚未计算，先调用 compute_schur_complement",
                ));
            }
            let inv_a = block_a.inv_cell_diagonal();
            PfError::check_size("apply_inverse cells", self.ccc.len(), r_a.cell.len())?;
            PfError::check_size("apply_inverse cells", self.ccc.len(), r_b.cell.len())?;
            for i in 0..self.ccc.len() {
                let t = inv_a[i] * r_a.cell[i];
                x_b.cell[i] = self.inv_schur[i] * (r_b.cell[i] - self.dcc[i] * t);
                x_a.cell[i] = inv_a[i] * (r_a.cell[i] - self.ccc[i] * x_b.cell[i]);
            }
        }

        // 面自由度委托子块
        block_a.apply_face_inverse(&r_a.face, &mut x_a.face)?;
        block_b.apply_face_inverse(&r_b.face, &mut x_b.face)?;
        Ok(())
    }
}

// ============================================================
// 单元测试
// ============================================================
