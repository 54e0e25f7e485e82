// crates/pf_solver/src/block.rs

//! 块向量与子块预条件器
//!
//! 每个物理核的自由度分为单元部分与面部分（[`BlockVector`]）。
//! 子块预条件器（[`SubBlockPreconditioner`]）暴露耦合算子
//! 构造 Schur 补所需的最小能力：单元对角及其逆、
//! 单元/面的前向乘与逆作用。

use pf_foundation::{PfError, PfResult};

// ============================================================
// 块向量
// ============================================================

/// 单个物理核的自由度向量（单元 + 面）
#[derive(Debug, Clone, PartialEq)]
pub struct BlockVector {
    /// 单元自由度
    pub cell: Vec<f64>,
    /// 面自由度（可为空）
    pub face: Vec<f64>,
}

impl BlockVector {
    /// 零向量
    pub fn zeros(n_cells: usize, n_faces: usize) -> Self {
        Self {
            cell: vec![0.0; n_cells],
            face: vec![0.0; n_faces],
        }
    }

    /// 与 `other` 同形的零向量
    pub fn zeros_like(other: &BlockVector) -> Self {
        Self::zeros(other.cell.len(), other.face.len())
    }

    /// `self += alpha * other`
    pub fn axpy(&mut self, alpha: f64, other: &BlockVector) -> PfResult<()> {
        PfError::check_size("block vector cells", self.cell.len(), other.cell.len())?;
        PfError::check_size("block vector faces", self.face.len(), other.face.len())?;
        for (d, s) in self.cell.iter_mut().zip(other.cell.iter()) {
            *d += alpha * s;
        }
        for (d, s) in self.face.iter_mut().zip(other.face.iter()) {
            *d += alpha * s;
        }
        Ok(())
    }
}

// ============================================================
// 子块预条件器
// ============================================================

/// 子块预条件器能力接口
///
/// 耦合算子只依赖这里声明的能力，不关心子块内部的离散细节。
/// 面自由度完全委托给子块自身。
pub trait SubBlockPreconditioner {
    /// 子块名（用于日志与错误信息）
    fn name(&self) -> &str;

    /// 单元自由度数
    fn n_cells(&self) -> usize;

    /// 写入单元对角（含时间项累加，由物理核装配）
    fn set_cell_diagonal(&mut self, values: &[f64]) -> PfResult<()>;

    /// 写入面对角（无面自由度的子块传空切片）
    fn set_face_diagonal(&mut self, values: &[f64]) -> PfResult<()>;

    /// 预计算逆；零主元在此报错
    fn update_inverse(&mut self) -> PfResult<()>;

    /// 单元对角
    fn cell_diagonal(&self) -> &[f64];

    /// 单元对角的逆（[`Self::update_inverse`] 之后有效）
    fn inv_cell_diagonal(&self) -> &[f64];

    /// 单元部分前向乘: `y = A_cc · x`
    fn apply_cell(&self, x: &[f64], y: &mut [f64]) -> PfResult<()>;

    /// 单元部分逆作用: `x = A_cc⁻¹ · r`
    fn apply_cell_inverse(&self, r: &[f64], x: &mut [f64]) -> PfResult<()>;

    /// 面部分前向乘
    fn apply_face(&self, x: &[f64], y: &mut [f64]) -> PfResult<()>;

    /// 面部分逆作用
    fn apply_face_inverse(&self, r: &[f64], x: &mut [f64]) -> PfResult<()>;
}

// ============================================================
// 对角实现
// ============================================================

/// Jacobi 型子块预条件器：单元与面均取对角
#[derive(Debug)]
pub struct DiagonalBlockPreconditioner {
    name: String,
    cell_diag: Vec<f64>,
    cell_inv: Vec<f64>,
    face_diag: Vec<f64>,
    face_inv: Vec<f64>,
    inverse_fresh: bool,
}

impl DiagonalBlockPreconditioner {
    /// 创建给定规模的子块
    pub fn new(name: impl Into<String>, n_cells: usize, n_faces: usize) -> Self {
        Self {
            name: name.into(),
            cell_diag: vec![0.0; n_cells],
            cell_inv: vec![0.0; n_cells],
            face_diag: vec![0.0; n_faces],
            face_inv: vec![0.0; n_faces],
            inverse_fresh: false,
        }
    }

    fn require_fresh(&self) -> PfResult<()> {
        if !self.inverse_fresh {
            return Err(PfError::config(format!(
                "子块 {} 的逆尚未计算，先调用 update_inverse",
                self.name
            )));
        }
        Ok(())
    }
}

impl SubBlockPreconditioner for DiagonalBlockPreconditioner {
    fn name(&self) -> &str {
        &self.name
    }

    fn n_cells(&self) -> usize {
        self.cell_diag.len()
    }

    fn set_cell_diagonal(&mut self, values: &[f64]) -> PfResult<()> {
        PfError::check_size("cell diagonal", self.cell_diag.len(), values.len())?;
        self.cell_diag.copy_from_slice(values);
        self.inverse_fresh = false;
        Ok(())
    }

    fn set_face_diagonal(&mut self, values: &[f64]) -> PfResult<()> {
        PfError::check_size("face diagonal", self.face_diag.len(), values.len())?;
        self.face_diag.copy_from_slice(values);
        self.inverse_fresh = false;
        Ok(())
    }

    fn update_inverse(&mut self) -> PfResult<()> {
        for (i, &d) in self.cell_diag.iter().enumerate() {
            if d.abs() < f64::EPSILON {
                return Err(PfError::precon_assembly(
                    format!("子块 {} 单元对角近零", self.name),
                    i,
                ));
            }
            self.cell_inv[i] = 1.0 / d;
        }
        for (i, &d) in self.face_diag.iter().enumerate() {
            if d.abs() < f64::EPSILON {
                return Err(PfError::precon_assembly(
                    format!("子块 {} 面对角近零", self.name),
                    i,
                ));
            }
            self.face_inv[i] = 1.0 / d;
        }
        self.inverse_fresh = true;
        Ok(())
    }

    fn cell_diagonal(&self) -> &[f64] {
        &self.cell_diag
    }

    fn inv_cell_diagonal(&self) -> &[f64] {
        &self.cell_inv
    }

    fn apply_cell(&self, x: &[f64], y: &mut [f64]) -> PfResult<()> {
        PfError::check_size("apply_cell", self.cell_diag.len(), x.len())?;
        PfError::check_size("apply_cell", self.cell_diag.len(), y.len())?;
        for i in 0..x.len() {
            y[i] = self.cell_diag[i] * x[i];
        }
        Ok(())
    }

    fn apply_cell_inverse(&self, r: &[f64], x: &mut [f64]) -> PfResult<()> {
        self.require_fresh()?;
        PfError::check_size("apply_cell_inverse", self.cell_inv.len(), r.len())?;
        PfError::check_size("apply_cell_inverse", self.cell_inv.len(), x.len())?;
        for i in 0..r.len() {
            x[i] = self.cell_inv[i] * r[i];
        }
        Ok(())
    }

    fn apply_face(&self, x: &[f64], y: &mut [f64]) -> PfResult<()> {
        PfError::check_size("apply_face", self.face_diag.len(), x.len())?;
        PfError::check_size("apply_face", self.face_diag.len(), y.len())?;
        for i in 0..x.len() {
            y[i] = self.face_diag[i] * x[i];
        }
        Ok(())
    }

    fn apply_face_inverse(&self, r: &[f64], x: &mut [f64]) -> PfResult<()> {
        self.require_fresh()?;
        PfError::check_size("apply_face_inverse", self.face_inv.len(), r.len())?;
        PfError::check_size("apply_face_inverse", self.face_inv.len(), x.len())?;
        for i in 0..r.len() {
            x[i] = self.face_inv[i] * r[i];
        }
        Ok(())
    }
}

// ============================================================
// 单元测试
// ============================================================
