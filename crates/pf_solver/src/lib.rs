// crates/pf_solver/src/lib.rs

//! PermaFlow Solver Layer
//!
//! 求解器层：块向量、子块预条件器与 2x2 耦合 Schur 补预条件器。
//!
//! # 模块概览
//!
//! - [`block`]: 块向量与子块预条件器（单元/面自由度分块）
//! - [`coupled`]: 2x2 块耦合预条件器（Schur 补消去、装配器）
//!
//! # 设计约束
//!
//! 耦合路径在非对角块为零时与块对角路径**逐位一致**：
//! 回代只做"减去修正项再乘既有逆"，零修正不引入任何舍入差异。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod coupled;

// 重导出常用类型
pub use block::{BlockVector, DiagonalBlockPreconditioner, SubBlockPreconditioner};
pub use coupled::{AssemblyPhase, CoupledConfig, CoupledOperator, CoupledPreconditioner};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::block::{BlockVector, DiagonalBlockPreconditioner, SubBlockPreconditioner};
    pub use crate::coupled::{CoupledConfig, CoupledPreconditioner, SubBlockHandle};
    pub use pf_state::prelude::*;
}
