// crates/pf_solver/src/coupled/mod.rs

//! 2x2 块耦合预条件器
//!
//! 两个各自隐式的物理核（如流动与能量）在单元自由度上通过
//! 守恒量对对方主变量的导数耦合。本模块提供：
//!
//! - [`config::CoupledConfig`]: 序列化配置（键名、退化开关、诊断项）
//! - [`operator::CoupledOperator`]: 逐单元 Schur 补消去与回代
//! - [`assembler::CoupledPreconditioner`]: 连接状态层导数协议的装配器

pub mod assembler;
pub mod config;
pub mod operator;

pub use assembler::{AssemblyPhase, CoupledPreconditioner};
pub use config::CoupledConfig;
pub use operator::{CoupledOperator, SubBlockHandle};
