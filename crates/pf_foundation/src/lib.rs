// crates/pf_foundation/src/lib.rs

//! PermaFlow Foundation Layer
//!
//! 零物理依赖的基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`error`]: 统一错误类型 [`PfError`] 与结果别名 [`PfResult`]
//! - [`key`]: 场与评估器的键命名规则（含导数场命名）
//!
//! # 设计原则
//!
//! 1. **最小依赖**: 仅依赖 thiserror
//! 2. **可追溯**: 每个错误携带足够定位问题的上下文（键名、单元号）
//! 3. **不静默恢复**: 所有错误向上传播到直接调用者

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;

// 重导出常用类型
pub use error::{PfError, PfResult};
pub use key::{derivative_key, is_derivative_key, split_derivative_key, Key};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::ensure;
    pub use crate::error::{PfError, PfResult};
    pub use crate::key::{derivative_key, Key};
}
