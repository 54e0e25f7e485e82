// crates/pf_state/src/lib.rs

//! PermaFlow State Layer
//!
//! 状态层：场注册表、评估器依赖图与惰性重算调度。
//!
//! # 模块概览
//!
//! - [`field`]: 场容器（SoA 分量布局、幽灵段纪律）
//! - [`evaluator`]: 评估器协议（消费者令牌、生命周期、能力接口）
//! - [`state`]: 中心注册表与备忘录化重算调度
//! - [`graph`]: 依赖图连线检查、环检测与形状传播
//! - [`derivative`]: 链式法则导数传播与导数场物化
//! - [`models`]: 本构模型（水分保持、热导率）
//! - [`evaluators`]: 二次变量评估器集合
//!
//! # 核心思想
//!
//! 派生量不是按固定顺序刷新的缓冲区，而是一张惰性求值的
//! 依赖图：消费者询问"自我上次观察以来某场是否变化"，
//! 调度器按需递归上游，保证每次上游变化至多重算一次。
//! 导数场沿同一张图按链式法则传播，按需物化。
//!
//! # 使用示例
//!
//! ```
//! use pf_state::{FieldShape, State};
//!
//! let mut state = State::new();
//! state.register_primary("pressure", FieldShape::cell(4))?;
//! state.ensure_compatibility("pressure")?;
//!
//! let me = state.register_consumer("demo");
//! state.set_primary("pressure", "cell", &[1.0, 2.0, 3.0, 4.0])?;
//! assert!(state.has_field_changed("pressure", me)?);
//! assert!(!state.has_field_changed("pressure", me)?);
//! # Ok::<(), pf_foundation::PfError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod derivative;
pub mod evaluator;
pub mod evaluators;
pub mod field;
pub mod graph;
pub mod models;
pub mod state;

// 重导出常用类型
pub use evaluator::{ConsumerToken, FieldEvaluator, Lifecycle, PrimaryVariable};
pub use field::{ComponentShape, Field, FieldShape};
pub use state::{FieldHandle, State};

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::evaluator::{ConsumerToken, FieldEvaluator, PrimaryVariable};
    pub use crate::field::{Field, FieldShape};
    pub use crate::state::{FieldHandle, State};
    pub use pf_foundation::prelude::*;
}
