// crates/pf_state/src/models/mod.rs

//! 本构模型
//!
//! 模型是纯标量函数族，不接触场与调度；评估器持有模型并在
//! 逐实体循环中调用。模型经序列化配置的工厂构造，变体由
//! 配置中的 `type` 标签选择。

pub mod thermal_conductivity;
pub mod wrm;

pub use thermal_conductivity::{ThermalConductivityConfig, TwoPhaseConductivity};
pub use wrm::{Wrm, WrmConfig};
