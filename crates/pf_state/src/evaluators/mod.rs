// crates/pf_state/src/evaluators/mod.rs

//! 二次变量评估器集合
//!
//! 每个评估器从序列化配置构造，场键全部可配置并带约定俗成的
//! 缺省值；依赖列表在构造时由键拼出，运行期不变。

pub mod energy;
pub mod molar_density;
pub mod rel_perm;
pub mod saturation;
pub mod thermal_conductivity;
pub mod threshold_average;
pub mod water_content;

pub use energy::{EnergyConfig, EnergyEvaluator};
pub use molar_density::{MolarDensityConfig, MolarDensityEvaluator};
pub use rel_perm::{RelPermConfig, RelPermEvaluator};
pub use saturation::{SaturationConfig, SaturationEvaluator};
pub use thermal_conductivity::{ConductivityEvaluatorConfig, ThermalConductivityEvaluator};
pub use threshold_average::{ThresholdAverageConfig, ThresholdAverageEvaluator};
pub use water_content::{WaterContentConfig, WaterContentEvaluator};
