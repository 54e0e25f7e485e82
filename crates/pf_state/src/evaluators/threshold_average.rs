// crates/pf_state/src/evaluators/threshold_average.rs

//! 阈值平均评估器
//!
//! 对源场中超过阈值的实体求平均，输出单实体标量场
//! （典型用途：活动层平均温度）。子集为空时输出恰为 0.0，
//! 这是约定的合法结果，不是错误。

use serde::{Deserialize, Serialize};

use pf_foundation::{Key, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::{Field, FieldShape};
use crate::state::State;

fn default_average_key() -> String {
    "active_layer_average_temperature".to_string()
}

fn default_source_key() -> String {
    "temperature".to_string()
}

fn default_transition_width() -> f64 {
    0.2
}

/// 阈值平均评估器配置
///
/// 阈值取冻融过渡带的上沿：`273.15 + 0.5·transition_width` [K]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdAverageConfig {
    /// 输出键
    #[serde(default = "default_average_key")]
    pub average_key: String,
    /// 源场键
    #[serde(default = "default_source_key")]
    pub source_key: String,
    /// 过渡带宽度 [K]
    #[serde(default = "default_transition_width")]
    pub transition_width: f64,
}

/// 阈值平均评估器
pub struct ThresholdAverageEvaluator {
    key: Key,
    source_key: Key,
    deps: Vec<Key>,
    threshold: f64,
}

impl ThresholdAverageEvaluator {
    /// 按配置构造
    pub fn from_config(config: &ThresholdAverageConfig) -> Self {
        Self {
            key: config.average_key.clone(),
            source_key: config.source_key.clone(),
            deps: vec![config.source_key.clone()],
            threshold: 273.15 + 0.5 * config.transition_width,
        }
    }

    /// 生效的阈值 [K]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl FieldEvaluator for ThresholdAverageEvaluator {
    fn key(&self) -> &Key {
        &self.key
    }

    fn dependencies(&self) -> &[Key] {
        &self.deps
    }

    fn shape_hint(&self) -> Option<FieldShape> {
        // 输出几何与源场无关：单实体标量
        Some(FieldShape::cell(1))
    }

    fn evaluate(&self, state: &State, output: &mut Field) -> PfResult<()> {
        let source = state.get_data(&self.source_key)?;
        let source = source.borrow();
        let values = source.component("cell")?;

        let mut sum = 0.0;
        let mut count = 0usize;
        for &v in values {
            if v > self.threshold {
                sum += v;
                count += 1;
            }
        }
        // 空子集归约约定为恰好 0.0
        output.component_mut("cell")?[0] = if count > 0 { sum / count as f64 } else { 0.0 };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_state(config: &ThresholdAverageConfig) -> State {
        let mut state = State::new();
        state
            .register_primary("temperature", FieldShape::cell(4))
            .unwrap();
        state
            .register_evaluator(Box::new(ThresholdAverageEvaluator::from_config(config)))
            .unwrap();
        state
            .ensure_compatibility("active_layer_average_temperature")
            .unwrap();
        state
    }

    #[test]
    fn test_average_over_thawed_cells() {
        let config: ThresholdAverageConfig = serde_json::from_str("{}").unwrap();
        let state = build_state(&config);
        // 阈值 273.25: 后两格超阈值
        state
            .set_primary("temperature", "cell", &[270.0, 273.2, 274.0, 276.0])
            .unwrap();

        let me = state.register_consumer("test");
        state
            .has_field_changed("active_layer_average_temperature", me)
            .unwrap();
        let avg = state.get_data("active_layer_average_temperature").unwrap();
        assert_eq!(avg.borrow().component("cell").unwrap(), &[275.0]);
    }

    #[test]
    fn test_empty_subset_yields_exact_zero() {
        let config: ThresholdAverageConfig = serde_json::from_str("{}").unwrap();
        let state = build_state(&config);
        // 全部冻结：无实体超阈值
        state
            .set_primary("temperature", "cell", &[260.0, 261.0, 262.0, 263.0])
            .unwrap();

        let me = state.register_consumer("test");
        state
            .has_field_changed("active_layer_average_temperature", me)
            .unwrap();
        let avg = state.get_data("active_layer_average_temperature").unwrap();
        assert_eq!(avg.borrow().component("cell").unwrap(), &[0.0]);
    }

    #[test]
    fn test_output_shape_independent_of_source() {
        let config: ThresholdAverageConfig = serde_json::from_str("{}").unwrap();
        let state = build_state(&config);
        assert_eq!(
            state.shape("active_layer_average_temperature").unwrap(),
            &FieldShape::cell(1)
        );
        assert_eq!(state.shape("temperature").unwrap(), &FieldShape::cell(4));
    }
}
