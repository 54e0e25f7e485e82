// crates/pf_state/src/evaluators/thermal_conductivity.rs

//! 热导率评估器
//!
//! 委托注入的两相热导率模型。导数路径未实现：请求任何
//! 导数将得到 [`NotImplemented`](pf_foundation::PfError::NotImplemented)，
//! 调用方不得以零替代。

use serde::{Deserialize, Serialize};

use pf_foundation::{Key, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::models::thermal_conductivity::{ThermalConductivityConfig, TwoPhaseConductivity};
use crate::state::State;

fn default_conductivity_key() -> String {
    "thermal_conductivity".to_string()
}

fn default_porosity_key() -> String {
    "porosity".to_string()
}

fn default_saturation_key() -> String {
    "saturation_liquid".to_string()
}

/// 热导率评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductivityEvaluatorConfig {
    /// 输出键
    #[serde(default = "default_conductivity_key")]
    pub conductivity_key: String,
    /// 孔隙度键
    #[serde(default = "default_porosity_key")]
    pub porosity_key: String,
    /// 饱和度键
    #[serde(default = "default_saturation_key")]
    pub saturation_key: String,
    /// 热导率模型
    pub model: ThermalConductivityConfig,
}

/// 热导率评估器
pub struct ThermalConductivityEvaluator {
    key: Key,
    porosity_key: Key,
    saturation_key: Key,
    deps: Vec<Key>,
    model: Box<dyn TwoPhaseConductivity>,
}

impl ThermalConductivityEvaluator {
    /// 按配置构造
    pub fn from_config(config: &ConductivityEvaluatorConfig) -> PfResult<Self> {
        Ok(Self {
            key: config.conductivity_key.clone(),
            porosity_key: config.porosity_key.clone(),
            saturation_key: config.saturation_key.clone(),
            deps: vec![config.porosity_key.clone(), config.saturation_key.clone()],
            model: config.model.build()?,
        })
    }
}

impl FieldEvaluator for ThermalConductivityEvaluator {
    fn key(&self) -> &Key {
        &self.key
    }

    fn dependencies(&self) -> &[Key] {
        &self.deps
    }

    // 不覆盖 derivative_dependencies / evaluate_derivative：
    // 导数请求由缺省实现显式拒绝

    fn evaluate(&self, state: &State, output: &mut Field) -> PfResult<()> {
        let poro = state.get_data(&self.porosity_key)?;
        let poro = poro.borrow();
        let sat = state.get_data(&self.saturation_key)?;
        let sat = sat.borrow();

        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let phi = poro.component(comp)?.to_vec();
            let s = sat.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..phi.len() {
                dst[i] = self.model.conductivity(phi[i], s[i]);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldShape;
    use pf_foundation::PfError;

    fn build_state() -> State {
        let config: ConductivityEvaluatorConfig = serde_json::from_str(
            r#"{"model": {"type": "wet_dry", "k_wet": 2.0, "k_dry": 0.5}}"#,
        )
        .unwrap();
        let mut state = State::new();
        state
            .register_primary("porosity", FieldShape::cell(2))
            .unwrap();
        state
            .register_primary("saturation_liquid", FieldShape::cell(2))
            .unwrap();
        state
            .register_evaluator(Box::new(
                ThermalConductivityEvaluator::from_config(&config).unwrap(),
            ))
            .unwrap();
        state
            .require_field("thermal_conductivity", "test", &FieldShape::cell(2))
            .unwrap();
        state.ensure_compatibility("thermal_conductivity").unwrap();
        state
    }

    #[test]
    fn test_interpolates_between_endpoints() {
        let state = build_state();
        state.set_primary("porosity", "cell", &[0.4, 0.4]).unwrap();
        state
            .set_primary("saturation_liquid", "cell", &[0.0, 1.0])
            .unwrap();

        let me = state.register_consumer("test");
        state.has_field_changed("thermal_conductivity", me).unwrap();
        let k = state.get_data("thermal_conductivity").unwrap();
        assert_eq!(k.borrow().component("cell").unwrap(), &[0.5, 2.0]);
    }

    #[test]
    fn test_derivative_request_rejected() {
        let state = build_state();
        let me = state.register_consumer("test");
        state.has_field_changed("thermal_conductivity", me).unwrap();

        let err = state
            .has_field_derivative_changed("thermal_conductivity", me, "saturation_liquid")
            .unwrap_err();
        assert!(matches!(err, PfError::NotImplemented { .. }));
    }
}
