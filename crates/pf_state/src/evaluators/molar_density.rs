// crates/pf_state/src/evaluators/molar_density.rs

//! 液相摩尔密度评估器
//!
//! 线性状态方程：`n(T) = n₀·(1 - β·(T - T₀))`。

use serde::{Deserialize, Serialize};

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::state::State;

fn default_molar_density_key() -> String {
    "molar_density_liquid".to_string()
}

fn default_temperature_key() -> String {
    "temperature".to_string()
}

fn default_reference_density() -> f64 {
    // 纯水 0°C 摩尔密度 [mol/m³]
    55345.0
}

fn default_reference_temperature() -> f64 {
    273.15
}

fn default_expansion_coefficient() -> f64 {
    2.07e-4
}

/// 摩尔密度评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MolarDensityConfig {
    /// 输出键
    #[serde(default = "default_molar_density_key")]
    pub molar_density_key: String,
    /// 温度键
    #[serde(default = "default_temperature_key")]
    pub temperature_key: String,
    /// 参考摩尔密度 n₀ [mol/m³]
    #[serde(default = "default_reference_density")]
    pub reference_density: f64,
    /// 参考温度 T₀ [K]
    #[serde(default = "default_reference_temperature")]
    pub reference_temperature: f64,
    /// 热膨胀系数 β [1/K]
    #[serde(default = "default_expansion_coefficient")]
    pub expansion_coefficient: f64,
}

/// 液相摩尔密度评估器
pub struct MolarDensityEvaluator {
    key: Key,
    temperature_key: Key,
    deps: Vec<Key>,
    n0: f64,
    t0: f64,
    beta: f64,
}

impl MolarDensityEvaluator {
    /// 按配置构造
    pub fn from_config(config: &MolarDensityConfig) -> PfResult<Self> {
        if config.reference_density <= 0.0 {
            return Err(PfError::invalid_config(
                "reference_density",
                config.reference_density.to_string(),
                "必须为正",
            ));
        }
        Ok(Self {
            key: config.molar_density_key.clone(),
            temperature_key: config.temperature_key.clone(),
            deps: vec![config.temperature_key.clone()],
            n0: config.reference_density,
            t0: config.reference_temperature,
            beta: config.expansion_coefficient,
        })
    }
}

impl FieldEvaluator for MolarDensityEvaluator {
    fn key(&self) -> &Key {
        &self.key
    }

    fn dependencies(&self) -> &[Key] {
        &self.deps
    }

    fn derivative_dependencies(&self) -> &[Key] {
        &self.deps
    }

    fn evaluate(&self, state: &State, output: &mut Field) -> PfResult<()> {
        let temperature = state.get_data(&self.temperature_key)?;
        let temperature = temperature.borrow();
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let t = temperature.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..t.len() {
                dst[i] = self.n0 * (1.0 - self.beta * (t[i] - self.t0));
            }
        }
        Ok(())
    }

    fn evaluate_derivative(&self, _state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        if wrt != self.temperature_key {
            return Err(PfError::not_implemented(self.key.clone(), wrt));
        }
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            output.component_mut(comp)?.fill(-self.n0 * self.beta);
        }
        Ok(())
    }
}
