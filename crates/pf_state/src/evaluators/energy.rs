// crates/pf_state/src/evaluators/energy.rs

//! 体积内能评估器
//!
//! `e = φ·s·n₀·c_v·(T - T₀)`。对压力的导数不是直接项：
//! 压力只经饱和度间接进入，由链式法则自动传递。

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::state::State;

fn default_energy_key() -> String {
    "energy".to_string()
}

fn default_porosity_key() -> String {
    "porosity".to_string()
}

fn default_saturation_key() -> String {
    "saturation_liquid".to_string()
}

fn default_temperature_key() -> String {
    "temperature".to_string()
}

fn default_heat_capacity() -> f64 {
    // 液态水摩尔定容热容 [J/(mol·K)]
    75.3
}

fn default_reference_density() -> f64 {
    55345.0
}

fn default_reference_temperature() -> f64 {
    273.15
}

/// 内能评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    /// 输出键
    #[serde(default = "default_energy_key")]
    pub energy_key: String,
    /// 孔隙度键
    #[serde(default = "default_porosity_key")]
    pub porosity_key: String,
    /// 饱和度键
    #[serde(default = "default_saturation_key")]
    pub saturation_key: String,
    /// 温度键
    #[serde(default = "default_temperature_key")]
    pub temperature_key: String,
    /// 摩尔热容 c_v [J/(mol·K)]
    #[serde(default = "default_heat_capacity")]
    pub heat_capacity: f64,
    /// 参考摩尔密度 n₀ [mol/m³]
    #[serde(default = "default_reference_density")]
    pub reference_density: f64,
    /// 参考温度 T₀ [K]
    #[serde(default = "default_reference_temperature")]
    pub reference_temperature: f64,
}

/// 体积内能评估器
pub struct EnergyEvaluator {
    key: Key,
    porosity_key: Key,
    saturation_key: Key,
    temperature_key: Key,
    deps: Vec<Key>,
    n0_cv: f64,
    t0: f64,
}

impl EnergyEvaluator {
    /// 按配置构造
    pub fn from_config(config: &EnergyConfig) -> PfResult<Self> {
        if config.heat_capacity <= 0.0 {
            return Err(PfError::invalid_config(
                "heat_capacity",
                config.heat_capacity.to_string(),
                "必须为正",
            ));
        }
        Ok(Self {
            key: config.energy_key.clone(),
            porosity_key: config.porosity_key.clone(),
            saturation_key: config.saturation_key.clone(),
            temperature_key: config.temperature_key.clone(),
            deps: vec![
                config.porosity_key.clone(),
                config.saturation_key.clone(),
                config.temperature_key.clone(),
            ],
            n0_cv: config.reference_density * config.heat_capacity,
            t0: config.reference_temperature,
        })
    }
}

impl FieldEvaluator for EnergyEvaluator {
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
        let poro = state.get_data(&self.porosity_key)?;
        let poro = poro.borrow();
        let sat = state.get_data(&self.saturation_key)?;
        let sat = sat.borrow();
        let temp = state.get_data(&self.temperature_key)?;
        let temp = temp.borrow();

        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let phi = poro.component(comp)?.to_vec();
            let s = sat.component(comp)?.to_vec();
            let t = temp.component(comp)?.to_vec();
            PfError::check_size("energy deps", phi.len(), s.len())?;
            PfError::check_size("energy deps", phi.len(), t.len())?;
            let len = phi.len();
            let (n0_cv, t0) = (self.n0_cv, self.t0);
            let dst = output.component_mut(comp)?;

            #[cfg(feature = "parallel")]
            dst[..len]
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, d)| *d = phi[i] * s[i] * n0_cv * (t[i] - t0));

            #[cfg(not(feature = "parallel"))]
            for i in 0..len {
                dst[i] = phi[i] * s[i] * n0_cv * (t[i] - t0);
            }
        }
        Ok(())
    }

    fn evaluate_derivative(&self, state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        let poro = state.get_data(&self.porosity_key)?;
        let poro = poro.borrow();
        let sat = state.get_data(&self.saturation_key)?;
        let sat = sat.borrow();
        let temp = state.get_data(&self.temperature_key)?;
        let temp = temp.borrow();

        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let phi = poro.component(comp)?.to_vec();
            let s = sat.component(comp)?.to_vec();
            let t = temp.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            if wrt == self.porosity_key {
                for i in 0..phi.len() {
                    dst[i] = s[i] * self.n0_cv * (t[i] - self.t0);
                }
            } else if wrt == self.saturation_key {
                for i in 0..phi.len() {
                    dst[i] = phi[i] * self.n0_cv * (t[i] - self.t0);
                }
            } else if wrt == self.temperature_key {
                for i in 0..phi.len() {
                    dst[i] = phi[i] * s[i] * self.n0_cv;
                }
            } else {
                return Err(PfError::not_implemented(self.key.clone(), wrt));
            }
        }
        Ok(())
    }
}
