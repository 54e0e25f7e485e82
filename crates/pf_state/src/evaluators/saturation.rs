// crates/pf_state/src/evaluators/saturation.rs

//! 液相饱和度评估器
//!
//! 由液压经水分保持模型计算饱和度：
//! `s = wrm.saturation(p_atm - p)`。

use serde::{Deserialize, Serialize};

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::models::wrm::{Wrm, WrmConfig};
use crate::state::State;

fn default_saturation_key() -> String {
    "saturation_liquid".to_string()
}

fn default_pressure_key() -> String {
    "pressure".to_string()
}

fn default_atmospheric_pressure() -> f64 {
    101325.0
}

/// 饱和度评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaturationConfig {
    /// 输出键
    #[serde(default = "default_saturation_key")]
    pub saturation_key: String,
    /// 液压键
    #[serde(default = "default_pressure_key")]
    pub pressure_key: String,
    /// 大气压 [Pa]
    #[serde(default = "default_atmospheric_pressure")]
    pub atmospheric_pressure: f64,
    /// 水分保持模型
    pub wrm: WrmConfig,
}

/// 液相饱和度评估器
pub struct SaturationEvaluator {
    key: Key,
    pressure_key: Key,
    deps: Vec<Key>,
    wrm: Box<dyn Wrm>,
    p_atm: f64,
}

impl SaturationEvaluator {
    /// 按配置构造
    pub fn from_config(config: &SaturationConfig) -> PfResult<Self> {
        Ok(Self {
            key: config.saturation_key.clone(),
            pressure_key: config.pressure_key.clone(),
            deps: vec![config.pressure_key.clone()],
            wrm: config.wrm.build()?,
            p_atm: config.atmospheric_pressure,
        })
    }
}

impl FieldEvaluator for SaturationEvaluator {
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
        let pressure = state.get_data(&self.pressure_key)?;
        let pressure = pressure.borrow();
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let p = pressure.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..p.len() {
                dst[i] = self.wrm.saturation(self.p_atm - p[i]);
            }
        }
        Ok(())
    }

    fn evaluate_derivative(&self, state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        if wrt != self.pressure_key {
            return Err(PfError::not_implemented(self.key.clone(), wrt));
        }
        let pressure = state.get_data(&self.pressure_key)?;
        let pressure = pressure.borrow();
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let p = pressure.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            // ds/dp = ds/dpc · dpc/dp = -ds/dpc
            for i in 0..p.len() {
                dst[i] = -self.wrm.d_saturation(self.p_atm - p[i]);
            }
        }
        Ok(())
    }
}
