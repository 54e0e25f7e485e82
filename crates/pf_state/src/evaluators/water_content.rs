// crates/pf_state/src/evaluators/water_content.rs

//! 水含量评估器
//!
//! 守恒量 `Θ = φ·s·n`（孔隙度 × 饱和度 × 摩尔密度）。
//! 对温度的导数不是直接项：温度只经摩尔密度间接进入，
//! 由链式法则自动传递。

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::state::State;

fn default_water_content_key() -> String {
    "water_content".to_string()
}

fn default_porosity_key() -> String {
    "porosity".to_string()
}

fn default_saturation_key() -> String {
    "saturation_liquid".to_string()
}

fn default_molar_density_key() -> String {
    "molar_density_liquid".to_string()
}

/// 水含量评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterContentConfig {
    /// 输出键
    #[serde(default = "default_water_content_key")]
    pub water_content_key: String,
    /// 孔隙度键
    #[serde(default = "default_porosity_key")]
    pub porosity_key: String,
    /// 饱和度键
    #[serde(default = "default_saturation_key")]
    pub saturation_key: String,
    /// 摩尔密度键
    #[serde(default = "default_molar_density_key")]
    pub molar_density_key: String,
}

/// 水含量评估器
pub struct WaterContentEvaluator {
    key: Key,
    porosity_key: Key,
    saturation_key: Key,
    molar_density_key: Key,
    deps: Vec<Key>,
}

impl WaterContentEvaluator {
    /// 按配置构造
    pub fn from_config(config: &WaterContentConfig) -> Self {
        Self {
            key: config.water_content_key.clone(),
            porosity_key: config.porosity_key.clone(),
            saturation_key: config.saturation_key.clone(),
            molar_density_key: config.molar_density_key.clone(),
            deps: vec![
                config.porosity_key.clone(),
                config.saturation_key.clone(),
                config.molar_density_key.clone(),
            ],
        }
    }
}

impl FieldEvaluator for WaterContentEvaluator {
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
        let den = state.get_data(&self.molar_density_key)?;
        let den = den.borrow();

        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let phi = poro.component(comp)?;
            let s = sat.component(comp)?;
            let n = den.component(comp)?;
            PfError::check_size("water content deps", phi.len(), s.len())?;
            PfError::check_size("water content deps", phi.len(), n.len())?;
            let len = phi.len();
            let (phi, s, n) = (phi.to_vec(), s.to_vec(), n.to_vec());
            let dst = output.component_mut(comp)?;

            #[cfg(feature = "parallel")]
            dst[..len]
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, d)| *d = phi[i] * s[i] * n[i]);

            #[cfg(not(feature = "parallel"))]
            for i in 0..len {
                dst[i] = phi[i] * s[i] * n[i];
            }
        }
        Ok(())
    }

    fn evaluate_derivative(&self, state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        // 三个直接依赖的偏导都是剩余两因子之积
        let (a_key, b_key) = if wrt == self.porosity_key {
            (&self.saturation_key, &self.molar_density_key)
        } else if wrt == self.saturation_key {
            (&self.porosity_key, &self.molar_density_key)
        } else if wrt == self.molar_density_key {
            (&self.porosity_key, &self.saturation_key)
        } else {
            return Err(PfError::not_implemented(self.key.clone(), wrt));
        };

        let a = state.get_data(a_key)?;
        let a = a.borrow();
        let b = state.get_data(b_key)?;
        let b = b.borrow();

        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let lhs = a.component(comp)?.to_vec();
            let rhs = b.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..lhs.len() {
                dst[i] = lhs[i] * rhs[i];
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldShape;

    #[test]
    fn test_product_of_three_factors() {
        let config: WaterContentConfig = serde_json::from_str("{}").unwrap();
        let mut state = State::new();
        state
            .register_primary("porosity", FieldShape::cell(2))
            .unwrap();
        state
            .register_primary("saturation_liquid", FieldShape::cell(2))
            .unwrap();
        state
            .register_primary("molar_density_liquid", FieldShape::cell(2))
            .unwrap();
        state
            .register_evaluator(Box::new(WaterContentEvaluator::from_config(&config)))
            .unwrap();
        state
            .require_field("water_content", "test", &FieldShape::cell(2))
            .unwrap();
        state.ensure_compatibility("water_content").unwrap();

        state.set_primary("porosity", "cell", &[0.4, 0.5]).unwrap();
        state
            .set_primary("saturation_liquid", "cell", &[0.5, 1.0])
            .unwrap();
        state
            .set_primary("molar_density_liquid", "cell", &[1000.0, 2000.0])
            .unwrap();

        let me = state.register_consumer("test");
        state.has_field_changed("water_content", me).unwrap();
        let wc = state.get_data("water_content").unwrap();
        assert_eq!(wc.borrow().component("cell").unwrap(), &[200.0, 1000.0]);
    }
}
