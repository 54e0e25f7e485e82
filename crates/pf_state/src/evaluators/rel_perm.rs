// crates/pf_state/src/evaluators/rel_perm.rs

//! 相对渗透率评估器
//!
//! 由液相饱和度经水分保持模型计算相对渗透率。

use serde::{Deserialize, Serialize};

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::FieldEvaluator;
use crate::field::Field;
use crate::models::wrm::{Wrm, WrmConfig};
use crate::state::State;

fn default_rel_perm_key() -> String {
    "relative_permeability".to_string()
}

fn default_saturation_key() -> String {
    "saturation_liquid".to_string()
}

/// 相对渗透率评估器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelPermConfig {
    /// 输出键
    #[serde(default = "default_rel_perm_key")]
    pub rel_perm_key: String,
    /// 饱和度键
    #[serde(default = "default_saturation_key")]
    pub saturation_key: String,
    /// 水分保持模型
    pub wrm: WrmConfig,
}

/// 相对渗透率评估器
pub struct RelPermEvaluator {
    key: Key,
    saturation_key: Key,
    deps: Vec<Key>,
    wrm: Box<dyn Wrm>,
}

impl RelPermEvaluator {
    /// 按配置构造
    pub fn from_config(config: &RelPermConfig) -> PfResult<Self> {
        Ok(Self {
            key: config.rel_perm_key.clone(),
            saturation_key: config.saturation_key.clone(),
            deps: vec![config.saturation_key.clone()],
            wrm: config.wrm.build()?,
        })
    }
}

impl FieldEvaluator for RelPermEvaluator {
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
        let saturation = state.get_data(&self.saturation_key)?;
        let saturation = saturation.borrow();
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let s = saturation.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..s.len() {
                dst[i] = self.wrm.k_relative(s[i]);
            }
        }
        Ok(())
    }

    fn evaluate_derivative(&self, state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        if wrt != self.saturation_key {
            return Err(PfError::not_implemented(self.key.clone(), wrt));
        }
        let saturation = state.get_data(&self.saturation_key)?;
        let saturation = saturation.borrow();
        let names: Vec<String> = output
            .shape()
            .components()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        for comp in &names {
            let s = saturation.component(comp)?.to_vec();
            let dst = output.component_mut(comp)?;
            for i in 0..s.len() {
                dst[i] = self.wrm.d_k_relative(s[i]);
            }
        }
        Ok(())
    }
}
