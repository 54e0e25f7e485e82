// crates/pf_state/src/models/thermal_conductivity.rs

//! 两相热导率模型
//!
//! 按孔隙度与液相饱和度给出体积热导率。湿/干端点间用
//! Kersten 数插值：`κ = κ_dry + (κ_wet - κ_dry) · Ke(s)`，
//! `Ke(s) = s^α`。

use pf_foundation::{PfError, PfResult};
use serde::{Deserialize, Serialize};

/// 两相热导率能力接口
pub trait TwoPhaseConductivity {
    /// 热导率 κ(φ, s) [W/(m·K)]
    fn conductivity(&self, porosity: f64, saturation: f64) -> f64;

    /// ∂κ/∂s
    fn d_conductivity_d_saturation(&self, porosity: f64, saturation: f64) -> f64;
}

/// 湿/干端点插值模型
#[derive(Debug, Clone)]
pub struct WetDryConductivity {
    k_wet: f64,
    k_dry: f64,
    exponent: f64,
}

impl WetDryConductivity {
    /// 构造并验证: `k_wet >= k_dry > 0`, `exponent > 0`
    pub fn new(k_wet: f64, k_dry: f64, exponent: f64) -> PfResult<Self> {
        if k_dry <= 0.0 || k_wet < k_dry {
            return Err(PfError::invalid_config(
                "thermal_conductivity",
                format!("k_wet={k_wet}, k_dry={k_dry}"),
                "要求 k_wet >= k_dry > 0",
            ));
        }
        if exponent <= 0.0 {
            return Err(PfError::invalid_config(
                "exponent",
                exponent.to_string(),
                "必须为正",
            ));
        }
        Ok(Self {
            k_wet,
            k_dry,
            exponent,
        })
    }
}

impl TwoPhaseConductivity for WetDryConductivity {
    fn conductivity(&self, _porosity: f64, saturation: f64) -> f64 {
        let s = saturation.clamp(0.0, 1.0);
        self.k_dry + (self.k_wet - self.k_dry) * s.powf(self.exponent)
    }

    fn d_conductivity_d_saturation(&self, _porosity: f64, saturation: f64) -> f64 {
        let s = saturation.clamp(0.0, 1.0);
        if s == 0.0 && self.exponent < 1.0 {
            return 0.0;
        }
        (self.k_wet - self.k_dry) * self.exponent * s.powf(self.exponent - 1.0)
    }
}

/// 常数热导率（调试与算例对照用）
#[derive(Debug, Clone)]
pub struct ConstantConductivity {
    value: f64,
}

impl TwoPhaseConductivity for ConstantConductivity {
    fn conductivity(&self, _porosity: f64, _saturation: f64) -> f64 {
        self.value
    }

    fn d_conductivity_d_saturation(&self, _porosity: f64, _saturation: f64) -> f64 {
        0.0
    }
}

// ============================================================
// 配置工厂
// ============================================================

fn default_exponent() -> f64 {
    1.0
}

/// 热导率模型配置，`type` 标签选择变体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThermalConductivityConfig {
    /// 湿/干端点插值
    WetDry {
        /// 全饱和热导率 [W/(m·K)]
        k_wet: f64,
        /// 干燥热导率 [W/(m·K)]
        k_dry: f64,
        /// Kersten 数指数
        #[serde(default = "default_exponent")]
        exponent: f64,
    },
    /// 常数
    Constant {
        /// 热导率 [W/(m·K)]
        value: f64,
    },
}

impl ThermalConductivityConfig {
    /// 按配置构造模型
    pub fn build(&self) -> PfResult<Box<dyn TwoPhaseConductivity>> {
        match self {
            ThermalConductivityConfig::WetDry {
                k_wet,
                k_dry,
                exponent,
            } => Ok(Box::new(WetDryConductivity::new(*k_wet, *k_dry, *exponent)?)),
            ThermalConductivityConfig::Constant { value } => {
                if *value <= 0.0 {
                    return Err(PfError::invalid_config(
                        "value",
                        value.to_string(),
                        "必须为正",
                    ));
                }
                Ok(Box::new(ConstantConductivity { value: *value }))
            }
        }
    }
}

// ============================================================
// 单元测试
// ============================================================
