// crates/pf_state/src/models/wrm.rs

//! 水分保持模型 (water retention model)
//!
//! 将毛细压力映射到液相饱和度，并给出相对渗透率曲线。
//! 约定毛细压力 `pc = p_atm - p_liquid`，`pc <= 0` 时完全饱和。

use pf_foundation::{PfError, PfResult};
use serde::{Deserialize, Serialize};

/// 水分保持模型能力接口
///
/// 所有函数均为纯标量函数，可在逐实体循环中调用。
/// 要求 `Debug` 以便含 `Box<dyn Wrm>` 的包装器可以派生。
pub trait Wrm: std::fmt::Debug {
    /// 饱和度 s(pc)
    fn saturation(&self, pc: f64) -> f64;

    /// ds/dpc
    fn d_saturation(&self, pc: f64) -> f64;

    /// 相对渗透率 k_rel(s)
    fn k_relative(&self, s: f64) -> f64;

    /// dk_rel/ds
    fn d_k_relative(&self, s: f64) -> f64;

    /// 残余饱和度
    fn residual_saturation(&self) -> f64 {
        0.0
    }
}

// ============================================================
// van Genuchten
// ============================================================

/// van Genuchten 保持曲线 + Mualem 相对渗透率
///
/// ```text
/// se(pc) = (1 + (α·pc)^n)^(-m),   m = 1 - 1/n
/// s      = s_r + (1 - s_r)·se
/// k_rel  = √se · (1 - (1 - se^(1/m))^m)²
/// ```
#[derive(Debug, Clone)]
pub struct VanGenuchten {
    alpha: f64,
    n: f64,
    m: f64,
    s_r: f64,
}

impl VanGenuchten {
    /// 构造并验证参数: `alpha > 0`, `n > 1`, `0 <= s_r < 1`
    pub fn new(alpha: f64, n: f64, s_r: f64) -> PfResult<Self> {
        if alpha <= 0.0 {
            return Err(PfError::invalid_config(
                "alpha",
                alpha.to_string(),
                "必须为正",
            ));
        }
        if n <= 1.0 {
            return Err(PfError::invalid_config("n", n.to_string(), "必须大于 1"));
        }
        if !(0.0..1.0).contains(&s_r) {
            return Err(PfError::invalid_config(
                "s_r",
                s_r.to_string(),
                "必须在 [0, 1) 内",
            ));
        }
        Ok(Self {
            alpha,
            n,
            m: 1.0 - 1.0 / n,
            s_r,
        })
    }

    /// 有效饱和度 se(pc)
    fn effective_saturation(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 1.0;
        }
        (1.0 + (self.alpha * pc).powf(self.n)).powf(-self.m)
    }

    /// s 归一化为 se，限制在 [0, 1]
    fn se_of_s(&self, s: f64) -> f64 {
        ((s - self.s_r) / (1.0 - self.s_r)).clamp(0.0, 1.0)
    }
}

impl Wrm for VanGenuchten {
    fn saturation(&self, pc: f64) -> f64 {
        self.s_r + (1.0 - self.s_r) * self.effective_saturation(pc)
    }

    fn d_saturation(&self, pc: f64) -> f64 {
        if pc <= 0.0 {
            return 0.0;
        }
        let apc_n = (self.alpha * pc).powf(self.n);
        let dse = -self.m
            * self.n
            * self.alpha
            * (self.alpha * pc).powf(self.n - 1.0)
            * (1.0 + apc_n).powf(-self.m - 1.0);
        (1.0 - self.s_r) * dse
    }

    fn k_relative(&self, s: f64) -> f64 {
        let se = self.se_of_s(s);
        if se <= 0.0 {
            return 0.0;
        }
        if se >= 1.0 {
            return 1.0;
        }
        let f = 1.0 - (1.0 - se.powf(1.0 / self.m)).powf(self.m);
        se.sqrt() * f * f
    }

    fn d_k_relative(&self, s: f64) -> f64 {
        let se = self.se_of_s(s);
        // 区间端点处导数截断为零，避免 se^(-1/2) 发散
        if se <= 0.0 || se >= 1.0 {
            return 0.0;
        }
        let g = 1.0 - se.powf(1.0 / self.m);
        let f = 1.0 - g.powf(self.m);
        let df = g.powf(self.m - 1.0) * se.powf(1.0 / self.m - 1.0);
        let dk_dse = 0.5 * f * f / se.sqrt() + 2.0 * se.sqrt() * f * df;
        dk_dse / (1.0 - self.s_r)
    }

    fn residual_saturation(&self) -> f64 {
        self.s_r
    }
}

// ============================================================
// 线性相对渗透率包装
// ============================================================

/// 线性相对渗透率：`k_rel(s) = s`，保持曲线委托给内层模型
///
/// 常用于调试与算例对照。
#[derive(Debug)]
pub struct LinearRelPerm {
    inner: Box<dyn Wrm>,
}

impl LinearRelPerm {
    /// 包装一个内层保持模型
    pub fn new(inner: Box<dyn Wrm>) -> Self {
        Self { inner }
    }
}

impl Wrm for LinearRelPerm {
    fn saturation(&self, pc: f64) -> f64 {
        self.inner.saturation(pc)
    }

    fn d_saturation(&self, pc: f64) -> f64 {
        self.inner.d_saturation(pc)
    }

    fn k_relative(&self, s: f64) -> f64 {
        s
    }

    fn d_k_relative(&self, _s: f64) -> f64 {
        1.0
    }

    fn residual_saturation(&self) -> f64 {
        self.inner.residual_saturation()
    }
}

// ============================================================
// 配置工厂
// ============================================================

fn default_s_r() -> f64 {
    0.0
}

/// 水分保持模型配置，`type` 标签选择变体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WrmConfig {
    /// van Genuchten 曲线
    VanGenuchten {
        /// 进气压力倒数 [1/Pa]
        alpha: f64,
        /// 孔径分布指数
        n: f64,
        /// 残余饱和度
        #[serde(default = "default_s_r")]
        s_r: f64,
    },
    /// 线性相对渗透率包装
    LinearRelPerm {
        /// 内层保持模型
        inner: Box<WrmConfig>,
    },
}

impl WrmConfig {
    /// 按配置构造模型
    pub fn build(&self) -> PfResult<Box<dyn Wrm>> {
        match self {
            WrmConfig::VanGenuchten { alpha, n, s_r } => {
                Ok(Box::new(VanGenuchten::new(*alpha, *n, *s_r)?))
            }
            WrmConfig::LinearRelPerm { inner } => Ok(Box::new(LinearRelPerm::new(inner.build()?))),
        }
    }
}

// ============================================================
// 单元测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn vg() -> VanGenuchten {
        VanGenuchten::new(1.0e-4, 2.0, 0.1).unwrap()
    }

    #[test]
    fn test_saturated_below_entry_pressure() {
        let wrm = vg();
        assert_eq!(wrm.saturation(0.0), 1.0);
        assert_eq!(wrm.saturation(-1.0e4), 1.0);
        assert_eq!(wrm.d_saturation(0.0), 0.0);
    }

    #[test]
    fn test_saturation_monotone_decreasing() {
        let wrm = vg();
        let s1 = wrm.saturation(1.0e3);
        let s2 = wrm.saturation(1.0e4);
        let s3 = wrm.saturation(1.0e5);
        assert!(s1 > s2 && s2 > s3);
        assert!(s3 >= wrm.residual_saturation());
    }

    #[test]
    fn test_d_saturation_matches_finite_difference() {
        let wrm = vg();
        let pc = 2.0e4;
        let eps = 1.0e-2;
        let fd = (wrm.saturation(pc + eps) - wrm.saturation(pc - eps)) / (2.0 * eps);
        let analytic = wrm.d_saturation(pc);
        assert!((fd - analytic).abs() <= 1.0e-6 * analytic.abs().max(1.0e-12));
    }

    #[test]
    fn test_k_relative_bounds() {
        let wrm = vg();
        assert_eq!(wrm.k_relative(0.05), 0.0); // s < s_r
        assert_eq!(wrm.k_relative(1.0), 1.0);
        let k = wrm.k_relative(0.6);
        assert!(k > 0.0 && k < 1.0);
    }

    #[test]
    fn test_d_k_relative_matches_finite_difference() {
        let wrm = vg();
        let s = 0.6;
        let eps = 1.0e-7;
        let fd = (wrm.k_relative(s + eps) - wrm.k_relative(s - eps)) / (2.0 * eps);
        let analytic = wrm.d_k_relative(s);
        assert!((fd - analytic).abs() <= 1.0e-5 * analytic.abs());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(VanGenuchten::new(-1.0, 2.0, 0.0).is_err());
        assert!(VanGenuchten::new(1.0e-4, 1.0, 0.0).is_err());
        assert!(VanGenuchten::new(1.0e-4, 2.0, 1.0).is_err());
    }

    #[test]
    fn test_linear_rel_perm_delegates() {
        let config: WrmConfig = serde_json::from_str(
            r#"{"type": "linear_rel_perm",
                "inner": {"type": "van_genuchten", "alpha": 1.0e-4, "n": 2.0}}"#,
        )
        .unwrap();
        let model = config.build().unwrap();
        assert_eq!(model.k_relative(0.37), 0.37);
        assert_eq!(model.d_k_relative(0.37), 1.0);
        // 保持曲线来自内层
        assert_eq!(model.saturation(0.0), 1.0);
    }

    #[test]
    fn test_wrapped_model_is_debuggable() {
        let model = LinearRelPerm::new(Box::new(vg()));
        let text = format!("{model:?}");
        assert!(text.contains("LinearRelPerm"));
        assert!(text.contains("VanGenuchten"));
    }

    #[test]
    fn test_config_default_s_r() {
        let config: WrmConfig =
            serde_json::from_str(r#"{"type": "van_genuchten", "alpha": 1.0e-4, "n": 2.0}"#)
                .unwrap();
        let model = config.build().unwrap();
        assert_eq!(model.residual_saturation(), 0.0);
    }
}
