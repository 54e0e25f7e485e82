// crates/pf_solver/src/coupled/config.rs

//! 耦合预条件器配置

use pf_foundation::{PfError, PfResult};
use serde::{Deserialize, Serialize};

/// 2x2 耦合预条件器配置
///
/// 命名约定：物理核 A 的守恒量对核 B 主变量的导数构成
/// 右上块，核 B 的守恒量对核 A 主变量的导数构成左下块。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoupledConfig {
    /// 核 A 的守恒量键（如 "water_content"）
    pub conserved_quantity_a: String,
    /// 核 B 的守恒量键（如 "energy"）
    pub conserved_quantity_b: String,
    /// 核 A 的主变量键（如 "pressure"）
    pub primary_variable_a: String,
    /// 核 B 的主变量键（如 "temperature"）
    pub primary_variable_b: String,
    /// 退化为块对角（跳过非对角耦合）
    #[serde(default)]
    pub decoupled: bool,
    /// 每次装配后转储 Schur 补对角（诊断用）
    #[serde(default)]
    pub dump_schur: bool,
    /// 装配时打印这些单元的非对角项
    #[serde(default)]
    pub debug_cells: Vec<usize>,
    /// 调试单元所属的分区号（留空或与 debug_cells 等长）
    #[serde(default)]
    pub debug_ranks: Vec<usize>,
    /// 作用后的迭代精化遍数（0 = 关闭）
    #[serde(default)]
    pub refinement_sweeps: usize,
}

impl CoupledConfig {
    /// 校验配置自洽性
    pub fn validate(&self) -> PfResult<()> {
        for (name, value) in [
            ("conserved_quantity_a", &self.conserved_quantity_a),
            ("conserved_quantity_b", &self.conserved_quantity_b),
            ("primary_variable_a", &self.primary_variable_a),
            ("primary_variable_b", &self.primary_variable_b),
        ] {
            if value.is_empty() {
                return Err(PfError::missing_config(name));
            }
        }
        if self.conserved_quantity_a == self.conserved_quantity_b {
            return Err(PfError::invalid_config(
                "conserved_quantity_b",
                self.conserved_quantity_b.clone(),
                "两个守恒量键不得相同",
            ));
        }
        if self.primary_variable_a == self.primary_variable_b {
            return Err(PfError::invalid_config(
                "primary_variable_b",
                self.primary_variable_b.clone(),
                "两个主变量键不得相同",
            ));
        }
        if !self.debug_ranks.is_empty() && self.debug_ranks.len() != self.debug_cells.len() {
            return Err(PfError::invalid_config(
                "debug_ranks",
                format!("{} 项", self.debug_ranks.len()),
                format!("必须与 debug_cells ({} 项) 等长", self.debug_cells.len()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CoupledConfig {
        serde_json::from_str(
            r#"{
                "conserved_quantity_a": "water_content",
                "conserved_quantity_b": "energy",
                "primary_variable_a": "pressure",
                "primary_variable_b": "temperature"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = base();
        assert!(!config.decoupled);
        assert!(!config.dump_schur);
        assert!(config.debug_cells.is_empty());
        assert_eq!(config.refinement_sweeps, 0);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_required_key_fails_parse() {
        let result: Result<CoupledConfig, _> =
            serde_json::from_str(r#"{"conserved_quantity_a": "water_content"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut config = base();
        config.primary_variable_b = config.primary_variable_a.clone();
        assert!(config.validate().is_err());

        let mut config = base();
        config.conserved_quantity_b = config.conserved_quantity_a.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_arrays_must_have_equal_length() {
        let mut config = base();
        config.debug_cells = vec![0, 2];
        config.debug_ranks = vec![0];
        assert!(config.validate().is_err());

        config.debug_ranks = vec![0, 0];
        config.validate().unwrap();

        // 留空分区号合法
        config.debug_ranks.clear();
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut config = base();
        config.primary_variable_a.clear();
        assert!(matches!(
            config.validate(),
            Err(PfError::MissingConfig { .. })
        ));
    }
}
