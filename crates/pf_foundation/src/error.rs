// crates/pf_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `PfError` 枚举和 `PfResult` 类型别名，用于整个项目的错误处理。
//!
//! # 设计原则
//!
//! 1. **层次化**: 基础层只定义核心错误分类，求解器相关错误在 pf_solver 中复用同一枚举
//! 2. **易用性**: 提供便捷的构造方法
//! 3. **不静默**: 任何错误都不在核心内部被吞掉；唯一的非错误特例是
//!    空集合归约（阈值平均在空子集上返回 0.0）
//!
//! # 示例
//!
//! ```
//! use pf_foundation::error::{PfError, PfResult};
//!
//! fn read_config() -> PfResult<()> {
//!     Err(PfError::config("缺少耦合场名称"))
//! }
//! ```

use thiserror::Error;

/// 统一结果类型
pub type PfResult<T> = Result<T, PfError>;

/// PermaFlow 错误类型
///
/// 覆盖配置、图连线、导数能力与预条件器装配四类失败，
/// 全部向直接调用者传播，由外层求解器决定恢复策略。
#[derive(Error, Debug)]
pub enum PfError {
    // ========================================================================
    // 配置相关错误（setup 阶段，致命，不重试）
    // ========================================================================
    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 缺少配置项
    #[error("缺少必需的配置项: {key}")]
    MissingConfig {
        /// 配置键名
        key: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    // ========================================================================
    // 图连线错误
    // ========================================================================
    /// 未注册的键
    #[error("未注册的键: {key}")]
    UnknownKey {
        /// 被读取的键名
        key: String,
    },

    /// 依赖图存在环
    #[error("依赖图存在环: {cycle}")]
    CyclicDependency {
        /// 环路径，形如 "a -> b -> a"
        cycle: String,
    },

    /// 场形状不兼容
    #[error("场 {key} 形状不兼容: 已声明 {declared}, 新请求 {requested} (请求方: {owner})")]
    ShapeMismatch {
        /// 场键名
        key: String,
        /// 已声明的形状描述
        declared: String,
        /// 新请求的形状描述
        requested: String,
        /// 发起新请求的所有者
        owner: String,
    },

    /// 输出场已被其他评估器占用
    #[error("场 {key} 已由评估器占用，不允许两个评估器声明同一输出")]
    DuplicateEvaluator {
        /// 冲突的输出键
        key: String,
    },

    // ========================================================================
    // 求值与导数错误
    // ========================================================================
    /// 能力未实现（导数路径等），调用方不得以零替代
    #[error("评估器 {evaluator} 不支持对 {wrt} 的导数")]
    NotImplemented {
        /// 评估器输出键
        evaluator: String,
        /// 请求导数的自变量键
        wrt: String,
    },

    /// 幽灵值未交换即被读取
    #[error("场 {key} 分量 {component} 的幽灵值未交换，禁止读取")]
    GhostsStale {
        /// 场键名
        key: String,
        /// 分量名
        component: String,
    },

    // ========================================================================
    // 预条件器装配错误
    // ========================================================================
    /// 耦合算子奇异或不定（近零主元）
    #[error("预条件器装配失败: {message} (单元 {cell})")]
    PreconditionerAssembly {
        /// 失败描述
        message: String,
        /// 出问题的单元号
        cell: usize,
    },

    // ========================================================================
    // 通用错误
    // ========================================================================
    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl PfError {
    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 缺少配置
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfig { key: key.into() }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 未注册的键
    pub fn unknown_key(key: impl Into<String>) -> Self {
        Self::UnknownKey { key: key.into() }
    }

    /// 依赖环
    pub fn cyclic(cycle: impl Into<String>) -> Self {
        Self::CyclicDependency {
            cycle: cycle.into(),
        }
    }

    /// 能力未实现
    pub fn not_implemented(evaluator: impl Into<String>, wrt: impl Into<String>) -> Self {
        Self::NotImplemented {
            evaluator: evaluator.into(),
            wrt: wrt.into(),
        }
    }

    /// 幽灵值未交换
    pub fn ghosts_stale(key: impl Into<String>, component: impl Into<String>) -> Self {
        Self::GhostsStale {
            key: key.into(),
            component: component.into(),
        }
    }

    /// 预条件器装配失败
    pub fn precon_assembly(message: impl Into<String>, cell: usize) -> Self {
        Self::PreconditionerAssembly {
            message: message.into(),
            cell,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl PfError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> PfResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }
}

/// 条件检查宏：条件不满足时返回给定错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PfError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_unknown_key_context() {
        let err = PfError::unknown_key("saturation_liquid");
        assert!(err.to_string().contains("saturation_liquid"));
    }

    #[test]
    fn test_cyclic_dependency_path() {
        let err = PfError::cyclic("a -> b -> a");
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_precon_assembly_cell() {
        let err = PfError::precon_assembly("Schur 主元近零", 7);
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn test_check_size() {
        assert!(PfError::check_size("test", 10, 10).is_ok());
        assert!(PfError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_ensure_macro() {
        fn check(value: i32) -> PfResult<()> {
            ensure!(value > 0, PfError::config("value must be positive"));
            Ok(())
        }

        assert!(check(1).is_ok());
        assert!(check(-1).is_err());
    }
}
