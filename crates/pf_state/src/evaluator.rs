// crates/pf_state/src/evaluator.rs

//! 评估器协议
//!
//! 评估器是依赖图的节点，从声明的依赖键计算一个输出场。
//! 变体在配置期通过字符串标签选择，运行期是封闭的能力接口：
//! `{dependencies(), evaluate(), evaluate_derivative()[可选]}`。
//!
//! # 变体
//!
//! - [`PrimaryVariable`]: 叶子节点，包裹时间积分的未知量；
//!   只有外层时间积分器通过 [`State::set_primary`](crate::State::set_primary)
//!   写入时才视为变化。
//! - 二次变量评估器（见 [`evaluators`](crate::evaluators) 模块）：
//!   从依赖场计算派生量，可选地暴露对依赖的解析偏导数。

use crate::field::{Field, FieldShape};
use crate::state::State;
use pf_foundation::{Key, PfError, PfResult};

// ============================================================
// 消费者令牌与生命周期
// ============================================================

/// 请求令牌：每个消费者一个，单调递增发放
///
/// 用于判定"该消费者上次观察之后输出是否变化"，
/// 避免每次读取都强制全局重算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerToken(pub(crate) u32);

impl ConsumerToken {
    /// 令牌序号
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// 评估器生命周期状态
///
/// 显式替代"首次更新强制重算"的布尔旗标：
/// `NeverEvaluated` 的节点在首个请求到来时必然重算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// 从未求值
    #[default]
    NeverEvaluated,
    /// 值已过期（主变量被外部写入后）
    Stale,
    /// 值是最新的
    Fresh,
}

// ============================================================
// 评估器 trait
// ============================================================

/// 场评估器能力接口
///
/// 实现者必须是纯函数式的：求值时只读除自身输出外的所有场，
/// 只写自身声明的输出场。单元内逐实体的计算天然并行。
///
/// 每个评估器恰好声明一个输出键；多输出量建模为共享依赖的
/// 兄弟评估器。
pub trait FieldEvaluator {
    /// 输出场键
    fn key(&self) -> &Key;

    /// 依赖键集合（无重复，顺序无关）
    fn dependencies(&self) -> &[Key];

    /// 可请求导数的依赖子集
    ///
    /// 不在此列表中的直接依赖被请求导数时，返回
    /// [`PfError::NotImplemented`]，调用方不得以零替代。
    fn derivative_dependencies(&self) -> &[Key] {
        &[]
    }

    /// 输出场的形状提示（若评估器自身决定输出几何）
    ///
    /// 返回 `None` 时形状由兼容性传播自上游确定。
    fn shape_hint(&self) -> Option<FieldShape> {
        None
    }

    /// 是否为主变量叶子节点
    fn is_primary(&self) -> bool {
        false
    }

    /// 计算输出场
    ///
    /// 调度器只在上游依赖变化（或首次请求）时调用，
    /// 保证每次上游变化至多重算一次。
    fn evaluate(&self, state: &State, output: &mut Field) -> PfResult<()>;

    /// 计算输出对**直接**依赖 `wrt` 的偏导数
    ///
    /// 缺省实现显式拒绝：导数能力缺失必须浮出，不得静默为零。
    fn evaluate_derivative(&self, state: &State, wrt: &str, output: &mut Field) -> PfResult<()> {
        let _ = (state, output);
        Err(PfError::not_implemented(self.key().clone(), wrt))
    }
}

// ============================================================
// 主变量评估器
// ============================================================

/// 主变量：时间积分未知量的叶子包装
///
/// 没有依赖；除外层时间积分器写入外从不重算。
#[derive(Debug)]
pub struct PrimaryVariable {
    key: Key,
    shape: FieldShape,
}

impl PrimaryVariable {
    /// 创建主变量评估器
    pub fn new(key: impl Into<Key>, shape: FieldShape) -> Self {
        Self {
            key: key.into(),
            shape,
        }
    }
}

impl FieldEvaluator for PrimaryVariable {
    fn key(&self) -> &Key {
        &self.key
    }

    fn dependencies(&self) -> &[Key] {
        &[]
    }

    fn shape_hint(&self) -> Option<FieldShape> {
        Some(self.shape.clone())
    }

    fn is_primary(&self) -> bool {
        true
    }

    fn evaluate(&self, _state: &State, _output: &mut Field) -> PfResult<()> {
        // 值由外层积分器通过 State::set_primary 写入，这里无事可做
        Ok(())
    }
}
