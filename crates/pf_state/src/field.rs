// crates/pf_state/src/field.rs

//! 场容器
//!
//! [`Field`] 是分布在网格实体组（如单元、面）上的命名数值容器，
//! 采用 SoA 布局：每个分量一条稠密 `Vec<f64>`，按局部实体号索引。
//!
//! # 布局设计
//!
//! ```text
//! "cell": [v_0, v_1, ..., v_{n_owned-1} | g_0, ..., g_{n_ghost-1}]
//! "face": [v_0, v_1, ...                | ...                    ]
//! ```
//!
//! 每条分量分为本地段（owned）与幽灵段（ghost）。幽灵段由外部的
//! 集合通信协作者在求值前交换；写入分量会使幽灵段失效，
//! 未交换的幽灵值一律不允许被读取（返回 [`PfError::GhostsStale`]），
//! 而不是静默读到陈旧数据。
//!
//! 分量维度在构造时固定；值只能由拥有该场的评估器在其更新调用中修改。

use pf_foundation::{Key, PfError, PfResult};
use serde::{Deserialize, Serialize};

// ============================================================
// 形状
// ============================================================

/// 单个分量的形状
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentShape {
    /// 分量名（如 "cell", "face"）
    pub name: String,
    /// 本地实体数
    pub n_owned: usize,
    /// 幽灵实体数
    pub n_ghost: usize,
}

/// 场形状：有序的命名分量集合
///
/// 兼容性比较与顺序无关，只看分量名与尺寸。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldShape {
    components: Vec<ComponentShape>,
}

impl FieldShape {
    /// 空形状（尚无几何信息的中间节点）
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个分量
    pub fn with_component(mut self, name: impl Into<String>, n_owned: usize, n_ghost: usize) -> Self {
        self.components.push(ComponentShape {
            name: name.into(),
            n_owned,
            n_ghost,
        });
        self
    }

    /// 便捷构造：仅含 "cell" 分量
    pub fn cell(n_cells: usize) -> Self {
        Self::new().with_component("cell", n_cells, 0)
    }

    /// 便捷构造："cell" + "face" 分量
    pub fn cell_face(n_cells: usize, n_faces: usize) -> Self {
        Self::new()
            .with_component("cell", n_cells, 0)
            .with_component("face", n_faces, 0)
    }

    /// 分量列表
    pub fn components(&self) -> &[ComponentShape] {
        &self.components
    }

    /// 是否尚无任何分量
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// 按名查找分量
    pub fn component(&self, name: &str) -> Option<&ComponentShape> {
        self.components.iter().find(|c| c.name == name)
    }

    /// 形状兼容性：分量名集合与各自尺寸一致（与声明顺序无关）
    pub fn compatible(&self, other: &FieldShape) -> bool {
        if self.components.len() != other.components.len() {
            return false;
        }
        self.components.iter().all(|c| {
            other
                .component(&c.name)
                .is_some_and(|o| o.n_owned == c.n_owned && o.n_ghost == c.n_ghost)
        })
    }

    /// 形状描述，用于错误信息
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "<empty>".to_string();
        }
        self.components
            .iter()
            .map(|c| format!("{}[{}+{}]", c.name, c.n_owned, c.n_ghost))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ============================================================
// 场
// ============================================================

/// 命名数值场（SoA 布局）
#[derive(Debug, Clone)]
pub struct Field {
    key: Key,
    shape: FieldShape,
    /// 与 shape.components 一一对应，长度 n_owned + n_ghost
    data: Vec<Vec<f64>>,
    /// 各分量幽灵段是否已交换
    ghosts_valid: Vec<bool>,
}

impl Field {
    /// 按形状创建零初始化的场
    pub fn new(key: impl Into<Key>, shape: FieldShape) -> Self {
        let data = shape
            .components()
            .iter()
            .map(|c| vec![0.0; c.n_owned + c.n_ghost])
            .collect();
        // 无幽灵段的分量视为恒有效
        let ghosts_valid = shape.components().iter().map(|c| c.n_ghost == 0).collect();
        Self {
            key: key.into(),
            shape,
            data,
            ghosts_valid,
        }
    }

    /// 场键名
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 场形状
    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    fn index_of(&self, component: &str) -> PfResult<usize> {
        self.shape
            .components()
            .iter()
            .position(|c| c.name == component)
            .ok_or_else(|| {
                PfError::internal(format!("场 {} 没有分量 {}", self.key, component))
            })
    }

    /// 只读访问分量的本地段
    pub fn component(&self, component: &str) -> PfResult<&[f64]> {
        let idx = self.index_of(component)?;
        let n_owned = self.shape.components()[idx].n_owned;
        Ok(&self.data[idx][..n_owned])
    }

    /// 只读访问分量全长（含幽灵段）
    ///
    /// 幽灵段自上次写入后未交换时返回 [`PfError::GhostsStale`]。
    pub fn component_full(&self, component: &str) -> PfResult<&[f64]> {
        let idx = self.index_of(component)?;
        if !self.ghosts_valid[idx] {
            return Err(PfError::ghosts_stale(self.key.clone(), component));
        }
        Ok(&self.data[idx])
    }

    /// 可变访问分量全长
    ///
    /// 仅限拥有该场的评估器在更新调用中使用；写入后幽灵段失效，
    /// 等待外部集合通信重新交换。
    pub fn component_mut(&mut self, component: &str) -> PfResult<&mut [f64]> {
        let idx = self.index_of(component)?;
        if self.shape.components()[idx].n_ghost > 0 {
            self.ghosts_valid[idx] = false;
        }
        Ok(&mut self.data[idx])
    }

    /// 外部通信协作者完成幽灵交换后调用
    pub fn mark_ghosts_exchanged(&mut self, component: &str) -> PfResult<()> {
        let idx = self.index_of(component)?;
        self.ghosts_valid[idx] = true;
        Ok(())
    }

    /// 全场置零
    pub fn fill(&mut self, value: f64) {
        for comp in &mut self.data {
            comp.fill(value);
        }
    }
}

// ============================================================
// 单元测试
// ============================================================
