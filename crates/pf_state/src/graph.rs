// crates/pf_state/src/graph.rs

//! 依赖图的连线检查与形状传播
//!
//! 评估器注册完毕后、首次求值之前，对每个根键调用
//! [`State::ensure_compatibility`]：
//!
//! - 自根向叶做一次深度优先遍历，沿途把几何形状向下游补齐
//!   （仅填补空缺，已有形状的节点不被覆盖）；
//! - 遍历路径上重逢同一键即报 [`PfError::CyclicDependency`]，
//!   错误信息携带完整环路径；
//! - 依赖若既无评估器也未被声明过，报 [`PfError::UnknownKey`]。
//!
//! 形状传播在无形状节点处自然停止，这不是错误：阈值平均等
//! 评估器自带输出形状，与上游几何无关。

use pf_foundation::{Key, PfError, PfResult};

use crate::field::FieldShape;
use crate::state::State;

impl State {
    /// 键 `key` 是否（经任意层级）依赖键 `wrt`
    ///
    /// 严格可达性：`depends_on(k, k)` 为假，除非 `k` 经环回到自身
    /// （该情形已被 [`State::ensure_compatibility`] 排除）。
    pub fn depends_on(&self, key: &str, wrt: &str) -> bool {
        let mut visited: Vec<Key> = Vec::new();
        self.depends_on_inner(key, wrt, &mut visited)
    }

    fn depends_on_inner(&self, key: &str, wrt: &str, visited: &mut Vec<Key>) -> bool {
        let Ok(eval) = self.get_evaluator(key) else {
            return false;
        };
        for dep in eval.dependencies() {
            if dep == wrt {
                return true;
            }
            if visited.iter().any(|v| v == dep) {
                continue;
            }
            visited.push(dep.clone());
            if self.depends_on_inner(dep, wrt, visited) {
                return true;
            }
        }
        false
    }

    /// 自根向叶验证依赖图并传播形状
    ///
    /// 幂等；对每个打算求值的根键调用一次。
    pub fn ensure_compatibility(&mut self, key: &str) -> PfResult<()> {
        let mut path: Vec<Key> = Vec::new();
        self.ensure_compatibility_inner(key, &mut path)
    }

    fn ensure_compatibility_inner(&mut self, key: &str, path: &mut Vec<Key>) -> PfResult<()> {
        if path.iter().any(|k| k == key) {
            let pos = path.iter().position(|k| k == key).unwrap_or(0);
            let mut cycle: Vec<&str> = path[pos..].iter().map(|k| k.as_str()).collect();
            cycle.push(key);
            return Err(PfError::cyclic(cycle.join(" -> ")));
        }

        if !self.has_evaluator(key) {
            // 无评估器的叶子：必须至少被声明过
            self.shape(key)?;
            return Ok(());
        }
        if self.tracker(key)?.borrow().compat_done {
            return Ok(());
        }

        let my_shape = self.shape(key)?.clone();
        let deps: Vec<Key> = self.get_evaluator(key)?.dependencies().to_vec();
        for dep in &deps {
            // 形状只填补空缺：依赖已有自己的几何时不覆盖
            let dep_unshaped = self.shape(dep).map(|s| s.is_empty()).unwrap_or(true);
            if dep_unshaped {
                let propagated = if my_shape.is_empty() {
                    FieldShape::new()
                } else {
                    my_shape.clone()
                };
                self.require_field(dep, key, &propagated)?;
            }

            path.push(key.to_string());
            let result = self.ensure_compatibility_inner(dep, path);
            path.pop();
            result?;
        }

        self.tracker(key)?.borrow_mut().compat_done = true;
        Ok(())
    }
}

// ============================================================
// 单元测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::FieldEvaluator;
    use crate::field::Field;

    /// 恒等传递节点，用于搭建测试图
    struct Relay {
        key: Key,
        deps: Vec<Key>,
    }

    impl Relay {
        fn boxed(key: &str, deps: &[&str]) -> Box<Self> {
            Box::new(Self {
                key: key.to_string(),
                deps: deps.iter().map(|d| d.to_string()).collect(),
            })
        }
    }

    impl FieldEvaluator for Relay {
        fn key(&self) -> &Key {
            &self.key
        }
        fn dependencies(&self) -> &[Key] {
            &self.deps
        }
        fn evaluate(&self, _state: &State, _output: &mut Field) -> PfResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_depends_on_transitive() {
        let mut state = State::new();
        state.register_primary("z", FieldShape::cell(2)).unwrap();
        state.register_evaluator(Relay::boxed("b", &["z"])).unwrap();
        state.register_evaluator(Relay::boxed("a", &["b"])).unwrap();

        assert!(state.depends_on("a", "b"));
        assert!(state.depends_on("a", "z"));
        assert!(!state.depends_on("z", "a"));
        assert!(!state.depends_on("a", "a"));
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        let mut state = State::new();
        state.register_evaluator(Relay::boxed("a", &["b"])).unwrap();
        state.register_evaluator(Relay::boxed("b", &["c"])).unwrap();
        state.register_evaluator(Relay::boxed("c", &["a"])).unwrap();

        let err = state.ensure_compatibility("a").unwrap_err();
        match err {
            PfError::CyclicDependency { cycle } => {
                assert_eq!(cycle, "a -> b -> c -> a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shape_propagates_downward() {
        let mut state = State::new();
        state.register_evaluator(Relay::boxed("b", &["z"])).unwrap();
        state
            .register_evaluator(Relay::boxed("a", &["b"]))
            .unwrap();
        // 根带形状，下游 b、z 均为空
        state
            .require_field("a", "test", &FieldShape::cell(3))
            .unwrap();

        state.ensure_compatibility("a").unwrap();
        assert_eq!(state.shape("b").unwrap(), &FieldShape::cell(3));
        assert_eq!(state.shape("z").unwrap(), &FieldShape::cell(3));
    }

    #[test]
    fn test_shaped_dependency_not_overwritten() {
        let mut state = State::new();
        state.register_primary("z", FieldShape::cell(7)).unwrap();
        state.register_evaluator(Relay::boxed("a", &["z"])).unwrap();
        state
            .require_field("a", "test", &FieldShape::cell(1))
            .unwrap();

        // 传播不覆盖 z 自带的形状，也不报错
        state.ensure_compatibility("a").unwrap();
        assert_eq!(state.shape("z").unwrap(), &FieldShape::cell(7));
    }

    #[test]
    fn test_unshaped_leaf_gets_placeholder() {
        let mut state = State::new();
        state
            .register_evaluator(Relay::boxed("a", &["bare"]))
            .unwrap();
        // 根无形状时传播在叶子处停止，但叶子仍被声明为空形状占位
        state.ensure_compatibility("a").unwrap();
        assert!(state.shape("bare").unwrap().is_empty());
    }

    #[test]
    fn test_ensure_compatibility_idempotent() {
        let mut state = State::new();
        state.register_primary("z", FieldShape::cell(2)).unwrap();
        state.register_evaluator(Relay::boxed("a", &["z"])).unwrap();
        state.ensure_compatibility("a").unwrap();
        state.ensure_compatibility("a").unwrap();
    }
}
