// crates/pf_state/src/derivative.rs

//! 链式法则导数传播
//!
//! 导数场 `d<of>_d<wrt>` 采用与值场相同的备忘录协议，由
//! [`State::has_field_derivative_changed`] 按需物化：
//!
//! ```text
//! ∂out/∂wrt = Σ_dep  ∂out/∂dep · ∂dep/∂wrt
//! ```
//!
//! 其中直接项（`dep == wrt`）直接取评估器的解析偏导；
//! 传递项递归物化 `∂dep/∂wrt` 后与解析偏导逐实体相乘累加。
//! 不依赖 `wrt` 的键得到显式的零场（合法结果，并非错误）；
//! 评估器未声明的直接偏导报 [`PfError::NotImplemented`]，
//! 调用方不得以零替代。
//!
//! 导数失效规则：键的值一旦重算，其全部缓存导数随之失效
//! （见 [`State::has_field_changed`]）。

use std::rc::Rc;

use pf_foundation::{derivative_key, Key, PfError, PfResult};

use crate::evaluator::ConsumerToken;
use crate::field::{Field, FieldShape};
use crate::state::{FieldHandle, State};

impl State {
    /// 询问导数场 `d<key>_d<wrt>` 自消费者 `consumer` 上次观察以来是否变化
    ///
    /// 必要时递归物化上游导数。值层面的变化同样驱动导数重算。
    pub fn has_field_derivative_changed(
        &self,
        key: &str,
        consumer: ConsumerToken,
        wrt: &str,
    ) -> PfResult<bool> {
        let eval = self.get_evaluator(key)?;
        let my_token = self.tracker(key)?.borrow().token;
        let deps: Vec<Key> = eval.dependencies().to_vec();

        // 先刷新自身值（递归刷新依赖）。值与导数共用自身令牌，
        // 绕过这一步会吞掉上游的变化信号，令值永久陈旧
        let mut update = self.has_field_changed(key, my_token)?;
        // 上游导数的变化沿链传播
        for dep in &deps {
            if dep == wrt {
                continue;
            }
            if self.depends_on(dep, wrt)
                && self.has_field_derivative_changed(dep, my_token, wrt)?
            {
                update = true;
            }
        }

        let computed = self
            .tracker(key)?
            .borrow()
            .derivs
            .get(wrt)
            .map(|d| d.computed)
            .unwrap_or(false);

        if update || !computed {
            log::trace!("物化导数场 d{key}_d{wrt}");
            self.update_field_derivative(key, wrt)?;
            let mut tracker = self.tracker(key)?.borrow_mut();
            let deriv = tracker.derivs.entry(wrt.to_string()).or_default();
            deriv.computed = true;
            deriv.requests.clear();
            deriv.requests.insert(consumer);
            Ok(true)
        } else {
            let mut tracker = self.tracker(key)?.borrow_mut();
            let deriv = tracker.derivs.entry(wrt.to_string()).or_default();
            Ok(deriv.requests.insert(consumer))
        }
    }

    /// 取（或创建）导数场的句柄，形状跟随被导键的值场
    fn deriv_handle(&self, dkey: &str, shape: &FieldShape) -> FieldHandle {
        let mut map = self.deriv_fields.borrow_mut();
        if let Some(handle) = map.get(dkey) {
            return Rc::clone(handle);
        }
        let handle: FieldHandle =
            Rc::new(std::cell::RefCell::new(Field::new(dkey, shape.clone())));
        map.insert(dkey.to_string(), Rc::clone(&handle));
        handle
    }

    /// 重算导数场 `d<key>_d<wrt>` 的内容
    fn update_field_derivative(&self, key: &str, wrt: &str) -> PfResult<()> {
        let dkey = derivative_key(key, wrt);
        let shape = self.shape(key)?.clone();
        let handle = self.deriv_handle(&dkey, &shape);
        let mut out = handle.borrow_mut();
        if !out.shape().compatible(&shape) {
            // 值场形状在物化之后升级过，导数场跟随重建
            *out = Field::new(&dkey, shape.clone());
        }
        out.fill(0.0);

        if key == wrt {
            // 对自身的导数是单位
            let names: Vec<String> = shape.components().iter().map(|c| c.name.clone()).collect();
            for comp in &names {
                out.component_mut(comp)?.fill(1.0);
            }
            return Ok(());
        }
        if !self.depends_on(key, wrt) {
            // 无依赖路径：零场是合法结果
            return Ok(());
        }

        let eval = self.get_evaluator(key)?;
        let my_token = self.tracker(key)?.borrow().token;
        let deps: Vec<Key> = eval.dependencies().to_vec();
        let declared: Vec<Key> = eval.derivative_dependencies().to_vec();

        for dep in &deps {
            let direct = dep == wrt;
            let transitive = !direct && self.depends_on(dep, wrt);
            if !direct && !transitive {
                continue;
            }
            // 偏导能力缺失必须浮出
            if !declared.iter().any(|d| d == dep) {
                return Err(PfError::not_implemented(key, dep.clone()));
            }

            let mut partial = Field::new(format!("{dkey}~{dep}"), shape.clone());
            self.get_evaluator(key)?
                .evaluate_derivative(self, dep, &mut partial)?;

            if direct {
                accumulate(&mut out, &partial)?;
            } else {
                // 先物化 ∂dep/∂wrt，再逐实体相乘累加
                self.has_field_derivative_changed(dep, my_token, wrt)?;
                let inner = self.get_data(&derivative_key(dep, wrt))?;
                let inner = inner.borrow();
                accumulate_product(&mut out, &partial, &inner)?;
            }
        }
        Ok(())
    }
}

/// `out += a`，逐分量本地段
fn accumulate(out: &mut Field, a: &Field) -> PfResult<()> {
    let comps: Vec<(String, usize)> = out
        .shape()
        .components()
        .iter()
        .map(|c| (c.name.clone(), c.n_owned))
        .collect();
    for (comp, n_owned) in &comps {
        let src = a.component(comp)?.to_vec();
        PfError::check_size("derivative term", *n_owned, src.len())?;
        let dst = out.component_mut(comp)?;
        for i in 0..*n_owned {
            dst[i] += src[i];
        }
    }
    Ok(())
}

/// `out += a ⊙ b`，逐分量逐实体相乘累加
fn accumulate_product(out: &mut Field, a: &Field, b: &Field) -> PfResult<()> {
    let comps: Vec<(String, usize)> = out
        .shape()
        .components()
        .iter()
        .map(|c| (c.name.clone(), c.n_owned))
        .collect();
    for (comp, n_owned) in &comps {
        let lhs = a.component(comp)?.to_vec();
        let rhs = b.component(comp)?.to_vec();
        PfError::check_size("derivative chain term", *n_owned, lhs.len())?;
        PfError::check_size("derivative chain term", *n_owned, rhs.len())?;
        let dst = out.component_mut(comp)?;
        for i in 0..*n_owned {
            dst[i] += lhs[i] * rhs[i];
        }
    }
    Ok(())
}

// ============================================================
// 单元测试
// ============================================================
