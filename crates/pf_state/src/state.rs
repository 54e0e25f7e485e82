// crates/pf_state/src/state.rs

//! 状态注册表与惰性重算调度
//!
//! [`State`] 是场、形状与评估器的中心注册表，同时承担备忘录化的
//! 重算调度：消费者不直接触发计算，而是向调度器询问
//! "自我上次观察以来该场是否变化"（[`State::has_field_changed`]），
//! 调度器按需递归上游并保证每次上游变化至多重算一次。
//!
//! # 变化判定规则
//!
//! 对键 `k` 与消费者 `c`：
//!
//! 1. 递归询问 `k` 的所有依赖（以 `k` 自身为请求者）；
//! 2. 若任一依赖变化，或 `k` 尚未处于 [`Lifecycle::Fresh`]，
//!    则重算 `k`、清空请求集合、记入 `c`，返回 `true`；
//! 3. 否则按请求集合的"首问为真"语义返回：`c` 不在集合中时
//!    记入并返回 `true`，已在集合中返回 `false`。
//!
//! 主变量与二次变量共用同一条规则：主变量被
//! [`State::set_primary`] 写入后转入 [`Lifecycle::Stale`]，
//! 下一次询问即触发"变化"分支（重算是空操作，值已就位）。
//!
//! # 前置条件
//!
//! 调度递归不做环检测；依赖图必须先经
//! [`State::ensure_compatibility`](crate::State::ensure_compatibility)
//! 验证无环，环在那里以 [`PfError::CyclicDependency`] 报出。

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use pf_foundation::{Key, PfError, PfResult};

use crate::evaluator::{ConsumerToken, FieldEvaluator, Lifecycle, PrimaryVariable};
use crate::field::{Field, FieldShape};

/// 场的共享句柄
///
/// 形状升级在原位替换场内容，已发出的句柄保持有效。
pub type FieldHandle = Rc<RefCell<Field>>;

// ============================================================
// 跟踪器
// ============================================================

/// 单个导数场的备忘录
#[derive(Debug, Default)]
pub(crate) struct DerivTracker {
    /// 导数场是否已物化且与当前值一致
    pub(crate) computed: bool,
    /// 已观察到当前导数的消费者集合
    pub(crate) requests: HashSet<ConsumerToken>,
}

/// 评估器节点的调度跟踪器
#[derive(Debug)]
pub(crate) struct Tracker {
    /// 节点自身作为请求者的令牌
    pub(crate) token: ConsumerToken,
    pub(crate) lifecycle: Lifecycle,
    /// 已观察到当前值的消费者集合
    pub(crate) requests: HashSet<ConsumerToken>,
    /// 按自变量键索引的导数备忘录
    pub(crate) derivs: HashMap<Key, DerivTracker>,
    /// 兼容性传播是否已完成（幂等标记）
    pub(crate) compat_done: bool,
}

impl Tracker {
    fn new(token: ConsumerToken) -> Self {
        Self {
            token,
            lifecycle: Lifecycle::NeverEvaluated,
            requests: HashSet::new(),
            derivs: HashMap::new(),
            compat_done: false,
        }
    }
}

// ============================================================
// State
// ============================================================

/// 场、评估器与调度状态的中心注册表
#[derive(Default)]
pub struct State {
    /// 值场，按键索引（含空形状占位）
    fields: HashMap<Key, FieldHandle>,
    /// 已声明的形状
    shapes: HashMap<Key, FieldShape>,
    /// 首个声明非空形状的所有者，用于冲突报错
    owners: HashMap<Key, String>,
    /// 评估器，按输出键索引（每键至多一个）
    evaluators: HashMap<Key, Box<dyn FieldEvaluator>>,
    /// 调度跟踪器，与 evaluators 键集合一致
    pub(crate) trackers: HashMap<Key, RefCell<Tracker>>,
    /// 惰性物化的导数场（键为 `d<of>_d<wrt>`）
    pub(crate) deriv_fields: RefCell<HashMap<Key, FieldHandle>>,
    /// 已发放令牌的消费者名单（序号即令牌）
    consumers: RefCell<Vec<String>>,
}

impl State {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    // --------------------------------------------------------
    // 注册
    // --------------------------------------------------------

    /// 发放一个消费者令牌
    ///
    /// 评估器在注册时自动获得自身令牌；外部消费者
    /// （预条件器装配器、时间积分器等）显式登记。
    pub fn register_consumer(&self, name: impl Into<String>) -> ConsumerToken {
        let mut consumers = self.consumers.borrow_mut();
        let token = ConsumerToken(consumers.len() as u32);
        consumers.push(name.into());
        token
    }

    /// 声明（或合并声明）一个场
    ///
    /// 幂等：
    /// - 键不存在时登记形状并分配零初始化的场；
    /// - 已有空形状、新形状非空时原位升级；
    /// - 两者均非空且兼容时保持现状；
    /// - 不兼容时报 [`PfError::ShapeMismatch`]，指明先前所有者。
    pub fn require_field(
        &mut self,
        key: &str,
        owner: &str,
        shape: &FieldShape,
    ) -> PfResult<FieldHandle> {
        if let Some(existing) = self.shapes.get(key) {
            let handle = self
                .fields
                .get(key)
                .cloned()
                .ok_or_else(|| PfError::internal(format!("场 {key} 有形状但无数据")))?;
            if existing.is_empty() && !shape.is_empty() {
                // 原位升级，已发出的句柄跟随新形状
                *handle.borrow_mut() = Field::new(key, shape.clone());
                self.shapes.insert(key.to_string(), shape.clone());
                self.owners.insert(key.to_string(), owner.to_string());
            } else if !shape.is_empty() && !existing.compatible(shape) {
                return Err(PfError::ShapeMismatch {
                    key: key.to_string(),
                    declared: existing.describe(),
                    requested: shape.describe(),
                    owner: self
                        .owners
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| owner.to_string()),
                });
            }
            return Ok(handle);
        }

        let handle: FieldHandle = Rc::new(RefCell::new(Field::new(key, shape.clone())));
        self.fields.insert(key.to_string(), Rc::clone(&handle));
        self.shapes.insert(key.to_string(), shape.clone());
        self.owners.insert(key.to_string(), owner.to_string());
        Ok(handle)
    }

    /// 注册一个评估器，输出键唯一
    pub fn register_evaluator(&mut self, evaluator: Box<dyn FieldEvaluator>) -> PfResult<()> {
        let key = evaluator.key().clone();
        if self.evaluators.contains_key(&key) {
            return Err(PfError::DuplicateEvaluator { key });
        }
        let shape = evaluator.shape_hint().unwrap_or_default();
        self.require_field(&key, &key, &shape)?;

        let token = self.register_consumer(&key);
        self.trackers
            .insert(key.clone(), RefCell::new(Tracker::new(token)));
        self.evaluators.insert(key, evaluator);
        Ok(())
    }

    /// 便捷注册一个主变量
    pub fn register_primary(&mut self, key: impl Into<Key>, shape: FieldShape) -> PfResult<()> {
        self.register_evaluator(Box::new(PrimaryVariable::new(key, shape)))
    }

    // --------------------------------------------------------
    // 访问
    // --------------------------------------------------------

    /// 按键取场数据（值场或已物化的导数场）
    pub fn get_data(&self, key: &str) -> PfResult<FieldHandle> {
        if let Some(handle) = self.fields.get(key) {
            return Ok(Rc::clone(handle));
        }
        if let Some(handle) = self.deriv_fields.borrow().get(key) {
            return Ok(Rc::clone(handle));
        }
        Err(PfError::unknown_key(key))
    }

    /// 按输出键取评估器
    pub fn get_evaluator(&self, key: &str) -> PfResult<&dyn FieldEvaluator> {
        self.evaluators
            .get(key)
            .map(|e| e.as_ref())
            .ok_or_else(|| PfError::unknown_key(key))
    }

    /// 键是否挂有评估器
    pub fn has_evaluator(&self, key: &str) -> bool {
        self.evaluators.contains_key(key)
    }

    /// 场的已声明形状
    pub fn shape(&self, key: &str) -> PfResult<&FieldShape> {
        self.shapes.get(key).ok_or_else(|| PfError::unknown_key(key))
    }

    pub(crate) fn tracker(&self, key: &str) -> PfResult<&RefCell<Tracker>> {
        self.trackers.get(key).ok_or_else(|| {
            PfError::internal(format!("键 {key} 有评估器但无跟踪器"))
        })
    }

    // --------------------------------------------------------
    // 主变量写入
    // --------------------------------------------------------

    /// 时间积分器写入主变量的新值
    ///
    /// 只接受主变量键；写入后节点转入 [`Lifecycle::Stale`]，
    /// 全部下游在下一次询问时观察到变化。
    pub fn set_primary(&self, key: &str, component: &str, values: &[f64]) -> PfResult<()> {
        let eval = self.get_evaluator(key)?;
        if !eval.is_primary() {
            return Err(PfError::config(format!(
                "键 {key} 不是主变量，禁止外部写入"
            )));
        }
        let n_owned = self
            .shape(key)?
            .component(component)
            .map(|c| c.n_owned)
            .ok_or_else(|| {
                PfError::internal(format!("场 {key} 没有分量 {component}"))
            })?;
        PfError::check_size("primary values", n_owned, values.len())?;

        let handle = self.get_data(key)?;
        let mut field = handle.borrow_mut();
        field.component_mut(component)?[..n_owned].copy_from_slice(values);
        drop(field);

        self.tracker(key)?.borrow_mut().lifecycle = Lifecycle::Stale;
        Ok(())
    }

    // --------------------------------------------------------
    // 备忘录化重算
    // --------------------------------------------------------

    /// 询问键 `key` 自消费者 `consumer` 上次观察以来是否变化
    ///
    /// 必要时递归重算上游。见模块文档的判定规则。
    pub fn has_field_changed(&self, key: &str, consumer: ConsumerToken) -> PfResult<bool> {
        let Some(eval) = self.evaluators.get(key) else {
            // 无评估器的场是静态外部数据：存在即视为不变。
            // 需要变化传播的外部量应注册为主变量。
            self.get_data(key)?;
            return Ok(false);
        };
        let my_token = self.tracker(key)?.borrow().token;

        // 先问上游（以自身为请求者）
        let deps: Vec<Key> = eval.dependencies().to_vec();
        let mut dep_changed = false;
        for dep in &deps {
            if self.has_field_changed(dep, my_token)? {
                dep_changed = true;
            }
        }

        let lifecycle = self.tracker(key)?.borrow().lifecycle;
        if dep_changed || lifecycle != Lifecycle::Fresh {
            if !eval.is_primary() {
                log::trace!("重算场 {key}");
                let handle = self.get_data(key)?;
                let mut output = handle.borrow_mut();
                eval.evaluate(self, &mut output)?;
            }
            let mut tracker = self.tracker(key)?.borrow_mut();
            tracker.lifecycle = Lifecycle::Fresh;
            tracker.requests.clear();
            tracker.requests.insert(consumer);
            // 值已更新，所有缓存导数随之失效
            for deriv in tracker.derivs.values_mut() {
                deriv.computed = false;
                deriv.requests.clear();
            }
            Ok(true)
        } else {
            Ok(self.tracker(key)?.borrow_mut().requests.insert(consumer))
        }
    }
}

// ============================================================
// 单元测试
// ============================================================
