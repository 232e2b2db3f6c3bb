// In src/runtime/frame.rs

use crate::analyzer::Expression;
use crate::parser::ast::Phrase;
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Context, Value};
use crate::system::System;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// 一个帧槽位的状态。
///
/// 模块和 `let` 的定义是惰性的：槽位先处于 `Pending`，第一次读取时求值。
/// 求值期间为 `Busy`，此时再次读取就是值层面的循环依赖。
#[derive(Debug, Clone, Default)]
pub enum Slot {
    #[default]
    Empty,
    Pending(Rc<Expression>),
    Busy,
    Ready(Value),
}

/// 活动记录：固定大小的槽位数组，加上词法父帧和调用者两条链。
///
/// - `parent` 是闭包链，强引用。帧从不引用自己的子帧，所以没有环。
/// - `caller` 只用于诊断，弱引用，避免被捕获的帧反过来拖住调用者。
pub struct Frame {
    slots: RefCell<Vec<Slot>>,
    pub parent: Option<Rc<Frame>>,
    pub caller: Option<Weak<Frame>>,
    /// 创建这个帧的调用表达式；模块帧、循环帧和根帧没有。
    pub call_phrase: Option<Rc<Phrase>>,
    /// 调用深度，用于 `StackOverflow` 检查
    pub depth: usize,
    pub system: Rc<System>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("nslots", &self.nslots())
            .field("depth", &self.depth)
            .field("call_phrase", &self.call_phrase.as_ref().map(|p| p.location.to_string()))
            .finish()
    }
}

impl Frame {
    fn with_slots(
        nslots: usize,
        parent: Option<Rc<Frame>>,
        caller: Option<&Rc<Frame>>,
        call_phrase: Option<Rc<Phrase>>,
        depth: usize,
        system: Rc<System>,
    ) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Slot::Empty; nslots]),
            parent,
            caller: caller.map(Rc::downgrade),
            call_phrase,
            depth,
            system,
        })
    }

    /// 程序的最外层帧。`caller` 不为空时，诊断会继续沿它的调用链展开。
    pub fn root(system: Rc<System>, nslots: usize, caller: Option<&Rc<Frame>>) -> Rc<Self> {
        let depth = caller.map_or(0, |c| c.depth);
        Self::with_slots(nslots, None, caller, None, depth, system)
    }

    /// 函数调用的帧。`env` 是闭包捕获的帧，`caller` 是发起调用的帧。
    pub fn call(
        nslots: usize,
        env: Rc<Frame>,
        caller: &Rc<Frame>,
        call_phrase: &Rc<Phrase>,
    ) -> Result<Rc<Self>, Exception> {
        let depth = caller.depth + 1;
        let limit = caller.system.config.max_call_depth;
        if depth > limit {
            return Err(Exception::new(
                ErrorKind::StackOverflow { limit },
                &Context::AtPhrase(call_phrase, Some(caller)),
            ));
        }
        Ok(Self::with_slots(
            nslots,
            Some(env),
            Some(caller),
            Some(call_phrase.clone()),
            depth,
            caller.system.clone(),
        ))
    }

    /// 模块字面量和 `for` 循环体使用的帧：词法父帧同时也是调用者。
    pub fn child(nslots: usize, parent: &Rc<Frame>) -> Rc<Self> {
        Self::with_slots(
            nslots,
            Some(parent.clone()),
            Some(parent),
            None,
            parent.depth,
            parent.system.clone(),
        )
    }

    pub fn nslots(&self) -> usize {
        self.slots.borrow().len()
    }

    /// 沿词法父链向上走 `depth` 步。
    pub fn ancestor(self: &Rc<Self>, depth: usize) -> Rc<Frame> {
        let mut frame = self.clone();
        for _ in 0..depth {
            frame = match &frame.parent {
                Some(parent) => parent.clone(),
                None => panic!("ICE: no ancestor frame at depth {}", depth),
            };
        }
        frame
    }

    pub fn set(&self, slot: usize, value: Value) {
        self.store(slot, Slot::Ready(value));
    }

    pub fn set_pending(&self, slot: usize, expr: Rc<Expression>) {
        self.store(slot, Slot::Pending(expr));
    }

    fn store(&self, slot: usize, state: Slot) {
        let mut slots = self.slots.borrow_mut();
        let nslots = slots.len();
        match slots.get_mut(slot) {
            Some(entry) => *entry = state,
            None => panic!("ICE: slot {} out of range (frame has {})", slot, nslots),
        }
    }

    /// 清空所有槽位，供反复调用同一个捕获帧的入口使用。
    pub fn reset(&self) {
        for entry in self.slots.borrow_mut().iter_mut() {
            *entry = Slot::Empty;
        }
    }

    /// 读取一个槽位；惰性定义在这里第一次求值。
    pub fn force(self: &Rc<Self>, slot: usize, cx: &Context) -> Result<Value, Exception> {
        let pending = {
            let mut slots = self.slots.borrow_mut();
            let nslots = slots.len();
            let Some(entry) = slots.get_mut(slot) else {
                panic!("ICE: slot {} out of range (frame has {})", slot, nslots);
            };
            match entry {
                Slot::Ready(value) => return Ok(value.clone()),
                Slot::Busy => return Err(Exception::new(ErrorKind::RecursiveDefinition, cx)),
                Slot::Empty => panic!("ICE: read of uninitialized slot {}", slot),
                Slot::Pending(expr) => {
                    let expr = expr.clone();
                    *entry = Slot::Busy;
                    expr
                }
            }
        };

        match pending.eval(self) {
            Ok(value) => {
                self.set(slot, value.clone());
                Ok(value)
            }
            Err(error) => {
                self.set_pending(slot, pending);
                Err(error)
            }
        }
    }
}
