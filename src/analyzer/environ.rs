// In src/analyzer/environ.rs

//! 编译期的作用域链。只在分析期间存在，每个 Environ 借用它的外层作用域。

use crate::analyzer::{ExprKind, Expression, analyze_expr};
use crate::parser::ast::{Identifier, Phrase};
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Context, Frame};
use crate::system::Namespace;
use crate::utils::{Atom, AtomMap};
use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;
use tracing::debug;

/// 模块作用域的定义来源：名字到未分析的定义体。
pub trait DefinitionSource {
    /// 全部名字，按定义顺序。
    fn names(&self) -> Vec<Atom>;
    /// 取出一个定义体。每个名字在一次分析中最多被请求一次。
    fn definiens(&self, name: Atom) -> Option<Rc<Phrase>>;
}

impl DefinitionSource for AtomMap<Rc<Phrase>> {
    fn names(&self) -> Vec<Atom> {
        self.keys().copied().collect()
    }

    fn definiens(&self, name: Atom) -> Option<Rc<Phrase>> {
        self.get(&name).cloned()
    }
}

#[derive(Debug)]
enum DefState {
    Unanalyzed,
    /// 正在分析：再次查到这里说明是词法上的递归引用，直接返回槽位
    Analyzing,
    Analyzed(Rc<Expression>),
}

pub struct ModuleScope<'a> {
    source: &'a dyn DefinitionSource,
    slots: AtomMap<usize>,
    states: RefCell<Vec<DefState>>,
}

/// 作用域的种类。种类集合是封闭的。
pub enum ScopeKind<'a> {
    /// 内建名字：解析为常量
    Builtin(&'a Namespace),
    /// 可以相互递归的一组定义（模块字面量或 `let`）
    Module(ModuleScope<'a>),
    /// 函数参数或循环变量
    Parameters(AtomMap<usize>),
}

pub struct Environ<'a> {
    parent: Option<&'a Environ<'a>>,
    kind: ScopeKind<'a>,
    /// 这个作用域是否开始一个新的帧。`let` 与外层共享帧。
    new_frame: bool,
    /// 只在帧的拥有者上有意义：整个帧已分配的槽位数
    frame_maxslots: Cell<usize>,
    /// 仅根作用域：编译时传入的外层运行帧，用于诊断
    frame: Option<&'a Rc<Frame>>,
}

impl<'a> Environ<'a> {
    pub fn builtin(names: &'a Namespace, frame: Option<&'a Rc<Frame>>) -> Self {
        Self {
            parent: None,
            kind: ScopeKind::Builtin(names),
            new_frame: true,
            frame_maxslots: Cell::new(0),
            frame,
        }
    }

    /// 模块字面量的作用域，开始一个新帧。
    pub fn module(parent: &'a Environ<'a>, source: &'a dyn DefinitionSource) -> Self {
        Self::definitions_scope(parent, source, true)
    }

    /// `let` 的作用域。槽位从外层帧当前的最高水位开始分配，从不复用，
    /// 闭包捕获的是整个帧。
    pub fn let_scope(parent: &'a Environ<'a>, source: &'a dyn DefinitionSource) -> Self {
        Self::definitions_scope(parent, source, false)
    }

    fn definitions_scope(
        parent: &'a Environ<'a>,
        source: &'a dyn DefinitionSource,
        new_frame: bool,
    ) -> Self {
        let names = source.names();
        // 共享帧时直接在帧的拥有者上预留槽位，正在分析中的兄弟作用域因此不会重叠
        let base = if new_frame {
            0
        } else {
            let owner = parent.frame_owner();
            let base = owner.frame_maxslots.get();
            owner.frame_maxslots.set(base + names.len());
            base
        };
        let slots: AtomMap<usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, base + i))
            .collect();
        let top = base + slots.len();
        Self {
            parent: Some(parent),
            kind: ScopeKind::Module(ModuleScope {
                source,
                states: RefCell::new(names.iter().map(|_| DefState::Unanalyzed).collect()),
                slots,
            }),
            new_frame,
            frame_maxslots: Cell::new(top),
            frame: None,
        }
    }

    /// 函数参数（或 `for` 的循环变量）的作用域，开始一个新帧。
    pub fn parameters(parent: &'a Environ<'a>, params: &[Identifier]) -> Result<Self, Exception> {
        let mut slots = AtomMap::with_capacity(params.len());
        for (slot, param) in params.iter().enumerate() {
            if slots.insert(param.atom, slot).is_some() {
                return Err(Exception::new(
                    ErrorKind::MultipleDefinition {
                        name: param.name().to_string(),
                    },
                    &Context::AtLocation(&param.location, parent.root_frame()),
                ));
            }
        }
        Ok(Self {
            parent: Some(parent),
            kind: ScopeKind::Parameters(slots),
            new_frame: true,
            frame_maxslots: Cell::new(params.len()),
            frame: None,
        })
    }

    /// 开始当前帧的那个作用域。
    fn frame_owner(&self) -> &Environ<'a> {
        let mut env: &Environ<'a> = self;
        while !env.new_frame {
            match env.parent {
                Some(parent) => env = parent,
                None => break,
            }
        }
        env
    }

    /// 当前帧需要的槽位数。
    pub fn frame_maxslots(&self) -> usize {
        self.frame_owner().frame_maxslots.get()
    }

    pub fn root_frame(&self) -> Option<&Rc<Frame>> {
        let mut env = self;
        while let Some(parent) = env.parent {
            env = parent;
        }
        env.frame
    }

    /// 把一个标识符解析为常量或槽位引用。
    ///
    /// 向外每跨过一个开始新帧的作用域，`depth` 加一。
    pub fn lookup(&self, id: &Identifier, phrase: &Rc<Phrase>) -> Result<Expression, Exception> {
        let mut depth = 0;
        let mut env = Some(self);
        while let Some(scope) = env {
            if let Some(kind) = scope.single_lookup(id.atom, depth)? {
                return Ok(Expression::new(kind, phrase.clone()));
            }
            if scope.new_frame {
                depth += 1;
            }
            env = scope.parent;
        }
        Err(Exception::new(
            ErrorKind::UnboundIdentifier {
                name: id.name().to_string(),
            },
            &Context::AtLocation(&id.location, self.root_frame()),
        ))
    }

    fn single_lookup(&self, name: Atom, depth: usize) -> Result<Option<ExprKind>, Exception> {
        match &self.kind {
            ScopeKind::Builtin(names) => Ok(names.get(&name).map(|value| ExprKind::Constant(value.clone()))),
            ScopeKind::Parameters(params) => {
                Ok(params.get(&name).map(|&slot| ExprKind::Slot { depth, slot }))
            }
            ScopeKind::Module(scope) => {
                let Some(index) = scope.slots.get_index_of(&name) else {
                    return Ok(None);
                };
                self.analyze_definition(scope, index)?;
                Ok(Some(ExprKind::Slot {
                    depth,
                    slot: scope.slots[index],
                }))
            }
        }
    }

    /// 第一次查到一个定义时，在它自己的作用域里分析并记住结果。
    fn analyze_definition(&self, scope: &ModuleScope, index: usize) -> Result<(), Exception> {
        let state = mem::replace(&mut scope.states.borrow_mut()[index], DefState::Analyzing);
        let DefState::Unanalyzed = state else {
            scope.states.borrow_mut()[index] = state;
            return Ok(());
        };

        let Some((&name, _)) = scope.slots.get_index(index) else {
            panic!("ICE: definition index {} out of range", index);
        };
        let Some(definiens) = scope.source.definiens(name) else {
            panic!("ICE: definition source has no definiens for '{}'", name);
        };
        debug!(%name, "analyzing definition");
        let expr = analyze_expr(&definiens, self)?;
        scope.states.borrow_mut()[index] = DefState::Analyzed(Rc::new(expr));
        Ok(())
    }

    /// 分析这一组定义中的每一个（各一次），按定义顺序返回 (槽位, 表达式)。
    pub fn definitions(&self) -> Result<Vec<(usize, Rc<Expression>)>, Exception> {
        let ScopeKind::Module(scope) = &self.kind else {
            panic!("ICE: definitions() on a scope without definitions");
        };
        for index in 0..scope.slots.len() {
            self.analyze_definition(scope, index)?;
        }
        let states = scope.states.borrow();
        Ok(scope
            .slots
            .values()
            .zip(states.iter())
            .map(|(&slot, state)| match state {
                DefState::Analyzed(expr) => (slot, expr.clone()),
                other => panic!("ICE: definition left in state {:?}", other),
            })
            .collect())
    }

    /// 名字到槽位的映射（模块字面量的字段表）。
    pub fn fields(&self) -> AtomMap<usize> {
        match &self.kind {
            ScopeKind::Module(scope) => scope.slots.clone(),
            ScopeKind::Parameters(params) => params.clone(),
            ScopeKind::Builtin(_) => AtomMap::new(),
        }
    }
}
