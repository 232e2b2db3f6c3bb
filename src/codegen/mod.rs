// In src/codegen/mod.rs

//! 几何编译器：把 Meaning 图按“符号求值”的方式重放，
//! 每个基本运算产生一条单赋值的 GLSL 语句。

// 1. 声明所有子模块
mod expression;
mod types;

// 2. 导入依赖
use crate::analyzer::{Expression, Lambda};
use crate::parser::ast::Phrase;
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Context, Frame};
use std::cell::RefCell;
use std::fmt::{self, Write};
use std::rc::Rc;
use tracing::trace;

pub use types::GlType;

// --- 核心抽象 ---

/// 着色器中的一个值：内联字面量（`1.0`、`vec3(1.0, 0.0, 0.0)`）或一个名字 `rN`。
/// 一旦产生，文本就不再改变。
#[derive(Debug, Clone, PartialEq)]
pub struct GlValue {
    pub text: String,
    pub ty: GlType,
}

impl GlValue {
    pub fn new(text: impl Into<String>, ty: GlType) -> Self {
        Self {
            text: text.into(),
            ty,
        }
    }

    /// 浮点字面量。非有限值在 GLSL 中没有字面量写法。
    pub fn num(n: f64) -> Option<Self> {
        if !n.is_finite() {
            return None;
        }
        // `{:?}` 总是带小数点或指数，正好是合法的 GLSL float 字面量
        let text = if n.is_sign_negative() {
            format!("({:?})", n)
        } else {
            format!("{:?}", n)
        };
        Some(Self::new(text, GlType::Num))
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(b.to_string(), GlType::Bool)
    }

    /// 如果这是一个内联的 float 字面量，返回它的值。
    pub fn literal(&self) -> Option<f64> {
        if self.ty != GlType::Num {
            return None;
        }
        let text = self
            .text
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .unwrap_or(&self.text);
        // 名字（`r3`、参数名）不以数字开头
        if !text.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            return None;
        }
        text.parse().ok()
    }
}

impl fmt::Display for GlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// [GenerateGl] 符号求值 Trait，与解释执行的 `Expression::eval` 一一对应。
pub trait GenerateGl {
    fn gl_eval(&self, frame: &Rc<GlFrame>, gc: &mut GlCompiler) -> Result<GlValue, Exception>;
}

/// 一次编译过程的状态：语句缓冲区和名字分配器。
/// 距离函数和颜色函数各用一个独立的 GlCompiler。
pub struct GlCompiler {
    body: String,
    next_id: usize,
    /// 正在内联的函数，用于拒绝递归
    call_stack: Vec<*const Lambda>,
}

impl Default for GlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl GlCompiler {
    /// `r0` 留给函数参数。
    pub fn new() -> Self {
        Self {
            body: String::new(),
            next_id: 1,
            call_stack: Vec::new(),
        }
    }

    /// 分配一个新名字。
    pub fn newvalue(&mut self, ty: GlType) -> GlValue {
        let name = format!("r{}", self.next_id);
        self.next_id += 1;
        GlValue::new(name, ty)
    }

    /// 分配一个新名字，并输出定义它的语句。
    pub fn define(&mut self, ty: GlType, rhs: impl fmt::Display) -> GlValue {
        let value = self.newvalue(ty);
        // 写入 String 不会失败
        let _ = writeln!(self.body, "  {} {} = {};", ty, value.text, rhs);
        trace!(name = %value.text, %ty, "emit");
        value
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// 内联一次函数调用：为参数建立新的符号帧，然后符号求值函数体。
    pub fn inline_call(
        &mut self,
        lambda: &Rc<Lambda>,
        parent: GlParent,
        args: Vec<GlValue>,
        phrase: &Phrase,
    ) -> Result<GlValue, Exception> {
        if args.len() != lambda.nparams {
            return Err(Exception::new(
                ErrorKind::ArgumentCount {
                    expected: lambda.nparams,
                    found: args.len(),
                },
                &Context::AtPhrase(phrase, None),
            ));
        }
        let key = Rc::as_ptr(lambda);
        if self.call_stack.contains(&key) {
            return Err(unsupported("recursion", phrase));
        }

        let frame = GlFrame::new(lambda.nslots, parent);
        for (slot, arg) in args.into_iter().enumerate() {
            frame.set(slot, arg);
        }
        self.call_stack.push(key);
        let result = lambda.body.gl_eval(&frame, self);
        self.call_stack.pop();
        result
    }
}

pub(crate) fn unsupported(what: impl Into<String>, phrase: &Phrase) -> Exception {
    Exception::new(
        ErrorKind::UnsupportedInShader { what: what.into() },
        &Context::AtPhrase(phrase, None),
    )
}

// --- 符号帧 ---

#[derive(Debug, Clone, Default)]
enum GlSlot {
    #[default]
    Empty,
    Pending(Rc<Expression>),
    Busy,
    Ready(GlValue),
}

/// 符号帧的父帧：在函数边界之外的是真实的运行帧（闭包捕获的值），
/// 被内联的局部函数的父帧则是另一个符号帧。
#[derive(Debug, Clone)]
pub enum GlParent {
    Concrete(Rc<Frame>),
    Symbolic(Rc<GlFrame>),
}

pub(crate) enum GlAncestor {
    Symbolic(Rc<GlFrame>),
    Concrete(Rc<Frame>),
}

/// 与 `Frame` 对应的符号帧：槽位里存放的是 GL 值。
#[derive(Debug)]
pub struct GlFrame {
    slots: RefCell<Vec<GlSlot>>,
    parent: GlParent,
}

impl GlFrame {
    pub fn new(nslots: usize, parent: GlParent) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![GlSlot::Empty; nslots]),
            parent,
        })
    }

    pub fn set(&self, slot: usize, value: GlValue) {
        self.store(slot, GlSlot::Ready(value));
    }

    pub(crate) fn set_pending(&self, slot: usize, expr: Rc<Expression>) {
        self.store(slot, GlSlot::Pending(expr));
    }

    fn store(&self, slot: usize, state: GlSlot) {
        let mut slots = self.slots.borrow_mut();
        let nslots = slots.len();
        match slots.get_mut(slot) {
            Some(entry) => *entry = state,
            None => panic!("ICE: GL slot {} out of range (frame has {})", slot, nslots),
        }
    }

    /// 尚未求值的定义（用于找出被调用的局部函数）。
    pub(crate) fn pending(&self, slot: usize) -> Option<Rc<Expression>> {
        match self.slots.borrow().get(slot) {
            Some(GlSlot::Pending(expr)) => Some(expr.clone()),
            _ => None,
        }
    }

    pub(crate) fn ancestor(self: &Rc<Self>, depth: usize) -> GlAncestor {
        if depth == 0 {
            return GlAncestor::Symbolic(self.clone());
        }
        match &self.parent {
            GlParent::Symbolic(parent) => parent.ancestor(depth - 1),
            GlParent::Concrete(frame) => GlAncestor::Concrete(frame.ancestor(depth - 1)),
        }
    }

    /// 读取槽位。`let` 绑定第一次读取时编译，之后都复用同一个名字。
    pub(crate) fn force(
        self: &Rc<Self>,
        slot: usize,
        gc: &mut GlCompiler,
        phrase: &Phrase,
    ) -> Result<GlValue, Exception> {
        let pending = {
            let mut slots = self.slots.borrow_mut();
            let nslots = slots.len();
            let Some(entry) = slots.get_mut(slot) else {
                panic!("ICE: GL slot {} out of range (frame has {})", slot, nslots);
            };
            match entry {
                GlSlot::Ready(value) => return Ok(value.clone()),
                GlSlot::Busy => {
                    return Err(Exception::new(
                        ErrorKind::RecursiveDefinition,
                        &Context::AtPhrase(phrase, None),
                    ));
                }
                GlSlot::Empty => panic!("ICE: read of uninitialized GL slot {}", slot),
                GlSlot::Pending(expr) => {
                    let expr = expr.clone();
                    *entry = GlSlot::Busy;
                    expr
                }
            }
        };

        match pending.gl_eval(self, gc) {
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
