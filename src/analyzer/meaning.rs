// In src/analyzer/meaning.rs

//! Meaning 图：分析器的输出。每个节点都已绑定到具体的帧槽位，
//! 并保留对应的 Phrase 以便诊断。

use crate::parser::ast::{BinaryOp, Identifier, Phrase, UnaryOp};
use crate::runtime::Value;
use crate::utils::{Atom, AtomMap};
use std::rc::Rc;

/// 分析一个 Phrase 的结果：要么是表达式，要么是一个尚未求值的定义。
#[derive(Debug)]
pub enum Meaning {
    Expression(Expression),
    /// `name = definiens`。`f(x) = e` 已经被改写为 `f = x -> e`。
    Definition {
        name: Identifier,
        definiens: Rc<Phrase>,
    },
}

#[derive(Debug)]
pub struct Expression {
    pub kind: ExprKind,
    pub phrase: Rc<Phrase>,
}

impl Expression {
    pub fn new(kind: ExprKind, phrase: Rc<Phrase>) -> Self {
        Self { kind, phrase }
    }
}

/// Meaning 图的全部节点种类。
///
/// 解释执行 (`Expression::eval`) 和着色器生成 (`GenerateGl::gl_eval`) 各自穷尽地匹配这个枚举，
/// 新增一种节点时两边都必须处理。
#[derive(Debug)]
pub enum ExprKind {
    Constant(Value),
    /// 从当前帧沿父链上行 `depth` 层后的第 `slot` 个槽位
    Slot {
        depth: usize,
        slot: usize,
    },
    Call {
        function: Box<Expression>,
        args: Vec<Expression>,
    },
    List(Vec<Expression>),
    Record(Vec<(Atom, Expression)>),
    Module(Rc<ModuleExpr>),
    /// `let` 与外层共享帧：绑定占用外层帧的槽位
    Let {
        bindings: Vec<(usize, Rc<Expression>)>,
        body: Box<Expression>,
    },
    Lambda(Rc<Lambda>),
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Dot {
        base: Box<Expression>,
        field: Atom,
    },
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    /// 每次迭代一个新帧，循环变量在 0 号槽位
    For {
        nslots: usize,
        list: Box<Expression>,
        body: Box<Expression>,
    },
}

/// 一个函数字面量。参数占据帧的前 `nparams` 个槽位。
#[derive(Debug)]
pub struct Lambda {
    pub nparams: usize,
    pub nslots: usize,
    pub body: Expression,
}

/// 一个模块字面量：每个名字一个槽位，定义惰性求值。
#[derive(Debug)]
pub struct ModuleExpr {
    pub nslots: usize,
    pub fields: AtomMap<usize>,
    pub definitions: Vec<(usize, Rc<Expression>)>,
}
