use crate::utils::{Atom, Location};
use std::rc::Rc;

// --- 1. 核心 AST 节点与标识符 ---

/// 语法树节点（Phrase）。每个节点都携带它在源代码中的位置。
///
/// Phrase 树一旦由解析器构建就不再修改；分析器只读取它，
/// 并让生成的每个 Meaning 节点通过 `Rc` 共享对应的 Phrase，以便报错时定位。
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    pub kind: PhraseKind,
    pub location: Location,
}

impl Phrase {
    pub fn new(kind: PhraseKind, location: Location) -> Rc<Self> {
        Rc::new(Self { kind, location })
    }
}

/// 一个标识符，例如变量名或函数名。
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub atom: Atom,
    pub location: Location,
}

impl Identifier {
    pub fn new(name: &str, location: Location) -> Self {
        Self {
            atom: Atom::intern(name),
            location,
        }
    }

    pub fn name(&self) -> &'static str {
        self.atom.as_str()
    }
}

// --- 2. 运算符 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `!b`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    NotEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "^",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

// --- 3. 语法结构 ---

/// 所有的语法结构。
#[derive(Debug, Clone, PartialEq)]
pub enum PhraseKind {
    /// 数字字面量，例如 `1.5`。
    Numeral(f64),
    /// `true` / `false`
    Boolean(bool),
    /// 字符串字面量，例如 `"boom"`。
    Text(String),
    Identifier(Identifier),
    /// `[a, b, c]`
    List(Vec<Rc<Phrase>>),
    /// `{ name: expr, ... }`
    Record(Vec<(Identifier, Rc<Phrase>)>),
    /// `{ a = 1; b = a + 1 }`：定义之间可以相互递归。
    Module(Vec<Rc<Phrase>>),
    /// `target = definiens`。`target` 是标识符或者 `f(x, y)` 形式的函数头。
    Definition {
        target: Rc<Phrase>,
        definiens: Rc<Phrase>,
    },
    /// `(p, t) -> body` 或 `x -> body`
    Lambda {
        params: Vec<Identifier>,
        body: Rc<Phrase>,
    },
    /// `f(a, b)`
    Call {
        function: Rc<Phrase>,
        args: Vec<Rc<Phrase>>,
    },
    /// `record.field`
    Dot {
        base: Rc<Phrase>,
        field: Identifier,
    },
    /// `list[i]`
    Index {
        base: Rc<Phrase>,
        index: Rc<Phrase>,
    },
    Unary {
        op: UnaryOp,
        operand: Rc<Phrase>,
    },
    Binary {
        op: BinaryOp,
        left: Rc<Phrase>,
        right: Rc<Phrase>,
    },
    /// `if (c) a else b`
    If {
        condition: Rc<Phrase>,
        then_branch: Rc<Phrase>,
        else_branch: Rc<Phrase>,
    },
    /// `let a = 1; b = 2 in body`
    Let {
        definitions: Vec<Rc<Phrase>>,
        body: Rc<Phrase>,
    },
    /// `for (i in list) body`：对列表的每个元素求值 body，结果组成新的列表。
    For {
        variable: Identifier,
        list: Rc<Phrase>,
        body: Rc<Phrase>,
    },
}
