//! 这个模块是整个编译器错误处理系统的核心。
//! 它使用 `thiserror` 定义所有结构化的错误类型；渲染交给 `diagnostics` 模块。

use crate::runtime::Context;
use crate::utils::Location;
use thiserror::Error;

/// 顶层的编译器错误枚举。
/// 所有阶段（词法、语法、分析、求值、着色器生成）的错误都会被包含在这里。
#[derive(Debug, Error)]
pub enum CompilerError {
    /// 词法分析阶段的错误
    #[error(transparent)]
    Lexical(#[from] LexerError),

    /// 语法分析阶段的错误
    #[error(transparent)]
    Parsing(#[from] ParserError),

    /// 分析、求值和着色器编译阶段的错误，带有调用链上的位置列表
    #[error(transparent)]
    Exception(#[from] Exception),
}

impl CompilerError {
    /// 主位置（最内层）。没有可归属位置的错误返回 `None`。
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompilerError::Lexical(LexerError::UnrecognizedToken { location, .. }) => Some(location),
            CompilerError::Parsing(ParserError::UnexpectedToken { location, .. }) => Some(location),
            CompilerError::Exception(exception) => exception.locations.first(),
        }
    }
}

/// 词法分析器可能产生的所有错误的集合
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("unrecognized character '{unrecognized_char}'")]
    UnrecognizedToken {
        unrecognized_char: char,
        location: Location,
    },
}

/// 语法分析器可能产生的所有错误的集合。
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("syntax error: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        location: Location,
    },
}

/// 解析之后的所有用户可见错误的种类。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // --- 分析期 ---
    #[error("{name}: not defined")]
    UnboundIdentifier { name: String },

    #[error("not an expression")]
    NotAnExpression,

    #[error("not a definition")]
    NotADefinition,

    #[error("invalid definition: left side must be a name or a function header")]
    InvalidDefinition,

    #[error("{name}: multiply defined")]
    MultipleDefinition { name: String },

    // --- 求值期 ---
    #[error("illegal recursive reference")]
    RecursiveDefinition,

    #[error("expected {expected}, got {found}")]
    WrongType { expected: String, found: String },

    #[error("wrong number of arguments: expected {expected}, got {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("no field named '{name}'")]
    NoSuchField { name: String },

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: String, len: usize },

    #[error("call depth exceeds {limit}")]
    StackOverflow { limit: usize },

    #[error("{message}")]
    UserError { message: String },

    #[error("not a shape")]
    NotAShape,

    // --- 着色器 ---
    #[error("{what} is not supported in shader code")]
    UnsupportedInShader { what: String },
}

/// 一个带有位置链的错误。`locations` 最内层在前。
///
/// 位置只在构造时由 `Context` 展开一次，成功路径上从不构造位置列表。
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Exception {
    pub kind: ErrorKind,
    pub locations: Vec<Location>,
}

impl Exception {
    pub fn new(kind: ErrorKind, cx: &Context) -> Self {
        Self {
            kind,
            locations: cx.get_locations(),
        }
    }

    pub fn location(&self) -> Option<&Location> {
        self.locations.first()
    }
}
