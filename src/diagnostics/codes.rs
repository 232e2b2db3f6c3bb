// src/diagnostics/codes.rs

/// Represents a specific error code with its associated information.
/// This struct serves as the single source of truth for all compiler diagnostics.
#[derive(Debug, Clone)]
pub struct ErrorCode {
    pub code: &'static str,
    pub message: &'static str,
    pub explanation: &'static str,
}

/*
E00xx: 词法分析 (Lexical Analysis) 错误。

E01xx: 语法分析 (Parsing / Syntax) 错误。

E02xx: 名字解析与分析 (Analysis) 错误。

E03xx: 求值 (Evaluation) 错误。

E04xx: 着色器生成 (Shader Generation) 错误。
*/
// --- E00xx: Lexical Analysis Errors ---

pub const E0000_UNRECOGNIZED_CHAR: ErrorCode = ErrorCode {
    code: "E0000",
    message: "Unrecognized character",
    explanation: "The lexer encountered a character that is not part of the language. \
                  This usually means a typo or an unsupported symbol such as `@` or `#`.",
};

// --- E01xx: Syntax Analysis (Parsing) Errors ---

pub const E0100_SYNTAX_ERROR: ErrorCode = ErrorCode {
    code: "E0100",
    message: "Syntax error",
    explanation: "The arrangement of tokens does not match the grammar. Check for a missing `in` \
                  after `let` definitions, unbalanced brackets, or an `if` without `else`.",
};

// --- E02xx: Analysis Errors ---

pub const E0200_UNBOUND_IDENTIFIER: ErrorCode = ErrorCode {
    code: "E0200",
    message: "Identifier not defined",
    explanation: "The name is not bound by any enclosing `let`, module, function parameter, \
                  `for` variable, or builtin. Check the spelling and the scope of the definition.",
};

pub const E0201_NOT_AN_EXPRESSION: ErrorCode = ErrorCode {
    code: "E0201",
    message: "Not an expression",
    explanation: "A definition such as `a = 1` was used where a value is expected. Definitions may \
                  only appear inside `let ... in` or inside module braces `{ a = 1; }`.",
};

pub const E0202_NOT_A_DEFINITION: ErrorCode = ErrorCode {
    code: "E0202",
    message: "Not a definition",
    explanation: "Every item between `let` and `in`, and every item of a module literal, must have \
                  the form `name = expr` or `name(params) = expr`.",
};

pub const E0203_INVALID_DEFINITION: ErrorCode = ErrorCode {
    code: "E0203",
    message: "Invalid definition",
    explanation: "The left side of `=` must be a plain name, or a function header whose parameters \
                  are all plain names, such as `f(x, y)`.",
};

pub const E0204_MULTIPLE_DEFINITION: ErrorCode = ErrorCode {
    code: "E0204",
    message: "Name defined more than once",
    explanation: "A module, `let` block, record literal or parameter list binds the same name twice. \
                  Each name must be unique within one scope.",
};

// --- E03xx: Evaluation Errors ---

pub const E0300_RECURSIVE_DEFINITION: ErrorCode = ErrorCode {
    code: "E0300",
    message: "Recursive definition",
    explanation: "A definition needs its own value before that value exists, for example `a = a + 1`. \
                  Recursive functions are fine; recursive data definitions are not.",
};

pub const E0301_WRONG_TYPE: ErrorCode = ErrorCode {
    code: "E0301",
    message: "Wrong type",
    explanation: "An operation received a value of a type it cannot handle, such as adding a \
                  boolean to a number or calling something that is not a function.",
};

pub const E0302_ARGUMENT_COUNT: ErrorCode = ErrorCode {
    code: "E0302",
    message: "Wrong number of arguments",
    explanation: "A function was called with a different number of arguments than it declares.",
};

pub const E0303_NO_SUCH_FIELD: ErrorCode = ErrorCode {
    code: "E0303",
    message: "No such field",
    explanation: "The record or module does not define the requested field.",
};

pub const E0304_INDEX_OUT_OF_RANGE: ErrorCode = ErrorCode {
    code: "E0304",
    message: "Index out of range",
    explanation: "List indices must be whole numbers between 0 and the list length minus one.",
};

pub const E0305_STACK_OVERFLOW: ErrorCode = ErrorCode {
    code: "E0305",
    message: "Call depth limit exceeded",
    explanation: "Function calls nested deeper than the configured limit. This usually means \
                  unbounded recursion; the limit can be raised with `--max-depth`.",
};

pub const E0306_USER_ERROR: ErrorCode = ErrorCode {
    code: "E0306",
    message: "Error raised by program",
    explanation: "The program called `error(message)`. The locations list the active calls, \
                  innermost first.",
};

pub const E0307_NOT_A_SHAPE: ErrorCode = ErrorCode {
    code: "E0307",
    message: "Not a shape",
    explanation: "Shader export requires the program to evaluate to a record or module with \
                  `dist` and `colour` fields, each a function of `(p, t)` or of a single 4-vector.",
};

// --- E04xx: Shader Generation Errors ---

pub const E0400_UNSUPPORTED_IN_SHADER: ErrorCode = ErrorCode {
    code: "E0400",
    message: "Not supported in shader code",
    explanation: "Shape functions are compiled to straight-line GLSL. Loops, recursion, records, \
                  modules, text, and function values computed at run time cannot be compiled; \
                  conditionals are compiled as `?:` expressions.",
};

pub const ALL_CODES: &[&ErrorCode] = &[
    &E0000_UNRECOGNIZED_CHAR,
    &E0100_SYNTAX_ERROR,
    &E0200_UNBOUND_IDENTIFIER,
    &E0201_NOT_AN_EXPRESSION,
    &E0202_NOT_A_DEFINITION,
    &E0203_INVALID_DEFINITION,
    &E0204_MULTIPLE_DEFINITION,
    &E0300_RECURSIVE_DEFINITION,
    &E0301_WRONG_TYPE,
    &E0302_ARGUMENT_COUNT,
    &E0303_NO_SUCH_FIELD,
    &E0304_INDEX_OUT_OF_RANGE,
    &E0305_STACK_OVERFLOW,
    &E0306_USER_ERROR,
    &E0307_NOT_A_SHAPE,
    &E0400_UNSUPPORTED_IN_SHADER,
];

/// 按错误码查找，供 `--explain` 使用。
pub fn lookup(code: &str) -> Option<&'static ErrorCode> {
    ALL_CODES.iter().copied().find(|c| c.code.eq_ignore_ascii_case(code))
}
