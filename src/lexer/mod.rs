// 导入logos分词库
use logos::Logos;
// 导入错误处理模组
use crate::reporter::{CompilerError, LexerError};
// 导入定位处理
use crate::utils::{Location, Source};
use std::fmt;
use std::rc::Rc;


// logos 解析时需要使用的错误类型
#[derive(Debug, Default, Clone, PartialEq)]
pub enum LexingError {
    /// 使用 `#[default]` 来指定当 logos 需要创建一个默认错误实例时
    /// 应该使用哪个变体。
    #[default]
    InvalidToken,
}

/// 词素定义
#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(error = LexingError)]
// 跳过空白
#[logos(skip r"[ \t\r\n\f]+")]
// 跳过单行注释
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // 关键字
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,

    // 布尔字面量
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),

    // 数字字面量，统一解析为 f64。
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    // 字符串字面量
    #[regex(r#""([^"\\]|\\.)*""#, lex_string_literal)]
    Text(String),

    // 标识符
    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // 运算符号
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("^")]
    Caret,
    #[token("=")]
    Assign,
    #[token("==")]
    Eq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Lte,
    #[token(">=")]
    Gte,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // 连接符号
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("->")]
    Arrow,

    // 分割符号
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Text(s) => write!(f, "\"{}\"", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Boolean(b) => write!(f, "{}", b),
            other => write!(f, "{:?}", other),
        }
    }
}

/// 字符串字面量的辅助解析函数
// 去除首尾引号并处理转义字符。
fn lex_string_literal(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];

    let mut s = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some('\\') => s.push('\\'),
                Some('"') => s.push('"'),
                // 无法识别的转义序列按原样保留
                Some(other) => {
                    s.push('\\');
                    s.push(other);
                }
                None => return None,
            }
        } else {
            s.push(c);
        }
    }
    Some(s)
}

/// 对源代码进行词法分析。
///
/// 总是返回全部能识别的 Token；无法识别的字符被收集为 `LexerError`。
pub fn lex(source: &Rc<Source>) -> (Vec<(Token, Location)>, Vec<CompilerError>) {
    let mut tokens = Vec::new();
    let mut errors: Vec<CompilerError> = Vec::new();

    let lexer = Token::lexer(&source.text).spanned();

    for (result, span) in lexer {
        let location = Location::new(source.clone(), span.clone().into());
        match result {
            Ok(token) => tokens.push((token, location)),
            Err(_lexing_error) => {
                // LexingError 本身不包含无效字符的信息，需要从源码中取出。
                let unrecognized_char = source.text[span].chars().next().unwrap_or_default();
                errors.push(
                    LexerError::UnrecognizedToken {
                        unrecognized_char,
                        location,
                    }
                    .into(),
                );
            }
        }
    }

    (tokens, errors)
}
