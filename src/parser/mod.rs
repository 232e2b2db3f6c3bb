//! src/parser/mod.rs
//!
//! 语法分析阶段的公共接口：把 Token 流转换为 Phrase 树。

pub mod ast;
mod parsers;

use crate::lexer::Token;
use crate::parser::ast::Phrase;
use crate::reporter::{CompilerError, ParserError};
use crate::utils::{Location, Source, Span};
use chumsky::Parser;
use chumsky::input::{Input, Stream};
use parsers::program_parser;
use std::rc::Rc;
use tracing::debug;

/// parser 模块唯一的公共入口函数。
///
/// - 输入: 源代码 (用于构造文件末尾的位置) 和 Token 向量。
/// - 输出: 可选的 Phrase 树，以及语法错误向量。
pub fn parse(
    source: &Rc<Source>,
    tokens: Vec<(Token, Location)>,
) -> (Option<Rc<Phrase>>, Vec<CompilerError>) {
    let mut errors: Vec<CompilerError> = Vec::new();

    // --- 1. 创建 Token 流 ---
    // 文件末尾的位置用于报告“代码意外结束”。
    let end = source.text.len();
    let eoi = Location::new(source.clone(), Span::new(end, end));
    let token_stream =
        Stream::from_iter(tokens).map(eoi, |(token, location): (Token, Location)| (token, location));

    // --- 2. 运行解析器 ---
    let (phrase, parse_errors) = program_parser().parse(token_stream).into_output_errors();

    // --- 3. 将 chumsky 的错误转换为我们自己的结构化错误 ---
    for error in parse_errors {
        let found = error
            .found()
            .map_or("end of input".to_string(), |tok| format!("`{}`", tok));

        let expected = if error.expected().len() == 0 {
            "something else".to_string()
        } else {
            error
                .expected()
                .map(|expected_pattern| expected_pattern.to_string())
                .collect::<Vec<_>>()
                .join(" or ")
        };

        errors.push(
            ParserError::UnexpectedToken {
                expected,
                found,
                location: error.span().clone(),
            }
            .into(),
        );
    }

    debug!(errors = errors.len(), "parsed {}", source.name);
    (phrase, errors)
}
