// src/parser/parsers.rs

use crate::lexer::Token;
use crate::parser::ast::*;
use crate::utils::Location;
use chumsky::input::ValueInput;
use chumsky::prelude::*;
use std::rc::Rc;

pub(super) type ParseError<'a> = extra::Err<Rich<'a, Token, Location>>;

/// 后缀运算：调用、字段访问、下标。第二个字段是后缀本身的位置。
enum Postfix {
    Call(Vec<Rc<Phrase>>, Location),
    Dot(Identifier, Location),
    Index(Rc<Phrase>, Location),
}

fn binary(op: BinaryOp, left: Rc<Phrase>, right: Rc<Phrase>) -> Rc<Phrase> {
    let location = left.location.join(&right.location);
    Phrase::new(PhraseKind::Binary { op, left, right }, location)
}

// a ^ b ^ c == a ^ (b ^ c)
fn fold_power(first: Rc<Phrase>, mut rest: Vec<Rc<Phrase>>) -> Rc<Phrase> {
    let Some(mut acc) = rest.pop() else {
        return first;
    };
    while let Some(left) = rest.pop() {
        acc = binary(BinaryOp::Power, left, acc);
    }
    binary(BinaryOp::Power, first, acc)
}

fn apply_postfix(base: Rc<Phrase>, postfix: Postfix) -> Rc<Phrase> {
    match postfix {
        Postfix::Call(args, suffix) => {
            let location = base.location.join(&suffix);
            Phrase::new(PhraseKind::Call { function: base, args }, location)
        }
        Postfix::Dot(field, suffix) => {
            let location = base.location.join(&suffix);
            Phrase::new(PhraseKind::Dot { base, field }, location)
        }
        Postfix::Index(index, suffix) => {
            let location = base.location.join(&suffix);
            Phrase::new(PhraseKind::Index { base, index }, location)
        }
    }
}

/// 构建完整的 chumsky 解析器。
/// 此函数为内部实现细节，仅对父模块 `mod.rs` 可见。
pub(super) fn program_parser<'a, I>() -> impl Parser<'a, I, Rc<Phrase>, ParseError<'a>>
where
    I: ValueInput<'a, Token = Token, Span = Location>,
{
    // --- 递归解析器声明 ---
    let mut expr = Recursive::declare();

    // --- 基础解析器 ---
    let ident = select! { Token::Ident(name) = e => Identifier::new(&name, e.span()) }
        .labelled("identifier");

    let literal = select! {
        Token::Number(n) = e => Phrase::new(PhraseKind::Numeral(n), e.span()),
        Token::Boolean(b) = e => Phrase::new(PhraseKind::Boolean(b), e.span()),
        Token::Text(s) = e => Phrase::new(PhraseKind::Text(s), e.span()),
    }
    .labelled("literal");

    expr.define({
        let variable = ident.clone().map(|id: Identifier| {
            let location = id.location.clone();
            Phrase::new(PhraseKind::Identifier(id), location)
        });

        let list = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map_with(|items, e| Phrase::new(PhraseKind::List(items), e.span()));

        // `{ a: 1, b: 2 }`；空的 `{}` 也是一个记录。
        let record = ident
            .clone()
            .then_ignore(just(Token::Colon))
            .then(expr.clone())
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|fields, e| Phrase::new(PhraseKind::Record(fields), e.span()));

        // `{ a = 1; b = 2 }`。各项是否真的是定义，由分析器检查。
        let module = expr
            .clone()
            .separated_by(just(Token::Semicolon))
            .allow_trailing()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|items, e| Phrase::new(PhraseKind::Module(items), e.span()));

        let paren = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((literal, variable, list, record, module, paren)).boxed();

        // --- 后缀运算 ---
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let postfix_op = choice((
            args.map_with(|args, e| Postfix::Call(args, e.span())),
            just(Token::Dot)
                .ignore_then(ident.clone())
                .map_with(|field, e| Postfix::Dot(field, e.span())),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map_with(|index, e| Postfix::Index(index, e.span())),
        ));

        let postfix = atom.foldl(postfix_op.repeated(), apply_postfix).boxed();

        // --- 运算符优先级金字塔 ---
        let power = postfix
            .clone()
            .then(
                just(Token::Caret)
                    .ignore_then(postfix)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(|(first, rest)| fold_power(first, rest));

        let unary_op = choice((
            just(Token::Minus).to(UnaryOp::Negate),
            just(Token::Not).to(UnaryOp::Not),
        ))
        .map_with(|op, e| (op, e.span()));

        let unary = unary_op
            .repeated()
            .foldr(power, |(op, location): (UnaryOp, Location), operand: Rc<Phrase>| {
                let location = location.join(&operand.location);
                Phrase::new(PhraseKind::Unary { op, operand }, location)
            })
            .boxed();

        let product_op = just(Token::Star)
            .to(BinaryOp::Multiply)
            .or(just(Token::Slash).to(BinaryOp::Divide));
        let product = unary
            .clone()
            .foldl(product_op.then(unary).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let sum_op = just(Token::Plus)
            .to(BinaryOp::Add)
            .or(just(Token::Minus).to(BinaryOp::Subtract));
        let sum = product
            .clone()
            .foldl(sum_op.then(product).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let relational_op = choice((
            just(Token::Lte).to(BinaryOp::Lte),
            just(Token::Gte).to(BinaryOp::Gte),
            just(Token::Lt).to(BinaryOp::Lt),
            just(Token::Gt).to(BinaryOp::Gt),
            just(Token::Eq).to(BinaryOp::Eq),
            just(Token::NotEq).to(BinaryOp::NotEq),
        ));
        let relation = sum
            .clone()
            .foldl(relational_op.then(sum).repeated(), |left, (op, right)| {
                binary(op, left, right)
            })
            .boxed();

        let logical_and = relation
            .clone()
            .foldl(
                just(Token::And).to(BinaryOp::And).then(relation).repeated(),
                |left, (op, right)| binary(op, left, right),
            )
            .boxed();

        let logical_or = logical_and
            .clone()
            .foldl(
                just(Token::Or).to(BinaryOp::Or).then(logical_and).repeated(),
                |left, (op, right)| binary(op, left, right),
            )
            .boxed();

        // 定义的优先级最低：`f(x) = x + 1`、`a = 2`
        let definition = logical_or
            .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
            .map(|(target, definiens): (Rc<Phrase>, Option<Rc<Phrase>>)| match definiens {
                Some(definiens) => {
                    let location = target.location.join(&definiens.location);
                    Phrase::new(PhraseKind::Definition { target, definiens }, location)
                }
                None => target,
            });

        // --- 以关键字或参数表开头的表达式 ---
        let params = choice((
            ident.clone().map(|id| vec![id]),
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ));

        let lambda = params
            .then_ignore(just(Token::Arrow))
            .then(expr.clone())
            .map_with(|(params, body), e| Phrase::new(PhraseKind::Lambda { params, body }, e.span()));

        let let_expr = just(Token::Let)
            .ignore_then(
                expr.clone()
                    .separated_by(just(Token::Semicolon))
                    .allow_trailing()
                    .at_least(1)
                    .collect::<Vec<_>>(),
            )
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .map_with(|(definitions, body), e| {
                Phrase::new(PhraseKind::Let { definitions, body }, e.span())
            });

        let if_expr = just(Token::If)
            .ignore_then(
                expr.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(expr.clone())
            .then_ignore(just(Token::Else))
            .then(expr.clone())
            .map_with(|((condition, then_branch), else_branch), e| {
                Phrase::new(
                    PhraseKind::If {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    e.span(),
                )
            });

        let for_expr = just(Token::For)
            .ignore_then(
                ident
                    .clone()
                    .then_ignore(just(Token::In))
                    .then(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(expr.clone())
            .map_with(|((variable, list), body), e| {
                Phrase::new(PhraseKind::For { variable, list, body }, e.span())
            });

        choice((lambda, let_expr, if_expr, for_expr, definition)).labelled("expression")
    });

    expr.then_ignore(end())
}
