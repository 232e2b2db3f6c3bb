// In src/analyzer/mod.rs

// 1. 声明所有模块
mod environ;
mod meaning;

#[cfg(test)]
mod test;

// 2. 导入依赖
use crate::parser::ast::{Identifier, Phrase, PhraseKind};
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Context, Value};
use crate::utils::AtomMap;
use std::rc::Rc;
use tracing::{debug, instrument};

pub use environ::{DefinitionSource, Environ, ModuleScope, ScopeKind};
pub use meaning::{ExprKind, Expression, Lambda, Meaning, ModuleExpr};

fn error_at(kind: ErrorKind, phrase: &Phrase, env: &Environ) -> Exception {
    Exception::new(kind, &Context::at_environ(phrase, env))
}

// --- 入口 ---

/// 分析一个完整的程序。一个单独的定义 `a = 1` 被当作只有一个字段的模块。
#[instrument(skip_all)]
pub fn analyze_program(phrase: &Rc<Phrase>, env: &Environ) -> Result<Expression, Exception> {
    let expr = match analyze(phrase, env)? {
        Meaning::Expression(expr) => expr,
        Meaning::Definition { name, definiens } => {
            let mut definitions = AtomMap::new();
            definitions.insert(name.atom, definiens);
            let module = analyze_module(&definitions, env)?;
            Expression::new(ExprKind::Module(Rc::new(module)), phrase.clone())
        }
    };
    debug!(frame_slots = env.frame_maxslots(), "program analyzed");
    Ok(expr)
}

/// 要求分析结果是一个表达式。
pub fn analyze_expr(phrase: &Rc<Phrase>, env: &Environ) -> Result<Expression, Exception> {
    match analyze(phrase, env)? {
        Meaning::Expression(expr) => Ok(expr),
        Meaning::Definition { .. } => Err(error_at(ErrorKind::NotAnExpression, phrase, env)),
    }
}

/// 分析一组定义，构成一个模块字面量。每个定义恰好分析一次。
pub fn analyze_module(source: &dyn DefinitionSource, env: &Environ) -> Result<ModuleExpr, Exception> {
    let module_env = Environ::module(env, source);
    let definitions = module_env.definitions()?;
    Ok(ModuleExpr {
        nslots: module_env.frame_maxslots(),
        fields: module_env.fields(),
        definitions,
    })
}

/// 把 Phrase 转换为 Meaning。只读取 Phrase 树，从不修改它。
pub fn analyze(phrase: &Rc<Phrase>, env: &Environ) -> Result<Meaning, Exception> {
    let kind = match &phrase.kind {
        PhraseKind::Numeral(n) => ExprKind::Constant(Value::Num(*n)),
        PhraseKind::Boolean(b) => ExprKind::Constant(Value::Bool(*b)),
        PhraseKind::Text(s) => ExprKind::Constant(Value::Text(Rc::from(s.as_str()))),

        PhraseKind::Identifier(id) => return env.lookup(id, phrase).map(Meaning::Expression),

        PhraseKind::List(items) => ExprKind::List(
            items
                .iter()
                .map(|item| analyze_expr(item, env))
                .collect::<Result<_, _>>()?,
        ),

        PhraseKind::Record(fields) => {
            let mut seen = AtomMap::with_capacity(fields.len());
            let mut analyzed = Vec::with_capacity(fields.len());
            for (name, value) in fields {
                if seen.insert(name.atom, ()).is_some() {
                    return Err(multiple_definition(name, env));
                }
                analyzed.push((name.atom, analyze_expr(value, env)?));
            }
            ExprKind::Record(analyzed)
        }

        PhraseKind::Module(items) => {
            let definitions = collect_definitions(items, env)?;
            ExprKind::Module(Rc::new(analyze_module(&definitions, env)?))
        }

        PhraseKind::Definition { target, definiens } => {
            let (name, definiens) = split_definition(phrase, target, definiens, env)?;
            return Ok(Meaning::Definition { name, definiens });
        }

        PhraseKind::Lambda { params, body } => {
            ExprKind::Lambda(Rc::new(analyze_lambda(params, body, env)?))
        }

        PhraseKind::Call { function, args } => ExprKind::Call {
            function: Box::new(analyze_expr(function, env)?),
            args: args
                .iter()
                .map(|arg| analyze_expr(arg, env))
                .collect::<Result<_, _>>()?,
        },

        PhraseKind::Dot { base, field } => ExprKind::Dot {
            base: Box::new(analyze_expr(base, env)?),
            field: field.atom,
        },

        PhraseKind::Index { base, index } => ExprKind::Index {
            base: Box::new(analyze_expr(base, env)?),
            index: Box::new(analyze_expr(index, env)?),
        },

        PhraseKind::Unary { op, operand } => ExprKind::Unary {
            op: *op,
            operand: Box::new(analyze_expr(operand, env)?),
        },

        PhraseKind::Binary { op, left, right } => ExprKind::Binary {
            op: *op,
            left: Box::new(analyze_expr(left, env)?),
            right: Box::new(analyze_expr(right, env)?),
        },

        PhraseKind::If {
            condition,
            then_branch,
            else_branch,
        } => ExprKind::If {
            condition: Box::new(analyze_expr(condition, env)?),
            then_branch: Box::new(analyze_expr(then_branch, env)?),
            else_branch: Box::new(analyze_expr(else_branch, env)?),
        },

        PhraseKind::Let { definitions, body } => {
            let definitions = collect_definitions(definitions, env)?;
            let let_env = Environ::let_scope(env, &definitions);
            let bindings = let_env.definitions()?;
            let body = analyze_expr(body, &let_env)?;
            ExprKind::Let {
                bindings,
                body: Box::new(body),
            }
        }

        PhraseKind::For {
            variable,
            list,
            body,
        } => {
            let list = analyze_expr(list, env)?;
            let loop_env = Environ::parameters(env, std::slice::from_ref(variable))?;
            let body = analyze_expr(body, &loop_env)?;
            ExprKind::For {
                nslots: loop_env.frame_maxslots(),
                list: Box::new(list),
                body: Box::new(body),
            }
        }
    };
    Ok(Meaning::Expression(Expression::new(kind, phrase.clone())))
}

// --- 辅助函数 ---

fn analyze_lambda(params: &[Identifier], body: &Rc<Phrase>, env: &Environ) -> Result<Lambda, Exception> {
    let param_env = Environ::parameters(env, params)?;
    let body = analyze_expr(body, &param_env)?;
    Ok(Lambda {
        nparams: params.len(),
        nslots: param_env.frame_maxslots(),
        body,
    })
}

fn multiple_definition(name: &Identifier, env: &Environ) -> Exception {
    Exception::new(
        ErrorKind::MultipleDefinition {
            name: name.name().to_string(),
        },
        &Context::AtLocation(&name.location, env.root_frame()),
    )
}

/// 收集 `let` 或模块大括号里的定义：名字到定义体。
pub fn collect_definitions(
    items: &[Rc<Phrase>],
    env: &Environ,
) -> Result<AtomMap<Rc<Phrase>>, Exception> {
    let mut definitions = AtomMap::with_capacity(items.len());
    for item in items {
        let PhraseKind::Definition { target, definiens } = &item.kind else {
            return Err(error_at(ErrorKind::NotADefinition, item, env));
        };
        let (name, definiens) = split_definition(item, target, definiens, env)?;
        if definitions.insert(name.atom, definiens).is_some() {
            return Err(multiple_definition(&name, env));
        }
    }
    Ok(definitions)
}

/// `x = e` 原样返回；`f(a, b) = e` 改写为 `f = (a, b) -> e`，新的 Lambda 使用整个定义的位置。
fn split_definition(
    phrase: &Rc<Phrase>,
    target: &Rc<Phrase>,
    definiens: &Rc<Phrase>,
    env: &Environ,
) -> Result<(Identifier, Rc<Phrase>), Exception> {
    match &target.kind {
        PhraseKind::Identifier(name) => Ok((name.clone(), definiens.clone())),
        PhraseKind::Call { function, args } => {
            let PhraseKind::Identifier(name) = &function.kind else {
                return Err(error_at(ErrorKind::InvalidDefinition, target, env));
            };
            let params = args
                .iter()
                .map(|arg| match &arg.kind {
                    PhraseKind::Identifier(param) => Ok(param.clone()),
                    _ => Err(error_at(ErrorKind::InvalidDefinition, arg, env)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let lambda = Phrase::new(
                PhraseKind::Lambda {
                    params,
                    body: definiens.clone(),
                },
                phrase.location.clone(),
            );
            Ok((name.clone(), lambda))
        }
        _ => Err(error_at(ErrorKind::InvalidDefinition, target, env)),
    }
}
