// In src/runtime/builtins.rs

//! 内建函数库。每个内建函数都有一个解释执行的实现，
//! 大多数还带有 GLSL 中的对应函数，供几何编译器使用。

use crate::parser::ast::Phrase;
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::value::wrong_type;
use crate::runtime::{Context, Frame, Function, Value};
use crate::system::Namespace;
use crate::utils::Atom;
use std::f64::consts::{PI, TAU};
use std::rc::Rc;

/// 内建函数被调用的位置：调用者的帧以及调用表达式。
pub struct CallSite<'a> {
    pub frame: &'a Rc<Frame>,
    pub phrase: &'a Phrase,
}

impl CallSite<'_> {
    pub fn context(&self) -> Context<'_> {
        Context::AtPhrase(self.phrase, Some(self.frame))
    }
}

/// 一个内建函数在 GLSL 中的参数规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlSignature {
    /// `f(x)`：逐分量，结果与参数同类型
    Map,
    /// `f(a, b)`：逐分量，标量参数会被扩展成向量
    Map2,
    /// `f(a, b, c)`：同上
    Map3,
    /// `f(v) -> float`
    Reduce,
    /// `f(a, b) -> float`，两个参数类型相同
    Reduce2,
}

#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub arity: usize,
    pub call: fn(&[Value], &CallSite) -> Result<Value, Exception>,
    /// GLSL 函数名和参数规则。为 `None` 的内建函数不能出现在着色器代码中。
    pub gl: Option<(&'static str, GlSignature)>,
}

// --- 逐分量运算 ---

enum Operand {
    Scalar(f64),
    Vector(Vec<f64>),
}

fn operand(value: &Value, cs: &CallSite) -> Result<Operand, Exception> {
    match value {
        Value::Num(n) => Ok(Operand::Scalar(*n)),
        other => other
            .as_numbers()
            .map(Operand::Vector)
            .ok_or_else(|| wrong_type("number or vector", other, &cs.context())),
    }
}

/// 逐分量地应用 `f`。有向量参数时，所有向量长度必须相同，标量参与每一个分量。
fn broadcast(args: &[Value], cs: &CallSite, f: impl Fn(&[f64]) -> f64) -> Result<Value, Exception> {
    let operands = args
        .iter()
        .map(|arg| operand(arg, cs))
        .collect::<Result<Vec<_>, _>>()?;

    let mut len = None;
    for op in &operands {
        if let Operand::Vector(v) = op {
            match len {
                None => len = Some(v.len()),
                Some(n) if n != v.len() => {
                    return Err(Exception::new(
                        ErrorKind::WrongType {
                            expected: format!("vector of length {}", n),
                            found: format!("vector of length {}", v.len()),
                        },
                        &cs.context(),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    let mut scratch = vec![0.0; operands.len()];
    let mut component = |i: usize| {
        for (slot, op) in scratch.iter_mut().zip(&operands) {
            *slot = match op {
                Operand::Scalar(s) => *s,
                Operand::Vector(v) => v[i],
            };
        }
        f(&scratch)
    };

    Ok(match len {
        None => Value::Num(component(0)),
        Some(n) => Value::from((0..n).map(|i| Value::Num(component(i))).collect::<Vec<_>>()),
    })
}

fn map1(args: &[Value], cs: &CallSite, f: fn(f64) -> f64) -> Result<Value, Exception> {
    broadcast(args, cs, |x| f(x[0]))
}

fn map2(args: &[Value], cs: &CallSite, f: fn(f64, f64) -> f64) -> Result<Value, Exception> {
    broadcast(args, cs, |x| f(x[0], x[1]))
}

fn components(value: &Value, cs: &CallSite) -> Result<Vec<f64>, Exception> {
    Ok(match operand(value, cs)? {
        Operand::Scalar(s) => vec![s],
        Operand::Vector(v) => v,
    })
}

fn length(args: &[Value], cs: &CallSite) -> Result<Value, Exception> {
    let v = components(&args[0], cs)?;
    Ok(Value::Num(v.iter().map(|x| x * x).sum::<f64>().sqrt()))
}

fn dot(args: &[Value], cs: &CallSite) -> Result<Value, Exception> {
    let a = components(&args[0], cs)?;
    let b = components(&args[1], cs)?;
    if a.len() != b.len() {
        return Err(wrong_type("vectors of equal length", &args[1], &cs.context()));
    }
    Ok(Value::Num(a.iter().zip(&b).map(|(x, y)| x * y).sum()))
}

fn sum(args: &[Value], cs: &CallSite) -> Result<Value, Exception> {
    let cx = cs.context();
    let mut total = 0.0;
    for item in args[0].to_list(&cx)?.iter() {
        total += item.to_num(&cx)?;
    }
    Ok(Value::Num(total))
}

/// `error(message)`：错误归属于调用 `error` 的那个函数调用，而不是 `error(...)` 本身。
fn error(args: &[Value], cs: &CallSite) -> Result<Value, Exception> {
    let message = match &args[0] {
        Value::Text(text) => text.to_string(),
        other => other.to_string(),
    };
    Err(Exception::new(ErrorKind::UserError { message }, &Context::AtFrame(cs.frame)))
}

// GLSL 的 mod 定义为 x - y * floor(x / y)
fn glsl_mod(x: f64, y: f64) -> f64 {
    x - y * (x / y).floor()
}

pub static BUILTINS: [Builtin; 19] = [
    Builtin { name: "sqrt", arity: 1, call: |a, cs| map1(a, cs, f64::sqrt), gl: Some(("sqrt", GlSignature::Map)) },
    Builtin { name: "abs", arity: 1, call: |a, cs| map1(a, cs, f64::abs), gl: Some(("abs", GlSignature::Map)) },
    Builtin { name: "sin", arity: 1, call: |a, cs| map1(a, cs, f64::sin), gl: Some(("sin", GlSignature::Map)) },
    Builtin { name: "cos", arity: 1, call: |a, cs| map1(a, cs, f64::cos), gl: Some(("cos", GlSignature::Map)) },
    Builtin { name: "tan", arity: 1, call: |a, cs| map1(a, cs, f64::tan), gl: Some(("tan", GlSignature::Map)) },
    Builtin { name: "exp", arity: 1, call: |a, cs| map1(a, cs, f64::exp), gl: Some(("exp", GlSignature::Map)) },
    Builtin { name: "log", arity: 1, call: |a, cs| map1(a, cs, f64::ln), gl: Some(("log", GlSignature::Map)) },
    Builtin { name: "floor", arity: 1, call: |a, cs| map1(a, cs, f64::floor), gl: Some(("floor", GlSignature::Map)) },
    Builtin { name: "ceil", arity: 1, call: |a, cs| map1(a, cs, f64::ceil), gl: Some(("ceil", GlSignature::Map)) },
    Builtin { name: "atan2", arity: 2, call: |a, cs| map2(a, cs, f64::atan2), gl: Some(("atan", GlSignature::Map2)) },
    Builtin { name: "min", arity: 2, call: |a, cs| map2(a, cs, f64::min), gl: Some(("min", GlSignature::Map2)) },
    Builtin { name: "max", arity: 2, call: |a, cs| map2(a, cs, f64::max), gl: Some(("max", GlSignature::Map2)) },
    Builtin { name: "mod", arity: 2, call: |a, cs| map2(a, cs, glsl_mod), gl: Some(("mod", GlSignature::Map2)) },
    Builtin {
        name: "mix",
        arity: 3,
        call: |a, cs| broadcast(a, cs, |x| x[0] + (x[1] - x[0]) * x[2]),
        gl: Some(("mix", GlSignature::Map3)),
    },
    Builtin {
        name: "clamp",
        arity: 3,
        call: |a, cs| broadcast(a, cs, |x| x[0].max(x[1]).min(x[2])),
        gl: Some(("clamp", GlSignature::Map3)),
    },
    Builtin { name: "length", arity: 1, call: length, gl: Some(("length", GlSignature::Reduce)) },
    Builtin { name: "dot", arity: 2, call: dot, gl: Some(("dot", GlSignature::Reduce2)) },
    Builtin { name: "sum", arity: 1, call: sum, gl: None },
    Builtin { name: "error", arity: 1, call: error, gl: None },
];

/// 默认的内建名字空间：全部内建函数，以及常量 `pi`、`tau`、`inf`。
pub fn namespace() -> Namespace {
    let mut names = Namespace::new();
    names.insert(Atom::intern("pi"), Value::Num(PI));
    names.insert(Atom::intern("tau"), Value::Num(TAU));
    names.insert(Atom::intern("inf"), Value::Num(f64::INFINITY));
    for builtin in BUILTINS.iter() {
        names.insert(
            Atom::intern(builtin.name),
            Value::Function(Rc::new(Function::Builtin(builtin))),
        );
    }
    names
}
