// In src/codegen/expression.rs

use super::{GenerateGl, GlAncestor, GlCompiler, GlFrame, GlParent, GlType, GlValue, unsupported};
use crate::analyzer::{ExprKind, Expression, Lambda};
use crate::parser::ast::{BinaryOp, Phrase, UnaryOp};
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Builtin, Context, Function, GlSignature, Value, component_index};
use std::rc::Rc;

const COMPONENTS: [&str; 4] = ["x", "y", "z", "w"];

impl GenerateGl for Expression {
    fn gl_eval(&self, frame: &Rc<GlFrame>, gc: &mut GlCompiler) -> Result<GlValue, Exception> {
        let phrase = &self.phrase;
        match &self.kind {
            ExprKind::Constant(value) => gl_constant(value, phrase),

            ExprKind::Slot { depth, slot } => match frame.ancestor(*depth) {
                GlAncestor::Symbolic(owner) => owner.force(*slot, gc, phrase),
                // 函数边界之外的值在编译时已知，直接内联
                GlAncestor::Concrete(owner) => {
                    let value = owner.force(*slot, &Context::AtPhrase(phrase, None))?;
                    gl_constant(&value, phrase)
                }
            },

            ExprKind::Call { function, args } => {
                let callee = resolve_callee(function, frame)?;
                let args = args
                    .iter()
                    .map(|arg| arg.gl_eval(frame, gc))
                    .collect::<Result<Vec<_>, _>>()?;
                match callee {
                    Callee::Lambda(lambda, parent) => gc.inline_call(&lambda, parent, args, phrase),
                    Callee::Builtin(builtin) => gl_builtin(builtin, args, phrase, gc),
                }
            }

            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| item.gl_eval(frame, gc))
                    .collect::<Result<Vec<_>, _>>()?;
                // 只由数字组成：GLSL 的向量构造会把向量参数展开，而列表里的列表不会
                for item in &items {
                    match item.ty {
                        GlType::Num => {}
                        GlType::Bool => return Err(unsupported("list of booleans", phrase)),
                        _ => return Err(unsupported("nested list", phrase)),
                    }
                }
                match GlType::with_count(items.len()) {
                    Some(ty) if ty.is_vec() => {
                        let parts: Vec<_> = items.iter().map(|item| item.text.as_str()).collect();
                        Ok(gc.define(ty, format!("{}({})", ty, parts.join(", "))))
                    }
                    _ => Err(unsupported(format!("list of {} numbers", items.len()), phrase)),
                }
            }

            ExprKind::Record(_) => Err(unsupported("record", phrase)),
            ExprKind::Module(_) => Err(unsupported("module", phrase)),
            ExprKind::Lambda(_) => Err(unsupported("function value", phrase)),
            ExprKind::For { .. } => Err(unsupported("for loop", phrase)),

            ExprKind::Let { bindings, body } => {
                for (slot, definition) in bindings {
                    frame.set_pending(*slot, definition.clone());
                }
                body.gl_eval(frame, gc)
            }

            ExprKind::Unary { op, operand } => {
                let x = operand.gl_eval(frame, gc)?;
                match (op, x.literal()) {
                    // 负的字面量仍是字面量，例如指数 `(-1)`
                    (UnaryOp::Negate, Some(n)) => {
                        GlValue::num(-n).ok_or_else(|| unsupported(format!("number {}", -n), phrase))
                    }
                    (UnaryOp::Negate, None) if x.ty.is_numeric() => Ok(gc.define(x.ty, format!("-{}", x))),
                    (UnaryOp::Not, _) if x.ty == GlType::Bool => {
                        Ok(gc.define(GlType::Bool, format!("!{}", x)))
                    }
                    _ => Err(unsupported(format!("this operation on {}", x.ty), phrase)),
                }
            }

            ExprKind::Binary { op, left, right } => {
                let a = left.gl_eval(frame, gc)?;
                let b = right.gl_eval(frame, gc)?;
                gl_binary(*op, a, b, phrase, gc)
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let c = condition.gl_eval(frame, gc)?;
                if c.ty != GlType::Bool {
                    return Err(unsupported(format!("{} condition", c.ty), &condition.phrase));
                }
                // 两个分支都没有副作用，可以都求值，再用 ?: 选择
                let a = then_branch.gl_eval(frame, gc)?;
                let b = else_branch.gl_eval(frame, gc)?;
                if a.ty != b.ty {
                    return Err(unsupported(
                        format!("conditional with {} and {} branches", a.ty, b.ty),
                        phrase,
                    ));
                }
                Ok(gc.define(a.ty, format!("{} ? {} : {}", c, a, b)))
            }

            ExprKind::Dot { base, field } => {
                let v = base.gl_eval(frame, gc)?;
                match (component_index(*field), v.ty.count()) {
                    (Some(i), Some(n)) if v.ty.is_vec() && i < n => {
                        Ok(gc.define(GlType::Num, format!("{}.{}", v, COMPONENTS[i])))
                    }
                    _ => Err(unsupported(format!("field '{}' of {}", field, v.ty), phrase)),
                }
            }

            ExprKind::Index { base, index } => {
                let v = base.gl_eval(frame, gc)?;
                let Some(n) = v.ty.count().filter(|_| v.ty.is_vec()) else {
                    return Err(unsupported(format!("indexing a {}", v.ty), phrase));
                };
                let i = index.gl_eval(frame, gc)?;
                if i.ty != GlType::Num {
                    return Err(unsupported(format!("{} index", i.ty), &index.phrase));
                }
                // 字面量下标编译为分量选择，并在编译时检查范围
                if let Some(i) = i.literal() {
                    if i.fract() != 0.0 || i < 0.0 || i as usize >= n {
                        return Err(Exception::new(
                            ErrorKind::IndexOutOfRange {
                                index: Value::Num(i).to_string(),
                                len: n,
                            },
                            &Context::AtPhrase(&index.phrase, None),
                        ));
                    }
                    return Ok(gc.define(GlType::Num, format!("{}.{}", v, COMPONENTS[i as usize])));
                }
                // 动态下标在 GLSL 中没有越界错误，小数下标按 int() 截断
                Ok(gc.define(GlType::Num, format!("{}[int({})]", v, i)))
            }
        }
    }
}

/// 编译期已知的值作为内联字面量：数字、布尔、2 到 4 个数字组成的列表。
fn gl_constant(value: &Value, phrase: &Phrase) -> Result<GlValue, Exception> {
    match value {
        Value::Num(n) => GlValue::num(*n).ok_or_else(|| unsupported(format!("number {}", n), phrase)),
        Value::Bool(b) => Ok(GlValue::boolean(*b)),
        Value::List(_) => {
            let numbers = value
                .as_numbers()
                .ok_or_else(|| unsupported("list of non-numbers", phrase))?;
            let ty = GlType::with_count(numbers.len())
                .filter(|ty| ty.is_vec())
                .ok_or_else(|| unsupported(format!("list of {} numbers", numbers.len()), phrase))?;
            let parts = numbers
                .iter()
                .map(|n| {
                    GlValue::num(*n)
                        .map(|v| v.text)
                        .ok_or_else(|| unsupported(format!("number {}", n), phrase))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GlValue::new(format!("{}({})", ty, parts.join(", ")), ty))
        }
        other => Err(unsupported(other.type_name(), phrase)),
    }
}

// --- 调用 ---

enum Callee {
    Lambda(Rc<Lambda>, GlParent),
    Builtin(&'static Builtin),
}

fn concrete_callee(function: &Function) -> Callee {
    match function {
        Function::Closure { lambda, env } => Callee::Lambda(lambda.clone(), GlParent::Concrete(env.clone())),
        Function::Builtin(builtin) => Callee::Builtin(builtin),
    }
}

/// 被调用的函数必须在编译时就能确定：内建函数、捕获的闭包，或本地 `let` 定义的函数。
fn resolve_callee(function: &Expression, frame: &Rc<GlFrame>) -> Result<Callee, Exception> {
    let computed = || unsupported("call of a computed function value", &function.phrase);
    match &function.kind {
        ExprKind::Constant(Value::Function(f)) => Ok(concrete_callee(f)),
        ExprKind::Lambda(lambda) => Ok(Callee::Lambda(lambda.clone(), GlParent::Symbolic(frame.clone()))),
        ExprKind::Slot { depth, slot } => match frame.ancestor(*depth) {
            GlAncestor::Symbolic(owner) => {
                let definition = owner.pending(*slot).ok_or_else(computed)?;
                match &definition.kind {
                    ExprKind::Lambda(lambda) => Ok(Callee::Lambda(lambda.clone(), GlParent::Symbolic(owner))),
                    _ => Err(computed()),
                }
            }
            GlAncestor::Concrete(owner) => {
                match owner.force(*slot, &Context::AtPhrase(&function.phrase, None))? {
                    Value::Function(f) => Ok(concrete_callee(&f)),
                    _ => Err(computed()),
                }
            }
        },
        _ => Err(computed()),
    }
}

/// 如果参数里有向量，返回这个向量类型（所有向量必须同型）；否则返回 `float`。
fn common_type(args: &[GlValue], phrase: &Phrase) -> Result<GlType, Exception> {
    let mut ty = GlType::Num;
    for arg in args {
        if !arg.ty.is_numeric() {
            return Err(unsupported(format!("{} argument", arg.ty), phrase));
        }
        if arg.ty.is_vec() {
            if ty.is_vec() && ty != arg.ty {
                return Err(unsupported(format!("mixing {} and {}", ty, arg.ty), phrase));
            }
            ty = arg.ty;
        }
    }
    Ok(ty)
}

/// 标量显式扩展为向量，例如 `vec3(r1)`。
fn widen(value: &GlValue, ty: GlType) -> String {
    if value.ty == ty {
        value.text.clone()
    } else {
        format!("{}({})", ty, value.text)
    }
}

fn gl_builtin(
    builtin: &'static Builtin,
    args: Vec<GlValue>,
    phrase: &Phrase,
    gc: &mut GlCompiler,
) -> Result<GlValue, Exception> {
    let Some((name, signature)) = builtin.gl else {
        return Err(unsupported(format!("builtin '{}'", builtin.name), phrase));
    };
    if args.len() != builtin.arity {
        return Err(Exception::new(
            ErrorKind::ArgumentCount {
                expected: builtin.arity,
                found: args.len(),
            },
            &Context::AtPhrase(phrase, None),
        ));
    }
    let ty = common_type(&args, phrase)?;
    match signature {
        GlSignature::Map => Ok(gc.define(ty, format!("{}({})", name, args[0]))),
        GlSignature::Map2 | GlSignature::Map3 => {
            let parts: Vec<_> = args.iter().map(|arg| widen(arg, ty)).collect();
            Ok(gc.define(ty, format!("{}({})", name, parts.join(", "))))
        }
        GlSignature::Reduce => Ok(gc.define(GlType::Num, format!("{}({})", name, args[0]))),
        GlSignature::Reduce2 => {
            if args[0].ty != args[1].ty {
                return Err(unsupported(format!("{} of {} and {}", name, args[0].ty, args[1].ty), phrase));
            }
            Ok(gc.define(GlType::Num, format!("{}({}, {})", name, args[0], args[1])))
        }
    }
}

const MAX_UNROLLED_POWER: f64 = 16.0;

/// `x ^ n`，n 是整数：`x * x * x`，负数次幂取倒数，0 次幂是 1。
fn integer_power(base: &GlValue, n: i32, ty: GlType, gc: &mut GlCompiler) -> GlValue {
    let one = widen(&GlValue::new("1.0", GlType::Num), ty);
    let product = vec![base.text.as_str(); n.unsigned_abs() as usize].join(" * ");
    match n {
        0 => GlValue::new(one, ty),
        1 => base.clone(),
        n if n > 0 => gc.define(ty, product),
        _ => gc.define(ty, format!("{} / ({})", one, product)),
    }
}

fn gl_binary(
    op: BinaryOp,
    a: GlValue,
    b: GlValue,
    phrase: &Phrase,
    gc: &mut GlCompiler,
) -> Result<GlValue, Exception> {
    let mismatch = || unsupported(format!("{} {} {}", a.ty, op.symbol(), b.ty), phrase);
    match op {
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => {
            // GLSL 允许 float 与向量混合运算
            let ty = common_type(&[a.clone(), b.clone()], phrase).map_err(|_| mismatch())?;
            Ok(gc.define(ty, format!("{} {} {}", a, op.symbol(), b)))
        }
        BinaryOp::Power => {
            let ty = common_type(&[a.clone(), b.clone()], phrase).map_err(|_| mismatch())?;
            let Some(n) = b.literal() else {
                return Err(unsupported("exponent that is not a constant number", phrase));
            };
            // GLSL 的 pow 对负底数没有定义，整数次幂展开成乘法
            if n.fract() == 0.0 && n.abs() <= MAX_UNROLLED_POWER {
                return Ok(integer_power(&a, n as i32, ty, gc));
            }
            Ok(gc.define(ty, format!("pow({}, {})", widen(&a, ty), widen(&b, ty))))
        }
        BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
            if a.ty != GlType::Num || b.ty != GlType::Num {
                return Err(mismatch());
            }
            Ok(gc.define(GlType::Bool, format!("{} {} {}", a, op.symbol(), b)))
        }
        BinaryOp::Eq | BinaryOp::NotEq => {
            if a.ty != b.ty {
                return Err(mismatch());
            }
            Ok(gc.define(GlType::Bool, format!("{} {} {}", a, op.symbol(), b)))
        }
        BinaryOp::And | BinaryOp::Or => {
            if a.ty != GlType::Bool || b.ty != GlType::Bool {
                return Err(mismatch());
            }
            Ok(gc.define(GlType::Bool, format!("{} {} {}", a, op.symbol(), b)))
        }
    }
}
