// In src/runtime/eval.rs

//! 解释执行：对 Meaning 图的每一种节点给出具体的求值规则。
//! 着色器代码生成对同一组节点的另一套规则在 `codegen/expression.rs`。

use crate::analyzer::{ExprKind, Expression};
use crate::parser::ast::{BinaryOp, Phrase, UnaryOp};
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::value::{component_index, wrong_type};
use crate::runtime::{CallSite, Context, Frame, Function, ModuleValue, Value};
use crate::utils::AtomMap;
use std::rc::Rc;
use tracing::trace;

impl Expression {
    pub fn eval(&self, frame: &Rc<Frame>) -> Result<Value, Exception> {
        let here = Context::AtPhrase(&self.phrase, Some(frame));
        match &self.kind {
            ExprKind::Constant(value) => Ok(value.clone()),

            ExprKind::Slot { depth, slot } => frame.ancestor(*depth).force(*slot, &here),

            ExprKind::Call { function, args } => {
                let callee = function.eval(frame)?;
                let args = args
                    .iter()
                    .map(|arg| arg.eval(frame))
                    .collect::<Result<Vec<_>, _>>()?;
                match &callee {
                    Value::Function(function) => call_function(function, args, frame, &self.phrase),
                    other => Err(wrong_type(
                        "function",
                        other,
                        &Context::AtPhrase(&function.phrase, Some(frame)),
                    )),
                }
            }

            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| item.eval(frame))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(items))
            }

            ExprKind::Record(fields) => {
                let mut record = AtomMap::with_capacity(fields.len());
                for (name, expr) in fields {
                    record.insert(*name, expr.eval(frame)?);
                }
                Ok(Value::Record(Rc::new(record)))
            }

            ExprKind::Module(module) => {
                let module_frame = Frame::child(module.nslots, frame);
                for (slot, definition) in &module.definitions {
                    module_frame.set_pending(*slot, definition.clone());
                }
                Ok(Value::Module(Rc::new(ModuleValue {
                    frame: module_frame,
                    fields: module.fields.clone(),
                })))
            }

            ExprKind::Let { bindings, body } => {
                for (slot, definition) in bindings {
                    frame.set_pending(*slot, definition.clone());
                }
                body.eval(frame)
            }

            ExprKind::Lambda(lambda) => Ok(Value::Function(Rc::new(Function::Closure {
                lambda: lambda.clone(),
                env: frame.clone(),
            }))),

            ExprKind::Unary { op, operand } => {
                let value = operand.eval(frame)?;
                let cx = Context::AtPhrase(&operand.phrase, Some(frame));
                match op {
                    UnaryOp::Negate => negate(&value, &cx),
                    UnaryOp::Not => Ok(Value::Bool(!value.to_bool(&cx)?)),
                }
            }

            ExprKind::Binary { op, left, right } => {
                let left_cx = Context::AtPhrase(&left.phrase, Some(frame));
                let right_cx = Context::AtPhrase(&right.phrase, Some(frame));
                // 逻辑运算短路
                match op {
                    BinaryOp::And => {
                        if !left.eval(frame)?.to_bool(&left_cx)? {
                            return Ok(Value::Bool(false));
                        }
                        return Ok(Value::Bool(right.eval(frame)?.to_bool(&right_cx)?));
                    }
                    BinaryOp::Or => {
                        if left.eval(frame)?.to_bool(&left_cx)? {
                            return Ok(Value::Bool(true));
                        }
                        return Ok(Value::Bool(right.eval(frame)?.to_bool(&right_cx)?));
                    }
                    _ => {}
                }

                let a = left.eval(frame)?;
                let b = right.eval(frame)?;
                match op {
                    BinaryOp::Add => arith(|x, y| x + y, &a, &b, &here),
                    BinaryOp::Subtract => arith(|x, y| x - y, &a, &b, &here),
                    BinaryOp::Multiply => arith(|x, y| x * y, &a, &b, &here),
                    BinaryOp::Divide => arith(|x, y| x / y, &a, &b, &here),
                    BinaryOp::Power => arith(f64::powf, &a, &b, &here),
                    BinaryOp::Lt => Ok(Value::Bool(a.to_num(&left_cx)? < b.to_num(&right_cx)?)),
                    BinaryOp::Lte => Ok(Value::Bool(a.to_num(&left_cx)? <= b.to_num(&right_cx)?)),
                    BinaryOp::Gt => Ok(Value::Bool(a.to_num(&left_cx)? > b.to_num(&right_cx)?)),
                    BinaryOp::Gte => Ok(Value::Bool(a.to_num(&left_cx)? >= b.to_num(&right_cx)?)),
                    BinaryOp::Eq => Ok(Value::Bool(a.equal(&b))),
                    BinaryOp::NotEq => Ok(Value::Bool(!a.equal(&b))),
                    BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
                }
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cx = Context::AtPhrase(&condition.phrase, Some(frame));
                if condition.eval(frame)?.to_bool(&cx)? {
                    then_branch.eval(frame)
                } else {
                    else_branch.eval(frame)
                }
            }

            ExprKind::Dot { base, field } => {
                let value = base.eval(frame)?;
                if let Some(found) = value.field(*field, &here)? {
                    return Ok(found);
                }
                // 数字向量支持 .x .y .z .w
                if let (Some(numbers), Some(i)) = (value.as_numbers(), component_index(*field)) {
                    if i < numbers.len() {
                        return Ok(Value::Num(numbers[i]));
                    }
                }
                match value {
                    Value::Record(_) | Value::Module(_) | Value::List(_) => Err(Exception::new(
                        ErrorKind::NoSuchField {
                            name: field.to_string(),
                        },
                        &here,
                    )),
                    other => Err(wrong_type(
                        "record or module",
                        &other,
                        &Context::AtPhrase(&base.phrase, Some(frame)),
                    )),
                }
            }

            ExprKind::Index { base, index } => {
                let list = base.eval(frame)?;
                let items = list.to_list(&Context::AtPhrase(&base.phrase, Some(frame)))?;
                let i = index
                    .eval(frame)?
                    .to_num(&Context::AtPhrase(&index.phrase, Some(frame)))?;
                if i.fract() != 0.0 || i < 0.0 || i as usize >= items.len() {
                    return Err(Exception::new(
                        ErrorKind::IndexOutOfRange {
                            index: Value::Num(i).to_string(),
                            len: items.len(),
                        },
                        &Context::AtPhrase(&index.phrase, Some(frame)),
                    ));
                }
                Ok(items[i as usize].clone())
            }

            ExprKind::For { nslots, list, body } => {
                let list = list.eval(frame)?;
                let items = list.to_list(&here)?;
                let mut results = Vec::with_capacity(items.len());
                // 每次迭代一个新帧：循环变量在 0 号槽位
                for item in items.iter() {
                    let iteration = Frame::child(*nslots, frame);
                    iteration.set(0, item.clone());
                    results.push(body.eval(&iteration)?);
                }
                Ok(Value::from(results))
            }
        }
    }
}

/// 调用一个函数值。`caller` 是发起调用的帧，`phrase` 是调用表达式。
pub fn call_function(
    function: &Function,
    args: Vec<Value>,
    caller: &Rc<Frame>,
    phrase: &Rc<Phrase>,
) -> Result<Value, Exception> {
    if args.len() != function.arity() {
        return Err(Exception::new(
            ErrorKind::ArgumentCount {
                expected: function.arity(),
                found: args.len(),
            },
            &Context::AtPhrase(phrase, Some(caller)),
        ));
    }
    match function {
        Function::Closure { lambda, env } => {
            let frame = Frame::call(lambda.nslots, env.clone(), caller, phrase)?;
            trace!(depth = frame.depth, "call at {}", phrase.location);
            for (slot, arg) in args.into_iter().enumerate() {
                frame.set(slot, arg);
            }
            lambda.body.eval(&frame)
        }
        Function::Builtin(builtin) => (builtin.call)(
            &args,
            &CallSite {
                frame: caller,
                phrase,
            },
        ),
    }
}

/// 算术运算。数字与列表之间逐元素广播，列表与列表要求等长。
fn arith(f: fn(f64, f64) -> f64, a: &Value, b: &Value, cx: &Context) -> Result<Value, Exception> {
    match (a, b) {
        (Value::Num(x), Value::Num(y)) => Ok(Value::Num(f(*x, *y))),
        (Value::List(xs), Value::Num(_)) => xs
            .iter()
            .map(|x| arith(f, x, b, cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::from),
        (Value::Num(_), Value::List(ys)) => ys
            .iter()
            .map(|y| arith(f, a, y, cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::from),
        (Value::List(xs), Value::List(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys.iter())
            .map(|(x, y)| arith(f, x, y, cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::from),
        (Value::List(xs), Value::List(ys)) => Err(Exception::new(
            ErrorKind::WrongType {
                expected: format!("list of length {}", xs.len()),
                found: format!("list of length {}", ys.len()),
            },
            cx,
        )),
        (Value::Num(_) | Value::List(_), other) => Err(wrong_type("number", other, cx)),
        (other, _) => Err(wrong_type("number", other, cx)),
    }
}

fn negate(value: &Value, cx: &Context) -> Result<Value, Exception> {
    match value {
        Value::Num(n) => Ok(Value::Num(-n)),
        Value::List(items) => items
            .iter()
            .map(|item| negate(item, cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::from),
        other => Err(wrong_type("number", other, cx)),
    }
}
