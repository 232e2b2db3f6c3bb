// In src/runtime/value.rs

use crate::analyzer::Lambda;
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Builtin, Context, Frame};
use crate::utils::{Atom, AtomMap};
use std::fmt;
use std::rc::Rc;

/// 动态类型的运行期值。克隆只复制引用计数。
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Text(Rc<str>),
    List(Rc<[Value]>),
    Record(Rc<AtomMap<Value>>),
    Module(Rc<ModuleValue>),
    Function(Rc<Function>),
}

/// 模块值：字段是模块帧中的槽位，第一次读取时才求值。
#[derive(Debug)]
pub struct ModuleValue {
    pub frame: Rc<Frame>,
    pub fields: AtomMap<usize>,
}

impl ModuleValue {
    pub fn get(&self, name: Atom, cx: &Context) -> Option<Result<Value, Exception>> {
        self.fields
            .get(&name)
            .map(|&slot| self.frame.force(slot, cx))
    }
}

#[derive(Debug)]
pub enum Function {
    /// 用户定义的函数：Lambda 加上它捕获的帧
    Closure { lambda: Rc<Lambda>, env: Rc<Frame> },
    Builtin(&'static Builtin),
}

impl Function {
    pub fn arity(&self) -> usize {
        match self {
            Function::Closure { lambda, .. } => lambda.nparams,
            Function::Builtin(builtin) => builtin.arity,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Module(_) => "module",
            Value::Function(_) => "function",
        }
    }

    pub fn to_num(&self, cx: &Context) -> Result<f64, Exception> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(wrong_type("number", other, cx)),
        }
    }

    pub fn to_bool(&self, cx: &Context) -> Result<bool, Exception> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(wrong_type("bool", other, cx)),
        }
    }

    pub fn to_list(&self, cx: &Context) -> Result<&Rc<[Value]>, Exception> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(wrong_type("list", other, cx)),
        }
    }

    /// 若是全部由数字组成的列表，返回这些数字。
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|item| match item {
                    Value::Num(n) => Some(*n),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }

    /// 读取记录或模块的字段。其他类型的值没有字段，返回 `Ok(None)`。
    pub fn field(&self, name: Atom, cx: &Context) -> Result<Option<Value>, Exception> {
        match self {
            Value::Record(fields) => Ok(fields.get(&name).cloned()),
            Value::Module(module) => module.get(name, cx).transpose(),
            _ => Ok(None),
        }
    }

    /// 结构相等。函数和模块按身份比较。
    pub fn equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equal(y))
            }
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(name, x)| b.get(name).is_some_and(|y| x.equal(y)))
            }
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub(crate) fn wrong_type(expected: &str, found: &Value, cx: &Context) -> Exception {
    Exception::new(
        ErrorKind::WrongType {
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        },
        cx,
    )
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Rc::from(items))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            // 整数不打印小数部分
            Value::Num(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            Value::Num(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, value)?;
                }
                write!(f, "}}")
            }
            Value::Module(module) => {
                write!(f, "{{")?;
                for (i, name) in module.fields.keys().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{}=...", name)?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => match function.as_ref() {
                Function::Closure { lambda, .. } => write!(f, "<function/{}>", lambda.nparams),
                Function::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name),
            },
        }
    }
}

/// 向量分量名 `x y z w` 对应的下标。
pub fn component_index(field: Atom) -> Option<usize> {
    match field.as_str() {
        "x" => Some(0),
        "y" => Some(1),
        "z" => Some(2),
        "w" => Some(3),
        _ => None,
    }
}
