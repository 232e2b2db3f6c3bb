//! src/runtime/mod.rs
//!
//! 解释执行：活动记录 (Frame)、运行期的值 (Value)、诊断上下文 (Context)
//! 以及内建函数库。`Expression::eval` 定义在 `eval.rs` 中。

pub mod builtins;
mod context;
mod eval;
mod frame;
mod value;


pub use builtins::{Builtin, CallSite, GlSignature};
pub use context::Context;
pub use eval::call_function;
pub use frame::{Frame, Slot};
pub use value::{Function, ModuleValue, Value, component_index};
