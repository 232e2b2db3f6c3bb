//! src/geom/mod.rs
//!
//! 形状：识别求值结果中的形状，解释执行它的距离/颜色函数，
//! 或者把这两个函数导出为 GLSL。

mod bbox;
mod glsl;
mod shape;

#[cfg(test)]
mod test;

pub use bbox::BBox;
pub use glsl::glsl_function_export;
pub use shape::{Shape, ShapeProgram};
