pub mod analyzer;
pub mod codegen;
pub mod diagnostics;
pub mod geom;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod reporter;
pub mod runtime;
pub mod system;
pub mod utils;

use geom::{ShapeProgram, glsl_function_export};
use program::Program;
use reporter::CompilerError;
use std::rc::Rc;
use system::System;
use utils::Source;

// In src/lib.rs
/// 编译一个形状程序，导出它的 GLSL 函数。
///
/// # Arguments
/// * `name` - 源代码的名字，出现在诊断中。
/// * `text` - 源代码。
///
/// # Returns
/// * `Ok(String)` 包含 `dist` 和 `colour` 两个 GLSL 函数。
/// * `Err(Vec<CompilerError>)` 包含所有遇到的错误。
pub fn compile_glsl(name: &str, text: &str, system: Rc<System>) -> Result<String, Vec<CompilerError>> {
    // 1. 词法、语法分析和名字解析
    let mut program = Program::new(Source::new(name, text), system);
    program.compile(None, None)?;

    // 2. 求值并识别形状
    let value = program.eval().map_err(|e| vec![e.into()])?;
    let mut shape = ShapeProgram::new(&program);
    shape.require_shape(&value).map_err(|e| vec![e.into()])?;

    // 3. 代码生成
    let mut glsl = String::new();
    glsl_function_export(&shape, &mut glsl).map_err(|e| vec![e.into()])?;
    Ok(glsl)
}
