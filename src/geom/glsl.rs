// In src/geom/glsl.rs

use super::ShapeProgram;
use crate::codegen::{GlCompiler, GlType, GlValue};
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::Context;
use tracing::{debug, instrument};

/// 把一个已识别的形状导出为两个自包含的 GLSL 函数：
///
/// ```glsl
/// float dist(vec4 r0) { ... }
/// vec3 colour(vec4 r0) { ... }
/// ```
///
/// 两个函数由两个独立的 GlCompiler 编译，名字互不相干。
#[instrument(skip_all)]
pub fn glsl_function_export(shape: &ShapeProgram, out: &mut String) -> Result<(), Exception> {
    export_function(shape, "dist", GlType::Num, ShapeProgram::gl_dist, out)?;
    export_function(shape, "colour", GlType::Vec3, ShapeProgram::gl_colour, out)?;
    Ok(())
}

fn export_function(
    shape: &ShapeProgram,
    name: &str,
    result_type: GlType,
    compile: fn(&ShapeProgram, GlValue, &mut GlCompiler) -> Result<GlValue, Exception>,
    out: &mut String,
) -> Result<(), Exception> {
    let mut gc = GlCompiler::new();
    let param = GlValue::new("r0", GlType::Vec4);
    let result = compile(shape, param, &mut gc)?;

    if result.ty != result_type {
        let lambda = if name == "dist" { &shape.dist_fun } else { &shape.colour_fun };
        let cx = match lambda {
            Some(lambda) => Context::AtPhrase(&lambda.body.phrase, None),
            None => Context::Empty,
        };
        return Err(Exception::new(
            ErrorKind::WrongType {
                expected: format!("{} result from {}", result_type, name),
                found: result.ty.to_string(),
            },
            &cx,
        ));
    }

    debug!(name, bytes = gc.body().len(), "exported");
    out.push_str(&format!("{} {}(vec4 r0)\n{{\n", result_type, name));
    out.push_str(gc.body());
    out.push_str(&format!("  return {};\n}}\n", result));
    Ok(())
}
