// In src/geom/test.rs

use super::*;
use crate::program::Program;
use crate::reporter::{CompilerError, ErrorKind, Exception};
use crate::runtime::Value;
use crate::system::System;
use crate::utils::Source;
use std::collections::HashMap;
use std::rc::Rc;

// --- Test Harness ---

fn evaluated(text: &str) -> (Program, Value) {
    let mut program = Program::new(Source::new("shape", text), Rc::new(System::default()));
    if let Err(errors) = program.compile(None, None) {
        panic!("Compilation failed for {}: {:?}", text, errors);
    }
    let value = match program.eval() {
        Ok(value) => value,
        Err(e) => panic!("Evaluation failed for {}: {:?}", text, e),
    };
    (program, value)
}

/// 求值并识别形状，识别失败就 panic。
fn shape_of(text: &str) -> ShapeProgram {
    let (program, value) = evaluated(text);
    let mut shape = ShapeProgram::new(&program);
    assert!(shape.recognize(&value).unwrap(), "{} should be recognized as a shape", text);
    shape
}

fn not_a_shape(text: &str) {
    let (program, value) = evaluated(text);
    let mut shape = ShapeProgram::new(&program);
    assert!(!shape.recognize(&value).unwrap(), "{} should not be a shape", text);
    assert!(!shape.is_shape());
}

fn glsl_of(shape: &ShapeProgram) -> Result<String, Exception> {
    let mut out = String::new();
    glsl_function_export(shape, &mut out)?;
    Ok(out)
}

const CIRCLE: &str = "{ is_2d_shape: true, dist: (p, t) -> length(p) - 1, colour: (p, t) -> [1, 0, 0] }";

// --- 识别 ---

#[test]
fn test_circle_is_recognized_and_evaluated() {
    let shape = shape_of(CIRCLE);
    assert!(shape.is_2d());
    assert!(!shape.is_3d());
    assert_eq!(shape.bbox(), BBox::infinite2());
    assert_eq!(shape.dist(0.0, 0.0, 0.0, 0.0).unwrap(), -1.0);
    assert_eq!(shape.dist(3.0, 4.0, 0.0, 0.0).unwrap(), 4.0);
    assert_eq!(shape.colour(0.0, 0.0, 0.0, 0.0).unwrap(), [1.0, 0.0, 0.0]);
}

#[test]
fn test_recognition_is_one_way() {
    let (program, value) = evaluated(CIRCLE);
    let mut shape = ShapeProgram::new(&program);
    assert!(shape.recognize(&value).unwrap());
    let frame = shape.dist_frame.clone().unwrap();

    // 再次识别（哪怕是别的值）不会改变已捕获的状态
    assert!(shape.recognize(&value).unwrap());
    assert!(shape.recognize(&Value::Num(1.0)).unwrap());
    assert!(Rc::ptr_eq(&frame, shape.dist_frame.as_ref().unwrap()));
}

#[test]
fn test_module_shape_with_defaults() {
    let shape = shape_of("{ r = 2; dist(p, t) = length(p) - r; colour(p, t) = [0, 1, 0] }");
    assert!(shape.is_3d());
    assert!(!shape.is_2d());
    assert_eq!(shape.bbox(), BBox::infinite3());
    assert_eq!(shape.dist(0.0, 3.0, 0.0, 0.0).unwrap(), 1.0);
}

#[test]
fn test_single_parameter_functions_receive_a_4_vector() {
    let shape = shape_of("{ dist: q -> q.w, colour: q -> [q.x, q.y, q.z] }");
    assert_eq!(shape.dist(1.0, 2.0, 3.0, 4.0).unwrap(), 4.0);
    assert_eq!(shape.colour(1.0, 2.0, 3.0, 4.0).unwrap(), [1.0, 2.0, 3.0]);
}

#[test]
fn test_captured_frame_is_reset_between_calls() {
    let shape = shape_of("{ dist: (p, t) -> let d = length(p) in d - t, colour: (p, t) -> [1, 1, 1] }");
    assert_eq!(shape.dist(3.0, 4.0, 0.0, 1.0).unwrap(), 4.0);
    assert_eq!(shape.dist(0.0, 0.0, 0.0, 1.0).unwrap(), -1.0);
}

#[test]
fn test_explicit_bbox() {
    let shape = shape_of(
        "{ is_2d_shape: true, bbox: [[-1, -2], [1, 2]], dist: p -> 0, colour: p -> [0, 0, 0] }",
    );
    assert_eq!(shape.bbox().size2(), [2.0, 4.0]);
}

#[test]
fn test_values_that_are_not_shapes() {
    not_a_shape("42");
    not_a_shape("{ dist: 1, colour: 2 }");
    not_a_shape("{ dist: (a, b, c) -> 0, colour: p -> [0, 0, 0] }");
    not_a_shape("{ dist: p -> 0 }");
    not_a_shape("{ dist: p -> 0, colour: p -> [0, 0, 0], bbox: [1, 2] }");
    not_a_shape("{ dist: p -> 0, colour: p -> [0, 0, 0], is_2d_shape: 1 }");
    not_a_shape("{ dist: sqrt, colour: p -> [0, 0, 0] }");
}

#[test]
fn test_require_shape_reports_the_whole_program() {
    let (program, value) = evaluated("[1, 2, 3]");
    let mut shape = ShapeProgram::new(&program);
    let e = shape.require_shape(&value).unwrap_err();
    assert_eq!(e.kind, ErrorKind::NotAShape);
    assert_eq!(e.locations[0].text(), "[1, 2, 3]");
}

#[test]
fn test_colour_must_be_three_numbers() {
    let shape = shape_of("{ dist: p -> 0, colour: p -> [1, 2] }");
    let e = shape.colour(0.0, 0.0, 0.0, 0.0).unwrap_err();
    assert!(matches!(e.kind, ErrorKind::WrongType { .. }));
}

// --- GLSL 导出 ---

#[test]
fn test_circle_exports_to_glsl() {
    let glsl = glsl_of(&shape_of(CIRCLE)).unwrap();
    let expected = "\
float dist(vec4 r0)
{
  vec3 r1 = r0.xyz;
  float r2 = r0.w;
  float r3 = length(r1);
  float r4 = r3 - 1.0;
  return r4;
}
vec3 colour(vec4 r0)
{
  vec3 r1 = r0.xyz;
  float r2 = r0.w;
  vec3 r3 = vec3(1.0, 0.0, 0.0);
  return r3;
}
";
    assert_eq!(glsl, expected);
}

#[test]
fn test_export_inlines_module_constants() {
    let glsl = glsl_of(&shape_of(
        "{ r = 2; dist(p, t) = length(p) - r; colour(p, t) = [0, 1, 0] }",
    ))
    .unwrap();
    assert!(glsl.contains("float r4 = r3 - 2.0;"), "glsl was:\n{}", glsl);
}

#[test]
fn test_export_of_single_parameter_form() {
    let glsl = glsl_of(&shape_of("{ dist: q -> q.w, colour: q -> [q.x, q.y, q.z] }")).unwrap();
    assert!(glsl.starts_with("float dist(vec4 r0)\n{\n  float r1 = r0.w;\n  return r1;\n}\n"));
}

#[test]
fn test_loop_in_dist_is_rejected_but_still_interpretable() {
    let shape = shape_of(
        "{ dist: (p, t) -> sum(for (i in [1, 2]) i) + length(p), colour: (p, t) -> [1, 1, 1] }",
    );
    assert_eq!(shape.dist(0.0, 0.0, 0.0, 0.0).unwrap(), 3.0);

    let e = glsl_of(&shape).unwrap_err();
    assert_eq!(e.kind, ErrorKind::UnsupportedInShader { what: "for loop".to_string() });
    assert_eq!(e.locations[0].text(), "for (i in [1, 2]) i");
}

#[test]
fn test_export_checks_result_types() {
    let e = glsl_of(&shape_of("{ dist: (p, t) -> p, colour: (p, t) -> p }")).unwrap_err();
    assert_eq!(
        e.kind,
        ErrorKind::WrongType {
            expected: "float result from dist".to_string(),
            found: "vec3".to_string()
        }
    );
}

#[test]
fn test_compile_glsl_pipeline() {
    let glsl = crate::compile_glsl("circle", CIRCLE, Rc::new(System::default())).unwrap();
    assert!(glsl.contains("float dist(vec4"));
    assert!(glsl.contains("length("));

    let errors = crate::compile_glsl("num", "1 + 1", Rc::new(System::default())).unwrap_err();
    assert!(matches!(&errors[..], [CompilerError::Exception(e)] if e.kind == ErrorKind::NotAShape));
}

// --- 包围盒 ---

#[test]
fn test_bbox_from_value() {
    let (_, value) = evaluated("[[0, 0, 0], [1, 2, 3]]");
    let bbox = BBox::from_value(&value).unwrap();
    assert_eq!(bbox.size3(), [1.0, 2.0, 3.0]);

    let (_, value) = evaluated("[[0, 0], [1, 2, 3]]");
    assert!(BBox::from_value(&value).is_none());
    assert_eq!(BBox::empty2().zmin, 0.0);
    assert!(BBox::empty3().zmin > BBox::empty3().zmax);
}

// --- GLSL 数值求值 ---
//
// 按 GLSL 的语义逐行执行导出的函数，用来与解释执行的结果比较。
// 只覆盖几何编译器会产生的那部分语法。

#[derive(Debug, Clone, PartialEq)]
enum GlNum {
    Bool(bool),
    Num(f64),
    Vec(Vec<f64>),
}

impl GlNum {
    fn num(&self) -> f64 {
        match self {
            GlNum::Num(n) => *n,
            other => panic!("expected float, got {:?}", other),
        }
    }

    fn boolean(&self) -> bool {
        match self {
            GlNum::Bool(b) => *b,
            other => panic!("expected bool, got {:?}", other),
        }
    }

    /// 构造函数参数：向量展开成分量
    fn components(&self) -> Vec<f64> {
        match self {
            GlNum::Num(n) => vec![*n],
            GlNum::Vec(v) => v.clone(),
            GlNum::Bool(b) => panic!("bool {} used as a number", b),
        }
    }
}

/// 逐分量运算，float 与向量混合时 float 参与每一个分量。
fn zip_with(args: &[GlNum], f: impl Fn(&[f64]) -> f64) -> GlNum {
    let len = args.iter().find_map(|arg| match arg {
        GlNum::Vec(v) => Some(v.len()),
        _ => None,
    });
    let component = |i: usize| {
        let xs: Vec<f64> = args
            .iter()
            .map(|arg| match arg {
                GlNum::Num(n) => *n,
                GlNum::Vec(v) => {
                    assert_eq!(Some(v.len()), len, "mixed vector sizes");
                    v[i]
                }
                GlNum::Bool(b) => panic!("bool {} used as a number", b),
            })
            .collect();
        f(&xs)
    };
    match len {
        None => GlNum::Num(component(0)),
        Some(n) => GlNum::Vec((0..n).map(component).collect()),
    }
}

/// 大多数 GPU 上 pow(x, y) = exp2(y * log2(x))，x < 0 时得到 NaN。
fn gpu_pow(x: f64, y: f64) -> f64 {
    if x < 0.0 { f64::NAN } else { x.powf(y) }
}

fn call_gl(name: &str, args: Vec<GlNum>) -> GlNum {
    let n = |i: usize| args[i].num();
    match name {
        "vec2" | "vec3" | "vec4" => {
            let size = (name.as_bytes()[3] - b'0') as usize;
            let parts: Vec<f64> = args.iter().flat_map(GlNum::components).collect();
            if parts.len() == 1 {
                GlNum::Vec(vec![parts[0]; size])
            } else {
                assert_eq!(parts.len(), size, "{}() with {} components", name, parts.len());
                GlNum::Vec(parts)
            }
        }
        "int" => GlNum::Num(n(0).trunc()),
        "length" => GlNum::Num(args[0].components().iter().map(|x| x * x).sum::<f64>().sqrt()),
        "dot" => GlNum::Num(
            args[0]
                .components()
                .iter()
                .zip(args[1].components())
                .map(|(a, b)| a * b)
                .sum(),
        ),
        "sqrt" => zip_with(&args, |x| x[0].sqrt()),
        "abs" => zip_with(&args, |x| x[0].abs()),
        "sin" => zip_with(&args, |x| x[0].sin()),
        "cos" => zip_with(&args, |x| x[0].cos()),
        "tan" => zip_with(&args, |x| x[0].tan()),
        "exp" => zip_with(&args, |x| x[0].exp()),
        "log" => zip_with(&args, |x| x[0].ln()),
        "floor" => zip_with(&args, |x| x[0].floor()),
        "ceil" => zip_with(&args, |x| x[0].ceil()),
        "atan" => zip_with(&args, |x| x[0].atan2(x[1])),
        "min" => zip_with(&args, |x| x[0].min(x[1])),
        "max" => zip_with(&args, |x| x[0].max(x[1])),
        "mod" => zip_with(&args, |x| x[0] - x[1] * (x[0] / x[1]).floor()),
        "pow" => zip_with(&args, |x| gpu_pow(x[0], x[1])),
        "mix" => zip_with(&args, |x| x[0] + (x[1] - x[0]) * x[2]),
        "clamp" => zip_with(&args, |x| x[0].max(x[1]).min(x[2])),
        other => panic!("unknown GLSL function {}", other),
    }
}

fn gl_tokens(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        if c.is_whitespace() {
            i += 1;
            continue;
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '-' || chars[i] == '+') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
        } else if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
        } else {
            let pair: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            i += if ["<=", ">=", "==", "!=", "&&", "||"].contains(&pair.as_str()) { 2 } else { 1 };
        }
        tokens.push(chars[start..i].iter().collect());
    }
    tokens
}

struct GlExprParser<'a> {
    tokens: Vec<String>,
    pos: usize,
    env: &'a HashMap<String, GlNum>,
}

impl GlExprParser<'_> {
    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn next(&mut self) -> String {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn expect(&mut self, token: &str) {
        assert_eq!(self.next(), token);
    }

    fn ternary(&mut self) -> GlNum {
        let c = self.binary(0);
        if self.peek() != Some("?") {
            return c;
        }
        self.next();
        let a = self.ternary();
        self.expect(":");
        let b = self.ternary();
        if c.boolean() { a } else { b }
    }

    fn binary(&mut self, level: usize) -> GlNum {
        const LEVELS: [&[&str]; 6] = [
            &["||"],
            &["&&"],
            &["==", "!="],
            &["<", "<=", ">", ">="],
            &["+", "-"],
            &["*", "/"],
        ];
        if level == LEVELS.len() {
            return self.unary();
        }
        let mut left = self.binary(level + 1);
        while let Some(op) = self.peek().filter(|t| LEVELS[level].contains(t)).map(str::to_string) {
            self.next();
            let right = self.binary(level + 1);
            left = match op.as_str() {
                "||" => GlNum::Bool(left.boolean() || right.boolean()),
                "&&" => GlNum::Bool(left.boolean() && right.boolean()),
                "==" => GlNum::Bool(left == right),
                "!=" => GlNum::Bool(left != right),
                "<" => GlNum::Bool(left.num() < right.num()),
                "<=" => GlNum::Bool(left.num() <= right.num()),
                ">" => GlNum::Bool(left.num() > right.num()),
                ">=" => GlNum::Bool(left.num() >= right.num()),
                "+" => zip_with(&[left, right], |x| x[0] + x[1]),
                "-" => zip_with(&[left, right], |x| x[0] - x[1]),
                "*" => zip_with(&[left, right], |x| x[0] * x[1]),
                _ => zip_with(&[left, right], |x| x[0] / x[1]),
            };
        }
        left
    }

    fn unary(&mut self) -> GlNum {
        match self.peek() {
            Some("-") => {
                self.next();
                zip_with(&[self.unary()], |x| -x[0])
            }
            Some("!") => {
                self.next();
                GlNum::Bool(!self.unary().boolean())
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> GlNum {
        let mut value = self.primary();
        loop {
            match self.peek() {
                Some(".") => {
                    self.next();
                    let v = value.components();
                    let picked: Vec<f64> = self
                        .next()
                        .chars()
                        .map(|c| v["xyzw".find(c).unwrap()])
                        .collect();
                    value = if picked.len() == 1 {
                        GlNum::Num(picked[0])
                    } else {
                        GlNum::Vec(picked)
                    };
                }
                Some("[") => {
                    self.next();
                    let i = self.ternary().num();
                    self.expect("]");
                    // 越界的动态下标在 GLSL 中没有定义
                    value = GlNum::Num(*value.components().get(i as usize).unwrap_or(&f64::NAN));
                }
                _ => return value,
            }
        }
    }

    fn primary(&mut self) -> GlNum {
        let token = self.next();
        if token == "(" {
            let value = self.ternary();
            self.expect(")");
            return value;
        }
        if let Ok(n) = token.parse::<f64>() {
            return GlNum::Num(n);
        }
        match token.as_str() {
            "true" => return GlNum::Bool(true),
            "false" => return GlNum::Bool(false),
            _ => {}
        }
        if self.peek() == Some("(") {
            self.next();
            let mut args = Vec::new();
            while self.peek() != Some(")") {
                args.push(self.ternary());
                if self.peek() == Some(",") {
                    self.next();
                }
            }
            self.expect(")");
            return call_gl(&token, args);
        }
        match self.env.get(&token) {
            Some(value) => value.clone(),
            None => panic!("undefined name {}", token),
        }
    }
}

fn eval_gl_expr(text: &str, env: &HashMap<String, GlNum>) -> GlNum {
    let mut parser = GlExprParser {
        tokens: gl_tokens(text),
        pos: 0,
        env,
    };
    let value = parser.ternary();
    assert_eq!(parser.pos, parser.tokens.len(), "trailing tokens in {}", text);
    value
}

/// 执行导出文本中名为 `name` 的函数，参数 `r0 = vec4(x, y, z, t)`。
fn run_glsl(glsl: &str, name: &str, point: [f64; 4]) -> GlNum {
    let header = format!(" {}(vec4 r0)\n{{\n", name);
    let start = glsl.find(&header).unwrap_or_else(|| panic!("no function {} in\n{}", name, glsl)) + header.len();
    let mut env = HashMap::new();
    env.insert("r0".to_string(), GlNum::Vec(point.to_vec()));
    for line in glsl[start..].lines() {
        let line = line.trim().trim_end_matches(';');
        if let Some(result) = line.strip_prefix("return ") {
            return eval_gl_expr(result, &env);
        }
        let (decl, rhs) = line.split_once(" = ").unwrap_or_else(|| panic!("unexpected line {}", line));
        let name = decl.split_whitespace().nth(1).unwrap().to_string();
        let value = eval_gl_expr(rhs, &env);
        env.insert(name, value);
    }
    panic!("function {} has no return", name)
}

fn assert_close(interpreted: f64, compiled: f64, what: &str) {
    let agree = interpreted == compiled
        || (interpreted.is_nan() && compiled.is_nan())
        || (interpreted - compiled).abs() <= 1e-9 * interpreted.abs().max(1.0);
    assert!(agree, "{}: interpreted {} but GLSL gives {}", what, interpreted, compiled);
}

const SAMPLE_POINTS: [[f64; 4]; 6] = [
    [0.0, 0.0, 0.0, 0.0],
    [-2.0, 0.0, 0.0, 0.0],
    [3.0, -4.0, 0.5, 1.0],
    [-0.5, 2.0, -1.5, 0.25],
    [1.0, 1.0, 1.0, -1.0],
    [-3.0, -2.5, -0.75, 2.0],
];

/// 在若干个采样点上，解释执行的 dist/colour 与导出的 GLSL 必须得到相同的数。
fn assert_glsl_matches_interpreter(text: &str) {
    let shape = shape_of(text);
    let glsl = glsl_of(&shape).unwrap_or_else(|e| panic!("export of {} failed: {:?}", text, e));
    for point in SAMPLE_POINTS {
        let [x, y, z, t] = point;
        let what = format!("{} at {:?}", text, point);

        let dist = shape.dist(x, y, z, t).unwrap();
        assert_close(dist, run_glsl(&glsl, "dist", point).num(), &format!("dist of {}", what));

        let colour = shape.colour(x, y, z, t).unwrap();
        let compiled = run_glsl(&glsl, "colour", point).components();
        assert_eq!(compiled.len(), 3);
        for (a, b) in colour.iter().zip(&compiled) {
            assert_close(*a, *b, &format!("colour of {}", what));
        }
    }
}

#[test]
fn test_glsl_agrees_with_interpreter_for_circle() {
    assert_glsl_matches_interpreter(CIRCLE);
}

#[test]
fn test_glsl_agrees_with_interpreter_for_module_constants() {
    assert_glsl_matches_interpreter("{ r = 2; dist(p, t) = length(p) - r; colour(p, t) = [0, 1, 0] }");
}

#[test]
fn test_glsl_agrees_with_interpreter_for_conditionals() {
    assert_glsl_matches_interpreter(
        "{ dist: (p, t) -> if (p.x < 0 && t >= 0) -p.x - t else length(p) - 1, \
           colour: (p, t) -> if (p.y > 0) [1, 0, 0] else [0, 0, 1] }",
    );
}

#[test]
fn test_glsl_agrees_with_interpreter_for_local_functions() {
    assert_glsl_matches_interpreter(
        "{ dist: (p, t) -> let sq(v) = v * v; d = sqrt(sq(p.x) + sq(p.y)) in d - 1, \
           colour: (p, t) -> clamp(abs(p), 0, 1) }",
    );
}

#[test]
fn test_glsl_agrees_with_interpreter_for_powers() {
    assert_glsl_matches_interpreter(
        "{ dist: (p, t) -> sqrt(p.x ^ 2 + p.y ^ 2) - 1, \
           colour: (p, t) -> [p.x ^ 3, p.y ^ 0, (1 + p.z ^ 2) ^ (-1)] }",
    );
}

#[test]
fn test_glsl_agrees_with_interpreter_for_builtins_and_indexing() {
    assert_glsl_matches_interpreter(
        "{ dist: (p, t) -> max(abs(p.x), abs(p[1])) - mix(1, 2, 0.5) + mod(p.z, 1) * 0, \
           colour: q -> [min(q.x, 0), max(q.y, 0), dot([q.x, q.y], [1, 1])] }",
    );
}

// 解释执行时 [p, 1][1] 是 1；不能编译成 vec4(p, 1.0).y
#[test]
fn test_nested_list_in_dist_is_rejected() {
    let shape = shape_of("{ dist: (p, t) -> [p, 1][1], colour: (p, t) -> [1, 1, 1] }");
    assert_eq!(shape.dist(5.0, 7.0, 0.0, 0.0).unwrap(), 1.0);

    let e = glsl_of(&shape).unwrap_err();
    assert_eq!(e.kind, ErrorKind::UnsupportedInShader { what: "nested list".to_string() });
}
