// In src/geom/shape.rs

use super::BBox;
use crate::analyzer::Lambda;
use crate::codegen::{GlCompiler, GlParent, GlType, GlValue};
use crate::parser::ast::Phrase;
use crate::program::Program;
use crate::reporter::{ErrorKind, Exception};
use crate::runtime::{Context, Frame, Function, Value};
use crate::utils::Atom;
use std::rc::Rc;
use tracing::{debug, info, instrument};

/// 形状能力：维度、包围盒，以及在 (x, y, z, t) 处的距离和颜色。
pub trait Shape {
    fn is_2d(&self) -> bool;
    fn is_3d(&self) -> bool;
    fn bbox(&self) -> BBox;
    fn dist(&self, x: f64, y: f64, z: f64, t: f64) -> Result<f64, Exception>;
    fn colour(&self, x: f64, y: f64, z: f64, t: f64) -> Result<[f64; 3], Exception>;
}

/// 由程序求值结果识别出的形状。
///
/// 识别是单向的：成功之后再调用 `recognize` 不会改变任何东西。
/// 两个函数各自捕获一个新帧，大小为函数自己的槽位数，父帧是闭包捕获的帧。
pub struct ShapeProgram {
    pub nub: Option<Rc<Phrase>>,
    pub is_2d: bool,
    pub is_3d: bool,
    pub bbox: BBox,
    pub dist_fun: Option<Rc<Lambda>>,
    pub colour_fun: Option<Rc<Lambda>>,
    pub dist_frame: Option<Rc<Frame>>,
    pub colour_frame: Option<Rc<Frame>>,
}

/// 形如 `(p, t) -> ...` 或 `p -> ...` 的闭包字段。
fn shape_function(
    value: &Value,
    name: &str,
    cx: &Context,
) -> Result<Option<(Rc<Lambda>, Rc<Frame>)>, Exception> {
    let Some(Value::Function(function)) = value.field(Atom::intern(name), cx)? else {
        return Ok(None);
    };
    match function.as_ref() {
        Function::Closure { lambda, env } if matches!(lambda.nparams, 1 | 2) => {
            Ok(Some((lambda.clone(), env.clone())))
        }
        _ => Ok(None),
    }
}

fn optional_bool(value: &Value, name: &str, cx: &Context) -> Result<Option<Option<bool>>, Exception> {
    Ok(match value.field(Atom::intern(name), cx)? {
        None => Some(None),
        Some(Value::Bool(b)) => Some(Some(b)),
        Some(_) => None,
    })
}

impl ShapeProgram {
    pub fn new(program: &Program) -> Self {
        Self {
            nub: program.nub().cloned(),
            is_2d: false,
            is_3d: false,
            bbox: BBox::default(),
            dist_fun: None,
            colour_fun: None,
            dist_frame: None,
            colour_frame: None,
        }
    }

    pub fn is_shape(&self) -> bool {
        self.dist_fun.is_some()
            && self.colour_fun.is_some()
            && self.dist_frame.is_some()
            && self.colour_frame.is_some()
    }

    fn context(&self) -> Context<'_> {
        match &self.nub {
            Some(nub) => Context::AtPhrase(nub, None),
            None => Context::Empty,
        }
    }

    /// 识别形状。不是形状不算错误，返回 `Ok(false)`；只有读取字段时的求值错误会传播。
    #[instrument(skip_all)]
    pub fn recognize(&mut self, value: &Value) -> Result<bool, Exception> {
        if self.is_shape() {
            return Ok(true);
        }
        let cx = self.context();

        let Some((dist, dist_env)) = shape_function(value, "dist", &cx)? else {
            debug!("no dist function");
            return Ok(false);
        };
        let Some((colour, colour_env)) = shape_function(value, "colour", &cx)? else {
            debug!("no colour function");
            return Ok(false);
        };
        let (Some(is_2d), Some(is_3d)) = (
            optional_bool(value, "is_2d_shape", &cx)?,
            optional_bool(value, "is_3d_shape", &cx)?,
        ) else {
            return Ok(false);
        };
        let is_2d = is_2d.unwrap_or(false);
        // 两者都没有声明时按三维处理
        let is_3d = is_3d.unwrap_or(false) || !is_2d;

        let bbox = match value.field(Atom::intern("bbox"), &cx)? {
            Some(bbox) => match BBox::from_value(&bbox) {
                Some(bbox) => bbox,
                None => return Ok(false),
            },
            None if is_3d => BBox::infinite3(),
            None => BBox::infinite2(),
        };

        self.is_2d = is_2d;
        self.is_3d = is_3d;
        self.bbox = bbox;
        self.dist_frame = Some(Frame::child(dist.nslots, &dist_env));
        self.colour_frame = Some(Frame::child(colour.nslots, &colour_env));
        self.dist_fun = Some(dist);
        self.colour_fun = Some(colour);
        info!(is_2d, is_3d, "recognized shape");
        Ok(true)
    }

    /// 需要形状的调用者使用的形式：不是形状时报告 `NotAShape`。
    pub fn require_shape(&mut self, value: &Value) -> Result<(), Exception> {
        if self.recognize(value)? {
            Ok(())
        } else {
            Err(Exception::new(ErrorKind::NotAShape, &self.context()))
        }
    }

    fn captured<'s>(
        &self,
        fun: &'s Option<Rc<Lambda>>,
        frame: &'s Option<Rc<Frame>>,
    ) -> Result<(&'s Rc<Lambda>, &'s Rc<Frame>), Exception> {
        match (fun, frame) {
            (Some(fun), Some(frame)) => Ok((fun, frame)),
            _ => Err(Exception::new(ErrorKind::NotAShape, &self.context())),
        }
    }

    /// 在捕获帧上调用：先清空函数自己的槽位，闭包捕获的帧不会被写入。
    fn call_captured(lambda: &Lambda, frame: &Rc<Frame>, x: f64, y: f64, z: f64, t: f64) -> Result<Value, Exception> {
        frame.reset();
        if lambda.nparams == 1 {
            frame.set(0, Value::from(vec![x.into(), y.into(), z.into(), t.into()]));
        } else {
            frame.set(0, Value::from(vec![x.into(), y.into(), z.into()]));
            frame.set(1, Value::Num(t));
        }
        lambda.body.eval(frame)
    }

    /// 符号调用：`r0` 是 vec4 参数；两参数形式拆成 `r0.xyz` 和 `r0.w`。
    fn gl_call(
        lambda: &Rc<Lambda>,
        frame: &Rc<Frame>,
        param: GlValue,
        gc: &mut GlCompiler,
    ) -> Result<GlValue, Exception> {
        let Some(env) = &frame.parent else {
            panic!("ICE: captured shape frame has no closure frame");
        };
        let args = if lambda.nparams == 1 {
            vec![param]
        } else {
            let p = gc.define(GlType::Vec3, format!("{}.xyz", param));
            let t = gc.define(GlType::Num, format!("{}.w", param));
            vec![p, t]
        };
        gc.inline_call(lambda, GlParent::Concrete(env.clone()), args, &lambda.body.phrase)
    }

    pub fn gl_dist(&self, param: GlValue, gc: &mut GlCompiler) -> Result<GlValue, Exception> {
        let (lambda, frame) = self.captured(&self.dist_fun, &self.dist_frame)?;
        Self::gl_call(lambda, frame, param, gc)
    }

    pub fn gl_colour(&self, param: GlValue, gc: &mut GlCompiler) -> Result<GlValue, Exception> {
        let (lambda, frame) = self.captured(&self.colour_fun, &self.colour_frame)?;
        Self::gl_call(lambda, frame, param, gc)
    }
}

impl Shape for ShapeProgram {
    fn is_2d(&self) -> bool {
        self.is_2d
    }

    fn is_3d(&self) -> bool {
        self.is_3d
    }

    fn bbox(&self) -> BBox {
        self.bbox
    }

    fn dist(&self, x: f64, y: f64, z: f64, t: f64) -> Result<f64, Exception> {
        let (lambda, frame) = self.captured(&self.dist_fun, &self.dist_frame)?;
        let value = Self::call_captured(lambda, frame, x, y, z, t)?;
        value.to_num(&Context::AtPhrase(&lambda.body.phrase, Some(frame)))
    }

    fn colour(&self, x: f64, y: f64, z: f64, t: f64) -> Result<[f64; 3], Exception> {
        let (lambda, frame) = self.captured(&self.colour_fun, &self.colour_frame)?;
        let value = Self::call_captured(lambda, frame, x, y, z, t)?;
        match value.as_numbers().as_deref() {
            Some(&[r, g, b]) => Ok([r, g, b]),
            _ => Err(Exception::new(
                ErrorKind::WrongType {
                    expected: "colour [r,g,b]".to_string(),
                    found: value.to_string(),
                },
                &Context::AtPhrase(&lambda.body.phrase, Some(frame)),
            )),
        }
    }
}
