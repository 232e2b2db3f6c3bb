// In src/program/mod.rs

//! 一个程序从源代码到值的完整流程：词法、语法、分析、求值。


use crate::analyzer::{Environ, Expression, analyze_program};
use crate::lexer;
use crate::parser::{self, ast::Phrase};
use crate::reporter::{CompilerError, Exception};
use crate::runtime::{Frame, ModuleValue, Value};
use crate::system::{Namespace, System};
use crate::utils::Source;
use std::rc::Rc;
use tracing::{debug, info, instrument};

pub struct Program {
    pub source: Rc<Source>,
    pub system: Rc<System>,
    phrase: Option<Rc<Phrase>>,
    expr: Option<Expression>,
    frame: Option<Rc<Frame>>,
}

impl Program {
    pub fn new(source: Rc<Source>, system: Rc<System>) -> Self {
        Self {
            source,
            system,
            phrase: None,
            expr: None,
            frame: None,
        }
    }

    /// 编译程序。`names` 替换默认的内建名字空间；
    /// `parent_frame` 是发起这次编译的运行帧，诊断会沿它的调用链继续展开。
    #[instrument(skip_all, fields(source = %self.source.name))]
    pub fn compile(
        &mut self,
        names: Option<&Namespace>,
        parent_frame: Option<Rc<Frame>>,
    ) -> Result<(), Vec<CompilerError>> {
        let mut all_errors = Vec::new();

        // 1. 词法分析：即使有错误也继续解析，以便一次报告更多问题
        let (tokens, lexer_errors) = lexer::lex(&self.source);
        all_errors.extend(lexer_errors);

        // 2. 解析
        let (phrase, parser_errors) = parser::parse(&self.source, tokens);
        all_errors.extend(parser_errors);

        let phrase = match phrase {
            Some(phrase) if all_errors.is_empty() => phrase,
            _ => return Err(all_errors),
        };

        // 3. 分析
        let system = self.system.clone();
        let names = names.unwrap_or(&system.builtins);
        let env = Environ::builtin(names, parent_frame.as_ref());
        let expr = analyze_program(&phrase, &env).map_err(|e| vec![CompilerError::from(e)])?;
        let nslots = env.frame_maxslots();

        debug!(nslots, "compiled");
        self.frame = Some(Frame::root(system.clone(), nslots, parent_frame.as_ref()));
        self.phrase = Some(phrase);
        self.expr = Some(expr);
        Ok(())
    }

    /// 解释执行整个程序。
    #[instrument(skip_all, fields(source = %self.source.name))]
    pub fn eval(&self) -> Result<Value, Exception> {
        let (Some(expr), Some(frame)) = (&self.expr, &self.frame) else {
            panic!("ICE: Program::eval called before a successful compile");
        };
        let value = expr.eval(frame)?;
        info!(kind = value.type_name(), "evaluated");
        Ok(value)
    }

    /// 程序表示的东西：模块，或者一个值列表（单个值视为只有一个元素的列表）。
    pub fn denotes(&self) -> Result<(Option<Rc<ModuleValue>>, Option<Rc<[Value]>>), Exception> {
        Ok(match self.eval()? {
            Value::Module(module) => (Some(module), None),
            Value::List(items) => (None, Some(items)),
            other => (None, Some(Rc::from(vec![other]))),
        })
    }

    /// 程序的根 Phrase，用于把整体性的错误归属到整个程序。
    pub fn nub(&self) -> Option<&Rc<Phrase>> {
        self.phrase.as_ref()
    }
}
