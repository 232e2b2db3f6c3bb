pub mod codes;

#[cfg(test)]
mod test;

use crate::reporter::{CompilerError, ErrorKind, LexerError, ParserError};
use crate::utils::{Location, Source};
use ariadne::{Color, Label as AriadneLabel, Report, ReportKind, Source as AriadneSource};
use codes::ErrorCode; // 从子模块中导入 ErrorCode 结构体
use std::io;
use std::mem;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Label {
    pub location: Location,
    pub message: String,
}

impl Label {
    pub fn new(location: Location, message: impl Into<String>) -> Self {
        Self {
            location,
            message: message.into(),
        }
    }
}

// --- Diagnostic ---

#[derive(Debug, Clone)]
pub struct Diagnostic {
    code: &'static str,
    // 默认消息来自 ErrorCode，可以用 with_dynamic_message 覆盖
    message: String,
    labels: Vec<Label>,
    notes: Vec<String>,
}

impl Diagnostic {
    /// 主构造函数。没有可归属位置的错误（`Context::Empty`）可以不带标签。
    pub fn new(error_code: &'static ErrorCode, primary_label: Option<Label>) -> Self {
        Self {
            code: error_code.code,
            message: error_code.message.to_string(),
            labels: primary_label.into_iter().collect(),
            notes: Vec::new(),
        }
    }

    pub fn with_dynamic_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_secondary_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn code(&self) -> &str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
}

fn error_code_of(kind: &ErrorKind) -> &'static ErrorCode {
    use codes::*;
    match kind {
        ErrorKind::UnboundIdentifier { .. } => &E0200_UNBOUND_IDENTIFIER,
        ErrorKind::NotAnExpression => &E0201_NOT_AN_EXPRESSION,
        ErrorKind::NotADefinition => &E0202_NOT_A_DEFINITION,
        ErrorKind::InvalidDefinition => &E0203_INVALID_DEFINITION,
        ErrorKind::MultipleDefinition { .. } => &E0204_MULTIPLE_DEFINITION,
        ErrorKind::RecursiveDefinition => &E0300_RECURSIVE_DEFINITION,
        ErrorKind::WrongType { .. } => &E0301_WRONG_TYPE,
        ErrorKind::ArgumentCount { .. } => &E0302_ARGUMENT_COUNT,
        ErrorKind::NoSuchField { .. } => &E0303_NO_SUCH_FIELD,
        ErrorKind::IndexOutOfRange { .. } => &E0304_INDEX_OUT_OF_RANGE,
        ErrorKind::StackOverflow { .. } => &E0305_STACK_OVERFLOW,
        ErrorKind::UserError { .. } => &E0306_USER_ERROR,
        ErrorKind::NotAShape => &E0307_NOT_A_SHAPE,
        ErrorKind::UnsupportedInShader { .. } => &E0400_UNSUPPORTED_IN_SHADER,
    }
}

impl From<&CompilerError> for Diagnostic {
    fn from(error: &CompilerError) -> Self {
        match error {
            CompilerError::Lexical(LexerError::UnrecognizedToken { location, .. }) => {
                Diagnostic::new(
                    &codes::E0000_UNRECOGNIZED_CHAR,
                    Some(Label::new(location.clone(), "this character is not recognized")),
                )
                .with_dynamic_message(error.to_string())
            }
            CompilerError::Parsing(ParserError::UnexpectedToken { location, .. }) => {
                Diagnostic::new(
                    &codes::E0100_SYNTAX_ERROR,
                    Some(Label::new(location.clone(), "here")),
                )
                .with_dynamic_message(error.to_string())
            }
            CompilerError::Exception(exception) => {
                // 第一个位置是出错点，其余的是调用链（最内层在前）
                let mut locations = exception.locations.iter();
                let primary = locations
                    .next()
                    .map(|location| Label::new(location.clone(), exception.kind.to_string()));
                let mut diagnostic = Diagnostic::new(error_code_of(&exception.kind), primary)
                    .with_dynamic_message(exception.kind.to_string());
                for location in locations {
                    diagnostic =
                        diagnostic.with_secondary_label(Label::new(location.clone(), "called from here"));
                }
                if let ErrorKind::StackOverflow { .. } = exception.kind {
                    diagnostic = diagnostic.with_note("the limit can be raised with `--max-depth`");
                }
                diagnostic
            }
        }
    }
}

// --- DiagnosticBag ---

#[derive(Debug)]
pub struct DiagnosticBag {
    source: Rc<Source>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new(source: Rc<Source>) -> Self {
        Self {
            source,
            diagnostics: Vec::new(),
        }
    }

    pub fn report_all<'e>(&mut self, errors: impl IntoIterator<Item = &'e CompilerError>) {
        self.diagnostics.extend(errors.into_iter().map(Diagnostic::from));
    }

    pub fn print(&mut self) -> io::Result<()> {
        let diags_to_print = mem::take(&mut self.diagnostics);
        print_all(&self.source, diags_to_print)
    }
}

// --- Printer 打印逻辑 ---

fn print_all(source: &Source, diagnostics: Vec<Diagnostic>) -> io::Result<()> {
    let file_name = source.name.as_str();
    let cache = (file_name, AriadneSource::from(source.text.as_str()));

    for diag in diagnostics {
        // 没有位置的错误只打印一行
        let Some(primary_label_info) = diag.labels.first() else {
            eprintln!("error[{}]: {}", diag.code, diag.message);
            continue;
        };

        let mut report = Report::build(
            ReportKind::Error,
            (file_name, primary_label_info.location.span.into_range()),
        )
        .with_message(&diag.message)
        .with_code(diag.code);

        for (i, label_info) in diag.labels.iter().enumerate() {
            // 来自其他源文件的位置（例如父程序里的调用）只能作为注释显示
            if label_info.location.source.name != source.name {
                report = report.with_note(format!("{}: {}", label_info.location, label_info.message));
                continue;
            }
            let label = AriadneLabel::new((file_name, label_info.location.span.into_range()))
                .with_message(&label_info.message);

            let final_label = if i == 0 {
                label.with_color(Color::Red)
            } else {
                label.with_color(Color::Blue)
            };
            report.add_label(final_label);
        }

        for note in &diag.notes {
            report = report.with_note(note);
        }

        report.finish().eprint(cache.clone())?;
    }
    Ok(())
}
