use chumsky::span::Span as ChumskySpan;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// 代表源代码中的一个位置范围，包含起始和结束的字节索引。
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 覆盖 `self` 与 `other` 的最小范围。
    pub fn to(self, other: Span) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn into_range(self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self {
            start: range.start,
            end: range.end,
        }
    }
}

/// 一份源代码：名字（通常是文件路径）加上完整文本。
#[derive(Debug, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            text: text.into(),
        })
    }

    /// 将字节偏移量换算成 1 起始的 (行, 列)。
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, column)
    }
}

/// 诊断中使用的源码位置：哪一份源代码，以及其中的哪一段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub source: Rc<Source>,
    pub span: Span,
}

impl Location {
    pub fn new(source: Rc<Source>, span: Span) -> Self {
        Self { source, span }
    }

    /// 合并两个同源位置，得到覆盖两者的位置。
    pub fn join(&self, other: &Location) -> Location {
        Location::new(self.source.clone(), self.span.to(other.span))
    }

    /// 位置所覆盖的源文本。
    pub fn text(&self) -> &str {
        self.source
            .text
            .get(self.span.into_range())
            .unwrap_or_default()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, column) = self.source.line_column(self.span.start);
        write!(f, "{}:{}:{}", self.source.name, line, column)
    }
}

// chumsky 直接用 Location 作为 span 类型，context 就是所属的源代码。
impl ChumskySpan for Location {
    type Context = Rc<Source>;
    type Offset = usize;

    fn new(context: Self::Context, range: Range<Self::Offset>) -> Self {
        Location::new(context, range.into())
    }

    fn context(&self) -> Self::Context {
        self.source.clone()
    }

    fn start(&self) -> Self::Offset {
        self.span.start
    }

    fn end(&self) -> Self::Offset {
        self.span.end
    }
}
