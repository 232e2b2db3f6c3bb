// In src/diagnostics/test.rs

use super::*;
use crate::program::Program;
use crate::reporter::Exception;
use crate::system::System;

/// 编译并求值，返回遇到的第一组错误。
fn errors_of(text: &str) -> (Rc<Source>, Vec<CompilerError>) {
    let source = Source::new("test", text);
    let mut program = Program::new(source.clone(), Rc::new(System::default()));
    let errors = match program.compile(None, None) {
        Err(errors) => errors,
        Ok(()) => match program.eval() {
            Err(e) => vec![e.into()],
            Ok(value) => panic!("Expected {} to fail, got {}", text, value),
        },
    };
    (source, errors)
}

fn diagnostics_of(text: &str) -> Vec<Diagnostic> {
    let (source, errors) = errors_of(text);
    let mut bag = DiagnosticBag::new(source);
    bag.report_all(&errors);
    assert!(!bag.diagnostics.is_empty());
    bag.diagnostics.clone()
}

#[test]
fn test_error_codes_are_unique_and_explained() {
    for (i, a) in codes::ALL_CODES.iter().enumerate() {
        assert!(!a.explanation.is_empty(), "{} has no explanation", a.code);
        for b in &codes::ALL_CODES[i + 1..] {
            assert_ne!(a.code, b.code);
        }
    }
    assert_eq!(codes::lookup("e0305").map(|c| c.code), Some("E0305"));
    assert!(codes::lookup("E9999").is_none());
}

#[test]
fn test_lexical_error_diagnostic() {
    let diagnostics = diagnostics_of("1 + @");
    let first = &diagnostics[0];
    assert_eq!(first.code(), "E0000");
    assert_eq!(first.labels()[0].location.span.into_range(), 4..5);
}

#[test]
fn test_syntax_error_diagnostic() {
    let diagnostics = diagnostics_of("let a = 1 a");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code(), "E0100");
    assert!(diagnostics[0].message().starts_with("syntax error"));
}

#[test]
fn test_unbound_identifier_diagnostic() {
    let diagnostics = diagnostics_of("radius * 2");
    assert_eq!(diagnostics[0].code(), "E0200");
    assert_eq!(diagnostics[0].message(), "radius: not defined");
    assert_eq!(diagnostics[0].labels()[0].location.text(), "radius");
}

#[test]
fn test_call_chain_becomes_secondary_labels() {
    let diagnostics = diagnostics_of("let f(x) = g(x); g(x) = error(\"boom\") in f(1)");
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.code(), "E0306");
    assert_eq!(diagnostic.message(), "boom");
    let labels: Vec<_> = diagnostic
        .labels()
        .iter()
        .map(|label| (label.location.text(), label.message.as_str()))
        .collect();
    assert_eq!(labels, vec![("g(x)", "boom"), ("f(1)", "called from here")]);
}

#[test]
fn test_error_without_location_has_no_labels() {
    let error = CompilerError::from(Exception::new(ErrorKind::NotAShape, &crate::runtime::Context::Empty));
    let diagnostic = Diagnostic::from(&error);
    assert_eq!(diagnostic.code(), "E0307");
    assert!(diagnostic.labels().is_empty());
}

#[test]
fn test_stack_overflow_mentions_the_flag() {
    let error = CompilerError::from(Exception::new(
        ErrorKind::StackOverflow { limit: 10 },
        &crate::runtime::Context::Empty,
    ));
    let diagnostic = Diagnostic::from(&error);
    assert_eq!(diagnostic.code(), "E0305");
    assert!(diagnostic.notes.iter().any(|note| note.contains("--max-depth")));
}

#[test]
fn test_print_consumes_the_bag() {
    let (source, errors) = errors_of("1 + nope");
    let mut bag = DiagnosticBag::new(source);
    bag.report_all(&errors);
    assert_eq!(bag.diagnostics.len(), 1);
    bag.print().unwrap();
    assert!(bag.diagnostics.is_empty());
}
