// In src/analyzer/test.rs

use super::*;
use crate::lexer::lex;
use crate::parser::parse;
use crate::runtime::{Frame, builtins};
use crate::system::System;
use crate::utils::{Atom, Source};
use std::cell::RefCell;

// --- Test Harness ---

/// 词法和语法分析必须成功，这是测试的前置条件。
fn setup(text: &str) -> Rc<Phrase> {
    let source = Source::new("test", text);
    let (tokens, lex_errors) = lex(&source);
    assert!(lex_errors.is_empty(), "Test setup failed (lexing errors): {:?}", lex_errors);
    let (phrase, parse_errors) = parse(&source, tokens);
    assert!(parse_errors.is_empty(), "Test setup failed (parsing errors): {:?}", parse_errors);
    phrase.expect("Parsing succeeded with no errors, but no phrase was produced.")
}

/// 分析一个程序，同时返回根帧需要的槽位数。
fn analyze_source(text: &str) -> (Result<Expression, Exception>, usize) {
    let phrase = setup(text);
    let names = builtins::namespace();
    let env = Environ::builtin(&names, None);
    let result = analyze_program(&phrase, &env);
    let nslots = env.frame_maxslots();
    (result, nslots)
}

fn analyze_ok(text: &str) -> (Expression, usize) {
    match analyze_source(text) {
        (Ok(expr), nslots) => (expr, nslots),
        (Err(e), _) => panic!("Analysis failed unexpectedly for {}: {:?}", text, e),
    }
}

fn analyze_err(text: &str) -> Exception {
    match analyze_source(text) {
        (Ok(expr), _) => panic!("Expected analysis of {} to fail, got {:?}", text, expr.kind),
        (Err(e), _) => e,
    }
}

fn assert_slot(expr: &Expression, expected_depth: usize, expected_slot: usize) {
    match &expr.kind {
        ExprKind::Slot { depth, slot } => {
            assert_eq!((*depth, *slot), (expected_depth, expected_slot), "at {}", expr.phrase.location)
        }
        other => panic!("Expected a slot reference, got {:?}", other),
    }
}

// --- 名字解析 ---

#[test]
fn test_let_bindings_get_consecutive_slots() {
    let (expr, nslots) = analyze_ok("let a = 1; b = 2 in b");
    let ExprKind::Let { bindings, body } = &expr.kind else {
        panic!("Expected a let, got {:?}", expr.kind);
    };
    let slots: Vec<_> = bindings.iter().map(|(slot, _)| *slot).collect();
    assert_eq!(slots, vec![0, 1]);
    assert_slot(body, 0, 1);
    assert_eq!(nslots, 2);
}

#[test]
fn test_sibling_lets_never_reuse_slots() {
    let (expr, nslots) = analyze_ok("[let a = 1 in a, let b = 2 in b]");
    let ExprKind::List(items) = &expr.kind else {
        panic!("Expected a list, got {:?}", expr.kind);
    };
    let ExprKind::Let { body, .. } = &items[1].kind else {
        panic!("Expected a let, got {:?}", items[1].kind);
    };
    assert_slot(body, 0, 1);
    assert_eq!(nslots, 2);
}

#[test]
fn test_lambda_parameters_start_a_new_frame() {
    let (expr, _) = analyze_ok("let k = 3 in x -> x + k");
    let ExprKind::Let { body, .. } = &expr.kind else {
        panic!("Expected a let, got {:?}", expr.kind);
    };
    let ExprKind::Lambda(lambda) = &body.kind else {
        panic!("Expected a lambda, got {:?}", body.kind);
    };
    assert_eq!(lambda.nparams, 1);
    assert_eq!(lambda.nslots, 1);
    let ExprKind::Binary { left, right, .. } = &lambda.body.kind else {
        panic!("Expected a binary expression, got {:?}", lambda.body.kind);
    };
    assert_slot(left, 0, 0);
    assert_slot(right, 1, 0);
}

#[test]
fn test_let_inside_lambda_extends_the_call_frame() {
    let (expr, nslots) = analyze_ok("(x, y) -> let s = x + y in s * s");
    let ExprKind::Lambda(lambda) = &expr.kind else {
        panic!("Expected a lambda, got {:?}", expr.kind);
    };
    assert_eq!(lambda.nslots, 3);
    assert_eq!(nslots, 0);
}

#[test]
fn test_builtins_resolve_to_constants() {
    let (expr, _) = analyze_ok("sqrt");
    assert!(matches!(expr.kind, ExprKind::Constant(Value::Function(_))));
}

#[test]
fn test_function_definition_is_rewritten_to_lambda() {
    let (expr, _) = analyze_ok("let f(x, y) = x * y in f");
    let ExprKind::Let { bindings, .. } = &expr.kind else {
        panic!("Expected a let, got {:?}", expr.kind);
    };
    let definition = &bindings[0].1;
    assert!(matches!(&definition.kind, ExprKind::Lambda(lambda) if lambda.nparams == 2));
    // 合成的 Lambda 使用整个定义的位置
    assert_eq!(definition.phrase.location.text(), "f(x, y) = x * y");
}

#[test]
fn test_top_level_definition_is_a_module() {
    let (expr, _) = analyze_ok("radius = 2");
    let ExprKind::Module(module) = &expr.kind else {
        panic!("Expected a module, got {:?}", expr.kind);
    };
    assert_eq!(module.fields.get(&Atom::intern("radius")), Some(&0));
}

// --- 错误 ---

#[test]
fn test_unbound_identifier_points_at_the_name() {
    let e = analyze_err("1 + foo");
    assert_eq!(e.kind, ErrorKind::UnboundIdentifier { name: "foo".to_string() });
    let location = e.location().expect("error should carry a location");
    assert_eq!(location.span.into_range(), 4..7);
}

#[test]
fn test_definition_where_expression_expected() {
    let e = analyze_err("[a = 1]");
    assert_eq!(e.kind, ErrorKind::NotAnExpression);
    assert_eq!(e.locations[0].text(), "a = 1");
}

#[test]
fn test_let_items_must_be_definitions() {
    assert_eq!(analyze_err("let 1 in 2").kind, ErrorKind::NotADefinition);
    assert_eq!(analyze_err("let 1 = 2 in 3").kind, ErrorKind::InvalidDefinition);
    assert_eq!(analyze_err("let f(1) = 2 in 3").kind, ErrorKind::InvalidDefinition);
}

#[test]
fn test_multiple_definitions_are_rejected() {
    let expected = ErrorKind::MultipleDefinition { name: "a".to_string() };
    assert_eq!(analyze_err("let a = 1; a = 2 in a").kind, expected);
    assert_eq!(analyze_err("{ a = 1; a = 2 }").kind, expected);
    assert_eq!(analyze_err("{ a: 1, a: 2 }").kind, expected);
    assert_eq!(analyze_err("(a, a) -> a").kind, expected);
}

#[test]
fn test_errors_inside_unused_definitions_are_still_reported() {
    let e = analyze_err("let unused = nope in 1");
    assert_eq!(e.kind, ErrorKind::UnboundIdentifier { name: "nope".to_string() });
}

// --- 定义来源 ---

/// 记录每个定义体被请求了多少次的定义来源。
struct CountingSource {
    definitions: AtomMap<Rc<Phrase>>,
    requests: RefCell<Vec<Atom>>,
}

impl DefinitionSource for CountingSource {
    fn names(&self) -> Vec<Atom> {
        self.definitions.keys().copied().collect()
    }

    fn definiens(&self, name: Atom) -> Option<Rc<Phrase>> {
        self.requests.borrow_mut().push(name);
        self.definitions.get(&name).cloned()
    }
}

#[test]
fn test_each_definition_is_analyzed_exactly_once() {
    let phrase = setup("{ a = b + 1; b = 2 }");
    let PhraseKind::Module(items) = &phrase.kind else {
        panic!("Expected a module literal, got {:?}", phrase.kind);
    };

    let names = builtins::namespace();
    let env = Environ::builtin(&names, None);
    let source = CountingSource {
        definitions: collect_definitions(items, &env).unwrap(),
        requests: RefCell::new(Vec::new()),
    };
    let module = analyze_module(&source, &env).unwrap();

    // a 的定义引用了 b，b 在那时被分析；之后不会再被请求
    let (a, b) = (Atom::intern("a"), Atom::intern("b"));
    assert_eq!(*source.requests.borrow(), vec![a, b]);

    let expr = Expression::new(ExprKind::Module(Rc::new(module)), phrase.clone());
    let frame = Frame::root(Rc::new(System::default()), 0, None);
    let value = expr.eval(&frame).unwrap();
    let field = value.field(a, &Context::Empty).unwrap().unwrap();
    assert!(field.equal(&Value::Num(3.0)));
}
