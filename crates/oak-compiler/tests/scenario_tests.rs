//! End-to-end programs: compile, link and evaluate.

mod common;

use common::{Value, compile, run};
use oak_compiler::{CompileOptions, Compiler, PackageSource};

#[test]
fn arithmetic_round_trip() {
    let source = "module M\ndef add(a, b) = a + b\ndef r = add(2, 3)\n";
    let compilation = compile(source);
    assert_eq!(compilation.type_of("M.r").as_deref(), Some("Int"));

    let binary = compilation.binary.as_ref().unwrap();
    let own: Vec<_> = binary.exports.keys().filter(|k| k.starts_with("M.")).collect();
    assert_eq!(own, vec!["M.add", "M.r"]);

    assert_eq!(run(source, "M.r"), Value::Int(5));
}

#[test]
fn polymorphic_identity() {
    let source = "module M\ndef id(x) = x\ndef a = id(1)\ndef b = id(\"x\")\n";
    let compilation = compile(source);
    assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);
    assert_eq!(compilation.type_of("M.a").as_deref(), Some("Int"));
    assert_eq!(compilation.type_of("M.b").as_deref(), Some("String"));
    assert_eq!(run(source, "M.b"), Value::String("x".into()));
}

#[test]
fn lambda_capture() {
    let source = "module M\n\
                  def mkAdder(n) = \\(x) -> x + n\n\
                  def plus3 = mkAdder(3)\n\
                  def r = plus3(4)\n";
    let compilation = compile(source);
    assert!(compilation.is_success(), "{:?}", compilation.diagnostics);

    // debug builds export the hidden lifted definition
    let binary = compilation.binary.as_ref().unwrap();
    let lifted = binary.export("M._lmbd_mkAdder_1").unwrap();
    assert_eq!(binary.funcs[lifted as usize].num_args, 2);

    assert_eq!(run(source, "M.r"), Value::Int(7));
}

#[test]
fn missing_option_is_reported_at_the_last_case() {
    let source = "module M\n\
                  type Color = Red | Green | Blue\n\
                  def name(c) = select c case Red -> \"r\" case Green -> \"g\" end\n";
    let compilation = compile(source);
    assert!(compilation.binary.is_none());
    let errors: Vec<_> = compilation.diagnostics.iter().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "pattern matching is not exhaustive, missing patterns: Blue"
    );
    assert!(errors[0].location.text().starts_with("case Green"));
}

#[test]
fn ambiguous_identifier() {
    let package = PackageSource::new("main")
        .with_module("A", "main/src/A.oak", "module A\ndef helper = 1\n")
        .with_module("B", "main/src/B.oak", "module B\ndef helper = 2\n")
        .with_module(
            "C",
            "main/src/C.oak",
            "module C\nimport A exposing (*)\nimport B exposing (*)\ndef x = helper\n",
        );
    let compilation = Compiler::default().compile(&[package]).unwrap();
    let errors: Vec<_> = compilation.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        errors,
        vec!["ambiguous identifier 'helper', it can be one of A.helper, B.helper"]
    );
}

#[test]
fn occurs_check_cites_the_argument() {
    let compilation = compile("module M\ndef loop(f) = f(f)\n");
    let errors: Vec<_> = compilation.diagnostics.iter().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "ambiguous type");
    assert_eq!(errors[0].location.text(), "f");
}

#[test]
fn data_types_and_recursion_evaluate() {
    let source = "module M\n\
                  def len(list) = select list case [] -> 0 case _ | t -> 1 + len(t) end\n\
                  def total = foldl(\\(x, acc) -> x + acc, 0, [1, 2, 3])\n\
                  def safe = withDefault(0, Just(len([7, 8])))\n\
                  def both = True && not(False)\n";
    assert_eq!(run(source, "M.total"), Value::Int(6));
    assert_eq!(run(source, "M.safe"), Value::Int(2));
    assert_eq!(run(source, "M.both"), Value::bool(true));
}

#[test]
fn records_update_and_access() {
    let source = "module M\n\
                  def origin = { x = 0, y = 0 }\n\
                  def moved = { origin | x = 5 }\n\
                  def x = moved.x + moved.y\n";
    assert_eq!(run(source, "M.x"), Value::Int(5));
}

#[test]
fn local_functions_recurse() {
    let source = "module M\n\
                  def sumTo(n) =\n\
                      let go(i, acc) = if i > n then acc else go(i + 1, acc + i)\n\
                      in go(1, 0)\n\
                  def r = sumTo(4)\n";
    assert_eq!(run(source, "M.r"), Value::Int(10));
}

#[test]
fn int_literals_widen_to_float() {
    let source = "module M\ndef half(x: Float) = x / 2\ndef r = half(3.0)\n";
    assert_eq!(run(source, "M.r"), Value::Float(1.5));
}

#[test]
fn polymorphic_literals_follow_the_instantiation() {
    let source = "module M\ndef inc(x) = x + 1\ndef r = inc(1.5)\ndef n = inc(1)\n";
    let compilation = compile(source);
    assert_eq!(compilation.type_of("M.r").as_deref(), Some("Float"));
    assert_eq!(compilation.type_of("M.n").as_deref(), Some("Int"));
    assert_eq!(run(source, "M.r"), Value::Float(2.5));
    assert_eq!(run(source, "M.n"), Value::Int(2));
}

#[test]
fn smallest_int_literal_evaluates() {
    let source = "module M\ndef a = -9223372036854775808\n";
    assert_eq!(run(source, "M.a"), Value::Int(i64::MIN));
}

#[test]
fn release_build_evaluates_without_hidden_exports() {
    let source = "module M\ndef hidden secret = 41\ndef answer = secret + 1\n";
    let package = PackageSource::new("main").with_module("M", "main/src/M.oak", source);
    let compilation = Compiler::new(CompileOptions { debug: false })
        .compile(&[package])
        .unwrap();
    let binary = compilation.binary.unwrap();
    assert_eq!(binary.export("M.secret"), None);
    let value = common::Machine::new(&binary).global("M.answer").unwrap();
    assert_eq!(value, Value::Int(42));
}
