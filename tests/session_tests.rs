use my_lang::backend::Opts;
use my_lang::lexer::Lexer;
use my_lang::{run_source, Config, Driver};

fn run(source: &str) -> String {
    run_source(source, &Config::default()).expect("in-memory run cannot fail")
}

#[test]
fn test_extern_then_definition() {
    let mut driver = Driver::new(
        Lexer::new("extern f(x);\ndef f(x) x*2;\nf(3);\n".as_bytes()),
        &Config::default(),
    );
    let mut out = Vec::new();
    driver.run(&mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(!output.contains("LogError"), "unexpected errors:\n{}", output);
    assert_eq!(driver.codegen().backend.function_names(), vec!["f"]);
    assert!(output.ends_with(
        "define double @f(double %x) {\n\
         entry:\n  \
         %multmp = fmul double %x, 2.000000e+00\n  \
         ret double %multmp\n\
         }\n"
    ));
}

#[test]
fn test_failed_body_leaves_name_free() {
    let output = run("extern g(a);\ndef g(a) b;\ndef g(a b) a+b;\n");

    assert!(output.contains("LogError: unknown variable name b\n"));
    assert!(output.contains("define double @g(double %a, double %b)"));
    assert!(!output.contains("redeclared"));
}

#[test]
fn test_call_checks() {
    let output = run("def two(a b) a;\ntwo(1);\nnope(1);\n");

    assert!(output.contains(
        "LogError: incorrect number of arguments in call to two, expected 2 found 1\n"
    ));
    assert!(output.contains("LogError: unknown function referenced nope\n"));
    assert!(!output.contains("Read top-level expression:"));
}

#[test]
fn test_anonymous_expressions_are_discarded() {
    let output = run("1+2;\n3*4;\n");

    let reports: Vec<_> = output.matches("Read top-level expression:").collect();
    assert_eq!(reports.len(), 2);
    assert!(output.contains("ret double 3.000000e+00"));
    assert!(output.contains("ret double 1.200000e+01"));
    assert!(output.ends_with("source_filename = \"my cool jit\"\n"));
}

#[test]
fn test_comments_and_blank_lines() {
    let output = run("# a comment\n\n   def one() 1 # trailing\n;\n");
    assert!(output.contains("define double @one() {\nentry:\n  ret double 1.000000e+00\n}\n"));
}

#[test]
fn test_unoptimized_keeps_redundant_work() {
    let source = "def sq(x) (x+x)*(x+x);";
    let plain = run_source(
        source,
        &Config {
            opts: Opts::none(),
            ..Config::default()
        },
    )
    .unwrap();
    let optimized = run(source);

    assert!(plain.contains("%addtmp1 = fadd double %x, %x"));
    assert!(!optimized.contains("%addtmp1"));
}

#[test]
fn test_syntax_errors_recover() {
    let output = run("def (x) x;\nextern f x;\ndef ok() 1;\n");

    assert!(output.contains("LogError: expected function name in prototype\n"));
    assert!(output.contains("LogError: expected '(' in prototype\n"));
    assert!(output.contains("Read function definition:\ndefine double @ok()"));
}

#[test]
fn test_comparison_against_nan() {
    let huge = "9".repeat(400);
    let output = run(&format!("({0} - {0}) < 1;\n", huge));
    assert!(output.contains("ret double 0.000000e+00"), "{}", output);
}

#[test]
fn test_invalid_utf8_in_comment() {
    let mut driver = Driver::new(
        Lexer::new(&b"def one() 1;\n# caf\xe9\none();\n"[..]),
        &Config::default(),
    );
    let mut out = Vec::new();
    driver.run(&mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.contains("Read top-level expression:"));
    assert!(output.contains("; ModuleID = 'my cool jit'"));
    assert!(!output.contains("LogError"));
}
