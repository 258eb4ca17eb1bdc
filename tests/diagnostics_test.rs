// ABOUTME: The diagnostic catalogue contract: stable codes, lookup round-trip,
// and the rendering shapes

use ez_lang::diagnostics::{lookup, Diagnostic, Severity, CATALOG};
use ez_lang::eval::Interpreter;
use ez_lang::lexer::Lexer;
use ez_lang::parser::Parser;

fn eval_codes(src: &str) -> Vec<String> {
    let mut interp = Interpreter::new();
    match interp.eval_source(src) {
        Ok(_) => Vec::new(),
        Err(diags) => diags.into_iter().map(|d| d.code).collect(),
    }
}

#[test]
fn every_catalogue_code_round_trips() {
    for entry in CATALOG {
        let found = lookup(entry.code).expect("code resolves");
        assert_eq!(found.code, entry.code);
        assert!(!found.name.is_empty());
        assert!(!found.description.is_empty());
    }
}

#[test]
fn code_shape_is_stable() {
    for entry in CATALOG {
        let (severity, rest) = entry.code.split_at(1);
        assert!(severity == "E" || severity == "W", "bad code {}", entry.code);
        assert!(
            rest.chars().all(|c| c.is_ascii_digit()),
            "bad code {}",
            entry.code
        );
        assert!(
            entry.name.chars().all(|c| c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || c == '-'),
            "name {} is not a kebab slug",
            entry.name
        );
    }
}

#[test]
fn return_type_mismatch_has_two_codes() {
    assert_eq!(lookup("E3012").unwrap().name, "return-type-mismatch");
    assert_eq!(lookup("E5024").unwrap().name, "return-type-mismatch");
}

#[test]
fn emitted_codes_come_from_the_catalogue() {
    let cases = [
        "temp x int = 9223372036854775807 + 1",
        "1 / 0",
        "break",
        "temp a [int] = {1} a[5]",
        "const x int = 1 x = 2",
        "missing_name",
        "const C enum { A } C.A == 1",
        "do f() { do g() { } }",
        "temp s = \"abc",
        "when 1.5 { is 1 { } default { } }",
    ];
    for src in cases {
        for code in eval_codes(src) {
            assert!(
                lookup(&code).is_some(),
                "program {:?} emitted uncatalogued code {}",
                src,
                code
            );
        }
    }
}

#[test]
fn lexer_diagnostics_carry_positions() {
    let (_, errors) = Lexer::new("temp s = \"ok\"\ntemp t = \"broken").tokenize();
    assert_eq!(errors[0].code, "E1004");
    assert_eq!(errors[0].line, 2);
    assert_eq!(errors[0].column, 10);
}

#[test]
fn lex_positions_reproduce_the_source() {
    let src = "do add(a int, b int) -> int {\n    return a + b\n}\nadd(1_000, 0x2A)";
    let (tokens, errors) = Lexer::new(src).tokenize();
    assert!(errors.is_empty());
    let lines: Vec<&str> = src.lines().collect();
    for tok in &tokens {
        if tok.literal.is_empty() {
            continue;
        }
        assert!(tok.line >= 1 && tok.column >= 1);
        let tail: String = lines[tok.line - 1].chars().skip(tok.column - 1).collect();
        assert!(
            tail.starts_with(&tok.literal),
            "token {:?} does not sit at {}:{}",
            tok.literal,
            tok.line,
            tok.column
        );
    }
}

#[test]
fn parser_recovers_and_reports_many() {
    let mut parser = Parser::new("const a\nconst b\ntemp in = 3\n");
    parser.parse_program();
    let codes: Vec<_> = parser.errors().iter().map(|e| e.code.as_str()).collect();
    assert!(codes.iter().filter(|c| **c == "E2011").count() >= 2);
    assert!(codes.contains(&"E2020"));
}

#[test]
fn human_rendering_is_a_four_line_block() {
    let diag = Diagnostic::error("E5003", "index 4 is out of range for length 2", 3, 7)
        .with_span(11)
        .with_file("demo.ez")
        .with_source("temp a = 1\ntemp b = 2\ntemp c = xs[4]\n")
        .with_help("the array has 2 elements");
    let rendered = diag.render();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "error[E5003]: index 4 is out of range for length 2");
    assert_eq!(lines[1], "  --> demo.ez:3:7");
    assert_eq!(lines[2], "   | temp c = xs[4]");
    assert!(lines[3].contains("^^^^"));
    assert_eq!(lines[4], "help: the array has 2 elements");
}

#[test]
fn json_rendering_has_the_contract_fields() {
    let diag = Diagnostic::warning("W4001", "module `helpers` is declared in file `util`", 1, 1)
        .with_file("util.ez");
    let json: serde_json::Value = serde_json::from_str(&diag.render_json()).unwrap();
    assert_eq!(json["code"], "W4001");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["file"], "util.ez");
    assert_eq!(json["line"], 1);
    assert!(json["end_column"].is_number());
}

#[test]
fn warnings_do_not_halt() {
    let diag = Diagnostic::warning("W1001", "binding is never read", 1, 1);
    assert_eq!(diag.severity, Severity::Warning);
    assert!(!diag.is_error());
}

#[test]
fn undefined_names_suggest_alternatives() {
    let mut interp = Interpreter::new();
    let diags = interp.eval_source("temp counter int = 1\ncouner").unwrap_err();
    assert_eq!(diags[0].code, "E4001");
    assert_eq!(diags[0].help.as_deref(), Some("did you mean `counter`?"));

    let mut interp = Interpreter::new();
    let diags = interp.eval_source("strings.trmi(\"x\")").unwrap_err();
    assert_eq!(diags[0].code, "E4002");
    assert_eq!(diags[0].help.as_deref(), Some("did you mean `strings.trim`?"));
}
