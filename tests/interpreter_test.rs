// ABOUTME: End-to-end programs through the full lexer -> parser -> evaluator path

use ez_lang::eval::Interpreter;
use ez_lang::value::Value;
use num_bigint::BigInt;

fn run(src: &str) -> Value {
    let mut interp = Interpreter::new();
    match interp.eval_source(src) {
        Ok(v) => v,
        Err(diags) => panic!("unexpected diagnostics for {:?}: {:?}", src, diags),
    }
}

fn run_error_code(src: &str) -> String {
    let mut interp = Interpreter::new();
    match interp.eval_source(src) {
        Ok(v) => panic!("expected an error for {:?}, got {}", src, v),
        Err(diags) => diags[0].code.clone(),
    }
}

fn assert_int(value: &Value, expected: i64) {
    match value {
        Value::Integer(iv) => assert_eq!(iv.value, BigInt::from(expected)),
        other => panic!("expected integer {}, got {}", expected, other),
    }
}

#[test]
fn arithmetic_program_result() {
    assert_int(&run("temp x int = 5 * 2 + 10"), 20);
}

#[test]
fn recursive_factorial() {
    let src = "do fact(n int) -> int { if n <= 1 { return 1 } return n * fact(n - 1) } \
               temp r int = fact(5) r";
    assert_int(&run(src), 120);
}

#[test]
fn int64_overflow_is_e5005() {
    assert_eq!(run_error_code("temp x int = 9223372036854775807 + 1"), "E5005");
}

#[test]
fn for_each_sums_array() {
    let src = "temp nums [int] = {1, 2, 3, 4, 5} temp sum int = 0 \
               for_each n in nums { sum = sum + n } sum";
    assert_int(&run(src), 15);
}

#[test]
fn strings_are_code_points() {
    assert_int(&run("temp s string = \"Hello 世界\" len(s)"), 8);
    let v = run("temp s string = \"Hello 世界\" s[6]");
    assert!(matches!(v, Value::Char('世')));
}

#[test]
fn swap_through_reference_parameters() {
    let src = "do swap(&a, &b int) { temp t = a a = b b = t } \
               temp x int = 10 temp y int = 20 swap(x, y) x * 100 + y";
    assert_int(&run(src), 2010);
}

#[test]
fn enum_comparisons() {
    let src = "const Color enum { Red, Green, Blue } Color.Red == Color.Blue";
    assert_eq!(run(src).try_eq(&Value::Bool(false)), Some(true));
    assert_eq!(
        run_error_code("const Color enum { Red, Green, Blue } Color.Red == 0"),
        "E3032"
    );
}

#[test]
fn as_long_as_counts_and_breaks() {
    assert_int(&run("temp n int = 0 as_long_as n < 5 { n = n + 1 } n"), 5);
    assert_int(
        &run("temp n int = 0 as_long_as n < 5 { n = n + 1 if n == 3 { break } } n"),
        3,
    );
}

#[test]
fn range_loops_are_inclusive() {
    assert_int(&run("temp s int = 0 for i in range(1, 5) { s = s + i } s"), 15);
    // Step stops strictly before crossing the end
    assert_int(&run("temp s int = 0 for i in range(0, 10, 4) { s = s + i } s"), 12);
    // Descending default step
    assert_int(&run("temp s int = 0 for i in range(3, 1) { s = s + i } s"), 6);
}

#[test]
fn range_membership_is_half_open_with_lattice() {
    assert_eq!(run("0 in range(0, 5)").try_eq(&Value::Bool(true)), Some(true));
    assert_eq!(run("5 in range(0, 5)").try_eq(&Value::Bool(false)), Some(true));
    assert_eq!(run("6 in range(0, 10, 3)").try_eq(&Value::Bool(true)), Some(true));
    assert_eq!(run("7 in range(0, 10, 3)").try_eq(&Value::Bool(false)), Some(true));
}

#[test]
fn new_is_idempotent() {
    let src = "const Inner struct { n int } \
               const Outer struct { inner Inner tag string flag bool } \
               new(Outer) == new(Outer)";
    assert_eq!(run(src).try_eq(&Value::Bool(true)), Some(true));
}

#[test]
fn reference_forwarding_preserves_observation() {
    let src = "do deepest(&v int) { v = v + 1 } \
               do deeper(&v int) { deepest(v) } \
               do deep(&v int) { deeper(v) } \
               temp x int = 41 deep(x) x";
    assert_int(&run(src), 42);
}

#[test]
fn interpolation_canonical_forms() {
    let v = run(r#""${1 + 1} ${2.5} ${true} ${nil} ${"s"}""#);
    assert_eq!(v.try_eq(&Value::Str("2 2.5 true nil s".into())), Some(true));
}

#[test]
fn when_picks_first_matching_arm() {
    let src = "temp x int = 9 temp out int = 0 \
               when x { is 1 { out = 1 } is 9, 10 { out = 2 } default { out = 3 } } out";
    assert_int(&run(src), 2);
}

#[test]
fn multi_return_with_blank() {
    let src = "do divmod(a int, b int) -> (int, int) { return a / b, a % b } \
               temp q, _ = divmod(17, 5) q";
    assert_int(&run(src), 3);
}

#[test]
fn compound_assignment_desugars_to_infix() {
    assert_int(&run("temp x int = 7 x *= 3 x %= 4 x"), 1);
    assert_eq!(run_error_code("temp x int = 1 x /= 0"), "E5004");
}

#[test]
fn struct_field_updates_in_place() {
    let src = "const P struct { x int y int } \
               temp p P = new(P) p.x = 2 p.x += 3 p.x * 10 + p.y";
    assert_int(&run(src), 50);
}

#[test]
fn immutability_is_enforced_everywhere() {
    assert_eq!(run_error_code("const x int = 1 x = 2"), "E5006");
    assert_eq!(run_error_code("const a [int] = {1, 2} a[0] = 9"), "E5011");
    assert_eq!(
        run_error_code("const a [int] = {1, 2} arrays.push(a, 3)"),
        "E5011"
    );
    assert_eq!(
        run_error_code("const a [int] = {1, 2} arrays.fill(a, 0)"),
        "E5011"
    );
    assert_eq!(
        run_error_code("const m = {\"k\": 1} maps.remove(m, \"k\")"),
        "E5011"
    );
}

#[test]
fn declared_byte_arrays_are_range_checked() {
    assert_eq!(run_error_code("temp a [byte] = {0, 256}"), "E3026");
    assert_int(&run("temp a [byte] = {7, 8} a[0] + a[1]"), 15);
}

#[test]
fn nil_is_inert() {
    assert_eq!(run_error_code("temp n = nil n()"), "E4010");
    assert_eq!(run_error_code("temp n = nil n[0]"), "E4010");
    assert_eq!(run_error_code("temp n = nil n.x"), "E4010");
}

#[test]
fn using_brings_module_functions_into_scope() {
    let v = run("using strings\nusing math\nupper(\"ok\") + to_string(abs(-1))");
    assert_eq!(v.try_eq(&Value::Str("OK1".into())), Some(true));
}

#[test]
fn shadowing_in_blocks_does_not_leak() {
    let src = "temp x int = 1 if true { temp x int = 99 x = 100 } x";
    assert_int(&run(src), 1);
}

#[test]
fn sized_integer_suite() {
    // Declared types govern overflow at every arithmetic site
    assert_eq!(run_error_code("temp x u8 = 255 x + 1"), "E5005");
    assert_eq!(run_error_code("temp x i16 = -32768 x - 1"), "E5007");
    let Value::Integer(iv) = run("temp x u64 = 18446744073709551615 x - 1") else {
        panic!()
    };
    assert_eq!(iv.value, BigInt::from(u64::MAX - 1));
    let v = run("temp x u128 = 340282366920938463463374607431768211455 x - 1");
    let Value::Integer(iv) = v else { panic!() };
    assert_eq!(
        iv.value,
        BigInt::parse_bytes(b"340282366920938463463374607431768211454", 10).unwrap()
    );
}

#[test]
fn loop_statement_runs_until_break() {
    assert_int(&run("temp n int = 0 loop { n++ if n == 4 { break } } n"), 4);
}

#[test]
fn continue_skips_iterations() {
    let src = "temp s int = 0 for i in range(1, 6) { if i % 2 == 0 { continue } s = s + i } s";
    assert_int(&run(src), 9);
}
