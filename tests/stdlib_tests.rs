// ABOUTME: Standard-library behavior exercised through EZ programs, covering
// the whole resolution path (qualified names, `using`, bare `std` lookup)

use ez_lang::eval::Interpreter;
use ez_lang::value::Value;
use serial_test::serial;

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

fn assert_str(value: &Value, expected: &str) {
    assert_eq!(
        value.try_eq(&Value::Str(expected.into())),
        Some(true),
        "expected {:?}, got {}",
        expected,
        value
    );
}

#[test]
fn strings_surface() {
    assert_str(&run(r#"strings.upper("ez")"#), "EZ");
    assert_str(&run(r#"strings.replace("aaa", "a", "b")"#), "bbb");
    assert_str(
        &run(r#"strings.join(strings.split("a-b-c", "-"), "+")"#),
        "a+b+c",
    );
    assert_str(&run(r#"strings.substring("Hello 世界", 6, 8)"#), "世界");
    assert_eq!(
        run(r#"strings.index_of("Hello 世界", "界")"#).try_eq(&Value::int(7)),
        Some(true)
    );
    assert_eq!(run_error_code(r#"strings.to_int("12x")"#), "E10002");
    assert_eq!(run_error_code(r#"strings.substring("ab", 3, 1)"#), "E10001");
}

#[test]
fn arrays_surface() {
    let src = r#"
        temp xs [int] = {3, 1}
        arrays.push(xs, 2)
        arrays.sort(xs)
        arrays.join(xs, ",")
    "#;
    assert_str(&run(src), "1,2,3");

    assert_eq!(run_error_code("arrays.pop({})"), "E9002");
    assert_eq!(
        run_error_code("temp xs [int] = {1} arrays.remove_at(xs, 4)"),
        "E9005"
    );
    assert_eq!(
        run("temp xs = {1, 2} arrays.contains(xs, 2)").try_eq(&Value::Bool(true)),
        Some(true)
    );

    // clone detaches storage, plain assignment aliases it
    let src = r#"
        temp xs [int] = {1}
        temp alias = xs
        temp copy = arrays.clone(xs)
        arrays.push(alias, 2)
        len(xs) * 10 + len(copy)
    "#;
    assert_eq!(run(src).try_eq(&Value::int(21)), Some(true));
}

#[test]
fn maps_surface() {
    let src = r#"
        temp m = {"a": 1}
        m["b"] = 2
        maps.size(m)
    "#;
    assert_eq!(run(src).try_eq(&Value::int(2)), Some(true));
    assert_eq!(
        run(r#"maps.get_or({"a": 1}, "z", 42)"#).try_eq(&Value::int(42)),
        Some(true)
    );
    assert_eq!(run_error_code(r#"maps.remove({"a": 1}, "z")"#), "E12001");
    assert_str(
        &run(r#"arrays.join(maps.keys({"x": 1, "y": 2}), "")"#),
        "xy",
    );
}

#[test]
fn math_surface() {
    assert_eq!(run("math.abs(0 - 5)").try_eq(&Value::int(5)), Some(true));
    assert_eq!(run("math.max(2, 9)").try_eq(&Value::int(9)), Some(true));
    assert!(matches!(run("math.pi"), Value::Float(f) if (f - std::f64::consts::PI).abs() < 1e-12));
    assert_eq!(run_error_code("math.sqrt(0 - 1)"), "E8001");
    assert_eq!(run_error_code("math.log(0)"), "E8002");
}

#[test]
fn json_surface() {
    let src = r#"
        temp doc = json.parse("{\"name\": \"ada\", \"tags\": [1, 2]}")
        doc["name"] + to_string(len(doc["tags"]))
    "#;
    assert_str(&run(src), "ada2");
    assert_str(
        &run(r#"json.stringify({"k": {1, 2}})"#),
        r#"{"k":[1,2]}"#,
    );
    assert_eq!(run_error_code(r#"json.parse("{oops")"#), "E13001");
}

#[test]
fn encoding_and_crypto_surface() {
    assert_str(&run(r#"encoding.base64_encode("hello")"#), "aGVsbG8=");
    assert_str(
        &run(r#"bytes.to_string(encoding.base64_decode("aGVsbG8="))"#),
        "hello",
    );
    assert_str(&run(r#"encoding.hex_encode("AB")"#), "4142");
    assert_eq!(run_error_code(r#"encoding.hex_decode("zz")"#), "E16001");
    assert_str(
        &run(r#"crypto.md5("abc")"#),
        "900150983cd24fb0d6963f7d28e17f72",
    );
    assert_eq!(
        run(r#"len(crypto.sha256("x"))"#).try_eq(&Value::int(64)),
        Some(true)
    );
}

#[test]
fn bytes_surface() {
    assert_eq!(
        run(r#"bytes.len(bytes.from_string("héllo"))"#).try_eq(&Value::int(6)),
        Some(true)
    );
    assert_eq!(
        run(r#"bytes.at(bytes.from_string("A"), 0)"#).try_eq(&Value::Byte(65)),
        Some(true)
    );
}

#[test]
fn random_surface_is_seedable() {
    let src = r#"
        random.seed(7)
        temp a int = random.int(0, 1000000)
        random.seed(7)
        temp b int = random.int(0, 1000000)
        a == b
    "#;
    assert_eq!(run(src).try_eq(&Value::Bool(true)), Some(true));
    assert_eq!(run_error_code("random.int(9, 1)"), "E7004");
    assert_eq!(run_error_code("random.choice({})"), "E9002");
}

#[test]
fn uuid_surface() {
    assert_eq!(run("len(uuid.v4())").try_eq(&Value::int(36)), Some(true));
    assert_eq!(
        run("uuid.v4() == uuid.v4()").try_eq(&Value::Bool(false)),
        Some(true)
    );
}

#[test]
fn time_surface() {
    assert_str(
        &run(r#"time.format(0, "%Y-%m-%d")"#),
        "1970-01-01",
    );
    assert_eq!(run_error_code("time.sleep(0 - 1)"), "E11001");
    let Value::Integer(now) = run("time.now()") else {
        panic!()
    };
    assert!(now.value > 0.into());
}

#[test]
fn io_surface() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt").to_string_lossy().to_string();
    let src = format!(
        r#"
        io.write_file("{path}", "one\ntwo")
        io.append_file("{path}", "\nthree")
        len(io.read_lines("{path}"))
        "#
    );
    assert_eq!(run(&src).try_eq(&Value::int(3)), Some(true));
    assert_eq!(run_error_code(r#"io.read_file("/no/such/file/here")"#), "E7003");
}

#[test]
#[serial]
fn db_surface() {
    let src = r#"
        temp handle int = db.open(":memory:")
        db.execute(handle, "CREATE TABLE t (n INTEGER)")
        db.execute(handle, "INSERT INTO t VALUES (4), (5)")
        temp rows = db.query(handle, "SELECT n FROM t ORDER BY n")
        temp total int = 0
        for_each row in rows {
            total = total + row["n"]
        }
        db.close(handle)
        total
    "#;
    assert_eq!(run(src).try_eq(&Value::int(9)), Some(true));
    assert_eq!(run_error_code("db.query(12345, \"SELECT 1\")"), "E17003");
}

#[test]
fn argument_validation_codes() {
    assert_eq!(run_error_code("strings.upper(5)"), "E7001");
    assert_eq!(run_error_code(r#"strings.upper("a", "b")"#), "E7002");
    assert_eq!(run_error_code("len()"), "E7002");
    assert_eq!(run_error_code("arrays.push({1}, 2, 3)"), "E7002");
}

#[test]
fn bare_std_names_resolve_last() {
    // A local binding wins over the builtin of the same name
    let src = r#"
        do len(x int) -> int { return 99 }
        len(5)
    "#;
    assert_eq!(run(src).try_eq(&Value::int(99)), Some(true));
    assert_eq!(run("std.typeof(1)").try_eq(&Value::Str("int".into())), Some(true));
}
