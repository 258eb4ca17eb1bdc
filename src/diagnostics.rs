// ABOUTME: Diagnostic codes, records, and rendering
// Every condition the interpreter can report has a stable code of the form
// E<cat><nnn> (errors) or W<cat><nnn> (warnings). The first digits pick the
// category: 1 lexical, 2 parse, 3 type, 4 reference, 5 runtime, 6 import,
// 7 stdlib argument validation and I/O, 8 math, 9 arrays, 10 strings,
// 11 time, 12 maps, 13 json, 14 http, 15 crypto, 16 encoding, 17 db,
// 18 server. The catalogue is closed: new conditions get new codes, existing
// codes never change meaning.

use serde::Serialize;
use std::fmt;

/// One entry of the code catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The full, closed catalogue. Order groups by category.
pub const CATALOG: &[CatalogEntry] = &[
    // ---- Lexical (E1xxx) ----
    entry("E1001", "illegal-character", "character cannot begin any token"),
    entry("E1002", "unexpected-eof", "source ended while scanning a token"),
    entry("E1003", "unterminated-block-comment", "block comment is missing its closing `*/`"),
    entry("E1004", "unterminated-string", "string literal is missing its closing `\"`"),
    entry("E1005", "unterminated-char", "character literal is missing its closing `'`"),
    entry("E1006", "invalid-string-escape", "unsupported escape sequence in string literal"),
    entry("E1007", "empty-char-literal", "character literal contains no character"),
    entry("E1008", "multi-char-literal", "character literal contains more than one code point"),
    entry("E1009", "invalid-char-escape", "unsupported escape sequence in character literal"),
    entry("E1010", "number-trailing-underscore", "numeric literal ends with `_`"),
    entry("E1011", "number-consecutive-underscores", "numeric literal contains `__`"),
    entry("E1012", "hex-literal-empty", "`0x` prefix is not followed by hex digits"),
    entry("E1013", "binary-literal-empty", "`0b` prefix is not followed by binary digits"),
    entry("E1014", "invalid-digit-for-base", "digit is not valid for the literal's base"),
    entry("E1015", "number-leading-underscore", "`_` may not follow a base prefix"),
    entry("E1016", "invalid-float-exponent", "exponent marker is not followed by digits"),
    // ---- Parse (E2xxx) ----
    entry("E2001", "unexpected-token", "token is not valid at this position"),
    entry("E2002", "expected-identifier", "an identifier was required here"),
    entry("E2003", "expected-type", "a type annotation was required here"),
    entry("E2004", "unclosed-delimiter", "opening delimiter was never closed"),
    entry("E2005", "expected-expression", "an expression was required here"),
    entry("E2006", "expected-block", "a `{ ... }` block was required here"),
    entry("E2007", "invalid-assignment-target", "left side of assignment is not assignable"),
    entry("E2008", "expected-parameter", "a parameter declaration was required here"),
    entry("E2009", "using-before-import", "`using` must follow all `import` statements"),
    entry("E2010", "using-unknown-module", "`using` names a module that was never imported"),
    entry("E2011", "const-missing-initializer", "`const` declaration has no initializer"),
    entry("E2012", "duplicate-parameter", "parameter name appears more than once"),
    entry("E2013", "duplicate-struct-field", "struct field name appears more than once"),
    entry("E2014", "duplicate-enum-variant", "enum variant name appears more than once"),
    entry("E2019", "nested-function", "function declarations may not nest"),
    entry("E2020", "reserved-variable-name", "reserved word used as a variable name"),
    entry("E2021", "reserved-function-name", "reserved word used as a function name"),
    entry("E2022", "reserved-parameter-name", "reserved word used as a parameter name"),
    entry("E2033", "reserved-struct-name", "reserved word used as a struct name"),
    entry("E2037", "reserved-enum-name", "reserved word used as an enum name"),
    entry("E2038", "reserved-type-name", "reserved word used as a type name"),
    entry("E2039", "default-before-required", "defaulted parameter precedes a required one"),
    entry("E2040", "reference-parameter-default", "`&` parameter may not have a default value"),
    entry("E2041", "when-missing-default", "non-strict `when` requires a `default` arm"),
    entry("E2042", "strict-when-has-default", "`#strict` `when` may not have a `default` arm"),
    entry("E2043", "when-duplicate-value", "`is` value appears in more than one arm"),
    entry("E2044", "when-float-condition", "`when` condition may not be a float"),
    entry("E2045", "strict-when-non-enum", "`#strict` applies only to enum conditions"),
    entry("E2046", "strict-when-not-exhaustive", "`#strict` `when` must list every enum variant"),
    entry("E2047", "when-type-condition", "`when` condition may not be a type"),
    entry("E2048", "when-boolean-condition", "`when` condition may not be a boolean"),
    entry("E2049", "when-nil-condition", "`when` condition may not be nil"),
    entry("E2050", "when-collection-condition", "`when` condition may not be a collection"),
    entry("E2051", "suppress-bad-target", "`#suppress` does not apply to this declaration"),
    entry("E2053", "type-definition-scope", "struct and enum definitions must be at file scope"),
    entry("E2055", "strict-bad-target", "`#strict` applies only to `when` statements"),
    entry("E2056", "executable-statement-at-file-scope", "module files may only contain declarations"),
    entry("E2058", "doc-bad-target", "`#doc` does not apply to this declaration"),
    entry("E2059", "doc-detached", "`#doc` must immediately precede a declaration"),
    entry("E2060", "doc-duplicate", "`#doc` appears more than once on one target"),
    // ---- Type (E3xxx) ----
    entry("E3001", "type-mismatch", "value type does not match the declared type"),
    entry("E3002", "operand-type-mismatch", "operator is not defined for these operand types"),
    entry("E3012", "return-type-mismatch", "returned value does not match the declared return type"),
    entry("E3026", "byte-value-out-of-range", "byte element is outside 0..=255"),
    entry("E3032", "enum-comparison-mismatch", "enum values of different enum types cannot be compared"),
    entry("E3039", "ensure-non-call", "`ensure` applies only to a call"),
    entry("E3040", "multi-assign-arity", "declaration name count does not match value count"),
    entry("E3041", "array-size-mismatch", "array literal length does not match the declared size"),
    // ---- Reference (E4xxx) ----
    entry("E4001", "undefined-variable", "name is not bound in any enclosing scope"),
    entry("E4002", "undefined-function", "function name cannot be resolved"),
    entry("E4003", "undefined-module", "module alias is not imported"),
    entry("E4004", "undefined-type", "type name is not defined"),
    entry("E4005", "undefined-reference", "name was accessed before it was defined"),
    entry("E4006", "undefined-field", "struct has no field with this name"),
    entry("E4007", "undefined-enum-variant", "enum has no variant with this name"),
    entry("E4010", "nil-access", "nil cannot be called, indexed, or accessed"),
    // ---- Runtime (E5xxx) ----
    entry("E5001", "not-callable", "value is not callable"),
    entry("E5002", "not-indexable", "value cannot be indexed"),
    entry("E5003", "index-out-of-range", "index is outside the collection bounds"),
    entry("E5004", "division-by-zero", "division or modulo by zero"),
    entry("E5005", "integer-overflow", "result exceeds the maximum of the declared integer type"),
    entry("E5006", "immutable-assignment", "cannot assign to a `const` binding"),
    entry("E5007", "integer-underflow", "result is below the minimum of the declared integer type"),
    entry("E5008", "wrong-argument-count", "call supplies the wrong number of arguments"),
    entry("E5009", "break-outside-loop", "`break` used outside a loop"),
    entry("E5010", "continue-outside-loop", "`continue` used outside a loop"),
    entry("E5011", "immutable-collection", "cannot mutate a `const` collection"),
    entry("E5012", "destructure-arity", "multi-value assignment arity does not match"),
    entry("E5013", "invalid-map-key", "value cannot be used as a map key"),
    entry("E5014", "invalid-range-bound", "range bounds must be integers"),
    entry("E5015", "zero-range-step", "range step may not be zero"),
    entry("E5016", "postfix-non-integer", "`++`/`--` apply only to integer variables"),
    entry("E5018", "recursion-limit", "maximum call depth exceeded"),
    entry("E5024", "return-type-mismatch", "returned value does not match the declared return type"),
    // ---- Import / module (E6xxx) ----
    entry("E6001", "module-not-found", "import path does not resolve to a file or directory"),
    entry("E6002", "module-parse-failed", "imported module contains errors"),
    entry("E6003", "module-read-failed", "imported module could not be read"),
    entry("E6004", "invalid-import-path", "import path is malformed"),
    entry("E6006", "directory-module-mismatch", "files of a directory module declare different module names"),
    entry("E6007", "internal-module-access", "`internal/` modules are visible only to their parent tree"),
    // ---- Stdlib argument validation and I/O (E7xxx) ----
    entry("E7001", "wrong-argument-type", "builtin received an argument of the wrong type"),
    entry("E7002", "builtin-argument-count", "builtin received the wrong number of arguments"),
    entry("E7003", "io-error", "filesystem operation failed"),
    entry("E7004", "invalid-argument", "builtin received an invalid argument value"),
    // ---- Math (E8xxx) ----
    entry("E8001", "sqrt-of-negative", "square root of a negative number"),
    entry("E8002", "log-domain", "logarithm of a non-positive number"),
    // ---- Arrays (E9xxx) ----
    entry("E9002", "empty-array", "operation requires a non-empty array"),
    entry("E9003", "slice-bounds", "slice bounds are outside the array"),
    entry("E9004", "unorderable-elements", "array elements cannot be ordered"),
    entry("E9005", "array-index-bounds", "array index is outside the array"),
    // ---- Strings (E10xxx) ----
    entry("E10001", "substring-bounds", "substring bounds are outside the string"),
    entry("E10002", "int-parse", "string cannot be parsed as an integer"),
    entry("E10003", "float-parse", "string cannot be parsed as a float"),
    // ---- Time (E11xxx) ----
    entry("E11001", "negative-duration", "duration must be non-negative"),
    entry("E11002", "invalid-time-format", "time format string is invalid"),
    // ---- Maps (E12xxx) ----
    entry("E12001", "missing-key", "map has no entry for this key"),
    // ---- JSON (E13xxx) ----
    entry("E13001", "invalid-json", "text is not valid JSON"),
    entry("E13002", "unrepresentable-value", "value has no JSON representation"),
    // ---- HTTP (E14xxx) ----
    entry("E14001", "request-failed", "HTTP request failed"),
    entry("E14002", "invalid-url", "URL is malformed"),
    // ---- Crypto (E15xxx) ----
    entry("E15001", "digest-failed", "digest computation failed"),
    // ---- Encoding (E16xxx) ----
    entry("E16001", "invalid-encoding", "input is not valid for this encoding"),
    entry("E16002", "invalid-utf8", "bytes are not valid UTF-8"),
    // ---- DB (E17xxx) ----
    entry("E17001", "db-open-failed", "database could not be opened"),
    entry("E17002", "db-query-failed", "SQL statement failed"),
    entry("E17003", "db-unknown-handle", "database handle is not open"),
    // ---- Server (E18xxx) ----
    entry("E18001", "bind-failed", "server could not bind its address"),
    // ---- Warnings ----
    entry("W1001", "unused-variable", "binding is never read"),
    entry("W1002", "unused-function", "function is never called"),
    entry("W1003", "unused-import", "imported module is never used"),
    entry("W2001", "unreachable-code", "statement can never execute"),
    entry("W2002", "constant-condition", "condition is always the same value"),
    entry("W3001", "shadowed-binding", "binding shadows one in an enclosing scope"),
    entry("W4001", "module-name-mismatch", "declared module name differs from the file name"),
    entry("W4002", "empty-module", "module file declares nothing"),
];

const fn entry(
    code: &'static str,
    name: &'static str,
    description: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        code,
        name,
        description,
    }
}

/// Resolve a code to its catalogue entry.
pub fn lookup(code: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.code == code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// A single reported condition, carrying everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: Severity,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub end_column: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            code: code.to_string(),
            severity: Severity::Error,
            message: message.into(),
            file: String::new(),
            line,
            column,
            end_column: column + 1,
            source_line: None,
            help: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>, line: usize, column: usize) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(code, message, line, column)
        }
    }

    pub fn with_span(mut self, end_column: usize) -> Self {
        self.end_column = end_column.max(self.column + 1);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = file.into();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Attach the offending source line, looked up from the full source text.
    pub fn with_source(mut self, source: &str) -> Self {
        if self.line >= 1 {
            self.source_line = source.lines().nth(self.line - 1).map(str::to_string);
        }
        self
    }

    /// Four-line human rendering: header, location arrow, source line with
    /// caret span, optional help.
    pub fn render(&self) -> String {
        let mut out = format!("{}[{}]: {}\n", self.severity, self.code, self.message);
        let file = if self.file.is_empty() {
            "<input>"
        } else {
            &self.file
        };
        out.push_str(&format!("  --> {}:{}:{}\n", file, self.line, self.column));
        if let Some(src) = &self.source_line {
            out.push_str(&format!("   | {}\n", src));
            let pad = " ".repeat(self.column.saturating_sub(1));
            let width = self.end_column.saturating_sub(self.column).max(1);
            out.push_str(&format!("   | {}{}\n", pad, "^".repeat(width)));
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("help: {}\n", help));
        }
        out
    }

    pub fn render_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

/// "did you mean" candidate for an unresolved name, if one is close enough.
pub fn suggest<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &str)> = None;
    for cand in candidates {
        if cand == name {
            continue;
        }
        let dist = strsim::levenshtein(name, cand);
        if dist <= 2 && best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, cand));
        }
    }
    best.map(|(_, cand)| format!("did you mean `{}`?", cand))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_round_trip() {
        for entry in CATALOG {
            let found = lookup(entry.code).expect("every code resolves");
            assert_eq!(found.code, entry.code);
        }
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.code, b.code, "duplicate code {}", a.code);
            }
        }
    }

    #[test]
    fn test_return_type_mismatch_aliases() {
        assert_eq!(lookup("E3012").unwrap().name, "return-type-mismatch");
        assert_eq!(lookup("E5024").unwrap().name, "return-type-mismatch");
    }

    #[test]
    fn test_render_block_shape() {
        let d = Diagnostic::error("E5004", "division or modulo by zero", 2, 9)
            .with_span(10)
            .with_file("main.ez")
            .with_source("temp x = 1\ntemp y  = x / 0\n")
            .with_help("the divisor evaluates to 0");
        let rendered = d.render();
        assert!(rendered.starts_with("error[E5004]: division or modulo by zero"));
        assert!(rendered.contains("--> main.ez:2:9"));
        assert!(rendered.contains("temp y  = x / 0"));
        assert!(rendered.contains("help: the divisor"));
    }

    #[test]
    fn test_suggest_close_name() {
        let help = suggest("lenth", ["len", "println", "typeof"]);
        assert_eq!(help.as_deref(), Some("did you mean `len`?"));
        assert!(suggest("xyzzy", ["len", "println"]).is_none());
    }

    #[test]
    fn test_serialize_includes_span() {
        let d = Diagnostic::warning("W4001", "declared module name differs", 1, 1);
        let json = d.render_json();
        assert!(json.contains("\"code\":\"W4001\""));
        assert!(json.contains("\"severity\":\"warning\""));
    }
}
