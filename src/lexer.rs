// ABOUTME: Single-pass scanner producing positioned tokens and lexical diagnostics
// The lexer never fails: malformed lexemes become an Illegal token or a
// best-effort token plus a recorded diagnostic, and scanning continues so one
// pass reports every lexical problem in a file. Token literals are the exact
// source slice, so (line, column, literal) triples reproduce the input.

use crate::diagnostics::Diagnostic;
use crate::token::{lookup_keyword, Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    errors: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            errors: Vec::new(),
        }
    }

    /// Accumulated lexical diagnostics.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    /// Scan the whole input. The returned vector always ends with `Eof`.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn raw_since(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn error(&mut self, code: &str, message: impl Into<String>, line: usize, col: usize) {
        self.errors.push(Diagnostic::error(code, message, line, col));
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.advance() {
                        if c == '*' && self.peek() == Some('/') {
                            self.advance();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.error("E1003", "unterminated block comment", line, col);
                    }
                }
                _ => break,
            }
        }
    }

    /// Advance past trivia and emit the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let (line, col) = (self.line, self.col);
        let start = self.pos;

        let ch = match self.advance() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, "", line, col),
        };

        let kind = match ch {
            '+' => match self.peek() {
                Some('+') => {
                    self.advance();
                    TokenKind::PlusPlus
                }
                Some('=') => {
                    self.advance();
                    TokenKind::PlusAssign
                }
                _ => TokenKind::Plus,
            },
            '-' => match self.peek() {
                Some('-') => {
                    self.advance();
                    TokenKind::MinusMinus
                }
                Some('=') => {
                    self.advance();
                    TokenKind::MinusAssign
                }
                Some('>') => {
                    self.advance();
                    TokenKind::Arrow
                }
                _ => TokenKind::Minus,
            },
            '*' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::StarAssign
                }
                _ => TokenKind::Star,
            },
            '/' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::SlashAssign
                }
                _ => TokenKind::Slash,
            },
            '%' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::PercentAssign
                }
                _ => TokenKind::Percent,
            },
            '=' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::Eq
                }
                _ => TokenKind::Assign,
            },
            '!' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::NotEq
                }
                Some('i') if self.peek_at(1) == Some('n') && !is_ident_char(self.peek_at(2)) => {
                    self.advance();
                    self.advance();
                    TokenKind::BangIn
                }
                _ => TokenKind::Bang,
            },
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::LtEq
                }
                _ => TokenKind::Lt,
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.advance();
                    TokenKind::GtEq
                }
                _ => TokenKind::Gt,
            },
            '&' => match self.peek() {
                Some('&') => {
                    self.advance();
                    TokenKind::AndAnd
                }
                _ => TokenKind::Amp,
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.advance();
                    TokenKind::OrOr
                }
                _ => {
                    self.error("E1001", "character `|` cannot begin a token", line, col);
                    TokenKind::Illegal
                }
            },
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '(' => TokenKind::Lparen,
            ')' => TokenKind::Rparen,
            '{' => TokenKind::Lbrace,
            '}' => TokenKind::Rbrace,
            '[' => TokenKind::Lbracket,
            ']' => TokenKind::Rbracket,
            '#' | '@' => self.scan_attribute(ch, line, col),
            '"' => self.scan_string(line, col),
            '\'' => self.scan_char(line, col),
            c if c.is_ascii_digit() => self.scan_number(line, col),
            c if c.is_alphabetic() || c == '_' => self.scan_ident(start),
            other => {
                self.error(
                    "E1001",
                    format!("character `{}` cannot begin a token", other),
                    line,
                    col,
                );
                TokenKind::Illegal
            }
        };

        Token::new(kind, self.raw_since(start), line, col)
    }

    fn scan_ident(&mut self, start: usize) -> TokenKind {
        while is_ident_char(self.peek()) {
            self.advance();
        }
        let text = self.raw_since(start);
        if text == "_" {
            TokenKind::Blank
        } else {
            lookup_keyword(&text).unwrap_or(TokenKind::Ident)
        }
    }

    fn scan_attribute(&mut self, sigil: char, line: usize, col: usize) -> TokenKind {
        if !matches!(self.peek(), Some(c) if c.is_alphabetic() || c == '_') {
            self.error(
                "E1001",
                format!("`{}` must be followed by an attribute name", sigil),
                line,
                col,
            );
            return TokenKind::Illegal;
        }
        while is_ident_char(self.peek()) {
            self.advance();
        }
        TokenKind::Attribute
    }

    fn scan_number(&mut self, line: usize, col: usize) -> TokenKind {
        // The first digit is already consumed; `prev` tracks underscore rules.
        let first = self.chars[self.pos - 1];

        if first == '0' && matches!(self.peek(), Some('x') | Some('b')) {
            let base_char = self.advance().unwrap();
            let base_valid: fn(char) -> bool = if base_char == 'x' {
                |c| c.is_ascii_hexdigit()
            } else {
                |c| c == '0' || c == '1'
            };
            if self.peek() == Some('_') {
                self.error("E1015", "`_` may not follow a base prefix", line, col);
            }
            let mut digits = 0usize;
            let mut prev_underscore = false;
            loop {
                match self.peek() {
                    Some('_') => {
                        if prev_underscore {
                            self.error("E1011", "numeric literal contains `__`", line, col);
                        }
                        prev_underscore = true;
                        self.advance();
                    }
                    Some(c) if base_valid(c) => {
                        digits += 1;
                        prev_underscore = false;
                        self.advance();
                    }
                    Some(c) if c.is_ascii_alphanumeric() => {
                        self.error(
                            "E1014",
                            format!("digit `{}` is not valid for this base", c),
                            line,
                            col,
                        );
                        prev_underscore = false;
                        self.advance();
                    }
                    _ => break,
                }
            }
            if prev_underscore {
                self.error("E1010", "numeric literal ends with `_`", line, col);
            }
            if digits == 0 {
                let (code, what) = if base_char == 'x' {
                    ("E1012", "hex")
                } else {
                    ("E1013", "binary")
                };
                self.error(code, format!("{} literal has no digits", what), line, col);
            }
            return TokenKind::Int;
        }

        let mut prev_underscore = false;
        self.scan_digit_run(&mut prev_underscore, line, col);

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            let mut frac_underscore = false;
            self.scan_digit_run(&mut frac_underscore, line, col);
            prev_underscore = frac_underscore;
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let after_sign = match self.peek_at(1) {
                Some('+') | Some('-') => self.peek_at(2),
                other => other,
            };
            if matches!(after_sign, Some(c) if c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
                let mut exp_underscore = false;
                self.scan_digit_run(&mut exp_underscore, line, col);
                prev_underscore = exp_underscore;
            } else if !is_ident_char(self.peek_at(1)) || self.peek_at(1) == Some('_') {
                // `1e` followed by nothing numeric: consume marker, report
                self.advance();
                self.error("E1016", "exponent marker has no digits", line, col);
                is_float = true;
            }
        }

        if prev_underscore {
            self.error("E1010", "numeric literal ends with `_`", line, col);
        }

        if is_float {
            TokenKind::Float
        } else {
            TokenKind::Int
        }
    }

    fn scan_digit_run(&mut self, trailing_underscore: &mut bool, line: usize, col: usize) {
        let mut prev_underscore = false;
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_digit() => {
                    prev_underscore = false;
                    self.advance();
                }
                Some('_') => {
                    if prev_underscore {
                        self.error("E1011", "numeric literal contains `__`", line, col);
                    }
                    prev_underscore = true;
                    self.advance();
                }
                _ => break,
            }
        }
        *trailing_underscore = prev_underscore;
    }

    fn scan_string(&mut self, line: usize, col: usize) -> TokenKind {
        loop {
            match self.advance() {
                None => {
                    self.error("E1004", "unterminated string literal", line, col);
                    return TokenKind::Str;
                }
                Some('"') => return TokenKind::Str,
                Some('\\') => match self.advance() {
                    None => {
                        self.error("E1004", "unterminated string literal", line, col);
                        return TokenKind::Str;
                    }
                    Some(e) if is_string_escape(e) => {}
                    Some(e) => {
                        self.error(
                            "E1006",
                            format!("unsupported escape `\\{}` in string literal", e),
                            line,
                            col,
                        );
                    }
                },
                Some('$') if self.peek() == Some('{') => {
                    // Interpolation hole: consume through the matching brace,
                    // honoring nested braces and inner strings.
                    self.advance();
                    let mut depth = 1usize;
                    loop {
                        match self.advance() {
                            None => {
                                self.error("E1004", "unterminated string literal", line, col);
                                return TokenKind::Str;
                            }
                            Some('{') => depth += 1,
                            Some('}') => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            Some('"') => {
                                // inner string inside the hole
                                loop {
                                    match self.advance() {
                                        None => {
                                            self.error(
                                                "E1004",
                                                "unterminated string literal",
                                                line,
                                                col,
                                            );
                                            return TokenKind::Str;
                                        }
                                        Some('\\') => {
                                            self.advance();
                                        }
                                        Some('"') => break,
                                        _ => {}
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
                Some('\n') => {
                    self.error("E1004", "unterminated string literal", line, col);
                    return TokenKind::Str;
                }
                _ => {}
            }
        }
    }

    fn scan_char(&mut self, line: usize, col: usize) -> TokenKind {
        match self.peek() {
            None => {
                self.error("E1005", "unterminated character literal", line, col);
                return TokenKind::Char;
            }
            Some('\'') => {
                self.advance();
                self.error("E1007", "empty character literal", line, col);
                return TokenKind::Char;
            }
            _ => {}
        }

        match self.advance() {
            Some('\\') => match self.advance() {
                Some(e) if is_string_escape(e) => {}
                Some(e) => self.error(
                    "E1009",
                    format!("unsupported escape `\\{}` in character literal", e),
                    line,
                    col,
                ),
                None => {
                    self.error("E1005", "unterminated character literal", line, col);
                    return TokenKind::Char;
                }
            },
            Some(_) => {}
            None => {
                self.error("E1005", "unterminated character literal", line, col);
                return TokenKind::Char;
            }
        }

        match self.peek() {
            Some('\'') => {
                self.advance();
            }
            Some(_) => {
                // More than one code point: consume to the closing quote
                let mut terminated = false;
                while let Some(c) = self.advance() {
                    if c == '\'' {
                        terminated = true;
                        break;
                    }
                    if c == '\n' {
                        break;
                    }
                }
                if terminated {
                    self.error(
                        "E1008",
                        "character literal contains more than one code point",
                        line,
                        col,
                    );
                } else {
                    self.error("E1005", "unterminated character literal", line, col);
                }
            }
            None => {
                self.error("E1005", "unterminated character literal", line, col);
            }
        }
        TokenKind::Char
    }
}

fn is_ident_char(c: Option<char>) -> bool {
    matches!(c, Some(c) if c.is_alphanumeric() || c == '_')
}

fn is_string_escape(c: char) -> bool {
    matches!(c, 'n' | 't' | 'r' | '\\' | '"' | '\'' | '0')
}

/// Decode the escape character `c` (the letter after the backslash).
pub fn decode_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, _) = Lexer::new(src).tokenize();
        tokens.iter().map(|t| t.kind).collect()
    }

    fn first_error_code(src: &str) -> Option<String> {
        let (_, errors) = Lexer::new(src).tokenize();
        errors.first().map(|e| e.code.clone())
    }

    #[test]
    fn test_operators_and_compounds() {
        assert_eq!(
            kinds("+ += ++ - -= -- -> == != <= >= && || !in %="),
            vec![
                TokenKind::Plus,
                TokenKind::PlusAssign,
                TokenKind::PlusPlus,
                TokenKind::Minus,
                TokenKind::MinusAssign,
                TokenKind::MinusMinus,
                TokenKind::Arrow,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::BangIn,
                TokenKind::PercentAssign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_and_blank() {
        assert_eq!(
            kinds("temp const do as_long_as for_each _ x"),
            vec![
                TokenKind::Temp,
                TokenKind::Const,
                TokenKind::Do,
                TokenKind::AsLongAs,
                TokenKind::ForEach,
                TokenKind::Blank,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let (tokens, _) = Lexer::new("temp x = 5\nx++").tokenize();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 6));
        assert_eq!((tokens[4].line, tokens[4].column), (2, 1));
        assert_eq!(tokens[5].kind, TokenKind::PlusPlus);
        assert_eq!((tokens[5].line, tokens[5].column), (2, 2));
    }

    #[test]
    fn test_literal_matches_source_slice() {
        let src = "temp name string = \"hi ${who}\" // greet\nconst n = 0xFF_0";
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty(), "{errors:?}");
        let lines: Vec<&str> = src.lines().collect();
        for tok in tokens.iter().filter(|t| t.kind != TokenKind::Eof) {
            let line = lines[tok.line - 1];
            let from_col: String = line.chars().skip(tok.column - 1).collect();
            assert!(
                from_col.starts_with(&tok.literal),
                "literal {:?} not at {}:{}",
                tok.literal,
                tok.line,
                tok.column
            );
        }
    }

    #[test]
    fn test_int_literal_forms() {
        assert_eq!(kinds("1_000 0xFF 0b1010")[..3], [
            TokenKind::Int,
            TokenKind::Int,
            TokenKind::Int
        ]);
        assert_eq!(first_error_code("10_"), Some("E1010".into()));
        assert_eq!(first_error_code("1__0"), Some("E1011".into()));
        assert_eq!(first_error_code("0x"), Some("E1012".into()));
        assert_eq!(first_error_code("0b"), Some("E1013".into()));
        assert_eq!(first_error_code("0b102"), Some("E1014".into()));
        assert_eq!(first_error_code("0x_FF"), Some("E1015".into()));
    }

    #[test]
    fn test_float_literal_forms() {
        assert_eq!(kinds("1.5 2e10 3.25e-2")[..3], [
            TokenKind::Float,
            TokenKind::Float,
            TokenKind::Float
        ]);
        assert_eq!(first_error_code("1e"), Some("E1016".into()));
    }

    #[test]
    fn test_member_dot_is_not_a_float() {
        assert_eq!(
            kinds("arr.len"),
            vec![
                TokenKind::Ident,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_with_interpolation_stays_one_token() {
        let (tokens, errors) = Lexer::new(r#""sum: ${a + {1: 2}[1]}""#).tokenize();
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(first_error_code("\"abc"), Some("E1004".into()));
        assert_eq!(first_error_code("\"a\\qb\""), Some("E1006".into()));
    }

    #[test]
    fn test_char_literals() {
        let (tokens, errors) = Lexer::new("'a' '\\n' '世'").tokenize();
        assert!(errors.is_empty(), "{errors:?}");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Char));

        assert_eq!(first_error_code("''"), Some("E1007".into()));
        assert_eq!(first_error_code("'ab'"), Some("E1008".into()));
        assert_eq!(first_error_code("'\\q'"), Some("E1009".into()));
        assert_eq!(first_error_code("'a"), Some("E1005".into()));
    }

    #[test]
    fn test_comments_are_trivia() {
        assert_eq!(
            kinds("1 // line\n/* block\nstill */ 2"),
            vec![TokenKind::Int, TokenKind::Int, TokenKind::Eof]
        );
        assert_eq!(first_error_code("/* never closed"), Some("E1003".into()));
    }

    #[test]
    fn test_attributes() {
        let (tokens, errors) = Lexer::new("#strict #doc @ignore @suppress").tokenize();
        assert!(errors.is_empty());
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Attribute));
        assert_eq!(tokens[0].literal, "#strict");
        assert_eq!(tokens[2].literal, "@ignore");
    }

    #[test]
    fn test_illegal_character_recovers() {
        let (tokens, errors) = Lexer::new("a ~ b").tokenize();
        assert_eq!(errors[0].code, "E1001");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Ident,
                TokenKind::Illegal,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_bang_in_requires_word_boundary() {
        // `!inner` is negation of an identifier, not the `!in` operator
        assert_eq!(
            kinds("!inner"),
            vec![TokenKind::Bang, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(
            kinds("x !in xs"),
            vec![
                TokenKind::Ident,
                TokenKind::BangIn,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }
}
