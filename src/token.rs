// ABOUTME: Token kinds and source-positioned token records produced by the lexer

use std::fmt;

/// Every lexeme class the scanner can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals and names
    Ident,
    Blank,
    Int,
    Float,
    Str,
    Char,
    Attribute,

    // Keywords
    Temp,
    Const,
    Do,
    Return,
    If,
    Or,
    Otherwise,
    For,
    ForEach,
    AsLongAs,
    Loop,
    Break,
    Continue,
    In,
    NotIn,
    Range,
    Import,
    Using,
    Struct,
    Enum,
    When,
    Is,
    Default,
    New,
    Nil,
    True,
    False,
    Module,
    Private,
    From,
    Use,
    Ensure,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    PlusPlus,
    MinusMinus,
    AndAnd,
    OrOr,
    Arrow,
    BangIn,
    Amp,

    // Punctuation
    Comma,
    Colon,
    Semicolon,
    Dot,
    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Lbracket,
    Rbracket,

    Illegal,
    Eof,
}

impl TokenKind {
    /// Human-readable name used in parse diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::Blank => "`_`",
            TokenKind::Int => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::Str => "string literal",
            TokenKind::Char => "character literal",
            TokenKind::Attribute => "attribute",
            TokenKind::Temp => "`temp`",
            TokenKind::Const => "`const`",
            TokenKind::Do => "`do`",
            TokenKind::Return => "`return`",
            TokenKind::If => "`if`",
            TokenKind::Or => "`or`",
            TokenKind::Otherwise => "`otherwise`",
            TokenKind::For => "`for`",
            TokenKind::ForEach => "`for_each`",
            TokenKind::AsLongAs => "`as_long_as`",
            TokenKind::Loop => "`loop`",
            TokenKind::Break => "`break`",
            TokenKind::Continue => "`continue`",
            TokenKind::In => "`in`",
            TokenKind::NotIn => "`not_in`",
            TokenKind::Range => "`range`",
            TokenKind::Import => "`import`",
            TokenKind::Using => "`using`",
            TokenKind::Struct => "`struct`",
            TokenKind::Enum => "`enum`",
            TokenKind::When => "`when`",
            TokenKind::Is => "`is`",
            TokenKind::Default => "`default`",
            TokenKind::New => "`new`",
            TokenKind::Nil => "`nil`",
            TokenKind::True => "`true`",
            TokenKind::False => "`false`",
            TokenKind::Module => "`module`",
            TokenKind::Private => "`private`",
            TokenKind::From => "`from`",
            TokenKind::Use => "`use`",
            TokenKind::Ensure => "`ensure`",
            TokenKind::Assign => "`=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::Bang => "`!`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::LtEq => "`<=`",
            TokenKind::GtEq => "`>=`",
            TokenKind::Eq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::PlusAssign => "`+=`",
            TokenKind::MinusAssign => "`-=`",
            TokenKind::StarAssign => "`*=`",
            TokenKind::SlashAssign => "`/=`",
            TokenKind::PercentAssign => "`%=`",
            TokenKind::PlusPlus => "`++`",
            TokenKind::MinusMinus => "`--`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Arrow => "`->`",
            TokenKind::BangIn => "`!in`",
            TokenKind::Amp => "`&`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Dot => "`.`",
            TokenKind::Lparen => "`(`",
            TokenKind::Rparen => "`)`",
            TokenKind::Lbrace => "`{`",
            TokenKind::Rbrace => "`}`",
            TokenKind::Lbracket => "`[`",
            TokenKind::Rbracket => "`]`",
            TokenKind::Illegal => "illegal token",
            TokenKind::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// One lexeme with its exact source slice and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            literal: literal.into(),
            line,
            column,
        }
    }

    /// Column just past the last character of the lexeme.
    pub fn end_column(&self) -> usize {
        self.column + self.literal.chars().count()
    }
}

/// Map an identifier spelling to its keyword kind, if any.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "temp" => TokenKind::Temp,
        "const" => TokenKind::Const,
        "do" => TokenKind::Do,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "or" => TokenKind::Or,
        "otherwise" => TokenKind::Otherwise,
        "for" => TokenKind::For,
        "for_each" => TokenKind::ForEach,
        "as_long_as" => TokenKind::AsLongAs,
        "loop" => TokenKind::Loop,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "in" => TokenKind::In,
        "not_in" => TokenKind::NotIn,
        "range" => TokenKind::Range,
        "import" => TokenKind::Import,
        "using" => TokenKind::Using,
        "struct" => TokenKind::Struct,
        "enum" => TokenKind::Enum,
        "when" => TokenKind::When,
        "is" => TokenKind::Is,
        "default" => TokenKind::Default,
        "new" => TokenKind::New,
        "nil" => TokenKind::Nil,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "module" => TokenKind::Module,
        "private" => TokenKind::Private,
        "from" => TokenKind::From,
        "use" => TokenKind::Use,
        "ensure" => TokenKind::Ensure,
        _ => return None,
    };
    Some(kind)
}

/// Primitive type names, plus `void` and `any`. Reserved as identifiers.
pub const TYPE_NAMES: &[&str] = &[
    "int", "uint", "i8", "i16", "i32", "i64", "i128", "i256", "u8", "u16", "u32", "u64", "u128",
    "u256", "f32", "f64", "float", "string", "bool", "char", "byte", "void", "any",
];

/// True if `name` may not be used as a variable, function, parameter,
/// struct, enum, or type name.
pub fn is_reserved_name(name: &str) -> bool {
    lookup_keyword(name).is_some() || TYPE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(lookup_keyword("as_long_as"), Some(TokenKind::AsLongAs));
        assert_eq!(lookup_keyword("for_each"), Some(TokenKind::ForEach));
        assert_eq!(lookup_keyword("otherwise"), Some(TokenKind::Otherwise));
        assert_eq!(lookup_keyword("upper"), None);
    }

    #[test]
    fn test_reserved_names_cover_types() {
        for ty in ["int", "u256", "f64", "void", "any", "byte"] {
            assert!(is_reserved_name(ty), "{ty} should be reserved");
        }
        assert!(is_reserved_name("temp"));
        assert!(!is_reserved_name("total"));
    }

    #[test]
    fn test_end_column_counts_chars() {
        let tok = Token::new(TokenKind::Str, "\"世界\"", 1, 5);
        assert_eq!(tok.end_column(), 9);
    }
}
