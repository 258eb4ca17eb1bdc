// ABOUTME: Pratt parser for EZ source
// Statement-form keywords are dispatched at statement start; everything else
// is an expression statement. The parser never fails hard: diagnostics are
// recorded and panic-mode recovery resumes at the next statement boundary,
// so one pass reports every problem in a file.

use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::lexer::{decode_escape, Lexer};
use crate::token::{is_reserved_name, Token, TokenKind};
use num_bigint::BigInt;
use num_traits::Num;
use std::collections::{HashMap, HashSet};

/// Binding strength, low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Or,
    And,
    Equality,
    Comparison,
    Additive,
    Multiplicative,
    Prefix,
    Postfix,
}

fn precedence_of(kind: TokenKind) -> Prec {
    match kind {
        TokenKind::OrOr => Prec::Or,
        TokenKind::AndAnd => Prec::And,
        TokenKind::Eq | TokenKind::NotEq => Prec::Equality,
        TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq
        | TokenKind::In
        | TokenKind::NotIn
        | TokenKind::BangIn => Prec::Comparison,
        TokenKind::Plus | TokenKind::Minus => Prec::Additive,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Prec::Multiplicative,
        TokenKind::PlusPlus
        | TokenKind::MinusMinus
        | TokenKind::Lparen
        | TokenKind::Lbracket
        | TokenKind::Dot => Prec::Postfix,
        _ => Prec::Lowest,
    }
}

/// Whether a file is the entry script or an imported module. Module files
/// are declaration-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Script,
    ModuleFile,
}

/// Attributes collected ahead of a declaration.
#[derive(Debug, Default)]
struct PendingAttrs {
    strict: Option<Position>,
    suppress: Option<Position>,
    doc: Option<(String, Position)>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<Diagnostic>,
    mode: ParseMode,
    fn_depth: usize,
    block_depth: usize,
    seen_using: bool,
    imported: HashSet<String>,
    enums: HashMap<String, Vec<String>>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Parser::with_mode(source, ParseMode::Script)
    }

    pub fn with_mode(source: &str, mode: ParseMode) -> Self {
        let (tokens, lex_errors) = Lexer::new(source).tokenize();
        Parser {
            tokens,
            pos: 0,
            errors: lex_errors,
            mode,
            fn_depth: 0,
            block_depth: 0,
            seen_using: false,
            imported: HashSet::new(),
            enums: HashMap::new(),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.errors)
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> TokenKind {
        self.cur().kind
    }

    fn cur_pos(&self) -> Position {
        Position::new(self.cur().line, self.cur().column)
    }

    fn advance(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.cur_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&mut self, code: &str, message: impl Into<String>) {
        let tok = self.cur().clone();
        self.errors.push(
            Diagnostic::error(code, message, tok.line, tok.column).with_span(tok.end_column()),
        );
    }

    fn error_at(&mut self, code: &str, message: impl Into<String>, pos: Position) {
        self.errors
            .push(Diagnostic::error(code, message, pos.line, pos.column));
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.cur_kind() == kind {
            return Some(self.advance());
        }
        let found = self.cur_kind();
        let (code, msg) = match kind {
            TokenKind::Ident => ("E2002", format!("expected identifier, found {}", found)),
            TokenKind::Lbrace => ("E2006", format!("expected a block, found {}", found)),
            _ => (
                "E2001",
                format!("expected {}, found {}", kind.describe(), found),
            ),
        };
        self.error_here(code, msg);
        None
    }

    /// Panic-mode recovery: skip to the next plausible statement boundary.
    fn synchronize(&mut self) {
        loop {
            match self.cur_kind() {
                TokenKind::Eof | TokenKind::Rbrace => return,
                TokenKind::Temp
                | TokenKind::Const
                | TokenKind::Do
                | TokenKind::If
                | TokenKind::For
                | TokenKind::ForEach
                | TokenKind::AsLongAs
                | TokenKind::Loop
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Import
                | TokenKind::Using
                | TokenKind::When
                | TokenKind::Module => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Program and statements
    // ------------------------------------------------------------------

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while self.cur_kind() != TokenKind::Eof {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => {
                    if self.mode == ParseMode::ModuleFile && !stmt.is_declaration() {
                        self.error_at(
                            "E2056",
                            "module files may only contain declarations",
                            stmt.pos(),
                        );
                    }
                    statements.push(stmt);
                }
                None => self.synchronize(),
            }
            if self.pos == before {
                // Nothing consumed: force progress
                self.advance();
            }
        }
        Program { statements }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur_kind() {
            TokenKind::Attribute => self.parse_attributed(),
            TokenKind::Temp | TokenKind::Const => self.parse_declaration(PendingAttrs::default()),
            TokenKind::Do => self.parse_function(PendingAttrs::default()),
            TokenKind::Struct | TokenKind::Enum => self.parse_bare_type_decl(),
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::AsLongAs => self.parse_as_long_as(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::For => self.parse_for(),
            TokenKind::ForEach => self.parse_for_each(),
            TokenKind::Break => {
                let pos = self.cur_pos();
                self.advance();
                Some(Statement::Break { pos })
            }
            TokenKind::Continue => {
                let pos = self.cur_pos();
                self.advance();
                Some(Statement::Continue { pos })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::Using => self.parse_using(),
            TokenKind::When => self.parse_when(false),
            TokenKind::Module => self.parse_module_decl(),
            TokenKind::Ensure => self.parse_ensure(),
            TokenKind::Lbrace => {
                let block = self.parse_block()?;
                Some(Statement::Block(block))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_attributed(&mut self) -> Option<Statement> {
        let mut attrs = PendingAttrs::default();
        while self.cur_kind() == TokenKind::Attribute {
            let tok = self.advance();
            let pos = Position::new(tok.line, tok.column);
            match tok.literal.as_str() {
                "#strict" => attrs.strict = Some(pos),
                "#suppress" | "@suppress" | "@ignore" => attrs.suppress = Some(pos),
                "#doc" => {
                    if attrs.doc.is_some() {
                        self.error_at("E2060", "`#doc` appears more than once on one target", pos);
                    }
                    let text = if self.cur_kind() == TokenKind::Str {
                        let raw = self.advance();
                        unescape_plain(&raw.literal)
                    } else {
                        self.error_here("E2001", "`#doc` requires a string argument");
                        String::new()
                    };
                    attrs.doc = Some((text, pos));
                }
                other => {
                    self.error_at("E2001", format!("unknown attribute `{}`", other), pos);
                }
            }
        }

        match self.cur_kind() {
            TokenKind::When => {
                if let Some((_, pos)) = &attrs.doc {
                    self.error_at("E2058", "`#doc` does not apply to `when`", *pos);
                }
                if let Some(pos) = attrs.suppress {
                    self.error_at("E2051", "`#suppress` does not apply to `when`", pos);
                }
                self.parse_when(attrs.strict.is_some())
            }
            TokenKind::Temp | TokenKind::Const => {
                self.reject_strict(&attrs);
                self.parse_declaration(attrs)
            }
            TokenKind::Do => {
                self.reject_strict(&attrs);
                self.parse_function(attrs)
            }
            TokenKind::Struct | TokenKind::Enum => {
                self.reject_strict(&attrs);
                self.parse_bare_type_decl()
            }
            _ => {
                if let Some((_, pos)) = &attrs.doc {
                    self.error_at("E2059", "`#doc` must immediately precede a declaration", *pos);
                } else if let Some(pos) = attrs.suppress {
                    self.error_at(
                        "E2051",
                        "`#suppress` must immediately precede a declaration",
                        pos,
                    );
                } else if let Some(pos) = attrs.strict {
                    self.error_at("E2055", "`#strict` applies only to `when` statements", pos);
                }
                self.parse_statement()
            }
        }
    }

    fn reject_strict(&mut self, attrs: &PendingAttrs) {
        if let Some(pos) = attrs.strict {
            self.error_at("E2055", "`#strict` applies only to `when` statements", pos);
        }
    }

    fn parse_declaration(&mut self, attrs: PendingAttrs) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let mutable = kw.kind == TokenKind::Temp;

        let first = self.parse_binding_name()?;

        // `const Name struct { ... }` / `const Name enum { ... }`
        match self.cur_kind() {
            TokenKind::Struct => return self.parse_struct_body(first, pos, attrs),
            TokenKind::Enum => return self.parse_enum_body(first, pos, attrs),
            _ => {}
        }

        let mut names = vec![first];
        while self.eat(TokenKind::Comma) {
            names.push(self.parse_binding_name()?);
        }

        let type_annot = if self.can_start_type() {
            self.parse_type()
        } else {
            None
        };

        let value = if self.eat(TokenKind::Assign) {
            Some(self.parse_expression(Prec::Lowest)?)
        } else {
            None
        };

        if !mutable && value.is_none() {
            self.error_at(
                "E2011",
                format!("`const {}` has no initializer", names.join(", ")),
                pos,
            );
        }

        Some(Statement::Declaration {
            names,
            mutable,
            type_annot,
            value,
            doc: attrs.doc.map(|(text, _)| text),
            pos,
        })
    }

    fn parse_binding_name(&mut self) -> Option<String> {
        match self.cur_kind() {
            TokenKind::Blank => {
                self.advance();
                Some("_".to_string())
            }
            TokenKind::Ident => {
                let tok = self.advance();
                if is_reserved_name(&tok.literal) {
                    self.error_at(
                        "E2020",
                        format!("`{}` is reserved and cannot name a variable", tok.literal),
                        Position::new(tok.line, tok.column),
                    );
                }
                Some(tok.literal)
            }
            _ => {
                let tok = self.cur().clone();
                if is_reserved_name(&tok.literal) && tok.kind != TokenKind::Eof {
                    self.error_here(
                        "E2020",
                        format!("`{}` is reserved and cannot name a variable", tok.literal),
                    );
                    self.advance();
                    Some(tok.literal)
                } else {
                    self.expect(TokenKind::Ident);
                    None
                }
            }
        }
    }

    fn can_start_type(&self) -> bool {
        matches!(
            self.cur_kind(),
            TokenKind::Ident | TokenKind::Lbracket
        ) || (self.cur_kind() == TokenKind::Lbrace && self.looks_like_map_type())
    }

    /// `{ident: ident}` directly after a name reads as a map annotation.
    fn looks_like_map_type(&self) -> bool {
        self.peek().kind == TokenKind::Ident
            && self
                .tokens
                .get(self.pos + 2)
                .is_some_and(|t| t.kind == TokenKind::Colon)
    }

    fn parse_type(&mut self) -> Option<TypeAnnot> {
        match self.cur_kind() {
            TokenKind::Ident => {
                let tok = self.advance();
                Some(TypeAnnot::Named(tok.literal))
            }
            TokenKind::Lbracket => {
                self.advance();
                let elem = self.parse_type()?;
                let size = if self.eat(TokenKind::Comma) {
                    let size_tok = self.expect(TokenKind::Int)?;
                    parse_int_literal(&size_tok.literal).and_then(|n| {
                        use num_traits::ToPrimitive;
                        n.to_usize()
                    })
                } else {
                    None
                };
                self.expect(TokenKind::Rbracket)?;
                Some(TypeAnnot::Array {
                    elem: Box::new(elem),
                    size,
                })
            }
            TokenKind::Lbrace => {
                self.advance();
                let key = self.parse_type()?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_type()?;
                self.expect(TokenKind::Rbrace)?;
                Some(TypeAnnot::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            _ => {
                self.error_here(
                    "E2003",
                    format!("expected a type, found {}", self.cur_kind()),
                );
                None
            }
        }
    }

    fn parse_struct_body(
        &mut self,
        name: String,
        pos: Position,
        attrs: PendingAttrs,
    ) -> Option<Statement> {
        self.advance(); // struct
        self.parse_struct_fields(name, pos, attrs.doc.map(|(text, _)| text))
    }

    fn parse_enum_body(
        &mut self,
        name: String,
        pos: Position,
        attrs: PendingAttrs,
    ) -> Option<Statement> {
        self.advance(); // enum
        self.parse_enum_variants(name, pos, attrs.doc.map(|(text, _)| text))
    }

    /// `struct Name { ... }` / `enum Name { ... }` without `const`.
    fn parse_bare_type_decl(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let name = self.expect(TokenKind::Ident)?.literal;
        match kw.kind {
            TokenKind::Struct => self.parse_struct_fields(name, pos, None),
            _ => self.parse_enum_variants(name, pos, None),
        }
    }

    fn parse_struct_fields(
        &mut self,
        name: String,
        pos: Position,
        doc: Option<String>,
    ) -> Option<Statement> {
        if self.block_depth > 0 || self.fn_depth > 0 {
            self.error_at("E2053", "struct definitions must be at file scope", pos);
        }
        self.check_type_name(&name, pos, "E2033", "struct");

        self.expect(TokenKind::Lbrace)?;
        let mut fields: Vec<(String, TypeAnnot)> = Vec::new();
        while self.cur_kind() != TokenKind::Rbrace && self.cur_kind() != TokenKind::Eof {
            let field_tok = self.expect(TokenKind::Ident)?;
            let field_pos = Position::new(field_tok.line, field_tok.column);
            let ty = self.parse_type()?;
            if fields.iter().any(|(f, _)| *f == field_tok.literal) {
                self.error_at(
                    "E2013",
                    format!("duplicate struct field `{}`", field_tok.literal),
                    field_pos,
                );
            } else {
                fields.push((field_tok.literal, ty));
            }
            self.eat(TokenKind::Comma);
        }
        self.expect(TokenKind::Rbrace)?;

        Some(Statement::StructDecl {
            name,
            fields,
            doc,
            pos,
        })
    }

    fn parse_enum_variants(
        &mut self,
        name: String,
        pos: Position,
        doc: Option<String>,
    ) -> Option<Statement> {
        if self.block_depth > 0 || self.fn_depth > 0 {
            self.error_at("E2053", "enum definitions must be at file scope", pos);
        }
        self.check_type_name(&name, pos, "E2037", "enum");

        self.expect(TokenKind::Lbrace)?;
        let mut variants: Vec<(String, Option<Expression>)> = Vec::new();
        while self.cur_kind() != TokenKind::Rbrace && self.cur_kind() != TokenKind::Eof {
            let var_tok = self.expect(TokenKind::Ident)?;
            let var_pos = Position::new(var_tok.line, var_tok.column);
            let explicit = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression(Prec::Lowest)?)
            } else {
                None
            };
            if variants.iter().any(|(v, _)| *v == var_tok.literal) {
                self.error_at(
                    "E2014",
                    format!("duplicate enum variant `{}`", var_tok.literal),
                    var_pos,
                );
            } else {
                variants.push((var_tok.literal, explicit));
            }
            self.eat(TokenKind::Comma);
        }
        self.expect(TokenKind::Rbrace)?;

        self.enums.insert(
            name.clone(),
            variants.iter().map(|(v, _)| v.clone()).collect(),
        );

        Some(Statement::EnumDecl {
            name,
            variants,
            doc,
            pos,
        })
    }

    fn check_type_name(&mut self, name: &str, pos: Position, keyword_code: &str, what: &str) {
        if crate::token::TYPE_NAMES.contains(&name) {
            self.error_at(
                "E2038",
                format!("`{}` is a built-in type name and cannot name a {}", name, what),
                pos,
            );
        } else if is_reserved_name(name) {
            self.error_at(
                keyword_code,
                format!("`{}` is reserved and cannot name a {}", name, what),
                pos,
            );
        }
    }

    fn parse_function(&mut self, attrs: PendingAttrs) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);

        if self.fn_depth > 0 {
            self.error_at("E2019", "function declarations may not nest", pos);
        }

        let name_tok = match self.cur_kind() {
            TokenKind::Ident => self.advance(),
            kind if kind != TokenKind::Eof && is_reserved_name(&self.cur().literal) => {
                self.advance()
            }
            _ => {
                self.expect(TokenKind::Ident)?;
                return None;
            }
        };
        if is_reserved_name(&name_tok.literal) {
            self.error_at(
                "E2021",
                format!(
                    "`{}` is reserved and cannot name a function",
                    name_tok.literal
                ),
                Position::new(name_tok.line, name_tok.column),
            );
        }

        self.expect(TokenKind::Lparen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::Rparen)?;

        let mut return_types = Vec::new();
        if self.eat(TokenKind::Arrow) {
            if self.eat(TokenKind::Lparen) {
                loop {
                    return_types.push(self.parse_type()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::Rparen)?;
            } else {
                return_types.push(self.parse_type()?);
            }
        }

        self.fn_depth += 1;
        let body = self.parse_block();
        self.fn_depth -= 1;
        let body = body?;

        Some(Statement::Function(FunctionDecl {
            name: name_tok.literal,
            params,
            return_types,
            body,
            doc: attrs.doc.map(|(text, _)| text),
            suppress: attrs.suppress.is_some(),
            pos,
        }))
    }

    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        if self.cur_kind() == TokenKind::Rparen {
            return Some(params);
        }
        loop {
            let by_ref = self.eat(TokenKind::Amp);
            let name_tok = match self.cur_kind() {
                TokenKind::Ident => self.advance(),
                _ => {
                    let tok = self.cur().clone();
                    if is_reserved_name(&tok.literal) && tok.kind != TokenKind::Eof {
                        self.error_here(
                            "E2022",
                            format!("`{}` is reserved and cannot name a parameter", tok.literal),
                        );
                        self.advance();
                        tok
                    } else {
                        self.error_here("E2008", "expected a parameter declaration");
                        return None;
                    }
                }
            };
            let param_pos = Position::new(name_tok.line, name_tok.column);

            let type_annot = if self.can_start_type() {
                self.parse_type()
            } else {
                None
            };

            let default = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression(Prec::Lowest)?)
            } else {
                None
            };

            if by_ref && default.is_some() {
                self.error_at(
                    "E2040",
                    format!("`&{}` may not have a default value", name_tok.literal),
                    param_pos,
                );
            }
            if params.iter().any(|p| p.name == name_tok.literal) {
                self.error_at(
                    "E2012",
                    format!("duplicate parameter `{}`", name_tok.literal),
                    param_pos,
                );
            }

            params.push(Param {
                name: name_tok.literal,
                type_annot,
                by_ref,
                default,
                pos: param_pos,
            });

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        // Grouped types fill backwards: `a, b int` gives both `int`.
        let mut next_type: Option<TypeAnnot> = None;
        for param in params.iter_mut().rev() {
            match &param.type_annot {
                Some(t) => next_type = Some(t.clone()),
                None => param.type_annot = next_type.clone(),
            }
        }

        // A defaulted parameter may not precede a required one.
        let mut seen_default = false;
        for param in &params {
            if param.default.is_some() {
                seen_default = true;
            } else if seen_default && !param.by_ref {
                self.error_at(
                    "E2039",
                    format!(
                        "parameter `{}` without a default follows a defaulted parameter",
                        param.name
                    ),
                    param.pos,
                );
                break;
            }
        }

        Some(params)
    }

    fn parse_block(&mut self) -> Option<Block> {
        let open = self.expect(TokenKind::Lbrace)?;
        let pos = Position::new(open.line, open.column);
        self.block_depth += 1;
        let mut statements = Vec::new();
        while self.cur_kind() != TokenKind::Rbrace && self.cur_kind() != TokenKind::Eof {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            let before = self.pos;
            match self.parse_statement() {
                Some(stmt) => statements.push(stmt),
                None => self.synchronize(),
            }
            if self.pos == before {
                self.advance();
            }
        }
        self.block_depth -= 1;
        if self.cur_kind() != TokenKind::Rbrace {
            self.error_at("E2004", "block is never closed", pos);
            return None;
        }
        self.advance();
        Some(Block { statements, pos })
    }

    fn parse_return(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let mut values = Vec::new();
        if self.can_start_expression() {
            values.push(self.parse_expression(Prec::Lowest)?);
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_expression(Prec::Lowest)?);
            }
        }
        Some(Statement::Return { values, pos })
    }

    fn parse_if(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let mut branches = Vec::new();

        let cond = self.parse_expression(Prec::Lowest)?;
        let block = self.parse_block()?;
        branches.push((cond, block));

        let mut otherwise = None;
        loop {
            match self.cur_kind() {
                TokenKind::Or => {
                    self.advance();
                    let cond = self.parse_expression(Prec::Lowest)?;
                    let block = self.parse_block()?;
                    branches.push((cond, block));
                }
                TokenKind::Otherwise => {
                    self.advance();
                    otherwise = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }

        Some(Statement::If {
            branches,
            otherwise,
            pos,
        })
    }

    fn parse_as_long_as(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let condition = self.parse_expression(Prec::Lowest)?;
        let body = self.parse_block()?;
        Some(Statement::AsLongAs {
            condition,
            body,
            pos,
        })
    }

    fn parse_loop(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let body = self.parse_block()?;
        Some(Statement::Loop { body, pos })
    }

    fn parse_for(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let var = self.parse_binding_name()?;
        self.expect(TokenKind::In)?;
        let range = self.parse_expression(Prec::Lowest)?;
        let (start, end, step) = match range {
            Expression::Range { start, end, step, .. } => (*start, *end, step.map(|s| *s)),
            other => {
                self.error_at(
                    "E2005",
                    "`for` iterates a `range(...)` expression",
                    other.pos(),
                );
                return None;
            }
        };
        let body = self.parse_block()?;
        Some(Statement::For {
            var,
            start,
            end,
            step,
            body,
            pos,
        })
    }

    fn parse_for_each(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let var = self.parse_binding_name()?;
        self.expect(TokenKind::In)?;
        let collection = self.parse_expression(Prec::Lowest)?;
        let body = self.parse_block()?;
        Some(Statement::ForEach {
            var,
            collection,
            body,
            pos,
        })
    }

    fn parse_import(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        if self.seen_using {
            self.error_at("E2009", "`using` must follow all `import` statements", pos);
        }
        let path_tok = self.expect(TokenKind::Str)?;
        let path = unescape_plain(&path_tok.literal);
        let alias = if self.cur_kind() == TokenKind::Ident && self.cur().literal == "as" {
            self.advance();
            Some(self.expect(TokenKind::Ident)?.literal)
        } else {
            None
        };
        let bound = alias.clone().unwrap_or_else(|| module_stem(&path));
        self.imported.insert(bound);
        Some(Statement::Import { path, alias, pos })
    }

    fn parse_using(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        self.seen_using = true;
        let name_tok = self.expect(TokenKind::Ident)?;
        let name = name_tok.literal;
        if !self.imported.contains(&name) && !crate::registry::module_exists(&name) {
            self.error_at(
                "E2010",
                format!("`using {}` does not name an imported module", name),
                Position::new(name_tok.line, name_tok.column),
            );
        }
        Some(Statement::Using { name, pos })
    }

    fn parse_module_decl(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let name = self.expect(TokenKind::Ident)?.literal;
        Some(Statement::ModuleDecl { name, pos })
    }

    fn parse_ensure(&mut self) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let expr = self.parse_expression(Prec::Lowest)?;
        if !matches!(expr, Expression::Call { .. }) {
            self.error_at("E3039", "`ensure` applies only to a call", expr.pos());
            return None;
        }
        Some(Statement::Ensure { call: expr, pos })
    }

    fn parse_when(&mut self, strict: bool) -> Option<Statement> {
        let kw = self.advance();
        let pos = Position::new(kw.line, kw.column);
        let subject = self.parse_expression(Prec::Lowest)?;
        self.check_when_subject(&subject);

        self.expect(TokenKind::Lbrace)?;
        let mut arms: Vec<WhenArm> = Vec::new();
        let mut default: Option<Block> = None;
        let mut seen_keys: HashSet<String> = HashSet::new();

        while self.cur_kind() != TokenKind::Rbrace && self.cur_kind() != TokenKind::Eof {
            match self.cur_kind() {
                TokenKind::Is => {
                    let arm_tok = self.advance();
                    let arm_pos = Position::new(arm_tok.line, arm_tok.column);
                    let mut values = vec![self.parse_expression(Prec::Lowest)?];
                    while self.eat(TokenKind::Comma) {
                        values.push(self.parse_expression(Prec::Lowest)?);
                    }
                    for value in &values {
                        if let Some(key) = when_value_key(value) {
                            if !seen_keys.insert(key) {
                                self.error_at(
                                    "E2043",
                                    "`is` value appears in more than one arm",
                                    value.pos(),
                                );
                            }
                        }
                    }
                    let body = self.parse_block()?;
                    arms.push(WhenArm {
                        values,
                        body,
                        pos: arm_pos,
                    });
                }
                TokenKind::Default => {
                    let def_tok = self.advance();
                    if strict {
                        self.error_at(
                            "E2042",
                            "`#strict` `when` may not have a `default` arm",
                            Position::new(def_tok.line, def_tok.column),
                        );
                    }
                    default = Some(self.parse_block()?);
                }
                _ => {
                    self.error_here("E2001", "expected `is` or `default` in `when`");
                    self.synchronize();
                    break;
                }
            }
        }
        self.expect(TokenKind::Rbrace)?;

        if strict {
            self.check_strict_exhaustive(&arms, pos);
        } else if default.is_none() {
            self.error_at("E2041", "`when` requires a `default` arm", pos);
        }

        Some(Statement::When {
            subject,
            arms,
            default,
            strict,
            pos,
        })
    }

    fn check_when_subject(&mut self, subject: &Expression) {
        match subject {
            Expression::Float { pos, .. } => {
                self.error_at("E2044", "`when` condition may not be a float", *pos)
            }
            Expression::Bool { pos, .. } => {
                self.error_at("E2048", "`when` condition may not be a boolean", *pos)
            }
            Expression::Nil { pos } => {
                self.error_at("E2049", "`when` condition may not be nil", *pos)
            }
            Expression::Array { pos, .. } | Expression::MapLit { pos, .. } => {
                self.error_at("E2050", "`when` condition may not be a collection", *pos)
            }
            Expression::Ident { name, pos } if crate::token::TYPE_NAMES.contains(&name.as_str()) => {
                self.error_at("E2047", "`when` condition may not be a type", *pos)
            }
            _ => {}
        }
    }

    fn check_strict_exhaustive(&mut self, arms: &[WhenArm], pos: Position) {
        // Every arm value must be `Enum.Variant` of one declared enum.
        let mut enum_name: Option<String> = None;
        let mut covered: HashSet<String> = HashSet::new();
        for arm in arms {
            for value in &arm.values {
                match value {
                    Expression::Member { object, member, .. } => {
                        if let Expression::Ident { name, .. } = object.as_ref() {
                            match &enum_name {
                                Some(existing) if existing != name => {
                                    self.error_at(
                                        "E2045",
                                        "`#strict` applies only to enum conditions",
                                        value.pos(),
                                    );
                                    return;
                                }
                                _ => enum_name = Some(name.clone()),
                            }
                            covered.insert(member.clone());
                        } else {
                            self.error_at(
                                "E2045",
                                "`#strict` applies only to enum conditions",
                                value.pos(),
                            );
                            return;
                        }
                    }
                    _ => {
                        self.error_at(
                            "E2045",
                            "`#strict` applies only to enum conditions",
                            value.pos(),
                        );
                        return;
                    }
                }
            }
        }

        let Some(enum_name) = enum_name else {
            self.error_at("E2045", "`#strict` applies only to enum conditions", pos);
            return;
        };
        let Some(variants) = self.enums.get(&enum_name).cloned() else {
            self.error_at(
                "E2045",
                format!("`{}` is not a declared enum", enum_name),
                pos,
            );
            return;
        };
        let missing: Vec<String> = variants
            .iter()
            .filter(|v| !covered.contains(*v))
            .cloned()
            .collect();
        if !missing.is_empty() {
            self.error_at(
                "E2046",
                format!(
                    "`#strict` `when` over `{}` is missing: {}",
                    enum_name,
                    missing.join(", ")
                ),
                pos,
            );
        }
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let pos = self.cur_pos();
        let expr = self.parse_expression(Prec::Lowest)?;

        let assign_op = match self.cur_kind() {
            TokenKind::Assign => Some(AssignOp::Assign),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            TokenKind::PercentAssign => Some(AssignOp::Mod),
            _ => None,
        };

        if let Some(op) = assign_op {
            self.advance();
            if !matches!(
                expr,
                Expression::Ident { .. } | Expression::Index { .. } | Expression::Member { .. }
            ) {
                self.error_at("E2007", "left side of assignment is not assignable", pos);
            }
            let value = self.parse_expression(Prec::Lowest)?;
            return Some(Statement::Assignment {
                target: expr,
                op,
                value,
                pos,
            });
        }

        Some(Statement::Expression { expr, pos })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn can_start_expression(&self) -> bool {
        matches!(
            self.cur_kind(),
            TokenKind::Int
                | TokenKind::Float
                | TokenKind::Str
                | TokenKind::Char
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Nil
                | TokenKind::Ident
                | TokenKind::Minus
                | TokenKind::Bang
                | TokenKind::Lparen
                | TokenKind::Lbrace
                | TokenKind::Range
                | TokenKind::New
        )
    }

    fn parse_expression(&mut self, min_prec: Prec) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        loop {
            let kind = self.cur_kind();
            let prec = precedence_of(kind);
            if prec == Prec::Lowest || prec <= min_prec {
                break;
            }
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        let tok = self.cur().clone();
        let pos = Position::new(tok.line, tok.column);
        match tok.kind {
            TokenKind::Int => {
                self.advance();
                match parse_int_literal(&tok.literal) {
                    Some(value) => Some(Expression::Int { value, pos }),
                    None => {
                        // The lexer already reported the malformed literal
                        Some(Expression::Int {
                            value: BigInt::from(0),
                            pos,
                        })
                    }
                }
            }
            TokenKind::Float => {
                self.advance();
                let cleaned: String = tok.literal.chars().filter(|c| *c != '_').collect();
                let value = cleaned.parse::<f64>().unwrap_or(0.0);
                Some(Expression::Float { value, pos })
            }
            TokenKind::Str => {
                self.advance();
                self.parse_string_literal(&tok)
            }
            TokenKind::Char => {
                self.advance();
                Some(Expression::Char {
                    value: parse_char_literal(&tok.literal),
                    pos,
                })
            }
            TokenKind::True => {
                self.advance();
                Some(Expression::Bool { value: true, pos })
            }
            TokenKind::False => {
                self.advance();
                Some(Expression::Bool { value: false, pos })
            }
            TokenKind::Nil => {
                self.advance();
                Some(Expression::Nil { pos })
            }
            TokenKind::Ident => {
                self.advance();
                Some(Expression::Ident {
                    name: tok.literal,
                    pos,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expression(Prec::Prefix)?;
                Some(Expression::Prefix {
                    op: PrefixOp::Neg,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expression(Prec::Prefix)?;
                Some(Expression::Prefix {
                    op: PrefixOp::Not,
                    operand: Box::new(operand),
                    pos,
                })
            }
            TokenKind::Lparen => {
                self.advance();
                let inner = self.parse_expression(Prec::Lowest)?;
                self.expect(TokenKind::Rparen)?;
                Some(inner)
            }
            TokenKind::Lbrace => self.parse_collection_literal(),
            TokenKind::Range => {
                self.advance();
                self.expect(TokenKind::Lparen)?;
                let start = self.parse_expression(Prec::Lowest)?;
                self.expect(TokenKind::Comma)?;
                let end = self.parse_expression(Prec::Lowest)?;
                let step = if self.eat(TokenKind::Comma) {
                    Some(Box::new(self.parse_expression(Prec::Lowest)?))
                } else {
                    None
                };
                self.expect(TokenKind::Rparen)?;
                Some(Expression::Range {
                    start: Box::new(start),
                    end: Box::new(end),
                    step,
                    pos,
                })
            }
            TokenKind::New => {
                self.advance();
                self.expect(TokenKind::Lparen)?;
                let type_name = self.expect(TokenKind::Ident)?.literal;
                self.expect(TokenKind::Rparen)?;
                Some(Expression::New { type_name, pos })
            }
            other => {
                self.error_here(
                    "E2005",
                    format!("expected an expression, found {}", other),
                );
                None
            }
        }
    }

    fn parse_collection_literal(&mut self) -> Option<Expression> {
        let open = self.advance();
        let pos = Position::new(open.line, open.column);

        if self.eat(TokenKind::Rbrace) {
            return Some(Expression::Array {
                elements: Vec::new(),
                pos,
            });
        }

        let first = self.parse_expression(Prec::Lowest)?;

        if self.eat(TokenKind::Colon) {
            // Map literal
            let mut pairs = Vec::new();
            let value = self.parse_expression(Prec::Lowest)?;
            pairs.push((first, value));
            while self.eat(TokenKind::Comma) {
                if self.cur_kind() == TokenKind::Rbrace {
                    break;
                }
                let key = self.parse_expression(Prec::Lowest)?;
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expression(Prec::Lowest)?;
                pairs.push((key, value));
            }
            self.expect(TokenKind::Rbrace)?;
            return Some(Expression::MapLit { pairs, pos });
        }

        let mut elements = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.cur_kind() == TokenKind::Rbrace {
                break;
            }
            elements.push(self.parse_expression(Prec::Lowest)?);
        }
        self.expect(TokenKind::Rbrace)?;
        Some(Expression::Array { elements, pos })
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        let tok = self.advance();
        let pos = Position::new(tok.line, tok.column);
        let op = match tok.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Sub,
            TokenKind::Star => InfixOp::Mul,
            TokenKind::Slash => InfixOp::Div,
            TokenKind::Percent => InfixOp::Mod,
            TokenKind::Eq => InfixOp::Eq,
            TokenKind::NotEq => InfixOp::NotEq,
            TokenKind::Lt => InfixOp::Lt,
            TokenKind::LtEq => InfixOp::LtEq,
            TokenKind::Gt => InfixOp::Gt,
            TokenKind::GtEq => InfixOp::GtEq,
            TokenKind::AndAnd => InfixOp::And,
            TokenKind::OrOr => InfixOp::Or,
            TokenKind::In => InfixOp::In,
            TokenKind::NotIn | TokenKind::BangIn => InfixOp::NotIn,
            TokenKind::PlusPlus => {
                return Some(Expression::Postfix {
                    op: PostfixOp::Inc,
                    operand: Box::new(left),
                    pos,
                });
            }
            TokenKind::MinusMinus => {
                return Some(Expression::Postfix {
                    op: PostfixOp::Dec,
                    operand: Box::new(left),
                    pos,
                });
            }
            TokenKind::Lparen => {
                let mut args = Vec::new();
                if self.cur_kind() != TokenKind::Rparen {
                    loop {
                        args.push(self.parse_expression(Prec::Lowest)?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::Rparen)?;
                return Some(Expression::Call {
                    callee: Box::new(left),
                    args,
                    pos,
                });
            }
            TokenKind::Lbracket => {
                let index = self.parse_expression(Prec::Lowest)?;
                self.expect(TokenKind::Rbracket)?;
                return Some(Expression::Index {
                    object: Box::new(left),
                    index: Box::new(index),
                    pos,
                });
            }
            TokenKind::Dot => {
                let member = self.expect(TokenKind::Ident)?.literal;
                return Some(Expression::Member {
                    object: Box::new(left),
                    member,
                    pos,
                });
            }
            other => {
                self.error_here("E2001", format!("unexpected {}", other));
                return None;
            }
        };

        let prec = precedence_of(tok.kind);
        let right = self.parse_expression(prec)?;
        Some(Expression::Infix {
            op,
            left: Box::new(left),
            right: Box::new(right),
            pos,
        })
    }

    /// Process a raw string token: decode escapes, split `${ ... }` holes,
    /// and sub-parse each hole.
    fn parse_string_literal(&mut self, tok: &Token) -> Option<Expression> {
        let pos = Position::new(tok.line, tok.column);
        let raw = strip_quotes(&tok.literal);

        let mut parts: Vec<InterpPart> = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    if let Some(e) = chars.next() {
                        current.push(decode_escape(e));
                    }
                }
                '$' if chars.peek() == Some(&'{') => {
                    chars.next();
                    let mut depth = 1usize;
                    let mut hole = String::new();
                    for hc in chars.by_ref() {
                        match hc {
                            '{' => {
                                depth += 1;
                                hole.push(hc);
                            }
                            '}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                                hole.push(hc);
                            }
                            _ => hole.push(hc),
                        }
                    }
                    if !current.is_empty() {
                        parts.push(InterpPart::Literal(std::mem::take(&mut current)));
                    }
                    let mut sub = Parser::new(&hole);
                    match sub.parse_expression(Prec::Lowest) {
                        Some(expr) => parts.push(InterpPart::Expr(expr)),
                        None => {
                            self.error_at(
                                "E2005",
                                "interpolation hole does not contain an expression",
                                pos,
                            );
                        }
                    }
                    for mut err in sub.take_errors() {
                        // Hole positions are relative: anchor at the string
                        err.line = pos.line;
                        err.column = pos.column;
                        self.errors.push(err);
                    }
                }
                _ => current.push(c),
            }
        }

        if parts.is_empty() {
            return Some(Expression::Str {
                value: current,
                pos,
            });
        }
        if !current.is_empty() {
            parts.push(InterpPart::Literal(current));
        }
        Some(Expression::Interp { parts, pos })
    }
}

// ----------------------------------------------------------------------
// Literal helpers
// ----------------------------------------------------------------------

fn strip_quotes(raw: &str) -> &str {
    let raw = raw.strip_prefix('"').unwrap_or(raw);
    raw.strip_suffix('"').unwrap_or(raw)
}

/// Escape-decode a raw string token, ignoring interpolation (used for paths
/// and `#doc` arguments where holes are not meaningful).
fn unescape_plain(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = strip_quotes(raw).chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(e) = chars.next() {
                out.push(decode_escape(e));
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn parse_int_literal(raw: &str) -> Option<BigInt> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x") {
        BigInt::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b") {
        BigInt::from_str_radix(bin, 2).ok()
    } else {
        cleaned.parse().ok()
    }
}

fn parse_char_literal(raw: &str) -> char {
    let inner = raw
        .strip_prefix('\'')
        .unwrap_or(raw)
        .strip_suffix('\'')
        .unwrap_or(raw);
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => chars.next().map(decode_escape).unwrap_or('\0'),
        Some(c) => c,
        None => '\0',
    }
}

/// Canonical key for duplicate-arm detection. Only literal-ish values get a
/// key; computed values cannot be compared at parse time.
fn when_value_key(value: &Expression) -> Option<String> {
    match value {
        Expression::Int { value, .. } => Some(format!("i:{}", value)),
        Expression::Str { value, .. } => Some(format!("s:{}", value)),
        Expression::Char { value, .. } => Some(format!("c:{}", value)),
        Expression::Bool { value, .. } => Some(format!("b:{}", value)),
        Expression::Member { object, member, .. } => match object.as_ref() {
            Expression::Ident { name, .. } => Some(format!("m:{}.{}", name, member)),
            _ => None,
        },
        _ => None,
    }
}

fn module_stem(path: &str) -> String {
    let file = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file.strip_suffix(".ez").unwrap_or(file).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        let program = parser.parse_program();
        assert!(
            parser.errors().is_empty(),
            "unexpected errors: {:?}",
            parser.errors()
        );
        program
    }

    fn parse_codes(src: &str) -> Vec<String> {
        let mut parser = Parser::new(src);
        parser.parse_program();
        parser.errors().iter().map(|e| e.code.clone()).collect()
    }

    #[test]
    fn test_declaration_with_type_and_value() {
        let program = parse_ok("temp x int = 5 * 2 + 10");
        assert_eq!(program.statements.len(), 1);
        let Statement::Declaration {
            names,
            mutable,
            type_annot,
            value,
            ..
        } = &program.statements[0]
        else {
            panic!("expected declaration");
        };
        assert_eq!(names, &vec!["x".to_string()]);
        assert!(*mutable);
        assert_eq!(type_annot, &Some(TypeAnnot::Named("int".into())));
        // 5 * 2 + 10 parses as (5 * 2) + 10
        let Some(Expression::Infix { op, left, .. }) = value else {
            panic!("expected infix");
        };
        assert_eq!(*op, InfixOp::Add);
        assert!(matches!(left.as_ref(), Expression::Infix { op: InfixOp::Mul, .. }));
    }

    #[test]
    fn test_precedence_comparison_binds_looser_than_additive() {
        let program = parse_ok("a + 1 < b * 2");
        let Statement::Expression { expr, .. } = &program.statements[0] else {
            panic!();
        };
        let Expression::Infix { op, .. } = expr else {
            panic!();
        };
        assert_eq!(*op, InfixOp::Lt);
    }

    #[test]
    fn test_function_with_grouped_params_and_arrow() {
        let program = parse_ok("do swap(&a, &b int) -> int { return a }");
        let Statement::Function(decl) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(decl.params.len(), 2);
        assert!(decl.params[0].by_ref && decl.params[1].by_ref);
        // Grouped type fills backwards
        assert_eq!(
            decl.params[0].type_annot,
            Some(TypeAnnot::Named("int".into()))
        );
        assert_eq!(decl.return_types.len(), 1);
    }

    #[test]
    fn test_multi_return_types() {
        let program = parse_ok("do pair() -> (int, string) { return 1, \"a\" }");
        let Statement::Function(decl) = &program.statements[0] else {
            panic!();
        };
        assert_eq!(decl.return_types.len(), 2);
        let Statement::Return { values, .. } = &decl.body.statements[0] else {
            panic!();
        };
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_if_or_otherwise_chain() {
        let program = parse_ok("if a { } or b { } or c { } otherwise { }");
        let Statement::If {
            branches,
            otherwise,
            ..
        } = &program.statements[0]
        else {
            panic!();
        };
        assert_eq!(branches.len(), 3);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_array_and_map_literals() {
        let program = parse_ok("temp a [int] = {1, 2, 3}\ntemp m = {\"k\": 1, \"j\": 2}");
        let Statement::Declaration { value, .. } = &program.statements[0] else {
            panic!();
        };
        assert!(matches!(value, Some(Expression::Array { elements, .. }) if elements.len() == 3));
        let Statement::Declaration { value, .. } = &program.statements[1] else {
            panic!();
        };
        assert!(matches!(value, Some(Expression::MapLit { pairs, .. }) if pairs.len() == 2));
    }

    #[test]
    fn test_sized_array_annotation() {
        let program = parse_ok("temp a [int, 3] = {1, 2, 3}");
        let Statement::Declaration { type_annot, .. } = &program.statements[0] else {
            panic!();
        };
        assert_eq!(
            type_annot,
            &Some(TypeAnnot::Array {
                elem: Box::new(TypeAnnot::Named("int".into())),
                size: Some(3),
            })
        );
    }

    #[test]
    fn test_interpolated_string() {
        let program = parse_ok(r#"temp s = "x = ${x + 1}!""#);
        let Statement::Declaration { value, .. } = &program.statements[0] else {
            panic!();
        };
        let Some(Expression::Interp { parts, .. }) = value else {
            panic!("expected interpolation");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(&parts[0], InterpPart::Literal(s) if s == "x = "));
        assert!(matches!(&parts[1], InterpPart::Expr(_)));
        assert!(matches!(&parts[2], InterpPart::Literal(s) if s == "!"));
    }

    #[test]
    fn test_const_requires_initializer() {
        assert!(parse_codes("const x int").contains(&"E2011".to_string()));
    }

    #[test]
    fn test_nested_function_rejected() {
        let codes = parse_codes("do outer() { do inner() { } }");
        assert!(codes.contains(&"E2019".to_string()));
    }

    #[test]
    fn test_duplicate_parameter_and_field() {
        assert!(parse_codes("do f(a int, a int) { }").contains(&"E2012".to_string()));
        assert!(
            parse_codes("const P struct { x int x int }").contains(&"E2013".to_string())
        );
    }

    #[test]
    fn test_reserved_names_rejected() {
        assert!(parse_codes("temp in int = 1").contains(&"E2020".to_string()));
        assert!(parse_codes("do range() { }").contains(&"E2021".to_string()));
        assert!(parse_codes("do f(new int) { }").contains(&"E2022".to_string()));
        assert!(parse_codes("const loop struct { x int }").contains(&"E2033".to_string()));
        assert!(parse_codes("const when enum { A }").contains(&"E2037".to_string()));
        assert!(parse_codes("const int struct { x int }").contains(&"E2038".to_string()));
    }

    #[test]
    fn test_default_parameter_rules() {
        assert!(parse_codes("do f(a int = 1, b int) { }").contains(&"E2039".to_string()));
        assert!(parse_codes("do f(&a int = 1) { }").contains(&"E2040".to_string()));
        assert!(parse_codes("do f(a int = 1, b int = 2) { }").is_empty());
    }

    #[test]
    fn test_using_rules() {
        assert!(parse_codes("using nowhere").contains(&"E2010".to_string()));
        assert!(parse_codes("using strings").is_empty());
        assert!(
            parse_codes("using strings\nimport \"./m.ez\"").contains(&"E2009".to_string())
        );
        assert!(parse_codes("import \"./m.ez\"\nusing m").is_empty());
    }

    #[test]
    fn test_when_requires_default() {
        let src = "temp x int = 1 when x { is 1 { } }";
        assert!(parse_codes(src).contains(&"E2041".to_string()));
        let ok = "temp x int = 1 when x { is 1 { } default { } }";
        assert!(parse_codes(ok).is_empty());
    }

    #[test]
    fn test_when_duplicate_values() {
        let src = "temp x int = 1 when x { is 1, 1 { } default { } }";
        assert!(parse_codes(src).contains(&"E2043".to_string()));
    }

    #[test]
    fn test_when_bad_subjects() {
        assert!(parse_codes("when 1.5 { is 1 { } default { } }")
            .contains(&"E2044".to_string()));
        assert!(parse_codes("when true { is 1 { } default { } }")
            .contains(&"E2048".to_string()));
        assert!(parse_codes("when nil { is 1 { } default { } }")
            .contains(&"E2049".to_string()));
        assert!(parse_codes("when {1, 2} { is 1 { } default { } }")
            .contains(&"E2050".to_string()));
        assert!(parse_codes("when int { is 1 { } default { } }")
            .contains(&"E2047".to_string()));
    }

    #[test]
    fn test_strict_when_rules() {
        let decl = "const Color enum { Red, Green, Blue }\ntemp c = Color.Red\n";
        let exhaustive = format!(
            "{}#strict when c {{ is Color.Red {{ }} is Color.Green {{ }} is Color.Blue {{ }} }}",
            decl
        );
        assert!(parse_codes(&exhaustive).is_empty());

        let missing = format!("{}#strict when c {{ is Color.Red {{ }} }}", decl);
        assert!(parse_codes(&missing).contains(&"E2046".to_string()));

        let with_default = format!(
            "{}#strict when c {{ is Color.Red {{ }} is Color.Green {{ }} is Color.Blue {{ }} default {{ }} }}",
            decl
        );
        assert!(parse_codes(&with_default).contains(&"E2042".to_string()));

        let non_enum = "temp x int = 1\n#strict when x { is 1 { } }";
        assert!(parse_codes(non_enum).contains(&"E2045".to_string()));
    }

    #[test]
    fn test_type_defs_only_at_file_scope() {
        let codes = parse_codes("do f() { const P struct { x int } }");
        assert!(codes.contains(&"E2053".to_string()));
    }

    #[test]
    fn test_module_file_rejects_executable_statements() {
        let mut parser = Parser::with_mode("temp x int = 1\nprintln(x)", ParseMode::ModuleFile);
        parser.parse_program();
        let codes: Vec<_> = parser.errors().iter().map(|e| e.code.clone()).collect();
        assert!(codes.contains(&"E2056".to_string()));
    }

    #[test]
    fn test_doc_attribute_rules() {
        assert!(parse_codes("#doc \"adds\"\ndo f() { }").is_empty());
        assert!(parse_codes("#doc \"x\"\n#doc \"y\"\ndo f() { }")
            .contains(&"E2060".to_string()));
        assert!(parse_codes("#doc \"x\"\nprintln(1)").contains(&"E2059".to_string()));
        assert!(parse_codes("#strict temp x = 1").contains(&"E2055".to_string()));
    }

    #[test]
    fn test_ensure_requires_call() {
        assert!(parse_codes("do f() { ensure g() }").is_empty());
        assert!(parse_codes("do f() { ensure 42 }").contains(&"E3039".to_string()));
    }

    #[test]
    fn test_for_requires_range() {
        assert!(parse_codes("for i in range(0, 10) { }").is_empty());
        assert!(parse_codes("for i in range(0, 10, 2) { }").is_empty());
        assert!(!parse_codes("for i in xs { }").is_empty());
        assert!(parse_codes("for_each v in xs { }").is_empty());
    }

    #[test]
    fn test_postfix_and_compound_assignment() {
        let program = parse_ok("x++\ny += 2");
        assert!(matches!(
            &program.statements[0],
            Statement::Expression {
                expr: Expression::Postfix { op: PostfixOp::Inc, .. },
                ..
            }
        ));
        assert!(matches!(
            &program.statements[1],
            Statement::Assignment { op: AssignOp::Add, .. }
        ));
    }

    #[test]
    fn test_member_and_index_targets() {
        let program = parse_ok("p.x = 1\na[0] = 2");
        assert!(matches!(
            &program.statements[0],
            Statement::Assignment { target: Expression::Member { .. }, .. }
        ));
        assert!(matches!(
            &program.statements[1],
            Statement::Assignment { target: Expression::Index { .. }, .. }
        ));
        assert!(parse_codes("1 + 2 = 3").contains(&"E2007".to_string()));
    }

    #[test]
    fn test_recovery_reports_multiple_errors() {
        let codes = parse_codes("const a\nconst b\n");
        assert!(codes.iter().filter(|c| *c == "E2011").count() >= 2);
    }

    #[test]
    fn test_int_literal_parsing() {
        assert_eq!(parse_int_literal("1_000"), Some(BigInt::from(1000)));
        assert_eq!(parse_int_literal("0xFF"), Some(BigInt::from(255)));
        assert_eq!(parse_int_literal("0b1010"), Some(BigInt::from(10)));
    }
}
