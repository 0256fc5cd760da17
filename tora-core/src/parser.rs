//! Recursive-descent parser producing a [`Program`].
//!
//! Statements are dispatched on their leading keyword. Expressions use one
//! function per precedence level (relational, additive, multiplicative,
//! primary); each level folds its operands left to right in a loop so that
//! chains like `a - b - c` group as `(a - b) - c`.

use tracing::debug;

use crate::ast::{BinaryOp, Expr, FnDecl, Ident, LetDecl, Number, Param, Position, Program, Stmt};
use crate::error::Diagnostic;
use crate::lexer::{Token, TokenKind, lex};

/// Lex and parse a source string.
pub fn parse(source: &str) -> Result<Program, Diagnostic> {
    let tokens = lex(source)?;
    Parser::new(tokens).parse_program()
}

pub struct Parser<'src> {
    tokens: Vec<Token<'src>>,
    position: usize,
}

impl<'src> Parser<'src> {
    /// Create a parser over a token sequence.
    ///
    /// A missing trailing `Eof` token is supplied, so any token vector is
    /// accepted.
    pub fn new(mut tokens: Vec<Token<'src>>) -> Self {
        if tokens.last().is_none_or(|token| token.kind != TokenKind::Eof) {
            let line = tokens.last().map_or(1, |token| token.line);
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: "",
                line,
                column: 0,
            });
        }
        Parser {
            tokens,
            position: 0,
        }
    }

    pub fn parse_program(mut self) -> Result<Program, Diagnostic> {
        let mut statements = Vec::new();
        while !self.at(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    fn current(&self) -> Token<'src> {
        // `new` guarantees a trailing Eof and `advance` never moves past it.
        self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> Token<'src> {
        self.tokens[(self.position + 1).min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'src>, Diagnostic> {
        let token = self.current();
        if token.kind == kind {
            return Ok(self.advance());
        }
        Err(Diagnostic::syntax(
            format!("Expected {kind}, got {}", token.kind),
            token.line,
            token.column,
        ))
    }

    fn expect_ident(&mut self) -> Result<Ident, Diagnostic> {
        let token = self.expect(TokenKind::Identifier)?;
        Ok(ident_of(token))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        match self.current().kind {
            TokenKind::Let => self.parse_let(),
            TokenKind::Fn => self.parse_fn(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Print | TokenKind::Println => self.parse_print(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Identifier if self.peek().kind == TokenKind::Assign => self.parse_assign(),
            _ => {
                let expr = self.parse_expression()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    /// `let name [: type] = expr ;`
    fn parse_let(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::Let)?;
        let name = self.expect_ident()?;
        let ty = self.parse_type_annotation()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Let(LetDecl {
            name,
            ty,
            value: Some(value),
        }))
    }

    /// `fn name(param, ...) [: type] { stmt* }`
    fn parse_fn(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::Fn)?;
        let name = self.expect_ident()?;

        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            params.push(self.parse_param()?);
            while self.at(TokenKind::Comma) {
                self.advance();
                params.push(self.parse_param()?);
            }
        }
        self.expect(TokenKind::RParen)?;

        let return_type = self.parse_type_annotation()?;
        let body = self.parse_block()?;
        Ok(Stmt::Fn(FnDecl {
            name,
            params,
            return_type,
            body,
        }))
    }

    fn parse_param(&mut self) -> Result<Param, Diagnostic> {
        let name = self.expect_ident()?;
        let ty = self.parse_type_annotation()?;
        Ok(Param { name, ty })
    }

    /// Optional `: type` where the type is a single identifier.
    fn parse_type_annotation(&mut self) -> Result<Option<String>, Diagnostic> {
        if !self.at(TokenKind::Colon) {
            return Ok(None);
        }
        self.advance();
        let token = self.current();
        if token.kind != TokenKind::Identifier {
            return Err(Diagnostic::syntax(
                format!("Expected type, got {}", token.kind),
                token.line,
                token.column,
            ));
        }
        self.advance();
        Ok(Some(token.text.to_string()))
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> Result<Vec<Stmt>, Diagnostic> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    /// `if (cond) { ... } [else { ... }]`
    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.at(TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// `while cond { ... }` or `while (cond) { ... }`
    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::While)?;
        let condition = if self.at(TokenKind::LParen) {
            self.advance();
            let condition = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            condition
        } else {
            self.parse_expression()?
        };
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    /// `for name in expr { ... }`
    ///
    /// `in` is an ordinary identifier, not a keyword, and may be omitted.
    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::For)?;
        let variable = self.expect_ident()?;
        let token = self.current();
        if token.kind == TokenKind::Identifier && token.text == "in" {
            self.advance();
        }
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            variable,
            iterable,
            body,
        })
    }

    /// `print(expr);` or `println(expr);`
    fn parse_print(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let newline = keyword.kind == TokenKind::Println;
        self.expect(TokenKind::LParen)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Print { value, newline })
    }

    /// `return expr;`, lowered to an expression statement.
    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        self.expect(TokenKind::Return)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Expr(value))
    }

    /// `name = expr;`
    fn parse_assign(&mut self) -> Result<Stmt, Diagnostic> {
        let target = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Assign { target, value })
    }

    pub fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_additive()?;
        while let Some(op) = relational_op(self.current().kind) {
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Plus | TokenKind::Minus => {
                    self.advance();
                    let op = if token.kind == TokenKind::Plus {
                        BinaryOp::Add
                    } else {
                        BinaryOp::Sub
                    };
                    let right = self.parse_multiplicative()?;
                    left = Expr::binary(op, left, right);
                }
                // `a -1`: the lexer folded the minus into the literal.
                TokenKind::Number if token.text.starts_with('-') => {
                    self.advance();
                    let magnitude = Token {
                        text: &token.text[1..],
                        column: token.column + 1,
                        ..token
                    };
                    let mut right = Expr::Number(number_of(magnitude)?);
                    while let Some(op) = multiplicative_op(self.current().kind) {
                        self.advance();
                        let operand = self.parse_primary()?;
                        right = Expr::binary(op, right, operand);
                    }
                    left = Expr::binary(BinaryOp::Sub, left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_primary()?;
        while let Some(op) = multiplicative_op(self.current().kind) {
            self.advance();
            let right = self.parse_primary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.current();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Expr::Number(number_of(token)?))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::Str(unescape(&token.text[1..token.text.len() - 1])))
            }
            TokenKind::Identifier if self.peek().kind == TokenKind::LParen => self.parse_call(),
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Ident(ident_of(token)))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_comma_list(TokenKind::RBracket)?;
                Ok(Expr::List(elements))
            }
            TokenKind::Eof => Err(Diagnostic::syntax(
                "Unexpected end of input",
                token.line,
                token.column,
            )),
            other => Err(Diagnostic::syntax(
                format!("Unexpected token {other}"),
                token.line,
                token.column,
            )),
        }
    }

    /// `name(arg, ...)`
    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let callee = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let args = self.parse_comma_list(TokenKind::RParen)?;
        Ok(Expr::Call { callee, args })
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_comma_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut items = Vec::new();
        if !self.at(close) {
            items.push(self.parse_expression()?);
            while self.at(TokenKind::Comma) {
                self.advance();
                items.push(self.parse_expression()?);
            }
        }
        self.expect(close)?;
        Ok(items)
    }
}

fn relational_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::EqualEqual => Some(BinaryOp::Eq),
        TokenKind::NotEqual => Some(BinaryOp::Ne),
        TokenKind::LessEqual => Some(BinaryOp::Le),
        TokenKind::GreaterEqual => Some(BinaryOp::Ge),
        TokenKind::Less => Some(BinaryOp::Lt),
        TokenKind::Greater => Some(BinaryOp::Gt),
        _ => None,
    }
}

fn multiplicative_op(kind: TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        _ => None,
    }
}

fn ident_of(token: Token<'_>) -> Ident {
    Ident::new(
        token.text,
        Position {
            line: token.line,
            column: token.column,
        },
    )
}

fn number_of(token: Token<'_>) -> Result<Number, Diagnostic> {
    let text = token.text;
    if text.contains('.') {
        text.parse::<f64>().map(Number::Float).map_err(|_| {
            Diagnostic::syntax(
                format!("Invalid number literal '{text}'"),
                token.line,
                token.column,
            )
        })
    } else {
        Ok(text
            .parse::<i64>()
            .map(Number::Int)
            .unwrap_or_else(|_| Number::BigInt(text.to_string())))
    }
}

/// Decode backslash escapes of a string literal body.
///
/// Unknown escapes keep their backslash.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
