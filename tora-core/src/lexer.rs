//! Lexer for Tora.
//!
//! Tokens are recognized by trying every rule of [`RULES`] at the current
//! scan position. The longest match wins; among matches of equal length the
//! rule listed first wins. That is why `println` precedes `print`, and why
//! keywords precede the identifier rule: `print` lexes as a keyword while
//! `printer` lexes as an identifier.
//!
//! Whitespace, comments and newlines are matched like any other rule but
//! produce no token.

use std::fmt;

use crate::error::Diagnostic;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Let,
    Fn,
    If,
    Else,
    While,
    For,
    Print,
    Println,
    Return,

    // Identifiers and literals
    Identifier,
    Number,
    String,

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    EqualEqual,   // ==
    Assign,       // =
    NotEqual,     // !=
    LessEqual,    // <=
    GreaterEqual, // >=
    Less,         // <
    Greater,      // >

    // Punctuation
    Semicolon,
    Colon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    /// Upper-case name used in diagnostics, e.g. `SEMICOLON`.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Let => "LET",
            TokenKind::Fn => "FN",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::While => "WHILE",
            TokenKind::For => "FOR",
            TokenKind::Print => "PRINT",
            TokenKind::Println => "PRINTLN",
            TokenKind::Return => "RETURN",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "MULTIPLY",
            TokenKind::Slash => "DIVIDE",
            TokenKind::EqualEqual => "EQUALS",
            TokenKind::Assign => "ASSIGN",
            TokenKind::NotEqual => "NOT_EQUALS",
            TokenKind::LessEqual => "LESS_EQUAL",
            TokenKind::GreaterEqual => "GREATER_EQUAL",
            TokenKind::Less => "LESS_THAN",
            TokenKind::Greater => "GREATER_THAN",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Colon => "COLON",
            TokenKind::Comma => "COMMA",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single token borrowed from the source it was lexed from.
///
/// `line` and `column` are 1-based; `column` counts characters, not bytes.
/// The end-of-input token has empty text and column 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// Exact text.
    Literal(&'static str),
    Identifier,
    Number,
    String,
    Comment,
    Whitespace,
    Newline,
}

impl Pattern {
    /// Length in bytes of the match at the start of `input`, if any.
    fn match_len(self, input: &str) -> Option<usize> {
        match self {
            Pattern::Literal(text) => input.starts_with(text).then_some(text.len()),
            Pattern::Identifier => match_identifier(input),
            Pattern::Number => match_number(input),
            Pattern::String => match_string(input),
            Pattern::Comment => input
                .starts_with("//")
                .then(|| input.find('\n').unwrap_or(input.len())),
            Pattern::Whitespace => {
                let len = input.len() - input.trim_start_matches([' ', '\t', '\r']).len();
                (len > 0).then_some(len)
            }
            Pattern::Newline => input.starts_with('\n').then_some(1),
        }
    }
}

/// Rules in priority order. `None` marks input that is consumed silently.
const RULES: &[(Pattern, Option<TokenKind>)] = &[
    (Pattern::Literal("println"), Some(TokenKind::Println)),
    (Pattern::Literal("print"), Some(TokenKind::Print)),
    (Pattern::Literal("let"), Some(TokenKind::Let)),
    (Pattern::Literal("fn"), Some(TokenKind::Fn)),
    (Pattern::Literal("if"), Some(TokenKind::If)),
    (Pattern::Literal("else"), Some(TokenKind::Else)),
    (Pattern::Literal("while"), Some(TokenKind::While)),
    (Pattern::Literal("for"), Some(TokenKind::For)),
    (Pattern::Literal("return"), Some(TokenKind::Return)),
    (Pattern::Identifier, Some(TokenKind::Identifier)),
    (Pattern::Number, Some(TokenKind::Number)),
    (Pattern::String, Some(TokenKind::String)),
    (Pattern::Literal("+"), Some(TokenKind::Plus)),
    (Pattern::Literal("-"), Some(TokenKind::Minus)),
    (Pattern::Literal("*"), Some(TokenKind::Star)),
    (Pattern::Literal("/"), Some(TokenKind::Slash)),
    (Pattern::Literal("=="), Some(TokenKind::EqualEqual)),
    (Pattern::Literal("="), Some(TokenKind::Assign)),
    (Pattern::Literal("!="), Some(TokenKind::NotEqual)),
    (Pattern::Literal("<="), Some(TokenKind::LessEqual)),
    (Pattern::Literal(">="), Some(TokenKind::GreaterEqual)),
    (Pattern::Literal("<"), Some(TokenKind::Less)),
    (Pattern::Literal(">"), Some(TokenKind::Greater)),
    (Pattern::Literal(";"), Some(TokenKind::Semicolon)),
    (Pattern::Literal(":"), Some(TokenKind::Colon)),
    (Pattern::Literal(","), Some(TokenKind::Comma)),
    (Pattern::Literal("("), Some(TokenKind::LParen)),
    (Pattern::Literal(")"), Some(TokenKind::RParen)),
    (Pattern::Literal("{"), Some(TokenKind::LBrace)),
    (Pattern::Literal("}"), Some(TokenKind::RBrace)),
    (Pattern::Literal("["), Some(TokenKind::LBracket)),
    (Pattern::Literal("]"), Some(TokenKind::RBracket)),
    (Pattern::Comment, None),
    (Pattern::Whitespace, None),
    (Pattern::Newline, None),
];

/// Lex a whole source string.
///
/// Stops at the first unrecognized character. On success the last token is
/// always [`TokenKind::Eof`].
pub fn lex(source: &str) -> Result<Vec<Token<'_>>, Diagnostic> {
    Lexer::new(source).collect()
}

/// Lazy token stream over a source string.
///
/// Yields tokens up to and including `Eof`, or stops after the first
/// diagnostic. Restarting means constructing a new lexer.
pub struct Lexer<'src> {
    source: &'src str,
    index: usize,
    line: usize,
    line_start: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            source,
            index: 0,
            line: 1,
            line_start: 0,
            finished: false,
        }
    }

    fn column_of(&self, offset: usize) -> usize {
        self.source[self.line_start..offset].chars().count() + 1
    }

    fn next_token(&mut self) -> Result<Token<'src>, Diagnostic> {
        loop {
            let rest = &self.source[self.index..];
            let Some(first) = rest.chars().next() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    text: "",
                    line: self.line,
                    column: 0,
                });
            };

            let start = self.index;
            let column = self.column_of(start);

            let mut best: Option<(usize, Option<TokenKind>)> = None;
            for (pattern, kind) in RULES {
                if let Some(len) = pattern.match_len(rest) {
                    if best.is_none_or(|(best_len, _)| len > best_len) {
                        best = Some((len, *kind));
                    }
                }
            }

            let Some((len, kind)) = best else {
                return Err(if first == '"' {
                    Diagnostic::lexical("Unterminated string literal", self.line, column)
                } else {
                    Diagnostic::lexical(
                        format!("Unexpected character '{first}'"),
                        self.line,
                        column,
                    )
                });
            };

            let text = &rest[..len];
            let line = self.line;
            self.advance(len);

            if let Some(kind) = kind {
                return Ok(Token {
                    kind,
                    text,
                    line,
                    column,
                });
            }
        }
    }

    fn advance(&mut self, len: usize) {
        let consumed = &self.source[self.index..self.index + len];
        for (offset, ch) in consumed.char_indices() {
            if ch == '\n' {
                self.line += 1;
                self.line_start = self.index + offset + 1;
            }
        }
        self.index += len;
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        self.finished = matches!(result, Err(_) | Ok(Token { kind: TokenKind::Eof, .. }));
        Some(result)
    }
}

fn is_cjk(ch: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&ch)
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic() || is_cjk(ch) || ch.is_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

fn match_identifier(input: &str) -> Option<usize> {
    let mut chars = input.char_indices();
    let (_, first) = chars.next()?;
    if !is_ident_start(first) {
        return None;
    }
    let end = chars
        .find(|(_, ch)| !is_ident_continue(*ch))
        .map_or(input.len(), |(offset, _)| offset);
    Some(end)
}

fn digits_len(input: &str) -> usize {
    input.len() - input.trim_start_matches(|ch: char| ch.is_ascii_digit()).len()
}

fn match_number(input: &str) -> Option<usize> {
    let sign = usize::from(input.starts_with('-'));
    let int_len = digits_len(&input[sign..]);
    if int_len == 0 {
        return None;
    }
    let mut end = sign + int_len;
    if input[end..].starts_with('.') {
        let frac_len = digits_len(&input[end + 1..]);
        if frac_len > 0 {
            end += 1 + frac_len;
        }
    }
    Some(end)
}

fn match_string(input: &str) -> Option<usize> {
    let mut chars = input.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '"' => return Some(offset + 1),
            // A backslash escapes any following character except a newline.
            '\\' => match chars.next() {
                Some((_, '\n')) | None => return None,
                Some(_) => {}
            },
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_let_statement() {
        let tokens = lex("let x = 42;").expect("lex");
        let summary: Vec<_> = tokens.iter().map(|t| (t.kind, t.text)).collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Let, "let"),
                (TokenKind::Identifier, "x"),
                (TokenKind::Assign, "="),
                (TokenKind::Number, "42"),
                (TokenKind::Semicolon, ";"),
                (TokenKind::Eof, ""),
            ]
        );
    }

    #[test]
    fn prefers_println_over_print() {
        assert_eq!(
            kinds("println print"),
            vec![TokenKind::Println, TokenKind::Print, TokenKind::Eof]
        );
    }

    #[test]
    fn longer_identifier_beats_keyword_prefix() {
        let tokens = lex("letter printer fnord").expect("lex");
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Identifier));
        assert_eq!(tokens[0].text, "letter");
    }

    #[test]
    fn accepts_cjk_identifiers() {
        let tokens = lex("let 变量1 = 1;").expect("lex");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "变量1");
        assert_eq!(tokens[2].column, 9);
    }

    #[test]
    fn negative_literal_swallows_minus_without_space() {
        assert_eq!(
            kinds("a -1"),
            vec![TokenKind::Identifier, TokenKind::Number, TokenKind::Eof]
        );
        assert_eq!(
            kinds("a - 1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Minus,
                TokenKind::Number,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn lexes_fractional_numbers() {
        let tokens = lex("3.14 -0.5 7").expect("lex");
        assert_eq!(tokens[0].text, "3.14");
        assert_eq!(tokens[1].text, "-0.5");
        assert_eq!(tokens[2].text, "7");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn two_char_operators_win() {
        assert_eq!(
            kinds("== = != <= >= < >"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::Assign,
                TokenKind::NotEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn skips_comments_and_tracks_lines() {
        let tokens = lex("let a = 1; // note\n  a = 2;").expect("lex");
        let second_a = tokens
            .iter()
            .filter(|t| t.text == "a")
            .nth(1)
            .expect("second a");
        assert_eq!(second_a.line, 2);
        assert_eq!(second_a.column, 3);
        assert!(tokens.iter().all(|t| !t.text.contains("note")));
    }

    #[test]
    fn string_token_keeps_quotes_and_escapes() {
        let tokens = lex(r#"print("a\"b");"#).expect("lex");
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, r#""a\"b""#);
    }

    #[test]
    fn reports_unexpected_character_position() {
        let err = lex("let x = 1;\nlet y = @;").unwrap_err();
        assert_eq!(err.kind, crate::error::DiagnosticKind::Lexical);
        assert_eq!(err.line, Some(2));
        assert_eq!(err.column, Some(9));
        assert!(err.message.contains('@'));
    }

    #[test]
    fn reports_unterminated_string() {
        let err = lex("let s = \"abc").unwrap_err();
        assert_eq!(err.message, "Unterminated string literal");
        assert_eq!(err.column, Some(9));
    }

    #[test]
    fn token_texts_reconstruct_source_without_whitespace() {
        let source = "fn add(a, b) {\n  return a + b; // sum\n}\nprintln(add(1, 2));";
        let joined: String = lex(source)
            .expect("lex")
            .iter()
            .map(|t| t.text)
            .collect();
        let expected: String = source
            .lines()
            .map(|line| line.split("//").next().unwrap_or(""))
            .collect::<String>()
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .collect();
        assert_eq!(joined, expected);
    }

    #[test]
    fn stream_stops_after_eof() {
        let mut lexer = Lexer::new("x");
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Identifier, .. }))));
        assert!(matches!(lexer.next(), Some(Ok(Token { kind: TokenKind::Eof, .. }))));
        assert!(lexer.next().is_none());
    }
}
