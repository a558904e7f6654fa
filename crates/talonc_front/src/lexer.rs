//! Byte stream -> token stream.

use crate::token::{keyword_kind, Token, TokenKind};
use talonc_base::{Diagnostic, Interner, Span};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    last_line_start_pos: usize,
    last_token_line: u32,
    current_line: u32,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            last_line_start_pos: 0,
            last_token_line: 1,
            current_line: 1,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.current_line += 1;
            self.last_line_start_pos = self.pos;
        }
        Some(b)
    }

    fn bump_if(&mut self, expected: u8) -> bool {
        if self.peek_byte() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Skips spaces/tabs/CR (not newlines) and returns whether any was
    /// skipped, plus whether a line break was crossed.
    fn skip_intra_line_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while let Some(b) = self.peek_byte() {
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.advance();
                skipped = true;
            } else {
                break;
            }
        }
        skipped
    }

    fn skip_comment(&mut self) -> bool {
        if self.peek_byte() == Some(b'/') && self.peek_at(1) == Some(b'/') {
            while let Some(b) = self.peek_byte() {
                if b == b'\n' {
                    break;
                }
                self.advance();
            }
            true
        } else if self.peek_byte() == Some(b'/') && self.peek_at(1) == Some(b'*') {
            self.advance();
            self.advance();
            while self.peek_byte().is_some() {
                if self.peek_byte() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                    self.advance();
                    self.advance();
                    break;
                }
                self.advance();
            }
            true
        } else {
            false
        }
    }

    /// Produces the next token. Returns `Ok` with a `NoToken` kind at EOF.
    pub fn next_token(&mut self, interner: &mut Interner) -> Result<Token, Diagnostic> {
        let line_at_start = self.current_line;
        let mut preceded_by_space = false;
        loop {
            let had_space = self.skip_intra_line_whitespace();
            preceded_by_space |= had_space;
            if self.skip_comment() {
                continue;
            }
            if self.peek_byte() == Some(b'\n') {
                self.advance();
                continue;
            }
            break;
        }

        if self.current_line != line_at_start && self.last_token_line != self.current_line {
            let span = Span::new(self.pos as u32, self.pos as u32);
            self.last_token_line = self.current_line;
            let mut tok = Token::new(TokenKind::Newline, span);
            tok.preceded_by_space = true;
            return Ok(tok);
        }
        self.last_token_line = self.current_line;

        let start = self.pos;
        let Some(b) = self.peek_byte() else {
            let span = Span::new(start as u32, start as u32);
            let mut tok = Token::new(TokenKind::NoToken, span);
            tok.preceded_by_space = preceded_by_space;
            return Ok(tok);
        };

        let kind = if is_ident_start(b) {
            return self.lex_identifier(start, preceded_by_space, interner);
        } else if b.is_ascii_digit() {
            return self.lex_number(start, preceded_by_space);
        } else if b == b'"' {
            return self.lex_string(start, preceded_by_space);
        } else {
            self.lex_operator(start)?
        };

        let span = Span::new(start as u32, self.pos as u32);
        let mut tok = Token::new(kind, span);
        tok.preceded_by_space = preceded_by_space;
        Ok(tok)
    }

    fn lex_identifier(
        &mut self,
        start: usize,
        preceded_by_space: bool,
        interner: &mut Interner,
    ) -> Result<Token, Diagnostic> {
        while let Some(b) = self.peek_byte() {
            if is_ident_continue(b) {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start as u32, self.pos as u32);
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        let mut tok = Token::new(kind, span);
        tok.preceded_by_space = preceded_by_space;
        if kind == TokenKind::Identifier {
            tok.lexeme = Some(interner.intern(text));
        }
        Ok(tok)
    }

    fn lex_number(&mut self, start: usize, preceded_by_space: bool) -> Result<Token, Diagnostic> {
        let mut is_float = false;
        while let Some(b) = self.peek_byte() {
            if b.is_ascii_digit() {
                self.advance();
            } else if b == b'.' && !is_float && matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let span = Span::new(start as u32, self.pos as u32);
        let mut tok = if is_float {
            let value: f64 = text.parse().map_err(|_| {
                Diagnostic::error(format!("invalid floating-point literal '{text}'"), span)
            })?;
            let mut t = Token::new(TokenKind::FloatLiteral, span);
            t.float_value = Some(value);
            t
        } else {
            let value: i64 = text.parse().map_err(|_| {
                Diagnostic::error(format!("invalid integer literal '{text}'"), span)
            })?;
            let mut t = Token::new(TokenKind::IntLiteral, span);
            t.int_value = Some(value);
            t
        };
        tok.preceded_by_space = preceded_by_space;
        Ok(tok)
    }

    fn lex_string(&mut self, start: usize, preceded_by_space: bool) -> Result<Token, Diagnostic> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_byte() {
                None | Some(b'\n') => {
                    let span = Span::new(start as u32, self.pos as u32);
                    return Err(Diagnostic::error("unterminated string literal", span));
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => {
                    let escape_start = self.pos;
                    self.advance();
                    let escaped = self.advance();
                    let replacement = match escaped {
                        Some(b'a') => '\u{07}',
                        Some(b'b') => '\u{08}',
                        Some(b'n') => '\n',
                        Some(b'r') => '\r',
                        Some(b't') => '\t',
                        Some(b'v') => '\u{0B}',
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        other => {
                            let span = Span::new(escape_start as u32, self.pos as u32);
                            let ch = other.map(|b| b as char).unwrap_or('?');
                            return Err(Diagnostic::error(
                                format!("unknown escape sequence '\\{ch}'"),
                                span,
                            ));
                        }
                    };
                    value.push(replacement);
                }
                Some(_) => {
                    let rest = &self.source[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    value.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        let span = Span::new(start as u32, self.pos as u32);
        let mut tok = Token::new(TokenKind::StringLiteral, span);
        tok.string_value = Some(value);
        tok.preceded_by_space = preceded_by_space;
        Ok(tok)
    }

    fn lex_operator(&mut self, start: usize) -> Result<TokenKind, Diagnostic> {
        use TokenKind::*;
        let b = self.advance().unwrap();
        let kind = match b {
            b'+' => {
                if self.bump_if(b'+') {
                    PlusPlus
                } else if self.bump_if(b'=') {
                    PlusEq
                } else {
                    Plus
                }
            }
            b'-' => {
                if self.bump_if(b'-') {
                    MinusMinus
                } else if self.bump_if(b'=') {
                    MinusEq
                } else if self.bump_if(b'>') {
                    Arrow
                } else {
                    Minus
                }
            }
            b'*' => {
                if self.bump_if(b'=') {
                    StarEq
                } else {
                    Star
                }
            }
            b'/' => {
                if self.bump_if(b'=') {
                    SlashEq
                } else {
                    Slash
                }
            }
            b'%' => {
                if self.bump_if(b'=') {
                    PercentEq
                } else {
                    Percent
                }
            }
            b'=' => {
                if self.bump_if(b'=') {
                    Eq
                } else {
                    Assign
                }
            }
            b'!' => {
                if self.bump_if(b'=') {
                    Ne
                } else {
                    Bang
                }
            }
            b'<' => {
                if self.bump_if(b'<') {
                    if self.bump_if(b'=') {
                        ShlEq
                    } else {
                        Shl
                    }
                } else if self.bump_if(b'=') {
                    Le
                } else {
                    Lt
                }
            }
            b'>' => {
                if self.bump_if(b'>') {
                    if self.bump_if(b'=') {
                        ShrEq
                    } else {
                        Shr
                    }
                } else if self.bump_if(b'=') {
                    Ge
                } else {
                    Gt
                }
            }
            b'&' => {
                if self.bump_if(b'&') {
                    if self.bump_if(b'=') {
                        AmpAmpEq
                    } else {
                        AmpAmp
                    }
                } else if self.bump_if(b'=') {
                    AmpEq
                } else {
                    Amp
                }
            }
            b'|' => {
                if self.bump_if(b'|') {
                    if self.bump_if(b'=') {
                        PipePipeEq
                    } else {
                        PipePipe
                    }
                } else if self.bump_if(b'=') {
                    PipeEq
                } else {
                    Pipe
                }
            }
            b'^' => {
                if self.bump_if(b'=') {
                    CaretEq
                } else {
                    Caret
                }
            }
            b'~' => Tilde,
            b'.' => {
                if self.bump_if(b'.') {
                    if self.bump_if(b'.') {
                        DotDotDot
                    } else {
                        DotDot
                    }
                } else {
                    Dot
                }
            }
            b',' => Comma,
            b':' => Colon,
            b';' => Semicolon,
            b'(' => LParen,
            b')' => RParen,
            b'{' => LBrace,
            b'}' => RBrace,
            b'[' => LBracket,
            b']' => RBracket,
            b'?' => {
                if self.bump_if(b'!') {
                    QuestionBang
                } else {
                    let span = Span::new(start as u32, self.pos as u32);
                    return Err(Diagnostic::error("unexpected character '?'", span));
                }
            }
            other => {
                let span = Span::new(start as u32, self.pos as u32);
                return Err(Diagnostic::error(
                    format!("unexpected character '{}'", other as char),
                    span,
                ));
            }
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> (Vec<Token>, Interner) {
        let mut lexer = Lexer::new(source);
        let mut interner = Interner::new();
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token(&mut interner).expect("lex error");
            let done = tok.kind == TokenKind::NoToken;
            tokens.push(tok);
            if done {
                break;
            }
        }
        (tokens, interner)
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let (tokens, interner) = lex_all("let x");
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(interner.resolve(tokens[1].lexeme.unwrap()), "x");
    }

    #[test]
    fn lexes_int_and_float_literals() {
        let (tokens, _) = lex_all("42 3.14");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[0].int_value, Some(42));
        assert_eq!(tokens[1].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[1].float_value, Some(3.14));
    }

    #[test]
    fn lexes_string_with_escapes() {
        let (tokens, _) = lex_all("\"hi\\n\\t\\\"\"");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].string_value.as_deref(), Some("hi\n\t\""));
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let mut lexer = Lexer::new("\"\\q\"");
        let mut interner = Interner::new();
        let err = lexer.next_token(&mut interner).unwrap_err();
        assert!(err.message.contains("unknown escape"));
    }

    #[test]
    fn newline_token_emitted_between_lines() {
        let (tokens, _) = lex_all("x\ny");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn compound_assignment_operators() {
        let (tokens, _) = lex_all("+= -= *= /= %= &= |= ^= <<= >>= &&= ||=");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            &kinds[..12],
            &[
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::StarEq,
                TokenKind::SlashEq,
                TokenKind::PercentEq,
                TokenKind::AmpEq,
                TokenKind::PipeEq,
                TokenKind::CaretEq,
                TokenKind::ShlEq,
                TokenKind::ShrEq,
                TokenKind::AmpAmpEq,
                TokenKind::PipePipeEq,
            ]
        );
    }

    #[test]
    fn generic_bracket_whitespace_is_tracked() {
        let (tokens, _) = lex_all("Array<int> Array < int >");
        // `Array<int>`: the `<` right after the identifier has no preceding space.
        assert_eq!(tokens[1].kind, TokenKind::Lt);
        assert!(!tokens[1].preceded_by_space);
        // `Array < int >`: spaced out, so `<` is preceded by space.
        let lt_idx = tokens
            .iter()
            .skip(4)
            .position(|t| t.kind == TokenKind::Lt)
            .unwrap()
            + 4;
        assert!(tokens[lt_idx].preceded_by_space);
    }

    #[test]
    fn line_and_block_comments_are_skipped() {
        let (tokens, _) = lex_all("x // trailing\n/* block */ y");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds[0], TokenKind::Identifier);
        assert_eq!(kinds[1], TokenKind::Newline);
        assert_eq!(kinds[2], TokenKind::Identifier);
    }
}
