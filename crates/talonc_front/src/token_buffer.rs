//! A token buffer supporting arbitrary lookahead and backtracking, pulled
//! on demand from a [`Lexer`]. The parser never talks to the lexer
//! directly.

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use talonc_base::{Diagnostic, Interner};

pub struct TokenBuffer<'a> {
    lexer: Lexer<'a>,
    buffer: Vec<Token>,
    pos: usize,
    exhausted: bool,
}

impl<'a> TokenBuffer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            buffer: Vec::new(),
            pos: 0,
            exhausted: false,
        }
    }

    fn fill_to(&mut self, index: usize, interner: &mut Interner) -> Result<(), Diagnostic> {
        while self.buffer.len() <= index && !self.exhausted {
            let tok = self.lexer.next_token(interner)?;
            if tok.kind == TokenKind::NoToken {
                self.exhausted = true;
            }
            self.buffer.push(tok);
        }
        Ok(())
    }

    pub fn peek(&mut self, offset: usize, interner: &mut Interner) -> Result<&Token, Diagnostic> {
        self.fill_to(self.pos + offset, interner)?;
        let idx = (self.pos + offset).min(self.buffer.len() - 1);
        Ok(&self.buffer[idx])
    }

    pub fn current(&mut self, interner: &mut Interner) -> Result<Token, Diagnostic> {
        Ok(self.peek(0, interner)?.clone())
    }

    pub fn advance(&mut self, interner: &mut Interner) -> Result<Token, Diagnostic> {
        let tok = self.peek(0, interner)?.clone();
        if self.pos < self.buffer.len() - 1 {
            self.pos += 1;
        }
        Ok(tok)
    }

    /// Returns an opaque position that [`Self::reset`] can later restore,
    /// for the assignment-operator backtracking rule in expression parsing.
    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_advance() {
        let mut interner = Interner::new();
        let mut buf = TokenBuffer::new("a b c");
        let first = buf.peek(0, &mut interner).unwrap().clone();
        let first_again = buf.current(&mut interner).unwrap();
        assert_eq!(first.kind, first_again.kind);
    }

    #[test]
    fn arbitrary_lookahead_past_several_tokens() {
        let mut interner = Interner::new();
        let mut buf = TokenBuffer::new("a b c d");
        let fourth = buf.peek(6, &mut interner).unwrap().kind;
        assert_eq!(fourth, TokenKind::NoToken);
        let third = buf.peek(4, &mut interner).unwrap().kind;
        assert_eq!(third, TokenKind::Identifier);
    }

    #[test]
    fn mark_and_reset_rewinds_position() {
        let mut interner = Interner::new();
        let mut buf = TokenBuffer::new("a b c");
        let mark = buf.mark();
        buf.advance(&mut interner).unwrap();
        buf.advance(&mut interner).unwrap();
        buf.reset(mark);
        let tok = buf.current(&mut interner).unwrap();
        assert_eq!(interner.resolve(tok.lexeme.unwrap()), "a");
    }

    #[test]
    fn advance_past_eof_stays_put() {
        let mut interner = Interner::new();
        let mut buf = TokenBuffer::new("a");
        buf.advance(&mut interner).unwrap();
        let first_eof = buf.advance(&mut interner).unwrap().kind;
        let second_eof = buf.advance(&mut interner).unwrap().kind;
        assert_eq!(first_eof, TokenKind::NoToken);
        assert_eq!(second_eof, TokenKind::NoToken);
    }
}
