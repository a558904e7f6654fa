//! Token kinds and the `Token` struct the lexer produces.

use talonc_base::{Span, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    True,
    False,
    Null,

    // Keywords
    Let,
    Var,
    Const,
    Func,
    Class,
    Struct,
    Interface,
    Init,
    Deinit,
    Mutating,
    Mutable,
    If,
    Else,
    While,
    For,
    In,
    Switch,
    Case,
    Default,
    Break,
    Return,
    Defer,
    Cast,
    This,
    Import,
    Extern,
    Uninitialized,
    Underscore,

    // Operators / punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AmpAmp,
    PipePipe,
    Bang,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,
    AmpAmpEq,
    PipePipeEq,
    PlusPlus,
    MinusMinus,
    DotDot,
    DotDotDot,
    Arrow,
    Dot,
    Comma,
    Colon,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    QuestionBang,

    Newline,
    NoToken,
}

impl TokenKind {
    /// Binary-operator precedence, highest binds tightest. `None` for
    /// non-binary-operator kinds.
    pub fn binary_precedence(self) -> Option<u8> {
        use TokenKind::*;
        Some(match self {
            PipePipe => 1,
            AmpAmp => 2,
            Pipe => 3,
            Caret => 4,
            Amp => 5,
            Eq | Ne => 6,
            Lt | Le | Gt | Ge => 7,
            DotDot | DotDotDot => 8,
            Shl | Shr => 9,
            Plus | Minus => 10,
            Star | Slash | Percent => 11,
            _ => return None,
        })
    }

    pub fn is_binary_operator(self) -> bool {
        self.binary_precedence().is_some()
    }

    pub fn is_assignment(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Assign
                | PlusEq
                | MinusEq
                | StarEq
                | SlashEq
                | PercentEq
                | AmpEq
                | PipeEq
                | CaretEq
                | ShlEq
                | ShrEq
                | AmpAmpEq
                | PipePipeEq
        )
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub lexeme: Option<Symbol>,
    pub int_value: Option<i64>,
    pub float_value: Option<f64>,
    pub string_value: Option<String>,
    /// True if whitespace (not a line break — that would have produced a
    /// `Newline` token instead) was skipped immediately before this token.
    /// Consulted only by the generic-argument-list-vs-less-than
    /// disambiguation in the parser.
    pub preceded_by_space: bool,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self {
            kind,
            span,
            lexeme: None,
            int_value: None,
            float_value: None,
            string_value: None,
            preceded_by_space: false,
        }
    }
}

pub fn keyword_kind(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "let" => Let,
        "var" => Var,
        "const" => Const,
        "func" => Func,
        "class" => Class,
        "struct" => Struct,
        "interface" => Interface,
        "init" => Init,
        "deinit" => Deinit,
        "mutating" => Mutating,
        "mutable" => Mutable,
        "if" => If,
        "else" => Else,
        "while" => While,
        "for" => For,
        "in" => In,
        "switch" => Switch,
        "case" => Case,
        "default" => Default,
        "break" => Break,
        "return" => Return,
        "defer" => Defer,
        "cast" => Cast,
        "this" => This,
        "import" => Import,
        "extern" => Extern,
        "uninitialized" => Uninitialized,
        "_" => Underscore,
        "true" => True,
        "false" => False,
        "null" => Null,
        _ => return None,
    })
}
