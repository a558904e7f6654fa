//! Expression nodes.
//!
//! `Prefix`, `Binary`, and `Subscript` are not separate AST variants: they
//! are encoded as a `Call` with a synthesized callee, so a single
//! overload-resolution code path in the type checker services plain calls,
//! operators, and subscripting alike. `CallKind` records which surface
//! syntax produced the call, purely for diagnostics and for recovering the
//! original operator spelling; it plays no role in how the call is
//! resolved.

use crate::ids::DeclId;
use talonc_base::{Span, Symbol};
use talonc_types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Not,
    Deref,
    AddressOf,
    Negate,
    Plus,
    BitNot,
}

impl PrefixOp {
    /// The synthetic free-function name this operator is looked up as.
    pub fn function_name(self) -> &'static str {
        match self {
            PrefixOp::Not => "!",
            PrefixOp::Deref => "*",
            PrefixOp::AddressOf => "&",
            PrefixOp::Negate => "-",
            PrefixOp::Plus => "+",
            PrefixOp::BitNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    RangeExclusive,
    RangeInclusive,
}

impl BinaryOp {
    pub fn function_name(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            Eq => "==",
            Ne => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            And => "&&",
            Or => "||",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            Shl => "<<",
            Shr => ">>",
            RangeExclusive => "..",
            RangeInclusive => "...",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        use BinaryOp::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    pub fn is_bitwise(self) -> bool {
        use BinaryOp::*;
        matches!(self, BitAnd | BitOr | BitXor | Shl | Shr)
    }

    pub fn is_range(self) -> bool {
        matches!(self, BinaryOp::RangeExclusive | BinaryOp::RangeInclusive)
    }

    pub fn is_arithmetic(self) -> bool {
        use BinaryOp::*;
        matches!(self, Add | Sub | Mul | Div | Mod)
    }
}

/// Which surface syntax produced a `Call` node.
#[derive(Debug, Clone, PartialEq)]
pub enum CallKind {
    Plain,
    Prefix(PrefixOp),
    Binary(BinaryOp),
    Subscript,
}

#[derive(Debug, Clone)]
pub struct Argument {
    /// Empty if the argument was not passed by name.
    pub name: Option<Symbol>,
    pub value: ExprId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub kind: CallKind,
    pub callee: ExprId,
    pub args: Vec<Argument>,
    pub generic_args: Vec<Type>,
    /// Filled in by the type checker once overload resolution picks a
    /// winner; `None` until then.
    pub resolved_callee: Option<DeclId>,
    pub receiver_type: Option<Type>,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Var {
        name: Symbol,
        decl: Option<DeclId>,
    },
    IntLiteral {
        value: i64,
    },
    FloatLiteral {
        value: f64,
    },
    BoolLiteral {
        value: bool,
    },
    StringLiteral {
        value: String,
    },
    NullLiteral,
    ArrayLiteral {
        elements: Vec<ExprId>,
    },
    Call(CallExpr),
    Cast {
        target: Type,
        expr: ExprId,
    },
    Member {
        base: ExprId,
        member: Symbol,
    },
    Unwrap {
        operand: ExprId,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Unset (`None`) until the type checker visits this expression.
    pub resolved_type: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            resolved_type: None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self.kind, ExprKind::Var { .. })
    }

    pub fn is_member(&self) -> bool {
        matches!(self.kind, ExprKind::Member { .. })
    }

    /// An expression names a storage location (and so may be the target of
    /// `&`, assignment, `++`/`--`) iff it is a variable reference, a member
    /// access, a subscript (encoded as a `Call` with `CallKind::Subscript`),
    /// or an unwrap.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Var { .. } | ExprKind::Member { .. } | ExprKind::Unwrap { .. } => true,
            ExprKind::Call(call) => matches!(call.kind, CallKind::Subscript),
            _ => false,
        }
    }

    pub fn is_rvalue(&self) -> bool {
        !self.is_lvalue()
    }
}
