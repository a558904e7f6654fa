//! Statement nodes.

use crate::expr::BinaryOp;
use crate::ids::{DeclId, ExprId, StmtId};
use talonc_base::{Span, Symbol};

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for the `default` case.
    pub value: Option<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Return {
        values: Vec<ExprId>,
    },
    VarDecl {
        decl: DeclId,
    },
    Increment {
        operand: ExprId,
    },
    Decrement {
        operand: ExprId,
    },
    Expr {
        expr: ExprId,
    },
    /// `_ = expr`.
    Discard {
        expr: ExprId,
    },
    Defer {
        call: ExprId,
    },
    If {
        condition: ExprId,
        then_branch: Vec<StmtId>,
        else_branch: Vec<StmtId>,
    },
    Switch {
        subject: ExprId,
        cases: Vec<SwitchCase>,
    },
    While {
        condition: ExprId,
        body: Vec<StmtId>,
    },
    For {
        variable: Symbol,
        variable_decl: DeclId,
        range: ExprId,
        body: Vec<StmtId>,
    },
    Break,
    Assign {
        target: ExprId,
        value: ExprId,
    },
    CompoundAssign {
        target: ExprId,
        op: BinaryOp,
        value: ExprId,
    },
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}
