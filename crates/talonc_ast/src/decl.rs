//! Declaration nodes.
//!
//! `Method`, `Init`, and `Deinit` always carry an `owner: DeclId` back to
//! their enclosing `TypeDecl`; that back-pointer is a non-owning relation
//! (the `TypeDecl` owns its members through its own `fields`/`methods`
//! vectors), mirroring the arena-index discipline used throughout this
//! crate family instead of raw pointers or reference counting.

use crate::ids::{DeclId, ExprId, StmtId};
use talonc_base::{Span, Symbol};
use talonc_types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDeclKind {
    Struct,
    Class,
    Interface,
}

impl TypeDeclKind {
    /// `struct`s (and interfaces, which have no storage of their own) pass
    /// by value; `class`es have reference semantics and are the only kind
    /// the move-semantics guard (§4.3 rule 0) cares about.
    pub fn is_reference_semantics(self) -> bool {
        matches!(self, TypeDeclKind::Class)
    }
}

#[derive(Debug, Clone)]
pub struct GenericParamDecl {
    pub name: Symbol,
    /// Single interface-name constraint; the language does not support
    /// multiple bounds on one generic parameter.
    pub constraint: Option<Symbol>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Symbol,
    pub declared_type: Option<Type>,
    pub is_mutable: bool,
    pub initializer: Option<ExprId>,
    pub is_uninitialized: bool,
    pub module: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: Symbol,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Symbol,
    pub declared_type: Type,
    pub is_mutable: bool,
    pub owner: DeclId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Symbol,
    pub generic_params: Vec<DeclId>,
    pub params: Vec<DeclId>,
    /// Single type; multi-valued returns are modeled as a `Tuple` type,
    /// not as a separate vector.
    pub return_type: Type,
    pub body: Vec<StmtId>,
    pub module: Symbol,
    pub is_extern: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: Symbol,
    pub owner: DeclId,
    pub mutating: bool,
    pub generic_params: Vec<DeclId>,
    pub params: Vec<DeclId>,
    pub return_type: Type,
    /// `None` for an interface method with no provided body.
    pub body: Option<Vec<StmtId>>,
    pub module: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct InitDecl {
    pub owner: DeclId,
    pub params: Vec<DeclId>,
    pub body: Vec<StmtId>,
    pub module: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DeinitDecl {
    pub owner: DeclId,
    pub body: Vec<StmtId>,
    pub module: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Symbol,
    pub kind: TypeDeclKind,
    pub generic_params: Vec<DeclId>,
    pub fields: Vec<DeclId>,
    pub methods: Vec<DeclId>,
    pub inits: Vec<DeclId>,
    pub deinit: Option<DeclId>,
    pub module: Symbol,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: String,
    /// True when `path` names a C header rather than another source file;
    /// symbols imported this way are treated as belonging to a module
    /// whose name ends in `.h`, used by overload resolution's tie-breaker.
    pub is_header: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Var(VarDecl),
    Param(ParamDecl),
    Field(FieldDecl),
    GenericParam(GenericParamDecl),
    Function(FunctionDecl),
    Method(MethodDecl),
    Init(InitDecl),
    Deinit(DeinitDecl),
    Type(TypeDecl),
    Import(ImportDecl),
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: Span,
}

impl Decl {
    pub fn new(kind: DeclKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn name(&self) -> Option<Symbol> {
        match &self.kind {
            DeclKind::Var(d) => Some(d.name),
            DeclKind::Param(d) => Some(d.name),
            DeclKind::Field(d) => Some(d.name),
            DeclKind::GenericParam(d) => Some(d.name),
            DeclKind::Function(d) => Some(d.name),
            DeclKind::Method(d) => Some(d.name),
            DeclKind::Type(d) => Some(d.name),
            DeclKind::Init(_) | DeclKind::Deinit(_) | DeclKind::Import(_) => None,
        }
    }

    /// The module a declaration belongs to; `Import` declarations have no
    /// owning module (they belong to whichever file imported them).
    pub fn module(&self) -> Option<Symbol> {
        match &self.kind {
            DeclKind::Var(d) => Some(d.module),
            DeclKind::Function(d) => Some(d.module),
            DeclKind::Method(d) => Some(d.module),
            DeclKind::Init(d) => Some(d.module),
            DeclKind::Deinit(d) => Some(d.module),
            DeclKind::Type(d) => Some(d.module),
            DeclKind::Param(_) | DeclKind::Field(_) | DeclKind::GenericParam(_) | DeclKind::Import(_) => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Function(_) | DeclKind::Method(_) | DeclKind::Init(_) | DeclKind::Type(_)
        )
    }

    pub fn is_type(&self) -> bool {
        matches!(self.kind, DeclKind::Type(_))
    }
}
