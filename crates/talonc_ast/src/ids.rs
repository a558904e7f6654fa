//! Stable indices standing in for the back-pointers the original
//! implementation expressed as raw pointers (method -> owning type,
//! expression -> resolved declaration, `VarExpr` -> resolved declaration).
//! Assigned once during parsing/type checking and never invalidated, since
//! every arena is append-only for the lifetime of its owning `Module`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceFileId(pub u32);
