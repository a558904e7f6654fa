pub mod decl;
pub mod expr;
pub mod ids;
pub mod module;
pub mod stmt;

pub use decl::{Decl, DeclKind, TypeDecl, TypeDeclKind};
pub use expr::{Argument, BinaryOp, CallExpr, CallKind, Expr, ExprKind, PrefixOp};
pub use ids::{DeclId, ExprId, SourceFileId, StmtId};
pub use module::{Module, SourceFile};
pub use stmt::{Stmt, StmtKind, SwitchCase};
