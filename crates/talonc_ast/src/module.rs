//! `Module`: owns every declaration, expression, and statement parsed from
//! its source files, addressed by stable arena indices rather than owning
//! pointers. A `Module` also owns its `SourceFile`s; each `SourceFile` owns
//! the list of top-level declarations parsed from it (not the declarations
//! themselves, which live in the module-wide arenas).

use crate::decl::Decl;
use crate::expr::Expr;
use crate::ids::{DeclId, ExprId, SourceFileId, StmtId};
use crate::stmt::Stmt;
use talonc_base::Symbol;

pub struct SourceFile {
    pub path: std::path::PathBuf,
    pub top_level: Vec<DeclId>,
    pub imports: Vec<DeclId>,
}

pub struct Module {
    pub name: Symbol,
    decls: Vec<Decl>,
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    files: Vec<SourceFile>,
}

impl Module {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            decls: Vec::new(),
            exprs: Vec::new(),
            stmts: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file: SourceFile) -> SourceFileId {
        let id = SourceFileId(self.files.len() as u32);
        self.files.push(file);
        id
    }

    pub fn file(&self, id: SourceFileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    pub fn file_mut(&mut self, id: SourceFileId) -> &mut SourceFile {
        &mut self.files[id.0 as usize]
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter()
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0 as usize]
    }

    pub fn decl_ids(&self) -> impl Iterator<Item = DeclId> {
        (0..self.decls.len() as u32).map(DeclId)
    }
}
