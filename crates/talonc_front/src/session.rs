//! The session facade (C9): ties lexing, parsing, and type checking
//! together for a whole module across multiple files, and exposes the
//! single-expression entry points the REPL collaborator needs.

use std::path::PathBuf;

use talonc_ast::{DeclId, DeclKind, ExprId, Module};
use talonc_base::{Diagnostic, DiagnosticBag, Span};
use talonc_types::{Type, TypeInterner};

use crate::config::CompileOptions;
use crate::parser::ParserContext;
use crate::scope::SymbolTable;
use crate::typecheck::TypeChecker;

/// Owns the interning and name-resolution state that must persist across
/// every file of a module (and, for the REPL collaborator, across every
/// expression typed into that module after it was compiled).
pub struct Session {
    pub types: TypeInterner,
    pub symbols: SymbolTable,
}

impl Session {
    pub fn new() -> Self {
        Self {
            types: TypeInterner::new(),
            symbols: SymbolTable::new(),
        }
    }

    /// Reads, lexes, and parses every entry path into one module, publishing
    /// top-level declarations into the shared symbol table as it goes, then
    /// type-checks every declaration that came from a file whose parse
    /// succeeded. Per §7's propagation rules, a file whose parse aborts is
    /// skipped for type checking but does not prevent the other files in
    /// the module from being parsed and checked.
    pub fn compile_module(
        &mut self,
        module_name: &str,
        entry_paths: &[PathBuf],
        options: &CompileOptions,
    ) -> (Module, Vec<Diagnostic>) {
        let module_sym = self.types.names().intern(module_name);
        let mut module = Module::new(module_sym);
        let mut diagnostics = DiagnosticBag::new();
        let mut checkable: Vec<DeclId> = Vec::new();

        for path in entry_paths {
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(error) => {
                    diagnostics.error(
                        format!("cannot read '{}': {error}", path.display()),
                        Span::default(),
                    );
                    continue;
                }
            };

            let before = module.decl_ids().count() as u32;
            let parsed = {
                let mut ctx = ParserContext::new(
                    &source,
                    &mut self.types,
                    &mut module,
                    &mut self.symbols,
                    &mut diagnostics,
                    &options.parse,
                    module_sym,
                );
                ctx.parse_file(path.clone())
            };
            let after = module.decl_ids().count() as u32;

            if parsed.is_ok() {
                checkable.extend((before..after).map(DeclId));
            }
        }

        let mut checker = TypeChecker::new(&mut module, &mut self.types, &self.symbols, &mut diagnostics);
        checker.typecheck_decls(&checkable);

        (module, diagnostics.into_vec())
    }

    /// Parses a standalone expression into an already-compiled module's
    /// scope, for the REPL collaborator. The expression is parsed as if it
    /// were the right-hand side of a top-level `_ = <expr>` statement; no
    /// new declarations are published.
    pub fn parse_expr_into(&mut self, module: &mut Module, source: &str) -> Result<ExprId, Diagnostic> {
        self.open_module_to_repl_scope(module);
        let mut diagnostics = DiagnosticBag::new();
        let module_name = module.name;
        let expr_id = {
            let mut ctx = ParserContext::new(
                source,
                &mut self.types,
                module,
                &mut self.symbols,
                &mut diagnostics,
                &crate::config::ParseOptions::default(),
                module_name,
            );
            ctx.parse_expr()
        };
        match expr_id {
            Ok(id) => Ok(id),
            Err(()) => Err(diagnostics
                .into_vec()
                .into_iter()
                .next()
                .unwrap_or_else(|| Diagnostic::error("failed to parse expression", Span::default()))),
        }
    }

    /// Type-checks a single expression already parsed into `module`,
    /// returning its resolved type. Used by the REPL collaborator to
    /// evaluate one expression at a time against a module that was already
    /// compiled (and whose declarations are therefore already published).
    pub fn typecheck_expr(&mut self, module: &mut Module, expr: ExprId) -> Result<Type, Diagnostic> {
        let mut diagnostics = DiagnosticBag::new();
        let result = {
            let mut checker = TypeChecker::new(module, &mut self.types, &self.symbols, &mut diagnostics);
            checker.typecheck_expr(expr)
        };
        match result {
            Ok(ty) => Ok(ty),
            Err(()) => Err(diagnostics
                .into_vec()
                .into_iter()
                .next()
                .unwrap_or_else(|| Diagnostic::error("failed to type-check expression", Span::default()))),
        }
    }

    /// Makes every top-level declaration of an already-compiled module
    /// visible to a freshly parsed REPL expression. `compile_module` leaves
    /// the symbol table's file-local layer holding only the last file it
    /// parsed, which is the wrong scope for an expression entered after
    /// the fact against the whole module; re-importing every function,
    /// variable, and type declaration puts them back within reach of the
    /// ordinary (non-"everywhere") lookup the type checker uses for plain
    /// identifiers. Methods and initializers are left alone: they are
    /// published under their mangled name and stay reachable however a
    /// call expression mangles its receiver type.
    fn open_module_to_repl_scope(&mut self, module: &Module) {
        self.symbols.begin_file();
        for id in module.decl_ids() {
            let decl = module.decl(id);
            let name = match &decl.kind {
                DeclKind::Function(d) => Some(d.name),
                DeclKind::Var(d) => Some(d.name),
                DeclKind::Type(d) => Some(d.name),
                _ => None,
            };
            if let Some(name) = name {
                self.symbols.import(name, id);
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn compiles_single_file_module_with_no_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "main.tln",
            "func f(x: int) -> int { return x + 1 }\nlet y = f(3)\n",
        );
        let mut session = Session::new();
        let (module, diagnostics) = session.compile_module("main", &[path], &CompileOptions::new());
        assert!(diagnostics.iter().all(|d| !d.is_error()), "{diagnostics:?}");
        assert!(module.decl_ids().count() >= 2);
    }

    #[test]
    fn a_file_that_fails_to_parse_does_not_block_type_checking_of_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let broken = write_temp(&dir, "broken.tln", "func (((\n");
        let good = write_temp(&dir, "good.tln", "func f(x: int) -> int { return x + 1 }\n");
        let mut session = Session::new();
        let (module, diagnostics) =
            session.compile_module("mixed", &[broken, good], &CompileOptions::new());
        assert!(diagnostics.iter().any(Diagnostic::is_error));
        let function_name = session.types.names().intern("f");
        assert!(!session.symbols.find_decls(function_name, true).is_empty());
        let _ = module;
    }

    #[test]
    fn repl_expression_is_parsed_and_typed_against_a_compiled_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "main.tln", "func f(x: int) -> int { return x + 1 }\n");
        let mut session = Session::new();
        let (mut module, diagnostics) = session.compile_module("main", &[path], &CompileOptions::new());
        assert!(diagnostics.iter().all(|d| !d.is_error()));

        let expr = session.parse_expr_into(&mut module, "f(41)").unwrap();
        let ty = session.typecheck_expr(&mut module, expr).unwrap();
        assert!(ty.is_integer(&session.types));
    }
}
