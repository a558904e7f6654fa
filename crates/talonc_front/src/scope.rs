//! The symbol table (C6): name resolution layered across lexical scopes,
//! the current file's top-level declarations, declarations imported into
//! that file, and the whole module's declarations.

use std::collections::HashMap;
use talonc_ast::DeclId;
use talonc_base::{Diagnostic, Span, Symbol};

#[derive(Default)]
struct LexicalScope {
    bindings: HashMap<Symbol, DeclId>,
}

/// Per-module name resolution. Declarations are mutated only during
/// parsing (to publish top-level declarations); queried during type
/// checking.
pub struct SymbolTable {
    scopes: Vec<LexicalScope>,
    file_decls: HashMap<Symbol, Vec<DeclId>>,
    imported_decls: HashMap<Symbol, Vec<DeclId>>,
    module_decls: HashMap<Symbol, Vec<DeclId>>,
    /// Consulted before every lookup; supports macro-like syntactic
    /// aliases declared by the front-end.
    identifier_replacements: HashMap<Symbol, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            file_decls: HashMap::new(),
            imported_decls: HashMap::new(),
            module_decls: HashMap::new(),
            identifier_replacements: HashMap::new(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(LexicalScope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind_local(&mut self, name: Symbol, decl: DeclId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name, decl);
        }
    }

    /// Publishes a top-level declaration: visible in the current file
    /// immediately, and in the whole module for every other file.
    pub fn publish(&mut self, name: Symbol, decl: DeclId) {
        self.file_decls.entry(name).or_default().push(decl);
        self.module_decls.entry(name).or_default().push(decl);
    }

    /// Starts a new file: its own top-level/import layers are reset, but
    /// `module_decls` accumulated from previously parsed files remains.
    pub fn begin_file(&mut self) {
        self.file_decls.clear();
        self.imported_decls.clear();
    }

    pub fn import(&mut self, name: Symbol, decl: DeclId) {
        self.imported_decls.entry(name).or_default().push(decl);
    }

    pub fn add_identifier_replacement(&mut self, source: Symbol, target: Symbol) {
        self.identifier_replacements.insert(source, target);
    }

    fn replaced(&self, name: Symbol) -> Symbol {
        self.identifier_replacements.get(&name).copied().unwrap_or(name)
    }

    /// All declarations named `name` currently in scope for overload
    /// resolution, searched innermost-lexical-scope first. When
    /// `everywhere` is set, module-level declarations are returned even if
    /// they weren't explicitly imported into the current file (used while
    /// re-checking generic instantiations).
    pub fn find_decls(&self, name: Symbol, everywhere: bool) -> Vec<DeclId> {
        let name = self.replaced(name);
        for scope in self.scopes.iter().rev() {
            if let Some(&decl) = scope.bindings.get(&name) {
                return vec![decl];
            }
        }
        if let Some(decls) = self.file_decls.get(&name) {
            if !decls.is_empty() {
                return decls.clone();
            }
        }
        if let Some(decls) = self.imported_decls.get(&name) {
            if !decls.is_empty() {
                return decls.clone();
            }
        }
        if everywhere {
            if let Some(decls) = self.module_decls.get(&name) {
                return decls.clone();
            }
        }
        Vec::new()
    }

    /// A single unambiguous declaration, or a diagnosed error if zero or
    /// more than one candidate resolves (overloaded callables are looked
    /// up through [`Self::find_decls`] instead, which tolerates many).
    pub fn find_decl(&self, name: Symbol, span: Span, everywhere: bool, display: &str) -> Result<DeclId, Diagnostic> {
        let decls = self.find_decls(name, everywhere);
        match decls.len() {
            0 => Err(Diagnostic::error(format!("unknown identifier '{display}'"), span)),
            1 => Ok(decls[0]),
            _ => Err(Diagnostic::error(
                format!("ambiguous reference to '{display}'"),
                span,
            )),
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talonc_base::Interner;

    #[test]
    fn lexical_scope_shadows_module_scope() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let name = interner.intern("x");
        let module_decl = DeclId(0);
        let local_decl = DeclId(1);
        table.publish(name, module_decl);
        table.push_scope();
        table.bind_local(name, local_decl);
        assert_eq!(table.find_decls(name, false), vec![local_decl]);
        table.pop_scope();
        assert_eq!(table.find_decls(name, false), vec![module_decl]);
    }

    #[test]
    fn everywhere_flag_reaches_module_decls_not_imported_locally() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let name = interner.intern("helper");
        table.publish(name, DeclId(5));
        table.begin_file();
        assert!(table.find_decls(name, false).is_empty());
        assert_eq!(table.find_decls(name, true), vec![DeclId(5)]);
    }

    #[test]
    fn find_decl_errors_on_unknown_identifier() {
        let mut interner = Interner::new();
        let table = SymbolTable::new();
        let name = interner.intern("missing");
        let err = table
            .find_decl(name, Span::new(0, 1), false, "missing")
            .unwrap_err();
        assert!(err.message.contains("unknown identifier"));
    }

    #[test]
    fn find_decl_errors_on_ambiguous_overloaded_name_when_used_unambiguously() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let name = interner.intern("f");
        table.publish(name, DeclId(1));
        table.publish(name, DeclId(2));
        let err = table.find_decl(name, Span::new(0, 1), false, "f").unwrap_err();
        assert!(err.message.contains("ambiguous"));
    }

    #[test]
    fn identifier_replacement_is_consulted_before_lookup() {
        let mut interner = Interner::new();
        let mut table = SymbolTable::new();
        let alias = interner.intern("Self");
        let real = interner.intern("MyType");
        table.publish(real, DeclId(9));
        table.add_identifier_replacement(alias, real);
        assert_eq!(table.find_decls(alias, false), vec![DeclId(9)]);
    }
}
