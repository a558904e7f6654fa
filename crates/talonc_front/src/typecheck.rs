//! The type checker (C7): name resolution, expression typing, implicit
//! conversions, overload resolution, and generic instantiation.

use std::collections::HashMap;

use talonc_ast::*;
use talonc_base::{Diagnostic, DiagnosticBag, Span, Symbol};
use talonc_types::{ArraySize, Type, TypeInterner};

use crate::scope::SymbolTable;

type TResult<T> = Result<T, ()>;

/// Restores the previous generic-argument substitution (and
/// `typechecking_generic_function` flag) unconditionally once `f` returns,
/// on every exit path including an `Err` return from inside `f`. A literal
/// `Drop`-based guard holding `&mut self.generic_args` was tried first but
/// is incompatible with `f` itself needing `&mut self` for the recursive
/// typecheck call; this closure-scoped save/restore is the Rust-shaped
/// translation of the `StateSaver<T>` pattern for that reason.
fn with_generic_args<R>(
    checker: &mut TypeChecker<'_>,
    new_args: HashMap<Symbol, Type>,
    f: impl FnOnce(&mut TypeChecker<'_>) -> R,
) -> R {
    let saved = std::mem::replace(&mut checker.generic_args, new_args);
    let saved_flag = checker.typechecking_generic_function;
    checker.typechecking_generic_function = true;
    let result = f(checker);
    checker.generic_args = saved;
    checker.typechecking_generic_function = saved_flag;
    result
}

pub struct TypeChecker<'a> {
    pub module: &'a mut Module,
    pub types: &'a mut TypeInterner,
    pub symbols: &'a SymbolTable,
    pub diagnostics: &'a mut DiagnosticBag,
    generic_args: HashMap<Symbol, Type>,
    typechecking_generic_function: bool,
    return_type_stack: Vec<Type>,
    loop_depth: u32,
    switch_depth: u32,
    function_depth: u32,
    /// `this`'s declared owner type and whether the enclosing method may
    /// write its fields; `None` outside of a method/init/deinit body.
    receiver: Option<(Type, bool)>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        module: &'a mut Module,
        types: &'a mut TypeInterner,
        symbols: &'a SymbolTable,
        diagnostics: &'a mut DiagnosticBag,
    ) -> Self {
        Self {
            module,
            types,
            symbols,
            diagnostics,
            generic_args: HashMap::new(),
            typechecking_generic_function: false,
            return_type_stack: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
            function_depth: 0,
            receiver: None,
        }
    }

    fn err<T>(&mut self, message: impl Into<String>, span: Span) -> TResult<T> {
        self.diagnostics.push(Diagnostic::error(message, span));
        Err(())
    }

    // -----------------------------------------------------------------
    // Module-level driving
    // -----------------------------------------------------------------

    /// Type-checks every non-generic top-level declaration. Generic
    /// functions/methods are checked lazily, once per distinct instantiation,
    /// the first time a call site triggers them — see `typechecking_generic_function`.
    pub fn typecheck_module(&mut self) {
        let ids: Vec<DeclId> = self.module.decl_ids().collect();
        self.typecheck_decls(&ids);
    }

    /// Typechecks exactly the given declarations, in order, swallowing
    /// per-declaration errors so one failing declaration does not prevent
    /// its siblings from being checked (best-effort diagnostics). Used by
    /// the session facade to exclude declarations belonging to a file
    /// whose parse aborted.
    pub fn typecheck_decls(&mut self, ids: &[DeclId]) {
        for &id in ids {
            let _ = self.typecheck_decl(id);
        }
    }

    fn typecheck_decl(&mut self, id: DeclId) -> TResult<()> {
        match self.module.decl(id).kind.clone_shape() {
            DeclShape::Function { generic_params, return_type, params, body } => {
                if !generic_params.is_empty() {
                    return Ok(());
                }
                self.typecheck_callable_body(params, return_type, &body, None)
            }
            DeclShape::Method {
                owner,
                generic_params,
                return_type,
                params,
                body,
                mutating,
            } => {
                if !generic_params.is_empty() {
                    return Ok(());
                }
                let Some(body) = body else { return Ok(()) };
                let owner_ty = self.named_type_of_decl(owner);
                let prev_receiver = self.receiver.replace((owner_ty, mutating));
                let result = self.typecheck_callable_body(params, return_type, &body, Some(owner));
                self.receiver = prev_receiver;
                result
            }
            DeclShape::Init { owner, params, body } => {
                let owner_ty = self.named_type_of_decl(owner);
                let prev_receiver = self.receiver.replace((owner_ty, true));
                let void = self.types.void();
                let result = self.typecheck_callable_body(params, void, &body, Some(owner));
                self.receiver = prev_receiver;
                result
            }
            DeclShape::Deinit { owner, body } => {
                let owner_ty = self.named_type_of_decl(owner);
                let prev_receiver = self.receiver.replace((owner_ty, true));
                let void = self.types.void();
                let result = self.typecheck_callable_body(Vec::new(), void, &body, Some(owner));
                self.receiver = prev_receiver;
                result
            }
            DeclShape::Var { declared_type, initializer } => {
                self.typecheck_var_decl(id, declared_type, initializer)
            }
            DeclShape::Other => Ok(()),
        }
    }

    fn typecheck_var_decl(&mut self, id: DeclId, declared_type: Option<Type>, initializer: Option<ExprId>) -> TResult<()> {
        let span = self.module.decl(id).span;
        let Some(init_id) = initializer else { return Ok(()) };
        let init_ty = self.typecheck_expr(init_id)?;
        let final_ty = match declared_type {
            Some(declared) => {
                self.convert_expr(init_id, declared, span)?;
                declared
            }
            None => init_ty,
        };
        if let DeclKind::Var(v) = &mut self.module.decl_mut(id).kind {
            v.declared_type = Some(final_ty);
        }
        Ok(())
    }

    fn typecheck_callable_body(
        &mut self,
        params: Vec<DeclId>,
        return_type: Type,
        body: &[StmtId],
        _owner: Option<DeclId>,
    ) -> TResult<()> {
        self.return_type_stack.push(return_type);
        self.function_depth += 1;
        let mut ok = true;
        for &param_id in &params {
            // Parameter types are already resolved by the parser; nothing
            // further to typecheck, but leaving the loop here documents
            // that every param contributes to this scope (used by name
            // resolution via the symbol table, populated during parsing).
            let _ = param_id;
        }
        for &stmt_id in body {
            if self.typecheck_stmt(stmt_id).is_err() {
                ok = false;
            }
        }
        self.function_depth -= 1;
        self.return_type_stack.pop();
        if ok {
            Ok(())
        } else {
            Err(())
        }
    }

    fn named_type_of_decl(&mut self, owner: DeclId) -> Type {
        if let DeclKind::Type(t) = &self.module.decl(owner).kind {
            let name = t.name;
            self.types.basic_sym(name, Vec::new(), false)
        } else {
            self.types.void()
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn typecheck_stmt(&mut self, id: StmtId) -> TResult<()> {
        let span = self.module.stmt(id).span;
        match self.module.stmt(id).kind.clone() {
            StmtKind::Return { values } => {
                let expected = self
                    .return_type_stack
                    .last()
                    .copied()
                    .unwrap_or_else(|| self.types.void());
                match values.len() {
                    0 => {
                        if !expected.is_void(self.types) {
                            return self.err("missing return value", span);
                        }
                    }
                    1 => {
                        self.typecheck_expr(values[0])?;
                        self.convert_expr(values[0], expected, span)?;
                    }
                    _ => {
                        let mut tys = Vec::new();
                        for &v in &values {
                            tys.push(self.typecheck_expr(v)?);
                        }
                        let tuple = self.types.tuple(tys, false);
                        if tuple != expected {
                            return self.err("return value does not match declared return type", span);
                        }
                    }
                }
                Ok(())
            }
            StmtKind::VarDecl { decl } => self.typecheck_decl(decl),
            StmtKind::Increment { operand } | StmtKind::Decrement { operand } => {
                let ty = self.typecheck_expr(operand)?;
                self.require_mutable_lvalue(operand, span)?;
                if !ty.is_integer(self.types) {
                    return self.err("'++'/'--' require an integer operand", span);
                }
                Ok(())
            }
            StmtKind::Expr { expr } => {
                self.typecheck_expr(expr)?;
                Ok(())
            }
            StmtKind::Discard { expr } => {
                self.typecheck_expr(expr)?;
                Ok(())
            }
            StmtKind::Defer { call } => {
                if self.function_depth == 0 {
                    return self.err("'defer' is only valid inside a function body", span);
                }
                self.typecheck_expr(call)?;
                Ok(())
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.typecheck_expr(condition)?;
                let bool_ty = self.types.bool();
                self.convert_expr(condition, bool_ty, span)?;
                let mut ok = true;
                for &s in &then_branch {
                    if self.typecheck_stmt(s).is_err() {
                        ok = false;
                    }
                }
                for &s in &else_branch {
                    if self.typecheck_stmt(s).is_err() {
                        ok = false;
                    }
                }
                if ok { Ok(()) } else { Err(()) }
            }
            StmtKind::Switch { subject, cases } => {
                let subject_ty = self.typecheck_expr(subject)?;
                self.switch_depth += 1;
                let mut ok = true;
                for case in &cases {
                    if let Some(value) = case.value {
                        if self.typecheck_expr(value).is_err() {
                            ok = false;
                        } else if self.convert_expr(value, subject_ty, span).is_err() {
                            ok = false;
                        }
                    }
                    for &s in &case.body {
                        if self.typecheck_stmt(s).is_err() {
                            ok = false;
                        }
                    }
                }
                self.switch_depth -= 1;
                if ok { Ok(()) } else { Err(()) }
            }
            StmtKind::While { condition, body } => {
                self.typecheck_expr(condition)?;
                let bool_ty = self.types.bool();
                self.convert_expr(condition, bool_ty, span)?;
                self.loop_depth += 1;
                let mut ok = true;
                for &s in &body {
                    if self.typecheck_stmt(s).is_err() {
                        ok = false;
                    }
                }
                self.loop_depth -= 1;
                if ok { Ok(()) } else { Err(()) }
            }
            StmtKind::For { variable_decl, range, body, .. } => {
                let range_ty = self.typecheck_expr(range)?;
                if !range_ty.is_range(self.types) {
                    return self.err("'for ... in' requires a range expression", span);
                }
                let element = range_ty.element_type(self.types);
                if let (Some(element), DeclKind::Var(v)) = (element, &mut self.module.decl_mut(variable_decl).kind) {
                    v.declared_type = Some(element);
                }
                self.loop_depth += 1;
                let mut ok = true;
                for &s in &body {
                    if self.typecheck_stmt(s).is_err() {
                        ok = false;
                    }
                }
                self.loop_depth -= 1;
                if ok { Ok(()) } else { Err(()) }
            }
            StmtKind::Break => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return self.err("'break' outside a loop or switch", span);
                }
                Ok(())
            }
            StmtKind::Assign { target, value } => {
                let target_ty = self.typecheck_expr(target)?;
                self.typecheck_expr(value)?;
                self.require_mutable_lvalue(target, span)?;
                self.convert_expr(value, target_ty, span)?;
                Ok(())
            }
            StmtKind::CompoundAssign { target, value, .. } => {
                let target_ty = self.typecheck_expr(target)?;
                self.typecheck_expr(value)?;
                self.require_mutable_lvalue(target, span)?;
                self.convert_expr(value, target_ty, span)?;
                Ok(())
            }
        }
    }

    fn require_mutable_lvalue(&mut self, expr_id: ExprId, span: Span) -> TResult<()> {
        if !self.module.expr(expr_id).is_lvalue() {
            return self.err("assignment target must be an lvalue", span);
        }
        let ty = self.module.expr(expr_id).resolved_type.unwrap_or_else(|| self.types.void());
        if !ty.is_mutable(self.types) {
            return self.err("cannot assign through an immutable binding", span);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    pub fn typecheck_expr(&mut self, id: ExprId) -> TResult<Type> {
        let span = self.module.expr(id).span;
        let kind = self.module.expr(id).kind.clone();
        let ty = match kind {
            ExprKind::Var { name, .. } => self.typecheck_var_expr(id, name, span)?,
            ExprKind::IntLiteral { value } => self.typecheck_int_literal(value, span)?,
            ExprKind::FloatLiteral { .. } => self.types.float64(),
            ExprKind::BoolLiteral { .. } => self.types.bool(),
            ExprKind::StringLiteral { .. } => self.types.string(),
            ExprKind::NullLiteral => self.types.null(),
            ExprKind::ArrayLiteral { elements } => self.typecheck_array_literal(&elements, span)?,
            ExprKind::Call(_) => self.typecheck_call(id, span)?,
            ExprKind::Cast { target, expr } => self.typecheck_cast(target, expr, span)?,
            ExprKind::Member { base, member } => self.typecheck_member(base, member, span)?,
            ExprKind::Unwrap { operand } => self.typecheck_unwrap(operand, span)?,
        };
        self.module.expr_mut(id).resolved_type = Some(ty);
        Ok(ty)
    }

    fn typecheck_var_expr(&mut self, id: ExprId, name: Symbol, span: Span) -> TResult<Type> {
        let name_str = self.types.name_str(name).to_owned();
        if name_str == "this" {
            let Some((ty, _)) = self.receiver else {
                return self.err("'this' is only valid inside a method, initializer, or deinitializer", span);
            };
            return Ok(ty);
        }
        let everywhere = self.typechecking_generic_function;
        let decl_id = match self.symbols.find_decl(name, span, everywhere, &name_str) {
            Ok(d) => d,
            Err(diag) => {
                self.diagnostics.push(diag);
                return Err(());
            }
        };
        if let ExprKind::Var { decl, .. } = &mut self.module.expr_mut(id).kind {
            *decl = Some(decl_id);
        }
        self.decl_type(decl_id, span)
    }

    /// The type an identifier resolves to, per the `Var` typing rule: a
    /// field accessed implicitly through `this` in a non-mutating method
    /// is returned as immutable.
    fn decl_type(&mut self, decl_id: DeclId, span: Span) -> TResult<Type> {
        match self.module.decl(decl_id).kind.clone() {
            DeclKind::Var(v) => v.declared_type.ok_or(()).or_else(|_| self.err("use of variable with no resolved type", span)),
            DeclKind::Param(p) => Ok(p.ty),
            DeclKind::Field(f) => {
                let mutating = self.receiver.map(|(_, m)| m).unwrap_or(true);
                if mutating {
                    Ok(f.declared_type)
                } else {
                    Ok(self.types.as_immutable(f.declared_type))
                }
            }
            DeclKind::Function(_) | DeclKind::Method(_) | DeclKind::Type(_) => {
                self.err("expected a value, found a callable/type name used without a call", span)
            }
            _ => self.err("identifier does not name a value", span),
        }
    }

    fn typecheck_int_literal(&mut self, value: i64, _span: Span) -> TResult<Type> {
        if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            Ok(self.types.int())
        } else {
            Ok(self.types.int64())
        }
    }

    fn typecheck_array_literal(&mut self, elements: &[ExprId], span: Span) -> TResult<Type> {
        if elements.is_empty() {
            return self.err("array literal must have at least one element", span);
        }
        let first_ty = self.typecheck_expr(elements[0])?;
        for &e in &elements[1..] {
            self.typecheck_expr(e)?;
            self.convert_expr(e, first_ty, span)?;
        }
        Ok(self.types.array(first_ty, ArraySize::Fixed(elements.len() as i64), true))
    }

    fn typecheck_cast(&mut self, target: Type, expr_id: ExprId, span: Span) -> TResult<Type> {
        let source = self.typecheck_expr(expr_id)?;
        let bool_ty = self.types.bool();
        if source == bool_ty && target.is_integer(self.types) {
            return Ok(target);
        }
        if source.is_pointer(self.types) && target.is_pointer(self.types) {
            let source_is_void = source.pointee(self.types).map(|p| p.is_basic_named(self.types, "void")).unwrap_or(false);
            let target_is_void = target.pointee(self.types).map(|p| p.is_basic_named(self.types, "void")).unwrap_or(false);
            if source_is_void || target_is_void {
                if !source.is_mutable(self.types) && target.is_mutable(self.types) {
                    return self.err("cast cannot fabricate mutability from an immutable pointer", span);
                }
                return Ok(target);
            }
        }
        self.err(
            format!("unsupported cast to '{}'", target.name(self.types).unwrap_or("<type>")),
            span,
        )
    }

    fn typecheck_unwrap(&mut self, operand: ExprId, span: Span) -> TResult<Type> {
        let ty = self.typecheck_expr(operand)?;
        if !ty.is_nullable_pointer(self.types) {
            return self.err("'!' may only unwrap a nullable pointer", span);
        }
        let pointee = ty.pointee(self.types).unwrap();
        Ok(self.types.pointer(pointee, true, ty.is_mutable(self.types)))
    }

    fn typecheck_member(&mut self, base: ExprId, member: Symbol, span: Span) -> TResult<Type> {
        let base_ty = self.typecheck_expr(base)?;
        let member_str = self.types.name_str(member).to_owned();
        let (effective, mutable_propagated) = self.deref_for_member_access(base_ty, span)?;
        if effective.is_array(self.types) || effective.is_string(self.types) {
            if member_str == "count" {
                return Ok(self.types.int());
            }
            if member_str == "data" {
                let elem = effective
                    .element_type(self.types)
                    .unwrap_or_else(|| self.types.char_ty());
                return Ok(self.types.pointer(elem, false, false));
            }
        }
        if let Some(name) = effective.named(self.types) {
            if let Some(owner_decl) = self.find_type_decl(name) {
                if let DeclKind::Type(t) = &self.module.decl(owner_decl).kind {
                    for &field_id in &t.fields {
                        if let DeclKind::Field(f) = &self.module.decl(field_id).kind {
                            if f.name == member {
                                let ty = f.declared_type;
                                return Ok(if mutable_propagated && f.is_mutable {
                                    self.types.as_mutable(ty)
                                } else {
                                    self.types.as_immutable(ty)
                                });
                            }
                        }
                    }
                }
            }
        }
        self.err(format!("no member named '{}'", member_str), span)
    }

    /// `T&` auto-derefs to `T` for member access; `T*` is an error (use `!`
    /// or declare the binding as `T&`).
    fn deref_for_member_access(&mut self, ty: Type, span: Span) -> TResult<(Type, bool)> {
        if ty.is_nullable_pointer(self.types) {
            return self.err(
                format!(
                    "cannot access member through pointer '{}', pointer may be null",
                    ty.name(self.types).unwrap_or("<type>")
                ),
                span,
            );
        }
        if ty.is_reference(self.types) {
            let pointee = ty.pointee(self.types).unwrap();
            return Ok((pointee, ty.is_mutable(self.types)));
        }
        Ok((ty, ty.is_mutable(self.types)))
    }

    fn find_type_decl(&self, name: Symbol) -> Option<DeclId> {
        for id in self.module.decl_ids() {
            if let DeclKind::Type(t) = &self.module.decl(id).kind {
                if t.name == name {
                    return Some(id);
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------

    fn typecheck_call(&mut self, call_expr_id: ExprId, span: Span) -> TResult<Type> {
        let (callee_id, args, generic_arg_list, kind) = match self.module.expr(call_expr_id).kind.clone() {
            ExprKind::Call(c) => (c.callee, c.args, c.generic_args, c.kind),
            _ => unreachable!("typecheck_call invoked on a non-Call expression"),
        };

        // Operators are overloadable (the grammar allows `func +(...)`), so a
        // user declaration with the operator's spelling always wins; the
        // built-in rules below are only the fallback for primitive operands.
        match kind {
            CallKind::Prefix(op) => {
                let name = self.intern(op.function_name());
                let everywhere = self.typechecking_generic_function;
                let candidates = self.symbols.find_decls(name, everywhere);
                if candidates.is_empty() {
                    return self.builtin_prefix(op, &args, span);
                }
                let expanded = self.expand_constructor_candidates(&candidates);
                return self.resolve_and_apply(call_expr_id, &expanded, &args, &generic_arg_list, None, span);
            }
            CallKind::Binary(op) => {
                let name = self.intern(op.function_name());
                let everywhere = self.typechecking_generic_function;
                let candidates = self.symbols.find_decls(name, everywhere);
                if candidates.is_empty() {
                    return self.builtin_binary(op, &args, span);
                }
                let expanded = self.expand_constructor_candidates(&candidates);
                return self.resolve_and_apply(call_expr_id, &expanded, &args, &generic_arg_list, None, span);
            }
            CallKind::Subscript => {
                let ExprKind::Member { base, member } = self.module.expr(callee_id).kind.clone() else {
                    return self.err("malformed subscript expression", span);
                };
                return self.typecheck_subscript(call_expr_id, base, member, &args, span);
            }
            CallKind::Plain => {}
        }

        match self.module.expr(callee_id).kind.clone() {
            ExprKind::Member { base, member } => {
                self.typecheck_method_call(call_expr_id, base, member, &args, &generic_arg_list, span)
            }
            ExprKind::Var { name, .. } => self.typecheck_free_call(call_expr_id, name, &args, &generic_arg_list, span),
            _ => self.err("expression is not callable", span),
        }
    }

    fn typecheck_subscript(&mut self, call_expr_id: ExprId, base: ExprId, member: Symbol, args: &[Argument], span: Span) -> TResult<Type> {
        let base_ty = self.typecheck_expr(base)?;
        if args.len() != 1 {
            return self.err("subscript takes exactly one index argument", span);
        }
        let index_expr = args[0].value;
        self.typecheck_expr(index_expr)?;

        if base_ty.is_array(self.types) {
            let int_ty = self.types.int();
            self.convert_expr(index_expr, int_ty, span)?;
            if let (ExprKind::IntLiteral { value }, Some(ArraySize::Fixed(size))) =
                (self.module.expr(index_expr).kind.clone(), base_ty.array_size(self.types))
            {
                if value < 0 || value >= size {
                    return self.err(
                        format!("accessing array out-of-bounds with index {value}, array size is {size}"),
                        span,
                    );
                }
            }
            let elem = base_ty.element_type(self.types).unwrap();
            return Ok(self.types.set_mutable(elem, base_ty.is_mutable(self.types)));
        }

        let (receiver_ty, _) = self.deref_for_member_access(base_ty, span)?;
        let Some(type_name) = receiver_ty.named(self.types) else {
            return self.err("type does not support subscripting", span);
        };
        let mangled = self.intern(&format!("{}.{}", self.types.name_str(type_name), self.types.name_str(member)));
        let everywhere = self.typechecking_generic_function;
        let candidates = self.symbols.find_decls(mangled, everywhere);
        if candidates.is_empty() {
            return self.err(format!("no '[]' operator defined on '{}'", self.types.name_str(type_name)), span);
        }
        self.resolve_and_apply(call_expr_id, &candidates, args, &[], Some(receiver_ty), span)
    }

    fn builtin_prefix(&mut self, op: PrefixOp, args: &[Argument], span: Span) -> TResult<Type> {
        let operand = args[0].value;
        let ty = self.typecheck_expr(operand)?;
        match op {
            PrefixOp::Not => {
                let bool_ty = self.types.bool();
                if ty != bool_ty {
                    return self.err("'!' requires a bool operand", span);
                }
                Ok(bool_ty)
            }
            PrefixOp::Deref => {
                if !ty.is_pointer(self.types) {
                    return self.err("'*' requires a pointer operand", span);
                }
                Ok(ty.pointee(self.types).unwrap())
            }
            PrefixOp::AddressOf => {
                if !self.module.expr(operand).is_lvalue() {
                    return self.err("'&' requires an lvalue operand", span);
                }
                Ok(self.types.pointer(ty, true, ty.is_mutable(self.types)))
            }
            PrefixOp::Negate | PrefixOp::Plus => {
                if !ty.is_integer(self.types) && !ty.is_floating_point(self.types) {
                    return self.err("unary '+'/'-' require a numeric operand", span);
                }
                Ok(ty)
            }
            PrefixOp::BitNot => {
                if !ty.is_integer(self.types) {
                    return self.err("'~' requires an integer operand", span);
                }
                Ok(ty)
            }
        }
    }

    fn builtin_binary(&mut self, op: BinaryOp, args: &[Argument], span: Span) -> TResult<Type> {
        let (lhs, rhs) = (args[0].value, args[1].value);
        let lhs_ty = self.typecheck_expr(lhs)?;
        let rhs_ty = self.typecheck_expr(rhs)?;

        if op.is_range() {
            self.convert_expr(rhs, lhs_ty, span)?;
            return Ok(self.types.range(lhs_ty, op == BinaryOp::RangeInclusive, false));
        }
        if op.is_logical() {
            let bool_ty = self.types.bool();
            self.convert_expr(lhs, bool_ty, span)?;
            self.convert_expr(rhs, bool_ty, span)?;
            return Ok(bool_ty);
        }
        if op.is_comparison() {
            if self.convert_expr(rhs, lhs_ty, span).is_err() && self.convert_expr(lhs, rhs_ty, span).is_err() {
                return self.err("comparison operands must have compatible types", span);
            }
            return Ok(self.types.bool());
        }
        if op.is_bitwise() && (lhs_ty.is_floating_point(self.types) || rhs_ty.is_floating_point(self.types)) {
            return self.err("bitwise operators are forbidden on floating-point operands", span);
        }
        if op.is_arithmetic() || op.is_bitwise() {
            return self.common_arithmetic_type(lhs, lhs_ty, rhs, rhs_ty, span);
        }
        self.err("unsupported binary operator", span)
    }

    fn common_arithmetic_type(&mut self, lhs: ExprId, lhs_ty: Type, rhs: ExprId, rhs_ty: Type, span: Span) -> TResult<Type> {
        if self.convert_expr(rhs, lhs_ty, span).is_ok() {
            return Ok(lhs_ty);
        }
        if self.convert_expr(lhs, rhs_ty, span).is_ok() {
            return Ok(rhs_ty);
        }
        self.err("operands to arithmetic/bitwise operator are not convertible to a common type", span)
    }

    fn typecheck_free_call(
        &mut self,
        call_expr_id: ExprId,
        name: Symbol,
        args: &[Argument],
        generic_arg_list: &[Type],
        span: Span,
    ) -> TResult<Type> {
        let name_str = self.types.name_str(name).to_owned();
        if name_str == "sizeOf" {
            if args.is_empty() && generic_arg_list.len() == 1 {
                return Ok(self.types.uint64());
            }
            return self.err("sizeOf<T>() takes one generic argument and no value arguments", span);
        }
        if talonc_types::is_builtin_scalar(&name_str) && args.len() == 1 && generic_arg_list.is_empty() {
            let arg_ty = self.typecheck_expr(args[0].value)?;
            if arg_ty.is_integer(self.types) || arg_ty.is_floating_point(self.types) || arg_ty.is_bool(self.types) {
                return Ok(self.types.basic(&name_str, Vec::new(), false));
            }
            return self.err(format!("cannot convert to '{name_str}'"), span);
        }

        let everywhere = self.typechecking_generic_function;
        let candidates = self.symbols.find_decls(name, everywhere);
        if candidates.is_empty() {
            return self.err(format!("unknown identifier '{name_str}'"), span);
        }
        let expanded = self.expand_constructor_candidates(&candidates);
        self.resolve_and_apply(call_expr_id, &expanded, args, generic_arg_list, None, span)
    }

    fn typecheck_method_call(
        &mut self,
        call_expr_id: ExprId,
        base: ExprId,
        member: Symbol,
        args: &[Argument],
        generic_arg_list: &[Type],
        span: Span,
    ) -> TResult<Type> {
        let base_ty = self.typecheck_expr(base)?;
        let member_str = self.types.name_str(member).to_owned();

        if member_str == "offsetUnsafely" && base_ty.is_pointer(self.types) {
            if args.len() != 1 {
                return self.err("offsetUnsafely(n: int64) takes exactly one argument", span);
            }
            let arg_ty = self.typecheck_expr(args[0].value)?;
            let i64_ty = self.types.int64();
            self.convert_expr(args[0].value, i64_ty, span)?;
            let _ = arg_ty;
            return Ok(base_ty);
        }

        let (receiver_ty, _) = self.deref_for_member_access(base_ty, span)?;
        let Some(type_name) = receiver_ty.named(self.types) else {
            return self.err(format!("no method named '{member_str}' on this type"), span);
        };
        let mangled = self.intern(&format!("{}.{}", self.types.name_str(type_name), member_str));
        let everywhere = self.typechecking_generic_function;
        let candidates = self.symbols.find_decls(mangled, everywhere);
        if candidates.is_empty() {
            return self.err(format!("no method named '{member_str}' on '{}'", self.types.name_str(type_name)), span);
        }
        self.resolve_and_apply(call_expr_id, &candidates, args, generic_arg_list, Some(receiver_ty), span)
    }

    fn intern(&mut self, s: &str) -> Symbol {
        self.types.names().intern(s)
    }

    /// `TypeDecl` candidates represent constructor calls; expand each to
    /// its `TypeName.init` initializer declarations (zero or more).
    fn expand_constructor_candidates(&mut self, candidates: &[DeclId]) -> Vec<DeclId> {
        let mut out = Vec::new();
        for &c in candidates {
            if let DeclKind::Type(t) = &self.module.decl(c).kind {
                if t.inits.is_empty() {
                    out.push(c);
                } else {
                    out.extend(t.inits.iter().copied());
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn resolve_and_apply(
        &mut self,
        call_expr_id: ExprId,
        candidates: &[DeclId],
        args: &[Argument],
        generic_arg_list: &[Type],
        receiver_ty: Option<Type>,
        span: Span,
    ) -> TResult<Type> {
        let callables: Vec<DeclId> = candidates
            .iter()
            .copied()
            .filter(|&c| matches!(self.module.decl(c).kind, DeclKind::Function(_) | DeclKind::Method(_) | DeclKind::Init(_)))
            .collect();
        if callables.is_empty() {
            return self.err("not a callable declaration", span);
        }

        let arg_types: Vec<Type> = {
            let mut tys = Vec::with_capacity(args.len());
            for a in args {
                tys.push(self.typecheck_expr(a.value)?);
            }
            tys
        };

        let winner = if callables.len() == 1 {
            callables[0]
        } else {
            self.pick_among_candidates(&callables, args, &arg_types, span)?
        };

        let (params, return_type, generic_params) = self.callable_signature(winner);

        let substitution = if generic_params.is_empty() {
            HashMap::new()
        } else {
            self.build_generic_substitution(&generic_params, &params, &arg_types, generic_arg_list, span)?
        };

        self.validate_args_strict(&params, args, &arg_types, &substitution, span)?;

        let resolved_return = self.resolve_type(return_type, &substitution);

        if !generic_params.is_empty() {
            with_generic_args(self, substitution, |checker| {
                checker.typecheck_callable_decl_body(winner);
            });
        }

        if let ExprKind::Call(call) = &mut self.module.expr_mut(call_expr_id).kind {
            call.resolved_callee = Some(winner);
            call.receiver_type = receiver_ty;
        }

        Ok(resolved_return)
    }

    fn typecheck_callable_decl_body(&mut self, decl_id: DeclId) {
        match self.module.decl(decl_id).kind.clone_shape() {
            DeclShape::Function { return_type, body, .. } => {
                let _ = self.typecheck_callable_body(Vec::new(), return_type, &body, None);
            }
            DeclShape::Method { return_type, body: Some(body), owner, mutating, .. } => {
                let owner_ty = self.named_type_of_decl(owner);
                let prev = self.receiver.replace((owner_ty, mutating));
                let _ = self.typecheck_callable_body(Vec::new(), return_type, &body, Some(owner));
                self.receiver = prev;
            }
            _ => {}
        }
    }

    /// An initializer's "return type" for overload-resolution purposes is
    /// the type it constructs, since `init` declares no `return_type` of
    /// its own (it always produces its owner).
    fn callable_signature(&mut self, decl_id: DeclId) -> (Vec<DeclId>, Type, Vec<DeclId>) {
        match self.module.decl(decl_id).kind.clone() {
            DeclKind::Function(f) => (f.params, f.return_type, f.generic_params),
            DeclKind::Method(m) => (m.params, m.return_type, m.generic_params),
            DeclKind::Init(i) => {
                let owner_ty = self.named_type_of_decl(i.owner);
                (i.params, owner_ty, Vec::new())
            }
            _ => unreachable!("callable_signature invoked on a non-callable declaration"),
        }
    }

    fn pick_among_candidates(&mut self, candidates: &[DeclId], args: &[Argument], arg_types: &[Type], span: Span) -> TResult<DeclId> {
        let mut matches = Vec::new();
        for &c in candidates {
            if self.candidate_matches(c, args, arg_types) {
                matches.push(c);
            }
        }
        if matches.is_empty() {
            return self.err("no matching overload for this call", span);
        }
        if matches.len() == 1 {
            return Ok(matches[0]);
        }
        let std_sym = self.intern("std");
        if let Some(&std_match) = matches.iter().find(|&&c| self.decl_module(c) == Some(std_sym)) {
            return Ok(std_match);
        }
        self.err("ambiguous call: multiple overloads match", span)
    }

    fn candidate_matches(&mut self, decl_id: DeclId, args: &[Argument], arg_types: &[Type]) -> bool {
        let (params, _, _) = self.callable_signature(decl_id);
        if params.len() != args.len() {
            return false;
        }
        for (i, &param_id) in params.iter().enumerate() {
            let DeclKind::Param(p) = self.module.decl(param_id).kind.clone() else { return false };
            if let Some(name) = args[i].name {
                if name != p.name {
                    return false;
                }
            }
            if !self.is_implicitly_convertible_type(arg_types[i], p.ty) {
                return false;
            }
        }
        true
    }

    fn decl_module(&self, decl_id: DeclId) -> Option<Symbol> {
        self.module.decl(decl_id).module()
    }

    fn validate_args_strict(
        &mut self,
        params: &[DeclId],
        args: &[Argument],
        arg_types: &[Type],
        substitution: &HashMap<Symbol, Type>,
        span: Span,
    ) -> TResult<()> {
        if params.len() != args.len() {
            return self.err(
                format!("expected {} argument(s), found {}", params.len(), args.len()),
                span,
            );
        }
        for (i, &param_id) in params.iter().enumerate() {
            let (param_name, param_ty) = match self.module.decl(param_id).kind.clone() {
                DeclKind::Param(p) => (p.name, p.ty),
                _ => return self.err("malformed parameter declaration", span),
            };
            if let Some(arg_name) = args[i].name {
                if arg_name != param_name {
                    return self.err(
                        format!(
                            "argument {} named '{}' does not match parameter '{}'",
                            i + 1,
                            self.types.name_str(arg_name),
                            self.types.name_str(param_name)
                        ),
                        span,
                    );
                }
            }
            let target = self.resolve_type(param_ty, substitution);
            let _ = arg_types[i];
            self.convert_expr(args[i].value, target, args[i].span)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Generics
    // -----------------------------------------------------------------

    fn build_generic_substitution(
        &mut self,
        generic_params: &[DeclId],
        params: &[DeclId],
        arg_types: &[Type],
        explicit: &[Type],
        span: Span,
    ) -> TResult<HashMap<Symbol, Type>> {
        let mut substitution = HashMap::new();
        if !explicit.is_empty() {
            if explicit.len() != generic_params.len() {
                return self.err("generic argument count does not match declaration", span);
            }
            for (i, &gp) in generic_params.iter().enumerate() {
                if let DeclKind::GenericParam(g) = &self.module.decl(gp).kind {
                    substitution.insert(g.name, explicit[i]);
                }
            }
        } else {
            for &gp in generic_params {
                let DeclKind::GenericParam(g) = self.module.decl(gp).kind.clone() else { continue };
                let mut inferred = None;
                for (i, &param_id) in params.iter().enumerate() {
                    let DeclKind::Param(p) = self.module.decl(param_id).kind.clone() else { continue };
                    if p.ty.named(self.types) == Some(g.name) && p.ty.generic_args(self.types).is_empty() {
                        match inferred {
                            None => inferred = Some(arg_types[i]),
                            Some(prev) if prev != arg_types[i] => {
                                return self.err(
                                    format!("conflicting inference for generic parameter '{}'", self.types.name_str(g.name)),
                                    span,
                                );
                            }
                            _ => {}
                        }
                    }
                }
                match inferred {
                    Some(t) => {
                        substitution.insert(g.name, t);
                    }
                    None => {
                        return self.err(
                            format!("couldn't infer generic parameter '{}'", self.types.name_str(g.name)),
                            span,
                        );
                    }
                }
            }
        }
        for &gp in generic_params {
            let (gp_name, constraint) = match self.module.decl(gp).kind.clone() {
                DeclKind::GenericParam(g) => (g.name, g.constraint),
                _ => continue,
            };
            if let Some(interface_name) = constraint {
                let Some(&arg_ty) = substitution.get(&gp_name) else { continue };
                if !self.implements_interface(arg_ty, interface_name) {
                    return self.err(
                        format!(
                            "type does not implement required interface '{}'",
                            self.types.name_str(interface_name)
                        ),
                        span,
                    );
                }
            }
        }
        Ok(substitution)
    }

    /// Rewrites generic-parameter `Basic` nodes to their substitution,
    /// preserving each node's mutability bit; recurses into every compound
    /// variant including `Tuple` (a deliberate element-wise extension over
    /// the original's tuple `fatalError`, see the design notes).
    fn resolve_type(&mut self, ty: Type, substitution: &HashMap<Symbol, Type>) -> Type {
        if substitution.is_empty() {
            return ty;
        }
        let mutable = ty.is_mutable(self.types);
        if let Some(name) = ty.named(self.types) {
            if ty.generic_args(self.types).is_empty() {
                if let Some(&replacement) = substitution.get(&name) {
                    return self.types.set_mutable(replacement, mutable);
                }
            }
            let args: Vec<Type> = ty.generic_args(self.types).to_vec();
            if !args.is_empty() {
                let resolved_args: Vec<Type> = args.iter().map(|&a| self.resolve_type(a, substitution)).collect();
                return self.types.basic_sym(name, resolved_args, mutable);
            }
            return ty;
        }
        if let Some(pointee) = ty.pointee(self.types) {
            let resolved = self.resolve_type(pointee, substitution);
            let is_ref = ty.is_reference(self.types);
            return self.types.pointer(resolved, is_ref, mutable);
        }
        if ty.is_array(self.types) {
            let elem = ty.element_type(self.types).unwrap();
            let size = ty.array_size(self.types).unwrap();
            let resolved = self.resolve_type(elem, substitution);
            return self.types.array(resolved, size, mutable);
        }
        if ty.is_range(self.types) {
            let elem = ty.element_type(self.types).unwrap();
            let inclusive = ty.range_inclusive(self.types).unwrap();
            let resolved = self.resolve_type(elem, substitution);
            return self.types.range(resolved, inclusive, mutable);
        }
        if ty.is_function(self.types) {
            let ret = ty.return_type(self.types).unwrap();
            let resolved_ret = self.resolve_type(ret, substitution);
            let params: Vec<Type> = ty.param_types(self.types).to_vec();
            let resolved_params: Vec<Type> = params.iter().map(|&p| self.resolve_type(p, substitution)).collect();
            return self.types.function(resolved_ret, resolved_params, mutable);
        }
        if ty.is_tuple(self.types) {
            let subtypes: Vec<Type> = ty.tuple_subtypes(self.types).to_vec();
            let resolved: Vec<Type> = subtypes.iter().map(|&s| self.resolve_type(s, substitution)).collect();
            return self.types.tuple(resolved, mutable);
        }
        ty
    }

    fn implements_interface(&mut self, ty: Type, interface_name: Symbol) -> bool {
        let Some(interface_decl) = self.find_type_decl(interface_name) else { return false };
        let DeclKind::Type(interface) = self.module.decl(interface_decl).kind.clone() else { return false };
        if interface.kind != TypeDeclKind::Interface {
            return false;
        }
        let Some(type_name) = ty.named(self.types) else { return false };
        let Some(concrete_decl) = self.find_type_decl(type_name) else { return false };
        let DeclKind::Type(concrete) = self.module.decl(concrete_decl).kind.clone() else { return false };

        for &req_field in &interface.fields {
            let DeclKind::Field(req) = self.module.decl(req_field).kind.clone() else { return false };
            let found = concrete.fields.iter().any(|&f| {
                matches!(&self.module.decl(f).kind, DeclKind::Field(cf) if cf.name == req.name && cf.declared_type == req.declared_type)
            });
            if !found {
                return false;
            }
        }
        let this_sym = self.intern("This");
        for &req_method in &interface.methods {
            let DeclKind::Method(req) = self.module.decl(req_method).kind.clone() else { return false };
            let req_param_types: Vec<Type> = req
                .params
                .iter()
                .map(|&p| match &self.module.decl(p).kind {
                    DeclKind::Param(pd) => pd.ty,
                    _ => self.types.void(),
                })
                .collect();
            let found = concrete.methods.iter().any(|&m| {
                let DeclKind::Method(cm) = self.module.decl(m).kind.clone() else { return false };
                if cm.name != req.name || cm.params.len() != req.params.len() {
                    return false;
                }
                if !self.signature_return_matches(cm.return_type, req.return_type, this_sym, type_name) {
                    return false;
                }
                cm.params.iter().zip(req_param_types.iter()).all(|(&cp, &req_ty)| {
                    let concrete_ty = match &self.module.decl(cp).kind {
                        DeclKind::Param(pd) => pd.ty,
                        _ => return false,
                    };
                    self.signature_return_matches(concrete_ty, req_ty, this_sym, type_name)
                })
            });
            if !found {
                return false;
            }
        }
        true
    }

    /// Compares a concrete method's parameter or return type against an
    /// interface requirement's, treating the interface side's bare `This`
    /// as standing for the concrete type being checked for conformance.
    fn signature_return_matches(&mut self, concrete: Type, required: Type, this_sym: Symbol, concrete_type_name: Symbol) -> bool {
        if required.named(self.types) == Some(this_sym) {
            return concrete.named(self.types) == Some(concrete_type_name);
        }
        self.types_equal_ignoring_mutability(concrete, required)
    }

    // -----------------------------------------------------------------
    // Implicit conversions
    // -----------------------------------------------------------------

    /// Attempts to convert `expr_id`'s already-typed expression to `target`,
    /// in the priority order of §4.3. On success, narrowing literal
    /// conversions (integer/float) update the expression's resolved type.
    fn convert_expr(&mut self, expr_id: ExprId, target: Type, span: Span) -> TResult<()> {
        let source = self.module.expr(expr_id).resolved_type.unwrap_or_else(|| self.types.void());

        if self.move_guard_blocks(expr_id, source, target) {
            return self.err("move semantics not yet implemented", span);
        }

        if self.types_equal_ignoring_mutability(source, target) {
            if !source.is_mutable(self.types) && target.is_mutable(self.types) {
                return self.err("cannot convert an immutable value to a mutable one", span);
            }
            return Ok(());
        }

        if let Some(type_name) = target.named(self.types) {
            if self.is_interface(type_name) && self.implements_interface(source, type_name) {
                return Ok(());
            }
        }

        if matches!(self.module.expr(expr_id).kind, ExprKind::IntLiteral { .. }) {
            if target.is_integer(self.types) {
                let value = match self.module.expr(expr_id).kind {
                    ExprKind::IntLiteral { value } => value,
                    _ => unreachable!(),
                };
                if self.int_fits(value, target) {
                    self.module.expr_mut(expr_id).resolved_type = Some(target);
                    return Ok(());
                }
                return self.err("integer literal does not fit in target type", span);
            }
            if target.is_floating_point(self.types) {
                self.module.expr_mut(expr_id).resolved_type = Some(target);
                return Ok(());
            }
        }

        if source.is_null(self.types) && target.is_nullable_pointer(self.types) {
            return Ok(());
        }

        if matches!(self.module.expr(expr_id).kind, ExprKind::StringLiteral { .. }) {
            if let Some(pointee) = target.pointee(self.types) {
                if pointee.is_basic_named(self.types, "char") && !target.is_mutable(self.types) {
                    return Ok(());
                }
            }
        }

        if self.module.expr(expr_id).is_lvalue() {
            if let Some(pointee) = target.pointee(self.types) {
                if self.convert_expr(expr_id, pointee, span).is_ok() {
                    return Ok(());
                }
            }
        }

        self.err(
            format!(
                "cannot convert '{}' to '{}'",
                source.name(self.types).unwrap_or("<type>"),
                target.name(self.types).unwrap_or("<type>")
            ),
            span,
        )
    }

    fn is_implicitly_convertible_type(&mut self, source: Type, target: Type) -> bool {
        if self.types_equal_ignoring_mutability(source, target) {
            return !(!source.is_mutable(self.types) && target.is_mutable(self.types));
        }
        if let Some(type_name) = target.named(self.types) {
            if self.is_interface(type_name) && self.implements_interface(source, type_name) {
                return true;
            }
        }
        if source.is_integer(self.types) && (target.is_integer(self.types) || target.is_floating_point(self.types)) {
            return true;
        }
        if source.is_null(self.types) && target.is_nullable_pointer(self.types) {
            return true;
        }
        if source.is_string(self.types) {
            if let Some(pointee) = target.pointee(self.types) {
                if pointee.is_basic_named(self.types, "char") {
                    return true;
                }
            }
        }
        false
    }

    fn types_equal_ignoring_mutability(&mut self, a: Type, b: Type) -> bool {
        let a_immutable = self.types.as_immutable(a);
        let b_immutable = self.types.as_immutable(b);
        a_immutable == b_immutable
    }

    fn is_interface(&self, name: Symbol) -> bool {
        self.find_type_decl(name)
            .map(|d| matches!(&self.module.decl(d).kind, DeclKind::Type(t) if t.kind == TypeDeclKind::Interface))
            .unwrap_or(false)
    }

    fn int_fits(&self, value: i64, target: Type) -> bool {
        let Some(name) = target.name(self.types) else { return false };
        match name {
            "int8" => i8::try_from(value).is_ok(),
            "int16" => i16::try_from(value).is_ok(),
            "int32" | "int" => i32::try_from(value).is_ok(),
            "int64" => true,
            "uint8" => u8::try_from(value).is_ok(),
            "uint16" => u16::try_from(value).is_ok(),
            "uint32" | "uint" => u32::try_from(value).is_ok(),
            "uint64" => value >= 0,
            _ => false,
        }
    }

    /// True iff this lvalue names a `class` (reference semantics) with a
    /// user-declared `deinit`, and so is not yet movable by value. Value
    /// types (`struct`) and classes without a deinitializer are unaffected.
    fn move_guard_blocks(&mut self, expr_id: ExprId, source: Type, target: Type) -> bool {
        if !self.module.expr(expr_id).is_lvalue() {
            return false;
        }
        if target.is_pointer(self.types) {
            return false;
        }
        let Some(name) = source.named(self.types) else { return false };
        let Some(decl_id) = self.find_type_decl(name) else { return false };
        match &self.module.decl(decl_id).kind {
            DeclKind::Type(t) => t.kind == TypeDeclKind::Class && t.deinit.is_some(),
            _ => false,
        }
    }

}

/// A cheap, `Clone`-able shape extracted from a `DeclKind`, used so
/// `typecheck_decl` can match on owned data without holding a borrow of
/// `self.module` across the whole function body.
enum DeclShape {
    Function {
        generic_params: Vec<DeclId>,
        return_type: Type,
        params: Vec<DeclId>,
        body: Vec<StmtId>,
    },
    Method {
        owner: DeclId,
        generic_params: Vec<DeclId>,
        return_type: Type,
        params: Vec<DeclId>,
        body: Option<Vec<StmtId>>,
        mutating: bool,
    },
    Init {
        owner: DeclId,
        params: Vec<DeclId>,
        body: Vec<StmtId>,
    },
    Deinit {
        owner: DeclId,
        body: Vec<StmtId>,
    },
    Var {
        declared_type: Option<Type>,
        initializer: Option<ExprId>,
    },
    Other,
}

trait ExtractShape {
    fn clone_shape(&self) -> DeclShape;
}

impl ExtractShape for DeclKind {
    fn clone_shape(&self) -> DeclShape {
        match self {
            DeclKind::Function(f) => DeclShape::Function {
                generic_params: f.generic_params.clone(),
                return_type: f.return_type,
                params: f.params.clone(),
                body: f.body.clone(),
            },
            DeclKind::Method(m) => DeclShape::Method {
                owner: m.owner,
                generic_params: m.generic_params.clone(),
                return_type: m.return_type,
                params: m.params.clone(),
                body: m.body.clone(),
                mutating: m.mutating,
            },
            DeclKind::Init(i) => DeclShape::Init {
                owner: i.owner,
                params: i.params.clone(),
                body: i.body.clone(),
            },
            DeclKind::Deinit(d) => DeclShape::Deinit {
                owner: d.owner,
                body: d.body.clone(),
            },
            DeclKind::Var(v) => DeclShape::Var {
                declared_type: v.declared_type,
                initializer: v.initializer,
            },
            _ => DeclShape::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::parser::ParserContext;

    fn check_source(src: &str) -> (Module, TypeInterner, DiagnosticBag) {
        let mut types = TypeInterner::new();
        let mut module = Module::new(types.names().intern("test"));
        let mut symbols = SymbolTable::new();
        let mut diagnostics = DiagnosticBag::new();
        let options = ParseOptions::default();
        let module_name = types.names().intern("test");
        {
            let mut ctx = ParserContext::new(src, &mut types, &mut module, &mut symbols, &mut diagnostics, &options, module_name);
            ctx.parse_file(std::path::PathBuf::from("t.tln")).expect("parse failed");
        }
        {
            let mut checker = TypeChecker::new(&mut module, &mut types, &symbols, &mut diagnostics);
            checker.typecheck_module();
        }
        (module, types, diagnostics)
    }

    #[test]
    fn scenario_one_function_call_and_var_type() {
        let (module, mut types, diags) = check_source("func f(x: int) -> int { return x + 1 }\nlet y = f(3)");
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
        let mut found = false;
        for id in module.decl_ids() {
            if let DeclKind::Var(v) = &module.decl(id).kind {
                if let Some(ty) = v.declared_type {
                    assert!(ty.is_basic_named(&types, "int"));
                    found = true;
                }
            }
        }
        assert!(found);
        let _ = &mut types;
    }

    #[test]
    fn scenario_three_array_out_of_bounds_subscript_is_flagged() {
        let (_module, _types, diags) = check_source("let a = [1, 2, 3]\n_ = a[4]");
        assert!(diags
            .iter()
            .any(|d| d.message.contains("accessing array out-of-bounds with index 4, array size is 3")));
    }

    #[test]
    fn in_bounds_array_subscript_type_checks() {
        let (_module, _types, diags) = check_source("let a = [1, 2, 3]\n_ = a[1]");
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
    }

    #[test]
    fn scenario_four_generic_identity_function_infers_int() {
        let (module, mut types, diags) =
            check_source("func id<T>(x: T) -> T { return x }\nlet n = id(7)");
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
        let mut found = false;
        for id in module.decl_ids() {
            if let DeclKind::Var(v) = &module.decl(id).kind {
                if let Some(ty) = v.declared_type {
                    if ty.is_basic_named(&types, "int") {
                        found = true;
                    }
                }
            }
        }
        assert!(found);
        let _ = &mut types;
    }

    #[test]
    fn scenario_five_structural_interface_conformance_through_generic_constraint() {
        let (_module, _types, diags) = check_source(
            "interface Eq { func eq(other: This) -> bool }\n\
             struct S { func eq(other: S) -> bool { return true } }\n\
             func g<T: Eq>(x: T) { }\n\
             g(S())",
        );
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
    }

    #[test]
    fn scenario_six_member_access_through_nullable_pointer_errors() {
        let (_module, _types, diags) = check_source(
            "struct S { func foo() -> int { return 0 } }\nvar p: S* = null\n_ = p.foo()",
        );
        assert!(diags.has_errors());
        assert!(diags
            .iter()
            .any(|d| d.message.contains("pointer may be null")));
    }

    #[test]
    fn unknown_identifier_is_reported() {
        let (_module, _types, diags) = check_source("let x = thisIsNotDeclared");
        assert!(diags.iter().any(|d| d.message.contains("unknown identifier")));
    }

    #[test]
    fn integer_literal_out_of_32_bit_range_resolves_to_int64() {
        let (module, mut types, diags) = check_source("let big = 5000000000");
        assert!(!diags.has_errors(), "{:?}", diags.iter().collect::<Vec<_>>());
        let mut found = false;
        for id in module.decl_ids() {
            if let DeclKind::Var(v) = &module.decl(id).kind {
                if let Some(ty) = v.declared_type {
                    if ty.is_basic_named(&types, "int64") {
                        found = true;
                    }
                }
            }
        }
        assert!(found);
        let _ = &mut types;
    }

    #[test]
    fn assignment_to_immutable_binding_is_rejected() {
        let (_module, _types, diags) = check_source("let x = 1\nx = 2");
        assert!(diags.has_errors());
    }
}
