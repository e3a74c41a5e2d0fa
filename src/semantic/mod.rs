//! Semantic Analyzer (spec §4.4): name resolution, type assignment, and
//! operator/call/attribute/return compatibility checking.

use crate::ast::expr::{BinaryOpKind, Expr, Literal, UnaryOpKind};
use crate::ast::stmt::Stmt;
use crate::diagnostics::{Code, CompilerFailure, IssueTracker, Severity};
use crate::intern::Interner;
use crate::scope::{ScopeGraph, ScopeId, SymbolKind};
use crate::suggest::suggest_for_unknown;
use crate::types::{get_promoted_type, Type};

pub struct Analyzer<'g> {
    scopes: &'g mut ScopeGraph,
    interner: &'g Interner,
    issues: IssueTracker,
}

impl<'g> Analyzer<'g> {
    pub fn new(scopes: &'g mut ScopeGraph, interner: &'g Interner) -> Self {
        Analyzer {
            scopes,
            interner,
            issues: IssueTracker::new(),
        }
    }

    pub fn analyze(mut self, module: &Stmt) -> Result<IssueTracker, CompilerFailure> {
        self.visit_stmt(module, module_scope(module))?;
        self.issues.check_errors()?;
        Ok(self.issues)
    }

    fn visit_block(&mut self, body: &[&Stmt], scope: ScopeId) -> Result<(), CompilerFailure> {
        for stmt in body {
            self.visit_stmt(stmt, scope)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> Result<(), CompilerFailure> {
        match stmt {
            Stmt::Module { body, scope: s } => self.visit_block(body, *s)?,
            Stmt::FunctionDef { name, params, return_type, body, scope: s, .. } => {
                self.register_function_type(*name, params, *return_type, scope);
                self.visit_block(body, *s)?;
            }
            Stmt::LLMFunctionDef { name, params, return_type, template, scope: s, .. } => {
                self.register_function_type(*name, params, *return_type, scope);
                for seg in template.sys_segments.iter().chain(template.user_segments.iter()) {
                    if let Some(e) = seg.expr {
                        self.check_prompt_param(e, *s)?;
                        self.infer_expr(e, *s)?;
                    }
                }
            }
            Stmt::ClassDef { name, body, scope: s, .. } => {
                if let Some(sym) = self.scopes.resolve_mut(scope, *name) {
                    sym.type_info = Some(Type::UserDefined(self.interner.resolve(*name).to_string()));
                    sym.exported_scope = Some(*s);
                }
                self.visit_block(body, *s)?;
            }
            Stmt::Assign { target, type_annotation, value, span } => {
                let value_ty = self.infer_expr(value, scope)?;
                if let Some(ann) = type_annotation {
                    let declared = self.resolve_type_expr(ann);
                    if !matches!(declared, Type::Any) && !value_ty.is_assignable_to(&declared) {
                        self.issues.report(
                            Severity::Error,
                            Code::SEM_TYPE_MISMATCH,
                            format!("cannot assign {} to declared type {}", value_ty, declared),
                            Some(*span),
                        )?;
                    }
                    // A non-builtin declared type (e.g. a class name) isn't
                    // resolved by the parser's own `Type::get_builtin_type`
                    // lookup, so the symbol `prescan`/`define_variable` left
                    // typeless needs it filled in here for attribute/call
                    // dispatch on the declared type to have anything to see.
                    if let Expr::Name(name, _) = target {
                        if let Some(sym) = self.scopes.resolve_mut(scope, *name) {
                            if matches!(sym.type_info, None | Some(Type::Any)) {
                                sym.type_info = Some(declared);
                            }
                        }
                    }
                } else if let Expr::Name(name, _) = target {
                    if let Some(sym) = self.scopes.resolve(scope, *name) {
                        if sym.is_const {
                            self.issues.report(
                                Severity::Error,
                                Code::SEM_REDEFINITION,
                                "cannot reassign a built-in intrinsic",
                                Some(*span),
                            )?;
                        }
                    }
                    let needs_fix = self
                        .scopes
                        .resolve(scope, *name)
                        .map(|s| matches!(s.type_info, Some(Type::Any) | None))
                        .unwrap_or(false);
                    if needs_fix && !matches!(value_ty, Type::Void) {
                        if let Some(sym) = self.scopes.resolve_mut(scope, *name) {
                            sym.type_info = Some(value_ty);
                        }
                    }
                }
            }
            Stmt::AugAssign { target, value, span, .. } => {
                let _ = self.infer_expr(target, scope)?;
                let _ = self.infer_expr(value, scope)?;
                let _ = span;
            }
            Stmt::If { test, body, orelse, llm_fallback, .. } => {
                self.infer_expr(test, scope)?;
                self.visit_block(body, scope)?;
                self.visit_block(orelse, scope)?;
                if let Some(fb) = llm_fallback {
                    self.visit_block(fb, scope)?;
                }
            }
            Stmt::While { test, body, llm_fallback, .. } => {
                self.infer_expr(test, scope)?;
                self.visit_block(body, scope)?;
                if let Some(fb) = llm_fallback {
                    self.visit_block(fb, scope)?;
                }
            }
            Stmt::For { iter, body, llm_fallback, scope: s, .. } => {
                self.infer_expr(iter, scope)?;
                self.visit_block(body, *s)?;
                if let Some(fb) = llm_fallback {
                    self.visit_block(fb, *s)?;
                }
            }
            Stmt::Try { body, handlers, orelse, finally_body, .. } => {
                self.visit_block(body, scope)?;
                for h in handlers {
                    self.visit_block(&h.body, scope)?;
                }
                self.visit_block(orelse, scope)?;
                self.visit_block(finally_body, scope)?;
            }
            Stmt::Raise { value, .. } => {
                if let Some(v) = value {
                    self.infer_expr(v, scope)?;
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.infer_expr(v, scope)?;
                }
            }
            Stmt::ExprStmt { expr, .. } => {
                self.infer_expr(expr, scope)?;
            }
            Stmt::Pass(_)
            | Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Retry(_)
            | Stmt::Import { .. }
            | Stmt::ImportFrom { .. } => {}
        }
        Ok(())
    }

    fn check_prompt_param(&mut self, expr: &Expr, scope: ScopeId) -> Result<(), CompilerFailure> {
        if let Expr::Name(name, span) = expr {
            if self.scopes.resolve(scope, *name).is_none() {
                let word = self.interner.resolve(*name);
                let hint = suggest_for_unknown(word, self.scopes.names_in(scope).map(|s| self.interner.resolve(s)));
                self.issues.report_with_hint(
                    Severity::Error,
                    Code::SEM_UNDEFINED_SYMBOL,
                    format!("parameter '{}' is not defined", word),
                    Some(*span),
                    hint.map(|h| format!("did you mean '{}'?", h)),
                )?;
            }
        }
        Ok(())
    }

    /// Assigns the declared-parameter/return `Type::Function` signature to
    /// a `func`/`llm` def's own symbol (registered with no type by
    /// [`crate::prescan`]) so call sites can check arity/argument types.
    fn register_function_type(
        &mut self,
        name: crate::intern::Symbol,
        params: &[crate::ast::stmt::Param],
        return_type: Option<&Expr>,
        scope: ScopeId,
    ) {
        let param_tys: Vec<Type> = params
            .iter()
            .map(|p| p.type_annotation.map(|t| self.resolve_type_expr(t)).unwrap_or(Type::Any))
            .collect();
        let ret_ty = return_type.map(|t| self.resolve_type_expr(t)).unwrap_or(Type::Any);
        if let Some(sym) = self.scopes.resolve_mut(scope, name) {
            sym.type_info = Some(Type::Function(std::rc::Rc::new(param_tys), std::rc::Rc::new(ret_ty)));
        }
    }

    /// `Type::UserDefined` attribute dispatch (spec §4.4): resolves `attr`
    /// against the class's own body scope, following the lazy
    /// `origin_symbol` chain the same way name resolution does.
    fn lookup_in_class_scope(&self, class_name: &str, attr: crate::intern::Symbol, scope: ScopeId) -> Type {
        let class_sym = match self.interner.lookup(class_name) {
            Some(sym) => sym,
            None => return Type::Any,
        };
        let class_scope = self
            .scopes
            .resolve(scope, class_sym)
            .and_then(|s| s.exported_scope);
        match class_scope.and_then(|cs| self.scopes.resolve(cs, attr)) {
            Some(member) => member.resolved_type().unwrap_or(Type::Any),
            None => Type::Any,
        }
    }

    fn resolve_type_expr(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Name(sym, _) => {
                let word = self.interner.resolve(*sym);
                Type::get_builtin_type(word).unwrap_or(Type::UserDefined(word.to_string()))
            }
            Expr::Subscript { receiver, index, .. } => {
                if let Expr::Name(sym, _) = receiver {
                    let word = self.interner.resolve(*sym);
                    if word == "List" {
                        return Type::List(std::rc::Rc::new(self.resolve_type_expr(index)));
                    }
                }
                Type::Any
            }
            _ => Type::Any,
        }
    }

    fn infer_expr(&mut self, expr: &Expr, scope: ScopeId) -> Result<Type, CompilerFailure> {
        let ty = match expr {
            Expr::Constant(lit, _) => match lit {
                Literal::Int(_) => Type::Int,
                Literal::Float(_) => Type::Float,
                Literal::Str(_) => Type::Str,
                Literal::Bool(_) => Type::Bool,
                Literal::None_ => Type::Any,
            },
            Expr::Name(sym, span) => match self.scopes.resolve(scope, *sym) {
                Some(s) => s.resolved_type().unwrap_or(Type::Any),
                None => {
                    let word = self.interner.resolve(*sym);
                    let hint = suggest_for_unknown(word, self.scopes.names_in(scope).map(|s| self.interner.resolve(s)));
                    self.issues.report_with_hint(
                        Severity::Error,
                        Code::SEM_UNDEFINED_SYMBOL,
                        format!("undefined name '{}'", word),
                        Some(*span),
                        hint.map(|h| format!("did you mean '{}'?", h)),
                    )?;
                    Type::Any
                }
            },
            Expr::Attribute { receiver, attr, .. } => {
                let recv_ty = self.infer_expr(receiver, scope)?;
                match recv_ty {
                    Type::Module => Type::Any,
                    Type::UserDefined(class_name) => self.lookup_in_class_scope(&class_name, *attr, scope),
                    _ => Type::Any,
                }
            }
            Expr::Subscript { receiver, index, .. } => {
                let recv_ty = self.infer_expr(receiver, scope)?;
                self.infer_expr(index, scope)?;
                match recv_ty {
                    Type::List(elem) => (*elem).clone(),
                    Type::Dict(_, v) => (*v).clone(),
                    _ => Type::Any,
                }
            }
            Expr::ListExpr(items, _) => {
                let mut elem = None;
                for i in items {
                    let t = self.infer_expr(i, scope)?;
                    elem = Some(match elem {
                        None => t,
                        Some(prev) if prev == t => prev,
                        Some(_) => Type::Any,
                    });
                }
                Type::List(std::rc::Rc::new(elem.unwrap_or(Type::Any)))
            }
            Expr::DictExpr(items, _) => {
                for (k, v) in items {
                    self.infer_expr(k, scope)?;
                    self.infer_expr(v, scope)?;
                }
                Type::Dict(std::rc::Rc::new(Type::Any), std::rc::Rc::new(Type::Any))
            }
            Expr::BinOp { op, left, right, span } => {
                let lt = self.infer_expr(left, scope)?;
                let rt = self.infer_expr(right, scope)?;
                let op_str = binop_str(*op);
                match get_promoted_type(op_str, &lt, &rt) {
                    Some(t) => t,
                    None => {
                        self.issues.report(
                            Severity::Error,
                            Code::SEM_TYPE_MISMATCH,
                            format!("operator '{}' is not defined for {} and {}", op_str, lt, rt),
                            Some(*span),
                        )?;
                        Type::Any
                    }
                }
            }
            Expr::UnaryOp { op, operand, span } => {
                let t = self.infer_expr(operand, scope)?;
                match op {
                    UnaryOpKind::Neg if t.is_numeric() => t,
                    UnaryOpKind::Not => Type::Bool,
                    UnaryOpKind::BitNot if t == Type::Int => Type::Int,
                    _ => {
                        self.issues.report(
                            Severity::Error,
                            Code::SEM_TYPE_MISMATCH,
                            "unary operator is not defined for this operand type",
                            Some(*span),
                        )?;
                        Type::Any
                    }
                }
            }
            Expr::Compare { left, comparators, .. } => {
                self.infer_expr(left, scope)?;
                for c in comparators {
                    self.infer_expr(c, scope)?;
                }
                Type::Bool
            }
            Expr::BoolOp { values, .. } => {
                for v in values {
                    self.infer_expr(v, scope)?;
                }
                Type::Bool
            }
            Expr::Call { callee, args, span, .. } => {
                let callee_ty = self.infer_expr(callee, scope)?;
                let mut arg_tys = Vec::with_capacity(args.len());
                for a in args {
                    arg_tys.push(self.infer_expr(a, scope)?);
                }
                // `recv.method(args)` is dispatched as a bound method at
                // runtime (the receiver instance is prepended as `self`
                // ahead of `args`), so its declared parameter list has one
                // more entry than the call site's argument list.
                let is_method_call = matches!(callee, Expr::Attribute { .. });
                match callee_ty {
                    Type::Function(params, ret) => {
                        let declared: &[Type] = if is_method_call && !params.is_empty() {
                            &params[1..]
                        } else {
                            &params[..]
                        };
                        if declared.len() != arg_tys.len() {
                            self.issues.report(
                                Severity::Error,
                                Code::SEM_TYPE_MISMATCH,
                                format!("expected {} argument(s), found {}", declared.len(), arg_tys.len()),
                                Some(*span),
                            )?;
                        } else {
                            for (i, (param_ty, arg_ty)) in declared.iter().zip(arg_tys.iter()).enumerate() {
                                if !matches!(param_ty, Type::Any) && !arg_ty.is_assignable_to(param_ty) {
                                    self.issues.report(
                                        Severity::Error,
                                        Code::SEM_TYPE_MISMATCH,
                                        format!(
                                            "argument {} expected {}, found {}",
                                            i + 1,
                                            param_ty,
                                            arg_ty
                                        ),
                                        Some(*span),
                                    )?;
                                }
                            }
                        }
                        (*ret).clone()
                    }
                    Type::UserDefined(name) => Type::UserDefined(name),
                    _ => Type::Any,
                }
            }
            Expr::CastExpr { target_type, value, .. } => {
                self.infer_expr(value, scope)?;
                Type::get_builtin_type(self.interner.resolve(*target_type)).unwrap_or(Type::Any)
            }
            Expr::Behavior(b) => {
                for seg in &b.segments {
                    if let crate::ast::expr::BehaviorSegment::Expr(e) = seg {
                        self.infer_expr(e, scope)?;
                    }
                }
                Type::Str
            }
        };
        Ok(ty)
    }
}

fn module_scope(module: &Stmt) -> ScopeId {
    match module {
        Stmt::Module { scope, .. } => *scope,
        _ => panic!("analyze() must be called with a Module node"),
    }
}

fn binop_str(op: BinaryOpKind) -> &'static str {
    match op {
        BinaryOpKind::Add => "+",
        BinaryOpKind::Sub => "-",
        BinaryOpKind::Mul => "*",
        BinaryOpKind::Div => "/",
        BinaryOpKind::Mod => "%",
        BinaryOpKind::BitAnd => "&",
        BinaryOpKind::BitOr => "|",
        BinaryOpKind::BitXor => "^",
        BinaryOpKind::Shl => "<<",
        BinaryOpKind::Shr => ">>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::ast::{Expr as E, Stmt as S};

    fn analyze_src(src: &str) -> IssueTracker {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex(src, &mut interner).unwrap();
        let expr_arena: Arena<E> = Arena::new();
        let stmt_arena: Arena<S> = Arena::new();
        let mut scopes = ScopeGraph::new();
        let out = crate::parser::parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
        Analyzer::new(&mut scopes, &interner).analyze(out.module).unwrap_or_else(|f| f.diagnostics.into_iter().fold(IssueTracker::new(), |mut t, d| { t.diagnostics.push(d); t }))
    }

    #[test]
    fn bitwise_expression_type_checks_as_int() {
        let issues = analyze_src("int r = (10 & 3) | (5 ^ 1)\n");
        assert!(!issues.has_errors());
    }

    #[test]
    fn undefined_name_is_reported() {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex("int x = y + 1\n", &mut interner).unwrap();
        let expr_arena: Arena<E> = Arena::new();
        let stmt_arena: Arena<S> = Arena::new();
        let mut scopes = ScopeGraph::new();
        let out = crate::parser::parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
        let result = Analyzer::new(&mut scopes, &interner).analyze(out.module);
        assert!(result.is_err());
    }

    #[test]
    fn string_minus_string_is_type_error() {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex("str x = \"a\" - \"b\"\n", &mut interner).unwrap();
        let expr_arena: Arena<E> = Arena::new();
        let stmt_arena: Arena<S> = Arena::new();
        let mut scopes = ScopeGraph::new();
        let out = crate::parser::parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
        let result = Analyzer::new(&mut scopes, &interner).analyze(out.module);
        assert!(result.is_err());
    }
}
