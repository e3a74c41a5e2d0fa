//! Recursive-descent statement parser (spec §4.3), cooperating with the
//! Pratt [`super::expr::ExprParser`] for expression positions.

use crate::arena::Arena;
use crate::ast::expr::{BehaviorExpr, Expr, Scene};
use crate::ast::stmt::{ExceptHandler, LlmTemplate, Param, PromptSegment, Stmt};
use crate::diagnostics::{Code, CompilerFailure, IssueTracker, Severity};
use crate::intern::{Interner, Symbol};
use crate::parser::expr::ExprParser;
use crate::prescan::prescan;
use crate::scope::{RuntimeSymbol, ScopeGraph, ScopeId, ScopeKind, SymbolKind};
use crate::token::{Span, Token, TokenKind};
use crate::types::Type;

pub struct StmtParser<'a, 'src> {
    tokens: &'src [Token],
    pos: usize,
    expr_arena: &'a Arena<Expr<'a>>,
    stmt_arena: &'a Arena<Stmt<'a>>,
    interner: &'src mut Interner,
    issues: &'src mut IssueTracker,
    scopes: &'src mut ScopeGraph,
    pending_intent: Option<String>,
    fallback_depth: u32,
}

const MAX_LOOKAHEAD: usize = 100;

impl<'a, 'src> StmtParser<'a, 'src> {
    pub fn new(
        tokens: &'src [Token],
        expr_arena: &'a Arena<Expr<'a>>,
        stmt_arena: &'a Arena<Stmt<'a>>,
        interner: &'src mut Interner,
        issues: &'src mut IssueTracker,
        scopes: &'src mut ScopeGraph,
    ) -> Self {
        StmtParser {
            tokens,
            pos: 0,
            expr_arena,
            stmt_arena,
            interner,
            issues,
            scopes,
            pending_intent: None,
            fallback_depth: 0,
        }
    }

    pub fn parse_module(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let global = self.scopes.new_root(ScopeKind::Global);
        self.register_intrinsics(global);
        prescan(self.tokens, 0, self.tokens.len(), self.scopes, global, self.interner);
        let body = self.parse_stmts_until(&[TokenKind::Eof], global)?;
        Ok(self.stmt_arena.alloc(Stmt::Module { body, scope: global }))
    }

    fn register_intrinsics(&mut self, scope: ScopeId) {
        for name in ["print", "len", "input", "int", "float", "str", "list", "dict", "bool"] {
            let sym = self.interner.intern(name);
            let mut rs = RuntimeSymbol::new(sym, SymbolKind::Function);
            rs.is_const = true;
            self.scopes.define(scope, rs);
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> Result<Token, CompilerFailure> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            self.issues.report(
                Severity::Error,
                Code::PAR_EXPECTED_TOKEN,
                msg.to_string(),
                Some(self.peek_span()),
            )?;
            Ok(self.advance())
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn synchronize(&mut self) {
        while !matches!(self.peek(), TokenKind::Eof) {
            match self.peek() {
                TokenKind::Newline | TokenKind::Dedent => {
                    self.advance();
                    return;
                }
                TokenKind::Func
                | TokenKind::Llm
                | TokenKind::Class
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn new_expr_parser<'p>(&'p mut self) -> ExprParser<'a, 'p>
    where
        'src: 'p,
    {
        ExprParser {
            tokens: self.tokens,
            pos: self.pos,
            arena: self.expr_arena,
            interner: self.interner,
            issues: self.issues,
        }
    }

    fn parse_expr(&mut self) -> Result<&'a Expr<'a>, CompilerFailure> {
        let mut sub = self.new_expr_parser();
        let result = sub.parse_expr()?;
        self.pos = sub.pos;
        Ok(result)
    }

    fn parse_stmts_until(
        &mut self,
        terminators: &[TokenKind],
        scope: ScopeId,
    ) -> Result<Vec<&'a Stmt<'a>>, CompilerFailure> {
        let mut stmts = Vec::new();
        self.skip_newlines();
        while !terminators
            .iter()
            .any(|t| std::mem::discriminant(t) == std::mem::discriminant(self.peek()))
        {
            if matches!(self.peek(), TokenKind::Eof) {
                break;
            }
            match self.parse_stmt(scope) {
                Ok(Some(stmt)) => stmts.push(stmt),
                Ok(None) => {}
                Err(_) => self.synchronize(),
            }
            self.skip_newlines();
        }
        Ok(stmts)
    }

    fn parse_block(&mut self, parent: ScopeId, kind: ScopeKind) -> Result<(Vec<&'a Stmt<'a>>, ScopeId), CompilerFailure> {
        self.skip_newlines();
        self.expect(TokenKind::Indent, "expected an indented block")?;
        let scope = self.scopes.child(parent, kind);
        prescan(self.tokens, self.pos, self.tokens.len(), self.scopes, scope, self.interner);
        let body = self.parse_stmts_until(&[TokenKind::Dedent], scope)?;
        self.expect(TokenKind::Dedent, "expected dedent to close block")?;
        Ok((body, scope))
    }

    /// Returns `Ok(None)` for a pure intent-annotation line (consumed but
    /// producing no statement of its own).
    fn parse_stmt(&mut self, scope: ScopeId) -> Result<Option<&'a Stmt<'a>>, CompilerFailure> {
        if let TokenKind::Intent(sym) = self.peek().clone() {
            self.advance();
            if self.pending_intent.is_some() {
                self.issues.report(
                    Severity::Warning,
                    Code::PAR_WARN,
                    "a pending intent annotation was discarded by a second annotation",
                    Some(self.peek_span()),
                )?;
            }
            self.pending_intent = Some(self.interner.resolve(sym).to_string());
            return Ok(None);
        }

        let stmt = match self.peek().clone() {
            TokenKind::Func => self.parse_function_def(scope)?,
            TokenKind::Llm => self.parse_llm_def(scope)?,
            TokenKind::Class => self.parse_class_def(scope)?,
            TokenKind::If => self.parse_if(scope)?,
            TokenKind::While => self.parse_while(scope)?,
            TokenKind::For => self.parse_for(scope)?,
            TokenKind::Try => self.parse_try(scope)?,
            TokenKind::Raise => self.parse_raise()?,
            TokenKind::Return => self.parse_return()?,
            TokenKind::Pass => {
                let span = self.peek_span();
                self.advance();
                self.stmt_arena.alloc(Stmt::Pass(span))
            }
            TokenKind::Break => {
                let span = self.peek_span();
                self.advance();
                self.stmt_arena.alloc(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.peek_span();
                self.advance();
                self.stmt_arena.alloc(Stmt::Continue(span))
            }
            TokenKind::Retry => {
                let span = self.peek_span();
                self.advance();
                if self.fallback_depth == 0 {
                    self.issues.report(
                        Severity::Error,
                        Code::RUN_GENERIC_ERROR,
                        "'retry' is only legal inside an 'llmexcept' fallback block",
                        Some(span),
                    )?;
                }
                self.stmt_arena.alloc(Stmt::Retry(span))
            }
            TokenKind::Import => self.parse_import()?,
            TokenKind::From => self.parse_import_from()?,
            _ => self.parse_decl_or_expr_stmt(scope)?,
        };
        Ok(Some(stmt))
    }

    /// Declaration-vs-expression disambiguation (§4.3): `Identifier
    /// Identifier` (type followed by name) or `Identifier '[' ... ']'
    /// Identifier` (generic type followed by name) is a declaration;
    /// `var name = expr` is always a declaration. Anything else is an
    /// expression statement.
    fn parse_decl_or_expr_stmt(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        if matches!(self.peek(), TokenKind::Var) {
            return self.parse_var_decl(scope);
        }
        if self.is_declaration_lookahead(scope) {
            return self.parse_typed_decl(scope);
        }
        self.parse_expr_or_assign_stmt()
    }

    fn is_declaration_lookahead(&self, scope: ScopeId) -> bool {
        let TokenKind::Identifier(sym) = self.peek() else {
            return false;
        };
        let word = self.interner.resolve(*sym);
        let is_type_word = matches!(word, "int" | "float" | "str" | "bool" | "void" | "Callable" | "List" | "Dict")
            || self.scopes.resolve(scope, *sym).map(|s| s.kind == SymbolKind::UserType).unwrap_or(false);
        if !is_type_word {
            return false;
        }
        if matches!(self.peek_at(1), TokenKind::Identifier(_)) {
            return true;
        }
        if matches!(self.peek_at(1), TokenKind::LBracket) {
            return self.check_generic_lookahead();
        }
        false
    }

    /// Scans forward over a balanced `[...]` (bounded by [`MAX_LOOKAHEAD`])
    /// and reports whether it is followed by an identifier.
    fn check_generic_lookahead(&self) -> bool {
        let mut i = self.pos + 1;
        let mut depth = 0i32;
        let mut steps = 0;
        loop {
            if steps > MAX_LOOKAHEAD || i >= self.tokens.len() {
                return false;
            }
            match &self.tokens[i].kind {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i + 1).map(|t| &t.kind),
                            Some(TokenKind::Identifier(_))
                        );
                    }
                }
                TokenKind::Newline | TokenKind::Eof => return false,
                _ => {}
            }
            i += 1;
            steps += 1;
        }
    }

    fn parse_var_decl(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'var'
        let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected variable name")?;
        let TokenKind::Identifier(name) = name_tok.kind else {
            unreachable!()
        };
        self.expect(TokenKind::Assign, "expected '=' in 'var' declaration")?;
        let value = self.parse_expr()?;
        let value = self.attach_pending_intent(value);
        self.define_variable(scope, name, Some(Type::Any));
        let target = self.expr_arena.alloc(Expr::Name(name, span));
        Ok(self.stmt_arena.alloc(Stmt::Assign {
            target,
            type_annotation: None,
            value,
            span,
        }))
    }

    fn parse_typed_decl(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        let type_tok = self.advance();
        let TokenKind::Identifier(type_sym) = type_tok.kind else {
            unreachable!()
        };
        let type_expr = self.expr_arena.alloc(Expr::Name(type_sym, span));
        let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected a name after type in declaration")?;
        let TokenKind::Identifier(name) = name_tok.kind else {
            unreachable!()
        };
        self.expect(TokenKind::Assign, "expected '=' in declaration")?;
        let value = self.parse_expr()?;
        let value = self.attach_pending_intent(value);
        let resolved = Type::get_builtin_type(self.interner.resolve(type_sym));
        self.define_variable(scope, name, resolved);
        let target = self.expr_arena.alloc(Expr::Name(name, span));
        Ok(self.stmt_arena.alloc(Stmt::Assign {
            target,
            type_annotation: Some(type_expr),
            value,
            span,
        }))
    }

    fn define_variable(&mut self, scope: ScopeId, name: Symbol, ty: Option<Type>) {
        if let Some(existing) = self.scopes.resolve(scope, name) {
            if existing.is_const {
                return;
            }
        }
        let mut sym = RuntimeSymbol::new(name, SymbolKind::Variable);
        sym.type_info = ty;
        self.scopes.define(scope, sym);
    }

    /// Consumes any pending `@ text` intent annotation, rebuilding the
    /// value expression with it attached if the value is a `BehaviorExpr`
    /// or intent-less `Call` (§4.3). Arena nodes are immutable once
    /// allocated, so attachment reconstructs a fresh node rather than
    /// mutating in place.
    fn attach_pending_intent(&mut self, value: &'a Expr<'a>) -> &'a Expr<'a> {
        let Some(intent) = self.pending_intent.take() else {
            return value;
        };
        match value {
            Expr::Behavior(b) => self.expr_arena.alloc(Expr::Behavior(BehaviorExpr {
                tag: b.tag,
                segments: b.segments.clone(),
                intent: Some(intent),
                scene: b.scene,
                span: b.span,
            })),
            Expr::Call { callee, args, intent: None, span } => self.expr_arena.alloc(Expr::Call {
                callee,
                args: args.clone(),
                intent: Some(intent),
                span: *span,
            }),
            _ => {
                self.pending_intent = Some(intent);
                value
            }
        }
    }

    fn parse_expr_or_assign_stmt(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        let expr = self.parse_expr()?;
        if let Some(aug) = self.match_aug_assign() {
            let value = self.parse_expr()?;
            return Ok(self.stmt_arena.alloc(Stmt::AugAssign {
                target: expr,
                op: aug,
                value,
                span,
            }));
        }
        if self.check(&TokenKind::Assign) {
            self.advance();
            let value = self.parse_expr()?;
            let value = self.attach_pending_intent(value);
            return Ok(self.stmt_arena.alloc(Stmt::Assign {
                target: expr,
                type_annotation: None,
                value,
                span,
            }));
        }
        let expr = self.attach_pending_intent(expr);
        if self.pending_intent.is_some() {
            self.issues.report(
                Severity::Warning,
                Code::PAR_WARN,
                "intent annotation applies only to calls or behavior expressions; discarded",
                Some(span),
            )?;
            self.pending_intent = None;
        }
        Ok(self.stmt_arena.alloc(Stmt::ExprStmt { expr, span }))
    }

    fn match_aug_assign(&mut self) -> Option<crate::ast::expr::BinaryOpKind> {
        use crate::ast::expr::BinaryOpKind::*;
        let op = match self.peek() {
            TokenKind::PlusEq => Add,
            TokenKind::MinusEq => Sub,
            TokenKind::StarEq => Mul,
            TokenKind::SlashEq => Div,
            TokenKind::PercentEq => Mod,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_function_def(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'func'
        let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected function name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        let params = self.parse_params()?;
        let return_type = self.parse_optional_return_type()?;
        self.expect(TokenKind::Colon, "expected ':' after function header")?;
        let (body, fn_scope) = self.parse_block(scope, ScopeKind::Function)?;
        for p in &params {
            self.scopes.define(fn_scope, RuntimeSymbol::new(p.name, SymbolKind::Variable));
        }
        Ok(self.stmt_arena.alloc(Stmt::FunctionDef {
            name,
            params,
            return_type,
            body,
            scope: fn_scope,
            span,
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param<'a>>, CompilerFailure> {
        self.expect(TokenKind::LParen, "expected '(' to start parameter list")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let span = self.peek_span();
                let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected parameter name")?;
                let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
                params.push(Param { name, type_annotation: None, span });
                if self.check(&TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expected ')' to close parameter list")?;
        Ok(params)
    }

    fn parse_optional_return_type(&mut self) -> Result<Option<&'a Expr<'a>>, CompilerFailure> {
        if self.check(&TokenKind::Arrow) {
            self.advance();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_llm_def(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'llm'
        let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected LLM function name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        let params = self.parse_params()?;
        let return_type = self.parse_optional_return_type()?;
        self.expect(TokenKind::Colon, "expected ':' after llm function header")?;
        self.skip_newlines();
        self.expect(TokenKind::Indent, "expected indented llm block body")?;
        let fn_scope = self.scopes.child(scope, ScopeKind::Function);
        for p in &params {
            self.scopes.define(fn_scope, RuntimeSymbol::new(p.name, SymbolKind::Variable));
        }
        let template = self.parse_llm_template()?;
        self.expect(TokenKind::LlmEnd, "expected 'llmend' to close llm block")?;
        self.skip_newlines();
        self.expect(TokenKind::Dedent, "expected dedent after llm block")?;
        Ok(self.stmt_arena.alloc(Stmt::LLMFunctionDef {
            name,
            params,
            return_type,
            template,
            scope: fn_scope,
            span,
        }))
    }

    fn parse_llm_template(&mut self) -> Result<LlmTemplate<'a>, CompilerFailure> {
        let mut sys_segments = Vec::new();
        let mut user_segments = Vec::new();
        loop {
            match self.peek() {
                TokenKind::LlmSys => {
                    self.advance();
                    sys_segments = self.parse_prompt_segments()?;
                }
                TokenKind::LlmUser => {
                    self.advance();
                    user_segments = self.parse_prompt_segments()?;
                }
                _ => break,
            }
        }
        Ok(LlmTemplate { sys_segments, user_segments })
    }

    fn parse_prompt_segments(&mut self) -> Result<Vec<PromptSegment<'a>>, CompilerFailure> {
        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek().clone() {
                TokenKind::RawText(sym) => {
                    self.advance();
                    text.push_str(self.interner.resolve(sym));
                }
                TokenKind::Newline => {
                    self.advance();
                    text.push('\n');
                }
                TokenKind::ParamPlaceholder(sym) => {
                    self.advance();
                    let placeholder_text = self.interner.resolve(sym).to_string();
                    let mut sub = ExprParser::new(
                        &lex_placeholder(&placeholder_text, self.interner),
                        self.expr_arena,
                        self.interner,
                        self.issues,
                    );
                    let expr = sub.parse_expr()?;
                    segments.push(PromptSegment {
                        text_before: std::mem::take(&mut text),
                        expr: Some(expr),
                    });
                }
                TokenKind::LlmSys | TokenKind::LlmUser | TokenKind::LlmEnd | TokenKind::Eof => break,
                _ => {
                    self.advance();
                }
            }
        }
        if !text.is_empty() {
            segments.push(PromptSegment { text_before: text, expr: None });
        }
        Ok(segments)
    }

    fn parse_class_def(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'class'
        let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected class name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        let mut base = None;
        if self.check(&TokenKind::LParen) {
            self.advance();
            if let TokenKind::Identifier(b) = self.peek().clone() {
                self.advance();
                base = Some(b);
            }
            self.expect(TokenKind::RParen, "expected ')' after base class")?;
        }
        self.expect(TokenKind::Colon, "expected ':' after class header")?;
        let (body, class_scope) = self.parse_block(scope, ScopeKind::Class)?;
        Ok(self.stmt_arena.alloc(Stmt::ClassDef {
            name,
            base,
            body,
            scope: class_scope,
            span,
        }))
    }

    fn parse_llm_fallback(&mut self, scope: ScopeId) -> Result<Option<Vec<&'a Stmt<'a>>>, CompilerFailure> {
        self.skip_newlines();
        if !matches!(self.peek(), TokenKind::LlmExcept) {
            return Ok(None);
        }
        self.advance();
        self.expect(TokenKind::Colon, "expected ':' after 'llmexcept'")?;
        self.fallback_depth += 1;
        let (body, _) = self.parse_block(scope, ScopeKind::Block)?;
        self.fallback_depth -= 1;
        Ok(Some(body))
    }

    fn tag_scene(expr: &'a Expr<'a>, scene: Scene, arena: &'a Arena<Expr<'a>>) -> &'a Expr<'a> {
        match expr {
            Expr::Behavior(b) => arena.alloc(Expr::Behavior(BehaviorExpr {
                tag: b.tag,
                segments: b.segments.clone(),
                intent: b.intent.clone(),
                scene,
                span: b.span,
            })),
            _ => expr,
        }
    }

    fn parse_if(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'if'
        let test = self.parse_expr()?;
        let test = Self::tag_scene(test, Scene::Branch, self.expr_arena);
        self.expect(TokenKind::Colon, "expected ':' after 'if' test")?;
        let (body, _) = self.parse_block(scope, ScopeKind::Block)?;
        let llm_fallback = self.parse_llm_fallback(scope)?;
        self.skip_newlines();
        let orelse = if matches!(self.peek(), TokenKind::Elif) {
            vec![self.parse_if(scope)?]
        } else if matches!(self.peek(), TokenKind::Else) {
            self.advance();
            self.expect(TokenKind::Colon, "expected ':' after 'else'")?;
            self.parse_block(scope, ScopeKind::Block)?.0
        } else {
            Vec::new()
        };
        Ok(self.stmt_arena.alloc(Stmt::If { test, body, orelse, llm_fallback, span }))
    }

    fn parse_while(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'while'
        let test = self.parse_expr()?;
        let test = Self::tag_scene(test, Scene::Loop, self.expr_arena);
        self.expect(TokenKind::Colon, "expected ':' after 'while' test")?;
        let (body, _) = self.parse_block(scope, ScopeKind::Block)?;
        let llm_fallback = self.parse_llm_fallback(scope)?;
        Ok(self.stmt_arena.alloc(Stmt::While { test, body, llm_fallback, span }))
    }

    fn parse_for(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'for'
        let for_scope = self.scopes.child(scope, ScopeKind::Block);
        let mut target = None;
        let save = self.pos;
        if let TokenKind::Identifier(sym) = self.peek().clone() {
            self.advance();
            if matches!(self.peek(), TokenKind::In) {
                self.advance();
                target = Some(sym);
                self.scopes.define(for_scope, RuntimeSymbol::new(sym, SymbolKind::Variable));
            } else {
                self.pos = save;
            }
        }
        let iter = self.parse_expr()?;
        let iter = Self::tag_scene(iter, Scene::Loop, self.expr_arena);
        self.expect(TokenKind::Colon, "expected ':' after 'for' header")?;
        self.skip_newlines();
        self.expect(TokenKind::Indent, "expected indented 'for' body")?;
        prescan(self.tokens, self.pos, self.tokens.len(), self.scopes, for_scope, self.interner);
        let body = self.parse_stmts_until(&[TokenKind::Dedent], for_scope)?;
        self.expect(TokenKind::Dedent, "expected dedent to close 'for' body")?;
        let llm_fallback = self.parse_llm_fallback(scope)?;
        Ok(self.stmt_arena.alloc(Stmt::For {
            target,
            iter,
            body,
            llm_fallback,
            scope: for_scope,
            span,
        }))
    }

    fn parse_try(&mut self, scope: ScopeId) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'try'
        self.expect(TokenKind::Colon, "expected ':' after 'try'")?;
        let (body, _) = self.parse_block(scope, ScopeKind::Block)?;
        let mut handlers = Vec::new();
        self.skip_newlines();
        while matches!(self.peek(), TokenKind::Except) {
            let hspan = self.peek_span();
            self.advance();
            let mut exc_type = None;
            let mut bind_name = None;
            if let TokenKind::Identifier(sym) = self.peek().clone() {
                self.advance();
                exc_type = Some(sym);
                if matches!(self.peek(), TokenKind::As) {
                    self.advance();
                    if let TokenKind::Identifier(b) = self.peek().clone() {
                        self.advance();
                        bind_name = Some(b);
                    }
                }
            }
            self.expect(TokenKind::Colon, "expected ':' after 'except' clause")?;
            let (hbody, hscope) = self.parse_block(scope, ScopeKind::Block)?;
            if let Some(b) = bind_name {
                self.scopes.define(hscope, RuntimeSymbol::new(b, SymbolKind::Variable));
            }
            handlers.push(ExceptHandler { exc_type, bind_name, body: hbody, span: hspan });
            self.skip_newlines();
        }
        let orelse = if matches!(self.peek(), TokenKind::Else) {
            self.advance();
            self.expect(TokenKind::Colon, "expected ':' after 'else'")?;
            self.parse_block(scope, ScopeKind::Block)?.0
        } else {
            Vec::new()
        };
        self.skip_newlines();
        let finally_body = if matches!(self.peek(), TokenKind::FinallyKw) {
            self.advance();
            self.expect(TokenKind::Colon, "expected ':' after 'finally'")?;
            self.parse_block(scope, ScopeKind::Block)?.0
        } else {
            Vec::new()
        };
        Ok(self.stmt_arena.alloc(Stmt::Try { body, handlers, orelse, finally_body, span }))
    }

    fn parse_raise(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance();
        let value = if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(self.stmt_arena.alloc(Stmt::Raise { value, span }))
    }

    fn parse_return(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance();
        let value = if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(self.stmt_arena.alloc(Stmt::Return { value, span }))
    }

    /// Parses `.`*`name(.name)*`? into a leading-dot level plus the
    /// dotted path interned as one symbol (spec §4.7: "leading dots
    /// denote parent packages"). The dotted path may be empty (`from ..
    /// import x`), in which case `module` is the empty symbol.
    fn parse_dotted_module_path(&mut self) -> Result<(u32, Symbol), CompilerFailure> {
        let mut level = 0u32;
        while self.check(&TokenKind::Dot) {
            self.advance();
            level += 1;
        }
        let mut parts = Vec::new();
        if matches!(self.peek(), TokenKind::Identifier(_)) {
            loop {
                let tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected module name")?;
                let TokenKind::Identifier(part) = tok.kind else { unreachable!() };
                parts.push(self.interner.resolve(part).to_string());
                if self.check(&TokenKind::Dot) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        let module = self.interner.intern(&parts.join("."));
        Ok((level, module))
    }

    fn parse_import(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance();
        let (level, module) = self.parse_dotted_module_path()?;
        let alias = if matches!(self.peek(), TokenKind::As) {
            self.advance();
            let a = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected alias after 'as'")?;
            let TokenKind::Identifier(a) = a.kind else { unreachable!() };
            Some(a)
        } else {
            None
        };
        Ok(self.stmt_arena.alloc(Stmt::Import { module, level, alias, span }))
    }

    fn parse_import_from(&mut self) -> Result<&'a Stmt<'a>, CompilerFailure> {
        let span = self.peek_span();
        self.advance(); // 'from'
        let (level, module) = self.parse_dotted_module_path()?;
        self.expect(TokenKind::Import, "expected 'import' after module name")?;
        let mut names = Vec::new();
        if self.check(&TokenKind::Star) {
            self.advance();
            let star = self.interner.intern("*");
            return Ok(self
                .stmt_arena
                .alloc(Stmt::ImportFrom { module, level, names: vec![(star, None)], span }));
        }
        loop {
            let name_tok = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected imported name")?;
            let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
            let alias = if matches!(self.peek(), TokenKind::As) {
                self.advance();
                let a = self.expect(TokenKind::Identifier(Symbol::EMPTY), "expected alias after 'as'")?;
                let TokenKind::Identifier(a) = a.kind else { unreachable!() };
                Some(a)
            } else {
                None
            };
            names.push((name, alias));
            if self.check(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.stmt_arena.alloc(Stmt::ImportFrom { module, level, names, span }))
    }
}

fn lex_placeholder(text: &str, interner: &mut Interner) -> Vec<Token> {
    crate::lexer::lex(&format!("{}\n", text), interner)
        .map(|(t, _)| t)
        .unwrap_or_else(|_| vec![Token::new(TokenKind::Eof, Span::new(0, 0, 0))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_module(src: &str) -> String {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex(src, &mut interner).unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut issues = IssueTracker::new();
        let mut scopes = ScopeGraph::new();
        let mut parser = StmtParser::new(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut issues, &mut scopes);
        let module = parser.parse_module().unwrap();
        format!("{:?}", module)
    }

    #[test]
    fn parses_typed_declaration() {
        let out = parse_module("int total = 0\n");
        assert!(out.contains("Assign"));
    }

    #[test]
    fn parses_if_else() {
        let out = parse_module("if true:\n    pass\nelse:\n    pass\n");
        assert!(out.contains("If"));
    }

    #[test]
    fn parses_class_with_method() {
        let out = parse_module("class Counter:\n    func inc(self):\n        pass\n");
        assert!(out.contains("ClassDef"));
        assert!(out.contains("FunctionDef"));
    }

    #[test]
    fn parses_for_with_target() {
        let out = parse_module("for i in items:\n    pass\n");
        assert!(out.contains("For"));
    }

    #[test]
    fn retry_outside_fallback_is_an_error() {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex("retry\n", &mut interner).unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut issues = IssueTracker::new();
        let mut scopes = ScopeGraph::new();
        let mut parser = StmtParser::new(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut issues, &mut scopes);
        let _ = parser.parse_module();
        assert!(issues.has_errors());
    }
}
