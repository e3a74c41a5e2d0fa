//! Statement AST nodes (spec §3), arena-allocated per module like the
//! teacher's `ast/stmt.rs`.

use crate::ast::expr::Expr;
use crate::intern::Symbol;
use crate::scope::ScopeId;
use crate::token::Span;

#[derive(Debug, Clone)]
pub struct Param<'a> {
    pub name: Symbol,
    pub type_annotation: Option<&'a Expr<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PromptSegment<'a> {
    pub text_before: String,
    pub expr: Option<&'a Expr<'a>>,
}

#[derive(Debug, Clone)]
pub struct LlmTemplate<'a> {
    pub sys_segments: Vec<PromptSegment<'a>>,
    pub user_segments: Vec<PromptSegment<'a>>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler<'a> {
    pub exc_type: Option<Symbol>,
    pub bind_name: Option<Symbol>,
    pub body: Vec<&'a Stmt<'a>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt<'a> {
    Module {
        body: Vec<&'a Stmt<'a>>,
        scope: ScopeId,
    },
    FunctionDef {
        name: Symbol,
        params: Vec<Param<'a>>,
        return_type: Option<&'a Expr<'a>>,
        body: Vec<&'a Stmt<'a>>,
        scope: ScopeId,
        span: Span,
    },
    LLMFunctionDef {
        name: Symbol,
        params: Vec<Param<'a>>,
        return_type: Option<&'a Expr<'a>>,
        template: LlmTemplate<'a>,
        scope: ScopeId,
        span: Span,
    },
    ClassDef {
        name: Symbol,
        base: Option<Symbol>,
        body: Vec<&'a Stmt<'a>>,
        scope: ScopeId,
        span: Span,
    },
    Assign {
        target: &'a Expr<'a>,
        type_annotation: Option<&'a Expr<'a>>,
        value: &'a Expr<'a>,
        span: Span,
    },
    AugAssign {
        target: &'a Expr<'a>,
        op: crate::ast::expr::BinaryOpKind,
        value: &'a Expr<'a>,
        span: Span,
    },
    If {
        test: &'a Expr<'a>,
        body: Vec<&'a Stmt<'a>>,
        orelse: Vec<&'a Stmt<'a>>,
        llm_fallback: Option<Vec<&'a Stmt<'a>>>,
        span: Span,
    },
    While {
        test: &'a Expr<'a>,
        body: Vec<&'a Stmt<'a>>,
        llm_fallback: Option<Vec<&'a Stmt<'a>>>,
        span: Span,
    },
    For {
        target: Option<Symbol>,
        iter: &'a Expr<'a>,
        body: Vec<&'a Stmt<'a>>,
        llm_fallback: Option<Vec<&'a Stmt<'a>>>,
        scope: ScopeId,
        span: Span,
    },
    Try {
        body: Vec<&'a Stmt<'a>>,
        handlers: Vec<ExceptHandler<'a>>,
        orelse: Vec<&'a Stmt<'a>>,
        finally_body: Vec<&'a Stmt<'a>>,
        span: Span,
    },
    Raise {
        value: Option<&'a Expr<'a>>,
        span: Span,
    },
    Return {
        value: Option<&'a Expr<'a>>,
        span: Span,
    },
    Pass(Span),
    Break(Span),
    Continue(Span),
    Retry(Span),
    Import {
        /// Dotted path (`a.b.c`), interned whole; `level` leading dots
        /// denote parent packages (0 for an absolute, workspace-rooted path).
        module: Symbol,
        level: u32,
        alias: Option<Symbol>,
        span: Span,
    },
    ImportFrom {
        module: Symbol,
        level: u32,
        names: Vec<(Symbol, Option<Symbol>)>,
        span: Span,
    },
    ExprStmt {
        expr: &'a Expr<'a>,
        span: Span,
    },
}

impl<'a> Stmt<'a> {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Module { .. } => Span::new(0, 0, 0),
            Stmt::FunctionDef { span, .. }
            | Stmt::LLMFunctionDef { span, .. }
            | Stmt::ClassDef { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::Raise { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Import { span, .. }
            | Stmt::ImportFrom { span, .. }
            | Stmt::ExprStmt { span, .. } => *span,
            Stmt::Pass(s) | Stmt::Break(s) | Stmt::Continue(s) | Stmt::Retry(s) => *s,
        }
    }
}
