//! Parser (spec §4.3): Pratt expression parser plus recursive-descent
//! statement parser, producing an AST rooted at a `Module` node.

pub mod expr;
pub mod stmt;

use crate::arena::Arena;
use crate::ast::{Expr, Stmt};
use crate::diagnostics::{CompilerFailure, IssueTracker};
use crate::intern::Interner;
use crate::scope::ScopeGraph;
use crate::token::Token;

pub struct ParseOutput<'a> {
    pub module: &'a Stmt<'a>,
    pub issues: IssueTracker,
}

/// Parses one module's token stream into an AST, using `expr_arena` and
/// `stmt_arena` owned by the caller (so the AST's lifetime matches the
/// caller's compilation-unit scope) and populating `scopes` with the
/// module's scope tree.
pub fn parse_module<'a>(
    tokens: &[Token],
    expr_arena: &'a Arena<Expr<'a>>,
    stmt_arena: &'a Arena<Stmt<'a>>,
    interner: &mut Interner,
    scopes: &mut ScopeGraph,
) -> Result<ParseOutput<'a>, CompilerFailure> {
    let mut issues = IssueTracker::new();
    let module = {
        let mut parser =
            stmt::StmtParser::new(tokens, expr_arena, stmt_arena, interner, &mut issues, scopes);
        parser.parse_module()?
    };
    issues.check_errors()?;
    Ok(ParseOutput { module, issues })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_module_end_to_end() {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex(
            "class Counter:\n    int value = 0\n    func inc(self):\n        self.value = self.value + 1\n",
            &mut interner,
        )
        .unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scopes = ScopeGraph::new();
        let out = parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
        assert!(matches!(out.module, Stmt::Module { .. }));
    }
}
