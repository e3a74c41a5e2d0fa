//! Pre-Scanner (spec §4.2): a lookahead-only pass over a scope body's token
//! stream that registers function/LLM-function/class/top-level-variable
//! names before the parser descends into that scope, so declaration-vs-
//! expression disambiguation has forward references available.

use crate::intern::{Interner, Symbol};
use crate::scope::{RuntimeSymbol, ScopeGraph, ScopeId, SymbolKind};
use crate::token::{Token, TokenKind};
use crate::types::Type;

/// Registers top-level declarations found in `tokens[start..end)` (one
/// scope body, already delimited by the caller at matching
/// Indent/Dedent) into `scope`, without registering anything introduced
/// inside a nested body.
pub fn prescan(
    tokens: &[Token],
    start: usize,
    end: usize,
    graph: &mut ScopeGraph,
    scope: ScopeId,
    interner: &Interner,
) {
    let mut i = start;
    let mut depth = 0i32;
    while i < end {
        match &tokens[i].kind {
            TokenKind::Indent => {
                depth += 1;
                i += 1;
                continue;
            }
            TokenKind::Dedent => {
                depth -= 1;
                i += 1;
                continue;
            }
            _ if depth > 0 => {
                i += 1;
                continue;
            }
            TokenKind::Func => {
                if let Some((name, ret, next)) = scan_function_header(tokens, i + 1, end) {
                    register(graph, scope, interner, name, SymbolKind::Function, ret);
                    i = next;
                    continue;
                }
            }
            TokenKind::Llm => {
                if let Some((name, ret, next)) = scan_function_header(tokens, i + 1, end) {
                    register(graph, scope, interner, name, SymbolKind::Function, ret);
                    i = next;
                    continue;
                }
            }
            TokenKind::Class => {
                if let TokenKind::Identifier(sym) = tokens.get(i + 1).map(|t| &t.kind).unwrap_or(&TokenKind::Eof) {
                    register(graph, scope, interner, *sym, SymbolKind::UserType, None);
                }
            }
            TokenKind::Identifier(type_sym) => {
                if let Some(TokenKind::Identifier(name_sym)) = tokens.get(i + 1).map(|t| &t.kind) {
                    if is_type_name(interner.resolve(*type_sym)) {
                        register(
                            graph,
                            scope,
                            interner,
                            *name_sym,
                            SymbolKind::Variable,
                            Type::get_builtin_type(interner.resolve(*type_sym)),
                        );
                    }
                }
            }
            TokenKind::Var => {
                if let Some(TokenKind::Identifier(name_sym)) = tokens.get(i + 1).map(|t| &t.kind) {
                    register(graph, scope, interner, *name_sym, SymbolKind::Variable, Some(Type::Any));
                }
            }
            _ => {}
        }
        i += 1;
    }
}

fn is_type_name(word: &str) -> bool {
    matches!(
        word,
        "int" | "float" | "str" | "bool" | "void" | "var" | "Callable" | "List" | "Dict"
    )
}

fn register(
    graph: &mut ScopeGraph,
    scope: ScopeId,
    interner: &Interner,
    name: Symbol,
    kind: SymbolKind,
    type_info: Option<Type>,
) {
    if graph.node(scope).names.contains_key(&name) {
        return;
    }
    let _ = interner;
    let mut sym = RuntimeSymbol::new(name, kind);
    sym.type_info = type_info;
    graph.define(scope, sym);
}

/// Scans `func NAME(...) [-> TYPE]:` or `llm NAME(...) [-> TYPE]:`
/// starting right after the keyword; returns the function name, the
/// return-type token text (if any), and the index just past the header's
/// NEWLINE.
fn scan_function_header(
    tokens: &[Token],
    mut i: usize,
    end: usize,
) -> Option<(Symbol, Option<Type>, usize)> {
    let name = match tokens.get(i)?.kind {
        TokenKind::Identifier(s) => s,
        _ => return None,
    };
    i += 1;
    if !matches!(tokens.get(i)?.kind, TokenKind::LParen) {
        return None;
    }
    let mut depth = 1;
    i += 1;
    while i < end && depth > 0 {
        match tokens.get(i)?.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    let mut ret_type = None;
    if matches!(tokens.get(i).map(|t| &t.kind), Some(TokenKind::Arrow)) {
        i += 1;
        if let Some(TokenKind::Identifier(sym)) = tokens.get(i).map(|t| &t.kind) {
            ret_type = None; // resolved lazily by semantic analysis via declared_type_node
            let _ = sym;
        }
    }
    while i < end && !matches!(tokens.get(i)?.kind, TokenKind::Newline) {
        i += 1;
    }
    Some((name, ret_type, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::scope::ScopeKind;

    #[test]
    fn registers_top_level_function_and_class() {
        let mut interner = Interner::new();
        let (tokens, _) = lex(
            "func greet(name):\n    pass\nclass Counter:\n    pass\n",
            &mut interner,
        )
        .unwrap();
        let mut graph = ScopeGraph::new();
        let global = graph.new_root(ScopeKind::Global);
        prescan(&tokens, 0, tokens.len(), &mut graph, global, &interner);
        let greet = interner.lookup("greet").unwrap();
        let counter = interner.lookup("Counter").unwrap();
        assert!(graph.resolve(global, greet).is_some());
        assert!(graph.resolve(global, counter).is_some());
    }

    #[test]
    fn registers_top_level_variable_declaration() {
        let mut interner = Interner::new();
        let (tokens, _) = lex("int total = 0\n", &mut interner).unwrap();
        let mut graph = ScopeGraph::new();
        let global = graph.new_root(ScopeKind::Global);
        prescan(&tokens, 0, tokens.len(), &mut graph, global, &interner);
        let total = interner.lookup("total").unwrap();
        let sym = graph.resolve(global, total).unwrap();
        assert_eq!(sym.type_info, Some(Type::Int));
    }

    #[test]
    fn does_not_register_nested_locals() {
        let mut interner = Interner::new();
        let (tokens, _) = lex(
            "func outer():\n    int inner_var = 1\n",
            &mut interner,
        )
        .unwrap();
        let mut graph = ScopeGraph::new();
        let global = graph.new_root(ScopeKind::Global);
        prescan(&tokens, 0, tokens.len(), &mut graph, global, &interner);
        let inner = interner.lookup("inner_var").unwrap();
        assert!(graph.resolve(global, inner).is_none());
    }
}
