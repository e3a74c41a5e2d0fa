//! Pratt expression parser (spec §4.3).

use crate::arena::Arena;
use crate::ast::expr::{
    BehaviorExpr, BehaviorSegment, BinaryOpKind, BoolOpKind, CompareOpKind, Expr, Literal, Scene,
    UnaryOpKind,
};
use crate::diagnostics::{Code, CompilerFailure, IssueTracker, Severity};
use crate::intern::Interner;
use crate::token::{Span, Token, TokenKind};

pub struct ExprParser<'a, 'src> {
    pub tokens: &'src [Token],
    pub pos: usize,
    pub arena: &'a Arena<Expr<'a>>,
    pub interner: &'src mut Interner,
    pub issues: &'src mut IssueTracker,
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Prec {
    None,
    Assignment,
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Equality,
    Comparison,
    Shift,
    Additive,
    Multiplicative,
    Unary,
    Call,
}

impl<'a, 'src> ExprParser<'a, 'src> {
    pub fn new(
        tokens: &'src [Token],
        arena: &'a Arena<Expr<'a>>,
        interner: &'src mut Interner,
        issues: &'src mut IssueTracker,
    ) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            arena,
            interner,
            issues,
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn advance(&mut self) -> &Token {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    pub fn parse_expr(&mut self) -> Result<&'a Expr<'a>, CompilerFailure> {
        self.parse_precedence(Prec::Or)
    }

    fn binding_power(kind: &TokenKind) -> Prec {
        match kind {
            TokenKind::Or => Prec::Or,
            TokenKind::And => Prec::And,
            TokenKind::Pipe => Prec::BitOr,
            TokenKind::Caret => Prec::BitXor,
            TokenKind::Amp => Prec::BitAnd,
            TokenKind::EqEq | TokenKind::NotEq => Prec::Equality,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => Prec::Comparison,
            TokenKind::Shl | TokenKind::Shr => Prec::Shift,
            TokenKind::Plus | TokenKind::Minus => Prec::Additive,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Prec::Multiplicative,
            TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Prec::Call,
            _ => Prec::None,
        }
    }

    fn parse_precedence(&mut self, min_prec: Prec) -> Result<&'a Expr<'a>, CompilerFailure> {
        let mut left = self.parse_unary()?;

        // Comparison chaining: a < b < c.
        if matches!(
            self.peek(),
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq | TokenKind::EqEq | TokenKind::NotEq
        ) && min_prec <= Prec::Comparison
        {
            let start = left.span();
            let mut ops = Vec::new();
            let mut comparators = Vec::new();
            while let Some(op) = compare_op(self.peek()) {
                self.advance();
                ops.push(op);
                comparators.push(self.parse_unary()?);
                if !matches!(
                    self.peek(),
                    TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq | TokenKind::EqEq | TokenKind::NotEq
                ) {
                    break;
                }
            }
            left = self.arena.alloc(Expr::Compare {
                left,
                ops,
                comparators,
                span: start,
            });
        }

        loop {
            let prec = Self::binding_power(self.peek());
            if prec == Prec::None || prec < min_prec {
                break;
            }
            match self.peek() {
                TokenKind::And | TokenKind::Or => {
                    left = self.parse_bool_op(left, prec)?;
                }
                TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::EqEq
                | TokenKind::NotEq => break, // handled above
                _ => {
                    left = self.parse_binary(left, prec)?;
                }
            }
        }
        Ok(left)
    }

    fn parse_bool_op(
        &mut self,
        first: &'a Expr<'a>,
        prec: Prec,
    ) -> Result<&'a Expr<'a>, CompilerFailure> {
        let op = if matches!(self.peek(), TokenKind::And) {
            BoolOpKind::And
        } else {
            BoolOpKind::Or
        };
        let mut values = vec![first];
        let span = first.span();
        while Self::binding_power(self.peek()) == prec
            && matches!(self.peek(), TokenKind::And | TokenKind::Or)
        {
            self.advance();
            let next_min = if prec == Prec::Or { Prec::And } else { Prec::BitOr };
            values.push(self.parse_precedence(next_min)?);
        }
        Ok(self.arena.alloc(Expr::BoolOp { op, values, span }))
    }

    fn parse_binary(
        &mut self,
        left: &'a Expr<'a>,
        prec: Prec,
    ) -> Result<&'a Expr<'a>, CompilerFailure> {
        let op_tok = self.advance().kind.clone();
        let op = binary_op(&op_tok).expect("binding_power only returns binary ops here");
        let next_min = bump(prec);
        let right = self.parse_precedence(next_min)?;
        let span = left.span();
        Ok(self.arena.alloc(Expr::BinOp { op, left, right, span }))
    }

    fn parse_unary(&mut self) -> Result<&'a Expr<'a>, CompilerFailure> {
        match self.peek() {
            TokenKind::Minus => {
                let span = self.peek_span();
                self.advance();
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(self.arena.alloc(Expr::UnaryOp {
                    op: UnaryOpKind::Neg,
                    operand,
                    span,
                }))
            }
            TokenKind::Not => {
                let span = self.peek_span();
                self.advance();
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(self.arena.alloc(Expr::UnaryOp {
                    op: UnaryOpKind::Not,
                    operand,
                    span,
                }))
            }
            TokenKind::Tilde => {
                let span = self.peek_span();
                self.advance();
                let operand = self.parse_precedence(Prec::Unary)?;
                Ok(self.arena.alloc(Expr::UnaryOp {
                    op: UnaryOpKind::BitNot,
                    operand,
                    span,
                }))
            }
            _ => self.parse_call_or_postfix(),
        }
    }

    fn parse_call_or_postfix(&mut self) -> Result<&'a Expr<'a>, CompilerFailure> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    let span = expr.span();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if self.check(&TokenKind::Comma) {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "expected ')' after arguments")?;
                    expr = self.arena.alloc(Expr::Call {
                        callee: expr,
                        args,
                        intent: None,
                        span,
                    });
                }
                TokenKind::Dot => {
                    let span = expr.span();
                    self.advance();
                    let attr = match self.advance().kind.clone() {
                        TokenKind::Identifier(sym) => sym,
                        _ => {
                            self.issues.report(
                                Severity::Error,
                                Code::PAR_EXPECTED_TOKEN,
                                "expected attribute name after '.'",
                                Some(span),
                            )?;
                            crate::intern::Symbol::EMPTY
                        }
                    };
                    expr = self.arena.alloc(Expr::Attribute { receiver: expr, attr, span });
                }
                TokenKind::LBracket => {
                    let span = expr.span();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "expected ']' after subscript")?;
                    expr = self.arena.alloc(Expr::Subscript { receiver: expr, index, span });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<&'a Expr<'a>, CompilerFailure> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::Number(sym) => {
                self.advance();
                let text = self.interner.resolve(sym).to_string();
                let lit = if text.contains('.') || text.contains('e') || text.contains('E') {
                    Literal::Float(text.parse().unwrap_or(0.0))
                } else if let Some(hex) = text.strip_prefix("0x") {
                    Literal::Int(i64::from_str_radix(hex, 16).unwrap_or(0))
                } else if let Some(bin) = text.strip_prefix("0b") {
                    Literal::Int(i64::from_str_radix(bin, 2).unwrap_or(0))
                } else {
                    Literal::Int(text.parse().unwrap_or(0))
                };
                Ok(self.arena.alloc(Expr::Constant(lit, span)))
            }
            TokenKind::StringLiteral(sym) | TokenKind::RawStringLiteral(sym) => {
                self.advance();
                let text = self.interner.resolve(sym).to_string();
                Ok(self.arena.alloc(Expr::Constant(Literal::Str(text), span)))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.arena.alloc(Expr::Constant(Literal::Bool(true), span)))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.arena.alloc(Expr::Constant(Literal::Bool(false), span)))
            }
            TokenKind::None_ => {
                self.advance();
                Ok(self.arena.alloc(Expr::Constant(Literal::None_, span)))
            }
            TokenKind::Identifier(sym) => {
                self.advance();
                Ok(self.arena.alloc(Expr::Name(sym, span)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "expected ']' to close list")?;
                Ok(self.arena.alloc(Expr::ListExpr(items, span)))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let k = self.parse_expr()?;
                        self.expect(TokenKind::Colon, "expected ':' in dict entry")?;
                        let v = self.parse_expr()?;
                        items.push((k, v));
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBrace, "expected '}' to close dict")?;
                Ok(self.arena.alloc(Expr::DictExpr(items, span)))
            }
            TokenKind::BehaviorMarker(tag) => self.parse_behavior_expr(tag, span),
            other => {
                self.issues.report(
                    Severity::Error,
                    Code::PAR_EXPECTED_TOKEN,
                    format!("unexpected token in expression position: {:?}", other),
                    Some(span),
                )?;
                self.advance();
                Ok(self.arena.alloc(Expr::Constant(Literal::None_, span)))
            }
        }
    }

    fn parse_behavior_expr(
        &mut self,
        tag: crate::intern::Symbol,
        span: Span,
    ) -> Result<&'a Expr<'a>, CompilerFailure> {
        self.advance(); // BehaviorMarker
        let mut segments = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::RawText(sym) => {
                    self.advance();
                    segments.push(BehaviorSegment::Text(self.interner.resolve(sym).to_string()));
                }
                TokenKind::ParamPlaceholder(sym) => {
                    self.advance();
                    let text = self.interner.resolve(sym).to_string();
                    let sub_expr = self.parse_sub_expr(&text, span)?;
                    segments.push(BehaviorSegment::Expr(sub_expr));
                }
                TokenKind::BehaviorEnd => {
                    self.advance();
                    break;
                }
                _ => break,
            }
        }
        Ok(self.arena.alloc(Expr::Behavior(BehaviorExpr {
            tag,
            segments,
            intent: None,
            scene: Scene::General,
            span,
        })))
    }

    /// Re-lexes and re-parses `text` (a `$__expr__` placeholder body) as an
    /// ordinary expression inside a fresh token stream (§4.3).
    fn parse_sub_expr(&mut self, text: &str, span: Span) -> Result<&'a Expr<'a>, CompilerFailure> {
        let (sub_tokens, _) = crate::lexer::lex(&format!("{}\n", text), self.interner)
            .unwrap_or_else(|_| (vec![Token::new(TokenKind::Eof, span)], IssueTracker::new()));
        let mut sub_parser = ExprParser {
            tokens: &sub_tokens,
            pos: 0,
            arena: self.arena,
            interner: self.interner,
            issues: self.issues,
        };
        sub_parser.parse_expr()
    }

    fn expect(&mut self, kind: TokenKind, msg: &str) -> Result<(), CompilerFailure> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            self.issues.report(
                Severity::Error,
                Code::PAR_EXPECTED_TOKEN,
                msg.to_string(),
                Some(self.peek_span()),
            )
        }
    }
}

fn bump(prec: Prec) -> Prec {
    match prec {
        Prec::None => Prec::Assignment,
        Prec::Assignment => Prec::Or,
        Prec::Or => Prec::And,
        Prec::And => Prec::BitOr,
        Prec::BitOr => Prec::BitXor,
        Prec::BitXor => Prec::BitAnd,
        Prec::BitAnd => Prec::Equality,
        Prec::Equality => Prec::Comparison,
        Prec::Comparison => Prec::Shift,
        Prec::Shift => Prec::Additive,
        Prec::Additive => Prec::Multiplicative,
        Prec::Multiplicative => Prec::Unary,
        Prec::Unary => Prec::Call,
        Prec::Call => Prec::Call,
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOpKind> {
    Some(match kind {
        TokenKind::Plus => BinaryOpKind::Add,
        TokenKind::Minus => BinaryOpKind::Sub,
        TokenKind::Star => BinaryOpKind::Mul,
        TokenKind::Slash => BinaryOpKind::Div,
        TokenKind::Percent => BinaryOpKind::Mod,
        TokenKind::Amp => BinaryOpKind::BitAnd,
        TokenKind::Pipe => BinaryOpKind::BitOr,
        TokenKind::Caret => BinaryOpKind::BitXor,
        TokenKind::Shl => BinaryOpKind::Shl,
        TokenKind::Shr => BinaryOpKind::Shr,
        _ => return None,
    })
}

fn compare_op(kind: &TokenKind) -> Option<CompareOpKind> {
    Some(match kind {
        TokenKind::Lt => CompareOpKind::Lt,
        TokenKind::Gt => CompareOpKind::Gt,
        TokenKind::LtEq => CompareOpKind::LtEq,
        TokenKind::GtEq => CompareOpKind::GtEq,
        TokenKind::EqEq => CompareOpKind::Eq,
        TokenKind::NotEq => CompareOpKind::NotEq,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::Expr;

    fn parse(src: &str) -> String {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex(src, &mut interner).unwrap();
        let arena: Arena<Expr> = Arena::new();
        let mut issues = IssueTracker::new();
        let mut parser = ExprParser::new(&tokens, &arena, &mut interner, &mut issues);
        format!("{:?}", parser.parse_expr().unwrap())
    }

    #[test]
    fn bitwise_precedence_matches_spec_example() {
        // (10 & 3) | (5 ^ 1)
        let out = parse("(10 & 3) | (5 ^ 1)\n");
        assert!(out.contains("BitOr"));
    }

    #[test]
    fn comparison_chains_into_single_compare_node() {
        let out = parse("a < b < c\n");
        assert!(out.contains("Compare"));
        assert!(out.contains("ops: [Lt, Lt]"));
    }

    #[test]
    fn consecutive_and_flattens_into_one_bool_op() {
        let out = parse("a and b and c\n");
        let count = out.matches("BoolOp").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn call_and_attribute_chain_parse() {
        let out = parse("obj.method(1, 2)\n");
        assert!(out.contains("Call"));
        assert!(out.contains("Attribute"));
    }
}
