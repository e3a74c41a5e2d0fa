//! Two-mode lexer: `NORMAL` code text and `LLM_BLOCK` prompt text
//! (spec §4.1), grounded in `examples/original_source/core/compiler/lexer/lexer.py`
//! and `indent_processor.py`, restructured as a single char-stream scanner
//! the way the teacher crate's `lexer.rs` is one file rather than the
//! original's component split.

use crate::diagnostics::{Code, CompilerFailure, IssueTracker, Severity};
use crate::intern::{Interner, Symbol};
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    LlmBlock,
}

pub struct Lexer<'i> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    interner: &'i mut Interner,
    issues: IssueTracker,
    mode_stack: Vec<Mode>,
    indent_stack: Vec<u32>,
    paren_level: i32,
    continuation: bool,
    is_new_line: bool,
    tokens: Vec<Token>,
    /// Set when an `llm` header pushes `Mode::LlmBlock`; cleared once the
    /// block's opening `Indent` token has been emitted.
    llm_block_needs_open_indent: bool,
}

impl<'i> Lexer<'i> {
    pub fn new(source: &str, interner: &'i mut Interner) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            interner,
            issues: IssueTracker::new(),
            mode_stack: vec![Mode::Normal],
            indent_stack: vec![0],
            paren_level: 0,
            continuation: false,
            is_new_line: true,
            tokens: Vec::new(),
            llm_block_needs_open_indent: false,
        }
    }

    pub fn tokenize(mut self) -> Result<(Vec<Token>, IssueTracker), CompilerFailure> {
        tracing::debug!(target: "ibci::lexer", "starting tokenization");
        while !self.is_at_end() {
            self.process_line()?;
        }
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.tokens
                .push(Token::new(TokenKind::Dedent, Span::new(self.line, 0, 0)));
        }
        self.tokens
            .push(Token::new(TokenKind::Eof, Span::new(self.line, 0, 0)));
        self.issues.check_errors()?;
        tracing::debug!(target: "ibci::lexer", tokens = self.tokens.len(), "tokenization complete");
        Ok((self.tokens, self.issues))
    }

    fn process_line(&mut self) -> Result<(), CompilerFailure> {
        let current_mode = *self.mode_stack.last().unwrap();

        if current_mode == Mode::Normal {
            let should_indent = !self.continuation
                && self.paren_level == 0
                && self.is_new_line
                && !self.in_string_literal();

            if should_indent {
                match self.process_indentation()? {
                    Some(tokens) => self.tokens.extend(tokens),
                    None => return Ok(()),
                }
            } else {
                self.skip_inline_whitespace();
                self.continuation = false;
            }
            self.scan_normal_line()?;
        } else {
            // An `llm` block's body is prompt text: its own leading
            // whitespace is content, not structure, so it is never run
            // through `process_indentation`. The parser still expects the
            // body to be bracketed in `Indent`/`Dedent` like any other
            // block, so those are emitted exactly once each, on entry and
            // on the `llmend` that pops back out of `Mode::LlmBlock`.
            if self.llm_block_needs_open_indent {
                self.tokens
                    .push(Token::new(TokenKind::Indent, Span::new(self.line, 0, 0)));
                self.llm_block_needs_open_indent = false;
            }
            let depth_before = self.mode_stack.len();
            self.scan_llm_chunk()?;
            if self.mode_stack.len() < depth_before {
                self.tokens
                    .push(Token::new(TokenKind::Dedent, Span::new(self.line, 0, 0)));
            }
        }
        Ok(())
    }

    fn in_string_literal(&self) -> bool {
        false
    }

    /// Mirrors `IndentProcessor.process`: returns `Some(tokens)` for a
    /// content line (possibly empty), `None` for a blank/comment-only line
    /// whose newline has already been consumed.
    fn process_indentation(&mut self) -> Result<Option<Vec<Token>>, CompilerFailure> {
        let start_line = self.line;
        let mut spaces = 0u32;
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
            spaces += 1;
        }
        if self.peek() == Some('\n') {
            self.advance();
            return Ok(None);
        }
        if self.peek() == Some('#') {
            self.skip_comment();
            if self.peek() == Some('\n') {
                self.advance();
            }
            return Ok(None);
        }
        if self.is_at_end() {
            return Ok(None);
        }

        let mut tokens = Vec::new();
        let last = *self.indent_stack.last().unwrap();
        if spaces > last {
            self.indent_stack.push(spaces);
            tokens.push(Token::new(TokenKind::Indent, Span::new(start_line, 0, 0)));
        } else if spaces < last {
            while spaces < *self.indent_stack.last().unwrap() {
                self.indent_stack.pop();
                tokens.push(Token::new(TokenKind::Dedent, Span::new(start_line, 0, 0)));
            }
            if spaces != *self.indent_stack.last().unwrap() {
                self.issues.report(
                    Severity::Error,
                    Code::PAR_INDENTATION_ERROR,
                    "unindent does not match any outer indentation level",
                    Some(Span::new(start_line, 0, 0)),
                )?;
            }
        }
        Ok(Some(tokens))
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while self.peek() != Some('\n') && !self.is_at_end() {
            self.advance();
        }
    }

    fn scan_normal_line(&mut self) -> Result<(), CompilerFailure> {
        loop {
            self.skip_inline_whitespace();
            if self.is_at_end() {
                self.is_new_line = true;
                return Ok(());
            }
            let c = self.peek().unwrap();

            if c == '\\' && self.peek_at(1) == Some('\n') {
                self.advance();
                self.advance();
                self.continuation = true;
                return Ok(());
            }
            if c == '\n' {
                self.advance();
                if self.paren_level > 0 {
                    continue;
                }
                self.tokens.push(Token::new(
                    TokenKind::Newline,
                    Span::new(self.line.saturating_sub(1), 0, 0),
                ));
                self.is_new_line = true;
                return Ok(());
            }
            if c == '#' {
                self.skip_comment();
                continue;
            }

            let start_line = self.line;
            let start_col = self.column;

            if c == '@' {
                self.scan_behavior_or_intent(start_line, start_col)?;
                continue;
            }
            if c.is_ascii_digit() {
                self.scan_number(start_line, start_col);
                continue;
            }
            if c == '"' || c == '\'' {
                self.scan_string(c, false, start_line, start_col)?;
                continue;
            }
            if (c == 'r' || c == 'R') && matches!(self.peek_at(1), Some('"') | Some('\'')) {
                self.advance();
                let quote = self.peek().unwrap();
                self.scan_string(quote, true, start_line, start_col)?;
                continue;
            }
            if c.is_alphabetic() || c == '_' {
                self.scan_identifier_or_keyword(start_line, start_col);
                continue;
            }
            if let Some(kind) = self.scan_operator() {
                self.tokens
                    .push(Token::new(kind, Span::new(start_line, start_col, 1)));
                if matches!(kind, TokenKind::Llm) {
                    // `llm name(params): NEWLINE` handled by parser; mode
                    // switch happens when the parser finishes the header.
                }
                continue;
            }

            self.advance();
        }
    }

    fn scan_behavior_or_intent(&mut self, line: u32, col: u32) -> Result<(), CompilerFailure> {
        self.advance(); // consume '@'
        if self.is_new_line_context_for_intent() {
            let mut text = String::new();
            while self.peek() != Some('\n') && !self.is_at_end() {
                text.push(self.advance().unwrap());
            }
            let sym = self.interner.intern(text.trim());
            self.tokens.push(Token::new(
                TokenKind::Intent(sym),
                Span::new(line, col, text.len() as u32),
            ));
            return Ok(());
        }

        let mut tag = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            tag.push(self.advance().unwrap());
        }
        if self.peek() != Some('~') {
            self.issues.report(
                Severity::Error,
                Code::LEX_UNTERMINATED_BEHAVIOR,
                "expected '~' to open behavior expression",
                Some(Span::new(line, col, 1)),
            )?;
            return Ok(());
        }
        self.advance();
        let tag_sym = self.interner.intern(&tag);
        self.tokens.push(Token::new(
            TokenKind::BehaviorMarker(tag_sym),
            Span::new(line, col, 1),
        ));
        self.scan_behavior_body(line)?;
        Ok(())
    }

    fn is_new_line_context_for_intent(&self) -> bool {
        matches!(self.peek(), Some(' ') | Some('\t'))
    }

    fn scan_behavior_body(&mut self, open_line: u32) -> Result<(), CompilerFailure> {
        let mut raw = String::new();
        loop {
            if self.is_at_end() {
                self.issues.report(
                    Severity::Error,
                    Code::LEX_UNTERMINATED_BEHAVIOR,
                    "unterminated behavior expression",
                    Some(Span::new(open_line, 0, 0)),
                )?;
                return Ok(());
            }
            let c = self.peek().unwrap();
            if c == '\\' && matches!(self.peek_at(1), Some('~') | Some('$')) {
                self.advance();
                raw.push(self.advance().unwrap());
                continue;
            }
            if c == '~' {
                self.advance();
                if !raw.is_empty() {
                    let sym = self.interner.intern(&raw);
                    self.tokens.push(Token::new(
                        TokenKind::RawText(sym),
                        Span::new(self.line, 0, raw.len() as u32),
                    ));
                    raw.clear();
                }
                self.tokens
                    .push(Token::new(TokenKind::BehaviorEnd, Span::new(self.line, 0, 1)));
                return Ok(());
            }
            if c == '$' {
                if !raw.is_empty() {
                    let sym = self.interner.intern(&raw);
                    self.tokens.push(Token::new(
                        TokenKind::RawText(sym),
                        Span::new(self.line, 0, raw.len() as u32),
                    ));
                    raw.clear();
                }
                self.advance();
                let expr_text = self.scan_placeholder_text();
                let sym = self.interner.intern(&expr_text);
                self.tokens.push(Token::new(
                    TokenKind::ParamPlaceholder(sym),
                    Span::new(self.line, 0, expr_text.len() as u32),
                ));
                continue;
            }
            raw.push(self.advance().unwrap());
        }
    }

    /// A `$name(.attr|[expr])*` reference: a bare identifier optionally
    /// followed by attribute/subscript chains, balancing brackets.
    fn scan_placeholder_text(&mut self) -> String {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }
        loop {
            match self.peek() {
                Some('.') => {
                    text.push(self.advance().unwrap());
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                        text.push(self.advance().unwrap());
                    }
                }
                Some('[') => {
                    let mut depth = 0i32;
                    loop {
                        match self.peek() {
                            Some('[') => {
                                depth += 1;
                                text.push(self.advance().unwrap());
                            }
                            Some(']') => {
                                depth -= 1;
                                text.push(self.advance().unwrap());
                                if depth == 0 {
                                    break;
                                }
                            }
                            Some(_) => text.push(self.advance().unwrap()),
                            None => break,
                        }
                    }
                }
                _ => break,
            }
        }
        text
    }

    fn scan_number(&mut self, line: u32, col: u32) {
        let mut text = String::new();
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('b')) {
            text.push(self.advance().unwrap());
            text.push(self.advance().unwrap());
            while matches!(self.peek(), Some(c) if c.is_alphanumeric()) {
                text.push(self.advance().unwrap());
            }
        } else {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
            if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit())
            {
                text.push(self.advance().unwrap());
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                }
            }
            if matches!(self.peek(), Some('e') | Some('E')) {
                let mut lookahead = 1;
                if matches!(self.peek_at(1), Some('+') | Some('-')) {
                    lookahead += 1;
                }
                if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        text.push(self.advance().unwrap());
                    }
                    while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                        text.push(self.advance().unwrap());
                    }
                }
            }
        }
        let sym = self.interner.intern(&text);
        self.tokens.push(Token::new(
            TokenKind::Number(sym),
            Span::new(line, col, text.len() as u32),
        ));
    }

    fn scan_string(
        &mut self,
        quote: char,
        raw: bool,
        line: u32,
        col: u32,
    ) -> Result<(), CompilerFailure> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    self.issues.report(
                        Severity::Error,
                        Code::LEX_UNTERMINATED_STRING,
                        "unterminated string literal",
                        Some(Span::new(line, col, 1)),
                    )?;
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') if !raw => {
                    self.advance();
                    match self.peek() {
                        Some('n') => {
                            text.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            text.push('\t');
                            self.advance();
                        }
                        Some('r') => {
                            text.push('\r');
                            self.advance();
                        }
                        Some('\\') => {
                            text.push('\\');
                            self.advance();
                        }
                        Some(q) if q == '"' || q == '\'' => {
                            text.push(q);
                            self.advance();
                        }
                        Some(_) => {
                            self.issues.report(
                                Severity::Error,
                                Code::LEX_INVALID_ESCAPE,
                                "invalid escape sequence",
                                Some(Span::new(self.line, self.column, 1)),
                            )?;
                            self.advance();
                        }
                        None => break,
                    }
                }
                Some('\\') if raw => {
                    text.push(self.advance().unwrap());
                    if let Some(c) = self.peek() {
                        text.push(c);
                        self.advance();
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
        let sym = self.interner.intern(&text);
        let kind = if raw {
            TokenKind::RawStringLiteral(sym)
        } else {
            TokenKind::StringLiteral(sym)
        };
        self.tokens
            .push(Token::new(kind, Span::new(line, col, text.len() as u32)));
        Ok(())
    }

    fn scan_identifier_or_keyword(&mut self, line: u32, col: u32) {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            text.push(self.advance().unwrap());
        }
        let kind = if let Some(kw) = crate::token::lookup_keyword(&text) {
            if matches!(kw, TokenKind::Llm) {
                // The rest of this line (name, params, `-> T`, `:`) is
                // still ordinary code and finishes scanning under
                // `Mode::Normal` regardless of what's on top of the mode
                // stack; the pushed mode only takes effect starting the
                // next line, i.e. the block's body.
                self.mode_stack.push(Mode::LlmBlock);
                self.llm_block_needs_open_indent = true;
            }
            kw
        } else {
            TokenKind::Identifier(self.interner.intern(&text))
        };
        self.tokens
            .push(Token::new(kind, Span::new(line, col, text.len() as u32)));
    }

    fn scan_operator(&mut self) -> Option<TokenKind> {
        let c = self.advance()?;
        let kind = match c {
            '+' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::MinusEq
                } else if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '&' => TokenKind::Amp,
            '|' => TokenKind::Pipe,
            '^' => TokenKind::Caret,
            '~' => TokenKind::Tilde,
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    TokenKind::Shl
                } else if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::LtEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Shr
                } else if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::NotEq
                } else {
                    return None;
                }
            }
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '(' => {
                self.paren_level += 1;
                TokenKind::LParen
            }
            ')' => {
                self.paren_level -= 1;
                TokenKind::RParen
            }
            '[' => {
                self.paren_level += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.paren_level -= 1;
                TokenKind::RBracket
            }
            '{' => {
                self.paren_level += 1;
                TokenKind::LBrace
            }
            '}' => {
                self.paren_level -= 1;
                TokenKind::RBrace
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Scans a chunk of an LLM block body: consumes up to the next section
    /// marker, `$__expr__` placeholder, or `llmend`, matching
    /// `LLMScanner.scan_chunk` in spirit.
    fn scan_llm_chunk(&mut self) -> Result<(), CompilerFailure> {
        self.skip_inline_whitespace();
        if self.peek() == Some('\n') {
            self.advance();
            return Ok(());
        }
        if self.peek() == Some('#') {
            self.skip_comment();
            return Ok(());
        }
        let line = self.line;
        let col = self.column;
        if self.matches_word("__sys__") {
            self.tokens
                .push(Token::new(TokenKind::LlmSys, Span::new(line, col, 7)));
            return Ok(());
        }
        if self.matches_word("__user__") {
            self.tokens
                .push(Token::new(TokenKind::LlmUser, Span::new(line, col, 8)));
            return Ok(());
        }
        if self.matches_word("llmend") {
            self.tokens
                .push(Token::new(TokenKind::LlmEnd, Span::new(line, col, 6)));
            if self.mode_stack.len() > 1 {
                self.mode_stack.pop();
            }
            return Ok(());
        }
        if self.peek() == Some('$') {
            self.advance();
            let expr_text = self.scan_placeholder_text();
            let sym = self.interner.intern(&expr_text);
            self.tokens.push(Token::new(
                TokenKind::ParamPlaceholder(sym),
                Span::new(line, col, expr_text.len() as u32),
            ));
            return Ok(());
        }

        let mut text = String::new();
        while !self.is_at_end()
            && self.peek() != Some('\n')
            && self.peek() != Some('$')
            && !self.looks_like_section_marker()
        {
            text.push(self.advance().unwrap());
        }
        if !text.is_empty() {
            let sym = self.interner.intern(&text);
            self.tokens.push(Token::new(
                TokenKind::RawText(sym),
                Span::new(line, col, text.len() as u32),
            ));
        }
        if self.peek() == Some('\n') {
            self.advance();
        }
        Ok(())
    }

    fn looks_like_section_marker(&self) -> bool {
        self.remaining_starts_with("__sys__")
            || self.remaining_starts_with("__user__")
            || self.remaining_starts_with("llmend")
    }

    fn remaining_starts_with(&self, word: &str) -> bool {
        let word_chars: Vec<char> = word.chars().collect();
        if self.pos + word_chars.len() > self.chars.len() {
            return false;
        }
        self.chars[self.pos..self.pos + word_chars.len()] == word_chars[..]
    }

    fn matches_word(&mut self, word: &str) -> bool {
        if self.remaining_starts_with(word) {
            for _ in 0..word.chars().count() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}

/// Public entry point mirroring `Lexer::tokenize` in the original.
pub fn lex(source: &str, interner: &mut Interner) -> Result<(Vec<Token>, IssueTracker), CompilerFailure> {
    Lexer::new(source, interner).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut interner = Interner::new();
        let (tokens, _) = lex(src, &mut interner).expect("lex ok");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_assignment_tokenizes() {
        let ks = kinds("int x = 1\n");
        assert!(matches!(ks[0], TokenKind::Identifier(_)));
        assert!(ks.contains(&TokenKind::Assign));
        assert!(matches!(
            ks.iter().find(|k| matches!(k, TokenKind::Number(_))),
            Some(_)
        ));
        assert_eq!(*ks.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn indentation_produces_indent_and_dedent() {
        let ks = kinds("if true:\n    pass\nelse:\n    pass\n");
        assert!(ks.contains(&TokenKind::Indent));
        assert!(ks.contains(&TokenKind::Dedent));
    }

    #[test]
    fn mismatched_dedent_reports_error() {
        let mut interner = Interner::new();
        let result = lex("if true:\n    pass\n  pass\n", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn bracket_suppresses_newline_emission() {
        let ks = kinds("var x = [\n1,\n2,\n]\n");
        let newline_count = ks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newline_count, 1);
    }

    #[test]
    fn raw_string_preserves_backslashes() {
        let mut interner = Interner::new();
        let (tokens, _) = lex("r\"a\\nb\"\n", &mut interner).unwrap();
        let TokenKind::RawStringLiteral(sym) = tokens[0].kind else {
            panic!("expected raw string, got {:?}", tokens[0].kind);
        };
        assert_eq!(interner.resolve(sym), "a\\nb");
    }

    #[test]
    fn unterminated_string_is_error() {
        let mut interner = Interner::new();
        let result = lex("var x = \"abc\n", &mut interner);
        assert!(result.is_err());
    }

    #[test]
    fn behavior_expression_emits_marker_and_raw_text() {
        let mut interner = Interner::new();
        let (tokens, _) = lex("@greet~ hello $name ~\n", &mut interner).unwrap();
        assert!(tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::BehaviorMarker(_))));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::BehaviorEnd));
        assert!(tokens
            .iter()
            .any(|t| matches!(t.kind, TokenKind::ParamPlaceholder(_))));
    }

    #[test]
    fn bitwise_operators_lex_individually() {
        let ks = kinds("int r = (10 & 3) | (5 ^ 1)\n");
        assert!(ks.contains(&TokenKind::Amp));
        assert!(ks.contains(&TokenKind::Pipe));
        assert!(ks.contains(&TokenKind::Caret));
    }
}
