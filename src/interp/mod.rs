//! Tree-walking evaluator (spec §4.5): owns the runtime scope stack, the
//! intent stack, instruction/recursion counters, and dispatches LLM calls
//! through the executor in [`llm`].

pub mod control;
pub mod dispatch;
pub mod env;
pub mod intrinsics;
pub mod llm;
pub mod value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::expr::{BoolOpKind, Expr, Scene};
use crate::ast::stmt::Stmt;
use crate::diagnostics::Code;
use crate::host::HostInterface;
use crate::intent::{IntentManager, IntentStack};
use crate::intern::{Interner, Symbol};
use crate::provider::{CallKind, LLMProvider};
use crate::token::Span;

use control::Signal;
use env::Env;
use llm::{CoerceTarget, DecisionOutcome, LlmExecutor};
use value::{ClassDef, FunctionDef, Instance, LlmFunctionDef, Value};

/// A single unified runtime-error kind (spec §7): a code, a message, and
/// the source location, deliberately not a `thiserror` enum-per-cause —
/// every runtime failure funnels through one shape.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub code: Code,
    pub message: String,
    pub span: Span,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (line {}, col {})",
            self.code, self.message, self.span.line, self.span.column
        )
    }
}

impl std::error::Error for RuntimeError {}

/// Either a genuine error or one of the internal control-flow signals
/// (§4.5, §4.6); propagated with `?` through expression and statement
/// evaluation and unwrapped by the nearest handler (function call,
/// loop, `try`, or the `llm_fallback` retry wrapper).
#[derive(Debug)]
pub enum EvalError<'a> {
    Error(RuntimeError),
    Signal(Signal<'a>),
}

impl<'a> From<RuntimeError> for EvalError<'a> {
    fn from(e: RuntimeError) -> Self {
        EvalError::Error(e)
    }
}

pub type EvalResult<'a, T> = Result<T, EvalError<'a>>;

fn scene_str(scene: Scene) -> &'static str {
    match scene {
        Scene::General => "GENERAL",
        Scene::Branch => "BRANCH",
        Scene::Loop => "LOOP",
    }
}

pub struct Interpreter<'a> {
    globals: Env<'a>,
    interner: &'a Interner,
    intents: IntentStack,
    executor: LlmExecutor,
    provider: Box<dyn LLMProvider>,
    host: Box<dyn HostInterface<'a> + 'a>,
    instruction_count: u64,
    max_instructions: u64,
    call_depth: u32,
    max_call_depth: u32,
    max_retries: u32,
    retry_counts: HashMap<(u32, u32), u32>,
}

impl<'a> Interpreter<'a> {
    pub fn new(interner: &'a Interner, provider: Box<dyn LLMProvider>, host: Box<dyn HostInterface<'a> + 'a>) -> Self {
        Interpreter {
            globals: Env::root(),
            interner,
            intents: IntentStack::new(),
            executor: LlmExecutor::new(),
            provider,
            host,
            instruction_count: 0,
            max_instructions: 10_000,
            call_depth: 0,
            max_call_depth: 100,
            max_retries: llm::DEFAULT_RETRY_LIMIT,
            retry_counts: HashMap::new(),
        }
    }

    pub fn with_limits(mut self, max_instructions: u64, max_call_depth: u32) -> Self {
        self.max_instructions = max_instructions;
        self.max_call_depth = max_call_depth;
        self
    }

    pub fn with_retry_limit(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn install_global_intent(&mut self, intent: String) {
        self.intents.install_global(intent);
    }

    pub fn last_call_info(&self) -> Option<&crate::provider::LastCallInfo> {
        self.executor.last_call_info()
    }

    /// Snapshots this module's globals into a `Value::Dict`, so a caller
    /// running a multi-file program can register it as another module's
    /// `import`/`from ... import` target (spec §4.7).
    pub fn export_globals(&self) -> Value<'a> {
        let mut exports = IndexMap::new();
        for (name, value) in self.globals.own_bindings() {
            exports.insert(self.interner.resolve(name).to_string(), value);
        }
        Value::Dict(Rc::new(RefCell::new(exports)))
    }

    /// Runs a parsed `Stmt::Module` to completion (spec §4.5/§7: any
    /// control-flow signal escaping to the top becomes `RUN_GENERIC_ERROR`).
    pub fn run_module(&mut self, module: &'a Stmt<'a>) -> Result<(), RuntimeError> {
        let Stmt::Module { body, .. } = module else {
            return Err(RuntimeError {
                code: Code::RUN_GENERIC_ERROR,
                message: "expected a module root statement".to_string(),
                span: Span::default(),
            });
        };
        let globals = self.globals.clone();
        match self.exec_block(body, &globals) {
            Ok(()) => Ok(()),
            Err(EvalError::Error(e)) => Err(e),
            Err(EvalError::Signal(_)) => Err(RuntimeError {
                code: Code::RUN_GENERIC_ERROR,
                message: "a control-flow signal escaped the top-level program".to_string(),
                span: Span::default(),
            }),
        }
    }

    fn tick(&mut self, span: Span) -> EvalResult<'a, ()> {
        self.instruction_count += 1;
        if self.instruction_count > self.max_instructions {
            return Err(EvalError::Error(RuntimeError {
                code: Code::RUN_LIMIT_EXCEEDED,
                message: "instruction limit exceeded".to_string(),
                span,
            }));
        }
        Ok(())
    }

    // ---- statements ----------------------------------------------------

    fn exec_block(&mut self, stmts: &[&'a Stmt<'a>], env: &Env<'a>) -> EvalResult<'a, ()> {
        for stmt in stmts {
            self.exec_stmt(stmt, env)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &'a Stmt<'a>, env: &Env<'a>) -> EvalResult<'a, ()> {
        self.tick(stmt.span())?;
        match stmt {
            Stmt::Module { .. } => Ok(()),
            Stmt::FunctionDef { name, params, body, .. } => {
                let def = Rc::new(FunctionDef {
                    name: *name,
                    params: params.clone(),
                    body: body.clone(),
                });
                env.define(*name, Value::Function(def), false);
                Ok(())
            }
            Stmt::LLMFunctionDef {
                name, params, return_type, template, ..
            } => {
                let def = Rc::new(LlmFunctionDef {
                    name: *name,
                    params: params.clone(),
                    return_type: *return_type,
                    template,
                });
                env.define(*name, Value::LlmFunction(def), false);
                Ok(())
            }
            Stmt::ClassDef { name, base, body, .. } => self.exec_class_def(*name, *base, body, env),
            Stmt::Assign {
                target,
                type_annotation,
                value,
                span,
            } => self.exec_assign(*target, *type_annotation, *value, *span, env),
            Stmt::AugAssign { target, op, value, span } => self.exec_aug_assign(*target, *op, *value, *span, env),
            Stmt::If {
                test,
                body,
                orelse,
                llm_fallback,
                span,
            } => {
                let cond = self.eval_guarded(*test, env, llm_fallback.as_ref(), *span)?;
                if cond.is_truthy() {
                    self.exec_block(body, env)
                } else {
                    self.exec_block(orelse, env)
                }
            }
            Stmt::While {
                test,
                body,
                llm_fallback,
                span,
            } => self.exec_while(*test, body, llm_fallback.as_ref(), *span, env),
            Stmt::For {
                target,
                iter,
                body,
                llm_fallback,
                span,
                ..
            } => self.exec_for(*target, *iter, body, llm_fallback.as_ref(), *span, env),
            Stmt::Try {
                body,
                handlers,
                orelse,
                finally_body,
                ..
            } => self.exec_try(body, handlers, orelse, finally_body, env),
            Stmt::Raise { value, span } => {
                let v = match value {
                    Some(e) => self.eval_expr(*e, env)?,
                    None => Value::None_,
                };
                let _ = span;
                Err(EvalError::Signal(Signal::Raised(v)))
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.eval_expr(*e, env)?,
                    None => Value::None_,
                };
                Err(EvalError::Signal(Signal::Return(v)))
            }
            Stmt::Pass(_) => Ok(()),
            Stmt::Break(_) => Err(EvalError::Signal(Signal::Break)),
            Stmt::Continue(_) => Err(EvalError::Signal(Signal::Continue)),
            Stmt::Retry(_) => Err(EvalError::Signal(Signal::Retry)),
            Stmt::Import { module, alias, .. } => {
                if let Some(value) = self.host.module_value(self.interner.resolve(*module)) {
                    let bind_name = alias.unwrap_or(*module);
                    env.define(bind_name, value, false);
                }
                Ok(())
            }
            Stmt::ImportFrom { module, names, .. } => {
                if let Some(Value::Dict(exports)) = self.host.module_value(self.interner.resolve(*module)) {
                    let exports = exports.borrow();
                    if names.len() == 1 && self.interner.resolve(names[0].0) == "*" {
                        for (name, v) in exports.iter() {
                            if let Some(sym) = self.interner.lookup(name) {
                                env.define(sym, v.clone(), false);
                            }
                        }
                    } else {
                        for (name, alias) in names {
                            if let Some(v) = exports.get(self.interner.resolve(*name)) {
                                env.define(alias.unwrap_or(*name), v.clone(), false);
                            }
                        }
                    }
                }
                Ok(())
            }
            Stmt::ExprStmt { expr, .. } => {
                self.eval_expr(*expr, env)?;
                Ok(())
            }
        }
    }

    fn exec_class_def(&mut self, name: Symbol, base: Option<Symbol>, body: &[&'a Stmt<'a>], env: &Env<'a>) -> EvalResult<'a, ()> {
        let base_def = match base {
            Some(base_sym) => match env.get(base_sym) {
                Some(Value::Class(c)) => Some(c),
                _ => {
                    return Err(EvalError::Error(RuntimeError {
                        code: Code::RUN_UNDEFINED_VARIABLE,
                        message: format!("base class '{}' is not defined", self.interner.resolve(base_sym)),
                        span: Span::default(),
                    }))
                }
            },
            None => None,
        };
        let mut fields = Vec::new();
        let mut methods = HashMap::new();
        for member in body {
            match member {
                Stmt::Assign { target, value, .. } => {
                    if let Expr::Name(sym, _) = target {
                        fields.push((*sym, Some(*value)));
                    }
                }
                Stmt::FunctionDef {
                    name: fname, params, body: fbody, ..
                } => {
                    methods.insert(
                        *fname,
                        Rc::new(FunctionDef {
                            name: *fname,
                            params: params.clone(),
                            body: fbody.clone(),
                        }),
                    );
                }
                _ => {}
            }
        }
        let class_def = Rc::new(ClassDef {
            name,
            base: base_def,
            fields,
            methods,
        });
        env.define(name, Value::Class(class_def), false);
        Ok(())
    }

    fn exec_assign(
        &mut self,
        target: &'a Expr<'a>,
        type_annotation: Option<&'a Expr<'a>>,
        value: &'a Expr<'a>,
        span: Span,
        env: &Env<'a>,
    ) -> EvalResult<'a, ()> {
        let declared_type_name = type_annotation.and_then(|t| self.resolve_type_name(t));
        let raw = self.eval_expr_typed(value, env, declared_type_name.as_deref())?;
        let coerced = self.coerce_if_needed(raw, declared_type_name.as_deref(), span)?;
        match target {
            Expr::Name(sym, _) => {
                if type_annotation.is_some() {
                    env.define(*sym, coerced, false);
                } else {
                    env.assign(*sym, coerced, span).map_err(EvalError::from)?;
                }
                Ok(())
            }
            Expr::Attribute { receiver, attr, .. } => {
                let recv = self.eval_expr(*receiver, env)?;
                match recv {
                    Value::Instance(inst) => {
                        inst.fields
                            .borrow_mut()
                            .insert(self.interner.resolve(*attr).to_string(), coerced);
                        Ok(())
                    }
                    other => Err(EvalError::Error(RuntimeError {
                        code: Code::RUN_ATTRIBUTE_ERROR,
                        message: format!("{} has no attributes", other.type_name()),
                        span,
                    })),
                }
            }
            Expr::Subscript { receiver, index, .. } => {
                let recv = self.eval_expr(*receiver, env)?;
                let idx = self.eval_expr(*index, env)?;
                dispatch::index_set(&recv, &idx, coerced, span).map_err(EvalError::from)
            }
            _ => Err(EvalError::Error(RuntimeError {
                code: Code::RUN_GENERIC_ERROR,
                message: "invalid assignment target".to_string(),
                span,
            })),
        }
    }

    fn exec_aug_assign(
        &mut self,
        target: &'a Expr<'a>,
        op: crate::ast::expr::BinaryOpKind,
        value: &'a Expr<'a>,
        span: Span,
        env: &Env<'a>,
    ) -> EvalResult<'a, ()> {
        let current = self.eval_expr(target, env)?;
        let rhs = self.eval_expr(value, env)?;
        let updated = dispatch::eval_binary(op, &current, &rhs, span).map_err(EvalError::from)?;
        match target {
            Expr::Name(sym, _) => env.assign(*sym, updated, span).map_err(EvalError::from),
            Expr::Attribute { receiver, attr, .. } => {
                let recv = self.eval_expr(*receiver, env)?;
                match recv {
                    Value::Instance(inst) => {
                        inst.fields
                            .borrow_mut()
                            .insert(self.interner.resolve(*attr).to_string(), updated);
                        Ok(())
                    }
                    other => Err(EvalError::Error(RuntimeError {
                        code: Code::RUN_ATTRIBUTE_ERROR,
                        message: format!("{} has no attributes", other.type_name()),
                        span,
                    })),
                }
            }
            Expr::Subscript { receiver, index, .. } => {
                let recv = self.eval_expr(*receiver, env)?;
                let idx = self.eval_expr(*index, env)?;
                dispatch::index_set(&recv, &idx, updated, span).map_err(EvalError::from)
            }
            _ => Err(EvalError::Error(RuntimeError {
                code: Code::RUN_GENERIC_ERROR,
                message: "invalid assignment target".to_string(),
                span,
            })),
        }
    }

    fn exec_while(
        &mut self,
        test: &'a Expr<'a>,
        body: &[&'a Stmt<'a>],
        fallback: Option<&Vec<&'a Stmt<'a>>>,
        span: Span,
        env: &Env<'a>,
    ) -> EvalResult<'a, ()> {
        loop {
            let cond = self.eval_guarded(test, env, fallback, span)?;
            if !cond.is_truthy() {
                return Ok(());
            }
            match self.exec_block(body, env) {
                Ok(()) => {}
                Err(EvalError::Signal(Signal::Break)) => return Ok(()),
                Err(EvalError::Signal(Signal::Continue)) => continue,
                Err(other) => return Err(other),
            }
        }
    }

    fn exec_for(
        &mut self,
        target: Option<Symbol>,
        iter: &'a Expr<'a>,
        body: &[&'a Stmt<'a>],
        fallback: Option<&Vec<&'a Stmt<'a>>>,
        span: Span,
        env: &Env<'a>,
    ) -> EvalResult<'a, ()> {
        match target {
            Some(name) => {
                let iterable = self.eval_expr(iter, env)?;
                let items: Vec<Value<'a>> = match &iterable {
                    Value::List(items) => items.borrow().clone(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(Rc::new(c.to_string()))).collect(),
                    Value::Dict(map) => map.borrow().keys().map(|k| Value::Str(Rc::new(k.clone()))).collect(),
                    Value::Int(n) => (0..*n).map(Value::Int).collect(),
                    Value::Float(f) => (0..*f as i64).map(Value::Int).collect(),
                    other => {
                        return Err(EvalError::Error(RuntimeError {
                            code: Code::RUN_TYPE_MISMATCH,
                            message: format!("{} is not iterable", other.type_name()),
                            span,
                        }))
                    }
                };
                let loop_env = Env::child(env);
                for item in items {
                    loop_env.define(name, item, false);
                    match self.exec_block(body, &loop_env) {
                        Ok(()) => {}
                        Err(EvalError::Signal(Signal::Break)) => break,
                        Err(EvalError::Signal(Signal::Continue)) => continue,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            None => {
                let repeat_count = match iter {
                    Expr::Constant(crate::ast::expr::Literal::Int(n), _) => Some(*n),
                    Expr::Constant(crate::ast::expr::Literal::Float(f), _) => Some(*f as i64),
                    _ => None,
                };
                if let Some(n) = repeat_count {
                    for _ in 0..n {
                        match self.exec_block(body, env) {
                            Ok(()) => {}
                            Err(EvalError::Signal(Signal::Break)) => break,
                            Err(EvalError::Signal(Signal::Continue)) => continue,
                            Err(other) => return Err(other),
                        }
                    }
                    Ok(())
                } else {
                    self.exec_while(iter, body, fallback, span, env)
                }
            }
        }
    }

    fn exec_try(
        &mut self,
        body: &[&'a Stmt<'a>],
        handlers: &[crate::ast::stmt::ExceptHandler<'a>],
        orelse: &[&'a Stmt<'a>],
        finally_body: &[&'a Stmt<'a>],
        env: &Env<'a>,
    ) -> EvalResult<'a, ()> {
        let body_result = self.exec_block(body, env);
        let outcome = match body_result {
            Ok(()) => self.exec_block(orelse, env),
            Err(EvalError::Signal(Signal::Raised(value))) => {
                let mut handled = None;
                for handler in handlers {
                    let matches = match handler.exc_type {
                        None => true,
                        Some(sym) => matches_exception_type(&value, self.interner.resolve(sym)),
                    };
                    if matches {
                        let handler_env = Env::child(env);
                        if let Some(bind) = handler.bind_name {
                            handler_env.define(bind, value.clone(), false);
                        }
                        handled = Some(self.exec_block(&handler.body, &handler_env));
                        break;
                    }
                }
                handled.unwrap_or(Err(EvalError::Signal(Signal::Raised(value))))
            }
            other => other,
        };
        let finally_result = self.exec_block(finally_body, env);
        match finally_result {
            Ok(()) => outcome,
            err => err,
        }
    }

    // ---- expressions -----------------------------------------------------

    fn eval_expr(&mut self, expr: &'a Expr<'a>, env: &Env<'a>) -> EvalResult<'a, Value<'a>> {
        self.eval_expr_typed(expr, env, None)
    }

    fn eval_expr_typed(&mut self, expr: &'a Expr<'a>, env: &Env<'a>, type_hint: Option<&str>) -> EvalResult<'a, Value<'a>> {
        match expr {
            Expr::Behavior(b) => self.eval_behavior(b, env, type_hint),
            other => self.eval_expr_inner(other, env),
        }
    }

    fn eval_expr_inner(&mut self, expr: &'a Expr<'a>, env: &Env<'a>) -> EvalResult<'a, Value<'a>> {
        use crate::ast::expr::Literal;
        self.tick(expr.span())?;
        match expr {
            Expr::Constant(lit, _) => Ok(match lit {
                Literal::Int(i) => Value::Int(*i),
                Literal::Float(f) => Value::Float(*f),
                Literal::Str(s) => Value::Str(Rc::new(s.clone())),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::None_ => Value::None_,
            }),
            Expr::Name(sym, span) => env.get(*sym).ok_or_else(|| {
                EvalError::Error(RuntimeError {
                    code: Code::RUN_UNDEFINED_VARIABLE,
                    message: format!("'{}' is not defined", self.interner.resolve(*sym)),
                    span: *span,
                })
            }),
            Expr::Attribute { receiver, attr, span } => {
                let recv = self.eval_expr(*receiver, env)?;
                match recv {
                    Value::Instance(inst) => {
                        if let Some(v) = inst.fields.borrow().get(self.interner.resolve(*attr)) {
                            return Ok(v.clone());
                        }
                        if let Some(method) = self.find_method(&inst.class, *attr) {
                            return Ok(Value::BoundMethod(inst.clone(), method));
                        }
                        Err(EvalError::Error(RuntimeError {
                            code: Code::RUN_ATTRIBUTE_ERROR,
                            message: format!("no attribute '{}'", self.interner.resolve(*attr)),
                            span: *span,
                        }))
                    }
                    other => Err(EvalError::Error(RuntimeError {
                        code: Code::RUN_ATTRIBUTE_ERROR,
                        message: format!("{} has no attributes", other.type_name()),
                        span: *span,
                    })),
                }
            }
            Expr::Subscript { receiver, index, span } => {
                let recv = self.eval_expr(*receiver, env)?;
                let idx = self.eval_expr(*index, env)?;
                dispatch::index_get(&recv, &idx, *span).map_err(EvalError::from)
            }
            Expr::ListExpr(items, _) => {
                let values = items
                    .iter()
                    .map(|e| self.eval_expr(*e, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::List(Rc::new(RefCell::new(values))))
            }
            Expr::DictExpr(pairs, span) => {
                let mut map = IndexMap::new();
                for (k, v) in pairs {
                    let key = self.eval_expr(*k, env)?;
                    let Value::Str(key) = key else {
                        return Err(EvalError::Error(RuntimeError {
                            code: Code::RUN_TYPE_MISMATCH,
                            message: "dict keys must be strings".to_string(),
                            span: *span,
                        }));
                    };
                    let value = self.eval_expr(*v, env)?;
                    map.insert((*key).clone(), value);
                }
                Ok(Value::Dict(Rc::new(RefCell::new(map))))
            }
            Expr::BinOp { op, left, right, span } => {
                let l = self.eval_expr(*left, env)?;
                let r = self.eval_expr(*right, env)?;
                dispatch::eval_binary(*op, &l, &r, *span).map_err(EvalError::from)
            }
            Expr::UnaryOp { op, operand, span } => {
                let v = self.eval_expr(*operand, env)?;
                dispatch::eval_unary(*op, &v, *span).map_err(EvalError::from)
            }
            Expr::Compare {
                left,
                ops,
                comparators,
                span,
            } => {
                let mut prev = self.eval_expr(*left, env)?;
                for (op, comparator) in ops.iter().zip(comparators.iter()) {
                    let next = self.eval_expr(*comparator, env)?;
                    if !dispatch::eval_compare(*op, &prev, &next, *span).map_err(EvalError::from)? {
                        return Ok(Value::Bool(false));
                    }
                    prev = next;
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolOp { op, values, .. } => {
                let mut result = Value::Bool(false);
                for (i, value_expr) in values.iter().enumerate() {
                    result = self.eval_expr(*value_expr, env)?;
                    let truthy = result.is_truthy();
                    if *op == BoolOpKind::And && !truthy {
                        return Ok(result);
                    }
                    if *op == BoolOpKind::Or && truthy {
                        return Ok(result);
                    }
                    let _ = i;
                }
                Ok(result)
            }
            Expr::Call { callee, args, intent, span } => self.eval_call(*callee, args, intent.as_deref(), *span, env),
            Expr::CastExpr { target_type, value, span } => {
                let v = self.eval_expr(*value, env)?;
                let name = self.interner.resolve(*target_type).to_string();
                intrinsics::call_intrinsic(&name, vec![v], *span).map_err(EvalError::from)
            }
            Expr::Behavior(b) => self.eval_behavior(b, env, None),
        }
    }

    fn eval_call(
        &mut self,
        callee: &'a Expr<'a>,
        args: &[&'a Expr<'a>],
        intent: Option<&str>,
        span: Span,
        env: &Env<'a>,
    ) -> EvalResult<'a, Value<'a>> {
        let arg_values = args
            .iter()
            .map(|a| self.eval_expr(*a, env))
            .collect::<EvalResult<Vec<_>>>()?;
        if let Expr::Name(sym, _) = callee {
            if env.get(*sym).is_none() {
                let name = self.interner.resolve(*sym);
                if intrinsics::INTRINSIC_NAMES.contains(&name) {
                    return intrinsics::call_intrinsic(name, arg_values, span).map_err(EvalError::from);
                }
            }
        }
        let callee_value = self.eval_expr(callee, env)?;
        self.call_value(callee_value, arg_values, intent, span)
    }

    fn call_value(&mut self, callee: Value<'a>, args: Vec<Value<'a>>, intent: Option<&str>, span: Span) -> EvalResult<'a, Value<'a>> {
        match callee {
            Value::Function(f) => self.call_function(f, args, intent, span),
            Value::LlmFunction(f) => self.eval_llm_function(f, args, span),
            Value::Class(c) => self.instantiate_class(c, args, span),
            Value::BoundMethod(inst, m) => self.call_method(inst, m, args, intent, span),
            other => Err(EvalError::Error(RuntimeError {
                code: Code::RUN_CALL_ERROR,
                message: format!("{} is not callable", other.type_name()),
                span,
            })),
        }
    }

    fn call_function(&mut self, func: Rc<FunctionDef<'a>>, args: Vec<Value<'a>>, intent: Option<&str>, span: Span) -> EvalResult<'a, Value<'a>> {
        self.call_depth += 1;
        if self.call_depth > self.max_call_depth {
            self.call_depth -= 1;
            return Err(EvalError::Error(RuntimeError {
                code: Code::RUN_LIMIT_EXCEEDED,
                message: "call stack depth exceeded".to_string(),
                span,
            }));
        }
        if let Some(i) = intent {
            self.intents.push(i.to_string());
        }
        let call_env = Env::child(&self.globals);
        for (param, arg) in func.params.iter().zip(args.into_iter()) {
            call_env.define(param.name, arg, false);
        }
        let result = self.exec_block(&func.body, &call_env);
        if intent.is_some() {
            self.intents.pop();
        }
        self.call_depth -= 1;
        match result {
            Ok(()) => Ok(Value::None_),
            Err(EvalError::Signal(Signal::Return(v))) => Ok(v),
            Err(other) => Err(other),
        }
    }

    fn call_method(
        &mut self,
        instance: Rc<Instance<'a>>,
        method: Rc<FunctionDef<'a>>,
        args: Vec<Value<'a>>,
        intent: Option<&str>,
        span: Span,
    ) -> EvalResult<'a, Value<'a>> {
        let mut full_args = Vec::with_capacity(args.len() + 1);
        full_args.push(Value::Instance(instance));
        full_args.extend(args);
        self.call_function(method, full_args, intent, span)
    }

    fn instantiate_class(&mut self, class: Rc<ClassDef<'a>>, args: Vec<Value<'a>>, span: Span) -> EvalResult<'a, Value<'a>> {
        let mut fields = IndexMap::new();
        let globals = self.globals.clone();
        for (name, default) in &class.fields {
            let value = match default {
                Some(expr) => self.eval_expr(*expr, &globals)?,
                None => Value::None_,
            };
            fields.insert(self.interner.resolve(*name).to_string(), value);
        }
        let instance = Rc::new(Instance {
            class: class.clone(),
            fields: RefCell::new(fields),
        });
        if let Some(init_sym) = self.interner.lookup("__init__") {
            if let Some(method) = self.find_method(&class, init_sym) {
                self.call_method(instance.clone(), method, args, None, span)?;
            }
        }
        Ok(Value::Instance(instance))
    }

    fn find_method(&self, class: &Rc<ClassDef<'a>>, sym: Symbol) -> Option<Rc<FunctionDef<'a>>> {
        if let Some(m) = class.methods.get(&sym) {
            return Some(m.clone());
        }
        class.base.as_ref().and_then(|b| self.find_method(b, sym))
    }

    fn resolve_type_name(&self, type_expr: &'a Expr<'a>) -> Option<String> {
        match type_expr {
            Expr::Name(sym, _) => Some(self.interner.resolve(*sym).to_string()),
            _ => None,
        }
    }

    fn coerce_target_for_type_name(name: &str) -> Option<CoerceTarget> {
        match name {
            "int" => Some(CoerceTarget::Int),
            "float" => Some(CoerceTarget::Float),
            "bool" => Some(CoerceTarget::Bool),
            "list" => Some(CoerceTarget::List),
            "dict" => Some(CoerceTarget::Dict),
            "str" => Some(CoerceTarget::Str),
            _ => None,
        }
    }

    fn coerce_if_needed(&self, value: Value<'a>, declared_type_name: Option<&str>, span: Span) -> EvalResult<'a, Value<'a>> {
        let (Some(name), Value::Str(s)) = (declared_type_name, &value) else {
            return Ok(value);
        };
        match Self::coerce_target_for_type_name(name) {
            Some(CoerceTarget::Str) | None => Ok(value),
            Some(target) => llm::coerce_response(s, target, span).map_err(EvalError::from),
        }
    }

    /// Stringifies a value for inclusion in an assembled prompt, honoring
    /// a user-defined `__to_prompt__` override (§4.6 step 1).
    fn value_to_prompt(&mut self, value: &Value<'a>) -> EvalResult<'a, String> {
        if let Value::Instance(inst) = value {
            if let Some(sym) = self.interner.lookup("__to_prompt__") {
                if let Some(method) = self.find_method(&inst.class, sym) {
                    let result = self.call_method(inst.clone(), method, Vec::new(), None, Span::default())?;
                    return Ok(result.to_display_string());
                }
            }
            return Ok(value.default_prompt_string(self.interner.resolve(inst.class.name)));
        }
        Ok(value.to_display_string())
    }

    fn render_segments(
        &mut self,
        segments: &'a [crate::ast::stmt::PromptSegment<'a>],
        env: &Env<'a>,
    ) -> EvalResult<'a, String> {
        let mut out = String::new();
        for segment in segments {
            out.push_str(&segment.text_before);
            if let Some(expr) = segment.expr {
                let v = self.eval_expr(expr, env)?;
                out.push_str(&self.value_to_prompt(&v)?);
            }
        }
        Ok(out)
    }

    fn eval_llm_function(&mut self, def: Rc<LlmFunctionDef<'a>>, args: Vec<Value<'a>>, span: Span) -> EvalResult<'a, Value<'a>> {
        let call_env = Env::child(&self.globals);
        for (param, arg) in def.params.iter().zip(args.into_iter()) {
            call_env.define(param.name, arg, false);
        }
        let system_template = self.render_segments(&def.template.sys_segments, &call_env)?;
        let user_prompt = self.render_segments(&def.template.user_segments, &call_env)?;
        let coerce_target = def
            .return_type
            .and_then(|t| self.resolve_type_name(t))
            .and_then(|n| Self::coerce_target_for_type_name(&n));
        let intents = self.intents.active();
        let system_prompt = self.executor.build_function_system_prompt(&system_template, &intents, coerce_target);
        let response = self
            .provider
            .call(&system_prompt, &user_prompt, "GENERAL")
            .map_err(|e| RuntimeError {
                code: Code::RUN_LLM_ERROR,
                message: e.to_string(),
                span,
            })?;
        self.executor.note_successful_call(
            system_prompt,
            user_prompt,
            response.clone(),
            self.interner.resolve(def.name).to_string(),
            CallKind::Function,
        );
        match coerce_target {
            Some(target) if target != CoerceTarget::Str => llm::coerce_response(&response, target, span).map_err(EvalError::from),
            _ => Ok(Value::Str(Rc::new(response))),
        }
    }

    fn eval_behavior(
        &mut self,
        behavior: &'a crate::ast::expr::BehaviorExpr<'a>,
        env: &Env<'a>,
        declared_type_note: Option<&str>,
    ) -> EvalResult<'a, Value<'a>> {
        let mut user_prompt = String::new();
        for segment in &behavior.segments {
            match segment {
                crate::ast::expr::BehaviorSegment::Text(text) => user_prompt.push_str(text),
                crate::ast::expr::BehaviorSegment::Expr(e) => {
                    let v = self.eval_expr(*e, env)?;
                    user_prompt.push_str(&self.value_to_prompt(&v)?);
                }
            }
        }
        let intents = if self.intents.auto_inject() { self.intents.active() } else { Vec::new() };
        let system_prompt = self.executor.build_behavior_system_prompt(
            behavior.scene,
            None,
            &intents,
            behavior.intent.as_deref(),
            declared_type_note,
        );
        let scene_tag = scene_str(behavior.scene);
        let tag_name = self.interner.resolve(behavior.tag).to_string();
        let response = self
            .provider
            .call(&system_prompt, &user_prompt, scene_tag)
            .map_err(|e| RuntimeError {
                code: Code::RUN_LLM_ERROR,
                message: e.to_string(),
                span: behavior.span,
            })?;
        self.executor.note_successful_call(
            system_prompt,
            user_prompt,
            response.clone(),
            tag_name,
            CallKind::Behavior,
        );
        match behavior.scene {
            Scene::General => Ok(Value::Str(Rc::new(response))),
            Scene::Branch | Scene::Loop => match self.executor.resolve_decision(&response) {
                DecisionOutcome::Decided(ch) => Ok(Value::Str(Rc::new(ch.to_string()))),
                DecisionOutcome::Uncertain(raw) => Err(EvalError::Signal(Signal::Uncertainty(raw))),
            },
        }
    }

    /// The retry wrapper around an `If`/`While`/`For` test or iterator
    /// (§4.6 "Fallback wrapper"): on `LLMUncertaintyError`, runs the
    /// `llm_fallback` block; a `retry` inside it re-enters the guarded
    /// evaluation, otherwise the construct is "decided = false".
    fn eval_guarded(
        &mut self,
        expr: &'a Expr<'a>,
        env: &Env<'a>,
        fallback: Option<&Vec<&'a Stmt<'a>>>,
        construct_span: Span,
    ) -> EvalResult<'a, Value<'a>> {
        let key = (construct_span.line, construct_span.column);
        loop {
            match self.eval_expr(expr, env) {
                Ok(v) => return Ok(v),
                Err(EvalError::Signal(Signal::Uncertainty(_raw))) => {
                    let Some(body) = fallback else {
                        return Err(EvalError::Error(RuntimeError {
                            code: Code::RUN_LLM_ERROR,
                            message: "LLM decision was uncertain and no fallback was provided".to_string(),
                            span: construct_span,
                        }));
                    };
                    let count = *self.retry_counts.get(&key).unwrap_or(&0);
                    if count >= self.max_retries {
                        return Err(EvalError::Error(RuntimeError {
                            code: Code::RUN_LIMIT_EXCEEDED,
                            message: "retry limit exceeded for LLM decision".to_string(),
                            span: construct_span,
                        }));
                    }
                    match self.exec_block(body, env) {
                        Ok(()) => return Ok(Value::Bool(false)),
                        Err(EvalError::Signal(Signal::Retry)) => {
                            self.retry_counts.insert(key, count + 1);
                            continue;
                        }
                        Err(other) => return Err(other),
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }
}

fn matches_exception_type(value: &Value, exc_name: &str) -> bool {
    match value {
        Value::Instance(inst) => true_or_name(inst, exc_name),
        _ => exc_name.eq_ignore_ascii_case("Exception"),
    }
}

fn true_or_name(_inst: &Instance, _exc_name: &str) -> bool {
    // The language has no distinct exception-class hierarchy beyond
    // ordinary classes; any handler matches any raised instance.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::ast::{Expr as AstExpr, Stmt as AstStmt};
    use crate::host::HostRegistry;
    use crate::provider::MockProvider;
    use crate::scope::ScopeGraph;

    fn run(source: &str, responses: Vec<&str>) -> (Interner, String) {
        let mut interner = Interner::new();
        let (tokens, _) = crate::lexer::lex(source, &mut interner).unwrap();
        let expr_arena: Arena<AstExpr> = Arena::new();
        let stmt_arena: Arena<AstStmt> = Arena::new();
        let mut scopes = ScopeGraph::new();
        let out = crate::parser::parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
        crate::semantic::Analyzer::new(&mut scopes, &interner).analyze(out.module).unwrap();
        let mut interp = Interpreter::new(&interner, Box::new(MockProvider::new(responses)), Box::new(HostRegistry::new()));
        interp.run_module(out.module).unwrap();
        (interner, String::new())
    }

    #[test]
    fn bitwise_expression_matches_example() {
        run("int r = (10 & 3) | (5 ^ 1)\n", vec![]);
    }

    #[test]
    fn simple_class_counter_increments() {
        run(
            "class Counter:\n    int value = 0\n    func inc(self):\n        self.value = self.value + 1\nCounter c = Counter()\nc.inc()\n",
            vec![],
        );
    }
}
