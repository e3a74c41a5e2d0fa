//! Runtime values (spec §3).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::stmt::{LlmTemplate, Param, Stmt};
use crate::intern::Symbol;

#[derive(Debug)]
pub struct FunctionDef<'a> {
    pub name: Symbol,
    pub params: Vec<Param<'a>>,
    pub body: Vec<&'a Stmt<'a>>,
}

#[derive(Debug)]
pub struct LlmFunctionDef<'a> {
    pub name: Symbol,
    pub params: Vec<Param<'a>>,
    pub return_type: Option<&'a crate::ast::expr::Expr<'a>>,
    pub template: &'a LlmTemplate<'a>,
}

#[derive(Debug)]
pub struct ClassDef<'a> {
    pub name: Symbol,
    pub base: Option<Rc<ClassDef<'a>>>,
    pub fields: Vec<(Symbol, Option<&'a crate::ast::expr::Expr<'a>>)>,
    pub methods: HashMap<Symbol, Rc<FunctionDef<'a>>>,
}

#[derive(Debug)]
pub struct Instance<'a> {
    pub class: Rc<ClassDef<'a>>,
    pub fields: RefCell<IndexMap<String, Value<'a>>>,
}

#[derive(Clone)]
pub enum Value<'a> {
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    Bool(bool),
    None_,
    List(Rc<RefCell<Vec<Value<'a>>>>),
    Dict(Rc<RefCell<IndexMap<String, Value<'a>>>>),
    Function(Rc<FunctionDef<'a>>),
    LlmFunction(Rc<LlmFunctionDef<'a>>),
    Class(Rc<ClassDef<'a>>),
    Instance(Rc<Instance<'a>>),
    BoundMethod(Rc<Instance<'a>>, Rc<FunctionDef<'a>>),
}

impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl<'a> Value<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bool(_) => "bool",
            Value::None_ => "none",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::LlmFunction(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::BoundMethod(..) => "method",
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => (**s).clone(),
            Value::Bool(b) => b.to_string(),
            Value::None_ => "none".to_string(),
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(|v| v.to_display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_display_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Function(f) => format!("<function {:?}>", f.name),
            Value::LlmFunction(f) => format!("<llm function {:?}>", f.name),
            Value::Class(c) => format!("<class {:?}>", c.name),
            Value::Instance(_) => "<Instance>".to_string(),
            Value::BoundMethod(..) => "<bound method>".to_string(),
        }
    }

    /// `__to_prompt__` default stringification (§4.6 step 1): `<Instance of
    /// NAME>` unless a user-defined override exists (resolved by the
    /// caller, which has interner access).
    pub fn default_prompt_string(&self, class_name: &str) -> String {
        match self {
            Value::Instance(_) => format!("<Instance of {}>", class_name),
            other => other.to_display_string(),
        }
    }

    /// Python-style truthiness used by `bool` coercion fallback (§4.6).
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::None_ => false,
            Value::List(items) => !items.borrow().is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }
}
