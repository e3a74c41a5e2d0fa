//! Built-in intrinsic functions (spec §4.5 `register_intrinsics`): always
//! present in the global scope, bound `is_const` so user code cannot
//! shadow them.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::diagnostics::Code;
use crate::interp::value::Value;
use crate::interp::RuntimeError;
use crate::token::Span;

pub const INTRINSIC_NAMES: &[&str] = &["print", "len", "input", "int", "float", "str", "list", "dict", "bool"];

fn arity_error(name: &str, expected: &str, got: usize, span: Span) -> RuntimeError {
    RuntimeError {
        code: Code::RUN_CALL_ERROR,
        message: format!("{} expects {} argument(s), got {}", name, expected, got),
        span,
    }
}

pub fn call_intrinsic<'a>(name: &str, args: Vec<Value<'a>>, span: Span) -> Result<Value<'a>, RuntimeError> {
    match name {
        "print" => {
            let rendered: Vec<String> = args.iter().map(|v| v.to_display_string()).collect();
            println!("{}", rendered.join(" "));
            Ok(Value::None_)
        }
        "len" => {
            if args.len() != 1 {
                return Err(arity_error("len", "1", args.len(), span));
            }
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.borrow().len() as i64)),
                Value::Dict(map) => Ok(Value::Int(map.borrow().len() as i64)),
                other => Err(RuntimeError {
                    code: Code::RUN_TYPE_MISMATCH,
                    message: format!("object of type {} has no len()", other.type_name()),
                    span,
                }),
            }
        }
        "input" => {
            if !args.is_empty() {
                print!("{}", args[0].to_display_string());
            }
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map_err(|e| RuntimeError {
                    code: Code::RUN_CALL_ERROR,
                    message: format!("failed to read input: {}", e),
                    span,
                })?;
            Ok(Value::Str(Rc::new(line.trim_end_matches('\n').to_string())))
        }
        "int" => {
            if args.len() != 1 {
                return Err(arity_error("int", "1", args.len(), span));
            }
            match &args[0] {
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => Ok(Value::Int(*f as i64)),
                Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| cast_error("int", s, span)),
                other => Err(cast_error("int", &other.to_display_string(), span)),
            }
        }
        "float" => {
            if args.len() != 1 {
                return Err(arity_error("float", "1", args.len(), span));
            }
            match &args[0] {
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Float(f) => Ok(Value::Float(*f)),
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| cast_error("float", s, span)),
                other => Err(cast_error("float", &other.to_display_string(), span)),
            }
        }
        "str" => {
            if args.len() != 1 {
                return Err(arity_error("str", "1", args.len(), span));
            }
            Ok(Value::Str(Rc::new(args[0].to_display_string())))
        }
        "list" => {
            if args.is_empty() {
                return Ok(Value::List(Rc::new(RefCell::new(Vec::new()))));
            }
            match &args[0] {
                Value::List(items) => Ok(Value::List(Rc::new(RefCell::new(items.borrow().clone())))),
                Value::Str(s) => {
                    let chars = s.chars().map(|c| Value::Str(Rc::new(c.to_string()))).collect();
                    Ok(Value::List(Rc::new(RefCell::new(chars))))
                }
                other => Err(cast_error("list", &other.to_display_string(), span)),
            }
        }
        "dict" => {
            if args.is_empty() {
                return Ok(Value::Dict(Rc::new(RefCell::new(IndexMap::new()))));
            }
            match &args[0] {
                Value::Dict(map) => Ok(Value::Dict(Rc::new(RefCell::new(map.borrow().clone())))),
                other => Err(cast_error("dict", &other.to_display_string(), span)),
            }
        }
        "bool" => {
            if args.len() != 1 {
                return Err(arity_error("bool", "1", args.len(), span));
            }
            Ok(Value::Bool(args[0].is_truthy()))
        }
        _ => Err(RuntimeError {
            code: Code::RUN_CALL_ERROR,
            message: format!("unknown intrinsic '{}'", name),
            span,
        }),
    }
}

fn cast_error(target: &str, value: &str, span: Span) -> RuntimeError {
    RuntimeError {
        code: Code::RUN_TYPE_MISMATCH,
        message: format!("cannot convert {:?} to {}", value, target),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(1, 1, 1)
    }

    #[test]
    fn len_of_string_counts_chars() {
        let v = call_intrinsic("len", vec![Value::Str(Rc::new("hello".to_string()))], span()).unwrap();
        assert!(matches!(v, Value::Int(5)));
    }

    #[test]
    fn int_parses_string() {
        let v = call_intrinsic("int", vec![Value::Str(Rc::new("42".to_string()))], span()).unwrap();
        assert!(matches!(v, Value::Int(42)));
    }

    #[test]
    fn int_from_bad_string_is_type_mismatch() {
        let err = call_intrinsic("int", vec![Value::Str(Rc::new("abc".to_string()))], span()).unwrap_err();
        assert_eq!(err.code, Code::RUN_TYPE_MISMATCH);
    }

    #[test]
    fn bool_uses_python_style_truthiness() {
        let v = call_intrinsic("bool", vec![Value::Int(0)], span()).unwrap();
        assert!(matches!(v, Value::Bool(false)));
        let v = call_intrinsic("bool", vec![Value::Str(Rc::new(String::new()))], span()).unwrap();
        assert!(matches!(v, Value::Bool(false)));
    }

    #[test]
    fn len_wrong_arity_errors() {
        let err = call_intrinsic("len", vec![], span()).unwrap_err();
        assert_eq!(err.code, Code::RUN_CALL_ERROR);
    }
}
