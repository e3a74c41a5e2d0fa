//! Expression-evaluation dispatch table (spec §4.5): binary ops keyed by
//! `(op, left runtime type, right runtime type)`, unary ops by `(op,
//! operand runtime type)`.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::expr::{BinaryOpKind, CompareOpKind, UnaryOpKind};
use crate::diagnostics::Code;
use crate::interp::value::Value;
use crate::interp::RuntimeError;
use crate::token::Span;

pub fn eval_binary<'a>(
    op: BinaryOpKind,
    left: &Value<'a>,
    right: &Value<'a>,
    span: Span,
) -> Result<Value<'a>, RuntimeError> {
    use BinaryOpKind::*;
    use Value::*;
    let result = match (op, left, right) {
        (Add, Int(a), Int(b)) => Int(a + b),
        (Add, Int(a), Float(b)) => Float(*a as f64 + b),
        (Add, Float(a), Int(b)) => Float(a + *b as f64),
        (Add, Float(a), Float(b)) => Float(a + b),
        (Add, Str(a), Str(b)) => Str(Rc::new(format!("{}{}", a, b))),
        (Add, List(a), List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            List(Rc::new(std::cell::RefCell::new(items)))
        }
        (Sub, Int(a), Int(b)) => Int(a - b),
        (Sub, Int(a), Float(b)) => Float(*a as f64 - b),
        (Sub, Float(a), Int(b)) => Float(a - *b as f64),
        (Sub, Float(a), Float(b)) => Float(a - b),
        (Mul, Int(a), Int(b)) => Int(a * b),
        (Mul, Int(a), Float(b)) => Float(*a as f64 * b),
        (Mul, Float(a), Int(b)) => Float(a * *b as f64),
        (Mul, Float(a), Float(b)) => Float(a * b),
        (Div, Int(a), Int(b)) => {
            if *b == 0 {
                return Err(RuntimeError {
                    code: Code::RUN_DIVISION_BY_ZERO,
                    message: "division by zero".to_string(),
                    span,
                });
            }
            Float(*a as f64 / *b as f64)
        }
        (Div, a, b) if a.type_name() != "str" && b.type_name() != "str" => {
            let (af, bf) = (as_f64(a), as_f64(b));
            if bf == 0.0 {
                return Err(RuntimeError {
                    code: Code::RUN_DIVISION_BY_ZERO,
                    message: "division by zero".to_string(),
                    span,
                });
            }
            Float(af / bf)
        }
        (Mod, Int(a), Int(b)) => {
            if *b == 0 {
                return Err(RuntimeError {
                    code: Code::RUN_DIVISION_BY_ZERO,
                    message: "division by zero".to_string(),
                    span,
                });
            }
            Int(a % b)
        }
        (Mod, a, b) => Float(as_f64(a) % as_f64(b)),
        (BitAnd, Int(a), Int(b)) => Int(a & b),
        (BitOr, Int(a), Int(b)) => Int(a | b),
        (BitXor, Int(a), Int(b)) => Int(a ^ b),
        (Shl, Int(a), Int(b)) => Int(a << b),
        (Shr, Int(a), Int(b)) => Int(a >> b),
        _ => {
            return Err(RuntimeError {
                code: Code::RUN_TYPE_MISMATCH,
                message: format!("operator not defined for {} and {}", left.type_name(), right.type_name()),
                span,
            })
        }
    };
    Ok(result)
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        _ => 0.0,
    }
}

pub fn eval_unary<'a>(op: UnaryOpKind, operand: &Value<'a>, span: Span) -> Result<Value<'a>, RuntimeError> {
    use UnaryOpKind::*;
    use Value::*;
    let result = match (op, operand) {
        (Neg, Int(i)) => Int(-i),
        (Neg, Float(f)) => Float(-f),
        (Not, v) => Bool(!v.is_truthy()),
        (BitNot, Int(i)) => Int(!i),
        _ => {
            return Err(RuntimeError {
                code: Code::RUN_TYPE_MISMATCH,
                message: format!("unary operator not defined for {}", operand.type_name()),
                span,
            })
        }
    };
    Ok(result)
}

pub fn eval_compare<'a>(op: CompareOpKind, left: &Value<'a>, right: &Value<'a>, span: Span) -> Result<bool, RuntimeError> {
    use CompareOpKind::*;
    use Value::*;
    let ordering = match (left, right) {
        (Int(a), Int(b)) => (*a as f64).partial_cmp(&(*b as f64)),
        (Int(a), Float(b)) => (*a as f64).partial_cmp(b),
        (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)),
        (Float(a), Float(b)) => a.partial_cmp(b),
        (Str(a), Str(b)) => Some(a.cmp(b)),
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (None_, None_) => Some(std::cmp::Ordering::Equal),
        _ => {
            if matches!(op, Eq | NotEq) {
                return Ok(match op {
                    Eq => values_equal(left, right),
                    NotEq => !values_equal(left, right),
                    _ => unreachable!(),
                });
            }
            return Err(RuntimeError {
                code: Code::RUN_TYPE_MISMATCH,
                message: format!("cannot compare {} and {}", left.type_name(), right.type_name()),
                span,
            });
        }
    };
    let Some(ord) = ordering else {
        return Err(RuntimeError {
            code: Code::RUN_TYPE_MISMATCH,
            message: "incomparable values".to_string(),
            span,
        });
    };
    Ok(match op {
        Lt => ord.is_lt(),
        Gt => ord.is_gt(),
        LtEq => ord.is_le(),
        GtEq => ord.is_ge(),
        Eq => ord.is_eq(),
        NotEq => !ord.is_eq(),
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None_, Value::None_) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

/// `container[index]` read, used by `Subscript` evaluation.
pub fn index_get<'a>(container: &Value<'a>, index: &Value<'a>, span: Span) -> Result<Value<'a>, RuntimeError> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            let idx = normalize_index(*i, items.len(), span)?;
            Ok(items[idx].clone())
        }
        (Value::Dict(map), Value::Str(key)) => map
            .borrow()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| RuntimeError {
                code: Code::RUN_INDEX_ERROR,
                message: format!("key '{}' not found", key),
                span,
            }),
        _ => Err(RuntimeError {
            code: Code::RUN_INDEX_ERROR,
            message: "value is not subscriptable with this index type".to_string(),
            span,
        }),
    }
}

pub fn index_set<'a>(
    container: &Value<'a>,
    index: &Value<'a>,
    value: Value<'a>,
    span: Span,
) -> Result<(), RuntimeError> {
    match (container, index) {
        (Value::List(items), Value::Int(i)) => {
            let mut items = items.borrow_mut();
            let idx = normalize_index(*i, items.len(), span)?;
            items[idx] = value;
            Ok(())
        }
        (Value::Dict(map), Value::Str(key)) => {
            map.borrow_mut().insert((**key).clone(), value);
            Ok(())
        }
        _ => Err(RuntimeError {
            code: Code::RUN_INDEX_ERROR,
            message: "value is not subscriptable with this index type".to_string(),
            span,
        }),
    }
}

fn normalize_index(i: i64, len: usize, span: Span) -> Result<usize, RuntimeError> {
    let idx = if i < 0 { i + len as i64 } else { i };
    if idx < 0 || idx as usize >= len {
        return Err(RuntimeError {
            code: Code::RUN_INDEX_ERROR,
            message: format!("index {} out of range", i),
            span,
        });
    }
    Ok(idx as usize)
}

pub type Dict<'a> = IndexMap<String, Value<'a>>;

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(1, 1, 1)
    }

    #[test]
    fn int_division_by_zero_errors() {
        let err = eval_binary(BinaryOpKind::Div, &Value::Int(1), &Value::Int(0), span()).unwrap_err();
        assert_eq!(err.code, Code::RUN_DIVISION_BY_ZERO);
    }

    #[test]
    fn bitwise_and_matches_spec_example() {
        let a = eval_binary(BinaryOpKind::BitAnd, &Value::Int(10), &Value::Int(3), span()).unwrap();
        let b = eval_binary(BinaryOpKind::BitOr, &Value::Int(5), &Value::Int(1), span()).unwrap();
        let Value::Int(a) = a else { panic!() };
        let Value::Int(b) = b else { panic!() };
        let r = eval_binary(BinaryOpKind::BitOr, &Value::Int(a & 3), &Value::Int(b), span()).unwrap();
        assert!(matches!(r, Value::Int(n) if n == 6));
    }

    #[test]
    fn string_concatenation() {
        let r = eval_binary(
            BinaryOpKind::Add,
            &Value::Str(Rc::new("a".to_string())),
            &Value::Str(Rc::new("b".to_string())),
            span(),
        )
        .unwrap();
        assert!(matches!(r, Value::Str(s) if *s == "ab"));
    }

    #[test]
    fn list_index_out_of_range_errors() {
        let list = Value::List(Rc::new(std::cell::RefCell::new(vec![Value::Int(1)])));
        let err = index_get(&list, &Value::Int(5), span()).unwrap_err();
        assert_eq!(err.code, Code::RUN_INDEX_ERROR);
    }

    #[test]
    fn negative_index_wraps_from_end() {
        let list = Value::List(Rc::new(std::cell::RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        let got = index_get(&list, &Value::Int(-1), span()).unwrap();
        assert!(matches!(got, Value::Int(2)));
    }
}
