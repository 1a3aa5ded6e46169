use std::cell::RefCell;
use std::fmt::{self, Debug, Display, Formatter};
use std::rc::Rc;

use smallvec::SmallVec;
use smol_str::SmolStr;

use super::Context;
use super::binder::Binder;
use super::builtin::convert;
use super::error::EvalError;
use crate::Token;
use crate::number::Number;

/// A compiled expression: an `Rc`-shared closure evaluated against a context
/// and a binder. Compilation happens once; the closure tree can be evaluated
/// any number of times. No syntax tree survives compilation.
#[derive(Clone)]
pub struct CompiledExpr(Rc<ExprFn>);

type ExprFn = dyn Fn(&mut Context, &mut Binder) -> Result<Value, EvalError>;

impl CompiledExpr {
    pub(crate) fn new(
        f: impl Fn(&mut Context, &mut Binder) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    pub fn eval(&self, context: &mut Context, binder: &mut Binder) -> Result<Value, EvalError> {
        (self.0)(context, binder)
    }
}

impl Debug for CompiledExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledExpr")
    }
}

impl PartialEq for CompiledExpr {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A script-defined function: parameter names plus a compiled body. A `{}`
/// block is the zero-parameter case.
#[derive(Debug, PartialEq)]
pub struct FunctionValue {
    pub params: SmallVec<[SmolStr; 4]>,
    pub body: CompiledExpr,
}

pub type NativeFn = fn(&mut Context, &mut Binder, &Arguments) -> Result<Value, EvalError>;

#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: SmolStr,
    pub func: NativeFn,
}

/// Dynamically typed runtime value. There is no boolean: truth is "not
/// `None`", and predicates answer with `Int(1)` or `None`. Lists and maps
/// have reference semantics; cloning a value shares the underlying storage.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Int(i64),
    Float(f64),
    String(String),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<Vec<(SmolStr, Value)>>>),
    Function(Rc<FunctionValue>),
    NativeFunction(NativeFunction),
}

impl Value {
    pub const TRUE: Value = Value::Int(1);
    pub const FALSE: Value = Value::None;

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::NativeFunction(_) => "native_function",
        }
    }

    pub(crate) fn bool_value(value: bool) -> Self {
        if value { Self::TRUE } else { Self::FALSE }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                // Maps compare by contents, ignoring insertion order.
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => Ok(()),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(value) => write!(f, "{}", Number::Float(*value)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(_) | Value::Map(_) => {
                let text = serde_json::to_string(&convert::to_json(self)).unwrap_or_default();
                write!(f, "{}", text)
            }
            Value::Function(function) => write!(f, "function/{}", function.params.len()),
            Value::NativeFunction(native) => write!(f, "{}", native.name),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::bool_value(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        match value {
            Number::Int(n) => Value::Int(n),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(values)))
    }
}

/// Evaluated arguments to a call, together with the callee token for error
/// reporting.
#[derive(Debug, Clone)]
pub struct Arguments {
    token: Rc<Token>,
    values: SmallVec<[Value; 4]>,
}

impl Arguments {
    pub(crate) fn new(token: Rc<Token>, values: SmallVec<[Value; 4]>) -> Self {
        Self { token, values }
    }

    pub fn token(&self) -> &Rc<Token> {
        &self.token
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the argument at `index`, or `None` when absent. Missing
    /// trailing arguments are indistinguishable from explicit `None`.
    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Value::None, false)]
    #[case(Value::Int(0), true)]
    #[case(Value::Int(1), true)]
    #[case(Value::String(String::new()), true)]
    #[case(Value::from(Vec::new()), true)]
    fn test_is_truthy(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_truthy(), expected);
    }

    #[rstest]
    #[case(Value::Int(1), Value::Float(1.0), true)]
    #[case(Value::Float(2.5), Value::Int(2), false)]
    #[case(Value::None, Value::None, true)]
    #[case(Value::None, Value::Int(0), false)]
    #[case(Value::from("a"), Value::from("a"), true)]
    #[case(
        Value::from(vec![Value::Int(1), Value::Int(2)]),
        Value::from(vec![Value::Int(1), Value::Int(2)]),
        true
    )]
    #[case(
        Value::from(vec![Value::Int(1)]),
        Value::from(vec![Value::Int(2)]),
        false
    )]
    fn test_eq(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
        assert_eq!(a == b, expected);
    }

    #[test]
    fn test_map_eq_ignores_order() {
        let a = Value::Map(Rc::new(RefCell::new(vec![
            (SmolStr::new("x"), Value::Int(1)),
            (SmolStr::new("y"), Value::Int(2)),
        ])));
        let b = Value::Map(Rc::new(RefCell::new(vec![
            (SmolStr::new("y"), Value::Int(2)),
            (SmolStr::new("x"), Value::Int(1)),
        ])));
        assert_eq!(a, b);
    }

    #[rstest]
    #[case(Value::None, "")]
    #[case(Value::Int(57), "57")]
    #[case(Value::Float(57.67), "57.67")]
    #[case(Value::from("hi"), "hi")]
    #[case(Value::from(vec![Value::Int(1), Value::Int(2)]), "[1,2]")]
    fn test_display(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }
}
