pub(crate) mod convert;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use itertools::Itertools;
use smallvec::SmallVec;
use smol_str::SmolStr;

use super::binder::Binder;
use super::error::EvalError;
use super::value::{Arguments, FunctionValue, NativeFn, NativeFunction, Value};
use super::{Context, call_function, force, resolve_callable};
use crate::compile::Compiler;
use crate::lexer;
use crate::number::Number;

/// The standard library. Every entry lands in a binder's static table as a
/// `NativeFunction`, so scripts can rebind the names with `set` like any
/// other binding.
const FUNCTIONS: &[(&str, NativeFn)] = &[
    ("var", var),
    ("set", set),
    ("if", if_),
    ("eq", eq),
    ("ne", ne),
    ("mt", mt),
    ("lt", lt),
    ("mte", mte),
    ("lte", lte),
    ("not", not),
    ("any", any),
    ("all", all),
    ("function", function),
    ("apply", apply),
    ("list", list),
    ("map", map),
    ("get", get),
    ("count", count),
    ("add", add),
    ("slice", slice),
    ("each", each),
    ("string", string),
    ("number", number),
    ("json", json),
    ("type", type_),
    ("eval", eval_),
    ("+", add_op),
    ("-", sub_op),
    ("*", mul_op),
    ("/", div_op),
    ("%", rem_op),
];

pub(crate) fn register(binder: &mut Binder) {
    for (name, func) in FUNCTIONS {
        binder.define(
            *name,
            Value::NativeFunction(NativeFunction {
                name: SmolStr::new(name),
                func: *func,
            }),
        );
    }
}

fn invalid_types(args: &Arguments, name: &str) -> EvalError {
    EvalError::InvalidTypes {
        token: (**args.token()).clone(),
        name: name.to_string(),
        args: args
            .values()
            .iter()
            .map(|value| SmolStr::new(value.name()))
            .collect(),
    }
}

/// Counts compare in `usize`; the error payload narrows saturating so wide
/// variadic calls are never misjudged by a wrapped cast.
fn arity_error(args: &Arguments, name: &str, expected: usize) -> EvalError {
    EvalError::InvalidNumberOfArguments(
        (**args.token()).clone(),
        name.to_string(),
        expected.min(u8::MAX as usize) as u8,
        args.len().min(u8::MAX as usize) as u8,
    )
}

fn check_exact(args: &Arguments, name: &str, expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(arity_error(args, name, expected));
    }
    Ok(())
}

fn check_min(args: &Arguments, name: &str, min: usize) -> Result<(), EvalError> {
    if args.len() < min {
        return Err(arity_error(args, name, min));
    }
    Ok(())
}

fn check_range(args: &Arguments, name: &str, min: usize, max: usize) -> Result<(), EvalError> {
    if args.len() < min || args.len() > max {
        return Err(arity_error(args, name, max));
    }
    Ok(())
}

fn str_arg<'a>(args: &'a Arguments, name: &str, index: usize) -> Result<&'a str, EvalError> {
    match args.values().get(index) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(invalid_types(args, name)),
    }
}

fn int_arg(args: &Arguments, name: &str, index: usize) -> Result<i64, EvalError> {
    match args.values().get(index) {
        Some(Value::Int(n)) => Ok(*n),
        _ => Err(invalid_types(args, name)),
    }
}

fn to_number(args: &Arguments, name: &str, value: &Value) -> Result<Number, EvalError> {
    match value {
        Value::Int(n) => Ok(Number::Int(*n)),
        Value::Float(f) => Ok(Number::Float(*f)),
        _ => Err(invalid_types(args, name)),
    }
}

fn block_arg(args: &Arguments, name: &str, index: usize) -> Result<Rc<FunctionValue>, EvalError> {
    match args.values().get(index) {
        Some(Value::Function(function)) if function.params.is_empty() => Ok(Rc::clone(function)),
        _ => Err(invalid_types(args, name)),
    }
}

fn fold_numbers(
    args: &Arguments,
    name: &str,
    op: impl Fn(Number, Number) -> Option<Number>,
) -> Result<Value, EvalError> {
    let mut iter = args.values().iter();
    let mut acc = match iter.next() {
        Some(value) => to_number(args, name, value)?,
        None => return Err(invalid_types(args, name)),
    };
    for value in iter {
        let rhs = to_number(args, name, value)?;
        acc = op(acc, rhs).ok_or_else(|| EvalError::ZeroDivision((**args.token()).clone()))?;
    }
    Ok(acc.into())
}

fn order(args: &Arguments, name: &str) -> Result<Ordering, EvalError> {
    check_exact(args, name, 2)?;
    let ordering = match args.values() {
        [Value::String(a), Value::String(b)] => a.partial_cmp(b),
        [a, b] => to_number(args, name, a)?.partial_cmp(&to_number(args, name, b)?),
        _ => None,
    };
    ordering.ok_or_else(|| invalid_types(args, name))
}

fn var(_context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_range(args, "var", 1, 2)?;
    let name = str_arg(args, "var", 0)?.to_string();
    let value = args.get(1);
    binder
        .declare(&name, value.clone())
        .map_err(|e| e.to_eval_error(args.token()))?;
    Ok(value)
}

fn set(_context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_range(args, "set", 1, 2)?;
    let name = str_arg(args, "set", 0)?.to_string();
    let value = args.get(1);
    binder.set(&name, value.clone());
    Ok(value)
}

/// The selected branch runs in the current scope; only function calls and
/// `each` iterations open a new frame.
fn if_(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_range(args, "if", 2, 3)?;
    let cond = force(context, binder, args.get(0))?;
    if cond.is_truthy() {
        force(context, binder, args.get(1))
    } else {
        force(context, binder, args.get(2))
    }
}

fn eq(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "eq", 2)?;
    Ok(Value::bool_value(args.get(0) == args.get(1)))
}

fn ne(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "ne", 2)?;
    Ok(Value::bool_value(args.get(0) != args.get(1)))
}

fn mt(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    order(args, "mt").map(|o| Value::bool_value(o == Ordering::Greater))
}

fn lt(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    order(args, "lt").map(|o| Value::bool_value(o == Ordering::Less))
}

fn mte(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    order(args, "mte").map(|o| Value::bool_value(o != Ordering::Less))
}

fn lte(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    order(args, "lte").map(|o| Value::bool_value(o != Ordering::Greater))
}

fn not(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "not", 1)?;
    Ok(Value::bool_value(!args.get(0).is_truthy()))
}

/// Every argument is evaluated; lazily supplied blocks are demanded even
/// after the outcome is decided, so side effects are not skipped.
fn any(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_min(args, "any", 1)?;
    let mut result = false;
    for value in args.values() {
        result |= force(context, binder, value.clone())?.is_truthy();
    }
    Ok(Value::bool_value(result))
}

fn all(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_min(args, "all", 1)?;
    let mut result = true;
    for value in args.values() {
        result &= force(context, binder, value.clone())?.is_truthy();
    }
    Ok(Value::bool_value(result))
}

fn function(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "function", 1)?;
    let block = block_arg(args, "function", 0)?;
    let mut params = SmallVec::new();
    for value in &args.values()[1..] {
        match value {
            Value::String(name) => params.push(SmolStr::new(name)),
            _ => return Err(invalid_types(args, "function")),
        }
    }
    Ok(Value::Function(Rc::new(FunctionValue {
        params,
        body: block.body.clone(),
    })))
}

fn apply(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "apply", 2)?;
    let target = resolve_callable(binder, args.get(0), args.token())?;
    let values: SmallVec<[Value; 4]> = match args.values().get(1) {
        Some(Value::List(items)) => items.borrow().iter().cloned().collect(),
        _ => return Err(invalid_types(args, "apply")),
    };
    call_function(
        context,
        binder,
        &target,
        Arguments::new(Rc::clone(args.token()), values),
    )
}

fn list(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    Ok(Value::List(Rc::new(RefCell::new(args.values().to_vec()))))
}

fn map(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    if args.len() % 2 != 0 {
        return Err(arity_error(args, "map", args.len() + 1));
    }
    let mut entries: Vec<(SmolStr, Value)> = Vec::with_capacity(args.len() / 2);
    for (key, value) in args.values().iter().tuples() {
        let key = match key {
            Value::String(s) => SmolStr::new(s),
            _ => return Err(invalid_types(args, "map")),
        };
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => entries.push((key, value.clone())),
        }
    }
    Ok(Value::Map(Rc::new(RefCell::new(entries))))
}

fn get(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "get", 2)?;
    match args.values() {
        [Value::List(items), Value::Int(index)] => {
            let items = items.borrow();
            usize::try_from(*index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .ok_or_else(|| EvalError::IndexOutOfBounds((**args.token()).clone(), *index))
        }
        [Value::String(s), Value::Int(index)] => usize::try_from(*index)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| EvalError::IndexOutOfBounds((**args.token()).clone(), *index)),
        // A missing map key is an absent value, not an error.
        [Value::Map(entries), Value::String(key)] => Ok(entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key.as_str())
            .map(|(_, value)| value.clone())
            .unwrap_or_default()),
        _ => Err(invalid_types(args, "get")),
    }
}

fn count(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "count", 1)?;
    match args.values().first() {
        Some(Value::List(items)) => Ok(Value::Int(items.borrow().len() as i64)),
        Some(Value::Map(entries)) => Ok(Value::Int(entries.borrow().len() as i64)),
        Some(Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
        _ => Err(invalid_types(args, "count")),
    }
}

/// Mutates the collection in place and returns it; every value sharing the
/// collection observes the change.
fn add(_context: &mut Context, _binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_min(args, "add", 2)?;
    match args.values().first() {
        Some(Value::List(items)) => {
            items
                .borrow_mut()
                .extend(args.values()[1..].iter().cloned());
            Ok(args.get(0))
        }
        Some(Value::Map(entries)) => {
            if (args.len() - 1) % 2 != 0 {
                return Err(arity_error(args, "add", args.len() + 1));
            }
            let mut entries = entries.borrow_mut();
            for (key, value) in args.values()[1..].iter().tuples() {
                let key = match key {
                    Value::String(s) => SmolStr::new(s),
                    _ => return Err(invalid_types(args, "add")),
                };
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value.clone(),
                    None => entries.push((key, value.clone())),
                }
            }
            drop(entries);
            Ok(args.get(0))
        }
        _ => Err(invalid_types(args, "add")),
    }
}

fn slice(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "slice", 3)?;
    let start = int_arg(args, "slice", 1)?.max(0) as usize;
    let end = int_arg(args, "slice", 2)?.max(0) as usize;
    match args.values().first() {
        Some(Value::List(items)) => {
            let items = items.borrow();
            let end = end.min(items.len());
            let start = start.min(end);
            Ok(Value::List(Rc::new(RefCell::new(
                items[start..end].to_vec(),
            ))))
        }
        Some(Value::String(s)) => Ok(Value::String(
            s.chars()
                .skip(start)
                .take(end.saturating_sub(start))
                .collect(),
        )),
        _ => Err(invalid_types(args, "slice")),
    }
}

/// Iterates a list's elements or a map's keys, binding the loop name in a
/// fresh frame per iteration. Returns `None`.
fn each(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "each", 3)?;
    let name = SmolStr::new(str_arg(args, "each", 0)?);
    let block = block_arg(args, "each", 2)?;
    let items: Vec<Value> = match args.values().get(1) {
        Some(Value::List(items)) => items.borrow().clone(),
        Some(Value::Map(entries)) => entries
            .borrow()
            .iter()
            .map(|(key, _)| Value::String(key.to_string()))
            .collect(),
        _ => return Err(invalid_types(args, "each")),
    };
    for item in items {
        binder.push().map_err(|e| e.to_eval_error(args.token()))?;
        binder.bind(name.clone(), item);
        let result = block.body.eval(context, binder);
        binder.pop();
        result?;
    }
    Ok(Value::None)
}

fn string(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "string", 1)?;
    match args.values().first() {
        Some(value @ (Value::List(_) | Value::Map(_))) => {
            convert::to_json_string(value, args.token()).map(Value::String)
        }
        Some(value) => Ok(Value::String(value.to_string())),
        None => Err(invalid_types(args, "string")),
    }
}

fn number(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "number", 1)?;
    match args.values().first() {
        Some(value @ (Value::Int(_) | Value::Float(_))) => Ok(value.clone()),
        Some(Value::String(s)) => convert::parse_number(s)
            .ok_or_else(|| EvalError::InvalidNumber((**args.token()).clone(), s.clone())),
        _ => Err(invalid_types(args, "number")),
    }
}

/// Bidirectional JSON surface: a string parses into a value, anything else
/// serializes into JSON text.
fn json(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "json", 1)?;
    match args.values().first() {
        Some(Value::String(s)) => serde_json::from_str::<serde_json::Value>(s)
            .map(convert::from_json)
            .map_err(|e| EvalError::InvalidJson((**args.token()).clone(), e.to_string())),
        Some(value) => convert::to_json_string(value, args.token()).map(Value::String),
        None => Err(invalid_types(args, "json")),
    }
}

fn type_(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_exact(args, "type", 1)?;
    Ok(Value::String(args.get(0).name().to_string()))
}

/// Runs code in a fresh binder seeded with the standard library only; the
/// caller's bindings are not visible, but the host context is shared.
fn eval_(context: &mut Context, binder: &mut Binder, args: &Arguments) -> Result<Value, EvalError> {
    check_exact(args, "eval", 1)?;
    let code = str_arg(args, "eval", 0)?;
    let tokens = lexer::tokenize(code)
        .map_err(|e| EvalError::RuntimeError((**args.token()).clone(), e.to_string()))?;
    let tokens = tokens.into_iter().map(Rc::new).collect::<Vec<_>>();
    let expr = Compiler::new(&tokens)
        .compile()
        .map_err(|e| EvalError::RuntimeError((**args.token()).clone(), e.to_string()))?;
    let mut nested = Binder::with_builtins();
    nested.set_max_depth(binder.max_depth());
    expr.eval(context, &mut nested)
}

fn add_op(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "+", 1)?;
    if args.values().iter().any(|v| matches!(v, Value::String(_))) {
        let mut out = String::new();
        for value in args.values() {
            out.push_str(&value.to_string());
        }
        return Ok(Value::String(out));
    }
    fold_numbers(args, "+", |a, b| Some(a + b))
}

fn sub_op(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "-", 1)?;
    fold_numbers(args, "-", |a, b| Some(a - b))
}

fn mul_op(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "*", 1)?;
    fold_numbers(args, "*", |a, b| Some(a * b))
}

fn div_op(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "/", 1)?;
    fold_numbers(args, "/", |a, b| if b.is_zero() { None } else { Some(a / b) })
}

fn rem_op(
    _context: &mut Context,
    _binder: &mut Binder,
    args: &Arguments,
) -> Result<Value, EvalError> {
    check_min(args, "%", 1)?;
    fold_numbers(args, "%", |a, b| if b.is_zero() { None } else { Some(a % b) })
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::{Engine, Value};

    #[fixture]
    fn engine() -> Engine {
        Engine::default()
    }

    #[rstest]
    #[case::add_ints("+(7, 30, 5, 15)", Value::Int(57))]
    #[case::add_floats("+(1.5, 2)", Value::Float(3.5))]
    #[case::concat("+(\"hello\", \" \", \"world\")", Value::from("hello world"))]
    #[case::concat_mixed("+(\"n=\", 44)", Value::from("n=44"))]
    #[case::sub("-(10, 3, 2)", Value::Int(5))]
    #[case::mul("*(10, 2)", Value::Int(20))]
    #[case::div_truncates("/(7, 2)", Value::Int(3))]
    #[case::div_float("/(7.0, 2)", Value::Float(3.5))]
    #[case::rem_chain("%(13, 10, 2)", Value::Int(1))]
    #[case::eq_true("eq(1, 1.0)", Value::TRUE)]
    #[case::eq_none("eq(if(eq(1, 2), {1}), if(eq(3, 4), {2}))", Value::TRUE)]
    #[case::ne("ne(1, 2)", Value::TRUE)]
    #[case::mt("mt(5, 2)", Value::TRUE)]
    #[case::lt("lt(5, 2)", Value::FALSE)]
    #[case::mte("mte(5, 5)", Value::TRUE)]
    #[case::lte_strings("lte(\"a\", \"b\")", Value::TRUE)]
    #[case::not_zero_is_truthy("not(0)", Value::FALSE)]
    #[case::not_none("not(eq(1, 2))", Value::TRUE)]
    #[case::any("any(eq(1, 2), eq(3, 3))", Value::TRUE)]
    #[case::all("all(1, \"x\", list())", Value::TRUE)]
    #[case::all_fails("all(1, eq(1, 2))", Value::FALSE)]
    #[case::count_string("count(\"hello\")", Value::Int(5))]
    #[case::count_list("count(list(57, 67, 77))", Value::Int(3))]
    #[case::count_map("count(map('foo', 57, 'bar', 77))", Value::Int(2))]
    #[case::get_list("get(list(57, 67), 1)", Value::Int(67))]
    #[case::get_string("get(\"abc\", 2)", Value::from("c"))]
    #[case::get_map("get(map('a', 1), \"a\")", Value::Int(1))]
    #[case::get_map_miss("get(map('a', 1), \"zzz\")", Value::None)]
    #[case::slice_list(
        "slice(list(57, 67, 77, 87), 1, 3)",
        Value::from(vec![Value::Int(67), Value::Int(77)])
    )]
    #[case::slice_clamps(
        "slice(list(1, 2), 1, 99)",
        Value::from(vec![Value::Int(2)])
    )]
    #[case::slice_string("slice(\"hello\", 1, 3)", Value::from("el"))]
    #[case::add_list("count(add(list(1), 2, 3))", Value::Int(3))]
    #[case::map_duplicate_key("count(map('a', 1, 'a', 2))", Value::Int(1))]
    #[case::string_int("string(57)", Value::from("57"))]
    #[case::string_small_float("string(0.0000001)", Value::from("0.0000001"))]
    #[case::string_map("string(map('foo', 57))", Value::from("{\"foo\":57}"))]
    #[case::string_self_referencing_list(
        "var(@xs, list(1)) add(xs, xs) string(xs)",
        Value::from("[1,null]")
    )]
    #[case::json_self_referencing_map(
        "var(@m, map('a', 1)) add(m, 'self', m) json(m)",
        Value::from("{\"a\":1,\"self\":null}")
    )]
    #[case::number_int("number(\"57\")", Value::Int(57))]
    #[case::number_float("number(\"57.67\")", Value::Float(57.67))]
    #[case::json_parse("get(json(\"{\\\"a\\\":1}\"), \"a\")", Value::Int(1))]
    #[case::json_serialize("json(list(1, 2))", Value::from("[1,2]"))]
    #[case::type_list("type(list())", Value::from("list"))]
    #[case::type_none("type(if(eq(1, 2), {1}))", Value::from("None"))]
    #[case::eval_code("eval(\"+(1, 2)\")", Value::Int(3))]
    fn test_builtin(engine: Engine, #[case] program: &str, #[case] expected: Value) {
        assert_eq!(engine.eval(program).unwrap(), expected);
    }

    #[rstest]
    #[case::div_by_zero("/(1, 0)")]
    #[case::rem_by_zero("%(5, 0)")]
    #[case::get_out_of_bounds("get(list(1), 5)")]
    #[case::get_negative_index("get(list(1), -(0, 1))")]
    #[case::number_invalid("number(\"abc\")")]
    #[case::json_invalid("json(\"{oops\")")]
    #[case::count_wrong_type("count(57)")]
    #[case::map_odd_arguments("map('a')")]
    #[case::eq_wrong_arity("eq(1)")]
    #[case::eval_isolated("var(@secret, 1) eval(\"secret\")")]
    fn test_builtin_error(engine: Engine, #[case] program: &str) {
        assert!(engine.eval(program).is_err());
    }

    #[rstest]
    fn test_variadic_call_with_256_arguments(engine: Engine) {
        let program = format!("+({})", vec!["1"; 256].join(", "));
        assert_eq!(engine.eval(&program).unwrap(), Value::Int(256));
    }

    #[rstest]
    fn test_fixed_arity_rejects_258_arguments(engine: Engine) {
        let program = format!("eq({})", vec!["1"; 258].join(", "));
        assert!(engine.eval(&program).is_err());
    }
}
