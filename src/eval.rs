pub mod binder;
pub mod builtin;
pub mod error;
pub mod value;

use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use binder::Binder;
use error::EvalError;
use value::{Arguments, Value};

use crate::Token;

/// Name-to-name indirection when resolving a callee is bounded so that a
/// cycle of string bindings terminates.
pub(crate) const MAX_INDIRECTION: usize = 32;

/// Opaque host-state carrier threaded through every evaluation. The core
/// never inspects it; registered native functions downcast to their own
/// state type.
#[derive(Default)]
pub struct Context {
    state: Option<Box<dyn Any>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state<T: Any>(state: T) -> Self {
        Self {
            state: Some(Box::new(state)),
        }
    }

    pub fn set_state<T: Any>(&mut self, state: T) {
        self.state = Some(Box::new(state));
    }

    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|state| state.downcast_ref())
    }

    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.as_mut().and_then(|state| state.downcast_mut())
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("has_state", &self.state.is_some())
            .finish()
    }
}

/// Follows string bindings until a non-string value is reached, so a name
/// bound to another name dispatches to whatever the chain ends at.
pub(crate) fn resolve_callable(
    binder: &Binder,
    value: Value,
    token: &Rc<Token>,
) -> Result<Value, EvalError> {
    let mut value = value;
    for _ in 0..MAX_INDIRECTION {
        match value {
            Value::String(name) => {
                value = binder.get(&name).map_err(|e| e.to_eval_error(token))?;
            }
            other => return Ok(other),
        }
    }
    Err(EvalError::NotCallable(
        (**token).clone(),
        token.to_string(),
    ))
}

/// Calls a function or native function value. Script functions get a fresh
/// frame with parameters bound positionally; missing trailing arguments bind
/// `None`.
pub(crate) fn call_function(
    context: &mut Context,
    binder: &mut Binder,
    callee: &Value,
    args: Arguments,
) -> Result<Value, EvalError> {
    match callee {
        Value::NativeFunction(native) => (native.func)(context, binder, &args),
        Value::Function(function) => {
            if args.len() > function.params.len() {
                return Err(EvalError::InvalidNumberOfArguments(
                    (**args.token()).clone(),
                    args.token().to_string(),
                    function.params.len().min(u8::MAX as usize) as u8,
                    args.len().min(u8::MAX as usize) as u8,
                ));
            }
            binder.push().map_err(|e| e.to_eval_error(args.token()))?;
            for (i, param) in function.params.iter().enumerate() {
                binder.bind(param.clone(), args.get(i));
            }
            let result = function.body.eval(context, binder);
            binder.pop();
            result
        }
        other => Err(EvalError::NotCallable(
            (**args.token()).clone(),
            other.name().to_string(),
        )),
    }
}

/// Invokes a zero-parameter function value in the current scope, passing any
/// other value through. This is how lazily supplied arguments (blocks and
/// quoted forms) are demanded.
pub(crate) fn force(
    context: &mut Context,
    binder: &mut Binder,
    value: Value,
) -> Result<Value, EvalError> {
    match value {
        Value::Function(function) if function.params.is_empty() => {
            function.body.eval(context, binder)
        }
        other => Ok(other),
    }
}
