use crate::QuillResult;
use crate::error::{Error, InnerError};
use crate::eval::Context;
use crate::eval::binder::Binder;
use crate::eval::value::{CompiledExpr, NativeFn, NativeFunction, Value};

/// Default limit on nested call frames.
const DEFAULT_MAX_STACK_DEPTH: u32 = 192;

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub max_stack_depth: Option<u32>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_stack_depth: Some(DEFAULT_MAX_STACK_DEPTH),
        }
    }
}

/// The embedding entry point. An engine owns a seed binder holding the
/// builtin library plus host-registered values; every execution clones the
/// seed, so runs never observe each other's bindings.
#[derive(Debug, Clone)]
pub struct Engine {
    binder: Binder,
    options: Options,
}

impl Default for Engine {
    fn default() -> Self {
        let options = Options::default();
        let mut binder = Binder::with_builtins();
        binder.set_max_depth(options.max_stack_depth);
        Self { binder, options }
    }
}

impl Engine {
    pub fn set_max_stack_depth(&mut self, max_stack_depth: Option<u32>) {
        self.options.max_stack_depth = max_stack_depth;
        self.binder.set_max_depth(max_stack_depth);
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Seeds a host value into the static table under `name`.
    pub fn define_value(&mut self, name: &str, value: Value) {
        self.binder.define(name, value);
    }

    /// Registers a host function callable from scripts.
    pub fn register_native(&mut self, name: &str, func: NativeFn) {
        self.binder.define(
            name,
            Value::NativeFunction(NativeFunction {
                name: name.into(),
                func,
            }),
        );
    }

    /// Compiles source without running it. The result can be evaluated any
    /// number of times with [`Engine::run_with_context`].
    #[allow(clippy::result_large_err)]
    pub fn compile(&self, code: &str) -> Result<CompiledExpr, Error> {
        crate::compile(code)
    }

    #[allow(clippy::result_large_err)]
    pub fn eval(&self, code: &str) -> QuillResult {
        let mut context = Context::new();
        self.eval_with_context(code, &mut context)
    }

    #[allow(clippy::result_large_err)]
    pub fn eval_with_context(&self, code: &str, context: &mut Context) -> QuillResult {
        let expr = self.compile(code)?;
        self.run_with_context(&expr, context)
            .map_err(|e| Error::from_error(code, InnerError::Eval(e)))
    }

    /// Runs a compiled expression against a fresh clone of the seed binder.
    pub fn run_with_context(
        &self,
        expr: &CompiledExpr,
        context: &mut Context,
    ) -> Result<Value, crate::eval::error::EvalError> {
        let mut binder = self.binder.clone();
        expr.eval(context, &mut binder)
    }

    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let engine = Engine::default();
        assert_eq!(engine.options().max_stack_depth, Some(192));
    }

    #[test]
    fn test_define_value() {
        let mut engine = Engine::default();
        engine.define_value("answer", Value::Int(42));
        assert_eq!(engine.eval("answer").unwrap(), Value::Int(42));
    }

    #[test]
    fn test_register_native_with_state() {
        fn tally(
            context: &mut Context,
            _binder: &mut Binder,
            args: &crate::Arguments,
        ) -> Result<Value, crate::EvalError> {
            if let Some(total) = context.state_mut::<i64>() {
                if let Value::Int(n) = args.get(0) {
                    *total += n;
                }
            }
            Ok(Value::None)
        }

        let mut engine = Engine::default();
        engine.register_native("tally", tally);
        let mut context = Context::with_state(0_i64);
        engine
            .eval_with_context("tally(40) tally(2)", &mut context)
            .unwrap();
        assert_eq!(context.state::<i64>(), Some(&42));
    }

    #[test]
    fn test_compile_once_run_twice() {
        let engine = Engine::default();
        let expr = engine.compile("var(@x, 1) +(x, 1)").unwrap();
        let mut context = Context::new();
        assert_eq!(
            engine.run_with_context(&expr, &mut context).unwrap(),
            Value::Int(2)
        );
        // The seed binder is cloned per run, so the declaration is fresh.
        assert_eq!(
            engine.run_with_context(&expr, &mut context).unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn test_version() {
        assert!(!Engine::version().is_empty());
    }
}
