use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use super::builtin;
use super::error::EvalError;
use super::value::Value;
use crate::Token;

#[derive(Error, Debug, PartialEq)]
pub enum BinderError {
    #[error("\"{0}\" is not defined")]
    NotDefined(String),
    #[error("\"{0}\" is already declared")]
    AlreadyDeclared(String),
    #[error("Maximum stack depth exceeded \"{0}\"")]
    StackOverflow(u32),
}

impl BinderError {
    pub fn to_eval_error(&self, token: &Token) -> EvalError {
        match self {
            BinderError::NotDefined(name) => EvalError::NotDefined(token.clone(), name.clone()),
            BinderError::AlreadyDeclared(name) => {
                EvalError::AlreadyDeclared(token.clone(), name.clone())
            }
            BinderError::StackOverflow(depth) => EvalError::RecursionError(*depth),
        }
    }
}

/// Two-tier name store: one static table plus a stack of call frames.
/// Resolution consults the top frame (if any) and then the static table;
/// frames below the top are never visible.
///
/// Cloning a binder yields independent tables with shallow-copied values, so
/// a seed binder can be reused across executions without scripts observing
/// each other's bindings.
#[derive(Debug, Clone, Default)]
pub struct Binder {
    statics: FxHashMap<SmolStr, Value>,
    frames: Vec<FxHashMap<SmolStr, Value>>,
    max_depth: Option<u32>,
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut binder = Self::default();
        builtin::register(&mut binder);
        binder
    }

    pub fn set_max_depth(&mut self, max_depth: Option<u32>) {
        self.max_depth = max_depth;
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Inserts directly into the static table, replacing any existing
    /// binding. Used for builtin registration and host-seeded values.
    pub fn define(&mut self, name: impl Into<SmolStr>, value: Value) {
        self.statics.insert(name.into(), value);
    }

    /// Inserts into the top frame when one exists, used for binding call
    /// parameters and loop variables without the declare-once check.
    pub(crate) fn bind(&mut self, name: SmolStr, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.insert(name, value);
            }
            None => {
                self.statics.insert(name, value);
            }
        }
    }

    #[inline(always)]
    pub fn get(&self, name: &str) -> Result<Value, BinderError> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        self.statics
            .get(name)
            .cloned()
            .ok_or_else(|| BinderError::NotDefined(name.to_string()))
    }

    /// Uniform write: targets the static table at depth zero or when the
    /// name is already static, otherwise the top frame. Creates the binding
    /// when it does not exist yet, so `set` never fails.
    pub fn set(&mut self, name: &str, value: Value) {
        if self.frames.is_empty() || self.statics.contains_key(name) {
            self.statics.insert(SmolStr::new(name), value);
        } else if let Some(frame) = self.frames.last_mut() {
            frame.insert(SmolStr::new(name), value);
        }
    }

    /// Declare-once: fails when the name already resolves in the top frame
    /// or the static table.
    pub fn declare(&mut self, name: &str, value: Value) -> Result<(), BinderError> {
        if self.statics.contains_key(name)
            || self
                .frames
                .last()
                .is_some_and(|frame| frame.contains_key(name))
        {
            return Err(BinderError::AlreadyDeclared(name.to_string()));
        }
        self.bind(SmolStr::new(name), value);
        Ok(())
    }

    pub(crate) fn push(&mut self) -> Result<(), BinderError> {
        if let Some(max) = self.max_depth {
            if self.frames.len() as u32 >= max {
                return Err(BinderError::StackOverflow(max));
            }
        }
        self.frames.push(FxHashMap::default());
        Ok(())
    }

    pub(crate) fn pop(&mut self) {
        self.frames.pop();
    }
}
